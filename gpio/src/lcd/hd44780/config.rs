use crate::{GpioBias, GpioError, GpioResult, PortId};
use serde::{Deserialize, Serialize};

/// Size of the display, in character cells.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Geometry {
    pub width: u8,
    pub height: u8,
}

impl Geometry {
    /// Address of the cell in the display data RAM.
    ///
    /// Even rows start at `0x00` and odd rows at `0x40`. Rows in the lower half of the display
    /// continue the upper half rows of the same parity, so they are offset by the width.
    /// On a 20x4 display that gives `0x00`, `0x40`, `0x14` and `0x54`.
    ///
    /// Out-of-range rows and columns are not checked; the address simply wraps.
    pub fn ddram_address(&self, row: u8, column: u8) -> u8 {
        let mut address: u8 = if row % 2 == 0 { 0x00 } else { 0x40 };
        if row >= self.height / 2 {
            address = address.wrapping_add(self.width);
        }
        address.wrapping_add(column)
    }
}

/// Line assignments of the display, as given by [LcdConfig::pins].
///
/// A line past bit 31 has an empty mask.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LcdPins {
    data: [u8; 4],
    rs: u8,
    rw: u8,
    en: u8,
}

fn line_bit(pin: u8) -> u32 {
    1u32.checked_shl(pin as u32).unwrap_or(0)
}

impl LcdPins {
    /// DB4 to DB7.
    pub fn data(&self) -> [u8; 4] {
        self.data
    }

    pub fn data_mask(&self) -> u32 {
        self.data.iter().fold(0, |mask, &pin| mask | line_bit(pin))
    }

    pub fn ctrl_mask(&self) -> u32 {
        self.rs_mask() | self.rw_mask() | self.en_mask()
    }

    pub fn rs_mask(&self) -> u32 {
        line_bit(self.rs)
    }

    pub fn rw_mask(&self) -> u32 {
        line_bit(self.rw)
    }

    pub fn en_mask(&self) -> u32 {
        line_bit(self.en)
    }

    /// Spreads the nibble over the data lines, bit 0 going to DB4 and bit 3 to DB7.
    pub fn nibble_bits(&self, nibble: u8) -> u32 {
        self.data
            .iter()
            .enumerate()
            .filter(|&(i, _)| nibble & (1 << i) != 0)
            .fold(0, |bits, (_, &pin)| bits | line_bit(pin))
    }

    /// Gathers the nibble back from the data line levels.
    pub fn nibble_from_bits(&self, bits: u32) -> u8 {
        self.data
            .iter()
            .enumerate()
            .filter(|&(_, &pin)| bits & line_bit(pin) != 0)
            .fold(0, |nibble, (i, _)| nibble | 1 << i)
    }
}

/// Configuration of a character display on a 4-bit bus.
///
/// Every field has a default matching a 20x4 display wired with DB4-DB7 on port D lines 0-3 and
/// RS, RW, EN on port E lines 1, 2 and 3.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LcdConfig {
    pub width: u8,
    pub height: u8,

    /// Port of the DB4-DB7 lines.
    pub data_port: PortId,
    /// Port of the RS, RW and EN lines. May be the data port.
    pub ctrl_port: PortId,

    pub db4_pin: u8,
    pub db5_pin: u8,
    pub db6_pin: u8,
    pub db7_pin: u8,
    pub rs_pin: u8,
    pub rw_pin: u8,
    pub en_pin: u8,

    /// Pull resistor on the data lines.
    pub data_bias: GpioBias,

    pub display_on: bool,
    pub cursor_on: bool,
    pub blink_on: bool,
}

impl LcdConfig {
    /// Lines per port on the supported controllers.
    pub const PORT_LINES: u8 = 8;

    pub fn geometry(&self) -> Geometry {
        Geometry {
            width: self.width,
            height: self.height,
        }
    }

    pub fn pins(&self) -> LcdPins {
        LcdPins {
            data: [self.db4_pin, self.db5_pin, self.db6_pin, self.db7_pin],
            rs: self.rs_pin,
            rw: self.rw_pin,
            en: self.en_pin,
        }
    }

    /// Checks the geometry and the line assignments.
    ///
    /// # Errors
    /// - `GpioError::InvalidConfig` if the width is zero, the height is zero or odd, a pin is past
    ///   the end of its port, or two lines share a pin on the same port.
    pub fn validate(&self) -> GpioResult<()> {
        if self.width == 0 {
            return Err(GpioError::InvalidConfig("width must not be zero".into()));
        }
        if self.height == 0 || self.height % 2 != 0 {
            return Err(GpioError::InvalidConfig(format!(
                "height must be even and not zero, got {}",
                self.height
            )));
        }

        let pins = self.pins();
        let named = [
            ("db4", pins.data[0]),
            ("db5", pins.data[1]),
            ("db6", pins.data[2]),
            ("db7", pins.data[3]),
            ("rs", pins.rs),
            ("rw", pins.rw),
            ("en", pins.en),
        ];
        if let Some((name, pin)) = named.iter().find(|&&(_, pin)| pin >= Self::PORT_LINES) {
            return Err(GpioError::InvalidConfig(format!(
                "{name} pin {pin} is past the end of the port"
            )));
        }

        if pins.data_mask().count_ones() != 4 {
            return Err(GpioError::InvalidConfig("data pins must be distinct".into()));
        }
        if pins.ctrl_mask().count_ones() != 3 {
            return Err(GpioError::InvalidConfig("control pins must be distinct".into()));
        }
        if self.data_port == self.ctrl_port && pins.data_mask() & pins.ctrl_mask() != 0 {
            return Err(GpioError::InvalidConfig(format!(
                "data and control pins overlap on {}",
                self.data_port
            )));
        }

        Ok(())
    }
}

impl Default for LcdConfig {
    fn default() -> Self {
        LcdConfig {
            width: 20,
            height: 4,
            data_port: PortId::D,
            ctrl_port: PortId::E,
            db4_pin: 0,
            db5_pin: 1,
            db6_pin: 2,
            db7_pin: 3,
            rs_pin: 1,
            rw_pin: 2,
            en_pin: 3,
            data_bias: GpioBias::PullDown,
            display_on: true,
            cursor_on: false,
            blink_on: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_addresses_on_20x4() {
        let geometry = Geometry { width: 20, height: 4 };
        assert_eq!(geometry.ddram_address(0, 0), 0x00);
        assert_eq!(geometry.ddram_address(1, 3), 0x43);
        assert_eq!(geometry.ddram_address(2, 2), 0x16);
        assert_eq!(geometry.ddram_address(3, 0), 0x54);
        assert_eq!(geometry.ddram_address(3, 19), 0x67);
    }

    #[test]
    fn cursor_addresses_on_16x2() {
        let geometry = Geometry { width: 16, height: 2 };
        // Height 2 puts row 1 in the lower half
        assert_eq!(geometry.ddram_address(0, 5), 0x05);
        assert_eq!(geometry.ddram_address(1, 0), 0x50);
    }

    #[test]
    fn nibbles_map_to_data_lines() {
        let pins = LcdPins {
            data: [4, 7, 0, 2],
            rs: 1,
            rw: 3,
            en: 5,
        };
        assert_eq!(pins.nibble_bits(0b0001), 1 << 4);
        assert_eq!(pins.nibble_bits(0b0010), 1 << 7);
        assert_eq!(pins.nibble_bits(0b1111), pins.data_mask());
        for nibble in 0..16 {
            assert_eq!(pins.nibble_from_bits(pins.nibble_bits(nibble)), nibble);
        }
    }

    #[test]
    fn lines_past_the_register_have_no_bits() {
        let config = LcdConfig {
            db7_pin: 40,
            en_pin: 32,
            ..LcdConfig::default()
        };
        let pins = config.pins();

        assert_eq!(pins.data(), [0, 1, 2, 40]);
        assert_eq!(pins.data_mask(), 0b0000_0111);
        assert_eq!(pins.en_mask(), 0);
        assert_eq!(pins.nibble_bits(0b1111), 0b0000_0111);
        assert_eq!(pins.nibble_from_bits(u32::MAX), 0b0111);
        assert!(matches!(config.validate(), Err(GpioError::InvalidConfig(_))));
    }

    #[test]
    fn default_config_is_valid() {
        let config = LcdConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.pins().data_mask(), 0b0000_1111);
        assert_eq!(config.pins().ctrl_mask(), 0b0000_1110);
    }

    #[test]
    fn odd_height_is_rejected() {
        let config = LcdConfig {
            height: 3,
            ..LcdConfig::default()
        };
        assert!(matches!(config.validate(), Err(GpioError::InvalidConfig(_))));
    }

    #[test]
    fn shared_port_pins_must_not_overlap() {
        let mut config = LcdConfig {
            ctrl_port: PortId::D,
            ..LcdConfig::default()
        };
        assert!(matches!(config.validate(), Err(GpioError::InvalidConfig(_))));

        config.rs_pin = 4;
        config.rw_pin = 5;
        config.en_pin = 6;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn duplicate_and_out_of_port_pins_are_rejected() {
        let config = LcdConfig {
            db7_pin: 2,
            ..LcdConfig::default()
        };
        assert!(matches!(config.validate(), Err(GpioError::InvalidConfig(_))));

        let config = LcdConfig {
            en_pin: 8,
            ..LcdConfig::default()
        };
        assert!(matches!(config.validate(), Err(GpioError::InvalidConfig(_))));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: LcdConfig = serde_json::from_str(
            r#"{ "width": 16, "height": 2, "ctrl_port": "B", "cursor_on": true, "data_bias": "none" }"#,
        )
        .unwrap();

        assert_eq!(config.geometry(), Geometry { width: 16, height: 2 });
        assert_eq!(config.ctrl_port, PortId::B);
        assert_eq!(config.data_port, PortId::D);
        assert_eq!(config.data_bias, GpioBias::None);
        assert!(config.cursor_on);
        assert!(config.display_on);
    }
}
