//! Decodes recorded port operations into what an HD44780 controller latched.
//!
//! The controller samples RS, R/W and the data lines on the enable pulse. Following the enable
//! line through a [Journal](crate::sim::Journal) gives the nibbles, and pairing them (high nibble
//! first) gives the bytes.

use crate::lcd::hd44780::config::LcdConfig;
use crate::sim::PortEvent;
use std::fmt::{Display, Formatter};

/// One nibble, as sampled on an enable pulse.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Latch {
    pub nibble: u8,
    pub rs: bool,
    pub rw: bool,
}

/// A full byte transfer, assembled from two latches.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Transfer {
    Command(u8),
    Character(u8),
}

impl Display for Transfer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Transfer::Command(command) => write!(f, "command   0x{:02X} ({:08b})", command, command),
            Transfer::Character(character) if character.is_ascii_graphic() || *character == b' ' => {
                write!(f, "character 0x{:02X} '{}'", character, *character as char)
            }
            Transfer::Character(character) => write!(f, "character 0x{:02X}", character),
        }
    }
}

/// Lists the nibbles latched by the display, in order.
///
/// Every port starts with all lines low.
pub fn latches(events: &[PortEvent], config: &LcdConfig) -> Vec<Latch> {
    let pins = config.pins();
    let mut data_level = 0;
    let mut ctrl_level = 0;
    let mut latches = Vec::new();

    for event in events {
        if event.port == config.data_port {
            data_level = event.level;
        }
        if event.port == config.ctrl_port {
            let rising = ctrl_level & pins.en_mask() == 0 && event.level & pins.en_mask() != 0;
            ctrl_level = event.level;
            if rising {
                latches.push(Latch {
                    nibble: pins.nibble_from_bits(data_level),
                    rs: ctrl_level & pins.rs_mask() != 0,
                    rw: ctrl_level & pins.rw_mask() != 0,
                });
            }
        }
    }

    latches
}

/// Lists the bytes received by the display, in order.
///
/// The register select line of the high nibble decides the kind of transfer. A trailing unpaired
/// nibble is dropped.
pub fn transfers(events: &[PortEvent], config: &LcdConfig) -> Vec<Transfer> {
    latches(events, config)
        .chunks_exact(2)
        .map(|pair| {
            let byte = pair[0].nibble << 4 | pair[1].nibble;
            if pair[0].rs {
                Transfer::Character(byte)
            } else {
                Transfer::Command(byte)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::PortOp;
    use crate::PortId;

    fn event(port: PortId, level: u32) -> PortEvent {
        PortEvent {
            port,
            op: PortOp::Set(0),
            level,
        }
    }

    #[test]
    fn latches_follow_rising_enable_edges() {
        let config = LcdConfig::default();
        let events = [
            event(PortId::D, 0b0101),
            event(PortId::E, 0b0010), // RS up
            event(PortId::E, 0b1010), // EN up
            event(PortId::E, 0b1010), // EN still up, no new latch
            event(PortId::E, 0b0010),
            event(PortId::D, 0b1100),
            event(PortId::E, 0b1000), // RS down, EN up
        ];

        assert_eq!(
            latches(&events, &config),
            vec![
                Latch { nibble: 0b0101, rs: true, rw: false },
                Latch { nibble: 0b1100, rs: false, rw: false },
            ],
        );
    }

    #[test]
    fn latches_pair_into_bytes() {
        let config = LcdConfig::default();
        let events = [
            event(PortId::D, 0b0100),
            event(PortId::E, 0b1010),
            event(PortId::E, 0b0010),
            event(PortId::D, 0b1000),
            event(PortId::E, 0b1010),
            event(PortId::E, 0b0010),
            // Unpaired
            event(PortId::E, 0b1010),
        ];

        assert_eq!(transfers(&events, &config), vec![Transfer::Character(b'H')]);
    }

    #[test]
    fn transfers_display_readably() {
        assert_eq!(Transfer::Character(b'H').to_string(), "character 0x48 'H'");
        assert_eq!(Transfer::Character(0).to_string(), "character 0x00");
        assert_eq!(Transfer::Command(0x28).to_string(), "command   0x28 (00101000)");
    }
}
