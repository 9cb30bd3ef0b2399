use crate::delay::{BusyWaitDelay, LcdDelay, Wait};
use crate::lcd::hd44780::config::{Geometry, LcdConfig, LcdPins};
use crate::lcd::hd44780::driver::{CursorDirection, HD44780Driver};
use crate::{GpioBias, GpioError, GpioPort, GpioResult};
use log::{debug, trace};

/// HD44780 driver on a write-only 4-bit bus, driven through GPIO ports.
///
/// R/W is always driven low and the busy flag is never read; every transfer is followed by a
/// fixed wait from the [LcdDelay].
///
/// The driver claims its lines on creation and releases them when dropped. The data and control
/// lines may live on the same port.
#[derive(Debug)]
pub struct GpioHD44780Driver<'a, D: LcdDelay = BusyWaitDelay> {
    data_port: &'a dyn GpioPort,
    ctrl_port: &'a dyn GpioPort,
    config: LcdConfig,
    pins: LcdPins,
    delay: D,
}

impl<'a, D: LcdDelay> GpioHD44780Driver<'a, D> {
    /// # Errors
    /// - `GpioError::InvalidConfig` if the configuration is invalid or the ports don't match it.
    /// - `GpioError::AlreadyInUse` if some of the lines are already claimed.
    pub fn new(
        config: LcdConfig,
        data_port: &'a dyn GpioPort,
        ctrl_port: &'a dyn GpioPort,
        delay: D,
    ) -> GpioResult<Self> {
        config.validate()?;

        if data_port.id() != config.data_port || ctrl_port.id() != config.ctrl_port {
            return Err(GpioError::InvalidConfig(format!(
                "expected ports {}/{}, got {}/{}",
                config.data_port,
                config.ctrl_port,
                data_port.id(),
                ctrl_port.id(),
            )));
        }

        let pins = config.pins();
        data_port.claim(pins.data_mask())?;
        if let Err(err) = ctrl_port.claim(pins.ctrl_mask()) {
            data_port.release(pins.data_mask());
            return Err(err);
        }

        Ok(GpioHD44780Driver {
            data_port,
            ctrl_port,
            config,
            pins,
            delay,
        })
    }

    pub fn config(&self) -> &LcdConfig {
        &self.config
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Puts the nibble on DB4-DB7 and pulses E.
    ///
    /// RS and R/W must already be set.
    fn send_nibble(&self, nibble: u8) -> GpioResult<()> {
        trace!("Writing nibble: {:04b}", nibble);
        self.data_port.clear_bits(self.pins.data_mask())?;
        self.data_port.set_bits(self.pins.nibble_bits(nibble & 0x0F))?;
        self.ctrl_port.set_bits(self.pins.en_mask())?;
        self.ctrl_port.clear_bits(self.pins.en_mask())?;
        Ok(())
    }

    fn send(&mut self, data: u8, rs: bool) -> GpioResult<()> {
        trace!("Sending data: {:08b}, RS: {}", data, rs);

        // RS, RW and E low: write
        self.ctrl_port.clear_bits(self.pins.ctrl_mask())?;
        if rs {
            self.ctrl_port.set_bits(self.pins.rs_mask())?;
        }

        self.send_nibble(data >> 4)?;
        self.send_nibble(data & 0x0F)?;

        self.delay.wait(if rs { Wait::Character } else { Wait::Command });
        Ok(())
    }
}

impl<D: LcdDelay> Drop for GpioHD44780Driver<'_, D> {
    fn drop(&mut self) {
        self.data_port.release(self.pins.data_mask());
        self.ctrl_port.release(self.pins.ctrl_mask());
    }
}

impl<D: LcdDelay> HD44780Driver for GpioHD44780Driver<'_, D> {
    /// Configures the lines, waits for the controller to power up and sends the setup sequence:
    /// function set (4-bit, 2 lines, 5x8 font), display control, clear display and entry mode
    /// (increment, no shift).
    ///
    /// The controller powers up in 8-bit mode, so the function set has to go first. Its high
    /// nibble alone already switches the bus to 4 bits.
    fn init(&mut self) -> GpioResult<()> {
        debug!("Initializing {:?}", self.config);

        self.data_port.enable_clock()?;
        self.data_port.configure_output(self.pins.data_mask(), self.config.data_bias)?;
        self.ctrl_port.enable_clock()?;
        self.ctrl_port.configure_output(self.pins.ctrl_mask(), GpioBias::None)?;

        self.delay.wait(Wait::PowerOn);

        self.function_set(false, true, false)?;
        self.set_display_control(
            self.config.display_on,
            self.config.cursor_on,
            self.config.blink_on,
        )?;
        self.clear_display()?;
        self.set_entry_mode(CursorDirection::Right, false)?;

        debug!("Display initialized");
        Ok(())
    }

    fn geometry(&self) -> Geometry {
        self.config.geometry()
    }

    fn write_command(&mut self, command: u8) -> GpioResult<()> {
        self.send(command, false)
    }

    fn write_character(&mut self, character: u8) -> GpioResult<()> {
        self.send(character, true)
    }
}
