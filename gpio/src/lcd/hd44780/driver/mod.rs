mod gpio;

use crate::lcd::hd44780::config::Geometry;
use crate::{GpioError, GpioResult};
pub use gpio::*;
use log::warn;
use std::fmt::Debug;

/// Number of custom character slots in the character generator RAM.
pub const CUSTOM_CHARACTER_SLOTS: u8 = 8;

pub trait HD44780Driver: Debug {
    /// Initializes the GPIO lines and the HD44780 controller.
    ///
    /// Must be called once before anything else is sent to the display.
    fn init(&mut self) -> GpioResult<()>;

    /// Size of the display this driver talks to.
    fn geometry(&self) -> Geometry;

    // Low-level commands
    // Everything below is built on these two.

    /// Writes an instruction to the controller. RS is low (command).
    fn write_command(&mut self, command: u8) -> GpioResult<()>;

    /// Writes a byte to the RAM the address counter currently points to. RS is high (data).
    ///
    /// That is a character code after [Self::set_cursor], or a glyph row after
    /// [Self::set_cgram_address].
    fn write_character(&mut self, character: u8) -> GpioResult<()>;

    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.write_command(0b00000001)
    }

    /// Sets the cursor to the home position.
    fn return_home(&mut self) -> GpioResult<()> {
        self.write_command(0b00000010)
    }

    /// Sets the display to the specified entry mode.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> GpioResult<()> {
        let mut command = 0b00000100;
        if cursor_direction == CursorDirection::Right {
            command |= 0b00000010;
        }
        if shift {
            command |= 0b00000001;
        }
        self.write_command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> GpioResult<()> {
        let mut command = 0b00001000;
        if display_on {
            command |= 0b00000100;
        }
        if cursor_on {
            command |= 0b00000010;
        }
        if blink_on {
            command |= 0b00000001;
        }
        self.write_command(command)
    }

    /// Moves the cursor or shifts the display.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> GpioResult<()> {
        let mut command = 0b00010000;
        if display_shift {
            command |= 0b00001000;
        }
        if direction == CursorDirection::Right {
            command |= 0b00000100;
        }
        self.write_command(command)
    }

    /// Sets the function set.
    ///
    /// `data_length` selects the 8-bit bus, `font` the 5x10 dots font.
    fn function_set(&mut self, data_length: bool, two_lines: bool, font: bool) -> GpioResult<()> {
        let mut command = 0b00100000;
        if data_length {
            command |= 0b00010000;
        }
        if two_lines {
            command |= 0b00001000;
        }
        if font {
            command |= 0b00000100;
        }
        self.write_command(command)
    }

    /// Sets the CGRAM address.
    fn set_cgram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b00111111 {
            return Err(GpioError::InvalidArgument);
        }
        let command = 0b01000000 | address;
        self.write_command(command)
    }

    /// Sets the DDRAM address.
    fn set_ddram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b01111111 {
            return Err(GpioError::InvalidArgument);
        }
        let command = 0b10000000 | address;
        self.write_command(command)
    }

    /// Moves the cursor. `(0, 0)` is the top left cell.
    ///
    /// The row and column are not checked against the geometry; out-of-range values put the
    /// cursor somewhere undefined on the screen.
    fn set_cursor(&mut self, row: u8, column: u8) -> GpioResult<()> {
        let address = self.geometry().ddram_address(row, column);
        self.write_command(0b10000000 | address)
    }

    /// Writes the characters in order, starting at the cursor.
    ///
    /// No wrapping is done; the controller advances its address counter on its own.
    fn print(&mut self, text: &[u8]) -> GpioResult<()> {
        for &character in text {
            self.write_character(character)?;
        }
        Ok(())
    }

    /// Like [Self::print], but replaces anything that is not ASCII with `?`.
    fn print_str(&mut self, s: &str) -> GpioResult<()> {
        for c in s.chars() {
            if c.is_ascii() {
                self.write_character(c as u8)?;
            } else {
                warn!("Non-ASCII character: {}", c);
                self.write_character(b'?')?;
            }
        }
        Ok(())
    }

    /// Programs one of the custom characters.
    ///
    /// `pattern` holds the rows from top to bottom, the bottom 5 bits of each being the dots.
    /// The address is set again before every row.
    ///
    /// # Errors
    /// - `GpioError::SlotOutOfRange` if `slot` is 8 or more. Nothing is written then.
    fn modify_character(&mut self, pattern: &[u8; 8], slot: u8) -> GpioResult<()> {
        if slot >= CUSTOM_CHARACTER_SLOTS {
            warn!("Custom character slot {} out of range", slot);
            return Err(GpioError::SlotOutOfRange(slot));
        }
        for (row, &bits) in (0u8..).zip(pattern.iter()) {
            self.write_command(0b01000000 + 8 * slot + row)?;
            self.write_character(bits)?;
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing data.
    Left,
    /// Moves the cursor to the right after writing data.
    Right,
}
