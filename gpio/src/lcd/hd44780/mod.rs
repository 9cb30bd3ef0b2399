//! HD44780 character LCD module, on a write-only 4-bit bus.
//!
//! The controller has two RAMs, both written through the address counter:
//! - the display data RAM (DDRAM), holding the character codes on screen. Even rows start at
//!   `0x00`, odd rows at `0x40`; on 4-row displays rows 2 and 3 continue rows 0 and 1.
//! - the character generator RAM (CGRAM), holding the 8 custom characters, 8 rows each.
//!
//! Nothing is ever read back from the controller.

pub mod config;
pub mod driver;
pub mod monitor;
