//! Waits between transfers to the display controller.
//!
//! The busy flag of the controller is never read, so every transfer is followed by a fixed wait
//! long enough for the slowest instruction of its kind. The three wait classes must keep their
//! order: the power-on wait is the longest, then the command wait, then the character wait.

use crate::{GpioError, GpioResult};
use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;

/// Kind of wait requested after an operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Wait {
    /// After the display is powered up, before the first instruction.
    PowerOn,
    /// After an instruction (command) write.
    Command,
    /// After a character (data) write.
    Character,
}

pub trait LcdDelay: Debug {
    fn wait(&mut self, wait: Wait);
}

impl<T: LcdDelay + ?Sized> LcdDelay for &mut T {
    fn wait(&mut self, wait: Wait) {
        (**self).wait(wait)
    }
}

/// Busy-waits for roughly `cycles` iterations.
///
/// Uncalibrated: the wall-clock duration depends on the CPU clock.
pub fn delay(cycles: u32) {
    for _ in 0..cycles {
        std::hint::spin_loop();
    }
}

/// Busy-wait delay counted in loop iterations.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BusyWaitDelay {
    power_on_cycles: u32,
    command_cycles: u32,
    character_cycles: u32,
}

impl BusyWaitDelay {
    pub const DEFAULT_POWER_ON_CYCLES: u32 = 100_000;
    pub const DEFAULT_COMMAND_CYCLES: u32 = 7_000;
    pub const DEFAULT_CHARACTER_CYCLES: u32 = 4_000;

    /// Creates a delay with custom cycle counts, e.g. recalibrated for a faster clock.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` unless `power_on > command > character`.
    pub fn with_cycles(power_on: u32, command: u32, character: u32) -> GpioResult<Self> {
        if !(power_on > command && command > character) {
            return Err(GpioError::InvalidArgument);
        }
        Ok(BusyWaitDelay {
            power_on_cycles: power_on,
            command_cycles: command,
            character_cycles: character,
        })
    }

    pub fn cycles(&self, wait: Wait) -> u32 {
        match wait {
            Wait::PowerOn => self.power_on_cycles,
            Wait::Command => self.command_cycles,
            Wait::Character => self.character_cycles,
        }
    }
}

impl Default for BusyWaitDelay {
    fn default() -> Self {
        BusyWaitDelay {
            power_on_cycles: Self::DEFAULT_POWER_ON_CYCLES,
            command_cycles: Self::DEFAULT_COMMAND_CYCLES,
            character_cycles: Self::DEFAULT_CHARACTER_CYCLES,
        }
    }
}

impl LcdDelay for BusyWaitDelay {
    fn wait(&mut self, wait: Wait) {
        delay(self.cycles(wait));
    }
}

/// Delay that puts the thread to sleep, for hosted targets.
///
/// The defaults cover the HD44780 datasheet: over 40 ms after power-on, 1.52 ms for the slowest
/// instructions (clear and return home) and 37 us (plus address counter update) for data writes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SleepDelay {
    power_on: Duration,
    command: Duration,
    character: Duration,
}

impl SleepDelay {
    /// # Errors
    /// - `GpioError::InvalidArgument` unless `power_on > command > character`.
    pub fn with_durations(power_on: Duration, command: Duration, character: Duration) -> GpioResult<Self> {
        if !(power_on > command && command > character) {
            return Err(GpioError::InvalidArgument);
        }
        Ok(SleepDelay {
            power_on,
            command,
            character,
        })
    }

    pub fn duration(&self, wait: Wait) -> Duration {
        match wait {
            Wait::PowerOn => self.power_on,
            Wait::Command => self.command,
            Wait::Character => self.character,
        }
    }
}

impl Default for SleepDelay {
    fn default() -> Self {
        SleepDelay {
            power_on: Duration::from_millis(50),
            command: Duration::from_millis(2),
            character: Duration::from_micros(50),
        }
    }
}

impl LcdDelay for SleepDelay {
    fn wait(&mut self, wait: Wait) {
        sleep(self.duration(wait));
    }
}

/// Doesn't wait at all. Only useful with a simulated port.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct NoDelay;

impl LcdDelay for NoDelay {
    fn wait(&mut self, _wait: Wait) {}
}
