pub mod delay;
pub mod gpiod;
pub mod lcd;
pub mod raw;
pub mod sim;

use bitvec::vec::BitVec;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::AtomicU8;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("line already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("custom character slot {0} is out of range (0-7)")]
    SlotOutOfRange(u8),
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Identifies one GPIO port, a group of lines sharing a register block.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum PortId {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl PortId {
    /// Index of the port, `A` being 0.
    pub fn index(self) -> u32 {
        match self {
            PortId::A => 0,
            PortId::B => 1,
            PortId::C => 2,
            PortId::D => 3,
            PortId::E => 4,
            PortId::F => 5,
        }
    }
}

impl Display for PortId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GPIO{:?}", self)
    }
}

/// Specifies the bias of the GPIO lines.
///
/// You can use this to enable pull-up or pull-down resistors.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpioBias {
    #[default] None,
    PullUp,
    PullDown,
}

/// Keeps track of which lines of a port are owned by someone.
pub struct LineClaims {
    used_lines: BitVec<AtomicU8>,
}

impl LineClaims {
    pub fn new(line_count: usize) -> Self {
        LineClaims {
            used_lines: BitVec::repeat(false, line_count),
        }
    }

    pub fn line_count(&self) -> usize {
        self.used_lines.len()
    }

    /// Marks every line in `mask` as used.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the mask names a line the port doesn't have.
    /// - `GpioError::AlreadyInUse` if any of the lines is already claimed. Nothing is claimed then.
    pub fn claim(&self, mask: u32) -> GpioResult<()> {
        let lines = mask_lines(mask);

        if lines.clone().any(|line| line >= self.line_count()) {
            return Err(GpioError::InvalidArgument);
        }

        if lines.clone().any(|line| self.used_lines[line]) {
            return Err(GpioError::AlreadyInUse);
        }

        for line in lines {
            self.used_lines.set_aliased(line, true);
        }
        Ok(())
    }

    /// Marks every line in `mask` as free again. Lines outside the port are ignored.
    pub fn release(&self, mask: u32) {
        for line in mask_lines(mask).filter(|&line| line < self.line_count()) {
            self.used_lines.set_aliased(line, false);
        }
    }

    pub fn is_claimed(&self, line: usize) -> bool {
        line < self.line_count() && self.used_lines[line]
    }
}

impl Debug for LineClaims {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let claimed: Vec<usize> = (0..self.line_count())
            .filter(|&line| self.used_lines[line])
            .collect();
        write!(f, "LineClaims({:?})", claimed)
    }
}

/// Iterates over the indices of the set bits in `mask`, LSb first.
pub(crate) fn mask_lines(mask: u32) -> impl Iterator<Item = usize> + Clone {
    (0..32usize).filter(move |&line| mask & (1u32 << line) != 0)
}

/// A GPIO port, seen as a register of lines that can be set, cleared and read in bulk.
///
/// All methods take `&self`, as the underlying registers are shared hardware state. A single port
/// object may back both the data and the control lines of a display.
///
/// The port does no locking. Callers sharing a port between threads must serialize all access.
pub trait GpioPort: Debug {
    /// Identifier of the port.
    fn id(&self) -> PortId;

    /// Enables the clock of the port, so its registers can be accessed.
    ///
    /// Does nothing on backends where the clock is not under our control.
    fn enable_clock(&self) -> GpioResult<()> {
        Ok(())
    }

    /// Configures the lines in `mask` as digital outputs.
    ///
    /// This sets the direction, enables the digital function, disables any analog function and
    /// applies the given bias.
    fn configure_output(&self, mask: u32, bias: GpioBias) -> GpioResult<()>;

    /// Drives the lines in `mask` high. Other lines are left untouched.
    fn set_bits(&self, mask: u32) -> GpioResult<()>;

    /// Drives the lines in `mask` low. Other lines are left untouched.
    fn clear_bits(&self, mask: u32) -> GpioResult<()>;

    /// Reads the current levels of the port lines, LSb being line 0.
    fn read_bits(&self) -> GpioResult<u32>;

    /// Claims ownership of the lines in `mask`.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the mask names a line the port doesn't have.
    /// - `GpioError::AlreadyInUse` if any of the lines is already claimed.
    fn claim(&self, mask: u32) -> GpioResult<()>;

    /// Releases the lines in `mask`.
    fn release(&self, mask: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_are_exclusive() {
        let claims = LineClaims::new(8);

        assert_eq!(claims.claim(0b0000_1111), Ok(()));
        assert_eq!(claims.claim(0b0001_1000), Err(GpioError::AlreadyInUse));
        // A failed claim takes nothing
        assert!(!claims.is_claimed(4));

        assert_eq!(claims.claim(0b1111_0000), Ok(()));
        assert!((0..8).all(|line| claims.is_claimed(line)));
    }

    #[test]
    fn claims_outside_port_are_rejected() {
        let claims = LineClaims::new(8);
        assert_eq!(claims.claim(1 << 8), Err(GpioError::InvalidArgument));
        assert!(!claims.is_claimed(8));
    }

    #[test]
    fn released_lines_can_be_claimed_again() {
        let claims = LineClaims::new(8);
        claims.claim(0b0110).unwrap();
        claims.release(0b0010);

        assert!(!claims.is_claimed(1));
        assert!(claims.is_claimed(2));
        assert_eq!(claims.claim(0b0010), Ok(()));
    }

    #[test]
    fn mask_lines_lists_set_bits() {
        let lines: Vec<usize> = mask_lines(0b1000_0000_0000_0000_0000_0000_0000_0101).collect();
        assert_eq!(lines, vec![0, 2, 31]);
    }

    #[test]
    fn io_errors_keep_their_kind() {
        let err: GpioError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert_eq!(err, GpioError::Io(std::io::ErrorKind::PermissionDenied));
    }
}
