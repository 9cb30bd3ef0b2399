//! In-memory GPIO port, recording every register operation.
//!
//! Several simulated ports can share one [Journal], which then holds the operations of all of
//! them in the order they happened. The [monitor](crate::lcd::hd44780::monitor) decodes such a
//! journal back into what a display would have received.

use crate::{GpioBias, GpioError, GpioPort, GpioResult, LineClaims, PortId};
use log::trace;
use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// What happened to a port.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PortOp {
    EnableClock,
    ConfigureOutput(u32, GpioBias),
    Set(u32),
    Clear(u32),
}

/// One recorded operation, with the line levels of the port right after it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PortEvent {
    pub port: PortId,
    pub op: PortOp,
    pub level: u32,
}

/// Shared, ordered record of port operations.
#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<PortEvent>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PortEvent> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn push(&self, event: PortEvent) {
        self.0.borrow_mut().push(event);
    }
}

impl Debug for Journal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Journal({} events)", self.len())
    }
}

pub struct SimulatedPort {
    id: PortId,
    level: Cell<u32>,
    outputs: Cell<u32>,
    pull_ups: Cell<u32>,
    pull_downs: Cell<u32>,
    clock_enabled: Cell<bool>,
    claims: LineClaims,
    journal: Journal,
}

impl SimulatedPort {
    const LINE_COUNT: usize = 8;

    pub fn new(id: PortId) -> Self {
        Self::with_journal(id, Journal::new())
    }

    /// Creates a port recording into an existing journal.
    pub fn with_journal(id: PortId, journal: Journal) -> Self {
        SimulatedPort {
            id,
            level: Cell::new(0),
            outputs: Cell::new(0),
            pull_ups: Cell::new(0),
            pull_downs: Cell::new(0),
            clock_enabled: Cell::new(false),
            claims: LineClaims::new(Self::LINE_COUNT),
            journal,
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn level(&self) -> u32 {
        self.level.get()
    }

    /// Lines configured as outputs.
    pub fn outputs(&self) -> u32 {
        self.outputs.get()
    }

    pub fn pull_ups(&self) -> u32 {
        self.pull_ups.get()
    }

    pub fn pull_downs(&self) -> u32 {
        self.pull_downs.get()
    }

    pub fn clock_enabled(&self) -> bool {
        self.clock_enabled.get()
    }

    pub fn is_claimed(&self, line: usize) -> bool {
        self.claims.is_claimed(line)
    }

    fn check_mask(mask: u32) -> GpioResult<()> {
        if mask >> Self::LINE_COUNT != 0 {
            return Err(GpioError::InvalidArgument);
        }
        Ok(())
    }

    fn record(&self, op: PortOp) {
        trace!("{} {:?} -> {:08b}", self.id, op, self.level.get());
        self.journal.push(PortEvent {
            port: self.id,
            op,
            level: self.level.get(),
        });
    }
}

impl Debug for SimulatedPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimulatedPort({}, {:08b})", self.id, self.level.get())
    }
}

impl GpioPort for SimulatedPort {
    fn id(&self) -> PortId {
        self.id
    }

    fn enable_clock(&self) -> GpioResult<()> {
        self.clock_enabled.set(true);
        self.record(PortOp::EnableClock);
        Ok(())
    }

    fn configure_output(&self, mask: u32, bias: GpioBias) -> GpioResult<()> {
        Self::check_mask(mask)?;
        self.outputs.set(self.outputs.get() | mask);
        match bias {
            GpioBias::None => {}
            GpioBias::PullUp => self.pull_ups.set(self.pull_ups.get() | mask),
            GpioBias::PullDown => self.pull_downs.set(self.pull_downs.get() | mask),
        }
        self.record(PortOp::ConfigureOutput(mask, bias));
        Ok(())
    }

    fn set_bits(&self, mask: u32) -> GpioResult<()> {
        Self::check_mask(mask)?;
        self.level.set(self.level.get() | mask);
        self.record(PortOp::Set(mask));
        Ok(())
    }

    fn clear_bits(&self, mask: u32) -> GpioResult<()> {
        Self::check_mask(mask)?;
        self.level.set(self.level.get() & !mask);
        self.record(PortOp::Clear(mask));
        Ok(())
    }

    fn read_bits(&self) -> GpioResult<u32> {
        Ok(self.level.get())
    }

    fn claim(&self, mask: u32) -> GpioResult<()> {
        self.claims.claim(mask)
    }

    fn release(&self, mask: u32) {
        self.claims.release(mask)
    }
}
