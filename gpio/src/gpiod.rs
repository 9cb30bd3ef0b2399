//! GPIO port over a Linux GPIO character device, using the gpiod library.
//!
//! A port is a window of up to 32 consecutive lines of the chip, line `line_base + n` being bit `n`.
//! Each output line is requested on its own when it gets configured.
use crate::{mask_lines, GpioBias, GpioPort, GpioResult, LineClaims, PortId};
use log::debug;
use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter};

pub struct GpiodPort {
    id: PortId,
    chip: gpiod::Chip,
    line_base: u32,
    claims: LineClaims,
    outputs: RefCell<Vec<GpiodOutputLine>>,
    // The bus is never read back, so levels are shadowed here
    level: Cell<u32>,
}

struct GpiodOutputLine {
    bit: u32,
    line: gpiod::Lines<gpiod::Output>,
}

impl GpiodPort {
    pub fn new(id: PortId, chip: gpiod::Chip, line_base: u32) -> Self {
        let n = window_len(chip.num_lines(), line_base);
        Self {
            id,
            chip,
            line_base,
            claims: LineClaims::new(n),
            outputs: RefCell::new(Vec::new()),
            level: Cell::new(0),
        }
    }

    fn drive(&self, mask: u32, high: bool) -> GpioResult<()> {
        for output in self.outputs.borrow().iter() {
            if mask & output.bit != 0 {
                output.line.set_values([high])?;
            }
        }
        Ok(())
    }
}

/// Lines of the chip a port starting at `line_base` can reach.
fn window_len(num_lines: u32, line_base: u32) -> usize {
    num_lines.saturating_sub(line_base).min(32) as usize
}

/// Port level after driving the lines of `mask` to `high`.
fn shadow(level: u32, mask: u32, high: bool) -> u32 {
    if high { level | mask } else { level & !mask }
}

/// Lines of `mask` not yet requested, given the bits already requested.
fn unrequested_lines(requested: u32, mask: u32) -> impl Iterator<Item = usize> {
    mask_lines(mask & !requested)
}

impl Debug for GpiodPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodPort({}, {}+{})", self.id, self.chip.name(), self.line_base)
    }
}

impl From<GpioBias> for gpiod::Bias {
    fn from(bias: GpioBias) -> Self {
        match bias {
            GpioBias::None => gpiod::Bias::Disable,
            GpioBias::PullUp => gpiod::Bias::PullUp,
            GpioBias::PullDown => gpiod::Bias::PullDown,
        }
    }
}

impl GpioPort for GpiodPort {
    fn id(&self) -> PortId {
        self.id
    }

    fn configure_output(&self, mask: u32, bias: GpioBias) -> GpioResult<()> {
        let mut outputs = self.outputs.borrow_mut();
        let requested_bits = outputs.iter().fold(0, |bits, output| bits | output.bit);
        for line in unrequested_lines(requested_bits, mask) {
            let bit = 1 << line;
            let requested = self.chip.request_lines(
                gpiod::Options::output([self.line_base + line as u32])
                    .consumer(env!("CARGO_PKG_NAME"))
                    .bias(bias.into()),
            )?;
            requested.set_values([self.level.get() & bit != 0])?;
            outputs.push(GpiodOutputLine { bit, line: requested });
        }

        debug!("{:?} lines {:032b} requested as outputs ({:?})", self, mask, bias);
        Ok(())
    }

    fn set_bits(&self, mask: u32) -> GpioResult<()> {
        self.level.set(shadow(self.level.get(), mask, true));
        self.drive(mask, true)
    }

    fn clear_bits(&self, mask: u32) -> GpioResult<()> {
        self.level.set(shadow(self.level.get(), mask, false));
        self.drive(mask, false)
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
