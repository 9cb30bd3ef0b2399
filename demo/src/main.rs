mod config;

use crate::config::{Backend, Config};
use charlcd_gpio::delay::{LcdDelay, NoDelay, SleepDelay};
use charlcd_gpio::gpiod::GpiodPort;
use charlcd_gpio::lcd::hd44780::config::LcdConfig;
use charlcd_gpio::lcd::hd44780::driver::{GpioHD44780Driver, HD44780Driver};
use charlcd_gpio::lcd::hd44780::monitor::transfers;
use charlcd_gpio::raw::RawGpioPort;
use charlcd_gpio::sim::{Journal, SimulatedPort};
use charlcd_gpio::{GpioPort, GpioResult, PortId};
use dotenv::dotenv;
use log::{debug, info, warn};
use sysinfo::System;

/// Checkerboard glyph.
const PATTERN: [u8; 8] = [0x15, 0x0A, 0x15, 0x0A, 0x15, 0x0A, 0x15, 0x0A];

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "Hostname {}, architecture {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR),
        System::cpu_arch(),
    );

    let config = Config::load()?;
    let lcd = &config.lcd;

    info!(
        "LCD {}x{} @ Data: {} {:?}, Ctrl: {} RS {} RW {} EN {}",
        lcd.width,
        lcd.height,
        lcd.data_port,
        lcd.pins().data(),
        lcd.ctrl_port,
        lcd.rs_pin,
        lcd.rw_pin,
        lcd.en_pin,
    );
    if lcd.width != 20 || lcd.height != 4 {
        warn!("The demo is laid out for a 20x4 display");
    }

    match &config.backend {
        Backend::Mem {
            data_blocks,
            ctrl_blocks,
        } => {
            debug!("Mapping port registers...");
            let open = |id: PortId| -> GpioResult<RawGpioPort> {
                let blocks = if id == lcd.data_port {
                    *data_blocks
                } else {
                    *ctrl_blocks
                };
                RawGpioPort::new_mem(id, blocks)
            };
            with_ports(lcd, open, |data, ctrl| {
                run(lcd, data, ctrl, SleepDelay::default())
            })?;
        }
        Backend::Gpiod {
            chip,
            data_line_base,
            ctrl_line_base,
        } => {
            debug!("Opening {}...", chip);
            let open = |id: PortId| -> GpioResult<GpiodPort> {
                let line_base = if id == lcd.data_port {
                    *data_line_base
                } else {
                    *ctrl_line_base
                };
                Ok(GpiodPort::new(id, gpiod::Chip::new(chip)?, line_base))
            };
            with_ports(lcd, open, |data, ctrl| {
                run(lcd, data, ctrl, SleepDelay::default())
            })?;
        }
        Backend::Simulated => {
            let journal = Journal::new();
            let open = |id: PortId| -> GpioResult<SimulatedPort> {
                Ok(SimulatedPort::with_journal(id, journal.clone()))
            };
            with_ports(lcd, open, |data, ctrl| run(lcd, data, ctrl, NoDelay))?;

            info!("The display received:");
            for transfer in transfers(&journal.events(), lcd) {
                info!("  {}", transfer);
            }
        }
    }

    info!("Done.");
    Ok(())
}

/// Opens the ports of the display, once if data and control share a port.
fn with_ports<P: GpioPort>(
    config: &LcdConfig,
    open: impl Fn(PortId) -> GpioResult<P>,
    f: impl FnOnce(&dyn GpioPort, &dyn GpioPort) -> eyre::Result<()>,
) -> eyre::Result<()> {
    let data_port = open(config.data_port)?;
    debug!("{:?} opened.", data_port);
    if config.ctrl_port == config.data_port {
        return f(&data_port, &data_port);
    }

    let ctrl_port = open(config.ctrl_port)?;
    debug!("{:?} opened.", ctrl_port);
    f(&data_port, &ctrl_port)
}

fn run<D: LcdDelay>(
    config: &LcdConfig,
    data_port: &dyn GpioPort,
    ctrl_port: &dyn GpioPort,
    delay: D,
) -> eyre::Result<()> {
    let mut lcd = GpioHD44780Driver::new(config.clone(), data_port, ctrl_port, delay)?;
    show_demo(&mut lcd)?;
    Ok(())
}

/// Frames a greeting between two rows of the custom glyph.
fn show_demo(lcd: &mut dyn HD44780Driver) -> GpioResult<()> {
    let line = vec![0u8; lcd.geometry().width as usize];

    lcd.init()?;
    lcd.modify_character(&PATTERN, 0)?;

    lcd.set_cursor(0, 0)?;
    lcd.print(&line)?;
    lcd.set_cursor(1, 3)?;
    lcd.print(b"Hello, world!")?;
    lcd.set_cursor(2, 2)?;
    lcd.print(b"LCD Driver Demo")?;
    lcd.set_cursor(3, 0)?;
    lcd.print(&line)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use charlcd_gpio::lcd::hd44780::monitor::Transfer;

    #[test]
    fn demo_draws_the_expected_screen() {
        let config = LcdConfig::default();
        let journal = Journal::new();
        let data = SimulatedPort::with_journal(config.data_port, journal.clone());
        let ctrl = SimulatedPort::with_journal(config.ctrl_port, journal.clone());

        run(&config, &data, &ctrl, NoDelay).unwrap();

        let received = transfers(&journal.events(), &config);
        // 4 setup commands, 16 for the glyph, then 4 cursor moves and 20 + 13 + 15 + 20 characters
        assert_eq!(received.len(), 4 + 16 + 4 + 68);
        assert_eq!(received[20], Transfer::Command(0x80));
        assert_eq!(received[41], Transfer::Command(0x80 | 0x43));
        assert_eq!(received[42], Transfer::Character(b'H'));
    }
}
