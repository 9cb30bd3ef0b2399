use charlcd_gpio::lcd::hd44780::config::LcdConfig;
use charlcd_gpio::raw::RegisterBlocks;
use log::info;
use serde::{Deserialize, Serialize};
use std::env::var_os;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};

/// How the display lines are reached.
#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backend {
    /// Port registers mapped through `/dev/mem`. The physical addresses of the blocks have no
    /// default, since they depend on the SoC.
    Mem {
        data_blocks: RegisterBlocks,
        ctrl_blocks: RegisterBlocks,
    },
    /// Lines of a GPIO character device. Each port is a window of lines starting at its base.
    Gpiod {
        chip: String,
        data_line_base: u32,
        ctrl_line_base: u32,
    },
    /// No hardware; the received transfers are logged instead.
    #[default]
    Simulated,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub lcd: LcdConfig,
}

impl Config {
    pub fn path() -> PathBuf {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("charlcd.json"));
        Path::new(config_str).to_path_buf()
    }

    /// Loads the configuration file, or the defaults if there is none.
    pub fn load() -> eyre::Result<Self> {
        let config_path = Self::path();
        if config_path.exists() {
            info!("Loading configuration from {}", config_path.display());
            let file = std::fs::File::open(&config_path)?;
            Self::from_reader(std::io::BufReader::new(file))
        } else {
            info!("{} not found, using defaults", config_path.display());
            Ok(Config::default())
        }
    }

    pub fn from_reader(reader: impl Read) -> eyre::Result<Self> {
        let config: Config = serde_json::from_reader(reader)?;
        config.lcd.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charlcd_gpio::PortId;

    #[test]
    fn gpiod_backend_is_parsed() {
        let json = r#"{
            "backend": { "kind": "gpiod", "chip": "/dev/gpiochip0", "data_line_base": 16, "ctrl_line_base": 24 },
            "lcd": { "data_port": "A", "ctrl_port": "B" }
        }"#;
        let config = Config::from_reader(json.as_bytes()).unwrap();

        assert_eq!(
            config.backend,
            Backend::Gpiod {
                chip: "/dev/gpiochip0".into(),
                data_line_base: 16,
                ctrl_line_base: 24,
            }
        );
        assert_eq!(config.lcd.data_port, PortId::A);
        assert_eq!(config.lcd.width, 20);
    }

    #[test]
    fn mem_backend_needs_its_addresses() {
        let json = r#"{
            "backend": {
                "kind": "mem",
                "data_blocks": { "port": 1073770496, "sysctl": 1074782208 },
                "ctrl_blocks": { "port": 1073889280, "sysctl": 1074782208 }
            }
        }"#;
        let config = Config::from_reader(json.as_bytes()).unwrap();

        assert_eq!(
            config.backend,
            Backend::Mem {
                data_blocks: RegisterBlocks::tm4c123(PortId::D),
                ctrl_blocks: RegisterBlocks::tm4c123(PortId::E),
            }
        );
        assert!(Config::from_reader(r#"{ "backend": { "kind": "mem" } }"#.as_bytes()).is_err());
    }

    #[test]
    fn empty_file_means_simulated_defaults() {
        let config = Config::from_reader("{}".as_bytes()).unwrap();
        assert_eq!(config.backend, Backend::Simulated);
        assert_eq!(config.lcd, LcdConfig::default());
    }

    #[test]
    fn invalid_lcd_config_is_refused() {
        let json = r#"{ "lcd": { "height": 1 } }"#;
        assert!(Config::from_reader(json.as_bytes()).is_err());
    }
}
