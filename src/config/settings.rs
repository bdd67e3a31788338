use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::serial::payload::{CommandPayload, Weight, COMMAND_LIST};
use crate::utils::error::SerialError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Connection settings
    pub serial_port: String,
    pub baud_rate: u32,
    pub parity: ParityConfig,
    pub data_bits: u8,
    pub stop_bits: StopBitsConfig,
    pub timeout_ms: u64,

    // Session settings
    pub stop_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
    pub log_file: String,
    pub mode: Mode,

    // Per-mode settings
    pub transmit: TransmitConfig,
    pub receive: ReceiveConfig,
    pub command: CommandConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmitConfig {
    pub base_weight: u32,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveConfig {
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub selected: String,
    pub custom: String,
    pub delay_ms: u64,
    pub keep_open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityConfig {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBitsConfig {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Transmit,
    Receive,
    Command,
}

/// Line parameters for one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub parity: ParityConfig,
    pub data_bits: u8,
    pub stop_bits: StopBitsConfig,
    pub timeout: Duration,
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self {
            base_weight: 5555,
            interval_ms: 200,
        }
    }
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 100 }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            selected: COMMAND_LIST[0].to_string(),
            custom: String::new(),
            delay_ms: 1000,
            keep_open: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let serial_port = if cfg!(target_os = "windows") {
            "COM4"
        } else if cfg!(target_os = "macos") {
            "/dev/tty.usbserial-0001"
        } else {
            "/dev/ttyUSB0"
        };

        Self {
            serial_port: serial_port.to_string(),
            baud_rate: 9600,
            parity: ParityConfig::None,
            data_bits: 8,
            stop_bits: StopBitsConfig::One,
            timeout_ms: 1000,

            stop_timeout_ms: 3000,
            reconnect_delay_ms: 500,
            log_file: "serial_transmission.log".to_string(),
            mode: Mode::Transmit,

            transmit: TransmitConfig::default(),
            receive: ReceiveConfig::default(),
            command: CommandConfig::default(),
        }
    }
}

impl FromStr for ParityConfig {
    type Err = SerialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(ParityConfig::None),
            "even" | "e" => Ok(ParityConfig::Even),
            "odd" | "o" => Ok(ParityConfig::Odd),
            other => Err(SerialError::FormatError(format!(
                "Unknown parity '{}', expected none, even or odd",
                other
            ))),
        }
    }
}

impl FromStr for StopBitsConfig {
    type Err = SerialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "one" | "1" => Ok(StopBitsConfig::One),
            "two" | "2" => Ok(StopBitsConfig::Two),
            other => Err(SerialError::FormatError(format!(
                "Unknown stop bits '{}', expected one or two",
                other
            ))),
        }
    }
}

impl FromStr for Mode {
    type Err = SerialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transmit" => Ok(Mode::Transmit),
            "receive" => Ok(Mode::Receive),
            "command" => Ok(Mode::Command),
            other => Err(SerialError::FormatError(format!("Unknown mode '{}'", other))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Transmit => "transmit",
            Mode::Receive => "receive",
            Mode::Command => "command",
        };
        f.write_str(name)
    }
}

impl Mode {
    /// Hint shown before a mode starts, naming the indicator setup it expects.
    pub fn note(&self) -> &'static str {
        match self {
            Mode::Transmit => "Note: Connect to Big Display to transmit a sample Base Weight",
            Mode::Receive => {
                "Note: Connect to Indicator with COM Assignment either Demand or Continuous Output"
            }
            Mode::Command => {
                "Note: Connect to Indicator with COM Assignment as Demand to send an ascii command to indicator"
            }
        }
    }
}

impl Config {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, SerialError> {
        let mut config = match matches.get_one::<String>("config") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        // Override with command line arguments
        if let Some(port) = matches.get_one::<String>("port") {
            config.serial_port = port.clone();
        }
        if let Some(baud) = matches.get_one::<String>("baud") {
            config.baud_rate = baud.parse()?;
        }
        if let Some(parity) = matches.get_one::<String>("parity") {
            config.parity = parity.parse()?;
        }
        if let Some(data_bits) = matches.get_one::<String>("data-bits") {
            config.data_bits = data_bits.parse()?;
        }
        if let Some(stop_bits) = matches.get_one::<String>("stop-bits") {
            config.stop_bits = stop_bits.parse()?;
        }
        if let Some(timeout) = matches.get_one::<String>("timeout-ms") {
            config.timeout_ms = timeout.parse()?;
        }
        if let Some(log_file) = matches.get_one::<String>("log-file") {
            config.log_file = log_file.clone();
        }

        match matches.subcommand() {
            Some(("transmit", sub)) => {
                config.mode = Mode::Transmit;
                if let Some(weight) = sub.get_one::<String>("weight") {
                    config.transmit.base_weight = weight.parse::<Weight>()?.value();
                }
                if let Some(interval) = sub.get_one::<String>("interval-ms") {
                    config.transmit.interval_ms = interval.parse()?;
                }
            }
            Some(("receive", sub)) => {
                config.mode = Mode::Receive;
                if let Some(poll) = sub.get_one::<String>("poll-ms") {
                    config.receive.poll_interval_ms = poll.parse()?;
                }
            }
            Some(("command", sub)) => {
                config.mode = Mode::Command;
                if let Some(selected) = sub.get_one::<String>("name") {
                    config.command.selected = selected.clone();
                }
                if let Some(custom) = sub.get_one::<String>("custom") {
                    config.command.custom = custom.clone();
                }
                if let Some(delay) = sub.get_one::<String>("delay-ms") {
                    config.command.delay_ms = delay.parse()?;
                }
                if sub.get_flag("keep-open") {
                    config.command.keep_open = true;
                }
            }
            _ => {}
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SerialError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SerialError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SerialError> {
        let path = path.as_ref();
        // Create directory if it doesn't exist
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SerialError> {
        self.connection()?;
        Weight::new(self.transmit.base_weight)?;
        if self.transmit.interval_ms == 0 || self.receive.poll_interval_ms == 0 {
            return Err(SerialError::ConfigError(
                "Loop intervals must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Validated line parameters, snapshotted for one connection attempt.
    pub fn connection(&self) -> Result<ConnectionConfig, SerialError> {
        if self.serial_port.trim().is_empty() {
            return Err(SerialError::ConfigError("Serial port is not set".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(SerialError::FormatError(
                "Baud rate must be greater than zero".to_string(),
            ));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(SerialError::FormatError(format!(
                "Data bits must be between 5 and 8, got {}",
                self.data_bits
            )));
        }

        Ok(ConnectionConfig {
            port_name: self.serial_port.trim().to_string(),
            baud_rate: self.baud_rate,
            parity: self.parity,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            timeout: Duration::from_millis(self.timeout_ms),
        })
    }

    pub fn weight(&self) -> Result<Weight, SerialError> {
        Weight::new(self.transmit.base_weight)
    }

    /// Custom text wins over the selected list entry when it is non-empty.
    pub fn command_payload(&self) -> Result<CommandPayload, SerialError> {
        CommandPayload::select(&self.command.selected, &self.command.custom)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn transmit_interval(&self) -> Duration {
        Duration::from_millis(self.transmit.interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.receive.poll_interval_ms)
    }

    pub fn command_delay(&self) -> Duration {
        Duration::from_millis(self.command.delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_indicator_setup() {
        let config = Config::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.parity, ParityConfig::None);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.stop_bits, StopBitsConfig::One);
        assert_eq!(config.transmit.base_weight, 5555);
        assert_eq!(config.command.selected, "IP");
        assert_eq!(config.command_delay(), Duration::from_millis(1000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_data_bits_out_of_range() {
        let mut config = Config::default();
        config.data_bits = 9;
        assert!(matches!(config.connection(), Err(SerialError::FormatError(_))));
        config.data_bits = 4;
        assert!(config.connection().is_err());
        config.data_bits = 5;
        assert_eq!(config.connection().unwrap().data_bits, 5);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            serial_port = "COM7"
            parity = "even"
            stop_bits = "two"

            [command]
            custom = "xp"
            keep_open = true
            "#,
        )
        .unwrap();

        assert_eq!(config.serial_port, "COM7");
        assert_eq!(config.parity, ParityConfig::Even);
        assert_eq!(config.stop_bits, StopBitsConfig::Two);
        assert_eq!(config.baud_rate, 9600);
        assert!(config.command.keep_open);
        assert_eq!(config.command.delay_ms, 1000);
        assert_eq!(config.command_payload().unwrap().as_bytes(), b"XP\r\n");
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("serial_tester_cfg_{}.toml", std::process::id()));
        let mut config = Config::default();
        config.serial_port = "/dev/ttyS3".to_string();
        config.mode = Mode::Receive;
        config.receive.poll_interval_ms = 50;

        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_weight_in_file_rejected() {
        let result: Result<Config, _> = toml::from_str("[transmit]\nbase_weight = 1000000\n");
        let config = result.unwrap();
        assert!(matches!(config.validate(), Err(SerialError::FormatError(_))));
    }

    #[test]
    fn test_parse_line_settings() {
        assert_eq!("Odd".parse::<ParityConfig>().unwrap(), ParityConfig::Odd);
        assert_eq!("2".parse::<StopBitsConfig>().unwrap(), StopBitsConfig::Two);
        assert_eq!("COMMAND".parse::<Mode>().unwrap(), Mode::Command);
        assert!("mark".parse::<ParityConfig>().is_err());
    }
}
