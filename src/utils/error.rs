use std::num::ParseIntError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SerialError {
    #[error("Port {0} is unavailable")]
    PortUnavailable(String),

    #[error("Port '{0}' is in use by another program. Please close any other applications using this port.")]
    PermissionDenied(String),

    #[error("Serial error: {0}")]
    DeviceError(String),

    #[error("Invalid input: {0}")]
    FormatError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Port is not open")]
    NotConnected,

    #[error("A {0} loop is already running")]
    Busy(&'static str),
}

impl From<std::io::Error> for SerialError {
    fn from(err: std::io::Error) -> Self {
        SerialError::DeviceError(format!("IO error: {}", err))
    }
}

impl From<serialport::Error> for SerialError {
    fn from(err: serialport::Error) -> Self {
        SerialError::DeviceError(err.description)
    }
}

impl From<ParseIntError> for SerialError {
    fn from(err: ParseIntError) -> Self {
        SerialError::FormatError(format!("Please enter valid numbers for all numeric fields ({})", err))
    }
}

impl From<toml::de::Error> for SerialError {
    fn from(err: toml::de::Error) -> Self {
        SerialError::ConfigError(format!("TOML parse error: {}", err))
    }
}

impl From<toml::ser::Error> for SerialError {
    fn from(err: toml::ser::Error) -> Self {
        SerialError::ConfigError(format!("TOML write error: {}", err))
    }
}
