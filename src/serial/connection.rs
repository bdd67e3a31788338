use log::{error, info};
use serialport::SerialPort;
use std::io::{self, Read, Write};

use crate::config::settings::{ConnectionConfig, ParityConfig, StopBitsConfig};
use crate::utils::error::SerialError;

/// Longest line `read_line` collects before handing it back.
pub const MAX_LINE_LEN: usize = 4096;

/// Byte-level access the loops need from a serial handle.
pub trait PortIo: Read + Write + Send {
    /// Number of bytes waiting in the input buffer.
    fn available(&self) -> io::Result<u32>;
}

impl PortIo for Box<dyn SerialPort> {
    fn available(&self) -> io::Result<u32> {
        SerialPort::bytes_to_read(&**self).map_err(io::Error::from)
    }
}

pub trait PortOpener: Send + Sync {
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn PortIo>, SerialError>;

    /// Pre-open check: the port can be opened right now.
    fn is_available(&self, config: &ConnectionConfig) -> bool {
        self.open(config).is_ok()
    }
}

/// Opens real ports through `serialport`.
pub struct SystemPorts;

impl PortOpener for SystemPorts {
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn PortIo>, SerialError> {
        let serial_parity = match config.parity {
            ParityConfig::None => serialport::Parity::None,
            ParityConfig::Even => serialport::Parity::Even,
            ParityConfig::Odd => serialport::Parity::Odd,
        };
        let serial_stop_bits = match config.stop_bits {
            StopBitsConfig::One => serialport::StopBits::One,
            StopBitsConfig::Two => serialport::StopBits::Two,
        };
        let serial_data_bits = match config.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => {
                return Err(SerialError::FormatError(format!(
                    "Data bits must be between 5 and 8, got {}",
                    other
                )))
            }
        };

        let port = serialport::new(&config.port_name, config.baud_rate)
            .timeout(config.timeout)
            .data_bits(serial_data_bits)
            .stop_bits(serial_stop_bits)
            .parity(serial_parity)
            .open()
            .map_err(|e| open_error(&config.port_name, e))?;

        Ok(Box::new(port))
    }
}

/// Messages `serialport` attaches to `NoDevice` when the port exists but
/// another handle holds it: the TIOCEXCL lock on posix and
/// `ERROR_ACCESS_DENIED` on Windows.
const HELD_PORT_MESSAGES: [&str; 3] = ["exclusive lock", "access is denied", "resource busy"];

fn open_error(port_name: &str, err: serialport::Error) -> SerialError {
    let held = match err.kind() {
        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => true,
        serialport::ErrorKind::NoDevice => {
            let description = err.description.to_lowercase();
            HELD_PORT_MESSAGES.iter().any(|m| description.contains(m))
        }
        _ => false,
    };

    if held {
        SerialError::PermissionDenied(port_name.to_string())
    } else {
        SerialError::DeviceError(err.description)
    }
}

/// An open serial handle. Once closed, every I/O call fails with `NotConnected`.
pub struct Connection {
    port_name: String,
    port: Option<Box<dyn PortIo>>,
}

impl Connection {
    pub fn open(opener: &dyn PortOpener, config: &ConnectionConfig) -> Result<Self, SerialError> {
        info!(
            "🔌 Connecting to {} ({} baud, {:?} parity, {} data bits, {:?} stop bits)",
            config.port_name, config.baud_rate, config.parity, config.data_bits, config.stop_bits
        );

        let port = opener.open(config).map_err(|e| {
            error!("Failed to open {}: {}", config.port_name, e);
            e
        })?;
        let mut connection = Self::from_port(&config.port_name, port);

        // Liveness probe
        if let Err(e) = connection.write(b"").and_then(|_| connection.flush()) {
            connection.close();
            let err = SerialError::DeviceError(format!("Port test failed: {}", e));
            error!("{}", err);
            return Err(err);
        }

        info!("SUCCESS: Opened {} at {} baud", config.port_name, config.baud_rate);
        Ok(connection)
    }

    pub fn from_port(port_name: &str, port: Box<dyn PortIo>) -> Self {
        Self {
            port_name: port_name.to_string(),
            port: Some(port),
        }
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(port) = self.port.take() {
            drop(port);
            info!("Port {} closed successfully", self.port_name);
        }
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn PortIo>, SerialError> {
        self.port.as_mut().ok_or(SerialError::NotConnected)
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize, SerialError> {
        Ok(self.port_mut()?.write(data)?)
    }

    pub fn flush(&mut self) -> Result<(), SerialError> {
        Ok(self.port_mut()?.flush()?)
    }

    pub fn available(&self) -> Result<u32, SerialError> {
        let port = self.port.as_ref().ok_or(SerialError::NotConnected)?;
        Ok(port.available()?)
    }

    /// Reads up to and including `\n`. A read timeout ends the line early
    /// with whatever arrived so far.
    pub fn read_line(&mut self) -> Result<Vec<u8>, SerialError> {
        let port = self.port_mut()?;
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        while line.len() < MAX_LINE_LEN {
            match port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(line)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
