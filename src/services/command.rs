use log::info;
use std::time::Duration;

use crate::serial::{CommandPayload, Connection};
use crate::utils::error::SerialError;

/// What to do with the port once the command is out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    pub keep_open: bool,
    pub close_delay: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            keep_open: false,
            close_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    KeptOpen { bytes_written: usize },
    Closed { bytes_written: usize },
}

/// Writes the command once and flushes it.
pub fn write_command(connection: &mut Connection, payload: &CommandPayload) -> Result<usize, SerialError> {
    let bytes_written = connection.write(payload.as_bytes())?;
    connection.flush()?;

    info!(
        "Sent command: '{}' → bytes {:?} ({} bytes)",
        payload.text(),
        payload.as_bytes(),
        bytes_written
    );
    Ok(bytes_written)
}
