use log::{info, warn};
use std::time::Duration;

use super::signal::StopSignal;
use crate::serial::{decode_line, Connection, DecodedLine};
use crate::utils::error::SerialError;

/// Polls for incoming data every `interval` and logs one line per poll that
/// finds bytes waiting. Returns the number of lines logged.
pub fn run_receive(
    connection: &mut Connection,
    stop: &StopSignal,
    interval: Duration,
) -> Result<u64, SerialError> {
    let mut received = 0u64;

    while !stop.is_stopped() {
        if connection.available()? > 0 {
            let data = connection.read_line()?;
            if log_line(&data) {
                received += 1;
            }
        }

        if stop.sleep(interval) {
            break;
        }
    }

    Ok(received)
}

fn log_line(data: &[u8]) -> bool {
    match decode_line(data) {
        DecodedLine::Text(text) => {
            info!("Received: '{}' ({} bytes)", text, data.len());
            true
        }
        DecodedLine::Undecodable => {
            warn!(
                "Received raw: {} ({} bytes, no ASCII content)",
                hex::encode_upper(data),
                data.len()
            );
            true
        }
        DecodedLine::Blank => false,
    }
}
