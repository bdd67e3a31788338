use log::{info, warn};
use std::time::Duration;
use tokio::sync::watch;

use super::signal::StopSignal;
use crate::serial::{Connection, TransmitPayload, Weight};
use crate::utils::error::SerialError;

/// Writes the current weight payload every `interval` until stopped.
///
/// The weight is re-read on every tick, so edits through the channel show up
/// in the next payload. Returns the number of payloads that went out whole;
/// any transport error ends the loop.
pub fn run_transmit(
    connection: &mut Connection,
    weight: &watch::Receiver<Weight>,
    stop: &StopSignal,
    interval: Duration,
) -> Result<u64, SerialError> {
    let mut sent = 0u64;

    while !stop.is_stopped() {
        let payload = TransmitPayload::new(*weight.borrow());

        let bytes_written = connection.write(payload.as_bytes())?;
        connection.flush()?;

        if bytes_written == 0 {
            warn!("No bytes written - possible serial issue");
        } else if bytes_written < payload.as_bytes().len() {
            warn!(
                "Short write: '{}' only {} of {} bytes sent",
                payload,
                bytes_written,
                payload.as_bytes().len()
            );
        } else {
            info!("Sent: '{}' ({} bytes)", payload, bytes_written);
            sent += 1;
        }

        if stop.sleep(interval) {
            break;
        }
    }

    Ok(sent)
}
