use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Longest stretch a loop sleeps before looking at its stop signal again.
const STOP_CHECK_SLICE: Duration = Duration::from_millis(20);

/// Owner side of a loop's cancellation channel.
pub struct StopHandle(watch::Sender<bool>);

/// Loop side. Also reads as stopped once the `StopHandle` is gone.
#[derive(Clone)]
pub struct StopSignal(watch::Receiver<bool>);

pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(tx), StopSignal(rx))
}

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow() || self.0.has_changed().is_err()
    }

    /// Blocking sleep that wakes early on stop. Returns `true` when stopped.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_stopped() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep((deadline - now).min(STOP_CHECK_SLICE));
        }
    }
}
