//! In-memory serial port for tests.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::connection::{PortIo, PortOpener};
use crate::config::settings::ConnectionConfig;
use crate::utils::error::SerialError;

#[derive(Default)]
struct MockState {
    written: Mutex<Vec<u8>>,
    incoming: Mutex<VecDeque<u8>>,
    write_delay: Mutex<Duration>,
    fail_writes: AtomicBool,
    write_limit: Mutex<Option<usize>>,
    fail_on_call: AtomicUsize,
    write_calls: AtomicUsize,
    fail_reads: AtomicBool,
    flushes: AtomicUsize,
    writes: AtomicUsize,
}

/// Cloning shares the same buffers, so a test keeps one clone for inspection.
#[derive(Clone, Default)]
pub struct MockPort {
    state: Arc<MockState>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.written.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.state.writes.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.state.flushes.load(Ordering::SeqCst)
    }

    pub fn push_incoming(&self, data: &[u8]) {
        self.state.incoming.lock().unwrap().extend(data.iter().copied());
    }

    pub fn set_write_delay(&self, delay: Duration) {
        *self.state.write_delay.lock().unwrap() = delay;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Caps how many bytes each write accepts; `Some(0)` reports nothing written.
    pub fn limit_writes(&self, limit: Option<usize>) {
        *self.state.write_limit.lock().unwrap() = limit;
    }

    /// Fails only the `call`-th write (1-based), counting the open probe.
    pub fn fail_write_call(&self, call: usize) {
        self.state.fail_on_call.store(call, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.fail_reads.store(fail, Ordering::SeqCst);
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        let mut incoming = self.state.incoming.lock().unwrap();
        if incoming.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "Operation timed out"));
        }
        let n = buf.len().min(incoming.len());
        for slot in buf.iter_mut().take(n) {
            *slot = incoming.pop_front().unwrap_or_default();
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let delay = *self.state.write_delay.lock().unwrap();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let call = self.state.write_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.state.fail_writes.load(Ordering::SeqCst)
            || call == self.state.fail_on_call.load(Ordering::SeqCst)
        {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        self.state.writes.fetch_add(1, Ordering::SeqCst);
        let n = match *self.state.write_limit.lock().unwrap() {
            Some(limit) => buf.len().min(limit),
            None => buf.len(),
        };
        self.state.written.lock().unwrap().extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl PortIo for MockPort {
    fn available(&self) -> io::Result<u32> {
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        Ok(self.state.incoming.lock().unwrap().len() as u32)
    }
}

/// Hands out clones of one `MockPort`.
pub struct MockOpener {
    port: MockPort,
    denied: bool,
    unavailable: AtomicBool,
    opens: AtomicUsize,
}

impl MockOpener {
    pub fn new(port: MockPort) -> Self {
        Self {
            port,
            denied: false,
            unavailable: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
        }
    }

    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::new(MockPort::new())
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl PortOpener for MockOpener {
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn PortIo>, SerialError> {
        if self.denied {
            return Err(SerialError::PermissionDenied(config.port_name.clone()));
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SerialError::DeviceError("No such file or directory".to_string()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.port.clone()))
    }

    fn is_available(&self, _config: &ConnectionConfig) -> bool {
        !self.denied && !self.unavailable.load(Ordering::SeqCst)
    }
}
