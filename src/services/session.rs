use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use super::command::{self, CommandOutcome, DispatchOptions};
use super::receive::run_receive;
use super::signal::{stop_channel, StopHandle};
use super::transmit::run_transmit;
use crate::config::{Config, ConnectionConfig};
use crate::serial::{CommandPayload, Connection, PortOpener, Weight};
use crate::utils::error::SerialError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub stop_timeout: Duration,
    pub transmit_interval: Duration,
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(3),
            transmit_interval: Duration::from_millis(200),
            poll_interval: Duration::from_millis(100),
            reconnect_delay: Duration::from_millis(500),
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stop_timeout: config.stop_timeout(),
            transmit_interval: config.transmit_interval(),
            poll_interval: config.poll_interval(),
            reconnect_delay: config.reconnect_delay(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    Transmit,
    Receive,
}

impl LoopKind {
    pub fn name(&self) -> &'static str {
        match self {
            LoopKind::Transmit => "transmit",
            LoopKind::Receive => "receive",
        }
    }

    fn thread_name(&self) -> &'static str {
        match self {
            LoopKind::Transmit => "Transmission",
            LoopKind::Receive => "Reception",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running(LoopKind),
    /// The loop ended by itself (transport error); not yet collected by `stop`.
    Stopped(LoopKind),
}

#[derive(Debug)]
pub enum StopOutcome {
    Idle,
    /// Joined in time, with the loop's own result (payloads sent / lines received).
    Stopped(Result<u64, SerialError>),
    /// The worker missed the join timeout and was left to wind down on its own.
    TimedOut,
}

struct Worker {
    kind: LoopKind,
    stop: StopHandle,
    handle: JoinHandle<Result<u64, SerialError>>,
}

/// One serial port, at most one running loop.
///
/// The connection is owned either by the session (idle or kept open after a
/// command) or by the running worker, never both. Must be used from inside a
/// tokio runtime.
pub struct Session {
    opener: Arc<dyn PortOpener>,
    config: ConnectionConfig,
    options: SessionOptions,
    connection: Option<Connection>,
    worker: Option<Worker>,
    weight: watch::Sender<Weight>,
}

impl Session {
    pub fn new(
        opener: Arc<dyn PortOpener>,
        config: ConnectionConfig,
        options: SessionOptions,
        weight: Weight,
    ) -> Self {
        let (weight, _) = watch::channel(weight);
        Self {
            opener,
            config,
            options,
            connection: None,
            worker: None,
            weight,
        }
    }

    pub fn port_name(&self) -> &str {
        &self.config.port_name
    }

    pub fn state(&self) -> LoopState {
        match &self.worker {
            None => LoopState::Idle,
            Some(worker) if worker.handle.is_finished() => LoopState::Stopped(worker.kind),
            Some(worker) => LoopState::Running(worker.kind),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().map_or(false, Connection::is_open)
            || matches!(self.state(), LoopState::Running(_))
    }

    pub fn weight(&self) -> Weight {
        *self.weight.borrow()
    }

    /// Live edit; a running transmit loop picks it up on its next tick.
    pub fn set_weight(&self, weight: Weight) {
        self.weight.send_replace(weight);
        info!("⚖️  Base weight set to {}", weight);
    }

    /// Opens the port unless it is already open.
    pub fn connect(&mut self) -> Result<(), SerialError> {
        self.ensure_idle()?;
        if self.connection.as_ref().map_or(false, Connection::is_open) {
            return Ok(());
        }

        if !self.opener.is_available(&self.config) {
            let err = SerialError::PortUnavailable(self.config.port_name.clone());
            error!("Port {} is unavailable", self.config.port_name);
            return Err(err);
        }

        let connection = Connection::open(self.opener.as_ref(), &self.config)?;
        self.connection = Some(connection);
        Ok(())
    }

    pub fn start_transmit(&mut self) -> Result<(), SerialError> {
        let mut connection = self.take_connection()?;
        let weight = self.weight.subscribe();
        let interval = self.options.transmit_interval;
        let (stop, signal) = stop_channel();

        let handle = tokio::task::spawn_blocking(move || {
            let result = run_transmit(&mut connection, &weight, &signal, interval);
            finish_loop(&mut connection, result)
        });

        self.worker = Some(Worker {
            kind: LoopKind::Transmit,
            stop,
            handle,
        });
        info!("Transmission started.");
        Ok(())
    }

    pub fn start_receive(&mut self) -> Result<(), SerialError> {
        let mut connection = self.take_connection()?;
        let interval = self.options.poll_interval;
        let (stop, signal) = stop_channel();

        let handle = tokio::task::spawn_blocking(move || {
            let result = run_receive(&mut connection, &signal, interval);
            finish_loop(&mut connection, result)
        });

        self.worker = Some(Worker {
            kind: LoopKind::Receive,
            stop,
            handle,
        });
        info!("Reception started.");
        Ok(())
    }

    /// Sends one command, then keeps the port or closes it after the delay.
    /// A failed send still closes the port before the error is returned.
    pub async fn send_command(
        &mut self,
        payload: &CommandPayload,
        options: DispatchOptions,
    ) -> Result<CommandOutcome, SerialError> {
        let mut connection = self.take_connection()?;

        match command::write_command(&mut connection, payload) {
            Ok(bytes_written) if options.keep_open => {
                info!("Port kept open as requested.");
                self.connection = Some(connection);
                Ok(CommandOutcome::KeptOpen { bytes_written })
            }
            Ok(bytes_written) => {
                sleep(options.close_delay).await;
                connection.close();
                info!("Command sent and port closed after delay.");
                Ok(CommandOutcome::Closed { bytes_written })
            }
            Err(e) => {
                error!("Failed to send command: {}", e);
                connection.close();
                Err(e)
            }
        }
    }

    /// Stops the running loop (if any) and closes the port.
    pub async fn stop(&mut self) -> StopOutcome {
        let outcome = self.halt_worker().await;
        self.close_connection();
        info!("Transmission/reception stopped by user.");
        outcome
    }

    /// Returns `false` when there was nothing to disconnect.
    pub async fn disconnect(&mut self) -> bool {
        if !self.is_connected() {
            info!("Port is already closed.");
            self.halt_worker().await;
            return false;
        }

        self.halt_worker().await;
        self.close_connection();
        info!("Manually disconnected from serial port.");
        true
    }

    /// Closes whatever is open, waits the reconnect delay and opens again.
    pub async fn reconnect(&mut self) -> Result<(), SerialError> {
        self.halt_worker().await;
        self.close_connection();
        sleep(self.options.reconnect_delay).await;

        match Connection::open(self.opener.as_ref(), &self.config) {
            Ok(connection) => {
                self.connection = Some(connection);
                info!("Successfully reconnected to serial port.");
                Ok(())
            }
            Err(e) => {
                warn!("Reconnection failed. Please check port availability.");
                Err(e)
            }
        }
    }

    async fn halt_worker(&mut self) -> StopOutcome {
        let Some(mut worker) = self.worker.take() else {
            return StopOutcome::Idle;
        };

        worker.stop.stop();
        match timeout(self.options.stop_timeout, &mut worker.handle).await {
            Ok(Ok(result)) => StopOutcome::Stopped(result),
            Ok(Err(join_error)) => {
                error!("{} thread failed: {}", worker.kind.thread_name(), join_error);
                StopOutcome::Stopped(Err(SerialError::DeviceError(format!(
                    "{} thread failed: {}",
                    worker.kind.thread_name(),
                    join_error
                ))))
            }
            Err(_) => {
                // The worker still owns the connection and closes it when it exits
                warn!("{} thread did not stop gracefully.", worker.kind.thread_name());
                StopOutcome::TimedOut
            }
        }
    }

    fn close_connection(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
    }

    fn ensure_idle(&mut self) -> Result<(), SerialError> {
        match self.state() {
            LoopState::Running(kind) => Err(SerialError::Busy(kind.name())),
            LoopState::Stopped(_) => {
                // Already closed its connection on the way out
                self.worker = None;
                Ok(())
            }
            LoopState::Idle => Ok(()),
        }
    }

    fn take_connection(&mut self) -> Result<Connection, SerialError> {
        self.connect()?;
        self.connection.take().ok_or(SerialError::NotConnected)
    }
}

fn finish_loop(connection: &mut Connection, result: Result<u64, SerialError>) -> Result<u64, SerialError> {
    if let Err(e) = &result {
        error!("{}", e);
    }
    connection.close();
    result
}
