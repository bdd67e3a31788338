//! Serial Port Tester Library
//!
//! Exercises a single RS-232 connection in three modes: periodic transmission
//! of a weight payload for big displays, logging of lines sent by an
//! indicator, and one-shot ASCII commands with an optional delayed disconnect.

pub mod cli;
pub mod config;
pub mod serial;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::{Config, ConnectionConfig, Mode};
pub use serial::{CommandPayload, Connection, PortIo, PortOpener, SystemPorts, TransmitPayload, Weight};
pub use services::{CommandOutcome, DispatchOptions, LoopState, Session, SessionOptions, StopOutcome};
pub use utils::error::SerialError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
