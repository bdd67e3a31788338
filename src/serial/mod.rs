pub mod connection;
pub mod payload;
#[cfg(test)]
pub mod mock;

pub use connection::{Connection, PortIo, PortOpener, SystemPorts};
pub use payload::{decode_line, CommandPayload, DecodedLine, TransmitPayload, Weight, COMMAND_LIST};
