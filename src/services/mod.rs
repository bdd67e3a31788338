pub mod command;
pub mod receive;
pub mod session;
pub mod signal;
pub mod transmit;

pub use command::{CommandOutcome, DispatchOptions};
pub use session::{LoopKind, LoopState, Session, SessionOptions, StopOutcome};
