pub mod error;
pub mod logging;

pub use error::SerialError;
pub use logging::{format_line, init_logging, level_label};
