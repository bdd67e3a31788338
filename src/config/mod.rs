pub mod settings;

pub use settings::{
    Config,
    CommandConfig,
    ConnectionConfig,
    Mode,
    ParityConfig,
    ReceiveConfig,
    StopBitsConfig,
    TransmitConfig,
};
