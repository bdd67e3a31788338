use anyhow::Result;
use log::{error, info, LevelFilter};
use std::path::Path;

use serial_port_tester::cli::{build_cli, handle_subcommands};
use serial_port_tester::utils::init_logging;
use serial_port_tester::{Config, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let config = Config::from_matches(&matches)?;

    let level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_file = (!config.log_file.is_empty()).then(|| Path::new(&config.log_file));
    init_logging(log_file, level)?;

    info!("🖥️  Serial Port Tester v{}", VERSION);
    info!(
        "⚙️  {} | {} baud | parity {:?} | {} data bits | stop bits {:?}",
        config.serial_port, config.baud_rate, config.parity, config.data_bits, config.stop_bits
    );

    match handle_subcommands(&matches, &config).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            build_cli().print_help()?;
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            Err(e)
        }
    }
}
