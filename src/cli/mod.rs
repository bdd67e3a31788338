pub mod commands;

use clap::{Arg, ArgAction, Command};

pub use commands::handle_subcommands;

pub fn build_cli() -> Command {
    Command::new("serial_port_tester")
        .version(crate::VERSION)
        .about("Exercise an RS-232 port: transmit a weight, receive lines or send an ASCII command")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
                .global(true),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Serial port, e.g. COM4 or /dev/ttyUSB0")
                .global(true),
        )
        .arg(
            Arg::new("baud")
                .short('b')
                .long("baud")
                .value_name("RATE")
                .help("Baud rate (300..115200)")
                .global(true),
        )
        .arg(
            Arg::new("parity")
                .long("parity")
                .value_name("PARITY")
                .help("none, even or odd")
                .global(true),
        )
        .arg(
            Arg::new("data-bits")
                .long("data-bits")
                .value_name("BITS")
                .help("Data bits, 5 to 8")
                .global(true),
        )
        .arg(
            Arg::new("stop-bits")
                .long("stop-bits")
                .value_name("BITS")
                .help("Stop bits, 1 or 2")
                .global(true),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .value_name("MS")
                .help("Read/write timeout in milliseconds")
                .global(true),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("FILE")
                .help("Append log lines to this file (empty to disable)")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("transmit")
                .about("Send the weight payload every interval (stdin: number = new weight, r = reconnect, q = stop)")
                .arg(
                    Arg::new("weight")
                        .short('w')
                        .long("weight")
                        .value_name("WEIGHT")
                        .help("Base weight, 0 to 999999"),
                )
                .arg(
                    Arg::new("interval-ms")
                        .long("interval-ms")
                        .value_name("MS")
                        .help("Milliseconds between payloads"),
                ),
        )
        .subcommand(
            Command::new("receive")
                .about("Log incoming lines (stdin: r = reconnect, q = stop)")
                .arg(
                    Arg::new("poll-ms")
                        .long("poll-ms")
                        .value_name("MS")
                        .help("Milliseconds between polls"),
                ),
        )
        .subcommand(
            Command::new("command")
                .about("Send one ASCII command, then close after a delay or keep the port open")
                .arg(
                    Arg::new("name")
                        .value_name("COMMAND")
                        .help("Command from the list (see `commands`)"),
                )
                .arg(
                    Arg::new("custom")
                        .long("custom")
                        .value_name("TEXT")
                        .help("Custom command text, overrides COMMAND"),
                )
                .arg(
                    Arg::new("delay-ms")
                        .short('d')
                        .long("delay-ms")
                        .value_name("MS")
                        .help("Delay before closing the port"),
                )
                .arg(
                    Arg::new("keep-open")
                        .short('k')
                        .long("keep-open")
                        .help("Keep the port open and send further commands read from stdin")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("commands").about("List the predefined indicator commands"))
        .subcommand(
            Command::new("write-config")
                .about("Save the effective configuration as TOML")
                .arg(Arg::new("file").value_name("FILE").required(true)),
        )
}
