use anyhow::Result;
use clap::ArgMatches;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::config::{Config, Mode};
use crate::serial::{CommandPayload, PortOpener, SystemPorts, Weight, COMMAND_LIST};
use crate::services::{CommandOutcome, DispatchOptions, LoopState, Session, SessionOptions, StopOutcome};

/// How often the control loop checks whether the worker died on its own.
const WATCH_INTERVAL: Duration = Duration::from_millis(250);

pub async fn handle_subcommands(matches: &ArgMatches, config: &Config) -> Result<bool> {
    match matches.subcommand() {
        Some(("commands", _)) => {
            println!("📋 Predefined commands (sent uppercased, CR+LF terminated):");
            for command in COMMAND_LIST {
                println!("   {}", command);
            }
            Ok(true)
        }
        Some(("write-config", sub)) => {
            let path = sub
                .get_one::<String>("file")
                .ok_or_else(|| anyhow::anyhow!("missing FILE"))?;
            config.save_to_file(path)?;
            println!("✅ Configuration written to {}", path);
            Ok(true)
        }
        Some(("transmit", _)) | Some(("receive", _)) | Some(("command", _)) => {
            let opener: Arc<dyn PortOpener> = Arc::new(SystemPorts);
            let stdin = BufReader::new(tokio::io::stdin());
            run_mode(opener, config, stdin).await?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Runs `config.mode` against a port from `opener`, taking control lines from `input`.
pub async fn run_mode<R>(opener: Arc<dyn PortOpener>, config: &Config, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut session = Session::new(
        opener,
        config.connection()?,
        SessionOptions::from_config(config),
        config.weight()?,
    );

    info!("📡 {} mode on {}", config.mode, session.port_name());
    info!("{}", config.mode.note());
    match config.mode {
        Mode::Transmit | Mode::Receive => drive_loop(&mut session, config.mode, input).await,
        Mode::Command => drive_command(&mut session, config, input).await,
    }
}

fn start_loop(session: &mut Session, mode: Mode) -> Result<()> {
    match mode {
        Mode::Transmit => session.start_transmit()?,
        Mode::Receive => session.start_receive()?,
        Mode::Command => anyhow::bail!("command mode has no background loop"),
    }
    Ok(())
}

async fn drive_loop<R>(session: &mut Session, mode: Mode, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    start_loop(session, mode)?;

    let mut lines = input.lines();
    let mut input_open = true;
    let mut watch = tokio::time::interval(WATCH_INTERVAL);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Ctrl-C received");
                break;
            }
            line = lines.next_line(), if input_open => {
                let Some(line) = line? else {
                    input_open = false;
                    continue;
                };
                match line.trim() {
                    "" => {}
                    "q" | "quit" | "stop" => break,
                    "r" | "reconnect" => {
                        session.reconnect().await?;
                        start_loop(session, mode)?;
                    }
                    text if mode == Mode::Transmit => match text.parse::<Weight>() {
                        Ok(weight) => session.set_weight(weight),
                        Err(e) => error!("{}", e),
                    },
                    other => warn!("Unknown input '{}' (r = reconnect, q = stop)", other),
                }
            }
            _ = watch.tick() => {
                if let LoopState::Stopped(_) = session.state() {
                    break;
                }
            }
        }
    }

    match session.stop().await {
        StopOutcome::Stopped(Ok(count)) => {
            let what = if mode == Mode::Transmit { "payloads sent" } else { "lines received" };
            info!("📊 {} loop finished: {} {}", mode, count, what);
            Ok(())
        }
        StopOutcome::Stopped(Err(e)) => Err(e.into()),
        StopOutcome::TimedOut => {
            warn!("⏰ {} loop was still busy when stopped", mode);
            Ok(())
        }
        StopOutcome::Idle => Ok(()),
    }
}

async fn drive_command<R>(session: &mut Session, config: &Config, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let payload = config.command_payload()?;
    let options = DispatchOptions {
        keep_open: config.command.keep_open,
        close_delay: config.command_delay(),
    };

    if let CommandOutcome::Closed { .. } = session.send_command(&payload, options).await? {
        return Ok(());
    }

    info!("⌨️  Enter further commands, q to disconnect");
    let mut lines = input.lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                if text == "q" || text == "quit" {
                    break;
                }
                let payload = match CommandPayload::new(text) {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!("{}", e);
                        continue;
                    }
                };
                // The port is closed on failure; the next command reopens it
                if session.send_command(&payload, options).await.is_err() {
                    warn!("⚠️  '{}' was not sent", payload.text());
                }
            }
        }
    }

    session.disconnect().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::mock::{MockOpener, MockPort};

    fn test_config(mode: Mode) -> Config {
        let mut config = Config::default();
        config.mode = mode;
        config.transmit.interval_ms = 10;
        config.receive.poll_interval_ms = 5;
        config.command.delay_ms = 10;
        config
    }

    #[tokio::test]
    async fn test_transmit_quits_on_q() {
        let port = MockPort::new();
        let opener = Arc::new(MockOpener::new(port.clone()));

        run_mode(opener.clone(), &test_config(Mode::Transmit), &b"250\nnot-a-number\nq\n"[..])
            .await
            .unwrap();
        assert_eq!(opener.open_count(), 1);
    }

    #[tokio::test]
    async fn test_loop_failure_is_surfaced() {
        let port = MockPort::new();
        let opener = Arc::new(MockOpener::new(port.clone()));

        let config = test_config(Mode::Receive);
        port.fail_reads(true);
        let result = run_mode(opener, &config, &b""[..]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_single_command_closes_port() {
        let port = MockPort::new();
        let opener = Arc::new(MockOpener::new(port.clone()));
        let mut config = test_config(Mode::Command);
        config.command.selected = "ip".to_string();

        run_mode(opener, &config, &b""[..]).await.unwrap();
        assert_eq!(port.written(), vec![0x49, 0x50, 0x0D, 0x0A]);
    }

    #[tokio::test]
    async fn test_keep_open_sends_stdin_commands() {
        let port = MockPort::new();
        let opener = Arc::new(MockOpener::new(port.clone()));
        let mut config = test_config(Mode::Command);
        config.command.keep_open = true;

        run_mode(opener.clone(), &config, &b"z\n\nxT\nq\nPV\n"[..]).await.unwrap();
        assert_eq!(port.written(), b"IP\r\nZ\r\nXT\r\n".to_vec());
        assert_eq!(opener.open_count(), 1);
    }

    #[tokio::test]
    async fn test_keep_open_survives_failed_command() {
        let port = MockPort::new();
        // Write calls: open probe, IP, Z (fails), reopen probe, XT
        port.fail_write_call(3);
        let opener = Arc::new(MockOpener::new(port.clone()));
        let mut config = test_config(Mode::Command);
        config.command.keep_open = true;

        run_mode(opener.clone(), &config, &b"z\nxt\nq\n"[..]).await.unwrap();
        assert_eq!(port.written(), b"IP\r\nXT\r\n".to_vec());
        assert_eq!(opener.open_count(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_port_fails_fast() {
        let opener = Arc::new(MockOpener::new(MockPort::new()));
        opener.set_unavailable(true);

        let result = run_mode(opener, &test_config(Mode::Transmit), &b""[..]).await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("unavailable"));
    }
}
