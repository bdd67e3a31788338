//! Console + file logging in the `[YYYY/MM/DD HH:MM:SS] LEVEL: message` layout.

use chrono::{DateTime, Local};
use env_logger::{Builder, Target};
use log::{Level, LevelFilter};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::utils::error::SerialError;

pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

pub fn level_label(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

pub fn format_line(timestamp: &DateTime<Local>, level: Level, message: &str) -> String {
    format!(
        "[{}] {}: {}",
        timestamp.format(TIMESTAMP_FORMAT),
        level_label(level),
        message
    )
}

/// Every formatted record goes to stdout and, when present, the log file.
struct TeeWriter {
    file: Option<File>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            // A full disk must not take the serial loops down with it
            if let Err(e) = file.write_all(buf) {
                eprintln!("⚠️  Failed to append to log file: {}", e);
                self.file = None;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

pub fn init_logging(log_file: Option<&Path>, level: LevelFilter) -> Result<(), SerialError> {
    let file = match log_file {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    SerialError::ConfigError(format!(
                        "Failed to open log file {}: {}",
                        path.display(),
                        e
                    ))
                })?,
        ),
        None => None,
    };

    Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            let message = record.args().to_string();
            writeln!(buf, "{}", format_line(&Local::now(), record.level(), &message))
        })
        .target(Target::Pipe(Box::new(TeeWriter { file })))
        .try_init()
        .map_err(|e| SerialError::ConfigError(format!("Logger already initialized: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_line_layout() {
        let ts = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(
            format_line(&ts, Level::Info, "Sent: '=555500' (7 bytes)"),
            "[2024/03/07 09:05:02] INFO: Sent: '=555500' (7 bytes)"
        );
    }

    #[test]
    fn test_warn_is_spelled_out() {
        let ts = Local.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            format_line(&ts, Level::Warn, "No bytes written - possible serial issue"),
            "[2024/12/31 23:59:59] WARNING: No bytes written - possible serial issue"
        );
        assert_eq!(level_label(Level::Error), "ERROR");
    }

    #[test]
    fn test_tee_writer_appends_to_file() {
        let path = std::env::temp_dir().join(format!("serial_tester_tee_{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let file = OpenOptions::new().create(true).append(true).open(&path).unwrap();
        let mut tee = TeeWriter { file: Some(file) };
        tee.write_all(b"[2024/01/01 00:00:00] INFO: first\n").unwrap();
        tee.write_all(b"[2024/01/01 00:00:01] INFO: second\n").unwrap();
        tee.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with("INFO: second\n"));
        let _ = std::fs::remove_file(&path);
    }
}
