use std::fmt;
use std::str::FromStr;

use crate::utils::error::SerialError;

pub const MAX_WEIGHT: u32 = 999_999;

/// Indicator commands offered for selection.
pub const COMMAND_LIST: [&str; 14] = [
    "IP", "P", "CP", "SP", "xS", "xP", "Z", "T", "xT", "PU", "xU", "xM", "PV", "Esc R",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Weight(u32);

impl Weight {
    pub fn new(value: u32) -> Result<Self, SerialError> {
        if value > MAX_WEIGHT {
            return Err(SerialError::FormatError(format!(
                "Base weight must be between 0 and {}, got {}",
                MAX_WEIGHT, value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl FromStr for Weight {
    type Err = SerialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s.trim().parse()?;
        if value < 0 {
            return Err(SerialError::FormatError("Base weight cannot be negative".to_string()));
        }
        let value = u32::try_from(value).unwrap_or(u32::MAX);
        Weight::new(value)
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `=` followed by the six zero-padded digits in reverse order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitPayload(String);

impl TransmitPayload {
    pub fn new(weight: Weight) -> Self {
        let digits = format!("{:06}", weight.value());
        let reversed: String = digits.chars().rev().collect();
        Self(format!("={}", reversed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for TransmitPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPayload {
    text: String,
    bytes: Vec<u8>,
}

impl CommandPayload {
    pub fn new(text: &str) -> Result<Self, SerialError> {
        if text.is_empty() {
            return Err(SerialError::FormatError("Command text is empty".to_string()));
        }
        if !text.is_ascii() {
            return Err(SerialError::FormatError(format!(
                "Command '{}' contains non-ASCII characters",
                text
            )));
        }

        let mut bytes = text.to_ascii_uppercase().into_bytes();
        bytes.extend_from_slice(b"\r\n");
        Ok(Self {
            text: text.to_string(),
            bytes,
        })
    }

    /// Picks `custom` when it is non-empty, else `selected`.
    pub fn select(selected: &str, custom: &str) -> Result<Self, SerialError> {
        if custom.is_empty() {
            Self::new(selected)
        } else {
            Self::new(custom)
        }
    }

    /// The text as entered, before uppercasing.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Result of best-effort ASCII decoding of one received line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedLine {
    Text(String),
    /// Only non-ASCII bytes were present.
    Undecodable,
    Blank,
}

pub fn decode_line(data: &[u8]) -> DecodedLine {
    let ascii: String = data
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect();
    let text = ascii.trim();

    if !text.is_empty() {
        DecodedLine::Text(text.to_string())
    } else if data.iter().any(|b| !b.is_ascii()) {
        DecodedLine::Undecodable
    } else {
        DecodedLine::Blank
    }
}
