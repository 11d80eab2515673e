use std::{fmt, ops::Deref, str::FromStr};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Magic prefixing every host-to-sensor request ("EGIS").
pub const REQUEST_MAGIC: [u8; 4] = *b"EGIS";

/// Magic prefixing sensor replies ("SIGE", the request magic reversed).
pub const RESPONSE_MAGIC: [u8; 4] = *b"SIGE";

/// An immutable, non-empty command frame.
///
/// Frames are opaque to this crate: they come from fixture files or the
/// command line, written as hex bytes separated by whitespace or commas
/// (`"45 47 49 53 60 00 fc"`, `"0x45, 0x47"`).
///
#[derive(Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct CommandFrame(Box<[u8]>);

impl CommandFrame {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(Error::InvalidFrame("frame is empty".into()));
        }
        Ok(Self(bytes.into_boxed_slice()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn has_request_magic(&self) -> bool {
        self.0.starts_with(&REQUEST_MAGIC)
    }
}

impl Deref for CommandFrame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for CommandFrame {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .map(parse_hex_byte)
            .collect::<Result<Vec<u8>>>()?;

        Self::new(bytes)
    }
}

impl TryFrom<String> for CommandFrame {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex_string(&self.0))
    }
}

impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandFrame[{}]", self)
    }
}

fn parse_hex_byte(token: &str) -> Result<u8> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);

    if digits.is_empty() || digits.len() > 2 {
        return Err(Error::InvalidFrame(format!("bad byte {token:?}")));
    }

    u8::from_str_radix(digits, 16).map_err(|_| Error::InvalidFrame(format!("bad byte {token:?}")))
}

///////////////////////////////////////////////////////////////////////

pub fn hex_string(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        s.push_str(&format!("{b:02x}"));
    }
    s
}

/// First `limit` bytes as hex, with the total appended when truncated.
pub fn hex_preview(bytes: &[u8], limit: usize) -> String {
    if bytes.len() > limit {
        format!("{}... ({} total bytes)", hex_string(&bytes[..limit]), bytes.len())
    } else {
        hex_string(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_spaced() {
        let frame: CommandFrame = "45 47 49 53 60 00 fc".parse().unwrap();
        assert_eq!(frame.as_bytes(), &[0x45, 0x47, 0x49, 0x53, 0x60, 0x00, 0xfc]);
        assert!(frame.has_request_magic());
    }

    #[test]
    fn parse_prefixed_with_commas() {
        let frame: CommandFrame = "0x45, 0x47,0x49 0X53,".parse().unwrap();
        assert_eq!(frame.as_bytes(), b"EGIS");
    }

    #[test]
    fn parse_rejects_empty() {
        assert!(matches!("".parse::<CommandFrame>(), Err(Error::InvalidFrame(_))));
        assert!(matches!(" , ".parse::<CommandFrame>(), Err(Error::InvalidFrame(_))));
        assert!(CommandFrame::new(Vec::new()).is_err());
    }

    #[test]
    fn parse_rejects_bad_tokens() {
        assert!("45 4g".parse::<CommandFrame>().is_err());
        assert!("456".parse::<CommandFrame>().is_err());
        assert!("0x".parse::<CommandFrame>().is_err());
    }

    #[test]
    fn display_matches_input() {
        let frame: CommandFrame = "45 47 49 53 73 14 ec".parse().unwrap();
        assert_eq!(frame.to_string(), "45 47 49 53 73 14 ec");
    }

    #[test]
    fn preview_truncates() {
        let bytes = [0xabu8; 30];
        let preview = hex_preview(&bytes, 4);
        assert_eq!(preview, "ab ab ab ab... (30 total bytes)");
        assert_eq!(hex_preview(&bytes[..2], 4), "ab ab");
        assert_eq!(hex_preview(&[], 4), "");
    }
}
