//! Multi-encoding text decoding.
//!
//! Candidates are tried in order and the first strict decode wins. The last
//! candidate maps every byte to one char, so decoding never fails.

use encoding_rs::{Encoding, GB18030, UTF_8};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Encoding used to turn bytes into text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Gb18030,
    /// Byte-preserving last resort
    Latin1,
}

impl TextEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Utf16Le => "UTF-16LE",
            TextEncoding::Utf16Be => "UTF-16BE",
            TextEncoding::Gb18030 => "GB18030",
            TextEncoding::Latin1 => "ISO-8859-1",
        }
    }
}

/// Decode bytes, reporting which encoding succeeded
pub fn decode_with_encoding(bytes: &[u8]) -> (String, TextEncoding) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let kind = if encoding == UTF_8 {
            TextEncoding::Utf8
        } else if encoding == encoding_rs::UTF_16LE {
            TextEncoding::Utf16Le
        } else {
            TextEncoding::Utf16Be
        };
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return (text.into_owned(), kind);
    }

    let strict_candidates = [(UTF_8, TextEncoding::Utf8), (GB18030, TextEncoding::Gb18030)];
    for (encoding, kind) in strict_candidates {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return (text.into_owned(), kind);
        }
    }

    (bytes.iter().map(|&b| b as char).collect(), TextEncoding::Latin1)
}

pub fn decode_bytes(bytes: &[u8]) -> String {
    decode_with_encoding(bytes).0
}

/// Read a whole file and decode it
pub fn read_text_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let (text, encoding) = decode_with_encoding(&bytes);
    debug!(file = %path.display(), encoding = encoding.label(), "Decoded file");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_wins_first() {
        let (text, enc) = decode_with_encoding("10:00:01 设备启动 ok".as_bytes());
        assert_eq!(text, "10:00:01 设备启动 ok");
        assert_eq!(enc, TextEncoding::Utf8);
    }

    #[test]
    fn test_gbk_bytes_decode_as_gb18030() {
        // "中文" in GBK
        let (text, enc) = decode_with_encoding(&[0xD6, 0xD0, 0xCE, 0xC4]);
        assert_eq!(text, "中文");
        assert_eq!(enc, TextEncoding::Gb18030);
    }

    #[test]
    fn test_undecodable_bytes_are_preserved() {
        let (text, enc) = decode_with_encoding(b"abc\xff");
        assert_eq!(enc, TextEncoding::Latin1);
        assert_eq!(text.chars().count(), 4);
        assert_eq!(text.chars().last(), Some('\u{ff}'));
    }

    #[test]
    fn test_utf16_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "ERROR".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let (text, enc) = decode_with_encoding(&bytes);
        assert_eq!(text, "ERROR");
        assert_eq!(enc, TextEncoding::Utf16Le);
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        assert_eq!(decode_bytes(b"\xEF\xBB\xBFhello"), "hello");
    }
}
