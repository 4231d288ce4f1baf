//! GBK encoding utilities for Chinese thermal printers
//!
//! Most Chinese POS terminals send receipt text as GBK.
//! This module provides utilities for:
//! - Decoding captured text runs through a fallback chain of encodings
//! - Calculating GBK display widths (alignment padding)
//! - Converting UTF-8 to GBK while preserving ESC/POS commands

use encoding_rs::{Encoding, GB18030, GBK, UTF_8};
use tracing::{instrument, trace};

/// Encodings tried in order when decoding a text run.
///
/// GBK also covers GB2312 (the WHATWG GBK decoder is a superset).
fn text_encodings() -> [&'static Encoding; 3] {
    [GBK, GB18030, UTF_8]
}

/// Decode a captured text run.
///
/// Each encoding of the chain is tried in order and the first one that decodes
/// without malformed sequences wins. If all of them fail, only the ASCII bytes
/// are kept. Control characters are stripped from the result.
pub fn decode_text(bytes: &[u8]) -> String {
    let decoded = text_encodings()
        .into_iter()
        .find_map(|encoding| {
            encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| {
                    trace!(encoding = encoding.name(), len = bytes.len(), "text run decoded");
                    text.into_owned()
                })
        })
        .unwrap_or_else(|| bytes.iter().filter(|b| b.is_ascii()).map(|&b| b as char).collect());

    decoded.chars().filter(|c| !c.is_control()).collect()
}

/// Get the GBK byte width of a string
///
/// Chinese characters are typically 2 bytes in GBK, ASCII is 1 byte.
/// On an 80mm printer this equals the number of columns the text occupies.
pub fn gbk_width(s: &str) -> usize {
    let (cow, _, _) = GBK.encode(s);
    cow.len()
}

/// Convert mixed UTF-8 content (with ESC/POS commands) to GBK
///
/// ASCII bytes (0x00-0x7F) are copied exactly as is, which keeps ESC/POS
/// commands intact. Only runs of bytes >= 0x80 are treated as UTF-8 and
/// re-encoded as GBK.
#[instrument(skip(bytes), fields(len = bytes.len()))]
pub fn encode_gbk(bytes: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(bytes.len() * 2);
    let mut pending = Vec::new();

    for &b in bytes {
        if b.is_ascii() {
            flush_pending(&mut pending, &mut result);
            result.push(b);
        } else {
            pending.push(b);
        }
    }
    flush_pending(&mut pending, &mut result);

    result
}

/// Flush the non-ASCII buffer, converting UTF-8 to GBK
fn flush_pending(pending: &mut Vec<u8>, result: &mut Vec<u8>) {
    if pending.is_empty() {
        return;
    }
    let s = String::from_utf8_lossy(pending);
    let (gbk, _, _) = GBK.encode(&s);
    result.extend_from_slice(&gbk);
    pending.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gbk_width() {
        assert_eq!(gbk_width("hello"), 5);
        assert_eq!(gbk_width("你好"), 4); // 2 Chinese chars = 4 bytes
        assert_eq!(gbk_width("AB中文CD"), 8); // 4 ASCII + 2 Chinese
    }

    #[test]
    fn test_decode_text_gbk() {
        let (gbk, _, _) = GBK.encode("桌号: 8");
        assert_eq!(decode_text(&gbk), "桌号: 8");
    }

    #[test]
    fn test_decode_text_strips_controls() {
        assert_eq!(decode_text(b"A\x7fB"), "AB");
    }

    #[test]
    fn test_decode_text_falls_back_to_ascii() {
        // 0xFF is rejected by every encoding of the chain
        assert_eq!(decode_text(b"No.\x80\xff12"), "No.12");
    }

    #[test]
    fn test_encode_gbk_keeps_commands() {
        let data = encode_gbk("\x1b\x61\x01菜品\n".as_bytes());
        assert_eq!(&data[..3], &[0x1B, 0x61, 0x01]);
        assert_eq!(data.len(), 3 + 4 + 1);
        assert_eq!(decode_text(&data[3..7]), "菜品");
    }
}
