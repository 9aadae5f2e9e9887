//! Layer-table symbol decoding
//!
//! Symbols are short strings from the layout document. A few escape forms
//! map to control characters; everything else is decoded as the first
//! UTF-8 sequence in the string. Malformed input yields no character, never
//! an error, so a bad layout entry cannot take the dispatch loop down.

/// Strip quotes and whitespace from a symbol before the layer-key lookup
pub fn clean_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| *c != '"' && *c != '\'' && !c.is_whitespace())
        .collect()
}

/// Decode a symbol string into a single character.
///
/// Recognized escapes come first, then the leading UTF-8 sequence of the
/// string. Empty symbols mean "no output at this position".
pub fn decode_symbol(symbol: &str) -> Option<char> {
    match symbol {
        "\\n" => return Some('\n'),
        "\\t" => return Some('\t'),
        "\\b" => return Some('\u{8}'),
        "\\x1b" => return Some('\u{1b}'),
        " " => return Some(' '),
        _ => {}
    }
    decode_first_codepoint(symbol.as_bytes())
}

/// Decode the first UTF-8 sequence of a byte string (1-4 bytes, with
/// continuation-byte validation). None on empty, truncated or malformed
/// input.
pub fn decode_first_codepoint(bytes: &[u8]) -> Option<char> {
    let first = *bytes.first()?;

    let (len, init) = match first {
        0x00..=0x7f => return Some(first as char),
        0xc0..=0xdf => (2, (first & 0x1f) as u32),
        0xe0..=0xef => (3, (first & 0x0f) as u32),
        0xf0..=0xf7 => (4, (first & 0x07) as u32),
        // Stray continuation byte or invalid lead byte
        _ => return None,
    };

    if bytes.len() < len {
        return None;
    }

    let mut code_point = init;
    for &byte in &bytes[1..len] {
        if byte & 0xc0 != 0x80 {
            return None;
        }
        code_point = (code_point << 6) | (byte & 0x3f) as u32;
    }

    char::from_u32(code_point)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_symbol() {
        assert_eq!(clean_symbol("\"ly1\""), "ly1");
        assert_eq!(clean_symbol("' a '"), "a");
        assert_eq!(clean_symbol("x"), "x");
    }

    #[test]
    fn test_escapes() {
        assert_eq!(decode_symbol("\\n"), Some('\n'));
        assert_eq!(decode_symbol("\\t"), Some('\t'));
        assert_eq!(decode_symbol("\\b"), Some('\u{8}'));
        assert_eq!(decode_symbol("\\x1b"), Some('\u{1b}'));
        assert_eq!(decode_symbol(" "), Some(' '));
    }

    #[test]
    fn test_empty_symbol_is_no_output() {
        assert_eq!(decode_symbol(""), None);
    }

    #[test]
    fn test_decode_matches_utf8_for_all_widths() {
        // 1-4 byte representatives round-trip through standard encoding
        for ch in ['a', '£', 'λ', 'あ', '€', '😀', '\u{10FFFF}'] {
            let mut buf = [0u8; 4];
            let encoded = ch.encode_utf8(&mut buf);
            assert_eq!(decode_first_codepoint(encoded.as_bytes()), Some(ch));
        }
    }

    #[test]
    fn test_truncated_sequences_yield_none() {
        // "あ" is e3 81 82; cutting continuation bytes must not panic
        assert_eq!(decode_first_codepoint(&[0xe3, 0x81]), None);
        assert_eq!(decode_first_codepoint(&[0xe3]), None);
        assert_eq!(decode_first_codepoint(&[0xf0, 0x9f, 0x98]), None);
    }

    #[test]
    fn test_invalid_bytes_yield_none() {
        // Stray continuation byte, invalid lead, broken continuation
        assert_eq!(decode_first_codepoint(&[0x80]), None);
        assert_eq!(decode_first_codepoint(&[0xff, 0x80]), None);
        assert_eq!(decode_first_codepoint(&[0xc3, 0x41]), None);
    }

    #[test]
    fn test_multichar_symbol_takes_first() {
        assert_eq!(decode_symbol("ab"), Some('a'));
        assert_eq!(decode_symbol("λx"), Some('λ'));
    }
}
