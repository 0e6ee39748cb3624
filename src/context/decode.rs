use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("content is not valid UTF-8, Latin-1 or Windows-1252 text")]
    UnsupportedEncoding,

    #[error("content is empty")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Windows1252,
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Windows1252 => "windows-1252",
        };
        f.write_str(name)
    }
}

/// Windows-1252 code points for 0x80..=0x9F. `None` marks the five unassigned bytes.
const WINDOWS_1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None,             Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None,             Some('\u{017D}'), None,
    None,             Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None,             Some('\u{017E}'), Some('\u{0178}'),
];

fn is_c1(byte: u8) -> bool {
    (0x80..=0x9F).contains(&byte)
}

/// ISO-8859-1 without the C1 control range, which real Latin-1 text never uses.
fn decode_latin1(bytes: &[u8]) -> Option<String> {
    if bytes.iter().copied().any(is_c1) {
        return None;
    }
    Some(bytes.iter().map(|&b| char::from(b)).collect())
}

fn decode_windows_1252(bytes: &[u8]) -> Option<String> {
    bytes
        .iter()
        .map(|&b| {
            if is_c1(b) {
                WINDOWS_1252_HIGH[usize::from(b - 0x80)]
            } else {
                Some(char::from(b))
            }
        })
        .collect()
}

/// Decode a text blob, trying UTF-8, Latin-1 and Windows-1252 in that order.
/// The result is trimmed; blank content is an error.
pub fn decode_text(bytes: &[u8]) -> Result<(String, TextEncoding), DecodeError> {
    let (text, encoding) = if let Ok(text) = std::str::from_utf8(bytes) {
        (text.to_string(), TextEncoding::Utf8)
    } else if let Some(text) = decode_latin1(bytes) {
        (text, TextEncoding::Latin1)
    } else if let Some(text) = decode_windows_1252(bytes) {
        (text, TextEncoding::Windows1252)
    } else {
        return Err(DecodeError::UnsupportedEncoding);
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok((trimmed.to_string(), encoding))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_wins_first() {
        let (text, encoding) = decode_text("  Ciências e Tecnologia \n".as_bytes()).unwrap();
        assert_eq!(text, "Ciências e Tecnologia");
        assert_eq!(encoding, TextEncoding::Utf8);
    }

    #[test]
    fn falls_back_to_latin1() {
        // "Ciência" in ISO-8859-1
        let bytes = [0x43, 0x69, 0xEA, 0x6E, 0x63, 0x69, 0x61];
        let (text, encoding) = decode_text(&bytes).unwrap();
        assert_eq!(text, "Ciência");
        assert_eq!(encoding, TextEncoding::Latin1);
    }

    #[test]
    fn c1_bytes_go_to_windows_1252() {
        // curly quotes and an euro sign
        let bytes = [0x93, 0x6F, 0x6B, 0x94, 0x20, 0x80, 0x35];
        let (text, encoding) = decode_text(&bytes).unwrap();
        assert_eq!(text, "\u{201C}ok\u{201D} \u{20AC}5");
        assert_eq!(encoding, TextEncoding::Windows1252);
    }

    #[test]
    fn unassigned_windows_1252_bytes_fail() {
        assert_eq!(decode_text(&[0x41, 0x81, 0x42]), Err(DecodeError::UnsupportedEncoding));
    }

    #[test]
    fn blank_content_is_rejected() {
        assert_eq!(decode_text(b" \n\t "), Err(DecodeError::Empty));
        assert_eq!(decode_text(b""), Err(DecodeError::Empty));
    }
}
