//! Reading text files as UTF-8
//!
//! Strategy:
//! 1. A byte order mark decides the encoding (UTF-8, UTF-16 LE/BE)
//! 2. Valid UTF-8 is taken as-is
//! 3. Anything else is guessed with chardetng and decoded with
//!    replacement characters for invalid sequences

use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

use crate::error::{Error, Result};

/// Text decoded from a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    /// Name of the source encoding, e.g. `UTF-8` or `windows-1252`
    pub encoding: &'static str,
    /// True when the bytes were not already plain UTF-8
    pub converted: bool,
}

/// Read a file and normalize its contents to UTF-8
pub fn read_utf8_file(path: &Path) -> Result<Decoded> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path.display().to_string(), &e))?;
    let decoded = decode_bytes(&bytes);
    if decoded.converted {
        log::debug!(
            "decoded {} from {} to UTF-8",
            path.display(),
            decoded.encoding
        );
    }
    Ok(decoded)
}

/// Decode raw bytes to UTF-8 text
pub fn decode_bytes(bytes: &[u8]) -> Decoded {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return Decoded {
            text: text.into_owned(),
            encoding: encoding.name(),
            converted: encoding != UTF_8 || had_errors,
        };
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Decoded {
            text: text.to_string(),
            encoding: UTF_8.name(),
            converted: false,
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        log::warn!(
            "invalid {} sequences replaced while decoding",
            used.name()
        );
    }

    Decoded {
        text: text.into_owned(),
        encoding: used.name(),
        converted: true,
    }
}
