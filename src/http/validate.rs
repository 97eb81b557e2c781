//! Header name and value validation
//!
//! Every header mutation path goes through these checks so that no value
//! can smuggle a line break into a serialized message.

use super::{Error, Result};
use tracing::warn;

/// Check whether a header value is safe to emit.
///
/// A value is rejected when it contains a bare `\n`, a bare `\r`, or a CRLF
/// that is not followed by a space or horizontal tab (an obsolete line
/// folding). Outside of such folds, only horizontal tab, visible ASCII and
/// the bytes `0x80..=0xFE` are allowed.
pub fn is_valid_value(value: &str) -> bool {
    let bytes = value.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                if bytes.get(i + 1) != Some(&b'\n') {
                    return false;
                }
                if !matches!(bytes.get(i + 2), Some(b' ') | Some(b'\t')) {
                    return false;
                }
                // Skip the LF; the whitespace byte is checked normally
                i += 2;
                continue;
            }
            b'\n' => return false,
            b => {
                if !is_value_byte(b) {
                    return false;
                }
            }
        }
        i += 1;
    }

    true
}

/// Strip disallowed bytes from a header value.
///
/// Valid continuation sequences (`\r\n` followed by space or tab) are kept,
/// every other control byte is dropped. This repairs rather than rejects, so
/// it is only for callers that explicitly want best-effort output.
pub fn filter_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if b == b'\r' {
            let lf = bytes.get(i + 1);
            let ws = bytes.get(i + 2);
            if lf == Some(&b'\n') && matches!(ws, Some(b' ') | Some(b'\t')) {
                out.extend_from_slice(b"\r\n");
                i += 2;
                continue;
            }
            i += 1;
            continue;
        }

        if (b < 0x20 && b != b'\t') || b == 0x7F || b == 0xFF {
            i += 1;
            continue;
        }

        out.push(b);
        i += 1;
    }

    if out.len() != bytes.len() {
        warn!(
            dropped = bytes.len() - out.len(),
            "removed disallowed bytes from header value"
        );
    }

    // Only ASCII bytes were removed, so the output is still UTF-8
    String::from_utf8_lossy(&out).into_owned()
}

/// Check a header value, failing with [`Error::InvalidHeaderValue`].
pub fn assert_valid_value(value: &str) -> Result<()> {
    if is_valid_value(value) {
        Ok(())
    } else {
        Err(Error::InvalidHeaderValue(format!("{:?}", value)))
    }
}

/// Check whether a header name matches the token grammar.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(is_token_byte)
}

/// Check a header name, failing with [`Error::InvalidHeaderName`].
pub fn assert_valid_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(Error::InvalidHeaderName(name.to_string()))
    }
}

/// Token characters: `[a-zA-Z0-9'`#$%&*+.^_|~!-]`
pub(crate) fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'\'' | b'`' | b'#' | b'$' | b'%' | b'&' | b'*' | b'+' | b'.' | b'^' | b'_' | b'|'
                | b'~' | b'!' | b'-'
        )
}

fn is_value_byte(b: u8) -> bool {
    b == b'\t' || (0x20..=0x7E).contains(&b) || (0x80..=0xFE).contains(&b)
}
