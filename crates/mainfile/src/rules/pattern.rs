//! Pattern clause primitives.
//!
//! Stateless predicates over names, MIME strings, and bounded content
//! windows. All regex matching uses search semantics (a match anywhere
//! is enough), mirroring how rule authors write their expressions.

use regex::Regex;
use regex::bytes::Regex as BytesRegex;

/// Regex search over a file's base name.
pub fn name_matches(pattern: &Regex, file_name: &str) -> bool {
    pattern.is_match(file_name)
}

/// Regex search over a detected MIME type string.
pub fn mime_matches(pattern: &Regex, mime_type: &str) -> bool {
    pattern.is_match(mime_type)
}

/// Regex search over the text decoding of a content window.
///
/// Invalid byte sequences are replaced, never failed, so binary garbage
/// in an otherwise matching file cannot make the clause error out.
pub fn content_text_matches(pattern: &Regex, window: &[u8]) -> bool {
    let text = String::from_utf8_lossy(window);
    pattern.is_match(&text)
}

/// True iff the literal needle occurs anywhere in the window.
///
/// Declared semantics are "bytes are included in the file", so this is
/// a substring scan, not an offset-0 prefix check.
pub fn binary_header_matches(needle: &[u8], window: &[u8]) -> bool {
    memchr::memmem::find(window, needle).is_some()
}

/// Byte-regex search over a content window.
pub fn binary_pattern_matches(pattern: &BytesRegex, window: &[u8]) -> bool {
    pattern.is_match(window)
}
