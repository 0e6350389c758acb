//! MIME type detection for candidate files.
//!
//! Rule-sets match a regular expression against a detected MIME string, so
//! detection here is best-effort and infallible: extension table first,
//! then content sniffing over the bounded leading window, then the
//! `mime_guess` extension database, finally `application/octet-stream`.
//!
//! For compressed candidates the compression suffix is stripped before the
//! extension lookup, so `OUTCAR.gz` is detected like `OUTCAR`.

use crate::compression::Codec;
use ahash::AHashMap;
use once_cell::sync::Lazy;
use std::path::Path;

pub const PLAIN_TEXT_MIME_TYPE: &str = "text/plain";
pub const JSON_MIME_TYPE: &str = "application/json";
pub const YAML_MIME_TYPE: &str = "application/x-yaml";
pub const XML_MIME_TYPE: &str = "application/xml";
pub const HDF5_MIME_TYPE: &str = "application/x-hdf5";
pub const OCTET_STREAM_MIME_TYPE: &str = "application/octet-stream";

/// Extension to MIME type mapping for formats common in raw uploads.
static EXT_TO_MIME: Lazy<AHashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = AHashMap::new();

    m.insert("txt", PLAIN_TEXT_MIME_TYPE);
    m.insert("log", PLAIN_TEXT_MIME_TYPE);
    m.insert("out", PLAIN_TEXT_MIME_TYPE);
    m.insert("dat", PLAIN_TEXT_MIME_TYPE);
    m.insert("in", PLAIN_TEXT_MIME_TYPE);
    m.insert("inp", PLAIN_TEXT_MIME_TYPE);

    m.insert("json", JSON_MIME_TYPE);
    m.insert("yaml", YAML_MIME_TYPE);
    m.insert("yml", YAML_MIME_TYPE);
    m.insert("toml", "application/toml");
    m.insert("xml", XML_MIME_TYPE);
    m.insert("csv", "text/csv");
    m.insert("tsv", "text/tab-separated-values");

    m.insert("h5", HDF5_MIME_TYPE);
    m.insert("hdf5", HDF5_MIME_TYPE);
    m.insert("nc", "application/x-netcdf");
    m.insert("cif", "chemical/x-cif");
    m.insert("pdb", "chemical/x-pdb");
    m.insert("xyz", "chemical/x-xyz");

    m.insert("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet");
    m.insert("ods", "application/vnd.oasis.opendocument.spreadsheet");
    m.insert("zip", "application/zip");
    m.insert("tar", "application/x-tar");

    m
});

/// Detect the MIME type of a candidate file.
///
/// `window` is the bounded leading window of the (decompressed, if
/// applicable) file content and is only consulted when the extension
/// table has no answer.
///
/// # Arguments
///
/// * `path` - Path of the candidate file
/// * `codec` - Compression codec detected for the file, if any
/// * `window` - Leading content window for signature sniffing
///
/// # Returns
///
/// The detected MIME type string. Never fails; unknown inputs yield
/// `application/octet-stream`.
pub fn detect_mime_type(path: &Path, codec: Option<Codec>, window: Option<&[u8]>) -> String {
    let effective = match codec {
        Some(_) => strip_compression_suffix(path),
        None => path.to_path_buf(),
    };

    let extension = effective
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase());

    if let Some(ext) = &extension
        && let Some(mime_type) = EXT_TO_MIME.get(ext.as_str())
    {
        return (*mime_type).to_string();
    }

    if let Some(bytes) = window {
        if let Some(kind) = infer::get(bytes) {
            return kind.mime_type().to_string();
        }
        if looks_like_text(bytes) {
            return PLAIN_TEXT_MIME_TYPE.to_string();
        }
    }

    if let Some(mime) = mime_guess::from_path(&effective).first() {
        return mime.to_string();
    }

    OCTET_STREAM_MIME_TYPE.to_string()
}

/// Drop a trailing compression extension (`.gz`, `.xz`) from a path.
pub fn strip_compression_suffix(path: &Path) -> std::path::PathBuf {
    let is_codec_ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| Codec::from_extension(ext).is_some())
        .unwrap_or(false);

    if is_codec_ext {
        path.with_extension("")
    } else {
        path.to_path_buf()
    }
}

/// Cheap text heuristic: no NUL bytes and mostly ASCII-or-UTF-8-ish
/// content in the sniffed window.
fn looks_like_text(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }
    if memchr::memchr(0, bytes).is_some() {
        return false;
    }
    let printable = bytes
        .iter()
        .filter(|b| b.is_ascii_graphic() || b.is_ascii_whitespace() || **b >= 0x80)
        .count();
    printable * 100 / bytes.len() >= 95
}
