//! Transparent decompression for candidate files.
//!
//! Rule-sets can declare a set of supported compression codecs; files
//! compressed with one of them are decompressed into a bounded in-memory
//! window before pattern clauses run. The original compressed path stays
//! the unit of directory-level bookkeeping.
//!
//! Decompression failure is a no-match signal, not an error: the raw
//! compressed bytes remain available to rule-sets that do not declare
//! the codec.

use flate2::read::GzDecoder;
use lzma_rust2::XzReader;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Compression codecs the engine can see through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Gzip (`.gz` files)
    #[serde(alias = "gz")]
    Gzip,
    /// XZ / LZMA2 (`.xz` files)
    Xz,
}

impl Codec {
    /// All codecs, in a stable order.
    pub const ALL: &'static [Codec] = &[Codec::Gzip, Codec::Xz];

    /// Detect a codec from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Codec> {
        match ext.to_lowercase().as_str() {
            "gz" | "gzip" => Some(Codec::Gzip),
            "xz" => Some(Codec::Xz),
            _ => None,
        }
    }

    /// Detect a codec from the leading bytes of a file.
    pub fn from_magic(bytes: &[u8]) -> Option<Codec> {
        if bytes.starts_with(&[0x1f, 0x8b]) {
            Some(Codec::Gzip)
        } else if bytes.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Some(Codec::Xz)
        } else {
            None
        }
    }

    /// Detect a codec from a path, confirming the extension against the
    /// file signature when a leading window is available.
    pub fn detect(path: &std::path::Path, window: Option<&[u8]>) -> Option<Codec> {
        let by_ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Codec::from_extension);

        match (by_ext, window) {
            (Some(codec), Some(bytes)) if !bytes.is_empty() => {
                // Mislabelled files are treated as uncompressed.
                (Codec::from_magic(bytes) == Some(codec)).then_some(codec)
            }
            (Some(codec), _) => Some(codec),
            (None, Some(bytes)) => Codec::from_magic(bytes),
            (None, None) => None,
        }
    }

    /// Parse a codec from its configuration name.
    pub fn parse(name: &str) -> Option<Codec> {
        Self::from_extension(name).or(match name.to_lowercase().as_str() {
            "gzip" => Some(Codec::Gzip),
            _ => None,
        })
    }

    /// Canonical configuration name.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Gzip => "gzip",
            Codec::Xz => "xz",
        }
    }

    /// Decompress up to `limit` bytes of output from `input`.
    ///
    /// Returns `None` on a corrupt or truncated archive. Output is capped
    /// so a pathological archive cannot expand without bound; input is
    /// consumed in proportion to the cap, so huge archives are never read
    /// in full.
    pub fn decompress_prefix<R: Read>(&self, input: R, limit: usize) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        let result = match self {
            Codec::Gzip => GzDecoder::new(input).take(limit as u64).read_to_end(&mut out),
            Codec::Xz => XzReader::new(input, true).take(limit as u64).read_to_end(&mut out),
        };
        match result {
            Ok(_) => Some(out),
            Err(err) => {
                // A clean prefix is still usable for matching when the
                // failure happens past the window boundary.
                if out.len() >= limit {
                    Some(out)
                } else {
                    tracing::debug!(codec = self.name(), error = %err, "decompression failed");
                    None
                }
            }
        }
    }
}
