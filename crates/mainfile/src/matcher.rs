//! Single-file, single-rule-set match evaluation.
//!
//! [`Matcher::matches`] is pure apart from bounded reads and never lets
//! an error escape: unreadable files, undecodable text, and corrupt
//! archives all fold into a `false` verdict for the rule-set under
//! evaluation. Clauses run cheapest first - the name and MIME regexes
//! are consulted before any content leaves the disk.

use crate::compression::Codec;
use crate::mime::detect_mime_type;
use crate::rules::{ParserRuleSet, pattern};
use once_cell::unsync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default cap on bytes read for text and binary pattern clauses.
pub const DEFAULT_MAX_READ_BYTES: usize = 32 * 1024;

/// Default cap on bytes read for structured-content predicates, which
/// need a parseable document rather than a prefix.
pub const DEFAULT_MAX_STRUCTURED_BYTES: usize = 4 * 1024 * 1024;

/// Evaluates files against rule-sets under configured read bounds.
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    max_read_bytes: usize,
    max_structured_bytes: usize,
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
            max_structured_bytes: DEFAULT_MAX_STRUCTURED_BYTES,
        }
    }
}

impl Matcher {
    pub fn new(max_read_bytes: usize, max_structured_bytes: usize) -> Self {
        Self {
            max_read_bytes,
            max_structured_bytes,
        }
    }

    pub fn max_read_bytes(&self) -> usize {
        self.max_read_bytes
    }

    /// Wrap a path into a candidate whose reads are cached across the
    /// many rule-sets evaluated against it.
    pub fn candidate(&self, path: impl Into<PathBuf>) -> FileCandidate {
        FileCandidate::new(path.into(), self.max_read_bytes, self.max_structured_bytes)
    }

    /// Evaluate one file against one rule-set.
    ///
    /// A rule-set matches iff all of its present clauses match. Absent
    /// clauses are vacuously true, so a rule-set without clauses matches
    /// everything (the catch-all invariant).
    pub fn matches(&self, candidate: &FileCandidate, rule_set: &ParserRuleSet) -> bool {
        if !pattern::name_matches(rule_set.name_pattern(), candidate.file_name()) {
            return false;
        }

        if !pattern::mime_matches(rule_set.mime_pattern(), candidate.mime_type()) {
            return false;
        }

        if !rule_set.has_content_clause() {
            return true;
        }

        let Some(window) = candidate.window_for(rule_set) else {
            // Unreadable file or failed decompression for a declared
            // codec: a no-match for this rule-set, never an error.
            return false;
        };

        if let Some(re) = rule_set.content_text_pattern()
            && !pattern::content_text_matches(re, window)
        {
            return false;
        }

        if let Some(needle) = rule_set.binary_header()
            && !pattern::binary_header_matches(needle, window)
        {
            return false;
        }

        if let Some(re) = rule_set.binary_header_pattern()
            && !pattern::binary_pattern_matches(re, window)
        {
            return false;
        }

        if let Some(predicate) = rule_set.structured_predicate() {
            let Some(document) = candidate.structured_window_for(rule_set) else {
                return false;
            };
            if !predicate.matches(document) {
                return false;
            }
        }

        true
    }
}

/// One file under evaluation, with lazily-filled, cached content views.
///
/// Each view is read at most once per candidate regardless of how many
/// rule-sets inspect it. Candidates are owned by a single resolution
/// task; they are `Send` but deliberately not shared across threads.
pub struct FileCandidate {
    path: PathBuf,
    file_name: String,
    max_read_bytes: usize,
    max_structured_bytes: usize,
    raw_window: OnceCell<Option<Arc<Vec<u8>>>>,
    codec: OnceCell<Option<Codec>>,
    decompressed: OnceCell<Option<Arc<Vec<u8>>>>,
    structured_raw: OnceCell<Option<Arc<Vec<u8>>>>,
    structured_decompressed: OnceCell<Option<Arc<Vec<u8>>>>,
    mime_type: OnceCell<String>,
}

impl FileCandidate {
    fn new(path: PathBuf, max_read_bytes: usize, max_structured_bytes: usize) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            file_name,
            max_read_bytes,
            max_structured_bytes,
            raw_window: OnceCell::new(),
            codec: OnceCell::new(),
            decompressed: OnceCell::new(),
            structured_raw: OnceCell::new(),
            structured_decompressed: OnceCell::new(),
            mime_type: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name of the file; name patterns never see the full path.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Compression codec of the file, if its extension and signature
    /// agree on one.
    pub fn codec(&self) -> Option<Codec> {
        *self.codec.get_or_init(|| Codec::detect(&self.path, self.raw_window()))
    }

    /// Detected MIME type. Extension-table lookups answer without I/O;
    /// unknown extensions fall back to sniffing the content window.
    pub fn mime_type(&self) -> &str {
        self.mime_type.get_or_init(|| {
            let codec_by_ext = self
                .path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(Codec::from_extension);
            let cheap = detect_mime_type(&self.path, codec_by_ext, None);
            if cheap != crate::mime::OCTET_STREAM_MIME_TYPE {
                return cheap;
            }
            let window = match self.codec() {
                Some(_) => self.decompressed_window(),
                None => self.raw_window(),
            };
            detect_mime_type(&self.path, self.codec(), window)
        })
    }

    /// Bounded leading window of the raw on-disk bytes. `None` when the
    /// file cannot be read.
    pub fn raw_window(&self) -> Option<&[u8]> {
        self.raw_window
            .get_or_init(|| match crate::io::read_prefix(&self.path, self.max_read_bytes) {
                Ok(bytes) => Some(Arc::new(bytes)),
                Err(err) => {
                    tracing::warn!(path = %self.path.display(), error = %err, "unreadable candidate file");
                    None
                }
            })
            .as_deref()
            .map(|v| v.as_slice())
    }

    /// Bounded window of decompressed content. `None` when the file has
    /// no detectable codec or the archive is corrupt.
    pub fn decompressed_window(&self) -> Option<&[u8]> {
        self.decompressed
            .get_or_init(|| self.decompress(self.max_read_bytes))
            .as_deref()
            .map(|v| v.as_slice())
    }

    /// The content window a rule-set gets to see: decompressed content
    /// when the rule-set declares the file's codec, raw bytes otherwise.
    pub fn window_for(&self, rule_set: &ParserRuleSet) -> Option<&[u8]> {
        match self.codec() {
            Some(codec) if rule_set.supported_compressions().contains(&codec) => self.decompressed_window(),
            _ => self.raw_window(),
        }
    }

    /// Like [`window_for`](Self::window_for), but read under the larger
    /// structured-content cap so whole documents stay parseable.
    pub fn structured_window_for(&self, rule_set: &ParserRuleSet) -> Option<&[u8]> {
        match self.codec() {
            Some(codec) if rule_set.supported_compressions().contains(&codec) => self
                .structured_decompressed
                .get_or_init(|| self.decompress(self.max_structured_bytes))
                .as_deref()
                .map(|v| v.as_slice()),
            _ => self
                .structured_raw
                .get_or_init(|| match crate::io::read_prefix(&self.path, self.max_structured_bytes) {
                    Ok(bytes) => Some(Arc::new(bytes)),
                    Err(_) => None,
                })
                .as_deref()
                .map(|v| v.as_slice()),
        }
    }

    fn decompress(&self, limit: usize) -> Option<Arc<Vec<u8>>> {
        let codec = self.codec()?;
        let file = std::fs::File::open(&self.path).ok()?;
        codec
            .decompress_prefix(std::io::BufReader::new(file), limit)
            .map(Arc::new)
    }
}
