//! Parser rule-sets: the declarative matching contract of one parser.
//!
//! A [`RuleSetDefinition`] is the serde-facing form (what configuration
//! files and plugin metadata supply); [`ParserRuleSet`] is the compiled,
//! immutable form the engine evaluates. Pattern strings are compiled
//! exactly once, at registration, and invalid definitions are rejected
//! there - a malformed rule-set never reaches a resolution pass.

pub mod pattern;
pub mod structured;

use crate::compression::Codec;
use crate::{MatchError, Result};
use regex::Regex;
use regex::bytes::Regex as BytesRegex;
use serde::{Deserialize, Serialize};

pub use structured::StructuredPredicate;

/// Serde-facing rule-set definition.
///
/// All clause fields are optional; a definition with none of them set is
/// a catch-all that matches every file. Binary headers can be given as a
/// literal string (`binary_header`) or hex-encoded (`binary_header_hex`)
/// for magic bytes that are not valid UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSetDefinition {
    /// Unique identifier of the owning parser.
    pub id: String,
    /// Priority level; lower levels match first.
    #[serde(default)]
    pub level: i32,
    /// Alternate names for the parser. No uniqueness is enforced here.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Regex searched against the file's base name.
    #[serde(default)]
    pub name_pattern: Option<String>,
    /// Regex searched against the detected MIME type.
    #[serde(default)]
    pub mime_pattern: Option<String>,
    /// Regex searched against a bounded leading window of decoded text.
    #[serde(default)]
    pub content_pattern: Option<String>,
    /// Literal bytes (as UTF-8 text) that must occur in the file.
    #[serde(default)]
    pub binary_header: Option<String>,
    /// Literal bytes, hex-encoded, that must occur in the file.
    #[serde(default)]
    pub binary_header_hex: Option<String>,
    /// Byte regex searched against a bounded leading window.
    #[serde(default)]
    pub binary_header_pattern: Option<String>,
    /// Key-matching rule for structured container formats.
    #[serde(default)]
    pub structured: Option<StructuredPredicate>,
    /// Compression codec names this rule-set sees through (`gzip`, `xz`).
    #[serde(default)]
    pub supported_compressions: Vec<String>,
    /// If true, matches are valid only when nothing else in the same
    /// directory matches any parser.
    #[serde(default)]
    pub alternative: bool,
}

impl RuleSetDefinition {
    /// Start a definition with the given parser id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.name_pattern = Some(pattern.into());
        self
    }

    pub fn mime_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.mime_pattern = Some(pattern.into());
        self
    }

    pub fn content_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.content_pattern = Some(pattern.into());
        self
    }

    /// Set the literal binary header from raw bytes.
    pub fn binary_header(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.binary_header_hex = Some(hex::encode(bytes.as_ref()));
        self
    }

    pub fn binary_header_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.binary_header_pattern = Some(pattern.into());
        self
    }

    pub fn structured(mut self, predicate: StructuredPredicate) -> Self {
        self.structured = Some(predicate);
        self
    }

    pub fn supported_compression(mut self, codec: impl Into<String>) -> Self {
        self.supported_compressions.push(codec.into());
        self
    }

    pub fn alternative(mut self, alternative: bool) -> Self {
        self.alternative = alternative;
        self
    }

    /// Compile the definition into an immutable [`ParserRuleSet`].
    ///
    /// # Errors
    ///
    /// - `InvalidRuleSet` for an empty or whitespace id, conflicting
    ///   binary header fields, bad hex, unknown codecs, or an
    ///   inconsistent structured predicate
    /// - `InvalidPattern` for any regex that does not compile
    pub fn compile(&self) -> Result<ParserRuleSet> {
        if self.id.is_empty() {
            return Err(MatchError::invalid_rule_set(&self.id, "id must not be empty"));
        }
        if self.id.contains(char::is_whitespace) {
            return Err(MatchError::invalid_rule_set(&self.id, "id must not contain whitespace"));
        }

        let name_pattern = self.compile_regex(self.name_pattern.as_deref().unwrap_or(".*"), "name")?;
        let mime_pattern = self.compile_regex(self.mime_pattern.as_deref().unwrap_or(".*"), "mime")?;
        let content_text_pattern = match &self.content_pattern {
            Some(pattern) => Some(self.compile_regex(pattern, "content")?),
            None => None,
        };

        let binary_header = match (&self.binary_header, &self.binary_header_hex) {
            (Some(_), Some(_)) => {
                return Err(MatchError::invalid_rule_set(
                    &self.id,
                    "binary_header and binary_header_hex are mutually exclusive",
                ));
            }
            (Some(text), None) => Some(text.as_bytes().to_vec()),
            (None, Some(encoded)) => Some(hex::decode(encoded).map_err(|e| {
                MatchError::invalid_rule_set(&self.id, format!("binary_header_hex is not valid hex: {e}"))
            })?),
            (None, None) => None,
        };

        let binary_header_pattern = match &self.binary_header_pattern {
            Some(pattern) => Some(BytesRegex::new(pattern).map_err(|e| MatchError::InvalidPattern {
                rule_set: self.id.clone(),
                clause: "binary_header_pattern",
                source: Box::new(e),
            })?),
            None => None,
        };

        if let Some(predicate) = &self.structured {
            predicate
                .validate()
                .map_err(|message| MatchError::invalid_rule_set(&self.id, message))?;
        }

        let mut supported_compressions = Vec::with_capacity(self.supported_compressions.len());
        for name in &self.supported_compressions {
            let codec = Codec::parse(name)
                .ok_or_else(|| MatchError::invalid_rule_set(&self.id, format!("unknown compression codec '{name}'")))?;
            if !supported_compressions.contains(&codec) {
                supported_compressions.push(codec);
            }
        }

        let catch_all = self.is_catch_all_definition();

        Ok(ParserRuleSet {
            id: self.id.clone(),
            level: self.level,
            aliases: self.aliases.clone(),
            name_pattern,
            mime_pattern,
            content_text_pattern,
            binary_header,
            binary_header_pattern,
            structured_predicate: self.structured.clone(),
            supported_compressions,
            alternative_matching: self.alternative,
            catch_all,
        })
    }

    fn compile_regex(&self, pattern: &str, clause: &'static str) -> Result<Regex> {
        Regex::new(pattern).map_err(|e| MatchError::InvalidPattern {
            rule_set: self.id.clone(),
            clause,
            source: Box::new(e),
        })
    }

    fn is_catch_all_definition(&self) -> bool {
        let name_is_default = matches!(self.name_pattern.as_deref(), None | Some(".*"));
        let mime_is_default = matches!(self.mime_pattern.as_deref(), None | Some(".*"));
        name_is_default
            && mime_is_default
            && self.content_pattern.is_none()
            && self.binary_header.is_none()
            && self.binary_header_hex.is_none()
            && self.binary_header_pattern.is_none()
            && self.structured.is_none()
    }
}

/// Compiled, immutable matching contract of one parser.
///
/// Produced by [`RuleSetDefinition::compile`]; owned by the registry and
/// shared with resolution passes behind `Arc`.
#[derive(Debug)]
pub struct ParserRuleSet {
    id: String,
    level: i32,
    aliases: Vec<String>,
    name_pattern: Regex,
    mime_pattern: Regex,
    content_text_pattern: Option<Regex>,
    binary_header: Option<Vec<u8>>,
    binary_header_pattern: Option<BytesRegex>,
    structured_predicate: Option<StructuredPredicate>,
    supported_compressions: Vec<Codec>,
    alternative_matching: bool,
    catch_all: bool,
}

impl ParserRuleSet {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn name_pattern(&self) -> &Regex {
        &self.name_pattern
    }

    pub fn mime_pattern(&self) -> &Regex {
        &self.mime_pattern
    }

    pub fn content_text_pattern(&self) -> Option<&Regex> {
        self.content_text_pattern.as_ref()
    }

    pub fn binary_header(&self) -> Option<&[u8]> {
        self.binary_header.as_deref()
    }

    pub fn binary_header_pattern(&self) -> Option<&BytesRegex> {
        self.binary_header_pattern.as_ref()
    }

    pub fn structured_predicate(&self) -> Option<&StructuredPredicate> {
        self.structured_predicate.as_ref()
    }

    pub fn supported_compressions(&self) -> &[Codec] {
        &self.supported_compressions
    }

    /// Whether this rule-set only matches when nothing else in the same
    /// directory matches any parser.
    pub fn is_alternative(&self) -> bool {
        self.alternative_matching
    }

    /// Whether any content clause (text, binary, structured) is present.
    pub fn has_content_clause(&self) -> bool {
        self.content_text_pattern.is_some()
            || self.binary_header.is_some()
            || self.binary_header_pattern.is_some()
            || self.structured_predicate.is_some()
    }

    /// A rule-set with no clauses set at all matches every file.
    ///
    /// Catch-alls are fallback claims: resolution treats their matches
    /// as weaker than any clause-bearing match when applying the
    /// directory-scoped exclusivity rule.
    pub fn is_catch_all(&self) -> bool {
        self.catch_all
    }
}
