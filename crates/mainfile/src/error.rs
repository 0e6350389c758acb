//! Error types for mainfile.
//!
//! All fallible operations in this crate return [`Result`]. The error
//! taxonomy deliberately keeps "no match" out of it: a file failing a
//! rule-set's clauses, an unreadable candidate file, or a corrupt
//! compressed archive are all normal `false` verdicts during matching,
//! never errors. Errors are reserved for the places where failing loudly
//! is the right behavior:
//!
//! - `Io` - directory listing and other file-system operations outside
//!   the per-file matching path
//! - `InvalidPattern` / `InvalidRuleSet` - rule-set registration problems,
//!   rejected synchronously at add time so a broken rule-set never
//!   participates in a resolution pass
//! - `Config` - declarative rule-set files that fail to load or parse
use thiserror::Error;

/// Result type alias using [`MatchError`].
pub type Result<T> = std::result::Result<T, MatchError>;

/// Main error type for all mainfile operations.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A rule-set carries a pattern string that does not compile.
    ///
    /// Raised at registry-add time, before the rule-set can take part in
    /// any resolution pass.
    #[error("invalid {clause} pattern in rule-set '{rule_set}': {source}")]
    InvalidPattern {
        rule_set: String,
        clause: &'static str,
        #[source]
        source: Box<regex::Error>,
    },

    /// A rule-set definition is structurally unusable: empty or duplicate
    /// id, unknown compression codec, inconsistent structured predicate.
    #[error("invalid rule-set '{rule_set}': {message}")]
    InvalidRuleSet { rule_set: String, message: String },

    #[error("configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MatchError {
    /// Create an `InvalidRuleSet` error.
    pub fn invalid_rule_set<S: Into<String>, M: Into<String>>(rule_set: S, message: M) -> Self {
        Self::InvalidRuleSet {
            rule_set: rule_set.into(),
            message: message.into(),
        }
    }

    /// Create a `Config` error without a source.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a `Config` error wrapping an underlying cause.
    pub fn config_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
