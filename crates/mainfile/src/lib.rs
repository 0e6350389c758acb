//! Mainfile - Rule-Based File-to-Parser Matching Engine
//!
//! Mainfile decides which parser is responsible for which file. Parsers
//! declare their claims as priority-ordered rule-sets (file name, MIME
//! type, content text, binary magic, structured-container keys), and a
//! resolution pass assigns every file in a directory tree to the first
//! rule-set that matches it.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mainfile::{RegistrySnapshot, ResolutionEngine, RuleSetDefinition};
//!
//! # fn main() -> mainfile::Result<()> {
//! let snapshot = RegistrySnapshot::from_definitions(vec![
//!     RuleSetDefinition::new("vasp")
//!         .name_pattern(r"OUTCAR(\.[^\.]+)?$")
//!         .content_pattern(r"vasp\.\d+")
//!         .supported_compression("gzip"),
//! ])?;
//!
//! let engine = ResolutionEngine::default();
//! let result = engine.resolve_tree(&snapshot, std::path::Path::new("./uploads"))?;
//! for (path, parser) in result.matched() {
//!     println!("{} -> {}", path.display(), parser);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Rules** (`rules`): declarative rule-set definitions and their
//!   compiled form; pattern, binary, and structured-predicate clauses
//! - **Matcher** (`matcher`): evaluates one file against one rule-set,
//!   cheap clauses first, with bounded lazily-cached content windows
//! - **Resolution** (`resolve`): directory-scoped first-match-wins
//!   assignment with alternative-matching exclusivity
//! - **Registry** (`registry`): copy-on-write rule-set store with
//!   generation-numbered snapshots
//! - **Compression** (`compression`): transparent bounded gzip/xz
//!   decompression for rule-sets that opt in
//!
//! # Guarantees
//!
//! - Deterministic: identical inputs produce identical assignments,
//!   regardless of parallel scheduling
//! - Bounded reads: content clauses never read more than the configured
//!   window, compressed or not
//! - Matching never errors: unreadable or corrupt files fold into
//!   no-match verdicts; errors are reserved for registration and
//!   configuration problems

#![deny(unsafe_code)]

pub mod compression;
pub mod config;
pub mod error;
pub mod io;
pub mod matcher;
pub mod mime;
pub mod registry;
pub mod resolve;
pub mod rules;

pub use compression::Codec;
pub use config::RuleSetConfig;
pub use error::{MatchError, Result};
pub use matcher::{FileCandidate, Matcher, DEFAULT_MAX_READ_BYTES, DEFAULT_MAX_STRUCTURED_BYTES};
pub use registry::{global_snapshot, Registry, RegistrySnapshot, GLOBAL_REGISTRY};
pub use resolve::{MatchCandidate, ResolutionEngine, ResolutionResult};
pub use rules::{ParserRuleSet, RuleSetDefinition, StructuredPredicate};
