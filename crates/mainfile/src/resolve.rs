//! Directory-scoped resolution of files to parsers.
//!
//! Resolution runs in two phases over one directory. Phase one walks
//! the non-alternative rule-sets in (level, insertion order) and
//! assigns each file to the first one that matches. Phase two handles
//! alternative rule-sets: they are evaluated only when the directory
//! produced no clause-bearing match in phase one, so a format whose
//! files are only recognizable in aggregate never steals files from a
//! directory another parser already claimed.
//!
//! Catch-all rule-sets (no clauses at all) are fallback claims. Their
//! phase-one matches do not void alternatives, and an accepted
//! alternative overrides a catch-all assignment.

use crate::io;
use crate::matcher::{FileCandidate, Matcher};
use crate::registry::RegistrySnapshot;
use crate::rules::ParserRuleSet;
use crate::Result;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One (file, rule-set) pairing produced during a resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCandidate {
    pub file_path: PathBuf,
    pub rule_set_id: String,
    pub is_alternative: bool,
}

/// Outcome of a resolution pass: every considered file mapped to the
/// id of the parser that claimed it, or `None` when nothing matched.
///
/// Iteration order is the path order of the underlying `BTreeMap`, so
/// output is deterministic regardless of how the pass was scheduled.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ResolutionResult {
    assignments: BTreeMap<PathBuf, Option<String>>,
}

impl ResolutionResult {
    pub fn assignments(&self) -> &BTreeMap<PathBuf, Option<String>> {
        &self.assignments
    }

    /// Parser id assigned to `path`, if the file was considered and
    /// matched.
    pub fn parser_for(&self, path: impl AsRef<Path>) -> Option<&str> {
        self.assignments
            .get(path.as_ref())
            .and_then(|parser| parser.as_deref())
    }

    /// Files that were considered but matched no rule-set.
    pub fn unmatched(&self) -> impl Iterator<Item = &Path> {
        self.assignments
            .iter()
            .filter(|(_, parser)| parser.is_none())
            .map(|(path, _)| path.as_path())
    }

    /// `(path, parser id)` pairs for every matched file.
    pub fn matched(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.assignments
            .iter()
            .filter_map(|(path, parser)| Some((path.as_path(), parser.as_deref()?)))
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    fn merge(&mut self, other: ResolutionResult) {
        self.assignments.extend(other.assignments);
    }
}

/// Drives resolution passes over directories and trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionEngine {
    matcher: Matcher,
}

impl ResolutionEngine {
    pub fn new(matcher: Matcher) -> Self {
        Self { matcher }
    }

    /// Resolve one directory's worth of files against a snapshot.
    ///
    /// `files` is treated as the complete sibling set for the purposes
    /// of alternative-matching exclusivity. Files that match nothing
    /// appear in the result with no parser; that is a normal outcome,
    /// not an error.
    pub fn resolve_directory(
        &self,
        snapshot: &RegistrySnapshot,
        files: &[PathBuf],
    ) -> ResolutionResult {
        let (primary, alternatives) = partition_ordered(snapshot);

        // Phase one: first-match-wins over the non-alternative
        // rule-sets. Candidates are kept so phase two reuses their
        // cached content windows.
        let mut verdicts: Vec<(FileCandidate, Option<MatchCandidate>)> = files
            .par_iter()
            .map(|path| {
                let candidate = self.matcher.candidate(path.clone());
                let assigned = primary.iter().find_map(|rule_set| {
                    self.matcher.matches(&candidate, rule_set).then(|| MatchCandidate {
                        file_path: path.clone(),
                        rule_set_id: rule_set.id().to_string(),
                        is_alternative: false,
                    })
                });
                (candidate, assigned)
            })
            .collect();

        if !alternatives.is_empty() {
            self.apply_alternatives(snapshot, &alternatives, &mut verdicts);
        }

        let assignments = verdicts
            .into_iter()
            .map(|(candidate, assigned)| {
                let path = candidate.path().to_path_buf();
                let parser = assigned.map(|m| m.rule_set_id);
                if let Some(id) = &parser {
                    tracing::debug!(path = %path.display(), parser = %id, "file matched");
                }
                (path, parser)
            })
            .collect();
        ResolutionResult { assignments }
    }

    /// List a single directory and resolve its immediate files.
    ///
    /// Subdirectories are not entered; use [`resolve_tree`](Self::resolve_tree)
    /// for recursive scans.
    ///
    /// # Errors
    ///
    /// `Io` when `dir` is not a readable directory.
    pub fn resolve_directory_path(
        &self,
        snapshot: &RegistrySnapshot,
        dir: &Path,
    ) -> Result<ResolutionResult> {
        let files = io::list_directory(dir)?;
        Ok(self.resolve_directory(snapshot, &files))
    }

    /// Walk `root` recursively and resolve every directory in it.
    ///
    /// Each directory is resolved independently (alternative-matching
    /// exclusivity never crosses directories) so the per-directory
    /// passes run in parallel.
    ///
    /// # Errors
    ///
    /// `Io` when the tree cannot be walked. Unreadable individual files
    /// are handled inside matching and fold into no-match.
    pub fn resolve_tree(&self, snapshot: &RegistrySnapshot, root: &Path) -> Result<ResolutionResult> {
        let files = io::walk_tree(root)?;
        let mut by_directory: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        for file in files {
            let parent = file.parent().unwrap_or(root).to_path_buf();
            by_directory.entry(parent).or_default().push(file);
        }

        let partial: Vec<ResolutionResult> = by_directory
            .into_par_iter()
            .map(|(_, siblings)| self.resolve_directory(snapshot, &siblings))
            .collect();

        let mut result = ResolutionResult::default();
        for part in partial {
            result.merge(part);
        }
        tracing::info!(
            root = %root.display(),
            files = result.len(),
            matched = result.matched().count(),
            "resolution pass complete"
        );
        Ok(result)
    }

    /// Phase two: evaluate alternative rule-sets against the files the
    /// directory left unclaimed (or claimed only by a catch-all).
    ///
    /// Alternatives are voided outright when any file in the directory
    /// got a clause-bearing phase-one match. Otherwise they are tried
    /// in (level, insertion) order and the first one that matches
    /// anything claims its files; remaining alternatives now see a
    /// match in the directory and are voided in turn.
    fn apply_alternatives(
        &self,
        snapshot: &RegistrySnapshot,
        alternatives: &[&Arc<ParserRuleSet>],
        verdicts: &mut [(FileCandidate, Option<MatchCandidate>)],
    ) {
        let clause_bearing_match = verdicts.iter().any(|(_, assigned)| {
            assigned.as_ref().is_some_and(|m| {
                snapshot
                    .get(&m.rule_set_id)
                    .is_some_and(|rs| !rs.is_catch_all())
            })
        });
        if clause_bearing_match {
            return;
        }

        for rule_set in alternatives {
            let claimed: Vec<usize> = verdicts
                .iter()
                .enumerate()
                .filter(|(_, (candidate, _))| self.matcher.matches(candidate, rule_set))
                .map(|(index, _)| index)
                .collect();
            if claimed.is_empty() {
                continue;
            }
            for index in claimed {
                let (candidate, assigned) = &mut verdicts[index];
                *assigned = Some(MatchCandidate {
                    file_path: candidate.path().to_path_buf(),
                    rule_set_id: rule_set.id().to_string(),
                    is_alternative: true,
                });
            }
            // Exclusivity: the accepted alternative is now a match in
            // this directory, so every later alternative is voided.
            break;
        }
    }
}

/// Split a snapshot into non-alternative and alternative rule-sets,
/// each sorted by (level, insertion order).
fn partition_ordered(
    snapshot: &RegistrySnapshot,
) -> (Vec<&Arc<ParserRuleSet>>, Vec<&Arc<ParserRuleSet>>) {
    let mut primary: Vec<(usize, &Arc<ParserRuleSet>)> = Vec::new();
    let mut alternatives: Vec<(usize, &Arc<ParserRuleSet>)> = Vec::new();
    for (index, rule_set) in snapshot.rule_sets().iter().enumerate() {
        if rule_set.is_alternative() {
            alternatives.push((index, rule_set));
        } else {
            primary.push((index, rule_set));
        }
    }
    primary.sort_by_key(|(index, rs)| (rs.level(), *index));
    alternatives.sort_by_key(|(index, rs)| (rs.level(), *index));
    (
        primary.into_iter().map(|(_, rs)| rs).collect(),
        alternatives.into_iter().map(|(_, rs)| rs).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistrySnapshot;
    use crate::rules::RuleSetDefinition;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn engine() -> ResolutionEngine {
        ResolutionEngine::default()
    }

    #[test]
    fn test_first_match_at_lowest_level_wins() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "OUTCAR", b"vasp output data");

        let snapshot = RegistrySnapshot::from_definitions(vec![
            RuleSetDefinition::new("generic").level(10).content_pattern("output"),
            RuleSetDefinition::new("vasp").level(1).name_pattern("OUTCAR"),
        ])
        .unwrap();

        let result = engine().resolve_directory(&snapshot, &[file.clone()]);
        assert_eq!(result.parser_for(&file), Some("vasp"));
    }

    #[test]
    fn test_tie_break_by_insertion_order() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "log.txt", b"shared content");

        let snapshot = RegistrySnapshot::from_definitions(vec![
            RuleSetDefinition::new("first").level(3).content_pattern("shared"),
            RuleSetDefinition::new("second").level(3).content_pattern("shared"),
        ])
        .unwrap();

        let result = engine().resolve_directory(&snapshot, &[file.clone()]);
        assert_eq!(result.parser_for(&file), Some("first"));
    }

    #[test]
    fn test_unmatched_files_reported() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "notes.bin", b"\x00\x01\x02");

        let snapshot = RegistrySnapshot::from_definitions(vec![
            RuleSetDefinition::new("strict").name_pattern(r"\.xyz$"),
        ])
        .unwrap();

        let result = engine().resolve_directory(&snapshot, &[file.clone()]);
        assert_eq!(result.parser_for(&file), None);
        assert_eq!(result.unmatched().collect::<Vec<_>>(), vec![file.as_path()]);
    }

    #[test]
    fn test_alternative_voided_by_sibling_match() {
        let dir = TempDir::new().unwrap();
        let matched = write_file(&dir, "OUTCAR", b"vasp data");
        let orphan = write_file(&dir, "trajectory.dat", b"frames");

        let snapshot = RegistrySnapshot::from_definitions(vec![
            RuleSetDefinition::new("vasp").name_pattern("OUTCAR"),
            RuleSetDefinition::new("loose").name_pattern(r"\.dat$").alternative(true),
        ])
        .unwrap();

        let result = engine().resolve_directory(&snapshot, &[matched.clone(), orphan.clone()]);
        assert_eq!(result.parser_for(&matched), Some("vasp"));
        // The alternative would match, but a sibling already did.
        assert_eq!(result.parser_for(&orphan), None);
    }

    #[test]
    fn test_alternative_claims_quiet_directory() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "trajectory.dat", b"frames");

        let snapshot = RegistrySnapshot::from_definitions(vec![
            RuleSetDefinition::new("vasp").name_pattern("OUTCAR"),
            RuleSetDefinition::new("loose").name_pattern(r"\.dat$").alternative(true),
        ])
        .unwrap();

        let result = engine().resolve_directory(&snapshot, &[file.clone()]);
        assert_eq!(result.parser_for(&file), Some("loose"));
    }

    #[test]
    fn test_catch_all_does_not_void_alternative() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "trajectory.dat", b"frames");

        let snapshot = RegistrySnapshot::from_definitions(vec![
            RuleSetDefinition::new("fallback").level(100),
            RuleSetDefinition::new("loose").name_pattern(r"\.dat$").alternative(true),
        ])
        .unwrap();

        // The catch-all claims everything in phase one, but a fallback
        // claim loses to an alternative that actually recognizes the
        // directory.
        let result = engine().resolve_directory(&snapshot, &[file.clone()]);
        assert_eq!(result.parser_for(&file), Some("loose"));
    }

    #[test]
    fn test_catch_all_keeps_files_alternatives_ignore() {
        let dir = TempDir::new().unwrap();
        let claimed = write_file(&dir, "trajectory.dat", b"frames");
        let leftover = write_file(&dir, "README", b"plain notes");

        let snapshot = RegistrySnapshot::from_definitions(vec![
            RuleSetDefinition::new("fallback").level(100),
            RuleSetDefinition::new("loose").name_pattern(r"\.dat$").alternative(true),
        ])
        .unwrap();

        let result = engine().resolve_directory(&snapshot, &[claimed.clone(), leftover.clone()]);
        assert_eq!(result.parser_for(&claimed), Some("loose"));
        assert_eq!(result.parser_for(&leftover), Some("fallback"));
    }

    #[test]
    fn test_first_alternative_voids_later_ones() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.dat", b"frames");
        let b = write_file(&dir, "b.log", b"events");

        let snapshot = RegistrySnapshot::from_definitions(vec![
            RuleSetDefinition::new("alt-dat").level(1).name_pattern(r"\.dat$").alternative(true),
            RuleSetDefinition::new("alt-log").level(2).name_pattern(r"\.log$").alternative(true),
        ])
        .unwrap();

        let result = engine().resolve_directory(&snapshot, &[a.clone(), b.clone()]);
        assert_eq!(result.parser_for(&a), Some("alt-dat"));
        assert_eq!(result.parser_for(&b), None);
    }

    #[test]
    fn test_resolve_tree_scopes_alternatives_per_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("quiet")).unwrap();
        fs::create_dir(dir.path().join("busy")).unwrap();
        let quiet_dat = dir.path().join("quiet/run.dat");
        let busy_dat = dir.path().join("busy/run.dat");
        let busy_outcar = dir.path().join("busy/OUTCAR");
        fs::write(&quiet_dat, b"frames").unwrap();
        fs::write(&busy_dat, b"frames").unwrap();
        fs::write(&busy_outcar, b"vasp data").unwrap();

        let snapshot = RegistrySnapshot::from_definitions(vec![
            RuleSetDefinition::new("vasp").name_pattern("OUTCAR"),
            RuleSetDefinition::new("loose").name_pattern(r"\.dat$").alternative(true),
        ])
        .unwrap();

        let result = engine().resolve_tree(&snapshot, dir.path()).unwrap();
        assert_eq!(result.parser_for(&quiet_dat), Some("loose"));
        assert_eq!(result.parser_for(&busy_outcar), Some("vasp"));
        assert_eq!(result.parser_for(&busy_dat), None);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let dir = TempDir::new().unwrap();
        for i in 0..20 {
            write_file(&dir, &format!("file_{i:02}.txt"), b"shared content");
        }

        let snapshot = RegistrySnapshot::from_definitions(vec![
            RuleSetDefinition::new("text").content_pattern("shared"),
        ])
        .unwrap();

        let first = engine().resolve_tree(&snapshot, dir.path()).unwrap();
        let second = engine().resolve_tree(&snapshot, dir.path()).unwrap();
        assert_eq!(first.assignments(), second.assignments());
        assert_eq!(first.matched().count(), 20);
    }

    #[test]
    fn test_resolve_directory_path_lists_immediate_files() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "OUTCAR", b"vasp data");
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/OUTCAR"), b"vasp data").unwrap();

        let snapshot = RegistrySnapshot::from_definitions(vec![
            RuleSetDefinition::new("vasp").name_pattern("OUTCAR"),
        ])
        .unwrap();

        let result = engine()
            .resolve_directory_path(&snapshot, dir.path())
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.parser_for(dir.path().join("OUTCAR")), Some("vasp"));
    }

    #[test]
    fn test_empty_directory() {
        let snapshot =
            RegistrySnapshot::from_definitions(vec![RuleSetDefinition::new("any")]).unwrap();
        let result = engine().resolve_directory(&snapshot, &[]);
        assert!(result.is_empty());
    }
}
