//! Structured-content predicates for container formats.
//!
//! A rule-set can require that a named section of a structured file
//! (JSON or YAML document, or a spreadsheet sheet with the `excel`
//! feature) exists and contains a set of keys or columns. This is how
//! table-driven formats are claimed without a content regex: "sheet
//! `samples` has all of columns `{id, temperature}`".
//!
//! Evaluation is a predicate, not a parse step: failing to open the
//! bytes as the expected container format is a no-match, never an error.

use serde::{Deserialize, Serialize};

/// Nested key-matching rule for container formats.
///
/// All of `has_all_keys` must be present for the predicate to hold.
/// Dotted paths (`calculation.energy.total`) address nested objects;
/// when a path segment lands on an array, the first non-comment element
/// is inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructuredPredicate {
    /// Named top-level section (JSON/YAML key or sheet name). `None`
    /// addresses the document root or the first sheet.
    #[serde(default)]
    pub section: Option<String>,
    /// Keys or column headers that must all be present.
    pub has_all_keys: Vec<String>,
    /// Leading rows or array elements starting with this marker are
    /// skipped before header extraction.
    #[serde(default)]
    pub comment_marker: Option<String>,
}

impl StructuredPredicate {
    /// Check the predicate for internal consistency.
    ///
    /// Called at registry-add time so a malformed predicate is rejected
    /// before it can take part in a resolution pass.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.has_all_keys.is_empty() {
            return Err("structured predicate requires at least one key in has_all_keys".to_string());
        }
        if self.has_all_keys.iter().any(|k| k.is_empty()) {
            return Err("structured predicate contains an empty key".to_string());
        }
        if let Some(marker) = &self.comment_marker
            && marker.is_empty()
        {
            return Err("comment_marker must not be empty when set".to_string());
        }
        Ok(())
    }

    /// Evaluate the predicate against raw file bytes.
    ///
    /// Tries JSON first, then YAML, then (with the `excel` feature)
    /// spreadsheet workbooks. Returns `false` when no attempt can open
    /// the bytes as a structured container.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(bytes) {
            return self.matches_document(&value);
        }

        if let Ok(value) = serde_yaml_ng::from_slice::<serde_json::Value>(bytes) {
            // A bare scalar is what any text file decodes to; only
            // mappings and sequences count as structured content.
            if value.is_object() || value.is_array() {
                return self.matches_document(&value);
            }
        }

        #[cfg(feature = "excel")]
        if self.matches_workbook(bytes) {
            return true;
        }

        false
    }

    fn matches_document(&self, root: &serde_json::Value) -> bool {
        let section = match &self.section {
            Some(name) => match root.get(name) {
                Some(value) => value,
                None => return false,
            },
            None => root,
        };

        self.has_all_keys.iter().all(|key| self.key_present(section, key))
    }

    fn key_present(&self, value: &serde_json::Value, dotted: &str) -> bool {
        let mut current = value;
        for segment in dotted.split('.') {
            current = match self.descend(current) {
                Some(serde_json::Value::Object(map)) => match map.get(segment) {
                    Some(next) => next,
                    None => return false,
                },
                _ => return false,
            };
        }
        true
    }

    /// Step into arrays: the first element past any comment markers
    /// stands in for the collection, matching how tabular data is
    /// commonly embedded in JSON/YAML.
    fn descend<'a>(&self, value: &'a serde_json::Value) -> Option<&'a serde_json::Value> {
        match value {
            serde_json::Value::Array(items) => {
                let first = items.iter().find(|item| !self.is_comment_element(item))?;
                self.descend(first)
            }
            other => Some(other),
        }
    }

    fn is_comment_element(&self, value: &serde_json::Value) -> bool {
        match (&self.comment_marker, value) {
            (Some(marker), serde_json::Value::String(text)) => text.trim_start().starts_with(marker.as_str()),
            _ => false,
        }
    }

    #[cfg(feature = "excel")]
    fn matches_workbook(&self, bytes: &[u8]) -> bool {
        use calamine::{Data, Reader};
        use std::io::Cursor;

        let Ok(mut workbook) = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())) else {
            return false;
        };

        let sheet_name = match &self.section {
            Some(name) => name.clone(),
            None => match workbook.sheet_names().first() {
                Some(name) => name.clone(),
                None => return false,
            },
        };

        let Ok(range) = workbook.worksheet_range(&sheet_name) else {
            return false;
        };

        let header_row = range.rows().find(|row| !self.is_comment_row(row));
        let Some(header_row) = header_row else {
            return false;
        };

        let columns: Vec<String> = header_row
            .iter()
            .filter_map(|cell| match cell {
                Data::String(s) => Some(s.trim().to_string()),
                Data::Int(i) => Some(i.to_string()),
                Data::Float(f) => Some(f.to_string()),
                _ => None,
            })
            .collect();

        self.has_all_keys.iter().all(|key| columns.iter().any(|c| c == key))
    }

    #[cfg(feature = "excel")]
    fn is_comment_row(&self, row: &[calamine::Data]) -> bool {
        let Some(marker) = &self.comment_marker else {
            return false;
        };
        match row.first() {
            Some(calamine::Data::String(s)) => s.trim_start().starts_with(marker.as_str()),
            _ => false,
        }
    }
}
