//! The parser rule-set registry.
//!
//! The registry owns the ordered list of compiled rule-sets and is the
//! only mutation point in the crate. Mutations are whole-list replaces:
//! `add` and `remove` build a new list behind an `Arc` and bump a
//! generation counter, so a snapshot handed to a resolution pass keeps
//! referencing a stable view no matter what happens to the registry
//! mid-pass.

use crate::rules::{ParserRuleSet, RuleSetDefinition};
use crate::{MatchError, Result};
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};

/// Immutable, generation-numbered view of the registry.
///
/// Insertion order is preserved; it is the documented tie-break between
/// rule-sets at the same level.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    generation: u64,
    rule_sets: Arc<Vec<Arc<ParserRuleSet>>>,
}

impl RegistrySnapshot {
    /// Build a snapshot directly from definitions, without a registry.
    ///
    /// Convenient for one-shot resolution passes (the CLI does this).
    pub fn from_definitions<I>(definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = RuleSetDefinition>,
    {
        let mut registry = Registry::new();
        for definition in definitions {
            registry.add(definition)?;
        }
        Ok(registry.snapshot())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn rule_sets(&self) -> &[Arc<ParserRuleSet>] {
        &self.rule_sets
    }

    pub fn len(&self) -> usize {
        self.rule_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_sets.is_empty()
    }

    /// Look up a rule-set by id or alias.
    pub fn get(&self, id: &str) -> Option<&Arc<ParserRuleSet>> {
        self.rule_sets
            .iter()
            .find(|rs| rs.id() == id || rs.aliases().iter().any(|a| a == id))
    }
}

/// Ordered collection of parser rule-sets with copy-on-write mutation.
#[derive(Debug, Default)]
pub struct Registry {
    generation: u64,
    rule_sets: Arc<Vec<Arc<ParserRuleSet>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and add a rule-set definition.
    ///
    /// Registration is where definitions fail fast: invalid patterns,
    /// unknown codecs, inconsistent predicates, and duplicate ids are
    /// all rejected here and never participate in a resolution pass.
    ///
    /// # Errors
    ///
    /// `InvalidPattern` / `InvalidRuleSet` per [`RuleSetDefinition::compile`],
    /// plus `InvalidRuleSet` when the id is already registered.
    pub fn add(&mut self, definition: RuleSetDefinition) -> Result<()> {
        let rule_set = definition.compile()?;
        if self.rule_sets.iter().any(|existing| existing.id() == rule_set.id()) {
            return Err(MatchError::invalid_rule_set(
                rule_set.id(),
                "a rule-set with this id is already registered",
            ));
        }

        let mut next: Vec<Arc<ParserRuleSet>> = self.rule_sets.as_ref().clone();
        next.push(Arc::new(rule_set));
        self.replace(next);
        tracing::debug!(generation = self.generation, count = self.rule_sets.len(), "rule-set added");
        Ok(())
    }

    /// Remove a rule-set by id.
    ///
    /// Returns `true` when a rule-set was removed, `false` when the id
    /// was not registered. Removing an unknown id is not an error.
    pub fn remove(&mut self, id: &str) -> bool {
        if !self.rule_sets.iter().any(|rs| rs.id() == id) {
            return false;
        }
        let next: Vec<Arc<ParserRuleSet>> = self
            .rule_sets
            .iter()
            .filter(|rs| rs.id() != id)
            .cloned()
            .collect();
        self.replace(next);
        true
    }

    /// Current immutable view; cheap to clone and hand to a pass.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            generation: self.generation,
            rule_sets: Arc::clone(&self.rule_sets),
        }
    }

    pub fn len(&self) -> usize {
        self.rule_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_sets.is_empty()
    }

    fn replace(&mut self, next: Vec<Arc<ParserRuleSet>>) {
        self.rule_sets = Arc::new(next);
        self.generation += 1;
    }
}

/// Process-wide registry for embedders that want one shared instance.
pub static GLOBAL_REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::new()));

/// Take a snapshot of the process-wide registry.
pub fn global_snapshot() -> RegistrySnapshot {
    GLOBAL_REGISTRY
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .snapshot()
}
