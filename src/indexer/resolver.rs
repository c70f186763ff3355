//! Name resolution for dependency targets
//!
//! The index is keyed by bare and qualified names and built once per scan.
//! Resolution is purely textual: there is no scope or import awareness, so two
//! entities sharing a name are indistinguishable and the later one wins. The
//! one exception is a constructor named after its class, which never takes a
//! bare name away from a type.

use std::collections::HashMap;

use crate::error::{DepGraphError, Result};
use crate::graph::{Entity, EntityKind};

/// Scope separators understood by every grammar.
pub const SCOPE_SEPARATORS: &[&str] = &["::", "->", "."];

/// Returns true when `text` carries at least one scope separator.
pub fn is_qualified(text: &str) -> bool {
    SCOPE_SEPARATORS.iter().any(|sep| text.contains(sep))
}

/// Final component of a qualified name (`a.b::c` -> `c`).
pub fn last_component(text: &str) -> &str {
    let cut = SCOPE_SEPARATORS
        .iter()
        .filter_map(|sep| text.rfind(sep).map(|idx| idx + sep.len()))
        .max();
    match cut {
        Some(idx) => &text[idx..],
        None => text,
    }
}

/// Leading component of a qualified name (`fmt.Println` -> `fmt`).
pub fn first_component(text: &str) -> &str {
    let cut = SCOPE_SEPARATORS
        .iter()
        .filter_map(|sep| text.find(sep))
        .min();
    match cut {
        Some(idx) => &text[..idx],
        None => text,
    }
}

/// Frozen name -> entity lookup.
///
/// Holds owned strings only, so a built index can be shared across threads
/// while extraction runs per file.
#[derive(Debug, Default)]
pub struct ResolutionIndex {
    by_name: HashMap<String, String>,
    kinds: HashMap<String, EntityKind>,
}

impl ResolutionIndex {
    /// Builds the index in iteration order. A later entity overwrites an
    /// earlier one registered under the same name.
    ///
    /// Fails only when two entities share an id.
    pub fn build(entities: &[Entity<'_>]) -> Result<Self> {
        let mut index = Self::default();
        for entity in entities {
            index.insert(entity)?;
        }
        tracing::debug!(
            "Built resolution index: {} entities, {} names",
            index.kinds.len(),
            index.by_name.len()
        );
        Ok(index)
    }

    fn insert(&mut self, entity: &Entity<'_>) -> Result<()> {
        if self.kinds.contains_key(&entity.id) {
            return Err(DepGraphError::DuplicateEntityId(entity.id.clone()));
        }

        if self.displaces_type(entity) {
            tracing::trace!("{} keeps its type binding over the constructor", entity.name);
        } else {
            self.by_name.insert(entity.name.clone(), entity.id.clone());
        }
        if let Some(ref qualified) = entity.qualified_name {
            self.by_name.insert(qualified.clone(), entity.id.clone());
        }

        self.kinds.insert(entity.id.clone(), entity.kind);
        Ok(())
    }

    fn displaces_type(&self, entity: &Entity<'_>) -> bool {
        entity.kind == EntityKind::Constructor
            && self
                .by_name
                .get(&entity.name)
                .and_then(|id| self.kinds.get(id))
                .is_some_and(|kind| kind.is_type())
    }

    /// Resolves a reference to an entity id.
    ///
    /// Exact match first; a qualified reference is then retried once with its
    /// last component. No further fallback.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        if let Some(id) = self.by_name.get(name) {
            return Some(id.as_str());
        }
        if is_qualified(name) {
            let last = last_component(name);
            if !last.is_empty() {
                return self.by_name.get(last).map(|id| id.as_str());
            }
        }
        None
    }

    /// Like [`resolve`](Self::resolve), but only yields type entities.
    pub fn resolve_type(&self, name: &str) -> Option<&str> {
        self.resolve(name)
            .filter(|id| self.kind_of(id).is_some_and(|kind| kind.is_type()))
    }

    pub fn kind_of(&self, id: &str) -> Option<EntityKind> {
        self.kinds.get(id).copied()
    }
}
