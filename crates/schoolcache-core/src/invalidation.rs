//! Mutation-triggered invalidation rules.
//!
//! A mutation of entity `T` invalidates the `T` namespace plus every entity
//! whose list queries embed a summary of `T` (a fee mutation also
//! invalidates `students`). The table is built once from the schema
//! registry; it is applied only after the mutation's remote call succeeded.

use std::collections::BTreeMap;
use std::fmt;

use crate::query::KeyPrefix;
use crate::schema::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Insert => "insert",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct InvalidationGraph {
    rules: BTreeMap<EntityKind, Vec<KeyPrefix>>,
}

impl Default for InvalidationGraph {
    fn default() -> Self {
        Self::from_schema()
    }
}

impl InvalidationGraph {
    pub fn from_schema() -> Self {
        let rules = EntityKind::ALL
            .into_iter()
            .map(|kind| {
                let mut prefixes = vec![KeyPrefix::entity(kind)];
                prefixes.extend(
                    kind.schema()
                        .summary_parents()
                        .filter(|parent| *parent != kind)
                        .map(KeyPrefix::entity),
                );
                (kind, prefixes)
            })
            .collect();
        Self { rules }
    }

    /// Prefixes to mark stale after a successful mutation.
    ///
    /// Every mutation kind fans out the same way: an insert or delete
    /// changes list membership just as an update changes row contents.
    pub fn prefixes_for(&self, entity: EntityKind, _kind: MutationKind) -> &[KeyPrefix] {
        self.rules.get(&entity).map(Vec::as_slice).unwrap_or_default()
    }

    /// Entity namespaces affected by a mutation of `entity`.
    pub fn targets(&self, entity: EntityKind) -> Vec<EntityKind> {
        self.prefixes_for(entity, MutationKind::Update)
            .iter()
            .map(KeyPrefix::target)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_mutation_fans_out_to_students() {
        let graph = InvalidationGraph::from_schema();
        assert_eq!(
            graph.targets(EntityKind::Fee),
            vec![EntityKind::Fee, EntityKind::Student]
        );
    }

    #[test]
    fn test_single_namespace_rules() {
        let graph = InvalidationGraph::from_schema();
        assert_eq!(graph.targets(EntityKind::Grade), vec![EntityKind::Grade]);
        assert_eq!(graph.targets(EntityKind::Assignment), vec![EntityKind::Assignment]);
        assert_eq!(graph.targets(EntityKind::Attendance), vec![EntityKind::Attendance]);
        assert_eq!(graph.targets(EntityKind::Student), vec![EntityKind::Student]);
    }

    #[test]
    fn test_every_kind_has_a_rule() {
        let graph = InvalidationGraph::default();
        for kind in EntityKind::ALL {
            for mutation in [MutationKind::Insert, MutationKind::Update, MutationKind::Delete] {
                let prefixes = graph.prefixes_for(kind, mutation);
                assert_eq!(prefixes[0], KeyPrefix::entity(kind));
            }
        }
    }
}
