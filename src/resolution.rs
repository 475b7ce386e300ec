use crate::entity::EntityPrototype;
use indexmap::IndexMap;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// A cycle in the parent graph. Cyclic definitions are malformed input and
/// are rejected before any resolution runs, since the ancestor walk would
/// otherwise never terminate.
#[derive(Debug, Error)]
#[error("inheritance cycle detected involving entity `{entity_id}`")]
pub struct InheritanceCycleError {
    pub entity_id: String,
}

#[derive(Debug, Default)]
pub struct ResolveReport {
    pub resolved: usize,
    /// Total dangling parent references encountered across the store.
    pub missing_ancestors: usize,
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    InProgress,
    Done,
}

/// Validate that the parent graph is acyclic. Parents that do not exist in
/// the store are leaves here; they are reported during resolution instead.
pub fn detect_cycles(
    entities: &IndexMap<String, EntityPrototype>,
) -> Result<(), InheritanceCycleError> {
    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(entities.len());

    for root in entities.keys() {
        if marks.contains_key(root.as_str()) {
            continue;
        }

        // iterative DFS; each frame is (entity id, next parent index)
        let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
        marks.insert(root.as_str(), Mark::InProgress);

        loop {
            let Some(&(id, next)) = stack.last() else {
                break;
            };
            let parents = &entities[id].parents;

            if next >= parents.len() {
                marks.insert(id, Mark::Done);
                stack.pop();
                continue;
            }
            if let Some(frame) = stack.last_mut() {
                frame.1 += 1;
            }

            let parent = parents[next].as_str();
            match marks.get(parent) {
                Some(Mark::InProgress) => {
                    return Err(InheritanceCycleError {
                        entity_id: parent.to_string(),
                    });
                }
                Some(Mark::Done) => {}
                None => {
                    if entities.contains_key(parent) {
                        marks.insert(parent, Mark::InProgress);
                        stack.push((parent, 0));
                    }
                }
            }
        }
    }

    Ok(())
}

/// Resolve every prototype in the store against the store itself.
///
/// Must complete before any content generation begins; generators read the
/// fully merged component sets. Iteration order is the store's insertion
/// order, though resolution results do not depend on it: an ancestor that
/// was already resolved contributes a superset of its raw fields, and the
/// merge never overwrites anything already set.
pub fn resolve_all(
    entities: &mut IndexMap<String, EntityPrototype>,
) -> Result<ResolveReport, InheritanceCycleError> {
    detect_cycles(entities)?;

    let mut report = ResolveReport::default();
    let ids: Vec<String> = entities.keys().cloned().collect();

    for id in ids {
        let Some(mut entity) = entities.get(&id).cloned() else {
            continue;
        };
        let missing = entity.resolve(entities);
        report.resolved += 1;
        report.missing_ancestors += missing.len();
        debug!(entity = %id, "resolved prototype");

        // insert on an existing key keeps its position in the map
        entities.insert(id, entity);
    }

    Ok(report)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityPrototype, RawRecord};
    use serde_json::json;

    fn prototype(id: &str, parents: &[&str]) -> EntityPrototype {
        let record: RawRecord = serde_json::from_value(json!({
            "type": "entity",
            "id": id,
            "parent": parents,
        }))
        .unwrap();
        EntityPrototype::from_record(record)
    }

    fn store(entities: Vec<EntityPrototype>) -> IndexMap<String, EntityPrototype> {
        entities.into_iter().map(|e| (e.id.clone(), e)).collect()
    }

    #[test]
    fn test_acyclic_graph_passes_validation() {
        let entities = store(vec![
            prototype("base", &[]),
            prototype("left", &["base"]),
            prototype("right", &["base"]),
            prototype("leaf", &["left", "right"]),
        ]);
        assert!(detect_cycles(&entities).is_ok());
    }

    #[test]
    fn test_self_cycle_detected() {
        let entities = store(vec![prototype("ouroboros", &["ouroboros"])]);
        let err = detect_cycles(&entities).unwrap_err();
        assert_eq!(err.entity_id, "ouroboros");
    }

    #[test]
    fn test_two_node_cycle_detected() {
        let entities = store(vec![prototype("a", &["b"]), prototype("b", &["a"])]);
        assert!(detect_cycles(&entities).is_err());
    }

    #[test]
    fn test_missing_parent_is_not_a_cycle() {
        let entities = store(vec![prototype("orphan", &["nowhere"])]);
        assert!(detect_cycles(&entities).is_ok());
    }

    #[test]
    fn test_resolve_all_merges_whole_store() {
        let mut base = prototype("base", &[]);
        base.name = "Base Thing".to_string();
        let mut entities = store(vec![base, prototype("child", &["base"])]);

        let report = resolve_all(&mut entities).unwrap();

        assert_eq!(report.resolved, 2);
        assert_eq!(report.missing_ancestors, 0);
        assert!(entities["child"].is_resolved());
        assert_eq!(entities["child"].name, "Base Thing");
    }

    #[test]
    fn test_resolve_all_counts_missing_ancestors() {
        let mut entities = store(vec![prototype("a", &["ghost"]), prototype("b", &["ghost"])]);
        let report = resolve_all(&mut entities).unwrap();
        assert_eq!(report.missing_ancestors, 2);
    }

    #[test]
    fn test_resolve_all_rejects_cycles_before_resolving() {
        let mut entities = store(vec![prototype("a", &["b"]), prototype("b", &["a"])]);
        assert!(resolve_all(&mut entities).is_err());
        assert!(!entities["a"].is_resolved());
    }
}
