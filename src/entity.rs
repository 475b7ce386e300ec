use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use thiserror::Error;
use tracing::warn;

/// A component record: field name -> value, in declaration order.
/// The component's own `type` field is kept inside the map.
pub type Component = IndexMap<String, Value>;

#[derive(Debug, Error)]
pub enum EntityError {
    /// An accessor was invoked before `resolve` ran. Call ordering bug,
    /// surfaced as an error rather than a panic.
    #[error("entity `{0}` was queried before inheritance resolution")]
    Unresolved(String),
}

// ============================================================================
// RAW DEFINITION RECORDS
// ============================================================================

/// `parent` may be a single id or a list of ids in the source files.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParentField {
    One(String),
    Many(Vec<String>),
}

impl ParentField {
    pub fn into_list(self) -> Vec<String> {
        match self {
            ParentField::One(id) => vec![id],
            ParentField::Many(ids) => ids,
        }
    }
}

/// One entity definition as it appears on disk, with the finite set of
/// recognized top-level keys. Anything else lands in `extra` and is
/// ignored with a log line instead of being silently attached.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "type")]
    pub kind: String,

    pub id: String,

    #[serde(default)]
    pub parent: Option<ParentField>,

    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Component mappings; each carries a `type` field used as its key.
    #[serde(default)]
    pub components: Vec<Component>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// Where an entity was declared, for the source cross-reference.
#[derive(Debug, Clone, Default)]
pub struct SourceLocation {
    /// Project-relative path, forward slashes.
    pub file_path: String,
    /// 1-based declaration line, when it could be located.
    pub line_number: Option<usize>,
}

// ============================================================================
// ENTITY PROTOTYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolveState {
    Unresolved,
    Resolved,
}

/// An entity prototype, either raw (as declared) or resolved (with every
/// inherited field merged in). Accessors that depend on the full component
/// set are gated on the resolved state.
#[derive(Debug, Clone)]
pub struct EntityPrototype {
    pub id: String,
    pub parents: Vec<String>,
    pub is_abstract: bool,
    pub name: String,
    pub description: String,
    /// Component-type name -> component record, first-declaration order.
    pub components: IndexMap<String, Component>,
    pub source: SourceLocation,
    state: ResolveState,
}

impl EntityPrototype {
    pub fn from_record(record: RawRecord) -> Self {
        let mut components = IndexMap::new();
        for component in record.components {
            match component.get("type").and_then(Value::as_str) {
                Some(component_type) => {
                    components.insert(component_type.to_string(), component);
                }
                None => {
                    warn!(entity = %record.id, "component without a `type` field, skipping");
                }
            }
        }

        if !record.extra.is_empty() {
            let keys: Vec<&str> = record.extra.keys().map(String::as_str).collect();
            warn!(entity = %record.id, ?keys, "ignoring unrecognized keys in definition");
        }

        EntityPrototype {
            id: record.id,
            parents: record.parent.map(ParentField::into_list).unwrap_or_default(),
            is_abstract: record.is_abstract,
            name: record.name,
            description: record.description,
            components,
            source: SourceLocation::default(),
            state: ResolveState::Unresolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state == ResolveState::Resolved
    }

    /// Merge every ancestor's fields into this prototype. Breadth-first over
    /// the parent graph, visiting each ancestor once; a field or component
    /// field that is already set is never overwritten, so declared parent
    /// order decides conflicts between ancestors.
    ///
    /// Idempotent: a second call is a no-op. Returns the ids of referenced
    /// ancestors that do not exist in the store (recoverable; the entity is
    /// simply missing whatever they would have contributed).
    pub fn resolve(&mut self, store: &IndexMap<String, EntityPrototype>) -> Vec<String> {
        if self.state == ResolveState::Resolved {
            return Vec::new();
        }

        let mut missing = Vec::new();
        let mut queue: VecDeque<String> = self.parents.iter().cloned().collect();
        let mut visited: HashSet<String> = HashSet::new();

        while let Some(parent_id) = queue.pop_front() {
            if !visited.insert(parent_id.clone()) {
                continue;
            }

            let Some(parent) = store.get(&parent_id) else {
                warn!(entity = %self.id, parent = %parent_id, "unable to find parent prototype");
                missing.push(parent_id);
                continue;
            };

            // copy over unset properties from this ancestor
            if self.name.is_empty() && !parent.name.is_empty() {
                self.name = parent.name.clone();
            }
            if self.description.is_empty() && !parent.description.is_empty() {
                self.description = parent.description.clone();
            }

            // copy over inherited components, preserving declaration order
            for (component_type, parent_component) in &parent.components {
                match self.components.get_mut(component_type) {
                    Some(existing) => {
                        // merge field-by-field; existing fields win
                        for (field, value) in parent_component {
                            if !existing.contains_key(field) {
                                existing.insert(field.clone(), value.clone());
                            }
                        }
                    }
                    None => {
                        // new component, copy it over wholesale
                        self.components
                            .insert(component_type.clone(), parent_component.clone());
                    }
                }
            }

            // widen the search to this ancestor's own parents
            queue.extend(parent.parents.iter().cloned());
        }

        self.state = ResolveState::Resolved;
        missing
    }

    fn ensure_resolved(&self) -> Result<(), EntityError> {
        match self.state {
            ResolveState::Resolved => Ok(()),
            ResolveState::Unresolved => Err(EntityError::Unresolved(self.id.clone())),
        }
    }

    /// Whether the resolved prototype carries the given component.
    /// `component_type` is the name without the `Component` suffix.
    pub fn has_component(&self, component_type: &str) -> Result<bool, EntityError> {
        self.ensure_resolved()?;
        Ok(self.components.contains_key(component_type))
    }

    pub fn tags(&self) -> Result<Vec<String>, EntityError> {
        self.ensure_resolved()?;

        let mut tags = Vec::new();
        if let Some(list) = self
            .components
            .get("Tag")
            .and_then(|component| component.get("tags"))
            .and_then(Value::as_array)
        {
            for tag in list {
                if let Some(tag) = tag.as_str() {
                    tags.push(tag.to_string());
                }
            }
        }
        Ok(tags)
    }

    pub fn has_tag(&self, tag: &str) -> Result<bool, EntityError> {
        Ok(self.tags()?.iter().any(|t| t == tag))
    }

    /// Conventional asset path for the entity's icon, derived from the
    /// `Sprite` component or, failing that, an `InstantAction` icon.
    pub fn sprite_path(&self) -> Result<Option<String>, EntityError> {
        self.ensure_resolved()?;

        if let Some(sprite) = self.components.get("Sprite") {
            // basic; composite layer sprites are not mapped
            if let (Some(base), Some(state)) = (
                sprite.get("sprite").and_then(Value::as_str),
                sprite.get("state").and_then(Value::as_str),
            ) {
                return Ok(Some(format!("{base}/{state}.png")));
            }
        } else if let Some(action) = self.components.get("InstantAction") {
            match action.get("icon") {
                Some(Value::String(path)) => return Ok(Some(path.clone())),
                Some(Value::Object(icon)) => {
                    if let (Some(base), Some(state)) = (
                        icon.get("sprite").and_then(Value::as_str),
                        icon.get("state").and_then(Value::as_str),
                    ) {
                        return Ok(Some(format!("{base}/{state}.png")));
                    }
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

// ============================================================================
// TESTS
// ============================================================================
