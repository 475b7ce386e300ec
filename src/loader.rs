use crate::entity::{EntityPrototype, RawRecord};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Load every entity prototype declared under `<base>/Resources/Prototypes`.
///
/// Files are YAML lists of typed records; anything that is not an entity
/// record is skipped. A record that later declarations share an id with is
/// simply replaced, matching the source data's own conventions.
pub fn load_entities(base_path: &Path) -> Result<IndexMap<String, EntityPrototype>> {
    let prototypes_dir = base_path.join("Resources").join("Prototypes");

    let mut entities: IndexMap<String, EntityPrototype> = IndexMap::new();
    for entry in WalkDir::new(&prototypes_dir) {
        let entry = entry.with_context(|| {
            format!("Failed to walk prototype directory {}", prototypes_dir.display())
        })?;
        if !entry.file_type().is_file()
            || entry.path().extension().and_then(|e| e.to_str()) != Some("yml")
        {
            continue;
        }

        let content = read_prototype_file(entry.path())?;
        let relative = entry
            .path()
            .strip_prefix(base_path)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        for entity in parse_entities(&content, &relative) {
            entities.insert(entity.id.clone(), entity);
        }
        debug!(file = %relative, "scanned prototype file");
    }

    Ok(entities)
}

/// Read a prototype file, coping with the sporadic UTF-8 byte order marks
/// some of the source files carry.
fn read_prototype_file(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read prototype file {}", path.display()))?;
    Ok(content.strip_prefix('\u{feff}').unwrap_or(&content).to_string())
}

/// Parse one file's worth of records, keeping only entity definitions.
fn parse_entities(content: &str, file_path: &str) -> Vec<EntityPrototype> {
    // an empty file parses as null
    let records: Option<Vec<Value>> = match serde_yaml::from_str(content) {
        Ok(records) => records,
        Err(error) => {
            warn!(file = %file_path, %error, "unparseable prototype file, skipping");
            return Vec::new();
        }
    };

    let mut entities = Vec::new();
    for record in records.unwrap_or_default() {
        if record.get("type").and_then(Value::as_str) != Some("entity") {
            continue;
        }

        let record: RawRecord = match serde_json::from_value(record) {
            Ok(record) => record,
            Err(error) => {
                warn!(file = %file_path, %error, "malformed entity record, skipping");
                continue;
            }
        };

        let mut entity = EntityPrototype::from_record(record);
        entity.source.file_path = file_path.to_string();
        entity.source.line_number = find_declaration_line(content, "id", &entity.id);
        if entity.source.line_number.is_none() {
            warn!(
                entity = %entity.id, file = %file_path,
                "failed to find declaration line number"
            );
        }
        entities.push(entity);
    }
    entities
}

/// Locate the 1-based line declaring `key: value`, ignoring trailing
/// comments and surrounding whitespace.
pub fn find_declaration_line(haystack: &str, key: &str, value: &str) -> Option<usize> {
    let prefix = format!("{key}:");
    let suffix = format!(" {value}");
    for (index, line) in haystack.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.starts_with(&prefix) && line.ends_with(&suffix) {
            return Some(index + 1);
        }
    }
    None
}

// ============================================================================
// TESTS
// ============================================================================
