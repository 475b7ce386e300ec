use crate::entity::{EntityError, EntityPrototype};
use crate::segments::{segment_header, SEGMENT_FOOTER};

pub const INFOBOX_SEGMENT: &str = "Infobox";
pub const CATEGORIES_SEGMENT: &str = "Categories";

/// Render the infobox fragment. Deterministic: the same resolved prototype
/// always produces byte-identical output, which is what makes the stored
/// fingerprints meaningful.
pub fn infobox_segment(entity: &EntityPrototype) -> String {
    let mut output = String::new();
    output += &segment_header(INFOBOX_SEGMENT);
    output += "\n{{Infobox PrototypeEntity\n";
    output += &format!("|id = {}\n", entity.id);
    output += &format!("|name = {}\n", entity.name);
    output += &format!("|description = {}\n", entity.description);

    let parents = entity
        .parents
        .iter()
        .map(|parent| format!("[[Entity:{parent}]]"))
        .collect::<Vec<_>>()
        .join(", ");
    output += &format!("|parents = {parents}\n");

    if entity.is_abstract {
        output += "|abstract = true\n";
    }

    let mut source = entity.source.file_path.clone();
    if let Some(line) = entity.source.line_number {
        source += &format!("#L{line}");
    }
    output += &format!("|source = {{{{SourceLink|{source}}}}}\n");

    output += "}}\n";
    output += SEGMENT_FOOTER;
    output
}

/// Category membership rules, applied in declaration order. New rules are
/// appended at the end so existing page output never reorders.
const COMPONENT_CATEGORIES: &[(&str, &str)] = &[
    ("Item", "Items"),
    ("Mail", "Mail"),
    ("Food", "Food"),
    ("Cartridge", "Cartridges"),
    ("Clothing", "Clothing"),
];

const TAG_CATEGORIES: &[(&str, &str)] = &[("Figurine", "Figurines"), ("Trash", "Trash")];

/// Render the category-membership fragment. Requires a resolved prototype
/// since the rules inspect the full inherited component set.
pub fn categories_segment(entity: &EntityPrototype) -> Result<String, EntityError> {
    let mut output = String::new();
    output += &segment_header(CATEGORIES_SEGMENT);
    output += "\n[[Category:Entities]]\n";

    for (component_type, category) in COMPONENT_CATEGORIES {
        if entity.has_component(component_type)? {
            output += &format!("[[Category:{category}]]\n");
        }
    }

    for (tag, category) in TAG_CATEGORIES {
        if entity.has_tag(tag)? {
            output += &format!("[[Category:{category}]]\n");
        }
    }

    output += SEGMENT_FOOTER;
    Ok(output)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::RawRecord;
    use indexmap::IndexMap;
    use serde_json::json;

    fn resolved(value: serde_json::Value) -> EntityPrototype {
        let record: RawRecord = serde_json::from_value(value).unwrap();
        let mut entity = EntityPrototype::from_record(record);
        entity.resolve(&IndexMap::new());
        entity
    }

    #[test]
    fn test_infobox_layout() {
        let mut entity = resolved(json!({
            "type": "entity",
            "id": "mug",
            "parent": ["DrinkBase", "ItemBase"],
            "name": "mug",
            "description": "A plain ceramic mug.",
        }));
        entity.source.file_path = "Resources/Prototypes/Objects/drinks.yml".to_string();
        entity.source.line_number = Some(42);

        let output = infobox_segment(&entity);

        assert_eq!(
            output,
            "<!-- Begin auto-generated segment: Infobox -->\n\
             {{Infobox PrototypeEntity\n\
             |id = mug\n\
             |name = mug\n\
             |description = A plain ceramic mug.\n\
             |parents = [[Entity:DrinkBase]], [[Entity:ItemBase]]\n\
             |source = {{SourceLink|Resources/Prototypes/Objects/drinks.yml#L42}}\n\
             }}\n\
             <!-- End auto-generated segment -->"
        );
    }

    #[test]
    fn test_infobox_marks_abstract_entities() {
        let entity = resolved(json!({
            "type": "entity",
            "id": "BaseItem",
            "abstract": true,
        }));
        assert!(infobox_segment(&entity).contains("|abstract = true\n"));

        let entity = resolved(json!({"type": "entity", "id": "mug"}));
        assert!(!infobox_segment(&entity).contains("abstract"));
    }

    #[test]
    fn test_infobox_source_without_line_number() {
        let mut entity = resolved(json!({"type": "entity", "id": "mug"}));
        entity.source.file_path = "Resources/Prototypes/Objects/drinks.yml".to_string();

        let output = infobox_segment(&entity);
        assert!(output.contains("|source = {{SourceLink|Resources/Prototypes/Objects/drinks.yml}}\n"));
        assert!(!output.contains("#L"));
    }

    #[test]
    fn test_infobox_is_deterministic() {
        let entity = resolved(json!({
            "type": "entity",
            "id": "mug",
            "name": "mug",
        }));
        assert_eq!(infobox_segment(&entity), infobox_segment(&entity));
    }

    #[test]
    fn test_categories_base_membership_only() {
        let entity = resolved(json!({"type": "entity", "id": "rock"}));
        let output = categories_segment(&entity).unwrap();
        assert_eq!(
            output,
            "<!-- Begin auto-generated segment: Categories -->\n\
             [[Category:Entities]]\n\
             <!-- End auto-generated segment -->"
        );
    }

    #[test]
    fn test_categories_component_rules() {
        let entity = resolved(json!({
            "type": "entity",
            "id": "snack",
            "components": [
                {"type": "Item"},
                {"type": "Food"},
            ],
        }));
        let output = categories_segment(&entity).unwrap();
        assert!(output.contains("[[Category:Items]]\n"));
        assert!(output.contains("[[Category:Food]]\n"));
        assert!(!output.contains("[[Category:Mail]]"));
        assert!(!output.contains("[[Category:Clothing]]"));
    }

    #[test]
    fn test_categories_tag_rules() {
        let entity = resolved(json!({
            "type": "entity",
            "id": "toy",
            "components": [
                {"type": "Tag", "tags": ["Figurine", "Trash"]},
            ],
        }));
        let output = categories_segment(&entity).unwrap();
        assert!(output.contains("[[Category:Figurines]]\n"));
        assert!(output.contains("[[Category:Trash]]\n"));
    }

    #[test]
    fn test_categories_rule_order_is_stable() {
        let entity = resolved(json!({
            "type": "entity",
            "id": "parcel",
            "components": [
                {"type": "Tag", "tags": ["Trash"]},
                {"type": "Mail"},
                {"type": "Item"},
            ],
        }));
        let output = categories_segment(&entity).unwrap();
        let items = output.find("[[Category:Items]]").unwrap();
        let mail = output.find("[[Category:Mail]]").unwrap();
        let trash = output.find("[[Category:Trash]]").unwrap();
        assert!(items < mail && mail < trash);
    }

    #[test]
    fn test_categories_require_resolution() {
        let record: RawRecord =
            serde_json::from_value(json!({"type": "entity", "id": "raw"})).unwrap();
        let entity = EntityPrototype::from_record(record);
        assert!(categories_segment(&entity).is_err());
    }
}
