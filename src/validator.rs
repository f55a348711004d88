use crate::schema::{CORE_SECTIONS, SECTION_TYPE_KEY};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Post-merge sanity check. Accepts any JSON value and never fails; problems are
/// returned in the report. Leaf value types and emptiness are not checked.
pub fn validate_note(note: &Value) -> ValidationReport {
    match note.as_object() {
        Some(fields) => validate_fields(fields),
        None => ValidationReport::from_errors(vec!["note must be a JSON object".to_string()]),
    }
}

pub(crate) fn validate_fields(fields: &Map<String, Value>) -> ValidationReport {
    let mut errors = Vec::new();

    for key in CORE_SECTIONS {
        match fields.get(key) {
            None | Some(Value::Null) => errors.push(format!("missing required section '{}'", key)),
            Some(_) => {}
        }
    }

    if let Some(Value::Object(objective)) = fields.get("objective") {
        let declared = objective.get(SECTION_TYPE_KEY).and_then(Value::as_str);
        for (container, section_type) in [("rows", "table"), ("categories", "categorized")] {
            // An explicit type tag wins; key presence only matters for untagged sections.
            let expected = match declared {
                Some(declared) => declared == section_type,
                None => objective.contains_key(container),
            };
            if expected && !objective.get(container).is_some_and(Value::is_array) {
                errors.push(format!("objective.{} must be an array", container));
            }
        }
    }

    ValidationReport::from_errors(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_complete_note_is_valid() {
        let note = json!({
            "subjective": { "type": "wysiwyg", "content": "" },
            "objective": { "type": "table", "rows": [] },
            "assessment": { "type": "wysiwyg", "content": "" },
            "plan": { "type": "list", "items": [] }
        });

        let report = validate_note(&note);
        assert!(report.is_valid, "{:?}", report.errors);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_each_missing_core_section_is_reported() {
        for missing in CORE_SECTIONS {
            let mut note = json!({
                "subjective": {}, "objective": {}, "assessment": {}, "plan": {}
            });
            note.as_object_mut().unwrap().remove(missing);

            let report = validate_note(&note);
            assert!(!report.is_valid);
            assert_eq!(report.errors.len(), 1);
            assert!(report.errors[0].contains(missing));
        }
    }

    #[test]
    fn test_null_section_counts_as_missing() {
        let note = json!({ "subjective": null, "objective": {}, "assessment": {}, "plan": {} });
        assert!(!validate_note(&note).is_valid);
    }

    #[test]
    fn test_objective_row_container_must_be_array() {
        let base = |objective: Value| {
            json!({ "subjective": {}, "objective": objective, "assessment": {}, "plan": {} })
        };

        let report = validate_note(&base(json!({ "type": "table", "rows": "none" })));
        assert_eq!(report.errors, vec!["objective.rows must be an array".to_string()]);

        let report = validate_note(&base(json!({ "type": "table" })));
        assert!(!report.is_valid);

        let report = validate_note(&base(json!({ "type": "categorized", "categories": {} })));
        assert_eq!(
            report.errors,
            vec!["objective.categories must be an array".to_string()]
        );

        let report = validate_note(&base(json!({ "categories": [] })));
        assert!(report.is_valid);

        let report = validate_note(&base(json!({ "type": "wysiwyg", "content": "ok" })));
        assert!(report.is_valid);
    }

    #[test]
    fn test_composite_objective_may_have_rows_field() {
        let note = json!({
            "subjective": {},
            "objective": {
                "type": "composite",
                "observation": { "type": "wysiwyg", "content": "Antalgic gait" },
                "rows": { "type": "table", "rows": [] }
            },
            "assessment": {},
            "plan": {}
        });
        let report = validate_note(&note);
        assert!(report.is_valid, "{:?}", report.errors);

        let untagged = json!({
            "subjective": {}, "objective": { "rows": {} }, "assessment": {}, "plan": {}
        });
        assert!(!validate_note(&untagged).is_valid);
    }

    #[test]
    fn test_non_object_note_never_panics() {
        for note in [json!(null), json!("text"), json!([1, 2])] {
            let report = validate_note(&note);
            assert!(!report.is_valid);
        }
    }
}
