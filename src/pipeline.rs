use crate::error::{Result, SoapNoteError};
use crate::merge::{MergeOptions, MergeReport, SchemaFiller, StructuredNote};
use crate::schema::NoteSchema;
use crate::validator::ValidationReport;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of one note generation request. A failed request still carries a note
/// with every section of the template, filled with defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub template_id: String,
    pub success: bool,
    pub note: StructuredNote,
    pub error: Option<String>,
    pub validation: ValidationReport,
    pub merge_report: MergeReport,
    pub generated_at: DateTime<Utc>,
}

impl GenerationOutcome {
    pub fn failed(schema: &NoteSchema, options: MergeOptions, error: impl Into<String>) -> Self {
        let error = error.into();
        warn!("Note generation for '{}' failed: {}", schema.id, error);

        let (note, merge_report) = SchemaFiller::new(schema).with_options(options).defaults();
        let validation = note.validate();
        Self {
            template_id: schema.id.clone(),
            success: false,
            note,
            error: Some(error),
            validation,
            merge_report,
            generated_at: Utc::now(),
        }
    }

    pub fn note_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.note)?)
    }
}

/// Parses model text into a JSON object, tolerating Markdown fences and prose around it.
pub fn parse_model_json(raw: &str) -> Result<Value> {
    let cleaned = clean_json_output(raw);
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| SoapNoteError::MalformedModelOutput(e.to_string()))?;

    if value.is_object() {
        Ok(value)
    } else {
        Err(SoapNoteError::MalformedModelOutput(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )))
    }
}

/// Turns raw model text into an outcome: parse, merge against the template, validate.
pub fn complete_from_raw(schema: &NoteSchema, raw: &str, options: MergeOptions) -> GenerationOutcome {
    let parsed = match parse_model_json(raw) {
        Ok(value) => value,
        Err(e) => return GenerationOutcome::failed(schema, options, e.to_string()),
    };

    let (note, merge_report) = SchemaFiller::new(schema).with_options(options).fill(&parsed);
    let validation = note.validate();
    let success = validation.is_valid;
    let error = if success {
        None
    } else {
        Some(validation.errors.join("; "))
    };

    info!(
        "Generated '{}' note ({} section(s) defaulted)",
        schema.id,
        merge_report.defaulted.len()
    );

    GenerationOutcome {
        template_id: schema.id.clone(),
        success,
        note,
        error,
        validation,
        merge_report,
        generated_at: Utc::now(),
    }
}

fn clean_json_output(raw: &str) -> &str {
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            return &raw[start..=end];
        }
    }
    raw.trim()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::fill_schema;
    use crate::schema::fixtures::knee_schema;
    use serde_json::json;

    #[test]
    fn test_parse_strips_fences_and_prose() {
        let raw = "Here is the note:\n```json\n{\"assessment\": {\"content\": \"ok\"}}\n```\nThanks";
        let value = parse_model_json(raw).unwrap();
        assert_eq!(value["assessment"]["content"], "ok");
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(matches!(
            parse_model_json("not json"),
            Err(SoapNoteError::MalformedModelOutput(_))
        ));
        assert!(parse_model_json("[1, 2]").is_err());
        assert!(parse_model_json("{ broken").is_err());
        assert!(parse_model_json("} backwards {").is_err());
    }

    #[test]
    fn test_unparseable_output_yields_defaults_and_failure() {
        let schema = knee_schema();
        let outcome = complete_from_raw(&schema, "not json", MergeOptions::default());

        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert_eq!(outcome.note, fill_schema(&schema, &json!({})));
        assert!(outcome.validation.is_valid);
        assert_eq!(outcome.template_id, "test_knee");
    }

    #[test]
    fn test_parsed_output_is_merged_and_validated() {
        let schema = knee_schema();
        let raw = r#"{"objective": {"rows": [{"test": "X", "result": "Positive", "notes": "tender"}]}}"#;
        let outcome = complete_from_raw(&schema, raw, MergeOptions::default());

        assert!(outcome.success);
        assert!(outcome.error.is_none());
        assert_eq!(
            outcome.note.section("objective").unwrap()["rows"][0]["result"],
            "Positive"
        );
        assert!(outcome.merge_report.defaulted.contains(&"assessment".to_string()));
        assert!(!outcome.merge_report.defaulted.contains(&"objective".to_string()));
    }

    #[test]
    fn test_composite_objective_with_rows_field_succeeds() {
        let schema = NoteSchema::from_json_str(
            r#"{
                "id": "gait_screen",
                "title": "Gait Screen",
                "profession": "physical_therapy",
                "kind": "daily_note",
                "sections": [
                    { "key": "subjective", "type": "wysiwyg" },
                    {
                        "key": "objective",
                        "type": "composite",
                        "fields": [
                            { "key": "observation", "type": "wysiwyg" },
                            { "key": "rows", "type": "table", "columns": ["phase", "finding"] }
                        ]
                    },
                    { "key": "assessment", "type": "wysiwyg" },
                    { "key": "plan", "type": "wysiwyg" }
                ]
            }"#,
        )
        .unwrap();
        schema.validate().unwrap();

        let raw = r#"{
            "subjective": "Feels unsteady on stairs",
            "objective": {
                "observation": "Antalgic gait",
                "rows": { "rows": [{ "phase": "Stance", "finding": "Shortened on right" }] }
            },
            "assessment": "Improving",
            "plan": "Progress balance work"
        }"#;
        let outcome = complete_from_raw(&schema, raw, MergeOptions::default());

        assert!(outcome.success, "{:?}", outcome.error);
        assert!(outcome.validation.is_valid);
        assert_eq!(
            outcome.note.section("objective").unwrap()["rows"]["rows"][0]["finding"],
            "Shortened on right"
        );
    }

    #[test]
    fn test_note_json_is_bare_object() {
        let schema = knee_schema();
        let outcome = GenerationOutcome::failed(&schema, MergeOptions::default(), "offline");
        let persisted: Value = serde_json::from_str(&outcome.note_json().unwrap()).unwrap();
        assert!(persisted.get("subjective").is_some());
        assert_eq!(outcome.error.as_deref(), Some("offline"));
    }
}
