use serde_json::{json, Value};
use soap_note_builder::*;

fn registry() -> TemplateRegistry {
    TemplateRegistry::builtin().expect("built-in templates load")
}

fn defaults_of(schema: &NoteSchema) -> Value {
    fill_schema(schema, &json!({})).into_value()
}

#[test]
fn test_every_builtin_template_produces_a_valid_default_note() {
    let registry = registry();
    assert!(registry.len() >= 14);

    for schema in registry.iter() {
        schema.validate().unwrap();

        let (note, report) = SchemaFiller::new(schema).defaults();
        let keys: Vec<&String> = note.keys().collect();
        let expected: Vec<&String> = schema.sections.iter().map(|s| &s.key).collect();
        assert_eq!(keys, expected, "section order for {}", schema.id);

        let validation = note.validate();
        assert!(validation.is_valid, "{}: {:?}", schema.id, validation.errors);
        assert!(!report.is_complete());
    }
}

#[test]
fn test_registry_groups_templates() {
    let registry = registry();
    assert!(!registry.by_profession(Profession::Chiropractic).is_empty());
    assert!(!registry.by_profession(Profession::PhysicalTherapy).is_empty());
    assert!(registry
        .by_kind(NoteKind::Adjustment)
        .iter()
        .all(|s| s.profession == Profession::Chiropractic));
    assert!(matches!(
        registry.get("elbow_evaluation"),
        Err(SoapNoteError::UnknownTemplate(_))
    ));
}

#[test]
fn test_model_findings_replace_template_examples() {
    let registry = registry();
    let schema = registry.get("knee_evaluation").unwrap();

    let raw = r#"Here is the note:
```json
{
  "subjective": { "chief_complaint": "Right knee pain x3 weeks after a fall" },
  "objective": { "rows": [{ "test": "Lachman's Test", "result": "Positive", "notes": "right, soft end feel" }] },
  "assessment": { "clinical_impression": "Suspected ACL sprain" },
  "plan": { "type": "composite" }
}
```"#;

    let outcome = complete_from_raw(schema, raw, MergeOptions::default());
    assert!(outcome.success, "{:?}", outcome.error);

    let note = outcome.note.to_value();
    assert_eq!(note["objective"]["rows"].as_array().unwrap().len(), 1);
    assert_eq!(note["objective"]["rows"][0]["result"], "Positive");
    assert_eq!(
        note["assessment"]["clinical_impression"]["content"],
        "Suspected ACL sprain"
    );
    assert_eq!(
        note["subjective"]["chief_complaint"]["content"],
        "Right knee pain x3 weeks after a fall"
    );
    assert_eq!(note["subjective"]["aggravating_factors"]["items"], json!([]));

    // Untouched tables fall back to the template's examples and are reported.
    assert_eq!(
        note["range_of_motion"]["categories"],
        defaults_of(schema)["range_of_motion"]["categories"]
    );
    assert!(outcome
        .merge_report
        .example_rows_used
        .contains(&"range_of_motion".to_string()));
    assert!(!outcome
        .merge_report
        .example_rows_used
        .contains(&"objective".to_string()));
}

#[test]
fn test_unparseable_reply_gives_template_defaults() {
    let registry = registry();
    let schema = registry.get("cervical_adjustment").unwrap();

    let outcome = complete_from_raw(schema, "not json", MergeOptions::default());
    assert!(!outcome.success);
    assert!(outcome.error.is_some());
    assert_eq!(outcome.note.to_value(), defaults_of(schema));
}

#[test]
fn test_merging_a_merged_note_changes_nothing() {
    let registry = registry();
    let schema = registry.get("daily_note").unwrap();
    let model_output = json!({
        "subjective": "Feeling better, soreness after last visit resolved",
        "assessment": { "content": ["Tolerated progression well.", "Improving stair tolerance."] },
        "plan": { "unknown_field": 42 }
    });

    let once = fill_schema(schema, &model_output).into_value();
    let twice = fill_schema(schema, &once).into_value();
    assert_eq!(once, twice);
}

#[test]
fn test_fallback_policies_on_real_template() {
    let registry = registry();
    let schema = registry.get("knee_evaluation").unwrap();

    let labels = MergeOptions {
        table_fallback: TableFallback::LabelsOnly,
    };
    let (note, report) = fill_schema_with(schema, &json!({}), labels);
    let rows = note.section("objective").unwrap()["rows"].as_array().unwrap();
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|r| r["result"] == "" && r["test"] != ""));
    assert!(report.example_rows_used.is_empty());

    let empty = MergeOptions {
        table_fallback: TableFallback::Empty,
    };
    let (note, _) = fill_schema_with(schema, &json!({}), empty);
    assert_eq!(note.section("objective").unwrap()["rows"], json!([]));
    assert!(note.validate().is_valid);
}

#[test]
fn test_validator_flags_missing_core_sections() {
    let report = validate_note(&json!({
        "subjective": { "type": "wysiwyg", "content": "" },
        "objective": { "type": "table", "rows": {} }
    }));
    assert!(!report.is_valid);
    assert!(report.errors.iter().any(|e| e.contains("'assessment'")));
    assert!(report.errors.iter().any(|e| e.contains("'plan'")));
    assert!(report.errors.iter().any(|e| e.contains("objective.rows")));
}

#[test]
fn test_prompt_and_render_use_the_template() {
    let registry = registry();
    let schema = registry.get("shoulder_evaluation").unwrap();

    let prompt = build_note_prompt(schema, "Clinician: Which arm?\nPatient: The left one.").unwrap();
    assert!(prompt.contains(&schema.title));
    assert!(prompt.contains("Patient: The left one."));
    assert!(prompt.contains("\"objective\""));
    assert!(matches!(
        build_note_prompt(schema, "  \n"),
        Err(SoapNoteError::EmptyTranscript)
    ));

    let markdown = render_markdown(schema, &defaults_of(schema));
    assert!(markdown.starts_with(&format!("# {}", schema.title)));
    for section in &schema.sections {
        assert!(markdown.contains(&format!("## {}", section.display_label())));
    }
}

#[test]
fn test_custom_template_directory_overrides_builtin() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut custom: Value = serde_json::from_str(include_str!("../templates/daily_note.json"))?;
    custom["title"] = json!("Clinic Daily Note");
    std::fs::write(
        dir.path().join("daily_note.json"),
        serde_json::to_string_pretty(&custom)?,
    )?;

    let mut registry = TemplateRegistry::builtin()?;
    let before = registry.len();
    assert_eq!(registry.load_dir(dir.path())?, 1);
    assert_eq!(registry.len(), before);
    assert_eq!(registry.get("daily_note")?.title, "Clinic Daily Note");
    Ok(())
}

#[cfg(feature = "gemini")]
mod generation {
    use super::*;
    use soap_note_builder::llm::{CompletionClient, CompletionRequest, GenerationEvent, NoteGenerator};
    use tokio::sync::mpsc;

    struct CannedClient(String);

    impl CompletionClient for CannedClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_generator_round_trip() {
        let registry = registry();
        let reply = json!({
            "subjective": { "chief_complaint": "Low back stiff in the mornings" },
            "objective": {
                "type": "categorized",
                "categories": [{ "title": "Lumbar", "rows": [{ "segment": "L4", "finding": "Restricted" }] }]
            },
            "assessment": { "content": "Improving" },
            "plan": { "next_visit": "One week" }
        })
        .to_string();
        let generator = NoteGenerator::new(CannedClient(reply), "canned");
        let (tx, mut rx) = mpsc::channel(8);

        let outcome = generator
            .generate_for_template(&registry, "lumbar_adjustment", "Patient: stiff back.", None, Some(tx))
            .await
            .unwrap();

        assert!(outcome.success, "{:?}", outcome.error);
        let note = outcome.note.to_value();
        assert_eq!(note["objective"]["categories"][0]["rows"][0]["finding"], "Restricted");
        assert_eq!(note["objective"]["categories"][0]["rows"][0]["notes"], "");
        assert_eq!(note["plan"]["next_visit"]["content"], "One week");

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert!(matches!(last, Some(GenerationEvent::Completed)));
    }

    #[tokio::test]
    async fn test_generator_refusal_falls_back() {
        let registry = registry();
        let schema = registry.get("discharge_summary").unwrap();
        let generator = NoteGenerator::new(CannedClient("I can't do that.".to_string()), "canned");

        let outcome = generator.generate(schema, "Patient: done.", None, None).await;
        assert!(!outcome.success);
        assert_eq!(outcome.note.to_value(), defaults_of(schema));
    }
}
