use crate::error::{Result, SoapNoteError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Top-level sections every note template must declare.
pub const CORE_SECTIONS: [&str; 4] = ["subjective", "objective", "assessment", "plan"];

/// Key under which a structured note records each section's type.
/// Composite fields may not use it as their own key.
pub const SECTION_TYPE_KEY: &str = "type";

pub type TableRow = Map<String, Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Profession {
    #[schemars(description = "Physical therapy documentation (evaluations, daily notes, discharge)")]
    PhysicalTherapy,

    #[schemars(description = "Chiropractic documentation (adjustments, maintenance care)")]
    Chiropractic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Evaluation,
    Adjustment,
    Maintenance,
    DailyNote,
    Discharge,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct TableCategory {
    #[schemars(description = "Heading of the group, e.g. the joint or region being measured")]
    pub title: String,

    #[serde(default)]
    #[schemars(description = "Example rows for this group. Keys must be a subset of the section's columns.")]
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SectionSchema {
    #[schemars(description = "Free text section. `content` is the default used when the model omits it.")]
    Wysiwyg {
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[schemars(description = "Guidance text shown to the model in the example JSON")]
        placeholder: Option<String>,
    },

    #[schemars(
        description = "Table of flat rows with a fixed key set. `rows` are literal example rows; they are also the fallback when the model omits the table."
    )]
    Table {
        columns: Vec<String>,
        #[serde(default)]
        rows: Vec<TableRow>,
    },

    #[schemars(description = "Table grouped under titled categories, e.g. range of motion per joint")]
    Categorized {
        columns: Vec<String>,
        #[serde(default)]
        categories: Vec<TableCategory>,
    },

    #[schemars(description = "Named sub-sections, each itself a section")]
    Composite { fields: Vec<NamedSection> },

    #[schemars(
        description = "List of items. With no `item_fields` the items are strings; otherwise each item is an object with exactly those keys."
    )]
    List {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        item_fields: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
}

impl SectionSchema {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Wysiwyg { .. } => "wysiwyg",
            Self::Table { .. } => "table",
            Self::Categorized { .. } => "categorized",
            Self::Composite { .. } => "composite",
            Self::List { .. } => "list",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct NamedSection {
    #[schemars(description = "JSON key of the section in the note, e.g. 'subjective' or 'chief_complaint'")]
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Human readable heading. Defaults to the title-cased key.")]
    pub label: Option<String>,

    #[serde(flatten)]
    pub section: SectionSchema,
}

impl NamedSection {
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => title_case(&self.key),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct NoteSchema {
    #[schemars(description = "Stable identifier, e.g. 'knee_evaluation'")]
    pub id: String,

    pub title: String,

    pub profession: Profession,

    pub kind: NoteKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(description = "Template specific instructions appended to the prompt")]
    pub instructions: Vec<String>,

    #[schemars(description = "Ordered top-level sections. Must include subjective, objective, assessment and plan.")]
    pub sections: Vec<NamedSection>,
}

impl NoteSchema {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let schema: NoteSchema = serde_json::from_str(raw)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn section(&self, key: &str) -> Option<&NamedSection> {
        self.sections.iter().find(|s| s.key == key)
    }

    pub fn section_keys(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.key.as_str()).collect()
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |details: String| SoapNoteError::InvalidSchema {
            template: self.id.clone(),
            details,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("template id is empty".to_string()));
        }

        check_sections(&self.sections, "").map_err(invalid)?;

        for core in CORE_SECTIONS {
            if self.section(core).is_none() {
                return Err(invalid(format!("missing required section '{}'", core)));
            }
        }

        Ok(())
    }

    /// The literal example JSON shown to the model. Mirrors the structured note shape,
    /// with placeholders in place of content.
    pub fn example_json(&self) -> Value {
        Value::Object(example_fields(&self.sections))
    }

    /// Response schema in the OpenAPI subset accepted by Gemini structured output.
    pub fn response_schema(&self) -> Value {
        object_schema(
            self.sections
                .iter()
                .map(|s| (s.key.clone(), section_response_schema(&s.section)))
                .collect(),
        )
    }

    /// JSON Schema of the template definition format itself.
    pub fn definition_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(NoteSchema)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::definition_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

pub fn blank_row(columns: &[String]) -> TableRow {
    columns
        .iter()
        .map(|c| (c.clone(), Value::String(String::new())))
        .collect()
}

pub(crate) fn title_case(key: &str) -> String {
    key.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn check_sections(sections: &[NamedSection], prefix: &str) -> std::result::Result<(), String> {
    if sections.is_empty() {
        return Err(if prefix.is_empty() {
            "template declares no sections".to_string()
        } else {
            format!("composite '{}' declares no fields", prefix)
        });
    }

    let mut seen = HashSet::new();
    for named in sections {
        let path = if prefix.is_empty() {
            named.key.clone()
        } else {
            format!("{}.{}", prefix, named.key)
        };

        if named.key.trim().is_empty() {
            return Err(format!("empty section key under '{}'", prefix));
        }
        if !prefix.is_empty() && named.key == SECTION_TYPE_KEY {
            return Err(format!("'{}' is a reserved key", path));
        }
        if !seen.insert(named.key.as_str()) {
            return Err(format!("duplicate section key '{}'", path));
        }

        match &named.section {
            SectionSchema::Wysiwyg { .. } => {}
            SectionSchema::Table { columns, rows } => {
                check_columns(columns, &path)?;
                check_rows(rows, columns, &path)?;
            }
            SectionSchema::Categorized { columns, categories } => {
                check_columns(columns, &path)?;
                for category in categories {
                    check_rows(&category.rows, columns, &path)?;
                }
            }
            SectionSchema::Composite { fields } => check_sections(fields, &path)?,
            SectionSchema::List { item_fields, .. } => {
                if !item_fields.is_empty() {
                    check_columns(item_fields, &path)?;
                }
            }
        }
    }

    Ok(())
}

fn check_columns(columns: &[String], path: &str) -> std::result::Result<(), String> {
    if columns.is_empty() {
        return Err(format!("'{}' declares no columns", path));
    }
    let mut seen = HashSet::new();
    for column in columns {
        if column.trim().is_empty() {
            return Err(format!("'{}' has an empty column name", path));
        }
        if !seen.insert(column.as_str()) {
            return Err(format!("'{}' repeats column '{}'", path, column));
        }
    }
    Ok(())
}

fn check_rows(rows: &[TableRow], columns: &[String], path: &str) -> std::result::Result<(), String> {
    for (idx, row) in rows.iter().enumerate() {
        for (key, value) in row {
            if !columns.contains(key) {
                return Err(format!(
                    "'{}' example row #{} uses unknown column '{}'",
                    path, idx, key
                ));
            }
            if !value.is_string() {
                return Err(format!(
                    "'{}' example row #{} has a non-string value for '{}'",
                    path, idx, key
                ));
            }
        }
    }
    Ok(())
}

fn example_fields(sections: &[NamedSection]) -> Map<String, Value> {
    sections
        .iter()
        .map(|named| (named.key.clone(), example_section(&named.section)))
        .collect()
}

fn example_section(section: &SectionSchema) -> Value {
    let mut out = Map::new();
    out.insert(
        SECTION_TYPE_KEY.to_string(),
        Value::String(section.type_name().to_string()),
    );

    match section {
        SectionSchema::Wysiwyg {
            content,
            placeholder,
        } => {
            let text = placeholder.clone().unwrap_or_else(|| content.clone());
            out.insert("content".to_string(), Value::String(text));
        }
        SectionSchema::Table { columns, rows } => {
            let rows = if rows.is_empty() {
                vec![Value::Object(blank_row(columns))]
            } else {
                rows.iter().cloned().map(Value::Object).collect()
            };
            out.insert("rows".to_string(), Value::Array(rows));
        }
        SectionSchema::Categorized {
            columns,
            categories,
        } => {
            let categories = if categories.is_empty() {
                vec![json!({ "title": "", "rows": [blank_row(columns)] })]
            } else {
                categories
                    .iter()
                    .map(|c| json!({ "title": c.title, "rows": c.rows }))
                    .collect()
            };
            out.insert("categories".to_string(), Value::Array(categories));
        }
        SectionSchema::Composite { fields } => {
            out.extend(example_fields(fields));
        }
        SectionSchema::List {
            item_fields,
            placeholder,
        } => {
            let item = if item_fields.is_empty() {
                Value::String(placeholder.clone().unwrap_or_default())
            } else {
                Value::Object(blank_row(item_fields))
            };
            out.insert("items".to_string(), Value::Array(vec![item]));
        }
    }

    Value::Object(out)
}

fn object_schema(properties: Vec<(String, Value)>) -> Value {
    let keys: Vec<Value> = properties
        .iter()
        .map(|(k, _)| Value::String(k.clone()))
        .collect();
    let props: Map<String, Value> = properties.into_iter().collect();
    json!({
        "type": "object",
        "properties": props,
        "required": keys,
        "propertyOrdering": keys,
    })
}

fn string_row_schema(columns: &[String]) -> Value {
    object_schema(
        columns
            .iter()
            .map(|c| (c.clone(), json!({ "type": "string" })))
            .collect(),
    )
}

fn section_response_schema(section: &SectionSchema) -> Value {
    match section {
        SectionSchema::Wysiwyg { .. } => {
            object_schema(vec![("content".to_string(), json!({ "type": "string" }))])
        }
        SectionSchema::Table { columns, .. } => object_schema(vec![(
            "rows".to_string(),
            json!({ "type": "array", "items": string_row_schema(columns) }),
        )]),
        SectionSchema::Categorized { columns, .. } => {
            let category = object_schema(vec![
                ("title".to_string(), json!({ "type": "string" })),
                (
                    "rows".to_string(),
                    json!({ "type": "array", "items": string_row_schema(columns) }),
                ),
            ]);
            object_schema(vec![(
                "categories".to_string(),
                json!({ "type": "array", "items": category }),
            )])
        }
        SectionSchema::Composite { fields } => object_schema(
            fields
                .iter()
                .map(|f| (f.key.clone(), section_response_schema(&f.section)))
                .collect(),
        ),
        SectionSchema::List { item_fields, .. } => {
            let items = if item_fields.is_empty() {
                json!({ "type": "string" })
            } else {
                string_row_schema(item_fields)
            };
            object_schema(vec![(
                "items".to_string(),
                json!({ "type": "array", "items": items }),
            )])
        }
    }
}
