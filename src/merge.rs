use crate::error::SoapNoteError;
use crate::schema::{
    blank_row, NamedSection, NoteSchema, SectionSchema, TableCategory, TableRow, SECTION_TYPE_KEY,
};
use crate::validator::{validate_fields, ValidationReport};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::str::FromStr;

/// What a table section holds when the model leaves it out.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TableFallback {
    /// The template's literal example rows. These read like real findings
    /// ("Lachman's Test: Negative"), so every use is logged and reported.
    #[default]
    ExampleRows,
    /// Keep the first column of each example row (the test or motion name) and blank the rest.
    LabelsOnly,
    /// No rows. Categorized sections keep their category titles.
    Empty,
}

impl FromStr for TableFallback {
    type Err = SoapNoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "example_rows" | "example" => Ok(Self::ExampleRows),
            "labels_only" | "labels" => Ok(Self::LabelsOnly),
            "empty" | "none" => Ok(Self::Empty),
            other => Err(SoapNoteError::Config(format!(
                "unknown table fallback '{}' (expected example_rows, labels_only or empty)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeOptions {
    #[serde(default)]
    pub table_fallback: TableFallback,
}

/// Dotted section paths that did not come from the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeReport {
    pub defaulted: Vec<String>,
    pub example_rows_used: Vec<String>,
}

impl MergeReport {
    pub fn is_complete(&self) -> bool {
        self.defaulted.is_empty()
    }
}

/// A note filled from a template. Serializes as the bare JSON object that gets persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredNote(Map<String, Value>);

impl StructuredNote {
    pub fn section(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn validate(&self) -> ValidationReport {
        validate_fields(&self.0)
    }
}

impl From<StructuredNote> for Value {
    fn from(note: StructuredNote) -> Self {
        note.into_value()
    }
}

pub struct SchemaFiller<'a> {
    schema: &'a NoteSchema,
    options: MergeOptions,
}

impl<'a> SchemaFiller<'a> {
    pub fn new(schema: &'a NoteSchema) -> Self {
        Self {
            schema,
            options: MergeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }

    /// Fills every section of the template, preferring values from `llm_output`.
    /// Any JSON value is accepted; anything that is not an object counts as empty.
    pub fn fill(&self, llm_output: &Value) -> (StructuredNote, MergeReport) {
        let mut report = MergeReport::default();
        let fields = {
            let mut ctx = FillContext {
                options: self.options,
                report: &mut report,
            };
            ctx.fill_sections(&self.schema.sections, llm_output.as_object(), "")
        };

        debug!(
            "Filled template '{}': {} section(s) defaulted, {} table(s) using example rows",
            self.schema.id,
            report.defaulted.len(),
            report.example_rows_used.len()
        );

        (StructuredNote(fields), report)
    }

    /// The all-defaults note, i.e. a merge against an empty object.
    pub fn defaults(&self) -> (StructuredNote, MergeReport) {
        self.fill(&Value::Object(Map::new()))
    }
}

pub fn fill_schema(schema: &NoteSchema, llm_output: &Value) -> StructuredNote {
    SchemaFiller::new(schema).fill(llm_output).0
}

pub fn fill_schema_with(
    schema: &NoteSchema,
    llm_output: &Value,
    options: MergeOptions,
) -> (StructuredNote, MergeReport) {
    SchemaFiller::new(schema).with_options(options).fill(llm_output)
}

struct FillContext<'r> {
    options: MergeOptions,
    report: &'r mut MergeReport,
}

impl FillContext<'_> {
    fn fill_sections(
        &mut self,
        sections: &[NamedSection],
        source: Option<&Map<String, Value>>,
        prefix: &str,
    ) -> Map<String, Value> {
        let mut out = Map::new();
        for named in sections {
            let path = if prefix.is_empty() {
                named.key.clone()
            } else {
                format!("{}.{}", prefix, named.key)
            };
            let provided = source
                .and_then(|m| m.get(&named.key))
                .filter(|v| !v.is_null());
            let value = self.fill_section(&named.section, provided, &path);
            out.insert(named.key.clone(), value);
        }
        out
    }

    fn fill_section(&mut self, section: &SectionSchema, provided: Option<&Value>, path: &str) -> Value {
        let mut out = Map::new();
        out.insert(
            SECTION_TYPE_KEY.to_string(),
            Value::String(section.type_name().to_string()),
        );

        match section {
            SectionSchema::Wysiwyg { content, .. } => {
                let text = provided.and_then(|v| match v {
                    Value::Object(m) => m.get("content").and_then(text_value),
                    other => text_value(other),
                });
                let text = text.unwrap_or_else(|| {
                    self.report.defaulted.push(path.to_string());
                    content.clone()
                });
                out.insert("content".to_string(), Value::String(text));
            }
            SectionSchema::Table { columns, rows } => {
                let filled = match provided.and_then(|v| container(v, "rows")) {
                    Some(given) => normalize_rows(given, columns),
                    None => {
                        self.report.defaulted.push(path.to_string());
                        self.fallback_rows(rows, columns, path)
                    }
                };
                out.insert("rows".to_string(), Value::Array(filled));
            }
            SectionSchema::Categorized {
                columns,
                categories,
            } => {
                let filled = match provided.and_then(|v| container(v, "categories")) {
                    Some(given) => given
                        .iter()
                        .filter_map(Value::as_object)
                        .map(|category| {
                            let rows = category
                                .get("rows")
                                .and_then(|r| container(r, "rows"))
                                .map(|r| normalize_rows(r, columns))
                                .unwrap_or_default();
                            json!({ "title": cell(category.get("title")), "rows": rows })
                        })
                        .collect(),
                    None => {
                        self.report.defaulted.push(path.to_string());
                        self.fallback_categories(categories, columns, path)
                    }
                };
                out.insert("categories".to_string(), Value::Array(filled));
            }
            SectionSchema::Composite { fields } => {
                let source = provided.and_then(Value::as_object);
                out.extend(self.fill_sections(fields, source, path));
            }
            SectionSchema::List { item_fields, .. } => {
                let items = match provided.and_then(|v| container(v, "items")) {
                    Some(given) => normalize_items(given, item_fields),
                    None => {
                        self.report.defaulted.push(path.to_string());
                        Vec::new()
                    }
                };
                out.insert("items".to_string(), Value::Array(items));
            }
        }

        Value::Object(out)
    }

    fn fallback_rows(&mut self, rows: &[TableRow], columns: &[String], path: &str) -> Vec<Value> {
        match self.options.table_fallback {
            TableFallback::ExampleRows => {
                if !rows.is_empty() {
                    self.flag_example_rows(path);
                }
                rows.iter()
                    .map(|r| Value::Object(normalize_row(r, columns)))
                    .collect()
            }
            TableFallback::LabelsOnly => rows
                .iter()
                .map(|r| Value::Object(label_row(r, columns)))
                .collect(),
            TableFallback::Empty => Vec::new(),
        }
    }

    fn fallback_categories(
        &mut self,
        categories: &[TableCategory],
        columns: &[String],
        path: &str,
    ) -> Vec<Value> {
        if self.options.table_fallback == TableFallback::ExampleRows
            && categories.iter().any(|c| !c.rows.is_empty())
        {
            self.flag_example_rows(path);
        }

        categories
            .iter()
            .map(|category| {
                let rows: Vec<Value> = match self.options.table_fallback {
                    TableFallback::ExampleRows => category
                        .rows
                        .iter()
                        .map(|r| Value::Object(normalize_row(r, columns)))
                        .collect(),
                    TableFallback::LabelsOnly => category
                        .rows
                        .iter()
                        .map(|r| Value::Object(label_row(r, columns)))
                        .collect(),
                    TableFallback::Empty => Vec::new(),
                };
                json!({ "title": category.title, "rows": rows })
            })
            .collect()
    }

    fn flag_example_rows(&mut self, path: &str) {
        warn!(
            "Section '{}' missing from model output; filling with template example rows",
            path
        );
        self.report.example_rows_used.push(path.to_string());
    }
}

/// The array either at `value[field]` or, when the model skipped the wrapper, `value` itself.
fn container<'v>(value: &'v Value, field: &str) -> Option<&'v Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(m) => m.get(field).and_then(Value::as_array),
        _ => None,
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => parts
            .iter()
            .map(|p| p.as_str())
            .collect::<Option<Vec<&str>>>()
            .map(|parts| parts.join("\n")),
        _ => None,
    }
}

fn cell(value: Option<&Value>) -> Value {
    match value {
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(Value::Number(n)) => Value::String(n.to_string()),
        Some(Value::Bool(b)) => Value::String(b.to_string()),
        _ => Value::String(String::new()),
    }
}

fn normalize_row(row: &Map<String, Value>, columns: &[String]) -> TableRow {
    columns
        .iter()
        .map(|c| (c.clone(), cell(row.get(c))))
        .collect()
}

fn label_row(row: &Map<String, Value>, columns: &[String]) -> TableRow {
    let mut blank = blank_row(columns);
    if let Some(first) = columns.first() {
        blank.insert(first.clone(), cell(row.get(first)));
    }
    blank
}

fn normalize_rows(rows: &[Value], columns: &[String]) -> Vec<Value> {
    rows.iter()
        .filter_map(Value::as_object)
        .map(|r| Value::Object(normalize_row(r, columns)))
        .collect()
}

fn normalize_items(items: &[Value], item_fields: &[String]) -> Vec<Value> {
    if item_fields.is_empty() {
        items
            .iter()
            .filter(|v| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)))
            .map(|v| cell(Some(v)))
            .collect()
    } else {
        normalize_rows(items, item_fields)
    }
}
