use crate::schema::{title_case, NamedSection, NoteSchema, SectionSchema};
use serde_json::Value;

/// Renders a structured note as Markdown, using the template for headings and column order.
/// Missing or malformed parts of the note render as empty.
pub fn render_markdown(schema: &NoteSchema, note: &Value) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", schema.title));

    for named in &schema.sections {
        output.push_str(&format!("## {}\n\n", named.display_label()));
        render_section(&mut output, named, note.get(&named.key), 3);
    }

    output
}

fn render_section(output: &mut String, named: &NamedSection, value: Option<&Value>, depth: usize) {
    match &named.section {
        SectionSchema::Wysiwyg { .. } => {
            let text = value
                .and_then(|v| v.get("content"))
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default();
            if text.is_empty() {
                output.push_str("_Not documented._\n\n");
            } else {
                output.push_str(text);
                output.push_str("\n\n");
            }
        }
        SectionSchema::Table { columns, .. } => {
            let rows = value
                .and_then(|v| v.get("rows"))
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            render_table(output, columns, rows);
        }
        SectionSchema::Categorized { columns, .. } => {
            let categories = value
                .and_then(|v| v.get("categories"))
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if categories.is_empty() {
                output.push_str("_No entries._\n\n");
            }
            for category in categories {
                let title = category.get("title").and_then(Value::as_str).unwrap_or("");
                if !title.is_empty() {
                    output.push_str(&format!("**{}**\n\n", title));
                }
                let rows = category
                    .get("rows")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                render_table(output, columns, rows);
            }
        }
        SectionSchema::Composite { fields } => {
            let heading = "#".repeat(depth.min(6));
            for field in fields {
                output.push_str(&format!("{} {}\n\n", heading, field.display_label()));
                render_section(output, field, value.and_then(|v| v.get(&field.key)), depth + 1);
            }
        }
        SectionSchema::List { item_fields, .. } => {
            let items = value
                .and_then(|v| v.get("items"))
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if items.is_empty() {
                output.push_str("_None recorded._\n\n");
                return;
            }
            for item in items {
                output.push_str(&format!("- {}\n", list_item_text(item, item_fields)));
            }
            output.push('\n');
        }
    }
}

fn render_table(output: &mut String, columns: &[String], rows: &[Value]) {
    if rows.is_empty() {
        output.push_str("_No entries._\n\n");
        return;
    }

    let header: Vec<String> = columns.iter().map(|c| title_case(c)).collect();
    output.push_str(&format!("| {} |\n", header.join(" | ")));
    output.push_str(&format!("|{}\n", " --- |".repeat(columns.len())));

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| escape_cell(row.get(c).and_then(Value::as_str).unwrap_or("")))
            .collect();
        output.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    output.push('\n');
}

fn list_item_text(item: &Value, item_fields: &[String]) -> String {
    match item {
        Value::String(s) => s.clone(),
        Value::Object(m) => item_fields
            .iter()
            .filter_map(|f| {
                m.get(f)
                    .and_then(Value::as_str)
                    .filter(|v| !v.is_empty())
                    .map(|v| format!("{}: {}", title_case(f), v))
            })
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', "<br>")
}
