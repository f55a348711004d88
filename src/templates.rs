use crate::config::GeneratorConfig;
use crate::error::{Result, SoapNoteError};
use crate::schema::{NoteKind, NoteSchema, Profession};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("knee_evaluation", include_str!("../templates/knee_evaluation.json")),
    ("shoulder_evaluation", include_str!("../templates/shoulder_evaluation.json")),
    ("hip_evaluation", include_str!("../templates/hip_evaluation.json")),
    ("neck_evaluation", include_str!("../templates/neck_evaluation.json")),
    ("back_evaluation", include_str!("../templates/back_evaluation.json")),
    ("ankle_foot_evaluation", include_str!("../templates/ankle_foot_evaluation.json")),
    ("cervical_adjustment", include_str!("../templates/cervical_adjustment.json")),
    ("thoracic_adjustment", include_str!("../templates/thoracic_adjustment.json")),
    ("lumbar_adjustment", include_str!("../templates/lumbar_adjustment.json")),
    ("full_spine_adjustment", include_str!("../templates/full_spine_adjustment.json")),
    ("extremity_adjustment", include_str!("../templates/extremity_adjustment.json")),
    ("maintenance_care", include_str!("../templates/maintenance_care.json")),
    ("daily_note", include_str!("../templates/daily_note.json")),
    ("discharge_summary", include_str!("../templates/discharge_summary.json")),
];

/// Note templates keyed by id.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, NoteSchema>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every template shipped with the crate.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        for (id, raw) in BUILTIN_TEMPLATES {
            let schema = NoteSchema::from_json_str(raw)?;
            if schema.id != *id {
                return Err(SoapNoteError::InvalidSchema {
                    template: (*id).to_string(),
                    details: format!("file declares id '{}'", schema.id),
                });
            }
            registry.register(schema)?;
        }
        debug!("Loaded {} built-in templates", registry.len());
        Ok(registry)
    }

    /// Built-in templates, then any found in `config.template_dir`.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let mut registry = Self::builtin()?;
        if let Some(dir) = &config.template_dir {
            let loaded = registry.load_dir(dir)?;
            info!("Loaded {} custom template(s) from {}", loaded, dir.display());
        }
        Ok(registry)
    }

    /// Adds a template. Fails if the template is invalid or its id is taken.
    pub fn register(&mut self, schema: NoteSchema) -> Result<()> {
        schema.validate()?;
        if self.templates.contains_key(&schema.id) {
            return Err(SoapNoteError::DuplicateTemplate(schema.id));
        }
        self.templates.insert(schema.id.clone(), schema);
        Ok(())
    }

    /// Adds or replaces a template, returning the one it replaced.
    pub fn upsert(&mut self, schema: NoteSchema) -> Result<Option<NoteSchema>> {
        schema.validate()?;
        Ok(self.templates.insert(schema.id.clone(), schema))
    }

    /// Loads every `*.json` file in `dir`, replacing templates with the same id.
    /// Returns the number of templates loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in &paths {
            let raw = fs::read_to_string(path)?;
            let schema = NoteSchema::from_json_str(&raw).map_err(|e| match e {
                SoapNoteError::SerializationError(err) => SoapNoteError::InvalidSchema {
                    template: path.display().to_string(),
                    details: err.to_string(),
                },
                other => other,
            })?;

            let id = schema.id.clone();
            if self.upsert(schema)?.is_some() {
                info!("Template '{}' replaced by {}", id, path.display());
            } else {
                debug!("Template '{}' loaded from {}", id, path.display());
            }
        }

        Ok(paths.len())
    }

    pub fn get(&self, id: &str) -> Result<&NoteSchema> {
        self.templates
            .get(id)
            .ok_or_else(|| SoapNoteError::UnknownTemplate(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoteSchema> {
        self.templates.values()
    }

    pub fn by_profession(&self, profession: Profession) -> Vec<&NoteSchema> {
        self.iter().filter(|t| t.profession == profession).collect()
    }

    pub fn by_kind(&self, kind: NoteKind) -> Vec<&NoteSchema> {
        self.iter().filter(|t| t.kind == kind).collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
