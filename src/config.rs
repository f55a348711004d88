use crate::error::{Result, SoapNoteError};
use crate::merge::{MergeOptions, TableFallback};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(skip_serializing)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Send the template's response schema so the model is constrained to the note shape.
    #[serde(default = "default_true")]
    pub structured_output: bool,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub merge: MergeOptions,

    /// Directory of extra template JSON files loaded on top of the built-in ones.
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("structured_output", &self.structured_output)
            .field("temperature", &self.temperature)
            .field("merge", &self.merge)
            .field("template_dir", &self.template_dir)
            .finish()
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_true() -> bool {
    true
}

impl GeneratorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: default_model(),
            base_url: default_base_url(),
            structured_output: true,
            temperature: None,
            merge: MergeOptions::default(),
            template_dir: None,
        }
    }

    /// Reads `GEMINI_API_KEY` (required) and the optional `SOAP_NOTE_*` overrides.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: GeneratorConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SoapNoteError::Config("GEMINI_API_KEY is not set".to_string()))?;

        let mut config = Self::new(api_key);

        if let Some(model) = lookup("SOAP_NOTE_MODEL") {
            config.model = model;
        }
        if let Some(base_url) = lookup("SOAP_NOTE_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(fallback) = lookup("SOAP_NOTE_TABLE_FALLBACK") {
            config.merge.table_fallback = fallback.parse::<TableFallback>()?;
        }
        if let Some(flag) = lookup("SOAP_NOTE_STRUCTURED_OUTPUT") {
            config.structured_output = parse_bool("SOAP_NOTE_STRUCTURED_OUTPUT", &flag)?;
        }
        if let Some(temperature) = lookup("SOAP_NOTE_TEMPERATURE") {
            let value = temperature.trim().parse::<f32>().map_err(|e| {
                SoapNoteError::Config(format!("SOAP_NOTE_TEMPERATURE '{}': {}", temperature, e))
            })?;
            config.temperature = Some(value);
        }
        if let Some(dir) = lookup("SOAP_NOTE_TEMPLATE_DIR") {
            config.template_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(SoapNoteError::Config("api_key is empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(SoapNoteError::Config("model is empty".to_string()));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(SoapNoteError::Config(format!(
                    "temperature {} must be between 0.0 and 2.0",
                    t
                )));
            }
        }
        Ok(())
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(SoapNoteError::Config(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}
