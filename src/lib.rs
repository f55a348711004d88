//! # SOAP Note Builder
//!
//! Turns a clinical session transcript into a structured SOAP note shaped by a
//! template, for physical therapy and chiropractic documentation.
//!
//! ## Core Concepts
//!
//! - **Template**: A [`NoteSchema`] declaring the note's sections and their kinds
//!   (free text, table, categorized table, composite, list)
//! - **Model Output**: Loosely-structured JSON returned by a language model, which may
//!   be partial, malformed, or use variant shapes
//! - **Structured Note**: A [`StructuredNote`] containing every template section in
//!   canonical form, with template defaults wherever the model said nothing
//! - **Validation**: A final check that the core SOAP sections are present
//!
//! ## Example
//!
//! ```rust,ignore
//! use soap_note_builder::*;
//! use serde_json::json;
//!
//! let registry = TemplateRegistry::builtin()?;
//! let schema = registry.get("knee_evaluation")?;
//!
//! let prompt = build_note_prompt(schema, "Patient reports right knee pain when climbing stairs...")?;
//! // send `prompt` to a model, then:
//! let outcome = complete_from_raw(schema, &model_reply, MergeOptions::default());
//!
//! assert!(outcome.validation.is_valid);
//! println!("{}", render_markdown(schema, &outcome.note.to_value()));
//! ```
//!
//! With the `gemini` feature, [`llm::NoteGenerator`] runs the whole round trip and
//! [`llm::Transcriber`] produces transcripts from session recordings.

pub mod config;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod prompt;
pub mod render;
pub mod schema;
pub mod templates;
pub mod validator;

#[cfg(feature = "gemini")]
pub mod llm;

pub use config::GeneratorConfig;
pub use error::{Result, SoapNoteError};
pub use merge::*;
pub use pipeline::*;
pub use prompt::*;
pub use render::render_markdown;
pub use schema::*;
pub use templates::TemplateRegistry;
pub use validator::{validate_note, ValidationReport};
