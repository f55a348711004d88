use crate::config::GeneratorConfig;
use crate::error::{Result, SoapNoteError};
use crate::llm::client::GeminiClient;
use crate::llm::prompts::{TRANSCRIPTION_PROMPT, TRANSCRIPTION_SYSTEM_PROMPT};
use crate::llm::types::{Blob, Content, FileData, GenerationConfig, Part};
use base64::Engine;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Recordings larger than this are uploaded instead of sent inline.
pub const INLINE_AUDIO_LIMIT: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub source_name: String,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

/// Turns a session recording into a speaker-labelled transcript.
pub struct Transcriber {
    client: GeminiClient,
    model: String,
    prompt: String,
}

impl Transcriber {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            prompt: TRANSCRIPTION_PROMPT.to_string(),
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(GeminiClient::from_config(config), config.model.clone())
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub async fn transcribe_file(&self, path: &Path) -> Result<Transcript> {
        let mime_type = recording_mime_type(path)?;
        let source_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let size = fs::metadata(path).await?.len();
        if size == 0 {
            return Err(SoapNoteError::TranscriptionFailed(format!(
                "{} is empty",
                path.display()
            )));
        }

        let media = if size <= INLINE_AUDIO_LIMIT {
            let bytes = fs::read(path).await?;
            debug!("Sending {} inline ({} bytes)", source_name, size);
            Part::InlineData {
                inline_data: Blob {
                    mime_type: mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(bytes),
                },
            }
        } else {
            let remote = self.client.upload_file(path).await?;
            Part::FileData {
                file_data: FileData {
                    mime_type: remote.mime_type,
                    file_uri: remote.uri,
                },
            }
        };

        let contents = vec![Content::user_parts(vec![
            media,
            Part::Text {
                text: self.prompt.clone(),
            },
        ])];

        let text = self
            .client
            .generate_content(
                &self.model,
                TRANSCRIPTION_SYSTEM_PROMPT,
                contents,
                GenerationConfig::text(Some(0.0)),
            )
            .await
            .map_err(|e| SoapNoteError::TranscriptionFailed(e.to_string()))?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(SoapNoteError::TranscriptionFailed(format!(
                "model returned no transcript for {}",
                source_name
            )));
        }

        info!("Transcribed {} ({} characters)", source_name, text.len());

        Ok(Transcript {
            text,
            source_name,
            mime_type,
            created_at: Utc::now(),
        })
    }
}

fn recording_mime_type(path: &Path) -> Result<String> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    match mime.type_().as_str() {
        "audio" | "video" => Ok(mime.essence_str().to_string()),
        _ => Err(SoapNoteError::TranscriptionFailed(format!(
            "{} is not an audio or video recording ({})",
            path.display(),
            mime
        ))),
    }
}
