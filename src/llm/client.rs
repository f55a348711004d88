use crate::config::{GeneratorConfig, DEFAULT_BASE_URL};
use crate::error::{Result, SoapNoteError};
use crate::llm::types::*;
use log::debug;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;

const GEMINI_UPLOAD_URL: &str = "https://generativelanguage.googleapis.com/upload/v1beta/files";
const FILE_POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_FILE_POLLS: usize = 90;

/// A hosted completion backend: prompt in, raw text out.
pub trait CompletionClient {
    fn complete(&self, request: CompletionRequest) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    upload_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            upload_url: GEMINI_UPLOAD_URL.to_string(),
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(config.api_key.clone()).with_base_url(&config.base_url)
    }

    /// Points the client at another endpoint (a proxy or a local mock).
    /// Uploads go to `{base_url}/upload/files` unless the base is the public API.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url != DEFAULT_BASE_URL {
            self.upload_url = format!("{}/upload/files", base_url);
        }
        self.base_url = base_url;
        self
    }

    /// Resumable upload of a local file; waits until the service reports it ACTIVE.
    pub async fn upload_file(&self, path: &Path) -> Result<RemoteFile> {
        let display_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SoapNoteError::ModelRequest("Invalid file name".to_string()))?
            .to_string();
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();
        let bytes = fs::read(path).await?;
        let size = bytes.len();

        let session_url = self.start_upload(&display_name, &mime_type, size).await?;

        let res = self
            .client
            .post(&session_url)
            .header("Content-Length", size.to_string())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let mut file = parse_file_resource(ensure_success(res, "File upload").await?.json().await?)?;

        let mut polls = 0;
        while file.state != "ACTIVE" {
            match file.state.as_str() {
                "FAILED" => {
                    return Err(SoapNoteError::ModelRequest(format!(
                        "Service failed to process '{}'",
                        display_name
                    )))
                }
                state if polls >= MAX_FILE_POLLS => {
                    return Err(SoapNoteError::ModelRequest(format!(
                        "File '{}' was still {} after {} checks",
                        display_name, state, polls
                    )))
                }
                _ => {}
            }
            polls += 1;
            sleep(FILE_POLL_INTERVAL).await;

            let url = format!("{}/{}?key={}", self.base_url, file.name, self.api_key);
            let res = self.client.get(&url).send().await?;
            let refreshed = parse_file_resource(ensure_success(res, "File status").await?.json().await?)?;
            file.state = refreshed.state;
            if !refreshed.uri.is_empty() {
                file.uri = refreshed.uri;
            }
        }

        if file.uri.is_empty() {
            return Err(SoapNoteError::ModelRequest(format!(
                "Upload of '{}' returned no uri",
                display_name
            )));
        }
        debug!("Uploaded {} as {} ({} bytes)", display_name, file.name, size);

        Ok(RemoteFile {
            uri: file.uri,
            name: file.name,
            display_name,
            mime_type,
            state: file.state,
        })
    }

    /// Opens a resumable upload session and returns its URL.
    async fn start_upload(&self, display_name: &str, mime_type: &str, size: usize) -> Result<String> {
        let res = self
            .client
            .post(format!("{}?key={}", self.upload_url, self.api_key))
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let res = ensure_success(res, "Upload init").await?;

        res.headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| SoapNoteError::ModelRequest("No upload URL in response headers".to_string()))
    }

    pub async fn generate_content(
        &self,
        model: &str,
        system_prompt: &str,
        messages: Vec<Content>,
        generation_config: GenerationConfig,
    ) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let system_instruction = if system_prompt.trim().is_empty() {
            None
        } else {
            Some(Content::user(system_prompt))
        };

        let payload = GenerateContentRequest {
            contents: messages,
            system_instruction,
            generation_config,
        };

        let res = self.client.post(&url).json(&payload).send().await?;
        let body: GenerateContentResponse = ensure_success(res, "Gemini API").await?.json().await?;
        extract_text(body)
    }
}

impl CompletionClient for GeminiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.generate_content(
            &request.model,
            &request.system_instruction,
            vec![Content::user(request.prompt)],
            GenerationConfig::json(request.response_schema, request.temperature),
        )
        .await
    }
}

async fn ensure_success(res: Response, what: &str) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await?;
    Err(SoapNoteError::ModelRequest(format!(
        "{} failed (status {}): {}",
        what, status, body
    )))
}

/// File resource as returned by upload and status calls, either bare or under `file`.
#[derive(Debug, Deserialize)]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default = "processing_state")]
    state: String,
}

fn processing_state() -> String {
    "PROCESSING".to_string()
}

fn parse_file_resource(mut body: Value) -> Result<FileResource> {
    let resource = match body.get_mut("file") {
        Some(file) => file.take(),
        None => body,
    };
    serde_json::from_value(resource)
        .map_err(|e| SoapNoteError::ModelRequest(format!("Unexpected file resource: {}", e)))
}

fn extract_text(body: GenerateContentResponse) -> Result<String> {
    let candidate = body
        .candidates
        .ok_or_else(|| {
            let feedback = body
                .prompt_feedback
                .map(|f| f.to_string())
                .unwrap_or_default();
            SoapNoteError::ModelRequest(format!("No candidates returned {}", feedback))
        })?
        .into_iter()
        .next()
        .ok_or_else(|| SoapNoteError::ModelRequest("Empty candidates list".to_string()))?;

    let content = candidate.content.ok_or_else(|| {
        SoapNoteError::ModelRequest(format!(
            "Candidate has no content (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ))
    })?;

    let text: Vec<String> = content
        .parts
        .into_iter()
        .filter_map(|part| match part {
            Part::Text { text } => Some(text),
            _ => None,
        })
        .collect();

    if text.is_empty() {
        return Err(SoapNoteError::ModelRequest(
            "Model returned non-text content".to_string(),
        ));
    }

    Ok(text.concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(raw: Value) -> GenerateContentResponse {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = response(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "{\"a\":" }, { "text": " 1}" }] },
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(extract_text(body).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_text_errors() {
        let blocked = response(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        let err = extract_text(blocked).unwrap_err().to_string();
        assert!(err.contains("SAFETY"));

        let empty = response(json!({ "candidates": [] }));
        assert!(extract_text(empty).is_err());

        let no_content = response(json!({ "candidates": [{ "finishReason": "MAX_TOKENS" }] }));
        assert!(extract_text(no_content)
            .unwrap_err()
            .to_string()
            .contains("MAX_TOKENS"));
    }

    #[test]
    fn test_file_resource_shapes() {
        let wrapped = parse_file_resource(json!({
            "file": { "name": "files/abc", "uri": "https://host/files/abc", "state": "ACTIVE" }
        }))
        .unwrap();
        assert_eq!(wrapped.name, "files/abc");
        assert_eq!(wrapped.uri, "https://host/files/abc");
        assert_eq!(wrapped.state, "ACTIVE");

        let bare = parse_file_resource(json!({ "name": "files/abc" })).unwrap();
        assert_eq!(bare.state, "PROCESSING");
        assert!(bare.uri.is_empty());

        assert!(parse_file_resource(json!({ "file": { "uri": "x" } })).is_err());
    }

    #[test]
    fn test_request_wire_format() {
        let payload = GenerateContentRequest {
            contents: vec![Content::user_parts(vec![
                Part::Text {
                    text: "Transcribe".to_string(),
                },
                Part::InlineData {
                    inline_data: Blob {
                        mime_type: "audio/mpeg".to_string(),
                        data: "AAAA".to_string(),
                    },
                },
            ])],
            system_instruction: None,
            generation_config: GenerationConfig::json(Some(json!({ "type": "object" })), Some(0.1)),
        };

        let wire = serde_json::to_value(&payload).unwrap();
        assert_eq!(wire["contents"][0]["parts"][0]["text"], "Transcribe");
        assert_eq!(wire["contents"][0]["parts"][1]["inlineData"]["mimeType"], "audio/mpeg");
        assert_eq!(wire["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(wire["generationConfig"]["responseSchema"]["type"], "object");
        assert!(wire.get("systemInstruction").is_none());
    }

    #[test]
    fn test_custom_base_url_moves_uploads() {
        let client = GeminiClient::new("key".to_string()).with_base_url("http://localhost:9000/");
        assert_eq!(client.base_url, "http://localhost:9000");
        assert_eq!(client.upload_url, "http://localhost:9000/upload/files");

        let public = GeminiClient::new("key".to_string()).with_base_url(DEFAULT_BASE_URL);
        assert_eq!(public.upload_url, GEMINI_UPLOAD_URL);
    }
}
