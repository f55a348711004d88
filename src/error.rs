use thiserror::Error;

#[derive(Error, Debug)]
pub enum SoapNoteError {
    #[error("Invalid template '{template}': {details}")]
    InvalidSchema { template: String, details: String },

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Duplicate template id: {0}")]
    DuplicateTemplate(String),

    #[error("Transcript is empty")]
    EmptyTranscript,

    #[error("Model output is not a usable JSON object: {0}")]
    MalformedModelOutput(String),

    #[error("Model request failed: {0}")]
    ModelRequest(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "gemini")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, SoapNoteError>;
