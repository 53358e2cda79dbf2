use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("ort (onnxruntime) error: {0}")]
    Ort(#[from] ort::Error),
    #[error("hf-hub: {0}")]
    HuggingFace(#[from] hf_hub::api::sync::ApiError),
    #[cfg(feature = "ocr")]
    #[error("tesseract: {0}")]
    Tesseract(#[from] tesseract::TesseractError),
    #[cfg(feature = "ocr")]
    #[error("tesseract tsv: {0}")]
    Tsv(#[from] csv::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error("config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("model failure: {0}")]
    Model(String),
    #[error("invalid input image: {0}")]
    InvalidInput(#[source] image::ImageError),
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
    #[error("layout detection failed: {0}")]
    Detection(#[source] Box<Error>),
    #[error("text recognition failed: {0}")]
    Recognition(#[source] Box<Error>),
    #[error("rendering failed: {0}")]
    Render(#[source] Box<Error>),
    #[error("failed to persist results: {0}")]
    Persist(#[source] Box<Error>),
    #[error("failed to load results: {0}")]
    Load(#[source] Box<Error>),
    #[error("the file {} does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("font {}: {reason}", .path.display())]
    Font { path: PathBuf, reason: String },
    #[error("config: {0}")]
    Config(String),
}

/// Pipeline phase a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Decode,
    Detect,
    Recognize,
    Render,
    Persist,
    Load,
    Config,
    Other,
}

impl Error {
    pub fn phase(&self) -> Phase {
        match self {
            Error::InvalidInput(_) | Error::UnsupportedContentType(_) => Phase::Decode,
            Error::Detection(_) => Phase::Detect,
            Error::Recognition(_) => Phase::Recognize,
            Error::Render(_) | Error::Font { .. } => Phase::Render,
            Error::Persist(_) => Phase::Persist,
            Error::Load(_) | Error::NotFound(_) => Phase::Load,
            Error::Config(_) | Error::Toml(_) => Phase::Config,
            _ => Phase::Other,
        }
    }

    /// True when this error, or the error it wraps, is a missing persisted result.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Detection(inner)
            | Error::Recognition(inner)
            | Error::Render(inner)
            | Error::Persist(inner)
            | Error::Load(inner) => inner.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
