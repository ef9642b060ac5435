use std::path::PathBuf;

use thiserror::Error;

use crate::domain::entities::SampleShape;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Audio unavailable at {path}: {reason}")]
    DataUnavailable { path: PathBuf, reason: String },
    #[error("Sample shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: SampleShape, found: SampleShape },
    #[error("Metadata error: {0}")]
    Metadata(#[from] csv::Error),
    #[error("Config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Resampling error: {0}")]
    Resample(#[from] rubato::ResampleError),
    #[error("Resampler setup error: {0}")]
    ResamplerSetup(#[from] rubato::ResamplerConstructionError),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::Configuration(msg.into())
    }

    pub fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::DataUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
