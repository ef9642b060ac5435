use crate::domain::errors::{PipelineError, Result};
use crate::infrastructure::augmentation::TransformConfig;
use crate::preprocessing::gain::GainMode;
use crate::preprocessing::resampler::{FfmpegConverter, SincResampler, RateConverter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub augment: AugmentConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub metadata_path: PathBuf,
    pub audio_dir: PathBuf,
    pub folds: BTreeSet<u32>,
    #[serde(default)]
    pub only_esc10: bool,
    #[serde(default = "default_audio_rate")]
    pub audio_rate: u32,
    #[serde(default)]
    pub converter: ConverterKind,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConverterKind {
    #[default]
    Ffmpeg,
    Sinc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    pub randomize: bool,
    /// Enables random scale before cropping and random gain after mixing.
    pub strong_augment: bool,
    pub pad: usize,
    pub crop_length: usize,
    pub mix: bool,
    pub normalize: bool,
    pub max_scale: f32,
    pub gain_db: f32,
    pub normalize_factor: f32,
    pub mix_gain: GainMode,
    pub seed: Option<u64>,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        AugmentConfig {
            randomize: true,
            strong_augment: false,
            pad: 0,
            crop_length: 0,
            mix: false,
            normalize: false,
            max_scale: 1.25,
            gain_db: 6.0,
            normalize_factor: 32768.0,
            mix_gain: GainMode::AWeighting,
            seed: None,
        }
    }
}

impl AugmentConfig {
    pub fn transform_config(&self) -> TransformConfig {
        TransformConfig {
            scale: self.strong_augment,
            max_scale: self.max_scale,
            pad: self.pad,
            crop_length: self.crop_length,
            normalize: self.normalize,
            normalize_factor: self.normalize_factor,
        }
    }

    /// Settings for evaluation: fixed order, no mixing, no random gain.
    pub fn for_evaluation(&self) -> Self {
        AugmentConfig {
            randomize: false,
            strong_augment: false,
            mix: false,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.strong_augment && !(self.gain_db >= 0.0) {
            return Err(PipelineError::config(format!(
                "gain_db must be non-negative, got {}",
                self.gain_db
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig { batch_size: 16 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub test_fold: u32,
    pub warm_cache: bool,
    pub preview_batches: usize,
    pub summary_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            test_fold: 1,
            warm_cache: true,
            preview_batches: 4,
            summary_file: PathBuf::from("batch_summary.json"),
        }
    }
}

fn default_audio_rate() -> u32 {
    44100
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

impl DatasetConfig {
    pub fn rate_converter(&self) -> Box<dyn RateConverter> {
        match self.converter {
            ConverterKind::Ffmpeg => Box::new(FfmpegConverter::new(self.ffmpeg.clone())),
            ConverterKind::Sinc => Box::new(SincResampler),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)?;
        Self::from_toml(&config_str)
    }

    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dataset.folds.is_empty() {
            return Err(PipelineError::config("dataset.folds must not be empty"));
        }
        if self.dataset.audio_rate == 0 {
            return Err(PipelineError::config("dataset.audio_rate must be > 0"));
        }
        if self.batch.batch_size == 0 {
            return Err(PipelineError::config("batch.batch_size must be > 0"));
        }
        self.augment.validate()
    }
}
