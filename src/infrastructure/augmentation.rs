use crate::domain::entities::AudioClip;
use crate::domain::errors::{PipelineError, Result};
use rand::{Rng, RngCore};

pub trait Augmentation {
    fn apply(&self, clip: AudioClip, rng: &mut dyn RngCore) -> AudioClip;
    fn name(&self) -> &'static str;
}

/// Flags selecting the per-clip stages.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformConfig {
    pub scale: bool,
    pub max_scale: f32,
    pub pad: usize,
    pub crop_length: usize,
    pub normalize: bool,
    pub normalize_factor: f32,
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig {
            scale: false,
            max_scale: 1.25,
            pad: 0,
            crop_length: 0,
            normalize: false,
            normalize_factor: 32768.0,
        }
    }
}

/// Stages in fixed order: scale, pad, crop, normalize.
pub struct TransformChain {
    augmentations: Vec<Box<dyn Augmentation>>,
}

impl TransformChain {
    pub fn new(config: &TransformConfig) -> Result<Self> {
        let mut augmentations: Vec<Box<dyn Augmentation>> = Vec::new();
        if config.scale {
            if !(config.max_scale >= 1.0) {
                return Err(PipelineError::config(format!(
                    "max_scale must be >= 1.0, got {}",
                    config.max_scale
                )));
            }
            augmentations.push(Box::new(RandomScale { max_scale: config.max_scale }));
        }
        if config.pad > 0 {
            augmentations.push(Box::new(Padding { amount: config.pad }));
        }
        if config.crop_length > 0 {
            augmentations.push(Box::new(RandomCrop { length: config.crop_length }));
        }
        if config.normalize {
            if !(config.normalize_factor > 0.0) {
                return Err(PipelineError::config(format!(
                    "normalize_factor must be positive, got {}",
                    config.normalize_factor
                )));
            }
            augmentations.push(Box::new(Normalize { factor: config.normalize_factor }));
        }
        Ok(TransformChain { augmentations })
    }

    pub fn apply(&self, clip: AudioClip, rng: &mut dyn RngCore) -> AudioClip {
        self.augmentations
            .iter()
            .fold(clip, |clip, aug| aug.apply(clip, rng))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.augmentations.iter().map(|a| a.name()).collect()
    }
}

struct RandomScale {
    max_scale: f32,
}

impl Augmentation for RandomScale {
    fn apply(&self, clip: AudioClip, rng: &mut dyn RngCore) -> AudioClip {
        let factor = rng.random_range(1.0 / self.max_scale..=self.max_scale);
        clip.map(|s| s * factor)
    }

    fn name(&self) -> &'static str { "scale" }
}

struct Padding {
    amount: usize,
}

impl Augmentation for Padding {
    fn apply(&self, clip: AudioClip, _rng: &mut dyn RngCore) -> AudioClip {
        let mut padded = vec![0.0; clip.len() + 2 * self.amount];
        padded[self.amount..self.amount + clip.len()].copy_from_slice(&clip.samples);
        AudioClip::new(padded)
    }

    fn name(&self) -> &'static str { "pad" }
}

/// Random window of `length` samples; shorter clips are zero-padded at the end.
struct RandomCrop {
    length: usize,
}

impl Augmentation for RandomCrop {
    fn apply(&self, clip: AudioClip, rng: &mut dyn RngCore) -> AudioClip {
        let mut samples = clip.samples;
        if samples.len() <= self.length {
            samples.resize(self.length, 0.0);
            return AudioClip::new(samples);
        }
        let start = rng.random_range(0..=samples.len() - self.length);
        AudioClip::new(samples[start..start + self.length].to_vec())
    }

    fn name(&self) -> &'static str { "crop" }
}

struct Normalize {
    factor: f32,
}

impl Augmentation for Normalize {
    fn apply(&self, clip: AudioClip, _rng: &mut dyn RngCore) -> AudioClip {
        let factor = self.factor;
        clip.map(|s| s / factor)
    }

    fn name(&self) -> &'static str { "normalize" }
}

/// Post-mix gain perturbation, uniform in `[-db, db]` decibels.
pub struct RandomGain {
    pub db: f32,
}

impl Augmentation for RandomGain {
    fn apply(&self, clip: AudioClip, rng: &mut dyn RngCore) -> AudioClip {
        let gain_db = rng.random_range(-self.db..=self.db);
        let factor = 10f32.powf(gain_db / 20.0);
        clip.map(|s| s * factor)
    }

    fn name(&self) -> &'static str { "gain" }
}
