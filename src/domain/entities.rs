use std::fmt;

/// One row of the catalog after fold/ESC-10 filtering. `label` is already dense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub filename: String,
    pub label: usize,
    pub fold: u32,
    pub is_esc10: bool,
}

/// Mono samples at the pipeline's configured rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>) -> Self {
        AudioClip { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        AudioClip::new(self.samples.into_iter().map(f).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LabelVector {
    /// Scalar class id, produced when mixing is off.
    Class(usize),
    /// Blend of two one-hot vectors, produced by between-class mixing.
    Soft(Vec<f32>),
}

impl LabelVector {
    pub fn shape(&self) -> LabelShape {
        match self {
            LabelVector::Class(_) => LabelShape::Scalar,
            LabelVector::Soft(v) => LabelShape::Width(v.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub audio: AudioClip,
    pub label: LabelVector,
}

impl Example {
    pub fn shape(&self) -> SampleShape {
        SampleShape {
            clip_length: self.audio.len(),
            label: self.label.shape(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelShape {
    Scalar,
    Width(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleShape {
    pub clip_length: usize,
    pub label: LabelShape,
}

impl fmt::Display for SampleShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label {
            LabelShape::Scalar => write!(f, "audio [{}], label scalar", self.clip_length),
            LabelShape::Width(w) => write!(f, "audio [{}], label [{}]", self.clip_length, w),
        }
    }
}
