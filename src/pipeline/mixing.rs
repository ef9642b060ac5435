//! Between-class mixing.
//!
//! Two clips are blended with a weight `t` derived from the mixing ratio `r`
//! and the loudness difference of the clips, so the quieter clip is not
//! drowned out when `r` favours the louder one:
//!
//! ```text
//! t   = 1 / (1 + 10^((g1 - g2) / 20) * (1 - r) / r)
//! mix = (t * s1 + (1 - t) * s2) / sqrt(t^2 + (1 - t)^2)
//! ```
//!
//! `g1`, `g2` are the loudest frame gains of each clip in dB. The label is
//! blended linearly with `r` itself.

use crate::domain::entities::AudioClip;
use crate::preprocessing::gain::{GainMode, max_gain};

pub fn mix_weight(r: f32, gain1: f32, gain2: f32) -> f32 {
    if r <= 0.0 {
        return 0.0;
    }
    if r >= 1.0 {
        return 1.0;
    }
    1.0 / (1.0 + 10f32.powf((gain1 - gain2) / 20.0) * (1.0 - r) / r)
}

/// Clips of different length are mixed over the longer one, the shorter zero-extended.
pub fn mix_clips(clip1: &AudioClip, clip2: &AudioClip, r: f32, sample_rate: u32, mode: GainMode) -> AudioClip {
    let gain1 = max_gain(&clip1.samples, sample_rate, mode);
    let gain2 = max_gain(&clip2.samples, sample_rate, mode);
    let t = mix_weight(r, gain1, gain2);
    let norm = (t * t + (1.0 - t) * (1.0 - t)).sqrt();

    let len = clip1.len().max(clip2.len());
    let at = |clip: &AudioClip, i: usize| clip.samples.get(i).copied().unwrap_or(0.0);
    let samples = (0..len)
        .map(|i| (t * at(clip1, i) + (1.0 - t) * at(clip2, i)) / norm)
        .collect();
    AudioClip::new(samples)
}

/// `r * one_hot(label1) + (1 - r) * one_hot(label2)`.
pub fn mix_labels(label1: usize, label2: usize, r: f32, class_count: usize) -> Vec<f32> {
    let mut label = vec![0.0; class_count];
    label[label1] += r;
    label[label2] += 1.0 - r;
    label
}
