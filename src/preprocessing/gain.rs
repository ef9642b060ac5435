//! Frame-wise loudness estimates used to balance between-class mixes.
//!
//! Each frame of `n_fft` samples (hop `n_fft / 2`) is reduced to a power
//! figure in dB, floored at [`MIN_DB`]. Two modes:
//!
//! - `AWeighting`: Hann-windowed power spectrum weighted by the A-curve,
//!   summed over bins.
//! - `Rms`: mean square of the raw frame.

use num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

pub const MIN_DB: f32 = -80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainMode {
    #[default]
    AWeighting,
    Rms,
}

pub fn frame_size(sample_rate: u32) -> usize {
    if sample_rate <= 22050 { 2048 } else { 4096 }
}

/// A-weighting curve in dB for the `n_fft / 2 + 1` real-FFT bins.
pub fn a_weight(sample_rate: u32, n_fft: usize) -> Vec<f32> {
    let bins = n_fft / 2 + 1;
    let nyquist = (sample_rate / 2) as f64;
    (0..bins)
        .map(|k| {
            let freq = nyquist * k as f64 / (bins - 1) as f64;
            let freq_sq = if k == 0 { 1.0 } else { freq * freq };
            let weight = 2.0
                + 20.0
                    * (2.0 * 12194f64.log10() + 2.0 * freq_sq.log10()
                        - (freq_sq + 12194f64.powi(2)).log10()
                        - (freq_sq + 20.6f64.powi(2)).log10()
                        - 0.5 * (freq_sq + 107.7f64.powi(2)).log10()
                        - 0.5 * (freq_sq + 737.9f64.powi(2)).log10());
            (weight as f32).max(MIN_DB)
        })
        .collect()
}

/// Per-frame gain in dB. A clip shorter than one frame yields no frames.
pub fn compute_gain(samples: &[f32], sample_rate: u32, mode: GainMode) -> Vec<f32> {
    let n_fft = frame_size(sample_rate);
    if samples.len() < n_fft {
        return Vec::new();
    }
    let hop = n_fft / 2;
    let floor = 10f32.powf(MIN_DB / 10.0);

    let powers: Vec<f32> = match mode {
        GainMode::Rms => samples
            .windows(n_fft)
            .step_by(hop)
            .map(|frame| frame.iter().map(|s| s * s).sum::<f32>() / n_fft as f32)
            .collect(),
        GainMode::AWeighting => {
            let mut planner = FftPlanner::new();
            let fft = planner.plan_fft_forward(n_fft);
            // periodic Hann, i.e. hanning(n_fft + 1) without its last point
            let window: Vec<f32> = (0..n_fft)
                .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n_fft as f32).cos()))
                .collect();
            let weights: Vec<f32> = a_weight(sample_rate, n_fft)
                .into_iter()
                .map(|db| 10f32.powf(db / 10.0))
                .collect();
            let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];

            samples
                .windows(n_fft)
                .step_by(hop)
                .map(|frame| {
                    for ((b, &s), &w) in buffer.iter_mut().zip(frame).zip(&window) {
                        *b = Complex::new(s * w, 0.0);
                    }
                    fft.process(&mut buffer);
                    buffer[..weights.len()]
                        .iter()
                        .zip(&weights)
                        .map(|(c, w)| c.norm_sqr() * w)
                        .sum::<f32>()
                })
                .collect()
        }
    };

    powers.into_iter().map(|p| 10.0 * p.max(floor).log10()).collect()
}

/// Loudest frame of the clip, or [`MIN_DB`] when it has no full frame.
pub fn max_gain(samples: &[f32], sample_rate: u32, mode: GainMode) -> f32 {
    compute_gain(samples, sample_rate, mode)
        .into_iter()
        .fold(MIN_DB, f32::max)
}
