pub mod gain;
pub mod resampler;
