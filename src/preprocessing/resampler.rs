use crate::domain::errors::{PipelineError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Produces a mono copy of `source` at `rate` Hz, written to `destination`.
///
/// Implementations must leave `destination` absent when they fail.
pub trait RateConverter: Send + Sync {
    fn convert(&self, source: &Path, rate: u32, destination: &Path) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Shells out to ffmpeg: `ffmpeg -i <src> -ar <rate> -b:a 16k -ac 1 <dst>`.
///
/// Output goes to a `.part` sibling first and is renamed once ffmpeg succeeds.
pub struct FfmpegConverter {
    program: String,
}

impl FfmpegConverter {
    pub fn new(program: impl Into<String>) -> Self {
        FfmpegConverter { program: program.into() }
    }
}

impl Default for FfmpegConverter {
    fn default() -> Self {
        FfmpegConverter::new("ffmpeg")
    }
}

impl RateConverter for FfmpegConverter {
    fn convert(&self, source: &Path, rate: u32, destination: &Path) -> Result<()> {
        let partial = partial_path(destination);
        let status = Command::new(&self.program)
            .args(["-loglevel", "error", "-y", "-i"])
            .arg(source)
            .arg("-ar")
            .arg(rate.to_string())
            .args(["-b:a", "16k", "-ac", "1", "-f", "wav"])
            .arg(&partial)
            .status()
            .map_err(|e| PipelineError::unavailable(source, format!("cannot run {}: {e}", self.program)))?;

        if !status.success() {
            let _ = fs::remove_file(&partial);
            return Err(PipelineError::unavailable(
                source,
                format!("{} exited with {status}", self.program),
            ));
        }
        fs::rename(&partial, destination)?;
        Ok(())
    }

    fn name(&self) -> &'static str { "ffmpeg" }
}

/// In-process converter: downmix, band-limited sinc resampling, 16-bit PCM output.
#[derive(Default)]
pub struct SincResampler;

impl RateConverter for SincResampler {
    fn convert(&self, source: &Path, rate: u32, destination: &Path) -> Result<()> {
        let (samples, spec) = read_wav_mono(source)?;
        let scale = match spec.sample_format {
            SampleFormat::Float => 32768.0,
            SampleFormat::Int => 32768.0 / (1u64 << (spec.bits_per_sample - 1)) as f32,
        };
        let resampled = resample(&samples, spec.sample_rate, rate)?;

        let out_spec = WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let partial = partial_path(destination);
        let written = write_pcm16(&partial, out_spec, &resampled, scale);
        if written.is_err() {
            let _ = fs::remove_file(&partial);
        }
        written?;
        fs::rename(&partial, destination)?;
        Ok(())
    }

    fn name(&self) -> &'static str { "sinc" }
}

fn write_pcm16(path: &Path, spec: WavSpec, samples: &[f32], scale: f32) -> Result<()> {
    let mut writer = WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample((s * scale).round().clamp(-32768.0, 32767.0) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Decode a WAV file to mono. Integer samples keep their raw integer scale.
pub fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, WavSpec)> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32))
            .collect::<std::result::Result<_, _>>()?,
        SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };
    Ok((samples, spec))
}

/// Whole-clip rate conversion with rubato's sinc resampler.
///
/// The filter delay is trimmed so the output is aligned with the input and
/// holds `round(len * to_rate / from_rate)` samples.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let ratio = to_rate as f64 / from_rate as f64;
    let expected = (samples.len() as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)?;
    let delay = resampler.output_delay();

    let waves_in = vec![samples.to_vec()];
    let mut out = resampler.process(&waves_in, None)?.swap_remove(0);
    while out.len() < delay + expected {
        let tail = resampler.process_partial(None::<&[Vec<f32>]>, None)?.swap_remove(0);
        if tail.is_empty() {
            break;
        }
        out.extend(tail);
    }

    let mut aligned = out.split_off(delay.min(out.len()));
    aligned.resize(expected, 0.0);
    debug!("Resampled {} -> {} samples ({} Hz -> {} Hz)", samples.len(), aligned.len(), from_rate, to_rate);
    Ok(aligned)
}
