use crate::domain::entities::{AudioClip, CatalogEntry};
use crate::domain::errors::{PipelineError, Result};
use crate::infrastructure::catalog::CatalogView;
use crate::preprocessing::resampler::{RateConverter, read_wav_mono};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Resolves catalog entries to samples at `rate`, converting on first use.
///
/// Converted copies live under `<root>/<rate>/<filename>`; a file already
/// present there is never converted again.
pub struct SampleLoader {
    root: PathBuf,
    rate: u32,
    converter: Box<dyn RateConverter>,
}

impl SampleLoader {
    pub fn new(root: impl Into<PathBuf>, rate: u32, converter: Box<dyn RateConverter>) -> Self {
        SampleLoader {
            root: root.into(),
            rate,
            converter,
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(self.rate.to_string())
    }

    pub fn cached_path(&self, entry: &CatalogEntry) -> PathBuf {
        self.cache_dir().join(&entry.filename)
    }

    pub fn source_path(&self, entry: &CatalogEntry) -> PathBuf {
        self.root.join(&entry.filename)
    }

    pub fn ensure_converted(&self, entry: &CatalogEntry) -> Result<PathBuf> {
        let destination = self.cached_path(entry);
        if destination.is_file() {
            return Ok(destination);
        }

        let source = self.source_path(entry);
        if !source.is_file() {
            return Err(PipelineError::unavailable(source, "source audio not found"));
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::unavailable(parent, e))?;
        }

        debug!(
            "Converting {} to {} Hz with {}",
            source.display(),
            self.rate,
            self.converter.name()
        );
        if let Err(e) = self.converter.convert(&source, self.rate, &destination) {
            // whatever a failed run left behind must not be served as a cache hit
            discard(&destination);
            return Err(match e {
                PipelineError::DataUnavailable { .. } => e,
                other => PipelineError::unavailable(&source, other),
            });
        }

        if !destination.is_file() {
            return Err(PipelineError::unavailable(
                &source,
                format!("{} produced no output", self.converter.name()),
            ));
        }
        Ok(destination)
    }

    pub fn load(&self, entry: &CatalogEntry) -> Result<AudioClip> {
        let path = self.ensure_converted(entry)?;
        read_clip(&path)
    }

    /// Convert every entry of the view up front, reporting each one to `progress`.
    pub fn warm_cache(&self, view: &CatalogView, mut progress: impl FnMut(&CatalogEntry)) -> Result<()> {
        for entry in view.entries() {
            self.ensure_converted(entry)?;
            progress(entry);
        }
        Ok(())
    }
}

fn discard(destination: &Path) {
    let mut partial = destination.as_os_str().to_owned();
    partial.push(".part");
    for path in [destination, Path::new(&partial)] {
        if path.exists() {
            warn!("Removing leftover {}", path.display());
            let _ = fs::remove_file(path);
        }
    }
}

fn read_clip(path: &Path) -> Result<AudioClip> {
    let (samples, _spec) = read_wav_mono(path).map_err(|e| PipelineError::unavailable(path, e))?;
    Ok(AudioClip::new(samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::resampler::SincResampler;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingConverter {
        calls: Arc<AtomicUsize>,
    }

    impl RateConverter for CountingConverter {
        fn convert(&self, source: &Path, rate: u32, destination: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            SincResampler.convert(source, rate, destination)
        }

        fn name(&self) -> &'static str { "counting" }
    }

    /// Fails its first run after writing a truncated file, then behaves.
    struct FlakyConverter {
        calls: Arc<AtomicUsize>,
    }

    impl RateConverter for FlakyConverter {
        fn convert(&self, source: &Path, rate: u32, destination: &Path) -> Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                fs::write(destination, b"RIFF")?;
                return Err(PipelineError::unavailable(source, "killed mid-write"));
            }
            SincResampler.convert(source, rate, destination)
        }

        fn name(&self) -> &'static str { "flaky" }
    }

    struct SilentFailure;

    impl RateConverter for SilentFailure {
        fn convert(&self, _source: &Path, _rate: u32, _destination: &Path) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &'static str { "noop" }
    }

    fn entry(filename: &str) -> CatalogEntry {
        CatalogEntry {
            filename: filename.to_string(),
            label: 0,
            fold: 1,
            is_esc10: true,
        }
    }

    fn write_wav(path: &Path, rate: u32, samples: &[i16]) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_conversion_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("a.wav"), 16000, &[500; 1600]);
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = SampleLoader::new(
            dir.path(),
            8000,
            Box::new(CountingConverter { calls: Arc::clone(&calls) }),
        );

        let first = loader.load(&entry("a.wav")).unwrap();
        let cached = fs::read(loader.cached_path(&entry("a.wav"))).unwrap();
        let second = loader.load(&entry("a.wav")).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(first.len(), 800);
        assert_eq!(fs::read(loader.cached_path(&entry("a.wav"))).unwrap(), cached);
        assert!(dir.path().join("8000").join("a.wav").is_file());
    }

    #[test]
    fn test_samples_keep_integer_scale() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("b.wav"), 8000, &[-32768, 0, 32767]);
        let loader = SampleLoader::new(dir.path(), 8000, Box::new(SincResampler));
        let clip = loader.load(&entry("b.wav")).unwrap();
        assert_eq!(clip.samples, vec![-32768.0, 0.0, 32767.0]);
    }

    #[test]
    fn test_missing_source_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SampleLoader::new(dir.path(), 8000, Box::new(SincResampler));
        let err = loader.load(&entry("missing.wav")).unwrap_err();
        assert!(matches!(err, PipelineError::DataUnavailable { .. }));
    }

    #[test]
    fn test_unreadable_source_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("junk.wav"), b"not a wav file").unwrap();
        let loader = SampleLoader::new(dir.path(), 8000, Box::new(SincResampler));
        let err = loader.load(&entry("junk.wav")).unwrap_err();
        assert!(matches!(err, PipelineError::DataUnavailable { .. }));
    }

    #[test]
    fn test_converter_without_output_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("c.wav"), 8000, &[1, 2, 3]);
        let loader = SampleLoader::new(dir.path(), 16000, Box::new(SilentFailure));
        let err = loader.load(&entry("c.wav")).unwrap_err();
        assert!(matches!(err, PipelineError::DataUnavailable { .. }));
    }

    #[test]
    fn test_failed_conversion_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("d.wav"), 8000, &[42; 64]);
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = SampleLoader::new(
            dir.path(),
            8000,
            Box::new(FlakyConverter { calls: Arc::clone(&calls) }),
        );

        let err = loader.load(&entry("d.wav")).unwrap_err();
        assert!(matches!(err, PipelineError::DataUnavailable { .. }));
        assert!(!loader.cached_path(&entry("d.wav")).exists());

        let clip = loader.load(&entry("d.wav")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(clip.samples, vec![42.0; 64]);
    }
}
