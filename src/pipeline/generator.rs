use crate::domain::entities::{AudioClip, Example, LabelVector};
use crate::domain::errors::{PipelineError, Result};
use crate::infrastructure::augmentation::{Augmentation, RandomGain, TransformChain};
use crate::infrastructure::catalog::CatalogView;
use crate::infrastructure::loader::SampleLoader;
use crate::pipeline::batcher::Batcher;
use crate::pipeline::config::AugmentConfig;
use crate::pipeline::mixing::{mix_clips, mix_labels};
use crate::preprocessing::gain::GainMode;
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct StopState {
    /// Streams handed out so far; stream k was opened with index k.
    opened: AtomicU64,
    /// Streams with an index below this have been stopped.
    stopped_below: AtomicU64,
}

/// Cooperative cancellation for the streams of one generator.
///
/// `stop()` ends every stream opened before the call. Streams opened
/// afterwards are unaffected, and a stopped stream never resumes.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<StopState>);

impl StopHandle {
    pub fn stop(&self) {
        let opened = self.0.opened.load(Ordering::SeqCst);
        self.0.stopped_below.fetch_max(opened, Ordering::SeqCst);
    }

    /// True once every stream opened so far has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.0.stopped_below.load(Ordering::SeqCst) >= self.0.opened.load(Ordering::SeqCst)
    }

    fn open(&self) -> u64 {
        self.0.opened.fetch_add(1, Ordering::SeqCst)
    }

    fn stops(&self, index: u64) -> bool {
        index < self.0.stopped_below.load(Ordering::SeqCst)
    }
}

/// Turns a catalog view into an endless sequence of training examples.
pub struct ExampleGenerator {
    catalog: CatalogView,
    loader: SampleLoader,
    chain: TransformChain,
    post_gain: Option<RandomGain>,
    randomize: bool,
    mix: bool,
    mix_gain: GainMode,
    seed: Option<u64>,
    stop: StopHandle,
}

impl ExampleGenerator {
    pub fn new(catalog: CatalogView, loader: SampleLoader, augment: &AugmentConfig) -> Result<Self> {
        augment.validate()?;
        let chain = TransformChain::new(&augment.transform_config())?;
        debug!(
            "Example generator over {} entries: transforms {:?}, mix = {}, randomize = {}",
            catalog.len(),
            chain.names(),
            augment.mix,
            augment.randomize
        );
        Ok(ExampleGenerator {
            catalog,
            loader,
            chain,
            post_gain: augment.strong_augment.then_some(RandomGain { db: augment.gain_db }),
            randomize: augment.randomize,
            mix: augment.mix,
            mix_gain: augment.mix_gain,
            seed: augment.seed,
            stop: StopHandle::default(),
        })
    }

    pub fn catalog(&self) -> &CatalogView {
        &self.catalog
    }

    pub fn loader(&self) -> &SampleLoader {
        &self.loader
    }

    pub fn class_count(&self) -> usize {
        self.catalog.class_count()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ends every stream opened so far at its next item boundary.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// A fresh stream with its own order and RNG. Earlier `stop()` calls
    /// do not reach it.
    pub fn stream(&self) -> ExampleStream<'_> {
        let index = self.stop.open();
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index)),
            None => StdRng::from_os_rng(),
        };
        ExampleStream {
            generator: self,
            index,
            rng,
            order1: Vec::new(),
            order2: Vec::new(),
            cursor: 0,
            epoch: 0,
        }
    }

    pub fn batches(&self, batch_size: usize) -> Result<Batcher<'_>> {
        if batch_size == 0 {
            return Err(PipelineError::config("batch_size must be > 0"));
        }
        Ok(Batcher::new(self.stream(), batch_size))
    }

    fn load_transformed(&self, index: usize, rng: &mut StdRng) -> Result<(AudioClip, usize)> {
        let entry = self
            .catalog
            .entry(index)
            .ok_or_else(|| PipelineError::config(format!("catalog index {index} out of range")))?;
        let clip = self.loader.load(entry)?;
        Ok((self.chain.apply(clip, rng), entry.label))
    }

    fn example(&self, i1: usize, i2: usize, rng: &mut StdRng) -> Result<Example> {
        let (clip1, label1) = self.load_transformed(i1, rng)?;

        let (audio, label) = if self.mix {
            let (clip2, label2) = self.load_transformed(i2, rng)?;
            let r: f32 = rng.random();
            let audio = mix_clips(&clip1, &clip2, r, self.loader.rate(), self.mix_gain);
            let label = mix_labels(label1, label2, r, self.class_count());
            (audio, LabelVector::Soft(label))
        } else {
            (clip1, LabelVector::Class(label1))
        };

        let audio = match &self.post_gain {
            Some(gain) => gain.apply(audio, rng),
            None => audio,
        };
        Ok(Example { audio, label })
    }
}

/// Iterator over examples, wrapping to a new epoch when the orders run out.
pub struct ExampleStream<'a> {
    generator: &'a ExampleGenerator,
    index: u64,
    rng: StdRng,
    order1: Vec<usize>,
    order2: Vec<usize>,
    cursor: usize,
    epoch: u64,
}

impl ExampleStream<'_> {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn start_epoch(&mut self) {
        let n = self.generator.catalog.len();
        self.order1 = (0..n).collect();
        self.order2 = (0..n).collect();
        if self.generator.randomize {
            self.order1.shuffle(&mut self.rng);
            self.order2.shuffle(&mut self.rng);
        }
        self.cursor = 0;
        self.epoch += 1;
        debug!("Starting epoch {} over {} entries", self.epoch, n);
    }
}

impl Iterator for ExampleStream<'_> {
    type Item = Result<Example>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.generator.stop.stops(self.index) {
            return None;
        }
        if self.cursor >= self.order1.len() {
            self.start_epoch();
        }
        let (i1, i2) = (self.order1[self.cursor], self.order2[self.cursor]);
        self.cursor += 1;
        Some(self.generator.example(i1, i2, &mut self.rng))
    }
}
