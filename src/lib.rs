//! Streaming audio batches for ESC-10/ESC-50 training with between-class mixing.
//!
//! Catalog view -> sample loader -> transform chain -> example generator -> batcher.

pub mod domain;
pub mod infrastructure;
pub mod pipeline;
pub mod preprocessing;

pub use domain::entities::{AudioClip, CatalogEntry, Example, LabelVector};
pub use domain::errors::{PipelineError, Result};
pub use infrastructure::catalog::CatalogView;
pub use infrastructure::loader::SampleLoader;
pub use pipeline::batcher::{Batch, BatchLabels, Batcher};
pub use pipeline::config::PipelineConfig;
pub use pipeline::generator::{ExampleGenerator, ExampleStream, StopHandle};
