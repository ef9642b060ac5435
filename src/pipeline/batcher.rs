use crate::domain::entities::{Example, LabelShape, LabelVector, SampleShape};
use crate::domain::errors::{PipelineError, Result};
use crate::pipeline::generator::ExampleStream;
use ndarray::{Array1, Array2, Array3, ArrayView1, s};

#[derive(Debug, Clone, PartialEq)]
pub enum BatchLabels {
    /// `[batch_size]` class ids.
    Classes(Array1<i64>),
    /// `[batch_size, class_count]` mixed labels.
    Soft(Array2<f32>),
}

/// `audio` is `[batch_size, clip_length, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub audio: Array3<f32>,
    pub labels: BatchLabels,
}

impl Batch {
    fn allocate(batch_size: usize, shape: SampleShape) -> Self {
        let labels = match shape.label {
            LabelShape::Scalar => BatchLabels::Classes(Array1::zeros(batch_size)),
            LabelShape::Width(width) => BatchLabels::Soft(Array2::zeros((batch_size, width))),
        };
        Batch {
            audio: Array3::zeros((batch_size, shape.clip_length, 1)),
            labels,
        }
    }

    pub fn len(&self) -> usize {
        self.audio.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clip_length(&self) -> usize {
        self.audio.shape()[1]
    }

    pub fn label_shape(&self) -> Vec<usize> {
        match &self.labels {
            BatchLabels::Classes(a) => a.shape().to_vec(),
            BatchLabels::Soft(a) => a.shape().to_vec(),
        }
    }

    fn set_row(&mut self, row: usize, example: Example) -> Result<()> {
        let found = example.shape();
        self.audio
            .slice_mut(s![row, .., 0])
            .assign(&ArrayView1::from(example.audio.samples.as_slice()));
        match (&mut self.labels, example.label) {
            (BatchLabels::Classes(labels), LabelVector::Class(class)) => labels[row] = class as i64,
            (BatchLabels::Soft(labels), LabelVector::Soft(soft)) => {
                labels.row_mut(row).assign(&ArrayView1::from(soft.as_slice()))
            }
            (labels, _) => {
                let label = match labels {
                    BatchLabels::Classes(_) => LabelShape::Scalar,
                    BatchLabels::Soft(a) => LabelShape::Width(a.ncols()),
                };
                let expected = SampleShape { clip_length: self.audio.shape()[1], label };
                return Err(PipelineError::ShapeMismatch { expected, found });
            }
        }
        Ok(())
    }
}

/// Groups a stream into full batches. The first sample fixes the shape.
pub struct Batcher<'a> {
    stream: ExampleStream<'a>,
    batch_size: usize,
    shape: Option<SampleShape>,
}

impl<'a> Batcher<'a> {
    pub fn new(stream: ExampleStream<'a>, batch_size: usize) -> Self {
        Batcher { stream, batch_size, shape: None }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn sample_shape(&self) -> Option<SampleShape> {
        self.shape
    }

    fn check_shape(&mut self, example: &Example) -> Result<SampleShape> {
        let found = example.shape();
        let expected = *self.shape.get_or_insert(found);
        if found != expected {
            return Err(PipelineError::ShapeMismatch { expected, found });
        }
        Ok(expected)
    }

    /// `Ok(None)` when the stream was stopped before the batch filled.
    fn fill(&mut self) -> Result<Option<Batch>> {
        let mut batch: Option<Batch> = None;
        for row in 0..self.batch_size {
            let example = match self.stream.next() {
                Some(example) => example?,
                None => return Ok(None),
            };
            let shape = self.check_shape(&example)?;
            batch
                .get_or_insert_with(|| Batch::allocate(self.batch_size, shape))
                .set_row(row, example)?;
        }
        Ok(batch)
    }
}

impl Iterator for Batcher<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fill().transpose()
    }
}
