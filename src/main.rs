use anyhow::{Context, Result};
use bcstream::pipeline::batcher::{Batch, BatchLabels};
use bcstream::pipeline::config::PipelineConfig;
use bcstream::pipeline::generator::ExampleGenerator;
use bcstream::pipeline::split::train_test;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
struct BatchSummary {
    split: &'static str,
    index: usize,
    audio_shape: Vec<usize>,
    label_shape: Vec<usize>,
    peak: f32,
    labels: LabelSummary,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum LabelSummary {
    Classes(Vec<i64>),
    Soft(Vec<Vec<f32>>),
}

impl BatchSummary {
    fn new(split: &'static str, index: usize, batch: &Batch) -> Self {
        let labels = match &batch.labels {
            BatchLabels::Classes(a) => LabelSummary::Classes(a.to_vec()),
            BatchLabels::Soft(a) => LabelSummary::Soft(a.rows().into_iter().map(|r| r.to_vec()).collect()),
        };
        BatchSummary {
            split,
            index,
            audio_shape: batch.audio.shape().to_vec(),
            label_shape: batch.label_shape(),
            peak: batch.audio.iter().fold(0.0, |m: f32, s| m.max(s.abs())),
            labels,
        }
    }
}

fn progress_bar(len: u64, message: String) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    pb.set_message(message);
    Ok(pb)
}

fn warm_cache(split: &str, generator: &ExampleGenerator) -> Result<()> {
    let pb = progress_bar(
        generator.catalog().len() as u64,
        format!("Converting {split} audio"),
    )?;
    generator
        .loader()
        .warm_cache(generator.catalog(), |_| pb.inc(1))
        .with_context(|| format!("converting {split} audio"))?;
    pb.finish_with_message(format!("{split} audio ready"));
    Ok(())
}

fn preview(
    split: &'static str,
    generator: &ExampleGenerator,
    batch_size: usize,
    count: usize,
    summaries: &mut Vec<BatchSummary>,
) -> Result<()> {
    let pb = progress_bar(count as u64, format!("Drawing {split} batches"))?;
    for (index, batch) in generator.batches(batch_size)?.take(count).enumerate() {
        let batch = batch.with_context(|| format!("{split} batch {index}"))?;
        summaries.push(BatchSummary::new(split, index, &batch));
        pb.inc(1);
    }
    pb.finish_with_message(format!("{split} batches drawn"));
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = PipelineConfig::from_file(Path::new(&config_path))
        .with_context(|| format!("loading {config_path}"))?;

    let (train, test) = train_test(&config, config.output.test_fold)?;
    info!(
        "Train: {} clips, test: {} clips, {} classes",
        train.catalog().len(),
        test.catalog().len(),
        train.class_count()
    );

    if config.output.warm_cache {
        warm_cache("train", &train)?;
        warm_cache("test", &test)?;
    }

    let mut summaries = Vec::new();
    let batch_size = config.batch.batch_size;
    preview("train", &train, batch_size, config.output.preview_batches, &mut summaries)?;
    preview("test", &test, batch_size, config.output.preview_batches, &mut summaries)?;

    let json = serde_json::to_string_pretty(&summaries)?;
    let mut file = File::create(&config.output.summary_file)
        .with_context(|| format!("creating {}", config.output.summary_file.display()))?;
    file.write_all(json.as_bytes())?;
    info!("Batch summary written to {}", config.output.summary_file.display());
    Ok(())
}
