use crate::domain::errors::{PipelineError, Result};
use crate::infrastructure::catalog::{CatalogView, read_metadata};
use crate::infrastructure::loader::SampleLoader;
use crate::pipeline::config::{AugmentConfig, PipelineConfig};
use crate::pipeline::generator::ExampleGenerator;
use log::info;
use std::collections::BTreeSet;

/// Generator over the given folds with the dataset settings of `config`.
pub fn build_generator(
    config: &PipelineConfig,
    folds: &BTreeSet<u32>,
    augment: &AugmentConfig,
) -> Result<ExampleGenerator> {
    let rows = read_metadata(&config.dataset.metadata_path)?;
    let view = CatalogView::from_rows(&rows, folds, config.dataset.only_esc10)?;
    let loader = SampleLoader::new(
        &config.dataset.audio_dir,
        config.dataset.audio_rate,
        config.dataset.rate_converter(),
    );
    ExampleGenerator::new(view, loader, augment)
}

/// Cross-validation split holding out `test_fold`.
///
/// The training side keeps the configured augmentation; the test side runs in
/// file order without mixing or random gain.
pub fn train_test(config: &PipelineConfig, test_fold: u32) -> Result<(ExampleGenerator, ExampleGenerator)> {
    if !config.dataset.folds.contains(&test_fold) {
        return Err(PipelineError::config(format!(
            "test fold {} not among folds {:?}",
            test_fold, config.dataset.folds
        )));
    }
    let train_folds: BTreeSet<u32> = config
        .dataset
        .folds
        .iter()
        .copied()
        .filter(|&f| f != test_fold)
        .collect();
    let test_folds = BTreeSet::from([test_fold]);
    info!("Split: train folds {:?}, test fold {}", train_folds, test_fold);

    let train = build_generator(config, &train_folds, &config.augment)?;
    let test = build_generator(config, &test_folds, &config.augment.for_evaluation())?;
    Ok((train, test))
}
