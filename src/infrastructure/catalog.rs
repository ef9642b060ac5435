use std::collections::BTreeSet;
use std::path::Path;

use log::info;
use serde::{Deserialize, Deserializer};

use crate::domain::entities::CatalogEntry;
use crate::domain::errors::{PipelineError, Result};

pub const ESC50_CLASSES: usize = 50;

/// ESC-50 class ids that make up ESC-10, sorted. Position is the dense label.
pub const ESC10_CLASS_IDS: [usize; 10] = [0, 1, 10, 11, 12, 20, 21, 38, 40, 41];

/// Raw metadata record. Extra CSV columns (`category`, `src_file`, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataRow {
    pub filename: String,
    pub fold: u32,
    pub target: usize,
    #[serde(deserialize_with = "parse_flag")]
    pub esc10: bool,
}

fn parse_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim() {
        "True" | "true" | "TRUE" | "1" => Ok(true),
        "False" | "false" | "FALSE" | "0" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid esc10 flag '{other}'"))),
    }
}

pub fn read_metadata(path: &Path) -> Result<Vec<MetadataRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<MetadataRow>, _>>()?;
    Ok(rows)
}

fn esc10_label(row: &MetadataRow) -> Result<usize> {
    ESC10_CLASS_IDS
        .binary_search(&row.target)
        .map_err(|_| {
            PipelineError::config(format!(
                "{}: tagged esc10 but target {} is not an ESC-10 class",
                row.filename, row.target
            ))
        })
}

/// Read-only index over the metadata restricted to a set of folds.
#[derive(Debug, Clone)]
pub struct CatalogView {
    entries: Vec<CatalogEntry>,
    class_count: usize,
}

impl CatalogView {
    pub fn from_csv(path: &Path, folds: &BTreeSet<u32>, only_esc10: bool) -> Result<Self> {
        let rows = read_metadata(path)?;
        Self::from_rows(&rows, folds, only_esc10)
    }

    pub fn from_rows(rows: &[MetadataRow], folds: &BTreeSet<u32>, only_esc10: bool) -> Result<Self> {
        let class_count = if only_esc10 { ESC10_CLASS_IDS.len() } else { ESC50_CLASSES };

        let mut entries = Vec::new();
        for row in rows {
            if !folds.contains(&row.fold) || (only_esc10 && !row.esc10) {
                continue;
            }
            let label = if only_esc10 { esc10_label(row)? } else { row.target };
            if label >= class_count {
                return Err(PipelineError::config(format!(
                    "{}: target {} outside {} classes",
                    row.filename, row.target, class_count
                )));
            }
            entries.push(CatalogEntry {
                filename: row.filename.clone(),
                label,
                fold: row.fold,
                is_esc10: row.esc10,
            });
        }

        if entries.is_empty() {
            return Err(PipelineError::config(format!(
                "no metadata rows for folds {:?} (only_esc10 = {})",
                folds, only_esc10
            )));
        }
        info!(
            "Catalog view: {} entries, {} classes, folds {:?}",
            entries.len(),
            class_count,
            folds
        );
        Ok(CatalogView { entries, class_count })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn class_count(&self) -> usize {
        self.class_count
    }
}
