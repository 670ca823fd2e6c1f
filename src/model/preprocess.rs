//! Model-time preprocessing of feature matrices.
//!
//! This is a separate stage from ingestion imputation: medians here are per
//! feature column over the training matrix, not per raw channel over the
//! source table. Fitting returns plain parameter values; transforming never
//! mutates them.

use crate::core::features::{FeatureManifest, FeatureSet};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};

/// Fitted per-column medians used to fill non-finite feature values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImputer {
    manifest: FeatureManifest,
    medians: Vec<f64>,
}

impl FeatureImputer {
    pub fn fit(set: &FeatureSet) -> Result<Self> {
        let manifest = set.manifest().clone();
        let medians = (0..manifest.len())
            .map(|column| {
                let observed: Vec<f64> = set
                    .vectors()
                    .iter()
                    .map(|v| v.values[column])
                    .filter(|x| x.is_finite())
                    .collect();
                if observed.is_empty() {
                    0.0
                } else {
                    Data::new(observed).median()
                }
            })
            .collect();

        Ok(Self { manifest, medians })
    }

    pub fn medians(&self) -> &[f64] {
        &self.medians
    }

    pub fn transform(&self, set: &FeatureSet) -> Result<Vec<Vec<f64>>> {
        check_manifest(&self.manifest, set.manifest())?;
        Ok(set
            .vectors()
            .iter()
            .map(|v| {
                v.values
                    .iter()
                    .zip(&self.medians)
                    .map(|(&x, &median)| if x.is_finite() { x } else { median })
                    .collect()
            })
            .collect())
    }
}

/// Fitted per-column mean and population standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    manifest: FeatureManifest,
    means: Vec<f64>,
    /// Deviations, with zero replaced by 1 so constant columns map to 0.
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(manifest: &FeatureManifest, rows: &[Vec<f64>]) -> Result<Self> {
        check_rows(manifest, rows)?;
        if rows.is_empty() {
            return Err(PipelineError::Configuration(
                "cannot fit a scaler on an empty feature matrix".to_string(),
            ));
        }

        let mut means = Vec::with_capacity(manifest.len());
        let mut scales = Vec::with_capacity(manifest.len());
        for column in 0..manifest.len() {
            let values = rows.iter().map(|row| row[column]);
            means.push(values.clone().mean());
            let std_dev = values.population_std_dev();
            scales.push(if std_dev > 0.0 && std_dev.is_finite() {
                std_dev
            } else {
                1.0
            });
        }

        Ok(Self {
            manifest: manifest.clone(),
            means,
            scales,
        })
    }

    pub fn manifest(&self) -> &FeatureManifest {
        &self.manifest
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    pub fn transform(&self, manifest: &FeatureManifest, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        check_manifest(&self.manifest, manifest)?;
        check_rows(&self.manifest, rows)?;
        Ok(rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(&x, (&mean, &scale))| (x - mean) / scale)
                    .collect()
            })
            .collect())
    }
}

/// Imputer and scaler fitted together on one training set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub imputer: FeatureImputer,
    pub scaler: StandardScaler,
}

impl Preprocessor {
    pub fn fit(set: &FeatureSet) -> Result<Self> {
        let imputer = FeatureImputer::fit(set)?;
        let filled = imputer.transform(set)?;
        let scaler = StandardScaler::fit(set.manifest(), &filled)?;
        Ok(Self { imputer, scaler })
    }

    pub fn transform(&self, set: &FeatureSet) -> Result<Vec<Vec<f64>>> {
        let filled = self.imputer.transform(set)?;
        self.scaler.transform(set.manifest(), &filled)
    }
}

fn check_manifest(fitted: &FeatureManifest, given: &FeatureManifest) -> Result<()> {
    if fitted != given {
        return Err(PipelineError::ManifestMismatch {
            expected: fitted.len(),
            actual: given.len(),
        });
    }
    Ok(())
}

fn check_rows(manifest: &FeatureManifest, rows: &[Vec<f64>]) -> Result<()> {
    match rows.iter().find(|row| row.len() != manifest.len()) {
        Some(row) => Err(PipelineError::ManifestMismatch {
            expected: manifest.len(),
            actual: row.len(),
        }),
        None => Ok(()),
    }
}
