//! Supervised training sets.
//!
//! Outcome labels are an external input keyed by stay id. A feature vector
//! without a label is an error, never a silent zero.

use crate::core::features::{FeatureManifest, FeatureSet};
use crate::error::{PipelineError, Result};
use crate::ingest::types::StayId;
use csv::Reader;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Outcomes of one stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeLabel {
    #[serde(alias = "patientunitstayid", alias = "patientStayId")]
    pub stay_id: StayId,
    pub mortality: f64,
    pub decompensation: f64,
    /// Observed length of stay; the record count is used when absent.
    #[serde(default)]
    pub length_of_stay: Option<f64>,
}

/// Labels indexed by stay id.
#[derive(Debug, Clone, Default)]
pub struct OutcomeLabels {
    by_stay: HashMap<StayId, OutcomeLabel>,
}

impl OutcomeLabels {
    /// Load labels from a CSV with `stay_id`, `mortality`, `decompensation`
    /// and optional `length_of_stay` columns. Later rows win on duplicates.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = Reader::from_path(path)?;
        let mut labels = Vec::new();
        for result in reader.deserialize() {
            let label: OutcomeLabel = result?;
            labels.push(label);
        }
        Ok(Self::from_labels(labels))
    }

    pub fn from_labels(labels: impl IntoIterator<Item = OutcomeLabel>) -> Self {
        Self {
            by_stay: labels
                .into_iter()
                .map(|label| (label.stay_id.clone(), label))
                .collect(),
        }
    }

    pub fn get(&self, stay_id: &StayId) -> Option<&OutcomeLabel> {
        self.by_stay.get(stay_id)
    }

    pub fn len(&self) -> usize {
        self.by_stay.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_stay.is_empty()
    }
}

/// One labeled feature row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub stay_id: StayId,
    pub features: Vec<f64>,
    pub mortality: f64,
    pub decompensation: f64,
    pub length_of_stay: f64,
}

/// Feature rows joined with their outcomes.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    manifest: FeatureManifest,
    examples: Vec<TrainingExample>,
}

impl TrainingSet {
    /// Join every feature vector with its label.
    pub fn assemble(features: &FeatureSet, labels: &OutcomeLabels) -> Result<Self> {
        let examples = features
            .vectors()
            .iter()
            .map(|vector| {
                let label = labels
                    .get(&vector.stay_id)
                    .ok_or_else(|| PipelineError::MissingLabel(vector.stay_id.clone()))?;
                Ok(TrainingExample {
                    stay_id: vector.stay_id.clone(),
                    features: vector.values.clone(),
                    mortality: label.mortality,
                    decompensation: label.decompensation,
                    length_of_stay: label
                        .length_of_stay
                        .unwrap_or(vector.length_of_stay as f64),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            manifest: features.manifest().clone(),
            examples,
        })
    }

    pub fn manifest(&self) -> &FeatureManifest {
        &self.manifest
    }

    pub fn examples(&self) -> &[TrainingExample] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn features(&self) -> Vec<Vec<f64>> {
        self.examples.iter().map(|e| e.features.clone()).collect()
    }

    pub fn mortality(&self) -> Vec<f64> {
        self.examples.iter().map(|e| e.mortality).collect()
    }

    pub fn decompensation(&self) -> Vec<f64> {
        self.examples.iter().map(|e| e.decompensation).collect()
    }

    pub fn length_of_stay(&self) -> Vec<f64> {
        self.examples.iter().map(|e| e.length_of_stay).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::{compute_features, FeatureProfile};
    use crate::core::series::test_support::steady;
    use tempfile::tempdir;

    fn features() -> FeatureSet {
        let profile = FeatureProfile::Basic;
        FeatureSet::new(
            FeatureManifest::for_profile(profile),
            vec![
                compute_features(&steady("10", 4), profile),
                compute_features(&steady("11", 2), profile),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_load_labels_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labels.csv");
        std::fs::write(
            &path,
            "patientunitstayid,mortality,decompensation,length_of_stay\n\
             10,1,0,6.5\n\
             11,0,1,\n",
        )
        .unwrap();

        let labels = OutcomeLabels::load(&path).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get(&StayId::new("10")).unwrap().length_of_stay, Some(6.5));
        assert_eq!(labels.get(&StayId::new("11")).unwrap().length_of_stay, None);
    }

    #[test]
    fn test_assemble_joins_labels() {
        let labels = OutcomeLabels::from_labels(vec![
            OutcomeLabel {
                stay_id: StayId::new("10"),
                mortality: 1.0,
                decompensation: 0.0,
                length_of_stay: Some(6.5),
            },
            OutcomeLabel {
                stay_id: StayId::new("11"),
                mortality: 0.0,
                decompensation: 1.0,
                length_of_stay: None,
            },
        ]);

        let set = TrainingSet::assemble(&features(), &labels).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.mortality(), vec![1.0, 0.0]);
        assert_eq!(set.length_of_stay(), vec![6.5, 2.0]);
        assert_eq!(set.features()[0].len(), set.manifest().len());
    }

    #[test]
    fn test_missing_label_is_error() {
        let labels = OutcomeLabels::from_labels(vec![OutcomeLabel {
            stay_id: StayId::new("10"),
            mortality: 0.0,
            decompensation: 0.0,
            length_of_stay: None,
        }]);

        let err = TrainingSet::assemble(&features(), &labels).unwrap_err();
        assert!(matches!(err, PipelineError::MissingLabel(id) if id.as_str() == "11"));
    }
}
