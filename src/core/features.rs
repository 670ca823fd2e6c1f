//! Feature computation from patient series.
//!
//! Each stay is reduced to a fixed-length vector whose meaning is given by
//! a [`FeatureManifest`]. Two profiles exist:
//!
//! - `basic`: mean, std, min, max and median per channel, then static features
//! - `extended`: additionally the 25th/75th percentiles and variance per
//!   channel, slope trends and pairwise mean interactions
//!
//! A model trained on one profile must only ever see vectors of that profile.

use crate::core::series::PatientSeries;
use crate::error::{PipelineError, Result};
use crate::ingest::types::{Channel, StayId, CHANNEL_COUNT};
use csv::Writer;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::path::Path;

/// Which feature manifest to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureProfile {
    Basic,
    #[default]
    Extended,
}

impl FeatureProfile {
    fn statistics(self) -> &'static [Statistic] {
        match self {
            FeatureProfile::Basic => &Statistic::BASIC,
            FeatureProfile::Extended => &Statistic::EXTENDED,
        }
    }

    fn has_dynamics(self) -> bool {
        self == FeatureProfile::Extended
    }
}

impl std::str::FromStr for FeatureProfile {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(FeatureProfile::Basic),
            "extended" => Ok(FeatureProfile::Extended),
            other => Err(PipelineError::Configuration(format!(
                "unknown feature profile '{other}'"
            ))),
        }
    }
}

/// Channels with a slope feature.
pub const TREND_CHANNELS: [Channel; 3] = [Channel::HeartRate, Channel::Map, Channel::O2Saturation];

/// Channel pairs whose means are multiplied.
pub const INTERACTION_PAIRS: [(Channel, Channel); 3] = [
    (Channel::HeartRate, Channel::Map),
    (Channel::HeartRate, Channel::O2Saturation),
    (Channel::Map, Channel::O2Saturation),
];

const STATIC_FEATURES: [&str; 3] = ["Weight", "Height", "LOS"];

/// Per-channel summary statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statistic {
    Mean,
    StdDev,
    Min,
    Max,
    Median,
    P25,
    P75,
    Variance,
}

impl Statistic {
    const BASIC: [Statistic; 5] = [
        Statistic::Mean,
        Statistic::StdDev,
        Statistic::Min,
        Statistic::Max,
        Statistic::Median,
    ];

    const EXTENDED: [Statistic; 8] = [
        Statistic::Mean,
        Statistic::StdDev,
        Statistic::Min,
        Statistic::Max,
        Statistic::Median,
        Statistic::P25,
        Statistic::P75,
        Statistic::Variance,
    ];

    fn suffix(self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::StdDev => "std",
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Median => "median",
            Statistic::P25 => "p25",
            Statistic::P75 => "p75",
            Statistic::Variance => "var",
        }
    }
}

/// Ordered feature names; index `i` names element `i` of every vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureManifest {
    profile: FeatureProfile,
    names: Vec<String>,
}

impl FeatureManifest {
    pub fn for_profile(profile: FeatureProfile) -> Self {
        let mut names = Vec::new();

        for channel in Channel::ALL {
            for stat in profile.statistics() {
                names.push(format!("{}_{}", channel.short_name(), stat.suffix()));
            }
        }

        if profile.has_dynamics() {
            for channel in TREND_CHANNELS {
                names.push(format!("{}_slope", channel.short_name()));
            }
            for (a, b) in INTERACTION_PAIRS {
                names.push(format!("{}_x_{}", a.short_name(), b.short_name()));
            }
        }

        names.extend(STATIC_FEATURES.iter().map(|name| name.to_string()));

        Self { profile, names }
    }

    pub fn profile(&self) -> FeatureProfile {
        self.profile
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Features of one stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub stay_id: StayId,
    pub values: Vec<f64>,
    /// Number of records in the stay.
    pub length_of_stay: usize,
}

/// Feature vectors that all follow one manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    manifest: FeatureManifest,
    vectors: Vec<FeatureVector>,
}

impl FeatureSet {
    pub fn new(manifest: FeatureManifest, vectors: Vec<FeatureVector>) -> Result<Self> {
        if let Some(bad) = vectors.iter().find(|v| v.values.len() != manifest.len()) {
            return Err(PipelineError::ManifestMismatch {
                expected: manifest.len(),
                actual: bad.values.len(),
            });
        }
        Ok(Self { manifest, vectors })
    }

    pub fn manifest(&self) -> &FeatureManifest {
        &self.manifest
    }

    pub fn vectors(&self) -> &[FeatureVector] {
        &self.vectors
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Value of a named feature for one vector.
    pub fn value(&self, vector: &FeatureVector, name: &str) -> Option<f64> {
        self.manifest
            .index_of(name)
            .and_then(|i| vector.values.get(i).copied())
    }

    /// Feature rows without their stay ids.
    pub fn matrix(&self) -> Vec<Vec<f64>> {
        self.vectors.iter().map(|v| v.values.clone()).collect()
    }

    /// Write the set as CSV: stay id followed by the manifest columns.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = Writer::from_path(path)?;

        let mut header = vec!["patientunitstayid".to_string()];
        header.extend(self.manifest.names().iter().cloned());
        writer.write_record(&header)?;

        for vector in &self.vectors {
            let mut row = vec![vector.stay_id.to_string()];
            row.extend(vector.values.iter().map(f64::to_string));
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Compute the feature vector of one stay.
pub fn compute_features(series: &PatientSeries, profile: FeatureProfile) -> FeatureVector {
    let mut values = Vec::with_capacity(FeatureManifest::for_profile(profile).len());
    let mut means = [0.0; CHANNEL_COUNT];

    for channel in Channel::ALL {
        let summary = ChannelSummary::compute(&series.channel(channel));
        means[channel.index()] = summary.mean;
        values.extend(profile.statistics().iter().map(|&stat| summary.get(stat)));
    }

    if profile.has_dynamics() {
        for channel in TREND_CHANNELS {
            values.push(slope(&series.channel(channel)));
        }
        for (a, b) in INTERACTION_PAIRS {
            values.push(means[a.index()] * means[b.index()]);
        }
    }

    let first = series.first();
    values.push(first.admission_weight);
    values.push(first.admission_height);
    values.push(series.len() as f64);

    FeatureVector {
        stay_id: series.stay_id().clone(),
        values,
        length_of_stay: series.len(),
    }
}

/// Summary statistics of one channel. Deviation and variance are population
/// values.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ChannelSummary {
    mean: f64,
    std_dev: f64,
    min: f64,
    max: f64,
    median: f64,
    p25: f64,
    p75: f64,
    variance: f64,
}

impl ChannelSummary {
    fn compute(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                median: 0.0,
                p25: 0.0,
                p75: 0.0,
                variance: 0.0,
            };
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        Self {
            mean: values.iter().copied().mean(),
            std_dev: values.iter().copied().population_std_dev(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median: Data::new(values.to_vec()).median(),
            p25: percentile(&sorted, 25.0),
            p75: percentile(&sorted, 75.0),
            variance: values.iter().copied().population_variance(),
        }
    }

    fn get(&self, stat: Statistic) -> f64 {
        match stat {
            Statistic::Mean => self.mean,
            Statistic::StdDev => self.std_dev,
            Statistic::Min => self.min,
            Statistic::Max => self.max,
            Statistic::Median => self.median,
            Statistic::P25 => self.p25,
            Statistic::P75 => self.p75,
            Statistic::Variance => self.variance,
        }
    }
}

/// Percentile with linear interpolation between closest ranks.
///
/// `sorted` must be ascending and non-empty.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Least-squares slope of `values` against their 0-based index.
pub fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;

    let (covariance, x_spread) = values.iter().enumerate().fold(
        (0.0, 0.0),
        |(cov, spread), (i, &y)| {
            let dx = i as f64 - x_mean;
            (cov + dx * (y - y_mean), spread + dx * dx)
        },
    );

    covariance / x_spread
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::test_support::{series, steady};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_manifest_lengths() {
        assert_eq!(FeatureManifest::for_profile(FeatureProfile::Basic).len(), 43);
        assert_eq!(FeatureManifest::for_profile(FeatureProfile::Extended).len(), 73);
    }

    #[test]
    fn test_manifest_order() {
        let manifest = FeatureManifest::for_profile(FeatureProfile::Extended);
        let names = manifest.names();
        assert_eq!(names[0], "HR_mean");
        assert_eq!(names[7], "HR_var");
        assert_eq!(names[8], "MAP_mean");
        assert_eq!(names[64], "HR_slope");
        assert_eq!(names[66], "O2_slope");
        assert_eq!(names[67], "HR_x_MAP");
        assert_eq!(names[69], "MAP_x_O2");
        assert_eq!(&names[70..], &["Weight", "Height", "LOS"]);
    }

    #[test]
    fn test_manifest_is_stable() {
        let a = FeatureManifest::for_profile(FeatureProfile::Extended);
        let b = FeatureManifest::for_profile(FeatureProfile::Extended);
        assert_eq!(a, b);
    }

    #[test]
    fn test_vector_matches_manifest() {
        let s = series("1", &[(80.0, 70.0, 16.0, 97.0), (90.0, 75.0, 18.0, 95.0)]);
        for profile in [FeatureProfile::Basic, FeatureProfile::Extended] {
            let vector = compute_features(&s, profile);
            assert_eq!(vector.values.len(), FeatureManifest::for_profile(profile).len());
            assert_eq!(vector.length_of_stay, 2);
        }
    }

    #[test]
    fn test_channel_statistics() {
        let s = series(
            "1",
            &[
                (60.0, 70.0, 16.0, 97.0),
                (70.0, 70.0, 16.0, 97.0),
                (80.0, 70.0, 16.0, 97.0),
                (90.0, 70.0, 16.0, 97.0),
            ],
        );
        let manifest = FeatureManifest::for_profile(FeatureProfile::Extended);
        let set = FeatureSet::new(
            manifest,
            vec![compute_features(&s, FeatureProfile::Extended)],
        )
        .unwrap();
        let v = &set.vectors()[0];

        assert!(close(set.value(v, "HR_mean").unwrap(), 75.0));
        assert!(close(set.value(v, "HR_var").unwrap(), 125.0));
        assert!(close(set.value(v, "HR_std").unwrap(), 125.0_f64.sqrt()));
        assert!(close(set.value(v, "HR_min").unwrap(), 60.0));
        assert!(close(set.value(v, "HR_max").unwrap(), 90.0));
        assert!(close(set.value(v, "HR_median").unwrap(), 75.0));
        assert!(close(set.value(v, "HR_p25").unwrap(), 67.5));
        assert!(close(set.value(v, "HR_p75").unwrap(), 82.5));
        assert!(close(set.value(v, "HR_slope").unwrap(), 10.0));
        assert!(close(set.value(v, "MAP_slope").unwrap(), 0.0));
        assert!(close(set.value(v, "HR_x_MAP").unwrap(), 75.0 * 70.0));
        assert!(close(set.value(v, "Weight").unwrap(), 80.0));
        assert!(close(set.value(v, "LOS").unwrap(), 4.0));
    }

    #[test]
    fn test_single_record_trends_are_zero() {
        let s = steady("1", 1);
        let manifest = FeatureManifest::for_profile(FeatureProfile::Extended);
        let vector = compute_features(&s, FeatureProfile::Extended);
        for channel in TREND_CHANNELS {
            let i = manifest
                .index_of(&format!("{}_slope", channel.short_name()))
                .unwrap();
            assert_eq!(vector.values[i], 0.0);
        }
    }

    #[test]
    fn test_feature_set_rejects_misaligned_vectors() {
        let s = steady("1", 3);
        let vector = compute_features(&s, FeatureProfile::Basic);
        let result = FeatureSet::new(FeatureManifest::for_profile(FeatureProfile::Extended), vec![vector]);
        assert!(matches!(result, Err(PipelineError::ManifestMismatch { .. })));
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!("basic".parse::<FeatureProfile>().unwrap(), FeatureProfile::Basic);
        assert_eq!(" Extended ".parse::<FeatureProfile>().unwrap(), FeatureProfile::Extended);
        assert!("fancy".parse::<FeatureProfile>().is_err());
    }

    #[test]
    fn test_slope() {
        assert_eq!(slope(&[]), 0.0);
        assert_eq!(slope(&[5.0]), 0.0);
        assert!(close(slope(&[1.0, 3.0, 5.0]), 2.0));
        assert!(close(slope(&[5.0, 4.0, 3.0, 2.0]), -1.0));
    }
}
