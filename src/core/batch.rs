//! Per-patient fan-out over a whole cohort.
//!
//! Work for different stays is independent. With the `parallel` feature it
//! runs on the rayon pool; otherwise sequentially. Either way results come
//! back in the order of the input series, which is the first-appearance
//! order of stay ids in the normalized table.

use crate::core::features::{compute_features, FeatureManifest, FeatureProfile, FeatureSet};
use crate::core::series::PatientSeries;
use crate::core::severity::{assess, ScoringRules, SeverityAssessment};
use crate::core::windowing::{Window, Windower};
use crate::error::Result;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::info;

/// Apply `f` to every series, keeping input order.
pub fn map_series<T, F>(series: &[PatientSeries], f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&PatientSeries) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    let results: Vec<T> = series.par_iter().map(f).collect();

    #[cfg(not(feature = "parallel"))]
    let results: Vec<T> = series.iter().map(f).collect();

    results
}

/// Feature vectors for every stay.
pub fn extract_all(series: &[PatientSeries], profile: FeatureProfile) -> Result<FeatureSet> {
    let vectors = map_series(series, |s| compute_features(s, profile));
    let set = FeatureSet::new(FeatureManifest::for_profile(profile), vectors)?;
    info!(
        patients = set.len(),
        features = set.manifest().len(),
        "feature extraction complete"
    );
    Ok(set)
}

/// Severity assessments for every stay.
pub fn assess_all(series: &[PatientSeries], rules: &ScoringRules) -> Vec<SeverityAssessment> {
    let assessments = map_series(series, |s| assess(s, rules));
    info!(patients = assessments.len(), "severity scoring complete");
    assessments
}

/// Training windows for every stay, grouped by stay in input order.
pub fn windows_all(series: &[PatientSeries], windower: &Windower) -> Vec<Window> {
    let windows: Vec<Window> = map_series(series, |s| windower.training_windows(s))
        .into_iter()
        .flatten()
        .collect();
    info!(
        windows = windows.len(),
        size = windower.size(),
        "windowing complete"
    );
    windows
}
