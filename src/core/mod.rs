//! Core per-patient computation.
//!
//! This module contains:
//! - Patient series grouping
//! - Feature computation against a fixed manifest
//! - Rule-based severity and risk scoring
//! - Sequence windowing
//! - Cohort fan-out and report building

pub mod batch;
pub mod features;
pub mod report;
pub mod series;
pub mod severity;
pub mod windowing;

// Re-export commonly used types
pub use batch::{assess_all, extract_all, map_series, windows_all};
pub use features::{compute_features, FeatureManifest, FeatureProfile, FeatureSet, FeatureVector};
pub use report::{CohortReport, CohortSummary, ReportBuilder, PRODUCER_NAME, REPORT_VERSION};
pub use series::{find_series, group_by_stay, PatientSeries};
pub use severity::{
    acuity_score, assess, decompensation_risk, length_of_stay_estimate, mortality_risk,
    vital_stability, ScoringRules, SeverityAssessment,
};
pub use windowing::{LabelAlignment, Window, Windower, DEFAULT_WINDOW_SIZE};
