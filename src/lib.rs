//! ICU Vitals - ingestion, feature synthesis and risk scoring for ICU
//! vital-sign time series.
//!
//! This library turns per-unit tables of bedside vitals into model-ready
//! data: a normalized patient table, fixed-manifest feature vectors,
//! sequence windows for forecasters and rule-based severity scores. A
//! prediction orchestrator combines an external forecaster with escalation
//! thresholds for single-patient reports.
//!
//! # Scope
//!
//! - **Decision support only**: scores are heuristics, not diagnoses
//! - **No training**: models plug in through predictor traits
//! - **Deterministic**: output order follows first appearance of stay ids
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         ICU Vitals                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │   Ingest    │──▶│   Series    │──▶│  Features   │        │
//! │  │ (CSV, fill) │   │ (per stay)  │   │ (manifest)  │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │         │                 │                 │               │
//! │         ▼                 ▼                 ▼               │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │  Run Log    │   │  Severity   │   │  Windowing  │        │
//! │  │  (audit)    │   │  (rules)    │   │  (W = 24)   │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │                           │                 │               │
//! │                           ▼                 ▼               │
//! │                    ┌─────────────────────────────┐          │
//! │                    │        Orchestrator         │          │
//! │                    │ (predictor + escalation)    │          │
//! │                    └─────────────────────────────┘          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use icu_vitals::{core, ingest};
//! use std::path::Path;
//!
//! let loaded = ingest::load_table(Path::new("data"), ingest::ImputationStrategy::default())
//!     .expect("no input data");
//! let series = core::group_by_stay(&loaded.table).expect("invalid table");
//! let assessments = core::assess_all(&series, &core::ScoringRules::default());
//! println!("{} patients scored", assessments.len());
//! ```

pub mod audit;
pub mod config;
pub mod core;
pub mod error;
pub mod ingest;
pub mod model;
pub mod orchestrator;

// Re-export key types at crate root for convenience
pub use audit::{RunLog, RunStats};
pub use config::{Config, ConfigError};
pub use crate::core::{
    assess, compute_features, group_by_stay, CohortReport, FeatureManifest, FeatureProfile,
    FeatureSet, FeatureVector, PatientSeries, ReportBuilder, ScoringRules, SeverityAssessment,
    Window, Windower,
};
pub use error::{PipelineError, PredictorError, Result, SourceReadError};
pub use ingest::{load_table, Channel, StayId, VitalRecord, VitalTable};
pub use model::{SequencePredictor, TabularPredictor};
pub use orchestrator::{Orchestrator, PatientSource, ReportEnvelope, RiskReport, RiskThresholds};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Scope statement shown by the CLI and embedded in reports.
pub const CLINICAL_DISCLAIMER: &str = "\
ICU Vitals produces rule-based acuity, mortality, decompensation and \
length-of-stay estimates from recorded vital signs. These are screening \
heuristics for research and decision support. They are NOT diagnoses and \
must not replace clinical judgement.";
