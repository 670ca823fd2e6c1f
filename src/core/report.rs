//! Cohort risk report builder.
//!
//! A report carries one severity assessment per stay plus a cohort
//! summary, stamped with producer metadata and the computation time.

use crate::core::severity::SeverityAssessment;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use uuid::Uuid;

/// The current report format version.
pub const REPORT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "icu-vitals";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    /// Name of the producing software
    pub name: String,
    /// Version of the producing software
    pub version: String,
    /// Unique instance identifier (UUID)
    pub instance_id: String,
}

/// Cohort-level aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub patient_count: usize,
    pub record_count: usize,
    pub mean_acuity: f64,
    pub mean_mortality_risk: f64,
    pub mean_decompensation_risk: f64,
    pub mean_length_of_stay_days: f64,
}

impl CohortSummary {
    fn from_assessments(assessments: &[SeverityAssessment]) -> Self {
        let mean = |f: fn(&SeverityAssessment) -> f64| {
            if assessments.is_empty() {
                0.0
            } else {
                assessments.iter().map(f).mean()
            }
        };

        Self {
            patient_count: assessments.len(),
            record_count: assessments.iter().map(|a| a.record_count).sum(),
            mean_acuity: mean(|a| a.acuity as f64),
            mean_mortality_risk: mean(|a| a.mortality_risk),
            mean_decompensation_risk: mean(|a| a.decompensation_risk),
            mean_length_of_stay_days: mean(|a| a.length_of_stay_days),
        }
    }
}

/// A complete cohort report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortReport {
    /// Report format version
    pub report_version: String,
    /// When this report was computed (RFC3339)
    pub computed_at_utc: String,
    /// Producer metadata
    pub producer: Producer,
    /// Cohort aggregates
    pub summary: CohortSummary,
    /// Per-stay assessments in table order
    pub patients: Vec<SeverityAssessment>,
    /// Scope statement for consumers
    pub disclaimer: String,
}

impl CohortReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Builder for cohort reports.
pub struct ReportBuilder {
    instance_id: Uuid,
}

impl ReportBuilder {
    /// Create a new builder with a unique instance ID.
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
        }
    }

    /// Get the instance ID.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn build(&self, assessments: Vec<SeverityAssessment>) -> CohortReport {
        CohortReport {
            report_version: REPORT_VERSION.to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: crate::VERSION.to_string(),
                instance_id: self.instance_id.to_string(),
            },
            summary: CohortSummary::from_assessments(&assessments),
            patients: assessments,
            disclaimer: crate::CLINICAL_DISCLAIMER.to_string(),
        }
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::test_support::{series, steady};
    use crate::core::severity::{assess, ScoringRules};

    #[test]
    fn test_builder_instance_id() {
        let a = ReportBuilder::new();
        let b = ReportBuilder::new();
        assert_ne!(a.instance_id(), b.instance_id());
    }

    #[test]
    fn test_report_summary() {
        let rules = ScoringRules::default();
        let assessments = vec![
            assess(&steady("1", 3), &rules),
            assess(&series("2", &[(200.0, 40.0, 55.0, 85.0)]), &rules),
        ];

        let report = ReportBuilder::new().build(assessments);
        assert_eq!(report.summary.patient_count, 2);
        assert_eq!(report.summary.record_count, 4);
        assert!((report.summary.mean_acuity - 8.0).abs() < 1e-9);
        assert_eq!(report.patients[1].stay_id.as_str(), "2");
        assert_eq!(report.producer.name, PRODUCER_NAME);
    }

    #[test]
    fn test_empty_report() {
        let report = ReportBuilder::new().build(Vec::new());
        assert_eq!(report.summary.patient_count, 0);
        assert_eq!(report.summary.mean_mortality_risk, 0.0);
    }

    #[test]
    fn test_report_json() {
        let report = ReportBuilder::new().build(vec![assess(&steady("1", 2), &ScoringRules::default())]);
        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["report_version"], "1.0");
        assert_eq!(value["summary"]["patient_count"], 1);
        assert_eq!(value["patients"][0]["stay_id"], "1");
        assert!(value["producer"]["instance_id"].is_string());
    }
}
