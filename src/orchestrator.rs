//! Prediction orchestration for single patients and cohorts.
//!
//! The sequence path resolves a stay, builds its inference window, asks a
//! [`SequencePredictor`] for the next primary vitals and raises a fixed
//! escalation flag when the forecast crosses a threshold. The rule-based
//! severity of the same stay is reported next to it as a separate field;
//! the two risk models are never merged.
//!
//! The tabular path runs a feature set through the fitted preprocessing and
//! a [`TabularPredictor`].

use crate::core::features::FeatureSet;
use crate::core::series::{find_series, PatientSeries};
use crate::core::severity::{assess, ScoringRules, SeverityAssessment};
use crate::core::windowing::Windower;
use crate::error::{PipelineError, PredictorError, Result};
use crate::ingest::types::StayId;
use crate::ingest::VitalTable;
use crate::model::predictor::{SequencePredictor, TabularPredictor, FORECAST_LEN};
use crate::model::preprocess::Preprocessor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Decompensation risk reported when a forecast escalates.
pub const ESCALATED_DECOMPENSATION: f64 = 0.7;
/// Mortality risk reported when a forecast escalates.
pub const ESCALATED_MORTALITY: f64 = 0.4;

/// Anything that can resolve a stay id to its series.
pub trait PatientSource {
    fn patient(&self, stay_id: &StayId) -> Result<PatientSeries>;
}

impl PatientSource for VitalTable {
    fn patient(&self, stay_id: &StayId) -> Result<PatientSeries> {
        find_series(self, stay_id)
    }
}

/// Forecast bounds that trigger escalation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub hr_high: f64,
    pub hr_low: f64,
    pub map_low: f64,
    pub rr_high: f64,
}

impl RiskThresholds {
    pub const KEYS: [&'static str; 4] = ["hr_high", "hr_low", "map_low", "rr_high"];

    /// Resolve thresholds from a key/value table. Every key is required.
    pub fn from_map(values: &BTreeMap<String, f64>) -> Result<Self> {
        let get = |key: &str| {
            values.get(key).copied().ok_or_else(|| {
                PipelineError::Configuration(format!("missing risk threshold '{key}'"))
            })
        };

        Ok(Self {
            hr_high: get("hr_high")?,
            hr_low: get("hr_low")?,
            map_low: get("map_low")?,
            rr_high: get("rr_high")?,
        })
    }

    /// The reference bounds: 120, 50, 65 and 30.
    pub fn reference_map() -> BTreeMap<String, f64> {
        Self::KEYS
            .iter()
            .zip([120.0, 50.0, 65.0, 30.0])
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }

    pub fn escalates(&self, forecast: &VitalsForecast) -> bool {
        forecast.heart_rate > self.hr_high
            || forecast.heart_rate < self.hr_low
            || forecast.map < self.map_low
            || forecast.respiratory_rate > self.rr_high
    }
}

/// Forecast of the primary vitals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsForecast {
    pub heart_rate: f64,
    pub map: f64,
    pub respiratory_rate: f64,
}

impl VitalsForecast {
    fn from_output(output: &[f64]) -> std::result::Result<Self, PredictorError> {
        match output {
            &[heart_rate, map, respiratory_rate] => Ok(Self {
                heart_rate,
                map,
                respiratory_rate,
            }),
            _ => Err(PredictorError::OutputShape {
                expected: FORECAST_LEN,
                actual: output.len(),
            }),
        }
    }
}

/// Escalation risk derived from a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EscalationRisk {
    pub mortality: f64,
    pub decompensation: f64,
}

impl EscalationRisk {
    fn from_flag(escalated: bool) -> Self {
        if escalated {
            Self {
                mortality: ESCALATED_MORTALITY,
                decompensation: ESCALATED_DECOMPENSATION,
            }
        } else {
            Self::default()
        }
    }

    pub fn is_escalated(&self) -> bool {
        self.decompensation > 0.0 || self.mortality > 0.0
    }
}

/// Combined report for one stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub predictions: VitalsForecast,
    pub risk_scores: EscalationRisk,
    /// Rule-based scores of the same stay, kept apart from `risk_scores`.
    pub severity: SeverityAssessment,
}

/// Success or failure, shaped for a downstream web layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReportEnvelope {
    Success(RiskReport),
    Error { message: String },
}

impl From<Result<RiskReport>> for ReportEnvelope {
    fn from(result: Result<RiskReport>) -> Self {
        match result {
            Ok(report) => ReportEnvelope::Success(report),
            Err(e) => ReportEnvelope::Error {
                message: e.to_string(),
            },
        }
    }
}

/// Per-stay estimates from the tabular path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularEstimate {
    pub stay_id: StayId,
    pub mortality: f64,
    pub decompensation: f64,
    pub length_of_stay: f64,
}

/// Runs predictions against a data source with fixed settings.
pub struct Orchestrator<'a> {
    windower: Windower,
    thresholds: RiskThresholds,
    rules: &'a ScoringRules,
}

impl<'a> Orchestrator<'a> {
    pub fn new(windower: Windower, thresholds: RiskThresholds, rules: &'a ScoringRules) -> Self {
        Self {
            windower,
            thresholds,
            rules,
        }
    }

    /// Forecast and score one stay.
    pub fn predict_patient<S, P>(&self, source: &S, predictor: &P, stay_id: &StayId) -> Result<RiskReport>
    where
        S: PatientSource + ?Sized,
        P: SequencePredictor + ?Sized,
    {
        let series = source.patient(stay_id)?;
        let window = self.windower.inference_window(&series)?;
        let output = predictor.predict(&window)?;
        let predictions = VitalsForecast::from_output(&output)?;

        let escalated = self.thresholds.escalates(&predictions);
        debug!(stay = %stay_id, escalated, "forecast complete");

        Ok(RiskReport {
            predictions,
            risk_scores: EscalationRisk::from_flag(escalated),
            severity: assess(&series, self.rules),
        })
    }

    /// Like [`Orchestrator::predict_patient`], folding failures into an
    /// error envelope.
    pub fn report<S, P>(&self, source: &S, predictor: &P, stay_id: &StayId) -> ReportEnvelope
    where
        S: PatientSource + ?Sized,
        P: SequencePredictor + ?Sized,
    {
        self.predict_patient(source, predictor, stay_id).into()
    }
}

/// Score a feature set with a tabular predictor after preprocessing.
pub fn predict_tabular<P>(
    features: &FeatureSet,
    preprocessor: &Preprocessor,
    predictor: &P,
) -> Result<Vec<TabularEstimate>>
where
    P: TabularPredictor + ?Sized,
{
    let rows = preprocessor.transform(features)?;
    let prediction = predictor.predict(&rows)?;
    prediction.check_rows(rows.len())?;

    let estimates: Vec<TabularEstimate> = features
        .vectors()
        .iter()
        .enumerate()
        .map(|(i, vector)| TabularEstimate {
            stay_id: vector.stay_id.clone(),
            mortality: prediction.mortality[i],
            decompensation: prediction.decompensation[i],
            length_of_stay: prediction.length_of_stay[i],
        })
        .collect();

    info!(patients = estimates.len(), "tabular scoring complete");
    Ok(estimates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::test_support::record;
    use crate::core::windowing::{LabelAlignment, Window};
    use crate::model::reference::LastValueForecaster;

    struct Fixed(Vec<f64>);

    impl SequencePredictor for Fixed {
        fn predict(&self, _window: &Window) -> std::result::Result<Vec<f64>, PredictorError> {
            Ok(self.0.clone())
        }
    }

    fn table(n: usize, hr: f64) -> VitalTable {
        VitalTable::from_records(
            (0..n)
                .map(|i| record("7", i as f64 * 60.0, hr, 85.0, 16.0, 98.0))
                .collect(),
        )
    }

    fn thresholds() -> RiskThresholds {
        RiskThresholds::from_map(&RiskThresholds::reference_map()).unwrap()
    }

    fn orchestrator(rules: &ScoringRules) -> Orchestrator<'_> {
        Orchestrator::new(
            Windower::new(4, LabelAlignment::LastInWindow).unwrap(),
            thresholds(),
            rules,
        )
    }

    #[test]
    fn test_thresholds_require_every_key() {
        let mut values = RiskThresholds::reference_map();
        assert_eq!(thresholds().hr_high, 120.0);

        values.remove("map_low");
        let err = RiskThresholds::from_map(&values).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(ref m) if m.contains("map_low")));
    }

    #[test]
    fn test_normal_forecast_does_not_escalate() {
        let rules = ScoringRules::default();
        let report = orchestrator(&rules)
            .predict_patient(&table(6, 80.0), &LastValueForecaster, &StayId::new("7"))
            .unwrap();

        assert_eq!(report.predictions.heart_rate, 80.0);
        assert!(!report.risk_scores.is_escalated());
        assert_eq!(report.severity.acuity, 0);
    }

    #[test]
    fn test_each_threshold_escalates() {
        let rules = ScoringRules::default();
        let o = orchestrator(&rules);
        let source = table(6, 80.0);
        let id = StayId::new("7");

        for forecast in [
            vec![130.0, 80.0, 16.0],
            vec![45.0, 80.0, 16.0],
            vec![80.0, 60.0, 16.0],
            vec![80.0, 80.0, 35.0],
        ] {
            let report = o.predict_patient(&source, &Fixed(forecast), &id).unwrap();
            assert_eq!(report.risk_scores.decompensation, ESCALATED_DECOMPENSATION);
            assert_eq!(report.risk_scores.mortality, ESCALATED_MORTALITY);
        }
    }

    #[test]
    fn test_severity_kept_separate() {
        let rules = ScoringRules::default();
        let report = orchestrator(&rules)
            .predict_patient(&table(6, 150.0), &Fixed(vec![80.0, 80.0, 16.0]), &StayId::new("7"))
            .unwrap();

        assert!(!report.risk_scores.is_escalated());
        assert!(report.severity.mortality_risk > 0.0);
        assert_eq!(report.severity.acuity, 3);
    }

    #[test]
    fn test_errors_surface() {
        let rules = ScoringRules::default();
        let o = orchestrator(&rules);

        let err = o
            .predict_patient(&table(6, 80.0), &LastValueForecaster, &StayId::new("8"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::PatientNotFound(_)));

        let err = o
            .predict_patient(&table(2, 80.0), &LastValueForecaster, &StayId::new("7"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientHistory { .. }));

        let err = o
            .predict_patient(&table(6, 80.0), &Fixed(vec![1.0, 2.0]), &StayId::new("7"))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Predictor(PredictorError::OutputShape {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_envelope_json_shape() {
        let rules = ScoringRules::default();
        let o = orchestrator(&rules);

        let ok = o.report(&table(6, 80.0), &LastValueForecaster, &StayId::new("7"));
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["predictions"]["heartRate"], 80.0);
        assert_eq!(value["predictions"]["respiratoryRate"], 16.0);
        assert_eq!(value["risk_scores"]["mortality"], 0.0);
        assert!(value["severity"]["acuity"].is_number());

        let err = o.report(&table(6, 80.0), &LastValueForecaster, &StayId::new("99"));
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["status"], "error");
        assert!(value["message"].as_str().unwrap().contains("99"));
    }
}
