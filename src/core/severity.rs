//! Rule-based severity and risk scoring.
//!
//! All scores are pure functions of a [`PatientSeries`] and an explicit
//! [`ScoringRules`] table. No trained model is involved.
//!
//! # Outputs
//!
//! - Acuity: APACHE-like points from the latest record (0 to 16 with the
//!   default table)
//! - Mortality risk: acuity base with compounding multipliers, in [0, 1]
//! - Decompensation risk: additive trend and latest-value terms, in [0, 1]
//! - Length of stay: days estimated from acuity and stability, at least the
//!   configured floor
//! - Vital stability: coefficient-of-variation based, 1 is most stable

use crate::core::series::PatientSeries;
use crate::ingest::types::{Channel, StayId, VitalRecord};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// A deviation band: hit when the value is below `below` or above `above`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub above: Option<f64>,
    pub points: u32,
}

impl Band {
    pub const fn outside(below: f64, above: f64, points: u32) -> Self {
        Self {
            below: Some(below),
            above: Some(above),
            points,
        }
    }

    pub const fn under(below: f64, points: u32) -> Self {
        Self {
            below: Some(below),
            above: None,
            points,
        }
    }

    fn hit(&self, value: f64) -> bool {
        self.below.is_some_and(|b| value < b) || self.above.is_some_and(|a| value > a)
    }
}

/// Bands of one channel, from most to least severe. The first hit scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBands {
    pub channel: Channel,
    pub bands: Vec<Band>,
}

impl ChannelBands {
    pub fn points(&self, value: f64) -> u32 {
        self.bands
            .iter()
            .find(|band| band.hit(value))
            .map(|band| band.points)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Below,
    Above,
}

/// A condition on the latest value of one channel and what it contributes.
///
/// `weight` is a multiplier for mortality and an increment for
/// decompensation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub channel: Channel,
    pub comparison: Comparison,
    pub threshold: f64,
    pub weight: f64,
}

impl Adjustment {
    pub const fn new(channel: Channel, comparison: Comparison, threshold: f64, weight: f64) -> Self {
        Self {
            channel,
            comparison,
            threshold,
            weight,
        }
    }

    fn applies(&self, record: &VitalRecord) -> bool {
        let value = record.vitals.get(self.channel);
        match self.comparison {
            Comparison::Below => value < self.threshold,
            Comparison::Above => value > self.threshold,
        }
    }
}

/// Adds `weight` when the mean successive difference of a channel falls
/// below `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendAdjustment {
    pub channel: Channel,
    pub threshold: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortalityRules {
    pub acuity_divisor: f64,
    pub base_cap: f64,
    pub multipliers: Vec<Adjustment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompensationRules {
    /// Trend terms apply only to stays with at least this many records.
    pub min_trend_records: usize,
    pub trends: Vec<TrendAdjustment>,
    pub latest: Vec<Adjustment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthOfStayRules {
    pub acuity_divisor: f64,
    /// Stability scaling applies only to stays with at least this many records.
    pub min_stability_records: usize,
    pub floor_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityRules {
    /// Each channel contributes an equal share of the score.
    pub channels: Vec<Channel>,
}

/// The complete threshold table used by the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub acuity: Vec<ChannelBands>,
    pub mortality: MortalityRules,
    pub decompensation: DecompensationRules,
    pub length_of_stay: LengthOfStayRules,
    pub stability: StabilityRules,
}

impl Default for ScoringRules {
    fn default() -> Self {
        use Channel::{HeartRate, Map, O2Saturation, RespiratoryRate};
        use Comparison::{Above, Below};

        Self {
            acuity: vec![
                ChannelBands {
                    channel: HeartRate,
                    bands: vec![
                        Band::outside(40.0, 180.0, 4),
                        Band::outside(55.0, 140.0, 3),
                        Band::outside(70.0, 110.0, 2),
                    ],
                },
                ChannelBands {
                    channel: Map,
                    bands: vec![Band::outside(50.0, 130.0, 4), Band::outside(70.0, 110.0, 2)],
                },
                ChannelBands {
                    channel: RespiratoryRate,
                    bands: vec![Band::outside(6.0, 50.0, 4), Band::outside(12.0, 25.0, 2)],
                },
                ChannelBands {
                    channel: O2Saturation,
                    bands: vec![Band::under(90.0, 4), Band::under(95.0, 2)],
                },
            ],
            mortality: MortalityRules {
                acuity_divisor: 40.0,
                base_cap: 0.8,
                multipliers: vec![
                    Adjustment::new(O2Saturation, Below, 90.0, 1.2),
                    Adjustment::new(Map, Below, 65.0, 1.15),
                    Adjustment::new(HeartRate, Above, 120.0, 1.1),
                ],
            },
            decompensation: DecompensationRules {
                min_trend_records: 3,
                trends: vec![
                    TrendAdjustment {
                        channel: O2Saturation,
                        threshold: -1.0,
                        weight: 0.2,
                    },
                    TrendAdjustment {
                        channel: Map,
                        threshold: -2.0,
                        weight: 0.2,
                    },
                ],
                latest: vec![
                    Adjustment::new(O2Saturation, Below, 92.0, 0.3),
                    Adjustment::new(Map, Below, 65.0, 0.2),
                    Adjustment::new(HeartRate, Above, 120.0, 0.1),
                ],
            },
            length_of_stay: LengthOfStayRules {
                acuity_divisor: 4.0,
                min_stability_records: 6,
                floor_days: 1.0,
            },
            stability: StabilityRules {
                channels: vec![HeartRate, Map, O2Saturation],
            },
        }
    }
}

/// Acuity points of a single record.
pub fn record_acuity(record: &VitalRecord, rules: &ScoringRules) -> u32 {
    rules
        .acuity
        .iter()
        .map(|bands| bands.points(record.vitals.get(bands.channel)))
        .sum()
}

/// Acuity score from the latest record of the stay.
pub fn acuity_score(series: &PatientSeries, rules: &ScoringRules) -> u32 {
    record_acuity(series.latest(), rules)
}

pub fn mortality_risk(series: &PatientSeries, rules: &ScoringRules) -> f64 {
    let mortality = &rules.mortality;
    let acuity = acuity_score(series, rules) as f64;
    let base = (acuity / mortality.acuity_divisor).min(mortality.base_cap);

    let latest = series.latest();
    let multiplier: f64 = mortality
        .multipliers
        .iter()
        .filter(|m| m.applies(latest))
        .map(|m| m.weight)
        .product();

    (base * multiplier).clamp(0.0, 1.0)
}

pub fn decompensation_risk(series: &PatientSeries, rules: &ScoringRules) -> f64 {
    let decompensation = &rules.decompensation;
    let mut risk = 0.0;

    if series.len() >= decompensation.min_trend_records {
        for trend in &decompensation.trends {
            if mean_successive_difference(&series.channel(trend.channel)) < trend.threshold {
                risk += trend.weight;
            }
        }
    }

    let latest = series.latest();
    risk += decompensation
        .latest
        .iter()
        .filter(|a| a.applies(latest))
        .map(|a| a.weight)
        .sum::<f64>();

    risk.clamp(0.0, 1.0)
}

/// Estimated length of stay in days.
pub fn length_of_stay_estimate(series: &PatientSeries, rules: &ScoringRules) -> f64 {
    let los = &rules.length_of_stay;
    let mut days = acuity_score(series, rules) as f64 / los.acuity_divisor;

    if series.len() >= los.min_stability_records {
        days *= 2.0 - vital_stability(series, rules);
    }

    days.max(los.floor_days)
}

/// Stability in [0, 1], 1 being most stable.
///
/// Each configured channel contributes `share * (1 - min(cv, 1))` where cv
/// is the sample standard deviation over the mean. A zero mean gives an
/// infinite cv. A channel with fewer than two records has no spread and
/// contributes 0.
pub fn vital_stability(series: &PatientSeries, rules: &ScoringRules) -> f64 {
    let channels = &rules.stability.channels;
    if channels.is_empty() {
        return 0.0;
    }
    let share = 1.0 / channels.len() as f64;

    channels
        .iter()
        .map(|&channel| {
            coefficient_of_variation(&series.channel(channel))
                .map_or(0.0, |cv| (share * (1.0 - cv.min(1.0))).max(0.0))
        })
        .sum::<f64>()
        .clamp(0.0, 1.0)
}

fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let mean = values.iter().copied().mean();
    if mean == 0.0 {
        return Some(f64::INFINITY);
    }

    Some(values.iter().copied().std_dev() / mean)
}

/// Mean of consecutive differences; 0 for fewer than two values.
fn mean_successive_difference(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.windows(2).map(|w| w[1] - w[0]).sum::<f64>() / (values.len() - 1) as f64
}

/// All rule-based scores for one stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityAssessment {
    pub stay_id: StayId,
    pub record_count: usize,
    pub acuity: u32,
    pub stability: f64,
    pub mortality_risk: f64,
    pub decompensation_risk: f64,
    pub length_of_stay_days: f64,
}

pub fn assess(series: &PatientSeries, rules: &ScoringRules) -> SeverityAssessment {
    SeverityAssessment {
        stay_id: series.stay_id().clone(),
        record_count: series.len(),
        acuity: acuity_score(series, rules),
        stability: vital_stability(series, rules),
        mortality_risk: mortality_risk(series, rules),
        decompensation_risk: decompensation_risk(series, rules),
        length_of_stay_days: length_of_stay_estimate(series, rules),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::test_support::{series, steady};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_critical_patient_example() {
        let rules = ScoringRules::default();
        let s = series("1", &[(200.0, 40.0, 55.0, 85.0)]);

        assert_eq!(acuity_score(&s, &rules), 16);
        let expected = 0.4 * 1.2 * 1.15 * 1.1;
        assert!(close(mortality_risk(&s, &rules), expected));
        assert!((mortality_risk(&s, &rules) - 0.607).abs() < 1e-3);
    }

    #[test]
    fn test_normal_patient_scores_zero() {
        let rules = ScoringRules::default();
        let s = steady("1", 4);
        assert_eq!(acuity_score(&s, &rules), 0);
        assert_eq!(mortality_risk(&s, &rules), 0.0);
        assert_eq!(decompensation_risk(&s, &rules), 0.0);
        assert_eq!(length_of_stay_estimate(&s, &rules), 1.0);
    }

    #[test]
    fn test_heart_rate_acuity_is_monotonic() {
        let rules = ScoringRules::default();
        let score = |hr: f64| acuity_score(&series("1", &[(hr, 85.0, 16.0, 98.0)]), &rules);

        assert_eq!(score(200.0), 4);
        assert_eq!(score(150.0), 3);
        assert_eq!(score(120.0), 2);
        assert_eq!(score(90.0), 0);
        assert!(score(200.0) >= score(150.0) && score(150.0) >= score(90.0));
        assert!(score(30.0) >= score(50.0) && score(50.0) >= score(60.0));
    }

    #[test]
    fn test_channel_breakpoints() {
        let rules = ScoringRules::default();
        let score = |row| acuity_score(&series("1", &[row]), &rules);

        assert_eq!(score((80.0, 45.0, 16.0, 98.0)), 4);
        assert_eq!(score((80.0, 120.0, 16.0, 98.0)), 2);
        assert_eq!(score((80.0, 85.0, 5.0, 98.0)), 4);
        assert_eq!(score((80.0, 85.0, 30.0, 98.0)), 2);
        assert_eq!(score((80.0, 85.0, 16.0, 93.0)), 2);
        assert_eq!(score((80.0, 85.0, 16.0, 89.0)), 4);
    }

    #[test]
    fn test_mortality_multipliers_are_conditional() {
        let rules = ScoringRules::default();
        // acuity 2 (map band) with only the map multiplier active
        let s = series("1", &[(80.0, 60.0, 16.0, 98.0)]);
        assert!(close(mortality_risk(&s, &rules), (2.0 / 40.0) * 1.15));
    }

    #[test]
    fn test_decompensation_trend_terms() {
        let rules = ScoringRules::default();
        let falling = series(
            "1",
            &[
                (80.0, 90.0, 16.0, 99.0),
                (80.0, 85.0, 16.0, 97.0),
                (80.0, 80.0, 16.0, 95.0),
            ],
        );
        assert!(close(decompensation_risk(&falling, &rules), 0.4));

        let short = series("1", &[(80.0, 90.0, 16.0, 99.0), (80.0, 80.0, 16.0, 95.0)]);
        assert_eq!(decompensation_risk(&short, &rules), 0.0);
    }

    #[test]
    fn test_decompensation_latest_terms_and_clamp() {
        let rules = ScoringRules::default();
        let s = series(
            "1",
            &[
                (130.0, 90.0, 16.0, 99.0),
                (130.0, 70.0, 16.0, 95.0),
                (130.0, 50.0, 16.0, 85.0),
            ],
        );
        // 0.2 + 0.2 trends and 0.3 + 0.2 + 0.1 latest
        assert_eq!(decompensation_risk(&s, &rules), 1.0);
    }

    #[test]
    fn test_stability() {
        let rules = ScoringRules::default();
        assert!(close(vital_stability(&steady("1", 5), &rules), 1.0));
        assert_eq!(vital_stability(&steady("1", 1), &rules), 0.0);

        let zero_mean = series("1", &[(0.0, 85.0, 16.0, 98.0), (0.0, 85.0, 16.0, 98.0)]);
        assert!(close(vital_stability(&zero_mean, &rules), 2.0 / 3.0));

        // a negative mean gives a negative cv, and the total is clamped
        let negative = series("1", &[(-10.0, 85.0, 16.0, 98.0), (-20.0, 85.0, 16.0, 98.0)]);
        assert_eq!(vital_stability(&negative, &rules), 1.0);
    }

    #[test]
    fn test_length_of_stay() {
        let rules = ScoringRules::default();
        let critical = series("1", &[(200.0, 40.0, 55.0, 85.0)]);
        assert!(close(length_of_stay_estimate(&critical, &rules), 4.0));

        let long_critical = series("1", &vec![(200.0, 40.0, 55.0, 85.0); 6]);
        // perfectly stable, so the scale factor is 2 - 1
        assert!(close(length_of_stay_estimate(&long_critical, &rules), 4.0));

        let unstable = series(
            "1",
            &[
                (200.0, 40.0, 55.0, 85.0),
                (60.0, 120.0, 16.0, 99.0),
                (200.0, 40.0, 55.0, 85.0),
                (60.0, 120.0, 16.0, 99.0),
                (200.0, 40.0, 55.0, 85.0),
                (200.0, 40.0, 55.0, 85.0),
            ],
        );
        assert!(length_of_stay_estimate(&unstable, &rules) > 4.0);
    }

    #[test]
    fn test_scores_stay_in_range() {
        let rules = ScoringRules::default();
        let rows = [
            (0.0, 0.0, 0.0, 0.0),
            (300.0, 200.0, 80.0, 100.0),
            (35.0, 45.0, 4.0, 70.0),
            (125.0, 60.0, 30.0, 91.0),
        ];
        for window in rows.windows(2) {
            let s = series("1", window);
            let assessment = assess(&s, &rules);
            assert!((0.0..=1.0).contains(&assessment.mortality_risk));
            assert!((0.0..=1.0).contains(&assessment.decompensation_risk));
            assert!((0.0..=1.0).contains(&assessment.stability));
            assert!(assessment.length_of_stay_days >= 1.0);
        }
    }

    #[test]
    fn test_rules_serde_round_trip() {
        let rules = ScoringRules::default();
        let json = serde_json::to_string(&rules).unwrap();
        let parsed: ScoringRules = serde_json::from_str(&json).unwrap();
        assert_eq!(rules, parsed);
    }
}
