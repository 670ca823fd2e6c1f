//! Normalization of the combined source table.
//!
//! Turns concatenated raw rows into the patient-ordered [`VitalTable`]: a
//! stable sort by `(stay id, item offset)`, numeric imputation over the
//! whole sorted table and admission timestamp parsing. Sorting first keeps
//! carried values in time order within each stay.
//!
//! The median computed here is global across patients. Model-time
//! preprocessing has its own per-feature median stage in
//! [`crate::model::preprocess`].

use crate::ingest::types::{
    Channel, NumericColumn, RawRecord, StayId, VitalRecord, Vitals, CHANNEL_COUNT,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};
use std::collections::HashSet;
use tracing::{info, warn};

/// Fill value for a column with no observed value anywhere in the table.
const UNOBSERVED_FILL: f64 = 0.0;

/// How missing numeric values are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationStrategy {
    /// Forward fill, then backward fill over the combined table, then the
    /// column median for anything left.
    #[default]
    CarryThenMedian,
    /// Column median only.
    MedianOnly,
}

/// What normalization changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub rows_in: usize,
    /// Rows without a stay id or a parseable item offset.
    pub rows_dropped: usize,
    pub cells_imputed: usize,
    /// Columns with no observed value, filled with a constant.
    pub unobserved_columns: Vec<String>,
}

/// The normalized table, sorted by `(stay id, item offset)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VitalTable {
    records: Vec<VitalRecord>,
}

impl VitalTable {
    /// Build a table from already-normalized records, sorting them.
    pub fn from_records(mut records: Vec<VitalRecord>) -> Self {
        sort_records(&mut records);
        Self { records }
    }

    pub fn records(&self) -> &[VitalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct stay ids in order of first appearance.
    pub fn stay_ids(&self) -> Vec<StayId> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|record| seen.insert(&record.stay_id))
            .map(|record| record.stay_id.clone())
            .collect()
    }
}

/// Normalize concatenated raw rows into a [`VitalTable`].
pub fn normalize(
    mut rows: Vec<RawRecord>,
    strategy: ImputationStrategy,
) -> (VitalTable, NormalizationReport) {
    let mut report = NormalizationReport {
        rows_in: rows.len(),
        ..Default::default()
    };

    rows.retain(|row| !row.stay_id.trim().is_empty() && row.item_offset.is_some());
    report.rows_dropped = report.rows_in - rows.len();
    if report.rows_dropped > 0 {
        warn!(
            rows = report.rows_dropped,
            "dropped rows without stay id or item offset"
        );
    }
    let mut rows = sort_raw(rows);

    for column in NumericColumn::ALL {
        let (imputed, observed) = impute_column(&mut rows, column, strategy);
        report.cells_imputed += imputed;
        if !observed && !rows.is_empty() {
            warn!(column = column.header(), "column has no observed values");
            report.unobserved_columns.push(column.header().to_string());
        }
    }

    let records: Vec<VitalRecord> = rows.into_iter().map(into_vital_record).collect();
    let table = VitalTable::from_records(records);

    info!(
        rows = table.len(),
        imputed = report.cells_imputed,
        "normalization complete"
    );

    (table, report)
}

/// Fill one numeric column in place. Returns the number of filled cells and
/// whether the column had any observed value.
fn impute_column(
    rows: &mut [RawRecord],
    column: NumericColumn,
    strategy: ImputationStrategy,
) -> (usize, bool) {
    let observed: Vec<f64> = rows.iter().filter_map(|row| row.numeric(column)).collect();
    let missing = rows.len() - observed.len();
    if missing == 0 {
        return (0, !observed.is_empty());
    }

    let has_observed = !observed.is_empty();
    let median = if has_observed {
        Data::new(observed).median()
    } else {
        UNOBSERVED_FILL
    };

    if strategy == ImputationStrategy::CarryThenMedian {
        let mut last = None;
        for row in rows.iter_mut() {
            let cell = row.numeric_mut(column);
            match *cell {
                Some(value) => last = Some(value),
                None => *cell = last,
            }
        }

        let mut next = None;
        for row in rows.iter_mut().rev() {
            let cell = row.numeric_mut(column);
            match *cell {
                Some(value) => next = Some(value),
                None => *cell = next,
            }
        }
    }

    for row in rows.iter_mut() {
        let cell = row.numeric_mut(column);
        if cell.is_none() {
            *cell = Some(median);
        }
    }

    (missing, has_observed)
}

fn into_vital_record(row: RawRecord) -> VitalRecord {
    let mut values = [UNOBSERVED_FILL; CHANNEL_COUNT];
    for channel in Channel::ALL {
        values[channel.index()] = row.vitals[channel.index()].unwrap_or(UNOBSERVED_FILL);
    }

    VitalRecord {
        stay_id: StayId::new(&row.stay_id),
        hospital_id: row.hospital_id,
        admission_diagnosis: row.admission_diagnosis,
        admission_weight: row.admission_weight.unwrap_or(UNOBSERVED_FILL),
        admission_height: row.admission_height.unwrap_or(UNOBSERVED_FILL),
        item_offset: row.item_offset.unwrap_or_default(),
        admission_time: row.admission_time.as_deref().and_then(parse_admission_time),
        vitals: Vitals::new(values),
    }
}

/// Stable sort of raw rows by `(stay id, item offset)`.
fn sort_raw(rows: Vec<RawRecord>) -> Vec<RawRecord> {
    let mut keyed: Vec<(StayId, RawRecord)> = rows
        .into_iter()
        .map(|row| (StayId::new(&row.stay_id), row))
        .collect();
    keyed.sort_by(|(a_id, a), (b_id, b)| {
        a_id.cmp(b_id).then_with(|| {
            a.item_offset
                .unwrap_or_default()
                .total_cmp(&b.item_offset.unwrap_or_default())
        })
    });
    keyed.into_iter().map(|(_, row)| row).collect()
}

/// Stable sort by `(stay id, item offset)`.
fn sort_records(records: &mut [VitalRecord]) {
    records.sort_by(|a, b| {
        a.stay_id
            .cmp(&b.stay_id)
            .then_with(|| a.item_offset.total_cmp(&b.item_offset))
    });
}

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Parse an admission timestamp. Unparseable values are missing.
pub fn parse_admission_time(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(stay: &str, offset: f64, heart_rate: Option<f64>) -> RawRecord {
        let mut record = RawRecord {
            stay_id: stay.to_string(),
            item_offset: Some(offset),
            ..Default::default()
        };
        record.vitals[Channel::HeartRate.index()] = heart_rate;
        record
    }

    fn heart_rates(table: &VitalTable) -> Vec<f64> {
        table
            .records()
            .iter()
            .map(|r| r.vitals.get(Channel::HeartRate))
            .collect()
    }

    #[test]
    fn test_carry_forward_then_backward() {
        let rows = vec![
            row("1", 0.0, None),
            row("1", 1.0, Some(80.0)),
            row("1", 2.0, None),
            row("1", 3.0, Some(90.0)),
        ];

        let (table, report) = normalize(rows, ImputationStrategy::CarryThenMedian);
        assert_eq!(heart_rates(&table), vec![80.0, 80.0, 80.0, 90.0]);
        assert!(report.cells_imputed >= 2);
    }

    #[test]
    fn test_carry_forward_follows_offsets() {
        // offset 5 arrives last in the source but is filled from offset 0
        let rows = vec![
            row("1", 0.0, Some(80.0)),
            row("1", 10.0, Some(90.0)),
            row("1", 5.0, None),
        ];

        let (table, _) = normalize(rows, ImputationStrategy::CarryThenMedian);
        assert_eq!(heart_rates(&table), vec![80.0, 80.0, 90.0]);
    }

    #[test]
    fn test_median_only() {
        let rows = vec![
            row("1", 0.0, Some(60.0)),
            row("1", 1.0, None),
            row("1", 2.0, Some(100.0)),
            row("1", 3.0, Some(70.0)),
        ];

        let (table, _) = normalize(rows, ImputationStrategy::MedianOnly);
        assert_eq!(heart_rates(&table), vec![60.0, 70.0, 100.0, 70.0]);
    }

    #[test]
    fn test_unobserved_column_is_reported() {
        let rows = vec![row("1", 0.0, Some(80.0)), row("1", 1.0, Some(82.0))];

        let (table, report) = normalize(rows, ImputationStrategy::CarryThenMedian);
        assert!(report
            .unobserved_columns
            .contains(&Channel::Glucose.header().to_string()));
        assert_eq!(table.records()[0].vitals.get(Channel::Glucose), 0.0);
    }

    #[test]
    fn test_sorted_by_stay_then_offset() {
        let rows = vec![
            row("20", 5.0, Some(1.0)),
            row("3", 9.0, Some(2.0)),
            row("20", 1.0, Some(3.0)),
            row("3", 2.0, Some(4.0)),
        ];

        let (table, _) = normalize(rows, ImputationStrategy::CarryThenMedian);
        let keys: Vec<(String, f64)> = table
            .records()
            .iter()
            .map(|r| (r.stay_id.to_string(), r.item_offset))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("3".to_string(), 2.0),
                ("3".to_string(), 9.0),
                ("20".to_string(), 1.0),
                ("20".to_string(), 5.0),
            ]
        );
        for pair in table.records().windows(2) {
            if pair[0].stay_id == pair[1].stay_id {
                assert!(pair[0].item_offset <= pair[1].item_offset);
            }
        }
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let rows = vec![
            row("1", 0.0, Some(70.0)),
            row("1", 0.0, Some(71.0)),
            row("1", 0.0, Some(72.0)),
        ];

        let (table, _) = normalize(rows, ImputationStrategy::CarryThenMedian);
        assert_eq!(heart_rates(&table), vec![70.0, 71.0, 72.0]);
    }

    #[test]
    fn test_unplaceable_rows_dropped() {
        let mut no_offset = row("1", 0.0, Some(80.0));
        no_offset.item_offset = None;
        let rows = vec![row("1", 0.0, Some(80.0)), no_offset, row("", 1.0, Some(90.0))];

        let (table, report) = normalize(rows, ImputationStrategy::CarryThenMedian);
        assert_eq!(table.len(), 1);
        assert_eq!(report.rows_dropped, 2);
    }

    #[test]
    fn test_parse_admission_time() {
        let parsed = parse_admission_time("2014-07-02 13:16:00").unwrap();
        assert_eq!(parsed.to_string(), "2014-07-02 13:16:00");
        assert!(parse_admission_time("2014-07-02T13:16:00Z").is_some());
        assert!(parse_admission_time("2014-07-02").is_some());
        assert!(parse_admission_time("not a date").is_none());
        assert!(parse_admission_time("13:16:00").is_none());
    }

    #[test]
    fn test_stay_ids_first_appearance() {
        let rows = vec![row("5", 0.0, Some(1.0)), row("2", 0.0, Some(1.0)), row("5", 1.0, Some(1.0))];
        let (table, _) = normalize(rows, ImputationStrategy::CarryThenMedian);
        let ids: Vec<String> = table.stay_ids().iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["2", "5"]);
    }
}
