//! Per-stay record sequences.

use crate::error::{PipelineError, Result};
use crate::ingest::types::{Channel, StayId, VitalRecord};
use crate::ingest::VitalTable;
use std::collections::HashMap;

/// Ordered, non-empty records of one patient stay.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientSeries {
    stay_id: StayId,
    records: Vec<VitalRecord>,
}

impl PatientSeries {
    /// Validate and wrap the records of one stay.
    ///
    /// Records must be non-empty, share one stay id and have non-decreasing
    /// item offsets.
    pub fn new(records: Vec<VitalRecord>) -> Result<Self> {
        let stay_id = records
            .first()
            .map(|record| record.stay_id.clone())
            .ok_or_else(|| PipelineError::InvalidSeries("series has no records".to_string()))?;

        if let Some(other) = records.iter().find(|r| r.stay_id != stay_id) {
            return Err(PipelineError::InvalidSeries(format!(
                "series for stay {stay_id} contains a record of stay {}",
                other.stay_id
            )));
        }

        if records
            .windows(2)
            .any(|pair| pair[1].item_offset < pair[0].item_offset)
        {
            return Err(PipelineError::InvalidSeries(format!(
                "item offsets of stay {stay_id} are not in ascending order"
            )));
        }

        Ok(Self { stay_id, records })
    }

    pub fn stay_id(&self) -> &StayId {
        &self.stay_id
    }

    pub fn records(&self) -> &[VitalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false for a constructed series.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> &VitalRecord {
        &self.records[0]
    }

    pub fn latest(&self) -> &VitalRecord {
        &self.records[self.records.len() - 1]
    }

    /// Values of one channel in chronological order.
    pub fn channel(&self, channel: Channel) -> Vec<f64> {
        self.records.iter().map(|r| r.vitals.get(channel)).collect()
    }
}

/// Split a normalized table into one series per stay, in order of first
/// appearance of each stay id.
pub fn group_by_stay(table: &VitalTable) -> Result<Vec<PatientSeries>> {
    let mut positions: HashMap<&StayId, usize> = HashMap::new();
    let mut groups: Vec<Vec<VitalRecord>> = Vec::new();

    for record in table.records() {
        let index = *positions.entry(&record.stay_id).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[index].push(record.clone());
    }

    groups.into_iter().map(PatientSeries::new).collect()
}

/// Look up a single stay in a table.
pub fn find_series(table: &VitalTable, stay_id: &StayId) -> Result<PatientSeries> {
    let records: Vec<VitalRecord> = table
        .records()
        .iter()
        .filter(|record| &record.stay_id == stay_id)
        .cloned()
        .collect();

    if records.is_empty() {
        return Err(PipelineError::PatientNotFound(stay_id.clone()));
    }

    PatientSeries::new(records)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::ingest::types::{Vitals, CHANNEL_COUNT};

    /// Build a record with the four scored channels set and sane defaults
    /// for the rest.
    pub fn record(stay: &str, offset: f64, hr: f64, map: f64, rr: f64, o2: f64) -> VitalRecord {
        let mut values = [0.0; CHANNEL_COUNT];
        values[Channel::HeartRate.index()] = hr;
        values[Channel::Map.index()] = map;
        values[Channel::RespiratoryRate.index()] = rr;
        values[Channel::O2Saturation.index()] = o2;
        values[Channel::Fio2.index()] = 0.21;
        values[Channel::Temperature.index()] = 37.0;
        values[Channel::Glucose.index()] = 110.0;
        values[Channel::Ph.index()] = 7.4;

        VitalRecord {
            stay_id: StayId::new(stay),
            hospital_id: Some("73".to_string()),
            admission_diagnosis: None,
            admission_weight: 80.0,
            admission_height: 175.0,
            item_offset: offset,
            admission_time: None,
            vitals: Vitals::new(values),
        }
    }

    pub fn series(stay: &str, rows: &[(f64, f64, f64, f64)]) -> PatientSeries {
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, &(hr, map, rr, o2))| record(stay, i as f64 * 60.0, hr, map, rr, o2))
            .collect();
        PatientSeries::new(records).unwrap()
    }

    /// A stable series of `n` normal records.
    pub fn steady(stay: &str, n: usize) -> PatientSeries {
        series(stay, &vec![(80.0, 85.0, 16.0, 98.0); n])
    }
}
