//! Record and column types shared by ingestion and the downstream stages.
//!
//! Source tables use the eICU column headers; the camelCase names are
//! accepted as aliases.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Number of monitored vital channels.
pub const CHANNEL_COUNT: usize = 8;

/// Identifier of one patient stay.
///
/// Ordering is numeric when both ids are integers, lexicographic otherwise,
/// with numeric ids sorting before non-numeric ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StayId(String);

impl StayId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn numeric(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl Ord for StayId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for StayId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for StayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StayId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One monitored vital-sign stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    HeartRate,
    Map,
    RespiratoryRate,
    O2Saturation,
    Fio2,
    Temperature,
    Glucose,
    Ph,
}

impl Channel {
    /// All channels in fixed order. Feature manifests and window rows follow it.
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::HeartRate,
        Channel::Map,
        Channel::RespiratoryRate,
        Channel::O2Saturation,
        Channel::Fio2,
        Channel::Temperature,
        Channel::Glucose,
        Channel::Ph,
    ];

    /// Channels forecast by sequence models and used as window labels.
    pub const PRIMARY: [Channel; 3] = [Channel::HeartRate, Channel::Map, Channel::RespiratoryRate];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Column header in eICU source tables.
    pub fn header(self) -> &'static str {
        match self {
            Channel::HeartRate => "Heart Rate",
            Channel::Map => "MAP (mmHg)",
            Channel::RespiratoryRate => "Respiratory Rate",
            Channel::O2Saturation => "O2 Saturation",
            Channel::Fio2 => "FiO2",
            Channel::Temperature => "Temperature (C)",
            Channel::Glucose => "glucose",
            Channel::Ph => "pH",
        }
    }

    pub fn camel_name(self) -> &'static str {
        match self {
            Channel::HeartRate => "heartRate",
            Channel::Map => "map",
            Channel::RespiratoryRate => "respiratoryRate",
            Channel::O2Saturation => "o2Saturation",
            Channel::Fio2 => "fio2",
            Channel::Temperature => "temperature",
            Channel::Glucose => "glucose",
            Channel::Ph => "ph",
        }
    }

    /// Prefix used in feature names.
    pub fn short_name(self) -> &'static str {
        match self {
            Channel::HeartRate => "HR",
            Channel::Map => "MAP",
            Channel::RespiratoryRate => "RR",
            Channel::O2Saturation => "O2",
            Channel::Fio2 => "FiO2",
            Channel::Temperature => "Temp",
            Channel::Glucose => "Glucose",
            Channel::Ph => "pH",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.camel_name())
    }
}

/// Columns of the unified source schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    StayId,
    HospitalId,
    AdmissionDiagnosis,
    AdmissionWeight,
    AdmissionHeight,
    ItemOffset,
    Vital(Channel),
    AdmissionTime,
}

impl Column {
    /// The required feature list, in output order.
    pub const REQUIRED: [Column; 15] = [
        Column::StayId,
        Column::HospitalId,
        Column::AdmissionDiagnosis,
        Column::AdmissionWeight,
        Column::AdmissionHeight,
        Column::ItemOffset,
        Column::Vital(Channel::HeartRate),
        Column::Vital(Channel::Map),
        Column::Vital(Channel::RespiratoryRate),
        Column::Vital(Channel::O2Saturation),
        Column::Vital(Channel::Fio2),
        Column::Vital(Channel::Temperature),
        Column::Vital(Channel::Glucose),
        Column::Vital(Channel::Ph),
        Column::AdmissionTime,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::StayId => "patientunitstayid",
            Column::HospitalId => "hospitalid",
            Column::AdmissionDiagnosis => "apacheadmissiondx",
            Column::AdmissionWeight => "admissionweight",
            Column::AdmissionHeight => "admissionheight",
            Column::ItemOffset => "itemoffset",
            Column::Vital(channel) => channel.header(),
            Column::AdmissionTime => "admissiontime",
        }
    }

    pub fn alias(self) -> &'static str {
        match self {
            Column::StayId => "patientStayId",
            Column::HospitalId => "hospitalId",
            Column::AdmissionDiagnosis => "admissionDiagnosis",
            Column::AdmissionWeight => "admissionWeight",
            Column::AdmissionHeight => "admissionHeight",
            Column::ItemOffset => "itemOffset",
            Column::Vital(channel) => channel.camel_name(),
            Column::AdmissionTime => "admissionTime",
        }
    }

    /// Case-insensitive match against the header or its alias.
    pub fn matches(self, name: &str) -> bool {
        let name = name.trim();
        name.eq_ignore_ascii_case(self.header()) || name.eq_ignore_ascii_case(self.alias())
    }
}

/// Numeric columns subject to coercion and imputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericColumn {
    AdmissionWeight,
    AdmissionHeight,
    Vital(Channel),
}

impl NumericColumn {
    pub const ALL: [NumericColumn; CHANNEL_COUNT + 2] = [
        NumericColumn::AdmissionWeight,
        NumericColumn::AdmissionHeight,
        NumericColumn::Vital(Channel::HeartRate),
        NumericColumn::Vital(Channel::Map),
        NumericColumn::Vital(Channel::RespiratoryRate),
        NumericColumn::Vital(Channel::O2Saturation),
        NumericColumn::Vital(Channel::Fio2),
        NumericColumn::Vital(Channel::Temperature),
        NumericColumn::Vital(Channel::Glucose),
        NumericColumn::Vital(Channel::Ph),
    ];

    pub fn header(self) -> &'static str {
        match self {
            NumericColumn::AdmissionWeight => Column::AdmissionWeight.header(),
            NumericColumn::AdmissionHeight => Column::AdmissionHeight.header(),
            NumericColumn::Vital(channel) => channel.header(),
        }
    }
}

/// A source row after column reconciliation and numeric coercion.
///
/// Absent and unparseable values are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub stay_id: String,
    pub hospital_id: Option<String>,
    pub admission_diagnosis: Option<String>,
    pub admission_weight: Option<f64>,
    pub admission_height: Option<f64>,
    pub item_offset: Option<f64>,
    pub admission_time: Option<String>,
    pub vitals: [Option<f64>; CHANNEL_COUNT],
}

impl RawRecord {
    pub fn numeric(&self, column: NumericColumn) -> Option<f64> {
        match column {
            NumericColumn::AdmissionWeight => self.admission_weight,
            NumericColumn::AdmissionHeight => self.admission_height,
            NumericColumn::Vital(channel) => self.vitals[channel.index()],
        }
    }

    pub fn numeric_mut(&mut self, column: NumericColumn) -> &mut Option<f64> {
        match column {
            NumericColumn::AdmissionWeight => &mut self.admission_weight,
            NumericColumn::AdmissionHeight => &mut self.admission_height,
            NumericColumn::Vital(channel) => &mut self.vitals[channel.index()],
        }
    }
}

/// Imputed channel values of one observation, indexed by [`Channel`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vitals([f64; CHANNEL_COUNT]);

impl Vitals {
    pub fn new(values: [f64; CHANNEL_COUNT]) -> Self {
        Self(values)
    }

    pub fn get(&self, channel: Channel) -> f64 {
        self.0[channel.index()]
    }

    pub fn as_array(&self) -> &[f64; CHANNEL_COUNT] {
        &self.0
    }

    /// Values of the three primary channels.
    pub fn primary(&self) -> [f64; 3] {
        Channel::PRIMARY.map(|channel| self.get(channel))
    }
}

/// One normalized, timestamped observation for one patient stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalRecord {
    pub stay_id: StayId,
    pub hospital_id: Option<String>,
    pub admission_diagnosis: Option<String>,
    pub admission_weight: f64,
    pub admission_height: f64,
    /// Relative time offset, non-decreasing within a stay.
    pub item_offset: f64,
    pub admission_time: Option<NaiveDateTime>,
    pub vitals: Vitals,
}
