//! Sequence windowing for forecasting models.
//!
//! A stay is cut into fixed-length runs of consecutive records (default 24)
//! covering all 8 channels. Training windows carry a label taken from the
//! three primary channels; the inference window is the unlabeled tail of
//! the stay.

use crate::core::series::PatientSeries;
use crate::error::{PipelineError, Result};
use crate::ingest::types::{Channel, StayId, CHANNEL_COUNT};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Default number of records per window.
pub const DEFAULT_WINDOW_SIZE: usize = 24;

/// Which record labels a training window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelAlignment {
    /// The last record inside the window (`i + W - 1`); `N - W + 1` windows.
    #[default]
    LastInWindow,
    /// The record right after the window (`i + W`); `N - W` windows.
    NextRecord,
}

/// A fixed-length slice of one stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    /// Stay the records belong to
    pub stay_id: StayId,
    /// Index of the first record within the stay
    pub start_index: usize,
    /// One row per record, channels in fixed order
    pub rows: Vec<[f64; CHANNEL_COUNT]>,
    /// Heart rate, MAP and respiratory rate of the label record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<[f64; 3]>,
}

impl Window {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one channel across the window.
    pub fn channel(&self, channel: Channel) -> Vec<f64> {
        self.rows.iter().map(|row| row[channel.index()]).collect()
    }

    /// The most recent row.
    pub fn last_row(&self) -> Option<&[f64; CHANNEL_COUNT]> {
        self.rows.last()
    }
}

/// Cuts patient series into windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windower {
    /// Records per window
    size: usize,
    /// Label record for training windows
    alignment: LabelAlignment,
}

impl Default for Windower {
    fn default() -> Self {
        Self {
            size: DEFAULT_WINDOW_SIZE,
            alignment: LabelAlignment::default(),
        }
    }
}

impl Windower {
    /// Create a windower. A size of zero is a configuration error.
    pub fn new(size: usize, alignment: LabelAlignment) -> Result<Self> {
        if size == 0 {
            return Err(PipelineError::Configuration(
                "window size must be at least 1".to_string(),
            ));
        }
        Ok(Self { size, alignment })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn alignment(&self) -> LabelAlignment {
        self.alignment
    }

    /// Labeled training windows of a stay. Stays too short for a single
    /// window yield nothing.
    pub fn training_windows(&self, series: &PatientSeries) -> Vec<Window> {
        let n = series.len();
        let label_offset = match self.alignment {
            LabelAlignment::LastInWindow => self.size - 1,
            LabelAlignment::NextRecord => self.size,
        };
        if n <= label_offset {
            return Vec::new();
        }

        let records = series.records();
        (0..n - label_offset)
            .map(|start| {
                let label = records[start + label_offset].vitals.primary();
                self.cut(series, start, Some(label))
            })
            .collect()
    }

    /// The last `size` records of a stay, unlabeled.
    pub fn inference_window(&self, series: &PatientSeries) -> Result<Window> {
        let n = series.len();
        if n < self.size {
            return Err(PipelineError::InsufficientHistory {
                stay_id: series.stay_id().clone(),
                required: self.size,
                available: n,
            });
        }
        Ok(self.cut(series, n - self.size, None))
    }

    fn cut(&self, series: &PatientSeries, start: usize, label: Option<[f64; 3]>) -> Window {
        Window {
            stay_id: series.stay_id().clone(),
            start_index: start,
            rows: series.records()[start..start + self.size]
                .iter()
                .map(|record| *record.vitals.as_array())
                .collect(),
            label,
        }
    }
}

/// Write windows as JSON lines, one window per line.
pub fn write_jsonl(windows: &[Window], path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for window in windows {
        serde_json::to_writer(&mut writer, window)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::test_support::{series, steady};

    #[test]
    fn test_thirty_records_give_seven_windows() {
        let windows = Windower::default().training_windows(&steady("1", 30));
        assert_eq!(windows.len(), 7);
        assert_eq!(windows[0].start_index, 0);
        assert_eq!(windows[6].start_index, 6);
        assert!(windows.iter().all(|w| w.len() == 24 && w.label.is_some()));
    }

    #[test]
    fn test_short_stay_gives_no_windows() {
        assert!(Windower::default().training_windows(&steady("1", 10)).is_empty());
        assert!(Windower::default().training_windows(&steady("1", 23)).is_empty());
        assert_eq!(Windower::default().training_windows(&steady("1", 24)).len(), 1);
    }

    #[test]
    fn test_label_alignment() {
        let rows: Vec<(f64, f64, f64, f64)> = (0..5)
            .map(|i| (60.0 + i as f64, 70.0 + i as f64, 12.0 + i as f64, 98.0))
            .collect();
        let s = series("1", &rows);

        let last = Windower::new(3, LabelAlignment::LastInWindow).unwrap();
        let windows = last.training_windows(&s);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].label, Some([62.0, 72.0, 14.0]));

        let next = Windower::new(3, LabelAlignment::NextRecord).unwrap();
        let windows = next.training_windows(&s);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].label, Some([63.0, 73.0, 15.0]));
        assert_eq!(windows[1].label, Some([64.0, 74.0, 16.0]));
    }

    #[test]
    fn test_window_rows_cover_all_channels() {
        let s = series("1", &[(80.0, 70.0, 16.0, 97.0), (81.0, 71.0, 17.0, 96.0)]);
        let window = Windower::new(2, LabelAlignment::LastInWindow)
            .unwrap()
            .inference_window(&s)
            .unwrap();
        assert_eq!(window.rows[0].len(), CHANNEL_COUNT);
        assert_eq!(window.channel(Channel::HeartRate), vec![80.0, 81.0]);
        assert_eq!(window.rows[1][Channel::Ph.index()], 7.4);
    }

    #[test]
    fn test_inference_window_takes_tail() {
        let rows: Vec<(f64, f64, f64, f64)> =
            (0..30).map(|i| (i as f64, 80.0, 16.0, 98.0)).collect();
        let window = Windower::default().inference_window(&series("1", &rows)).unwrap();
        assert_eq!(window.start_index, 6);
        assert_eq!(window.label, None);
        assert_eq!(window.last_row().unwrap()[Channel::HeartRate.index()], 29.0);
    }

    #[test]
    fn test_inference_window_requires_history() {
        let err = Windower::default().inference_window(&steady("1", 5)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientHistory {
                required: 24,
                available: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(Windower::new(0, LabelAlignment::LastInWindow).is_err());
    }

    #[test]
    fn test_write_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("windows.jsonl");
        let windows = Windower::new(2, LabelAlignment::LastInWindow)
            .unwrap()
            .training_windows(&steady("1", 4));

        write_jsonl(&windows, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: Window = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first, windows[0]);
    }
}
