//! Predictor interfaces.
//!
//! The pipeline never looks inside a predictor. Trained parameters are
//! plain values owned by whoever implements these traits.

use crate::core::windowing::Window;
use crate::error::PredictorError;
use serde::{Deserialize, Serialize};

/// Number of values a sequence forecast must contain.
pub const FORECAST_LEN: usize = 3;

/// Forecasts the next heart rate, MAP and respiratory rate from a window.
pub trait SequencePredictor {
    /// Returns the raw forecast. The caller checks its length.
    fn predict(&self, window: &Window) -> Result<Vec<f64>, PredictorError>;
}

/// Per-row estimates from a tabular predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularPrediction {
    pub mortality: Vec<f64>,
    pub decompensation: Vec<f64>,
    pub length_of_stay: Vec<f64>,
}

impl TabularPrediction {
    pub fn len(&self) -> usize {
        self.mortality.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mortality.is_empty()
    }

    /// Check that every target has exactly `rows` entries.
    pub fn check_rows(&self, rows: usize) -> Result<(), PredictorError> {
        for len in [
            self.mortality.len(),
            self.decompensation.len(),
            self.length_of_stay.len(),
        ] {
            if len != rows {
                return Err(PredictorError::OutputShape {
                    expected: rows,
                    actual: len,
                });
            }
        }
        Ok(())
    }
}

/// Scores preprocessed feature rows.
pub trait TabularPredictor {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<TabularPrediction, PredictorError>;
}
