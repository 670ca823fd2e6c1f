//! Reference forecasters.
//!
//! Simple baselines that satisfy [`SequencePredictor`] without any trained
//! parameters. Used by the CLI and as a yardstick for real models.

use crate::core::windowing::Window;
use crate::error::PredictorError;
use crate::ingest::types::Channel;
use crate::model::predictor::SequencePredictor;
use statrs::statistics::Statistics;

/// Persistence forecast: the next values equal the last observed ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastValueForecaster;

impl SequencePredictor for LastValueForecaster {
    fn predict(&self, window: &Window) -> Result<Vec<f64>, PredictorError> {
        let last = window.last_row().ok_or(PredictorError::InputShape {
            expected: 1,
            actual: 0,
        })?;
        Ok(Channel::PRIMARY.iter().map(|c| last[c.index()]).collect())
    }
}

/// Forecasts the mean of each primary channel over the window.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowMeanForecaster;

impl SequencePredictor for WindowMeanForecaster {
    fn predict(&self, window: &Window) -> Result<Vec<f64>, PredictorError> {
        if window.is_empty() {
            return Err(PredictorError::InputShape {
                expected: 1,
                actual: 0,
            });
        }
        Ok(Channel::PRIMARY
            .iter()
            .map(|&c| window.channel(c).mean())
            .collect())
    }
}
