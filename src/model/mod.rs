//! Model-facing pieces: predictor seams, preprocessing and training sets.
//!
//! No model is trained here. Fitted parameters are plain values passed by
//! reference into `transform`/`predict`.

pub mod dataset;
pub mod predictor;
pub mod preprocess;
pub mod reference;

pub use dataset::{OutcomeLabel, OutcomeLabels, TrainingExample, TrainingSet};
pub use predictor::{SequencePredictor, TabularPrediction, TabularPredictor, FORECAST_LEN};
pub use preprocess::{FeatureImputer, Preprocessor, StandardScaler};
pub use reference::{LastValueForecaster, WindowMeanForecaster};
