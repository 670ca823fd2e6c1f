//! Source discovery and CSV reading.
//!
//! Each source is reconciled against the required column list as it is
//! read: matching columns are kept, absent ones become missing values and
//! extra columns are ignored. A source that cannot be read is skipped and
//! reported; only a location with no usable source at all is an error.

use crate::error::{PipelineError, Result, SourceReadError};
use crate::ingest::types::{Channel, Column, RawRecord};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rows read from all usable sources, in concatenation order.
#[derive(Debug, Default)]
pub struct Ingested {
    pub records: Vec<RawRecord>,
    /// Sources that were read successfully, in read order.
    pub sources: Vec<PathBuf>,
    /// Sources that were skipped.
    pub skipped: Vec<SourceReadError>,
}

/// Find the source tables at a location.
///
/// A file is used as the single source. A directory contributes every
/// `.csv` file it contains, sorted by file name.
pub fn discover_sources(location: &Path) -> Result<Vec<PathBuf>> {
    if location.is_file() {
        return Ok(vec![location.to_path_buf()]);
    }

    if !location.is_dir() {
        return Err(PipelineError::NoInputData {
            location: location.to_path_buf(),
        });
    }

    let mut sources: Vec<PathBuf> = std::fs::read_dir(location)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_csv(path))
        .collect();
    sources.sort();

    Ok(sources)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Read every source at a location and concatenate their rows.
///
/// Fails with [`PipelineError::NoInputData`] when no source could be read.
pub fn ingest(location: &Path) -> Result<Ingested> {
    let sources = discover_sources(location)?;
    let mut ingested = Ingested::default();

    for path in sources {
        match read_source(&path) {
            Ok(records) => {
                debug!(path = %path.display(), rows = records.len(), "read source");
                ingested.records.extend(records);
                ingested.sources.push(path);
            }
            Err(e) => {
                warn!("Skipping source: {e}");
                ingested.skipped.push(e);
            }
        }
    }

    if ingested.sources.is_empty() {
        return Err(PipelineError::NoInputData {
            location: location.to_path_buf(),
        });
    }

    info!(
        sources = ingested.sources.len(),
        skipped = ingested.skipped.len(),
        rows = ingested.records.len(),
        "ingestion complete"
    );

    Ok(ingested)
}

/// Read one CSV source into raw records.
///
/// The file handle lives inside the reader and is released on every return
/// path, including a failure part way through the file.
pub fn read_source(path: &Path) -> std::result::Result<Vec<RawRecord>, SourceReadError> {
    let fail = |reason: String| SourceReadError::new(path, reason);

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| fail(e.to_string()))?;

    let headers = reader.headers().map_err(|e| fail(e.to_string()))?.clone();
    let layout = ColumnLayout::resolve(&headers);

    for required in [Column::StayId, Column::ItemOffset] {
        if !layout.has(required) {
            return Err(fail(format!("missing '{}' column", required.header())));
        }
    }

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| fail(format!("row {}: {e}", line + 1)))?;
        records.push(layout.extract(&row));
    }

    Ok(records)
}

/// Positions of the required columns within one source's header.
struct ColumnLayout {
    positions: HashMap<Column, usize>,
}

impl ColumnLayout {
    fn resolve(headers: &StringRecord) -> Self {
        let mut positions = HashMap::new();
        for column in Column::REQUIRED {
            if let Some(position) = headers.iter().position(|name| column.matches(name)) {
                positions.insert(column, position);
            }
        }
        Self { positions }
    }

    fn has(&self, column: Column) -> bool {
        self.positions.contains_key(&column)
    }

    fn text<'r>(&self, row: &'r StringRecord, column: Column) -> Option<&'r str> {
        self.positions
            .get(&column)
            .and_then(|&i| row.get(i))
            .filter(|value| !value.is_empty())
    }

    fn number(&self, row: &StringRecord, column: Column) -> Option<f64> {
        self.text(row, column).and_then(parse_number)
    }

    fn extract(&self, row: &StringRecord) -> RawRecord {
        RawRecord {
            stay_id: self.text(row, Column::StayId).unwrap_or_default().to_string(),
            hospital_id: self.text(row, Column::HospitalId).map(str::to_string),
            admission_diagnosis: self
                .text(row, Column::AdmissionDiagnosis)
                .map(str::to_string),
            admission_weight: self.number(row, Column::AdmissionWeight),
            admission_height: self.number(row, Column::AdmissionHeight),
            item_offset: self.number(row, Column::ItemOffset),
            admission_time: self.text(row, Column::AdmissionTime).map(str::to_string),
            vitals: Channel::ALL.map(|channel| self.number(row, Column::Vital(channel))),
        }
    }
}

/// Coerce a cell to a real number. Anything unparseable is missing.
pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
