//! Ingestion of per-unit source tables into one normalized table.
//!
//! This module provides:
//! - Source discovery and CSV reading with column reconciliation
//! - Numeric imputation and timestamp parsing
//! - Export of the normalized table

pub mod normalize;
pub mod reader;
pub mod types;

use crate::error::{Result, SourceReadError};
use csv::Writer;
use std::path::Path;

// Re-export commonly used types
pub use normalize::{normalize, ImputationStrategy, NormalizationReport, VitalTable};
pub use reader::{discover_sources, ingest, read_source, Ingested};
pub use types::{Channel, Column, RawRecord, StayId, VitalRecord, Vitals, CHANNEL_COUNT};

/// Result of a full ingestion run.
#[derive(Debug)]
pub struct LoadedTable {
    pub table: VitalTable,
    pub report: NormalizationReport,
    pub sources_read: usize,
    pub skipped: Vec<SourceReadError>,
}

/// Read every source at `location` and normalize the combined rows.
pub fn load_table(location: &Path, strategy: ImputationStrategy) -> Result<LoadedTable> {
    let ingested = ingest(location)?;
    let sources_read = ingested.sources.len();
    let (table, report) = normalize(ingested.records, strategy);

    Ok(LoadedTable {
        table,
        report,
        sources_read,
        skipped: ingested.skipped,
    })
}

/// Write the normalized table as CSV with the eICU column headers.
pub fn write_table(table: &VitalTable, path: &Path) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(Column::REQUIRED.iter().map(|column| column.header()))?;

    for record in table.records() {
        let mut row: Vec<String> = Vec::with_capacity(Column::REQUIRED.len());
        for column in Column::REQUIRED {
            row.push(match column {
                Column::StayId => record.stay_id.to_string(),
                Column::HospitalId => record.hospital_id.clone().unwrap_or_default(),
                Column::AdmissionDiagnosis => {
                    record.admission_diagnosis.clone().unwrap_or_default()
                }
                Column::AdmissionWeight => record.admission_weight.to_string(),
                Column::AdmissionHeight => record.admission_height.to_string(),
                Column::ItemOffset => record.item_offset.to_string(),
                Column::Vital(channel) => record.vitals.get(channel).to_string(),
                Column::AdmissionTime => record
                    .admission_time
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default(),
            });
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}
