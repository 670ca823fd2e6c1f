//! Demonstration of the ICU Vitals pipeline.
//!
//! This example shows how to:
//! 1. Ingest per-unit CSV tables into one normalized table
//! 2. Group records into patient series
//! 3. Compute feature vectors and rule-based severity
//! 4. Cut training windows
//! 5. Forecast one stay and build a risk report
//!
//! Run with: cargo run --example pipeline_demo

use icu_vitals::{
    core::{assess_all, extract_all, group_by_stay, windows_all, FeatureProfile, ReportBuilder},
    ingest::{load_table, ImputationStrategy},
    model::WindowMeanForecaster,
    orchestrator::{Orchestrator, RiskThresholds},
    Config, StayId, CLINICAL_DISCLAIMER,
};
use std::fmt::Write as _;

const HEADER: &str = "patientunitstayid,itemoffset,admissionweight,admissionheight,\
Heart Rate,MAP (mmHg),Respiratory Rate,O2 Saturation,FiO2,Temperature (C),glucose,pH";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("ICU Vitals - Pipeline Demo");
    println!("==========================");
    println!();

    // Synthetic unit table: one stable stay and one deteriorating stay
    let dir = tempfile::tempdir()?;
    let mut csv = format!("{HEADER}\n");
    for i in 0..30 {
        writeln!(csv, "1001,{},78,172,{},84,15,98,0.21,36.9,105,7.41", i * 60, 76 + i % 4)?;
    }
    for i in 0..26 {
        let hr = 90 + i * 2;
        let map = 80.0 - i as f64 * 1.2;
        let o2 = 97.0 - i as f64 * 0.3;
        writeln!(csv, "1002,{},91,180,{hr},{map:.1},22,{o2:.1},0.4,38.2,160,7.31", i * 60)?;
    }
    std::fs::write(dir.path().join("unit_micu.csv"), csv)?;

    let config = Config::default();
    let loaded = load_table(dir.path(), ImputationStrategy::CarryThenMedian)?;
    println!("Ingested {} records from {} source(s)", loaded.table.len(), loaded.sources_read);

    let series = group_by_stay(&loaded.table)?;
    let features = extract_all(&series, FeatureProfile::Extended)?;
    println!(
        "Computed {} feature vectors of {} features",
        features.len(),
        features.manifest().len()
    );

    let windows = windows_all(&series, &config.windower()?);
    println!("Cut {} training windows", windows.len());
    println!();

    let report = ReportBuilder::new().build(assess_all(&series, &config.scoring));
    for patient in &report.patients {
        println!(
            "Stay {}: acuity {}, mortality {:.3}, decompensation {:.2}, LOS {:.1} days",
            patient.stay_id,
            patient.acuity,
            patient.mortality_risk,
            patient.decompensation_risk,
            patient.length_of_stay_days
        );
    }
    println!();

    let thresholds = RiskThresholds::from_map(&RiskThresholds::reference_map())?;
    let orchestrator = Orchestrator::new(config.windower()?, thresholds, &config.scoring);
    let envelope = orchestrator.report(&loaded.table, &WindowMeanForecaster, &StayId::new("1002"));
    println!("Forecast report for stay 1002:");
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    println!();
    println!("{CLINICAL_DISCLAIMER}");

    Ok(())
}
