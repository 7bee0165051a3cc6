use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::analysis::AnalysisResults;
use crate::cleaning::CleaningReport;
use crate::error::Result;

pub const CLEAN_TABLE_FILE: &str = "sales_master.csv";
pub const ANALYSIS_FILE: &str = "analysis_results.json";
pub const CLEANING_REPORT_FILE: &str = "cleaning_report.json";

/// Persists the clean table (canonical + derived columns) for the dashboard
/// and any downstream re-analysis.
pub fn write_clean_csv(df: &DataFrame, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(CLEAN_TABLE_FILE);
    let mut file = fs::File::create(&path)?;
    let mut frame = df.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut frame)?;
    Ok(path)
}

pub fn write_analysis_json(results: &AnalysisResults, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(ANALYSIS_FILE);
    let bytes = serde_json::to_vec_pretty(results)?;
    fs::write(&path, bytes)?;
    Ok(path)
}

pub fn write_cleaning_report_json(report: &CleaningReport, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(CLEANING_REPORT_FILE);
    let bytes = serde_json::to_vec_pretty(report)?;
    fs::write(&path, bytes)?;
    Ok(path)
}
