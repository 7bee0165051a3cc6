use std::path::PathBuf;

use polars::prelude::DataFrame;
use salescope_adapters::{adapt_source_path, builtin_sources};
use tracing::{info, warn};

use crate::analysis::{self, AnalysisResults};
use crate::cleaning::{self, CleaningReport};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::{merge, outputs, validation};

/// Everything the reconciliation half of the pipeline produces.
#[derive(Debug, Clone)]
pub struct ReconcileOutput {
    pub clean: DataFrame,
    pub all_rows: DataFrame,
    pub report: CleaningReport,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub clean: DataFrame,
    pub all_rows: DataFrame,
    pub report: CleaningReport,
    pub results: AnalysisResults,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub master_csv: PathBuf,
    pub analysis_json: PathBuf,
    pub cleaning_report_json: PathBuf,
}

/// Adapts each registered source from its configured path, in registry
/// priority order.
pub fn load_sources(config: &PipelineConfig) -> Result<Vec<DataFrame>> {
    let mut frames = Vec::new();
    for schema in builtin_sources() {
        let path = config.source_path(schema.name).ok_or_else(|| {
            PipelineError::Processing(format!("no input path configured for '{}'", schema.name))
        })?;
        let frame = adapt_source_path(schema, path)?;
        info!(source = schema.name, rows = frame.height(), "adapted source");
        frames.push(frame);
    }
    Ok(frames)
}

/// Adapters → merge → clean → contract validation.
pub fn reconcile(config: &PipelineConfig) -> Result<ReconcileOutput> {
    let frames = load_sources(config)?;
    let merged = merge::merge_sources(&frames)?;
    info!(rows = merged.height(), "merged source tables");

    let outcome = cleaning::clean_merged(&merged, &config.cleaning)?;
    let violations =
        validation::validate_clean_table(&outcome.clean, outcome.report.outlier_threshold)?;
    for violation in &violations {
        warn!(violation = %violation, "clean-table contract violation");
    }

    Ok(ReconcileOutput {
        clean: outcome.clean,
        all_rows: outcome.all_rows,
        report: outcome.report,
        violations,
    })
}

/// The full in-memory pipeline: reconcile, then aggregate.
pub fn execute(config: &PipelineConfig) -> Result<PipelineRun> {
    let reconciled = reconcile(config)?;
    let results = analysis::analyze(&reconciled.clean, &reconciled.all_rows, &config.analysis)?;
    Ok(PipelineRun {
        clean: reconciled.clean,
        all_rows: reconciled.all_rows,
        report: reconciled.report,
        results,
        violations: reconciled.violations,
    })
}

/// Runs the pipeline and persists every artifact.
pub fn run_pipeline(config: &PipelineConfig) -> Result<(PipelineRun, RunArtifacts)> {
    let run = execute(config)?;
    let master_csv = outputs::write_clean_csv(&run.clean, &config.output_dir)?;
    let analysis_json = outputs::write_analysis_json(&run.results, &config.output_dir)?;
    let cleaning_report_json =
        outputs::write_cleaning_report_json(&run.report, &config.output_dir)?;
    info!(
        master = %master_csv.display(),
        analysis = %analysis_json.display(),
        "pipeline artifacts written"
    );
    Ok((
        run,
        RunArtifacts {
            master_csv,
            analysis_json,
            cleaning_report_json,
        },
    ))
}
