use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Explicit configuration for one pipeline run. Every stage takes the piece
/// it needs as an argument; there is no process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sources: SourcePaths,
    pub output_dir: PathBuf,
    pub cleaning: CleaningConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcePaths {
    pub online: PathBuf,
    pub retail: PathBuf,
    pub wholesale: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Revenue quantile above which rows are dropped as outliers.
    pub outlier_percentile: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Two-tailed p-value below which the Q4 uplift counts as significant.
    pub significance_alpha: f64,
    /// Abort the run on the first degenerate KPI instead of skipping it.
    pub strict_kpis: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: SourcePaths::default(),
            output_dir: PathBuf::from("outputs"),
            cleaning: CleaningConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            online: PathBuf::from("data/sales_online.csv"),
            retail: PathBuf::from("data/sales_retail.csv"),
            wholesale: PathBuf::from("data/sales_wholesale.csv"),
        }
    }
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            outlier_percentile: 0.999,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            significance_alpha: 0.05,
            strict_kpis: false,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config = toml::from_str(&text)?;
        Ok(config)
    }

    /// Points all three source paths at `dir`, keeping the default filenames.
    pub fn with_data_dir(mut self, dir: &Path) -> Self {
        self.sources.online = dir.join("sales_online.csv");
        self.sources.retail = dir.join("sales_retail.csv");
        self.sources.wholesale = dir.join("sales_wholesale.csv");
        self
    }

    pub fn with_output_dir(mut self, dir: &Path) -> Self {
        self.output_dir = dir.to_path_buf();
        self
    }

    /// Source input paths in the adapter registry's priority order.
    pub fn source_path(&self, source_name: &str) -> Option<&Path> {
        match source_name {
            "online" => Some(self.sources.online.as_path()),
            "retail" => Some(self.sources.retail.as_path()),
            "wholesale" => Some(self.sources.wholesale.as_path()),
            _ => None,
        }
    }
}
