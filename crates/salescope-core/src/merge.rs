use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Concatenates adapter outputs into one table, preserving intra-source row
/// order. Callers pass frames in source priority order; ids are already
/// namespaced per source, so ordering only matters for duplicate handling
/// downstream.
pub fn merge_sources(frames: &[DataFrame]) -> Result<DataFrame> {
    let mut iter = frames.iter();
    let first = iter.next().ok_or_else(|| {
        PipelineError::Processing("no source tables to merge".to_string())
    })?;

    let mut merged = first.clone();
    for frame in iter {
        if frame.get_column_names() != merged.get_column_names() {
            return Err(PipelineError::Processing(
                "source tables disagree on the canonical column set".to_string(),
            ));
        }
        merged = merged.vstack(frame)?;
    }
    Ok(merged)
}
