//! Error types for segstat

use thiserror::Error;

/// Errors that can occur while loading or analyzing a table.
///
/// Insufficient data (fewer than 2 samples for a statistic) is not an
/// error: the affected statistics come back as missing values. Numeric
/// coercion failures in cells likewise degrade to missing values.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to parse spreadsheet: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid layout: {0}")]
    Format(String),

    #[error("Nothing to summarize: {0}")]
    EmptySelection(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write spreadsheet: {0}")]
    Export(String),
}
