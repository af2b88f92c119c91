//! segstat - Tabular statistics engine for repeated-measures study spreadsheets
//!
//! segstat turns a spreadsheet of repeated-measures data (one row per
//! subject, columns organized as metric/segment pairs) into filtered,
//! outlier-adjusted summary statistics through a deterministic pipeline:
//! loading -> subject filtering -> outlier detection -> aggregation.
//!
//! ## Modules
//!
//! - **loader**: Parse spreadsheet bytes into the canonical two-level table
//! - **filter**: Isolate or exclude subjects
//! - **outlier**: Flag rows under the IQR or STD rule, per segment
//! - **summary**: Per-segment descriptive statistics and plot series
//! - **pipeline**: Compose the stages; one entry point per use case
//! - **export**: Serialize results back to spreadsheet bytes

pub mod error;
pub mod export;
pub mod filter;
pub mod loader;
pub mod outlier;
pub mod pipeline;
pub mod stats;
pub mod summary;
pub mod table;

pub use error::AnalysisError;
pub use filter::SubjectFilter;
pub use loader::{load, load_with, HeaderLayout, LoadOptions};
pub use outlier::{OutlierMethod, OutlierOptions, OutlierRecord, OutlierSet};
pub use pipeline::{
    analyze, analyze_table, AnalysisRequest, AnalysisResult, Analyzer, OutlierPolicy,
};
pub use summary::{summarize, ColumnSummary, PlotSeries, SummaryOptions, SummaryTable};
pub use table::{CanonicalTable, ColumnKey, TableGrid};

/// Crate version reported by the CLI.
pub const SEGSTAT_VERSION: &str = env!("CARGO_PKG_VERSION");
