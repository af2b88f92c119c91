//! Summary statistics
//!
//! Per-(metric, segment) descriptive aggregates over the filtered,
//! outlier-adjusted table: mean, sample standard deviation, count,
//! standard error, min, max, and derived high/low bounds. Also derives
//! plot-ready labeled series for chart-rendering callers.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::stats::{mean, non_missing, sample_std};
use crate::table::{format_cell, CanonicalTable, ColumnKey, TableGrid};

/// Default multiplier for the derived out_high/out_low bounds. Kept
/// independent of the detector's STD multiplier.
pub const DEFAULT_BOUND_MULTIPLIER: f64 = 2.5;

/// Statistic row names, in the order they appear in a rendered summary.
pub const STAT_ROWS: [&str; 8] = [
    "mean", "std", "count", "sem", "min", "max", "out_high", "out_low",
];

/// Aggregator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryOptions {
    /// `out_high = mean + k*std`, `out_low = mean - k*std`.
    pub bound_multiplier: f64,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            bound_multiplier: DEFAULT_BOUND_MULTIPLIER,
        }
    }
}

/// Descriptive statistics of one (metric, segment) column, computed over
/// non-missing values only. `std` and `sem` are missing below 2 samples;
/// everything except `count` is missing for an empty column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub sem: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub out_high: Option<f64>,
    pub out_low: Option<f64>,
}

impl ColumnSummary {
    fn compute(values: &[Option<f64>], bound_multiplier: f64) -> Self {
        let vals = non_missing(values);
        let count = vals.len();
        let mean = mean(&vals);
        let std = sample_std(&vals);
        let sem = std.map(|s| s / (count as f64).sqrt());
        let min = vals.iter().copied().reduce(f64::min);
        let max = vals.iter().copied().reduce(f64::max);
        let out_high = match (mean, std) {
            (Some(m), Some(s)) => Some(m + bound_multiplier * s),
            _ => None,
        };
        let out_low = match (mean, std) {
            (Some(m), Some(s)) => Some(m - bound_multiplier * s),
            _ => None,
        };
        Self {
            count,
            mean,
            std,
            sem,
            min,
            max,
            out_high,
            out_low,
        }
    }
}

/// Plot-ready labeled series for one metric: ordered segment labels,
/// per-segment means, and the standard error where available. The three
/// vectors are index-aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSeries {
    pub metric: String,
    pub x: Vec<String>,
    pub y: Vec<f64>,
    pub error: Vec<Option<f64>>,
}

/// Statistic rows by (metric, segment) columns. Created fresh per
/// request; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryTable {
    columns: Vec<ColumnKey>,
    summaries: Vec<ColumnSummary>,
}

impl SummaryTable {
    pub fn columns(&self) -> &[ColumnKey] {
        &self.columns
    }

    pub fn summaries(&self) -> &[ColumnSummary] {
        &self.summaries
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, metric: &str, segment: &str) -> Option<&ColumnSummary> {
        self.columns
            .iter()
            .position(|k| k.metric == metric && k.segment == segment)
            .map(|i| &self.summaries[i])
    }

    /// Per-metric mean series with SEM error bars, for chart rendering.
    /// Segments without any data are left out. `None` when the summary
    /// has no columns for the metric.
    pub fn mean_series(&self, metric: &str) -> Option<PlotSeries> {
        if !self.columns.iter().any(|k| k.metric == metric) {
            return None;
        }
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut error = Vec::new();
        for (key, summary) in self.columns.iter().zip(&self.summaries) {
            if key.metric != metric {
                continue;
            }
            if let Some(m) = summary.mean {
                x.push(key.segment.clone());
                y.push(m);
                error.push(summary.sem);
            }
        }
        Some(PlotSeries {
            metric: metric.to_string(),
            x,
            y,
            error,
        })
    }

    /// Row/column grid of display strings: one row per statistic.
    pub fn to_grid(&self) -> TableGrid {
        let mut metric_row = vec!["Statistic".to_string()];
        let mut segment_row = vec![String::new()];
        for key in &self.columns {
            metric_row.push(key.metric.clone());
            segment_row.push(key.segment.clone());
        }

        let rows = vec![
            self.stat_row("mean", |s| format_cell(s.mean)),
            self.stat_row("std", |s| format_cell(s.std)),
            self.stat_row("count", |s| s.count.to_string()),
            self.stat_row("sem", |s| format_cell(s.sem)),
            self.stat_row("min", |s| format_cell(s.min)),
            self.stat_row("max", |s| format_cell(s.max)),
            self.stat_row("out_high", |s| format_cell(s.out_high)),
            self.stat_row("out_low", |s| format_cell(s.out_low)),
        ];

        TableGrid {
            header: vec![metric_row, segment_row],
            rows,
        }
    }

    fn stat_row(&self, name: &str, value: impl Fn(&ColumnSummary) -> String) -> Vec<String> {
        let mut row = vec![name.to_string()];
        row.extend(self.summaries.iter().map(|s| value(s)));
        row
    }

    /// Serialize for structured hand-off to rendering callers.
    pub fn to_json(&self) -> Result<String, AnalysisError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Summarize the requested metrics and segments.
///
/// Requested segments are intersected with each metric's actual columns,
/// preserving requested order; an empty `segments` slice means every
/// segment the metric has. Fails with `EmptySelection` when no valid
/// segment remains for any requested metric, so callers can warn instead
/// of rendering a silent empty table.
pub fn summarize(
    table: &CanonicalTable,
    metrics: &[String],
    segments: &[String],
    options: &SummaryOptions,
) -> Result<SummaryTable, AnalysisError> {
    let mut columns = Vec::new();
    let mut summaries = Vec::new();

    for metric in metrics {
        let metric_cols: Vec<(usize, &ColumnKey)> = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, k)| k.metric == *metric)
            .collect();
        let selected: Vec<(usize, &ColumnKey)> = if segments.is_empty() {
            metric_cols
        } else {
            segments
                .iter()
                .filter_map(|s| {
                    metric_cols.iter().find(|(_, k)| k.segment == *s).copied()
                })
                .collect()
        };
        for (col, key) in selected {
            columns.push(key.clone());
            summaries.push(ColumnSummary::compute(
                &table.column(col),
                options.bound_multiplier,
            ));
        }
    }

    if columns.is_empty() {
        return Err(AnalysisError::EmptySelection(format!(
            "metrics {:?} with segments {:?} match no columns",
            metrics, segments
        )));
    }

    Ok(SummaryTable { columns, summaries })
}
