//! Core table types for the segstat pipeline
//!
//! This module defines the canonical two-level table that flows through
//! every stage: rows keyed by subject, columns keyed by (metric, segment)
//! pairs, cells that are either a numeric value or missing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AnalysisError;

/// Typed two-level column key.
///
/// Constructed once by the loader and carried as structured data through
/// the rest of the pipeline; downstream stages never re-derive it from
/// string parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnKey {
    pub metric: String,
    pub segment: String,
}

impl ColumnKey {
    pub fn new(metric: impl Into<String>, segment: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            segment: segment.into(),
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.metric, self.segment)
    }
}

/// The canonical repeated-measures table.
///
/// One row per subject (duplicate subject ids are preserved as separate
/// rows, never merged), one column per (metric, segment) pair. A cell is
/// `None` when the measurement is absent; missing cells are ignored by
/// every downstream aggregate rather than treated as zero.
///
/// Tables are immutable after construction: filtering and outlier
/// exclusion return derived copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTable {
    subjects: Vec<String>,
    columns: Vec<ColumnKey>,
    cells: Vec<Vec<Option<f64>>>,
}

impl CanonicalTable {
    /// Build a table from parts, validating the rectangular shape.
    pub fn new(
        subjects: Vec<String>,
        columns: Vec<ColumnKey>,
        cells: Vec<Vec<Option<f64>>>,
    ) -> Result<Self, AnalysisError> {
        if subjects.len() != cells.len() {
            return Err(AnalysisError::Format(format!(
                "{} subjects but {} data rows",
                subjects.len(),
                cells.len()
            )));
        }
        for (i, row) in cells.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(AnalysisError::Format(format!(
                    "row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(Self {
            subjects,
            columns,
            cells,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.subjects.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Subject ids in row order.
    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    /// Column keys in column order.
    pub fn columns(&self) -> &[ColumnKey] {
        &self.columns
    }

    /// Metric names in first-seen column order, deduplicated.
    pub fn metrics(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for key in &self.columns {
            if !out.contains(&key.metric) {
                out.push(key.metric.clone());
            }
        }
        out
    }

    /// Segment names of one metric, in column order.
    pub fn segments_of(&self, metric: &str) -> Vec<String> {
        self.columns
            .iter()
            .filter(|k| k.metric == metric)
            .map(|k| k.segment.clone())
            .collect()
    }

    pub fn has_metric(&self, metric: &str) -> bool {
        self.columns.iter().any(|k| k.metric == metric)
    }

    /// Index of the (metric, segment) column, if present.
    pub fn column_index(&self, metric: &str, segment: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|k| k.metric == metric && k.segment == segment)
    }

    /// One row of cells, in column order.
    pub fn row(&self, row: usize) -> &[Option<f64>] {
        &self.cells[row]
    }

    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.cells[row][col]
    }

    /// All cells of one column, in row order.
    pub fn column(&self, col: usize) -> Vec<Option<f64>> {
        self.cells.iter().map(|row| row[col]).collect()
    }

    /// Derived table keeping only the rows whose index is in `keep`,
    /// preserving row order. Columns are untouched.
    pub fn retain_rows(&self, keep: &[usize]) -> CanonicalTable {
        let subjects = keep.iter().map(|&i| self.subjects[i].clone()).collect();
        let cells = keep.iter().map(|&i| self.cells[i].clone()).collect();
        CanonicalTable {
            subjects,
            columns: self.columns.clone(),
            cells,
        }
    }

    /// Row/column grid of display strings for UI preview.
    pub fn to_grid(&self) -> TableGrid {
        let mut metric_row = vec!["Subject".to_string()];
        let mut segment_row = vec![String::new()];
        for key in &self.columns {
            metric_row.push(key.metric.clone());
            segment_row.push(key.segment.clone());
        }

        let rows = self
            .subjects
            .iter()
            .zip(&self.cells)
            .map(|(subject, cells)| {
                let mut row = vec![subject.clone()];
                row.extend(cells.iter().map(|c| format_cell(*c)));
                row
            })
            .collect();

        TableGrid {
            header: vec![metric_row, segment_row],
            rows,
        }
    }
}

/// A rendered grid: header rows followed by data rows, all strings.
/// Missing cells render as empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableGrid {
    pub header: Vec<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

pub(crate) fn format_cell(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v}"),
        None => String::new(),
    }
}
