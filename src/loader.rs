//! Spreadsheet loading
//!
//! This module parses a raw spreadsheet byte stream (CSV) into the
//! canonical two-level table:
//! - Two-row header: metric names over segment names
//! - A documented variant carries a units/descriptor row between the two
//! - Leading subject column, or an explicitly named one
//! - Cells coerced to numbers; anything that fails coercion is missing

use csv::ReaderBuilder;
use log::warn;

use crate::error::AnalysisError;
use crate::table::{CanonicalTable, ColumnKey};

/// Header layout of the input sheet. Never sniffed; callers state which
/// variant they are uploading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderLayout {
    /// Row 1 = metric names, row 2 = segment names.
    #[default]
    MetricSegment,
    /// Row 1 = metric names, row 2 = units/descriptor (skipped),
    /// row 3 = segment names.
    MetricUnitsSegment,
}

impl HeaderLayout {
    fn header_rows(self) -> usize {
        match self {
            HeaderLayout::MetricSegment => 2,
            HeaderLayout::MetricUnitsSegment => 3,
        }
    }
}

/// Loader configuration.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub layout: HeaderLayout,
    /// Header name of the subject column. `None` means the leftmost
    /// column is the subject column.
    pub subject_column: Option<String>,
}

/// Load a canonical table from CSV bytes using the default layout.
pub fn load(bytes: &[u8]) -> Result<CanonicalTable, AnalysisError> {
    load_with(bytes, &LoadOptions::default())
}

/// Load a canonical table from CSV bytes.
///
/// Columns whose header does not yield exactly two non-empty tokens
/// (metric, segment) are dropped with a warning as long as at least one
/// valid column remains; a sheet with no valid column fails the load.
/// A failed load never yields a partially populated table.
pub fn load_with(bytes: &[u8], options: &LoadOptions) -> Result<CanonicalTable, AnalysisError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = Vec::new();
    for result in reader.records() {
        records.push(result?);
    }

    let header_rows = options.layout.header_rows();
    if records.len() < header_rows {
        return Err(AnalysisError::Format(format!(
            "expected {} header rows, found {} rows total",
            header_rows,
            records.len()
        )));
    }

    let metric_row = &records[0];
    let segment_row = &records[header_rows - 1];
    let width = metric_row.len().max(segment_row.len());
    if width == 0 {
        return Err(AnalysisError::Format("header rows are empty".to_string()));
    }

    let subject_idx = match &options.subject_column {
        None => 0,
        Some(name) => (0..width)
            .find(|&i| {
                header_cell(metric_row, i) == name.as_str()
                    || header_cell(segment_row, i) == name.as_str()
            })
            .ok_or_else(|| {
                AnalysisError::Format(format!("subject column '{name}' not found in header"))
            })?,
    };

    // Pair up the header rows into typed column keys, collecting the
    // invalid columns for the drop-or-fail policy.
    let mut columns = Vec::new();
    let mut column_indices = Vec::new();
    let mut dropped = Vec::new();
    for i in (0..width).filter(|&i| i != subject_idx) {
        let metric = header_cell(metric_row, i);
        let segment = header_cell(segment_row, i);
        if metric.is_empty() || segment.is_empty() {
            dropped.push(i + 1); // 1-based for messages
        } else {
            columns.push(ColumnKey::new(metric, segment));
            column_indices.push(i);
        }
    }

    if columns.is_empty() {
        return Err(AnalysisError::Format(format!(
            "no column has both a metric and a segment header ({} invalid column(s))",
            dropped.len()
        )));
    }
    if !dropped.is_empty() {
        warn!(
            "dropping {} column(s) without a (metric, segment) header: columns {:?}",
            dropped.len(),
            dropped
        );
    }

    let mut subjects = Vec::new();
    let mut cells = Vec::new();
    for record in &records[header_rows..] {
        subjects.push(normalize_subject(record.get(subject_idx).unwrap_or("")));
        cells.push(
            column_indices
                .iter()
                .map(|&i| coerce_cell(record.get(i).unwrap_or("")))
                .collect(),
        );
    }

    CanonicalTable::new(subjects, columns, cells)
}

fn header_cell<'a>(record: &'a csv::StringRecord, i: usize) -> &'a str {
    record.get(i).unwrap_or("").trim()
}

/// Coerce one data cell. Unparseable and non-finite values are missing,
/// never zero and never an error.
fn coerce_cell(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

/// Normalize a subject cell to a stable identifier. Trims whitespace and
/// collapses spreadsheet float artifacts ("101.0" becomes "101") so the
/// same participant hashes identically across exports.
fn normalize_subject(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains('.') {
        if let Ok(v) = trimmed.parse::<f64>() {
            if v.is_finite() && v.fract() == 0.0 {
                return format!("{}", v as i64);
            }
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BASIC: &[u8] = b"\
Subject,HR,HR,RMSSD\n\
,Rest,Stress,Rest\n\
A,60,80,42\n\
B,62,150,\n\
C,61,82,39\n";

    #[test]
    fn test_load_two_row_header() {
        let table = load(BASIC).unwrap();
        assert_eq!(table.subjects(), &["A", "B", "C"]);
        assert_eq!(
            table.columns(),
            &[
                ColumnKey::new("HR", "Rest"),
                ColumnKey::new("HR", "Stress"),
                ColumnKey::new("RMSSD", "Rest"),
            ]
        );
        assert_eq!(table.value(1, 1), Some(150.0));
        assert_eq!(table.value(1, 2), None);
    }

    #[test]
    fn test_units_row_variant() {
        let input = b"\
Subject,HR,HR\n\
,bpm,bpm\n\
,Rest,Stress\n\
A,60,80\n";
        let options = LoadOptions {
            layout: HeaderLayout::MetricUnitsSegment,
            ..Default::default()
        };
        let table = load_with(input, &options).unwrap();
        assert_eq!(table.columns()[1], ColumnKey::new("HR", "Stress"));
        assert_eq!(table.n_rows(), 1);
        assert_eq!(table.value(0, 0), Some(60.0));
    }

    #[test]
    fn test_invalid_column_dropped() {
        // Third data column has no segment header: dropped, load proceeds.
        let input = b"\
Subject,HR,HR,Notes\n\
,Rest,Stress,\n\
A,60,80,fine\n";
        let table = load(input).unwrap();
        assert_eq!(table.n_cols(), 2);
        assert_eq!(table.segments_of("HR"), vec!["Rest", "Stress"]);
    }

    #[test]
    fn test_all_columns_invalid_fails() {
        let input = b"\
Subject,Notes,Comment\n\
,,\n\
A,fine,ok\n";
        let err = load(input).unwrap_err();
        assert!(matches!(err, AnalysisError::Format(_)));
    }

    #[test]
    fn test_missing_header_rows_fails() {
        let err = load(b"Subject,HR\n").unwrap_err();
        assert!(matches!(err, AnalysisError::Format(_)));
        let err = load(b"").unwrap_err();
        assert!(matches!(err, AnalysisError::Format(_)));
    }

    #[test]
    fn test_coercion_failures_become_missing() {
        let input = b"\
Subject,HR,HR\n\
,Rest,Stress\n\
A,sixty,1e2\n\
B,NaN,  75.5  \n";
        let table = load(input).unwrap();
        assert_eq!(table.value(0, 0), None);
        assert_eq!(table.value(0, 1), Some(100.0));
        assert_eq!(table.value(1, 0), None);
        assert_eq!(table.value(1, 1), Some(75.5));
    }

    #[test]
    fn test_ragged_rows_pad_missing() {
        let input = b"\
Subject,HR,HR\n\
,Rest,Stress\n\
A,60\n";
        let table = load(input).unwrap();
        assert_eq!(table.value(0, 0), Some(60.0));
        assert_eq!(table.value(0, 1), None);
    }

    #[test]
    fn test_named_subject_column() {
        let input = b"\
HR,Participant,HR\n\
Rest,,Stress\n\
60,A,80\n";
        let options = LoadOptions {
            subject_column: Some("Participant".to_string()),
            ..Default::default()
        };
        let table = load_with(input, &options).unwrap();
        assert_eq!(table.subjects(), &["A"]);
        assert_eq!(table.value(0, 0), Some(60.0));
        assert_eq!(table.value(0, 1), Some(80.0));
    }

    #[test]
    fn test_named_subject_column_missing_fails() {
        let options = LoadOptions {
            subject_column: Some("Participant".to_string()),
            ..Default::default()
        };
        let err = load_with(BASIC, &options).unwrap_err();
        assert!(matches!(err, AnalysisError::Format(_)));
    }

    #[test]
    fn test_duplicate_subjects_preserved() {
        let input = b"\
Subject,HR\n\
,Rest\n\
A,60\n\
A,64\n";
        let table = load(input).unwrap();
        assert_eq!(table.subjects(), &["A", "A"]);
        assert_eq!(table.n_rows(), 2);
    }

    #[test]
    fn test_subject_float_artifact_normalized() {
        let input = b"\
Subject,HR\n\
,Rest\n\
101.0,60\n\
 102 ,61\n";
        let table = load(input).unwrap();
        assert_eq!(table.subjects(), &["101", "102"]);
    }
}
