//! Spreadsheet export
//!
//! Serializes summary tables and canonical tables back into CSV byte
//! streams with the same two-row header layout the loader accepts, and
//! builds traceable filenames from the selected metrics.

use csv::Writer;

use crate::error::AnalysisError;
use crate::summary::SummaryTable;
use crate::table::{CanonicalTable, TableGrid};

/// Serialize a summary table as a spreadsheet byte stream: metric header
/// row, segment header row, then one row per statistic with the
/// statistic name in the leading column.
pub fn summary_to_csv(summary: &SummaryTable) -> Result<Vec<u8>, AnalysisError> {
    grid_to_csv(&summary.to_grid())
}

/// Serialize a canonical/filtered table for preview or re-import. The
/// output uses the loader's two-row header layout, so exporting and
/// re-loading round-trips.
pub fn table_to_csv(table: &CanonicalTable) -> Result<Vec<u8>, AnalysisError> {
    grid_to_csv(&table.to_grid())
}

fn grid_to_csv(grid: &TableGrid) -> Result<Vec<u8>, AnalysisError> {
    let mut writer = Writer::from_writer(Vec::new());
    for row in grid.header.iter().chain(grid.rows.iter()) {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| AnalysisError::Export(e.to_string()))
}

/// Download filename encoding the selected metrics for traceability,
/// e.g. `summary_HR_RMSSD.csv`.
pub fn export_filename(metrics: &[String]) -> String {
    let parts: Vec<String> = metrics
        .iter()
        .map(|m| sanitize(m))
        .filter(|m| !m.is_empty())
        .collect();
    if parts.is_empty() {
        "summary.csv".to_string()
    } else {
        format!("summary_{}.csv", parts.join("_"))
    }
}

fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load;
    use crate::summary::{summarize, SummaryOptions};
    use crate::table::ColumnKey;
    use pretty_assertions::assert_eq;

    fn sample_table() -> CanonicalTable {
        CanonicalTable::new(
            vec!["A".into(), "B".into()],
            vec![
                ColumnKey::new("HR", "Rest"),
                ColumnKey::new("HR", "Stress"),
            ],
            vec![
                vec![Some(60.0), Some(80.0)],
                vec![Some(62.5), None],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_summary_csv_layout() {
        let summary = summarize(
            &sample_table(),
            &["HR".to_string()],
            &[],
            &SummaryOptions::default(),
        )
        .unwrap();
        let bytes = summary_to_csv(&summary).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Statistic,HR,HR");
        assert_eq!(lines[1], ",Rest,Stress");
        assert!(lines[2].starts_with("mean,"));
        // 2 header rows + 8 statistic rows
        assert_eq!(lines.len(), 10);
    }

    #[test]
    fn test_table_csv_round_trips_through_loader() {
        let table = sample_table();
        let bytes = table_to_csv(&table).unwrap();
        let reloaded = load(&bytes).unwrap();
        assert_eq!(reloaded, table);
    }

    #[test]
    fn test_export_filename_joins_metrics() {
        let metrics = vec!["HR".to_string(), "RMSSD".to_string()];
        assert_eq!(export_filename(&metrics), "summary_HR_RMSSD.csv");
    }

    #[test]
    fn test_export_filename_sanitizes() {
        let metrics = vec!["Heart Rate".to_string(), "SpO2/avg".to_string()];
        assert_eq!(
            export_filename(&metrics),
            "summary_Heart-Rate_SpO2-avg.csv"
        );
    }

    #[test]
    fn test_export_filename_fallback() {
        assert_eq!(export_filename(&[]), "summary.csv");
        assert_eq!(export_filename(&["  ".to_string()]), "summary.csv");
    }
}
