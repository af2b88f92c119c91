//! Pipeline orchestration
//!
//! This module provides the public entry points for segstat. One logical
//! request runs Load -> Filter -> Detect(+Exclude) -> Aggregate, and the
//! chart series and the exportable summary are both derived from the
//! same adjusted table, so a rendered chart and an exported file always
//! agree for that request.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::Arc;

use crate::error::AnalysisError;
use crate::filter::SubjectFilter;
use crate::loader::{load_with, LoadOptions};
use crate::outlier::{detect, exclude_rows, OutlierOptions, OutlierSet};
use crate::summary::{summarize, PlotSeries, SummaryOptions, SummaryTable};
use crate::table::CanonicalTable;

/// How outlier detection participates in a run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierPolicy {
    /// No detection at all.
    #[default]
    Ignore,
    /// Detect and report flags, keep every row.
    Flag(OutlierOptions),
    /// Detect, report flags, and drop each flagged subject's row before
    /// aggregating.
    Exclude(OutlierOptions),
}

/// Everything one analysis run needs, passed explicitly. There is no
/// process-wide state behind this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Metrics to analyze. At least one is required.
    pub metrics: Vec<String>,
    /// Segments to include; empty means every segment a metric has.
    pub segments: Vec<String>,
    pub filter: SubjectFilter,
    pub outliers: OutlierPolicy,
    pub summary: SummaryOptions,
}

impl AnalysisRequest {
    /// Request covering all segments of the given metrics, no filtering,
    /// no outlier handling.
    pub fn for_metrics<I, S>(metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            metrics: metrics.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

/// Structured result of one run: the adjusted table the statistics were
/// computed from, the outlier flags, the summary, and per-metric plot
/// series. All derived from one table within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub table: CanonicalTable,
    pub outliers: OutlierSet,
    pub summary: SummaryTable,
    pub series: Vec<PlotSeries>,
}

impl AnalysisResult {
    /// Serialize for structured hand-off to rendering callers.
    pub fn to_json(&self) -> Result<String, AnalysisError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One-shot run over raw spreadsheet bytes with the default loader
/// layout. Use [`Analyzer`] to reuse parses across runs.
pub fn analyze(bytes: &[u8], request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
    let table = load_with(bytes, &LoadOptions::default())?;
    analyze_table(&table, request)
}

/// Run the pipeline on an already-loaded table.
///
/// Stages:
/// 1. SubjectFilter - isolate/exclude rows
/// 2. Outlier detection per the policy, with row-wise exclusion
/// 3. Aggregation into the summary table
/// 4. Per-metric plot series derived from the same summary
pub fn analyze_table(
    table: &CanonicalTable,
    request: &AnalysisRequest,
) -> Result<AnalysisResult, AnalysisError> {
    let filtered = request.filter.apply(table);
    debug!(
        "filter kept {} of {} rows",
        filtered.n_rows(),
        table.n_rows()
    );

    let (outliers, adjusted) = match request.outliers {
        OutlierPolicy::Ignore => (OutlierSet::default(), filtered),
        OutlierPolicy::Flag(options) => {
            let flags = detect_all(&filtered, request, &options);
            (flags, filtered)
        }
        OutlierPolicy::Exclude(options) => {
            let flags = detect_all(&filtered, request, &options);
            let adjusted = exclude_rows(&filtered, &flags);
            debug!(
                "outlier exclusion dropped {} row(s)",
                filtered.n_rows() - adjusted.n_rows()
            );
            (flags, adjusted)
        }
    };

    let summary = summarize(&adjusted, &request.metrics, &request.segments, &request.summary)?;
    let series = request
        .metrics
        .iter()
        .filter_map(|m| summary.mean_series(m))
        .collect();

    Ok(AnalysisResult {
        table: adjusted,
        outliers,
        summary,
        series,
    })
}

fn detect_all(
    table: &CanonicalTable,
    request: &AnalysisRequest,
    options: &OutlierOptions,
) -> OutlierSet {
    let mut flags = OutlierSet::default();
    for metric in &request.metrics {
        flags.extend(detect(table, metric, &request.segments, options));
    }
    flags
}

/// Stateful entry point owning a read-through parse cache keyed by the
/// exact input bytes. Parsing is the only expensive step; re-analyzing
/// identical bytes skips it. The cache is append-only and each cached
/// table is shared immutably behind an `Arc`.
#[derive(Debug, Default)]
pub struct Analyzer {
    cache: HashMap<u64, Arc<CanonicalTable>>,
    load_options: LoadOptions,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyzer whose loads use a non-default header layout or subject
    /// column.
    pub fn with_load_options(load_options: LoadOptions) -> Self {
        Self {
            cache: HashMap::new(),
            load_options,
        }
    }

    /// Parse spreadsheet bytes, reusing a previous parse of the same
    /// bytes when available.
    pub fn load(&mut self, bytes: &[u8]) -> Result<Arc<CanonicalTable>, AnalysisError> {
        let key = byte_key(bytes);
        if let Some(table) = self.cache.get(&key) {
            debug!("parse cache hit for {} input bytes", bytes.len());
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(load_with(bytes, &self.load_options)?);
        self.cache.insert(key, Arc::clone(&table));
        Ok(table)
    }

    pub fn analyze(
        &mut self,
        bytes: &[u8],
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, AnalysisError> {
        let table = self.load(bytes)?;
        analyze_table(&table, request)
    }

    /// Number of distinct inputs parsed so far.
    pub fn cached_tables(&self) -> usize {
        self.cache.len()
    }
}

fn byte_key(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(bytes);
    hasher.write_u64(bytes.len() as u64);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outlier::OutlierMethod;
    use pretty_assertions::assert_eq;

    const THREE_SUBJECTS: &[u8] = b"\
Subject,HR,HR\n\
,Rest,Stress\n\
A,60,80\n\
B,62,150\n\
C,61,82\n";

    const SIX_SUBJECTS: &[u8] = b"\
Subject,HR,HR\n\
,Rest,Stress\n\
S1,60,80\n\
S2,61,81\n\
S3,62,82\n\
S4,61,81\n\
S5,60,80\n\
S6,61,160\n";

    fn std_flag_request() -> AnalysisRequest {
        AnalysisRequest {
            outliers: OutlierPolicy::Flag(OutlierOptions::new(OutlierMethod::Std)),
            ..AnalysisRequest::for_metrics(["HR"])
        }
    }

    #[test]
    fn test_small_sample_std_detection_flags_nothing() {
        // Stress values [80, 150, 82]: mean 104, sample std ~39.85, so
        // the 2*std fence sits at ~183.7 and even 150 stays inside.
        let result = analyze(THREE_SUBJECTS, &std_flag_request()).unwrap();
        assert!(result.outliers.is_empty());
        assert_eq!(result.table.n_rows(), 3);
    }

    #[test]
    fn test_std_detection_flags_and_excludes() {
        let request = AnalysisRequest {
            outliers: OutlierPolicy::Exclude(OutlierOptions::new(OutlierMethod::Std)),
            ..AnalysisRequest::for_metrics(["HR"])
        };
        let result = analyze(SIX_SUBJECTS, &request).unwrap();

        assert_eq!(result.outliers.len(), 1);
        let record = result.outliers.iter().next().unwrap();
        assert_eq!(record.subject, "S6");
        assert_eq!(record.segment, "Stress");

        // Row-wise removal: S6 is gone from Rest as well.
        assert_eq!(result.table.n_rows(), 5);
        assert!(!result.table.subjects().contains(&"S6".to_string()));

        let stress = result.summary.get("HR", "Stress").unwrap();
        assert_eq!(stress.count, 5);
        assert!((stress.mean.unwrap() - 80.8).abs() < 1e-12);
    }

    #[test]
    fn test_flag_policy_keeps_rows() {
        let result = analyze(SIX_SUBJECTS, &std_flag_request()).unwrap();
        assert_eq!(result.outliers.len(), 1);
        assert_eq!(result.table.n_rows(), 6);
        assert_eq!(result.summary.get("HR", "Stress").unwrap().count, 6);
    }

    #[test]
    fn test_isolation_beats_exclusion_end_to_end() {
        let request = AnalysisRequest {
            filter: SubjectFilter {
                isolate: Some("B".to_string()),
                exclude: ["A", "C"].iter().map(|s| s.to_string()).collect(),
            },
            ..AnalysisRequest::for_metrics(["HR"])
        };
        let result = analyze(THREE_SUBJECTS, &request).unwrap();
        assert_eq!(result.table.subjects(), &["B"]);
        // One row: means are the row's own values, spread is missing.
        let stress = result.summary.get("HR", "Stress").unwrap();
        assert_eq!(stress.mean, Some(150.0));
        assert_eq!(stress.std, None);
    }

    #[test]
    fn test_absent_metric_is_empty_selection() {
        let request = AnalysisRequest::for_metrics(["EDA"]);
        let err = analyze(THREE_SUBJECTS, &request).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptySelection(_)));
    }

    #[test]
    fn test_series_and_summary_agree() {
        let result = analyze(THREE_SUBJECTS, &AnalysisRequest::for_metrics(["HR"])).unwrap();
        assert_eq!(result.series.len(), 1);
        let series = &result.series[0];
        assert_eq!(series.metric, "HR");
        assert_eq!(series.x, vec!["Rest".to_string(), "Stress".to_string()]);
        for (i, segment) in series.x.iter().enumerate() {
            let summary = result.summary.get("HR", segment).unwrap();
            assert_eq!(Some(series.y[i]), summary.mean);
            assert_eq!(series.error[i], summary.sem);
        }
    }

    #[test]
    fn test_analyzer_reuses_parses() {
        let mut analyzer = Analyzer::new();
        let first = analyzer.load(THREE_SUBJECTS).unwrap();
        let second = analyzer.load(THREE_SUBJECTS).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(analyzer.cached_tables(), 1);

        analyzer.load(SIX_SUBJECTS).unwrap();
        assert_eq!(analyzer.cached_tables(), 2);
    }

    #[test]
    fn test_analyzer_results_match_one_shot() {
        let mut analyzer = Analyzer::new();
        let request = std_flag_request();
        let cached = analyzer.analyze(SIX_SUBJECTS, &request).unwrap();
        let one_shot = analyze(SIX_SUBJECTS, &request).unwrap();
        assert_eq!(cached, one_shot);
    }

    #[test]
    fn test_result_serializes() {
        let result = analyze(THREE_SUBJECTS, &AnalysisRequest::for_metrics(["HR"])).unwrap();
        let json = result.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["summary"].is_object());
        assert!(value["series"].is_array());
    }
}
