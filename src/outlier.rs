//! Outlier detection
//!
//! Classifies rows as outliers per (metric, segment) column under two
//! interchangeable rules: interquartile-range fences or mean ± k standard
//! deviations. Each segment is judged independently; detection across a
//! list of segments is the union of the per-segment flags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::stats::{mean, non_missing, quantile, sample_std};
use crate::table::CanonicalTable;

/// Default multiplier for the STD rule.
pub const DEFAULT_STD_MULTIPLIER: f64 = 2.0;

/// Default fence multiplier for the IQR rule.
pub const DEFAULT_IQR_FENCE: f64 = 1.5;

/// Outlier classification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    /// Outside `[Q1 - fence*IQR, Q3 + fence*IQR]`, quartiles by linear
    /// interpolation between order statistics.
    Iqr,
    /// Further than `multiplier * std` from the mean (sample std).
    Std,
}

impl OutlierMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutlierMethod::Iqr => "iqr",
            OutlierMethod::Std => "std",
        }
    }
}

/// Detector configuration. The STD multiplier here is independent of the
/// summary table's bound multiplier; the two default to different values
/// on purpose (2.0 for detection, 2.5 for reporting bounds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierOptions {
    pub method: OutlierMethod,
    pub std_multiplier: f64,
    pub iqr_fence: f64,
}

impl OutlierOptions {
    pub fn new(method: OutlierMethod) -> Self {
        Self {
            method,
            std_multiplier: DEFAULT_STD_MULTIPLIER,
            iqr_fence: DEFAULT_IQR_FENCE,
        }
    }
}

impl Default for OutlierOptions {
    fn default() -> Self {
        Self::new(OutlierMethod::Std)
    }
}

/// One flagged (subject, metric, segment) cell. A subject can be an
/// outlier in some segments and not others, so flags are a set of these
/// records rather than a table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutlierRecord {
    pub subject: String,
    pub metric: String,
    pub segment: String,
    pub method: OutlierMethod,
}

/// Queryable collection of outlier flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierSet {
    records: BTreeSet<OutlierRecord>,
}

impl OutlierSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutlierRecord> {
        self.records.iter()
    }

    /// Distinct flagged subjects, across all segments and metrics.
    pub fn subjects(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.subject.clone()).collect()
    }

    pub fn contains_subject(&self, subject: &str) -> bool {
        self.records.iter().any(|r| r.subject == subject)
    }

    /// Flags within one segment, across metrics.
    pub fn in_segment(&self, segment: &str) -> Vec<&OutlierRecord> {
        self.records.iter().filter(|r| r.segment == segment).collect()
    }

    /// Flags for one subject, across segments and metrics.
    pub fn for_subject(&self, subject: &str) -> Vec<&OutlierRecord> {
        self.records.iter().filter(|r| r.subject == subject).collect()
    }

    pub fn insert(&mut self, record: OutlierRecord) {
        self.records.insert(record);
    }

    pub fn extend(&mut self, other: OutlierSet) {
        self.records.extend(other.records);
    }
}

/// Acceptance interval for one column's non-missing values. `None` when
/// the column is degenerate (fewer than 2 values): degenerate input
/// reports zero outliers, never an error.
fn bounds(values: &[f64], options: &OutlierOptions) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    match options.method {
        OutlierMethod::Std => {
            let m = mean(values)?;
            let s = sample_std(values)?;
            let spread = options.std_multiplier * s;
            Some((m - spread, m + spread))
        }
        OutlierMethod::Iqr => {
            let q1 = quantile(values, 0.25)?;
            let q3 = quantile(values, 0.75)?;
            let fence = options.iqr_fence * (q3 - q1);
            Some((q1 - fence, q3 + fence))
        }
    }
}

/// Subjects flagged in one (metric, segment) column. A segment the
/// metric does not have yields no flags.
pub fn detect_segment(
    table: &CanonicalTable,
    metric: &str,
    segment: &str,
    options: &OutlierOptions,
) -> BTreeSet<String> {
    let mut flagged = BTreeSet::new();
    let Some(col) = table.column_index(metric, segment) else {
        return flagged;
    };
    let column = table.column(col);
    let Some((lo, hi)) = bounds(&non_missing(&column), options) else {
        return flagged;
    };
    for (row, value) in column.iter().enumerate() {
        if let Some(v) = value {
            if *v < lo || *v > hi {
                flagged.insert(table.subjects()[row].clone());
            }
        }
    }
    flagged
}

/// Union of per-segment flags for one metric. An empty `segments` slice
/// means every segment the metric has.
pub fn detect(
    table: &CanonicalTable,
    metric: &str,
    segments: &[String],
    options: &OutlierOptions,
) -> OutlierSet {
    let segments: Vec<String> = if segments.is_empty() {
        table.segments_of(metric)
    } else {
        segments.to_vec()
    };

    let mut set = OutlierSet::default();
    for segment in &segments {
        for subject in detect_segment(table, metric, segment, options) {
            set.insert(OutlierRecord {
                subject,
                metric: metric.to_string(),
                segment: segment.clone(),
                method: options.method,
            });
        }
    }
    set
}

/// Remove every row whose subject is flagged anywhere in `outliers`.
/// Removal is row-wise so the table stays rectangular; per-cell nulling
/// is not supported.
pub fn exclude_rows(table: &CanonicalTable, outliers: &OutlierSet) -> CanonicalTable {
    let flagged = outliers.subjects();
    let keep: Vec<usize> = table
        .subjects()
        .iter()
        .enumerate()
        .filter(|(_, s)| !flagged.contains(s.as_str()))
        .map(|(i, _)| i)
        .collect();
    table.retain_rows(&keep)
}
