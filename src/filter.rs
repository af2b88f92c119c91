//! Subject filtering
//!
//! Row selection over the canonical table: either isolate a single
//! subject or exclude a set of subjects. Isolation wins unconditionally
//! when both are present; that override is relied on by the pipeline and
//! must not be weakened to a default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::table::CanonicalTable;

/// Subject selection applied before any statistics run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectFilter {
    /// Keep exactly this subject's rows, ignoring `exclude` entirely.
    /// `None` or an empty string means no isolation.
    pub isolate: Option<String>,
    /// Drop these subjects' rows. An empty set keeps every row.
    pub exclude: BTreeSet<String>,
}

impl SubjectFilter {
    /// No-op filter: keeps every row.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn isolate(subject: impl Into<String>) -> Self {
        Self {
            isolate: Some(subject.into()),
            exclude: BTreeSet::new(),
        }
    }

    pub fn exclude<I, S>(subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            isolate: None,
            exclude: subjects.into_iter().map(Into::into).collect(),
        }
    }

    fn isolated(&self) -> Option<&str> {
        self.isolate.as_deref().filter(|s| !s.is_empty())
    }

    /// Apply the filter, returning a derived table. Only row selection
    /// happens here; the column schema is untouched.
    pub fn apply(&self, table: &CanonicalTable) -> CanonicalTable {
        let keep: Vec<usize> = match self.isolated() {
            Some(id) => table
                .subjects()
                .iter()
                .enumerate()
                .filter(|(_, s)| s.as_str() == id)
                .map(|(i, _)| i)
                .collect(),
            None => table
                .subjects()
                .iter()
                .enumerate()
                .filter(|(_, s)| !self.exclude.contains(s.as_str()))
                .map(|(i, _)| i)
                .collect(),
        };
        table.retain_rows(&keep)
    }
}
