//! Planned-versus-present table classification.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::core::traits::SchemaReader;
use crate::error::{Result, SchemaError};

/// Tables split by where they exist.
///
/// The three lists are disjoint: a name is `new` or `existing` depending on
/// whether the target has it, and only unplanned names can be `orphaned`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableDifferences {
    /// Planned, not on the target.
    pub new: Vec<String>,
    /// Planned and on the target.
    pub existing: Vec<String>,
    /// On the target under the prefix, not planned.
    pub orphaned: Vec<String>,
}

impl TableDifferences {
    pub fn is_in_sync(&self) -> bool {
        self.new.is_empty() && self.orphaned.is_empty()
    }
}

/// Classify `planned` names against `present` names. Planned order is kept
/// for `new` and `existing`; `orphaned` is sorted.
pub fn classify(planned: &[String], present: &[String]) -> TableDifferences {
    let present_set: BTreeSet<&str> = present.iter().map(String::as_str).collect();
    let planned_set: BTreeSet<&str> = planned.iter().map(String::as_str).collect();

    let mut diff = TableDifferences::default();
    let mut seen = BTreeSet::new();
    for name in planned {
        if !seen.insert(name.as_str()) {
            continue;
        }
        if present_set.contains(name.as_str()) {
            diff.existing.push(name.clone());
        } else {
            diff.new.push(name.clone());
        }
    }
    diff.orphaned = present_set
        .difference(&planned_set)
        .map(|s| s.to_string())
        .collect();
    diff
}

/// List the target's tables under `prefix` and classify `planned` against
/// them. A listing failure is fatal.
pub async fn analyze<R>(reader: &mut R, planned: &[String], prefix: &str) -> Result<TableDifferences>
where
    R: SchemaReader + ?Sized,
{
    let present = reader.list_tables(prefix).await.map_err(|e| match e {
        e @ SchemaError::SchemaListing(_) => e,
        other => SchemaError::SchemaListing(other.to_string()),
    })?;
    Ok(classify(planned, &present))
}
