//! Secondary index planning.
//!
//! Indexes found by introspection are kept as they are. Only when a table
//! brings none are single-column indexes recommended from column names.

use std::collections::HashSet;
use tracing::debug;

use crate::core::schema::{IndexDescriptor, TableDescriptor};

/// Column-name fragments that earn a recommended index, in priority order.
pub const INDEX_KEYWORDS: [&str; 15] = [
    "fk_",
    "_id",
    "create_time",
    "update_time",
    "modified_time",
    "date",
    "time",
    "status",
    "state",
    "flag",
    "user_id",
    "username",
    "code",
    "name",
    "type",
];

/// Where a table's planned indexes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Discovered,
    Recommended,
}

/// Decide the secondary indexes for a table.
///
/// `discovered` are the indexes introspection reported. Entries named like
/// a primary-key index, entries naming unknown columns, and repeated names
/// are dropped. If nothing is left, recommendations are synthesized.
pub fn plan_indexes(
    table: &TableDescriptor,
    discovered: Vec<IndexDescriptor>,
) -> (Vec<IndexDescriptor>, IndexSource) {
    let mut seen = HashSet::new();
    let kept: Vec<IndexDescriptor> = discovered
        .into_iter()
        .filter(|idx| !idx.name.to_lowercase().starts_with("primary"))
        .filter(|idx| !idx.columns.is_empty())
        .filter(|idx| {
            let known = idx.columns.iter().all(|c| table.column(c).is_some());
            if !known {
                debug!("{}: skipping index {} on unknown columns", table.name, idx.name);
            }
            known
        })
        .filter(|idx| seen.insert(idx.name.clone()))
        .collect();

    if !kept.is_empty() {
        return (kept, IndexSource::Discovered);
    }
    (recommend_indexes(table), IndexSource::Recommended)
}

/// One non-unique index per non-key, non-large column whose name matches a
/// keyword, named `idx_<table>_<column>`.
pub fn recommend_indexes(table: &TableDescriptor) -> Vec<IndexDescriptor> {
    table
        .columns
        .iter()
        .filter(|c| !c.primary_key && !c.data_type.is_large())
        .filter(|c| {
            let lower = c.name.to_lowercase();
            INDEX_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .map(|c| {
            IndexDescriptor::new(
                format!("idx_{}_{}", table.name, c.name),
                vec![c.name.clone()],
                false,
            )
        })
        .collect()
}
