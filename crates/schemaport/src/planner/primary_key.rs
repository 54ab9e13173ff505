//! Primary key demotion and synthesis.
//!
//! Large-data columns (`Text`, `LargeBinary`, `JSON`, arrays) can never be
//! part of a key. A table that ends up without key columns gets one chosen
//! for it: first an id-like single column, otherwise a composite key built
//! from leading columns while their estimated byte width fits the target.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::schema::{GenericType, TableDescriptor};
use crate::dialect::Dialect;

/// Name fragments that mark a column as a natural single-column key.
const KEY_NAME_HINTS: [&str; 4] = ["id", "uuid", "guid", "key"];

/// Bytes charged per character of a `String(n)` (worst-case UTF-8).
const BYTES_PER_CHAR: u32 = 4;

/// Width charged for a column whose kind has no better estimate.
const UNKNOWN_KEY_BYTES: u32 = 255 * BYTES_PER_CHAR;

/// How a table's primary key was settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "columns", rename_all = "snake_case")]
pub enum KeyChoice {
    /// The reflected key survived demotion.
    Existing(Vec<String>),
    /// An id-like column was promoted.
    Single(String),
    /// Leading columns were combined under the byte limit.
    Composite(Vec<String>),
    /// Nothing qualified; the table stays keyless.
    None,
}

/// Estimated key width of one column, in bytes.
///
/// `String(n)` is charged four bytes per character. This is an upper
/// bound for utf8mb4-style encodings, not an exact storage size.
pub fn estimate_key_bytes(ty: &GenericType) -> u32 {
    match ty {
        GenericType::String(n) => n.saturating_mul(BYTES_PER_CHAR),
        GenericType::Integer => 4,
        GenericType::BigInteger => 8,
        GenericType::SmallInteger => 2,
        GenericType::Float
        | GenericType::Numeric { .. }
        | GenericType::Date
        | GenericType::Time
        | GenericType::DateTime => 8,
        GenericType::Boolean => 1,
        _ => UNKNOWN_KEY_BYTES,
    }
}

/// Chooses or synthesizes primary keys under one dialect's key-size limit.
#[derive(Debug, Clone, Copy)]
pub struct PrimaryKeySelector {
    max_key_bytes: u32,
}

impl PrimaryKeySelector {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            max_key_bytes: dialect.profile().max_key_bytes,
        }
    }

    pub fn max_key_bytes(&self) -> u32 {
        self.max_key_bytes
    }

    /// Clear the key flag on large-data columns. Returns the demoted names.
    pub fn demote_large_keys(&self, table: &mut TableDescriptor) -> Vec<String> {
        let mut demoted = Vec::new();
        for col in &mut table.columns {
            if col.primary_key && col.data_type.is_large() {
                col.primary_key = false;
                demoted.push(col.name.clone());
            }
        }
        if !demoted.is_empty() {
            warn!(
                "{}: dropped large-data columns from primary key: {}",
                table.name,
                demoted.join(", ")
            );
            table.sync_primary_key();
        }
        demoted
    }

    /// Demote, then pick a key if the table has none left.
    ///
    /// Chosen key columns are marked NOT NULL; autoincrement survives only on
    /// a single integer key column.
    pub fn select(&self, table: &mut TableDescriptor) -> KeyChoice {
        self.demote_large_keys(table);
        table.sync_primary_key();

        let choice = if table.has_primary_key() {
            KeyChoice::Existing(table.primary_key.clone())
        } else if let Some(name) = self.single_candidate(table) {
            debug!("{}: promoting {} to primary key", table.name, name);
            KeyChoice::Single(name)
        } else {
            let cols = self.composite_candidates(table);
            if cols.is_empty() {
                warn!("{}: no column qualifies for a primary key", table.name);
                KeyChoice::None
            } else {
                debug!("{}: composite primary key ({})", table.name, cols.join(", "));
                KeyChoice::Composite(cols)
            }
        };

        let key: &[String] = match &choice {
            KeyChoice::Existing(cols) | KeyChoice::Composite(cols) => cols,
            KeyChoice::Single(name) => std::slice::from_ref(name),
            KeyChoice::None => &[],
        };
        table.set_primary_key(key);
        for col in &mut table.columns {
            if col.primary_key {
                col.nullable = false;
            }
            if col.autoincrement && !(key.len() == 1 && col.primary_key && col.data_type.is_integer()) {
                col.autoincrement = false;
            }
        }
        choice
    }

    /// First non-large column whose name looks like an identifier.
    fn single_candidate(&self, table: &TableDescriptor) -> Option<String> {
        table
            .columns
            .iter()
            .filter(|c| !c.data_type.is_large())
            .find(|c| {
                let lower = c.name.to_lowercase();
                KEY_NAME_HINTS.iter().any(|hint| lower.contains(hint))
            })
            .map(|c| c.name.clone())
    }

    /// Leading non-large columns while the running width fits.
    fn composite_candidates(&self, table: &TableDescriptor) -> Vec<String> {
        let mut total: u32 = 0;
        let mut cols = Vec::new();
        for col in table.columns.iter().filter(|c| !c.data_type.is_large()) {
            let width = estimate_key_bytes(&col.data_type);
            if total.saturating_add(width) > self.max_key_bytes {
                break;
            }
            total += width;
            cols.push(col.name.clone());
        }
        cols
    }
}
