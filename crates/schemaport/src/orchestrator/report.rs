//! Run results.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::apply::ApplyReport;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::planner::Refinement;
use crate::verify::VerificationReport;

/// A table the reflection pass had to leave out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectionFailure {
    pub table: String,
    pub error: String,
}

/// Result of one import or migrate run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: String,

    /// `completed` or `failed`.
    pub status: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,

    pub source_dialect: Option<Dialect>,
    pub target_dialect: Dialect,

    /// Tables in the working set handed to the applier.
    pub tables_total: usize,
    pub tables_created: usize,
    pub tables_present: usize,
    pub tables_failed: usize,
    pub indexes_created: usize,
    pub indexes_failed: usize,

    /// Tables whose structure could not be created.
    pub failed_tables: Vec<String>,

    /// Tables omitted before planning because reflection failed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reflection_failures: Vec<ReflectionFailure>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub refinements: Vec<Refinement>,

    pub apply: ApplyReport,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationReport>,

    /// No structural failures. Index failures, reflection omissions and
    /// verification issues are reported but do not count.
    pub success: bool,
}

impl RunReport {
    pub(crate) fn build(
        run_id: String,
        started_at: DateTime<Utc>,
        source_dialect: Option<Dialect>,
        target_dialect: Dialect,
        tables_total: usize,
        apply: ApplyReport,
        verification: Option<VerificationReport>,
    ) -> Self {
        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let success = apply.success();
        Self {
            run_id,
            status: if success { "completed" } else { "failed" }.to_string(),
            started_at,
            completed_at,
            duration_seconds,
            source_dialect,
            target_dialect,
            tables_total,
            tables_created: apply.created.len(),
            tables_present: apply.already_present.len(),
            tables_failed: apply.structural_failures.len(),
            indexes_created: apply.indexes_created,
            indexes_failed: apply.index_failures.len(),
            failed_tables: apply
                .structural_failures
                .iter()
                .map(|f| f.table.clone())
                .collect(),
            reflection_failures: Vec::new(),
            refinements: Vec::new(),
            apply,
            verification,
            success,
        }
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
