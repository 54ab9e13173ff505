//! Bulk session bracketing for the target connection.
//!
//! Entering disables integrity checking and applies session tuning; leaving
//! undoes both in reverse. Every statement is attempted on its own and a
//! rejected one only produces a warning.

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::traits::TargetExecutor;

/// A session statement the target refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementWarning {
    pub statement: String,
    pub error: String,
}

async fn run_all<E>(target: &mut E, statements: &[&str], warnings: &mut Vec<StatementWarning>)
where
    E: TargetExecutor + ?Sized,
{
    for sql in statements {
        match target.execute(sql).await {
            Ok(()) => debug!("session: {}", sql),
            Err(e) => {
                warn!("Session statement rejected, continuing: {}: {}", sql, e);
                warnings.push(StatementWarning {
                    statement: sql.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
}

/// Integrity off, then tuning.
pub async fn enter<E>(target: &mut E, warnings: &mut Vec<StatementWarning>)
where
    E: TargetExecutor + ?Sized,
{
    let profile = target.dialect().profile();
    run_all(target, profile.integrity_off, warnings).await;
    run_all(target, profile.tuning_set, warnings).await;
}

/// Tuning reset, then integrity back on.
pub async fn leave<E>(target: &mut E, warnings: &mut Vec<StatementWarning>)
where
    E: TargetExecutor + ?Sized,
{
    let profile = target.dialect().profile();
    run_all(target, profile.tuning_reset, warnings).await;
    run_all(target, profile.integrity_on, warnings).await;
}
