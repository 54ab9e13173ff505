//! Database driver implementations.
//!
//! Each driver owns exactly one session and implements
//! [`SchemaReader`](crate::core::traits::SchemaReader) plus
//! [`TargetExecutor`]:
//!
//! - [`postgres`]: tokio-postgres with rustls
//! - [`mysql`]: sqlx (MySQL and MariaDB)
//! - [`sqlite`]: sqlx
//! - [`mssql`]: Tiberius
//! - [`memory`]: in-memory target for dry runs
//!
//! Oracle DDL can be rendered but there is no Oracle driver.
//!
//! # Adding New Databases
//!
//! 1. Add a module under `drivers/` implementing both traits
//! 2. Add a profile row for the dialect in `dialect/mod.rs`
//! 3. Add a branch to [`connect`]
//! 4. Gate the driver with a feature flag in `Cargo.toml`

pub mod common;
pub mod memory;

#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryTarget;

use crate::config::ConnectionConfig;
use crate::core::traits::TargetExecutor;
use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};

/// Open one session for the configured engine.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn TargetExecutor>> {
    let dialect = config.dialect()?;
    match dialect {
        #[cfg(feature = "postgres")]
        Dialect::Postgres => Ok(Box::new(postgres::PostgresSession::connect(config).await?)),
        #[cfg(feature = "mysql")]
        Dialect::Mysql => Ok(Box::new(mysql::MysqlSession::connect(config).await?)),
        #[cfg(feature = "sqlite")]
        Dialect::Sqlite => Ok(Box::new(sqlite::SqliteSession::connect(config).await?)),
        #[cfg(feature = "mssql")]
        Dialect::Mssql => Ok(Box::new(mssql::MssqlSession::connect(config).await?)),
        Dialect::Oracle | Dialect::Generic => Err(SchemaError::Config(format!(
            "no {} driver is available; use --dry-run to render its DDL",
            dialect
        ))),
        #[allow(unreachable_patterns)]
        other => Err(SchemaError::Config(format!(
            "schemaport was built without the {} driver",
            other
        ))),
    }
}
