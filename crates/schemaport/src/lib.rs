//! # schemaport
//!
//! Cross-dialect relational schema translation and staged DDL application.
//!
//! A schema reflected from one engine is translated into a small generic
//! type vocabulary, ordered by foreign key, refined (primary keys, indexes)
//! for the target, and applied in stages:
//!
//! - **Type translation** from native spellings, with name-based length
//!   inference when a type carries none
//! - **Dependency ordering** that tolerates self references and cycles
//! - **Staged application**: bare tables first, then indexes, bracketed by
//!   per-dialect integrity and session toggles that are always undone
//! - **Verification** by re-introspecting the target
//!
//! Supported engines: PostgreSQL, MySQL/MariaDB, SQLite and SQL Server.
//! Oracle DDL can be rendered through the in-memory target.
//!
//! ## Example
//!
//! ```rust,no_run
//! use schemaport::{drivers, Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> schemaport::Result<()> {
//!     let config = Config::load("schemaport.yaml")?;
//!     let Some(source_config) = &config.source else {
//!         return Ok(());
//!     };
//!     let mut source = drivers::connect(source_config).await?;
//!     let mut target = drivers::connect(&config.target).await?;
//!
//!     let report = Orchestrator::new(config.options.clone())
//!         .migrate(&mut *source, &mut *target)
//!         .await?;
//!     println!("{} tables created", report.tables_created);
//!     Ok(())
//! }
//! ```

pub mod apply;
pub mod config;
pub mod core;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod planner;
pub mod verify;

// Re-exports for convenient access
pub use apply::{ApplyOptions, ApplyReport, DdlApplier};
pub use config::{Config, ConnectionConfig, ImportOptions};
pub use crate::core::{
    Catalog, ColumnDescriptor, DefaultValue, ForeignKeyRef, GenericType, IndexDescriptor,
    SchemaReader, TableDescriptor, TargetExecutor,
};
pub use dialect::{Dialect, TypeTranslator};
pub use drivers::MemoryTarget;
pub use error::{Result, SchemaError};
pub use graph::DependencyGraph;
pub use orchestrator::{Export, Orchestrator, RunReport};
pub use planner::{KeyChoice, PrimaryKeySelector, SchemaPlanner};
pub use verify::{SchemaVerifier, TableDifferences, VerificationReport};
