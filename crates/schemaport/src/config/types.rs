//! Configuration type definitions.

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::Result;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database to reflect. Not needed when importing a saved catalog.
    #[serde(default)]
    pub source: Option<ConnectionConfig>,

    /// Database to apply the schema to.
    pub target: ConnectionConfig,

    /// Import behaviour.
    #[serde(default)]
    pub options: ImportOptions,
}

/// Connection parameters for one database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Engine name or alias (`postgres`, `pg`, `mysql`, `mariadb`, `mssql`,
    /// `sqlserver`, `sqlite`, `oracle`, `generic`).
    pub r#type: String,

    /// Database host. Unused for sqlite.
    #[serde(default)]
    pub host: String,

    /// Port (default: the engine's standard port).
    #[serde(default)]
    pub port: Option<u16>,

    /// Database name, or the file path for sqlite.
    pub database: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Schema to work in (default: `public` on postgres, `dbo` on mssql).
    #[serde(default)]
    pub schema: Option<String>,

    /// PostgreSQL SSL mode: disable, require, verify-ca, verify-full.
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,

    /// Encrypt the SQL Server connection (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Accept any SQL Server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,
}

impl ConnectionConfig {
    /// Parsed engine family.
    pub fn dialect(&self) -> Result<Dialect> {
        self.r#type.parse()
    }

    /// Configured port, or the engine default.
    pub fn port_or_default(&self) -> Result<u16> {
        Ok(match self.port {
            Some(p) => p,
            None => self.dialect()?.profile().default_port,
        })
    }

    /// Configured schema, or the engine default.
    pub fn schema_or_default(&self) -> String {
        if let Some(s) = self.schema.as_deref().filter(|s| !s.is_empty()) {
            return s.to_string();
        }
        match self.dialect() {
            Ok(Dialect::Mssql) => "dbo".into(),
            Ok(Dialect::Postgres) => "public".into(),
            _ => String::new(),
        }
    }

    /// `host:port/database` for log lines. Never includes credentials.
    pub fn describe(&self) -> String {
        match self.dialect() {
            Ok(Dialect::Sqlite) => format!("sqlite:{}", self.database),
            _ => match self.port_or_default() {
                Ok(port) => format!("{}://{}:{}/{}", self.r#type, self.host, port, self.database),
                Err(_) => format!("{}://{}/{}", self.r#type, self.host, self.database),
            },
        }
    }
}

/// Import behaviour shared by all subcommands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Working-set filter: only tables whose names start with this.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Drop existing tables before creating them (default: false).
    #[serde(default)]
    pub drop_existing: bool,

    /// Create secondary indexes after the tables (default: true).
    #[serde(default = "default_true")]
    pub create_indexes: bool,

    /// Re-introspect the target after applying (default: true).
    #[serde(default = "default_true")]
    pub verify: bool,

    /// Dialect whose default string length is used when neither the type
    /// nor the column name gives one (default: the target's).
    #[serde(default)]
    pub naming_dialect: Option<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            drop_existing: false,
            create_indexes: true,
            verify: true,
            naming_dialect: None,
        }
    }
}

impl ImportOptions {
    /// Dialect driving the fallback string length.
    pub fn naming_dialect_or(&self, target: Dialect) -> Result<Dialect> {
        match self.naming_dialect.as_deref() {
            Some(name) => name.parse(),
            None => Ok(target),
        }
    }
}

fn default_prefix() -> String {
    "t_".to_string()
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_true() -> bool {
    true
}
