//! Error types for the schemaport library.

use thiserror::Error;

/// Main error type for schema translation and application.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Configuration error (invalid YAML, missing fields, unknown dialect, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A session could not be opened or was lost.
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// Metadata for a table could not be read.
    #[error("Introspection failed for table {table}: {message}")]
    Introspection { table: String, message: String },

    /// The schema as a whole could not be listed.
    #[error("Schema listing failed: {0}")]
    SchemaListing(String),

    /// A DDL or session statement was rejected by the engine.
    #[error("Statement failed: {message}\n  Statement: {statement}")]
    Execution { statement: String, message: String },

    /// Dialect name is not one of the supported families.
    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// Identifier rejected before it was quoted into SQL.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// PostgreSQL driver error
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// MySQL / SQLite driver error
    #[cfg(any(feature = "mysql", feature = "sqlite"))]
    #[error("SQL driver error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// SQL Server driver error
    #[cfg(feature = "mssql")]
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    /// Create a Connection error with context about where it occurred
    pub fn connection(message: impl Into<String>, context: impl Into<String>) -> Self {
        SchemaError::Connection {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create an Introspection error for a single table
    pub fn introspection(table: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::Introspection {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create an Execution error carrying the rejected statement
    pub fn execution(statement: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::Execution {
            statement: statement.into(),
            message: message.into(),
        }
    }

    /// Connection-level failures abort the whole run; everything else is
    /// scoped to the item that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchemaError::Config(_)
                | SchemaError::Connection { .. }
                | SchemaError::SchemaListing(_)
                | SchemaError::UnsupportedDialect(_)
        )
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            SchemaError::Config(_) | SchemaError::UnsupportedDialect(_) | SchemaError::Yaml(_) => 2,
            SchemaError::Connection { .. } | SchemaError::SchemaListing(_) => 3,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for schemaport operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SchemaError::connection("refused", "target").is_fatal());
        assert!(SchemaError::SchemaListing("denied".into()).is_fatal());
        assert!(!SchemaError::introspection("t_users", "gone").is_fatal());
        assert!(!SchemaError::execution("CREATE INDEX", "duplicate").is_fatal());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(SchemaError::Config("x".into()).exit_code(), 2);
        assert_eq!(SchemaError::connection("x", "y").exit_code(), 3);
        assert_eq!(SchemaError::execution("x", "y").exit_code(), 1);
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "catalog.json");
        let err = SchemaError::from(io);
        let text = err.format_detailed();
        assert!(text.starts_with("Error: IO error: catalog.json"));
    }
}
