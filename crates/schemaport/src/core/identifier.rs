//! Identifier validation and quoting.
//!
//! Identifiers cannot be bound as statement parameters, so every table,
//! column and index name that reaches generated DDL passes through here.

use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};

/// Maximum identifier length (conservative limit across databases).
/// - PostgreSQL: 63 bytes
/// - SQL Server: 128 characters
/// - Oracle: 128 bytes (12.2+)
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier before it is embedded in SQL.
///
/// Rejects empty names, names containing null bytes and names longer than
/// any supported engine accepts.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SchemaError::InvalidIdentifier(
            "identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(SchemaError::InvalidIdentifier(format!(
            "identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(SchemaError::InvalidIdentifier(format!(
            "identifier exceeds {} bytes (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote with double quotes (PostgreSQL, Oracle, SQLite, ANSI).
pub fn quote_ansi(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a MySQL identifier using backticks.
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Quote a SQL Server identifier using brackets.
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Quote an identifier for the given dialect.
pub fn quote_ident(dialect: Dialect, name: &str) -> Result<String> {
    match dialect {
        Dialect::Mysql => quote_mysql(name),
        Dialect::Mssql => quote_mssql(name),
        Dialect::Postgres | Dialect::Oracle | Dialect::Sqlite | Dialect::Generic => {
            quote_ansi(name)
        }
    }
}

/// Quote and comma-join a column list.
pub fn quote_list(dialect: Dialect, names: &[String]) -> Result<String> {
    let quoted = names
        .iter()
        .map(|n| quote_ident(dialect, n))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

/// Escape a string literal (single quotes doubled).
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
