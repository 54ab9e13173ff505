//! Configuration validation.

use super::{Config, ConnectionConfig};
use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if let Some(source) = &config.source {
        validate_connection("source", source)?;
    }
    validate_connection("target", &config.target)?;

    if let Some(source) = &config.source {
        let same = source.r#type == config.target.r#type
            && source.host == config.target.host
            && source.port == config.target.port
            && source.database == config.target.database;
        if same {
            return Err(SchemaError::Config(
                "source and target cannot be the same database".into(),
            ));
        }
    }

    if let Some(name) = &config.options.naming_dialect {
        name.parse::<Dialect>()
            .map_err(|_| SchemaError::Config(format!("options.naming_dialect '{}' is not a known dialect", name)))?;
    }
    Ok(())
}

fn validate_connection(role: &str, conn: &ConnectionConfig) -> Result<()> {
    let dialect = conn
        .dialect()
        .map_err(|e| SchemaError::Config(format!("{}.type: {}", role, e)))?;

    if conn.database.is_empty() {
        return Err(SchemaError::Config(format!("{}.database is required", role)));
    }
    if dialect == Dialect::Sqlite {
        return Ok(());
    }
    if conn.host.is_empty() {
        return Err(SchemaError::Config(format!("{}.host is required", role)));
    }
    if conn.user.is_empty() {
        return Err(SchemaError::Config(format!("{}.user is required", role)));
    }
    if conn.port == Some(0) {
        return Err(SchemaError::Config(format!("{}.port must be non-zero", role)));
    }
    Ok(())
}
