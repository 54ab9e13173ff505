//! MySQL / MariaDB driver over a single sqlx connection.
//!
//! Session toggles (`FOREIGN_KEY_CHECKS`, `AUTOCOMMIT`) are per connection,
//! so this holds one `MySqlConnection` rather than a pool.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Row};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::core::identifier::quote_literal;
use crate::core::schema::{ForeignKeyRef, IndexDescriptor, ReflectedColumn};
use crate::core::traits::{SchemaReader, TargetExecutor};
use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};

use super::common::filter_prefixed;

/// Data types whose `COLUMN_DEFAULT` MySQL reports without quotes.
const STRING_DATA_TYPES: [&str; 8] = [
    "char", "varchar", "tinytext", "text", "mediumtext", "longtext", "enum", "set",
];

pub struct MysqlSession {
    conn: MySqlConnection,
}

impl MysqlSession {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port_or_default()?)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .charset("utf8mb4");

        let conn = options
            .connect()
            .await
            .map_err(|e| SchemaError::connection(e.to_string(), format!("connecting to {}", config.describe())))?;

        info!("Connected to {}", config.describe());
        Ok(Self { conn })
    }
}

/// MySQL reports string defaults bare (`new`), MariaDB quoted (`'new'`).
/// Quote bare string literals so both parse the same way.
fn normalize_default(data_type: &str, extra: &str, raw: Option<String>) -> Option<String> {
    let raw = raw?;
    if raw.eq_ignore_ascii_case("NULL") {
        return None;
    }
    let is_string = STRING_DATA_TYPES.contains(&data_type.to_lowercase().as_str());
    let generated = extra.to_uppercase().contains("DEFAULT_GENERATED");
    if is_string && !generated && !raw.starts_with('\'') {
        return Some(quote_literal(&raw));
    }
    Some(raw)
}

#[async_trait]
impl SchemaReader for MysqlSession {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    async fn list_tables(&mut self, prefix: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT CAST(TABLE_NAME AS CHAR) FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'",
        )
        .fetch_all(&mut self.conn)
        .await
        .map_err(|e| SchemaError::SchemaListing(e.to_string()))?;

        let names = rows
            .iter()
            .map(|r| r.try_get::<String, _>(0))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(filter_prefixed(names, prefix))
    }

    async fn has_table(&mut self, table: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
        )
        .bind(table)
        .fetch_one(&mut self.conn)
        .await?;
        Ok(row.try_get::<i64, _>(0)? > 0)
    }

    async fn get_columns(&mut self, table: &str) -> Result<Vec<ReflectedColumn>> {
        let rows = sqlx::query(
            r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR),
                CAST(COLUMN_TYPE AS CHAR),
                CAST(DATA_TYPE AS CHAR),
                CAST(IS_NULLABLE AS CHAR),
                CAST(COLUMN_DEFAULT AS CHAR),
                CAST(EXTRA AS CHAR)
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
            "#,
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let data_type: String = row.try_get(2)?;
            let nullable: String = row.try_get(3)?;
            let extra: String = row.try_get::<Option<String>, _>(5)?.unwrap_or_default();
            columns.push(ReflectedColumn {
                name: row.try_get(0)?,
                native_type: row.try_get(1)?,
                nullable: nullable.eq_ignore_ascii_case("YES"),
                default: normalize_default(&data_type, &extra, row.try_get(4)?),
                primary_key: false,
                autoincrement: extra.to_lowercase().contains("auto_increment"),
            });
        }
        debug!("{}: {} columns", table, columns.len());
        Ok(columns)
    }

    async fn get_primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT CAST(COLUMN_NAME AS CHAR) FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY' \
             ORDER BY ORDINAL_POSITION",
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await?;
        Ok(rows
            .iter()
            .map(|r| r.try_get::<String, _>(0))
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn get_foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyRef>> {
        let rows = sqlx::query(
            r#"
            SELECT
                CAST(CONSTRAINT_NAME AS CHAR),
                CAST(COLUMN_NAME AS CHAR),
                CAST(REFERENCED_TABLE_NAME AS CHAR),
                CAST(REFERENCED_COLUMN_NAME AS CHAR)
            FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = DATABASE()
              AND TABLE_NAME = ?
              AND REFERENCED_TABLE_NAME IS NOT NULL
            ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION
            "#,
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await?;

        let mut fks = Vec::with_capacity(rows.len());
        for row in &rows {
            let constraint: String = row.try_get(0)?;
            let column: String = row.try_get(1)?;
            let ref_table: String = row.try_get(2)?;
            let ref_column: String = row.try_get(3)?;
            fks.push(ForeignKeyRef::new(column, ref_table, ref_column).named(constraint));
        }
        Ok(fks)
    }

    async fn get_indexes(&mut self, table: &str) -> Result<Vec<IndexDescriptor>> {
        let rows = sqlx::query(
            r#"
            SELECT
                CAST(INDEX_NAME AS CHAR),
                CAST(NON_UNIQUE AS SIGNED),
                CAST(COLUMN_NAME AS CHAR)
            FROM INFORMATION_SCHEMA.STATISTICS
            WHERE TABLE_SCHEMA = DATABASE()
              AND TABLE_NAME = ?
              AND INDEX_NAME <> 'PRIMARY'
            ORDER BY INDEX_NAME, SEQ_IN_INDEX
            "#,
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await?;

        let mut indexes: Vec<IndexDescriptor> = Vec::new();
        for row in &rows {
            let name: String = row.try_get(0)?;
            let non_unique: i64 = row.try_get(1)?;
            // Functional key parts have no column name.
            let Some(column) = row.try_get::<Option<String>, _>(2)? else {
                continue;
            };
            match indexes.last_mut() {
                Some(idx) if idx.name == name => idx.columns.push(column),
                _ => indexes.push(IndexDescriptor::new(name, vec![column], non_unique == 0)),
            }
        }
        Ok(indexes)
    }
}

#[async_trait]
impl TargetExecutor for MysqlSession {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        debug!("mysql: {}", sql);
        sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(sql))
            .await
            .map_err(|e| SchemaError::execution(sql, e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::DefaultValue;

    #[test]
    fn test_bare_string_default_is_quoted() {
        let d = normalize_default("varchar", "", Some("new".into()));
        assert_eq!(d.as_deref(), Some("'new'"));
        assert_eq!(
            DefaultValue::parse_literal(d.as_deref().unwrap()),
            Some(DefaultValue::Text("new".into()))
        );
    }

    #[test]
    fn test_mariadb_and_expression_defaults_untouched() {
        assert_eq!(
            normalize_default("varchar", "", Some("'new'".into())).as_deref(),
            Some("'new'")
        );
        assert_eq!(
            normalize_default("datetime", "DEFAULT_GENERATED", Some("CURRENT_TIMESTAMP".into()))
                .as_deref(),
            Some("CURRENT_TIMESTAMP")
        );
        assert_eq!(normalize_default("int", "", Some("0".into())).as_deref(), Some("0"));
        assert_eq!(normalize_default("varchar", "", Some("NULL".into())), None);
        assert_eq!(normalize_default("varchar", "", None), None);
    }
}
