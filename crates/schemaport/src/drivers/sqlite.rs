//! SQLite driver over a single sqlx connection.
//!
//! Metadata comes from the `pragma_*` table-valued functions so table names
//! can be bound as parameters.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Row};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::core::schema::{ForeignKeyRef, IndexDescriptor, ReflectedColumn};
use crate::core::traits::{SchemaReader, TargetExecutor};
use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};

use super::common::filter_prefixed;

pub struct SqliteSession {
    conn: SqliteConnection,
}

impl SqliteSession {
    /// Open (or create) the database file named by `database`.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database)
            .map_err(|e| SchemaError::Config(format!("invalid sqlite database '{}': {}", config.database, e)))?
            .create_if_missing(true)
            .foreign_keys(true);
        let conn = options
            .connect()
            .await
            .map_err(|e| SchemaError::connection(e.to_string(), format!("opening {}", config.describe())))?;
        info!("Opened {}", config.describe());
        Ok(Self { conn })
    }

    /// The declared `CREATE TABLE` text, if any.
    async fn table_sql(&mut self, table: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .bind(table)
            .fetch_optional(&mut self.conn)
            .await?;
        Ok(match row {
            Some(r) => r.try_get::<Option<String>, _>(0)?,
            None => None,
        })
    }
}

#[async_trait]
impl SchemaReader for SqliteSession {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn list_tables(&mut self, prefix: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'",
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
        let row = sqlx::query("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .bind(table)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(row.try_get::<i64, _>(0)? > 0)
    }

    async fn get_columns(&mut self, table: &str) -> Result<Vec<ReflectedColumn>> {
        let rows = sqlx::query(
            r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid"#,
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await?;

        let pk_count = rows
            .iter()
            .map(|r| r.try_get::<i64, _>(4))
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|pk| *pk > 0)
            .count();
        let declares_autoincrement = self
            .table_sql(table)
            .await?
            .is_some_and(|sql| sql.to_uppercase().contains("AUTOINCREMENT"));

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let native_type: String = row.try_get(1)?;
            let not_null: i64 = row.try_get(2)?;
            let pk: i64 = row.try_get(4)?;
            let rowid_alias = pk > 0 && pk_count == 1 && native_type.eq_ignore_ascii_case("INTEGER");
            columns.push(ReflectedColumn {
                name: row.try_get(0)?,
                native_type,
                nullable: not_null == 0 && pk == 0,
                default: row.try_get(3)?,
                primary_key: pk > 0,
                autoincrement: rowid_alias && declares_autoincrement,
            });
        }
        debug!("{}: {} columns", table, columns.len());
        Ok(columns)
    }

    async fn get_primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk")
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
            r#"SELECT id, "table", "from", "to" FROM pragma_foreign_key_list(?1) ORDER BY id, seq"#,
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await?;

        let mut fks = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row.try_get(0)?;
            let ref_table: String = row.try_get(1)?;
            let column: String = row.try_get(2)?;
            // `to` is NULL when the reference targets the parent's primary key.
            let ref_column = match row.try_get::<Option<String>, _>(3)? {
                Some(c) => c,
                None => self
                    .get_primary_key(&ref_table)
                    .await?
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| "rowid".into()),
            };
            fks.push(
                ForeignKeyRef::new(column, ref_table, ref_column)
                    .named(format!("fk_{}_{}", table, id)),
            );
        }
        Ok(fks)
    }

    async fn get_indexes(&mut self, table: &str) -> Result<Vec<IndexDescriptor>> {
        let rows = sqlx::query(
            r#"
            SELECT il.name, il."unique", ii.name
            FROM pragma_index_list(?1) AS il
            JOIN pragma_index_info(il.name) AS ii
            WHERE il.origin <> 'pk'
            ORDER BY il.name, ii.seqno
            "#,
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await?;

        let mut indexes: Vec<IndexDescriptor> = Vec::new();
        for row in &rows {
            let name: String = row.try_get(0)?;
            let unique: i64 = row.try_get(1)?;
            let Some(column) = row.try_get::<Option<String>, _>(2)? else {
                continue;
            };
            match indexes.last_mut() {
                Some(idx) if idx.name == name => idx.columns.push(column),
                _ => indexes.push(IndexDescriptor::new(name, vec![column], unique != 0)),
            }
        }
        Ok(indexes)
    }
}

#[async_trait]
impl TargetExecutor for SqliteSession {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        debug!("sqlite: {}", sql);
        sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(sql))
            .await
            .map_err(|e| SchemaError::execution(sql, e.to_string()))?;
        Ok(())
    }
}
