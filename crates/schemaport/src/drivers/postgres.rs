//! PostgreSQL driver.
//!
//! One `tokio_postgres::Client` per session; the connection future runs on
//! its own task. Metadata comes from `pg_catalog` so native types keep their
//! modifiers (`format_type` renders `character varying(50)`, `numeric(10,2)`).

use async_trait::async_trait;
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::core::identifier::quote_ansi;
use crate::core::schema::{ForeignKeyRef, IndexDescriptor, ReflectedColumn};
use crate::core::traits::{SchemaReader, TargetExecutor};
use crate::dialect::{ddl, Dialect};
use crate::error::{Result, SchemaError};

use super::common::{connector, filter_prefixed};

/// A single PostgreSQL session bound to one schema.
pub struct PostgresSession {
    client: Client,
    schema: String,
}

impl PostgresSession {
    /// Open a session and pin `search_path` to the configured schema.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut pg = PgConfig::new();
        pg.host(&config.host);
        pg.port(config.port_or_default()?);
        pg.dbname(&config.database);
        pg.user(&config.user);
        pg.password(&config.password);
        pg.application_name("schemaport");

        let context = format!("connecting to {}", config.describe());
        let client = match connector(&config.ssl_mode)? {
            Some(tls) => {
                let (client, connection) = pg
                    .connect(tls)
                    .await
                    .map_err(|e| SchemaError::connection(e.to_string(), &context))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        warn!("PostgreSQL connection closed: {}", e);
                    }
                });
                client
            }
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let (client, connection) = pg
                    .connect(NoTls)
                    .await
                    .map_err(|e| SchemaError::connection(e.to_string(), &context))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        warn!("PostgreSQL connection closed: {}", e);
                    }
                });
                client
            }
        };

        let schema = config.schema_or_default();
        client
            .batch_execute(&format!("SET search_path TO {}", quote_ansi(&schema)?))
            .await
            .map_err(|e| SchemaError::connection(e.to_string(), "setting search_path"))?;

        info!("Connected to {} (schema {})", config.describe(), schema);
        Ok(Self { client, schema })
    }
}

#[async_trait]
impl SchemaReader for PostgresSession {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn list_tables(&mut self, prefix: &str) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT table_name::text FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_type = 'BASE TABLE'",
                &[&self.schema],
            )
            .await
            .map_err(|e| SchemaError::SchemaListing(e.to_string()))?;
        Ok(filter_prefixed(rows.iter().map(|r| r.get::<_, String>(0)), prefix))
    }

    async fn has_table(&mut self, table: &str) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_name = $2)",
                &[&self.schema, &table],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn get_columns(&mut self, table: &str) -> Result<Vec<ReflectedColumn>> {
        let query = r#"
            SELECT
                a.attname::text,
                format_type(a.atttypid, a.atttypmod),
                NOT a.attnotnull,
                pg_get_expr(d.adbin, d.adrelid),
                a.attidentity <> '' OR COALESCE(pg_get_expr(d.adbin, d.adrelid), '') LIKE 'nextval(%'
            FROM pg_catalog.pg_attribute a
            JOIN pg_catalog.pg_class t ON t.oid = a.attrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
            WHERE n.nspname = $1
              AND t.relname = $2
              AND a.attnum > 0
              AND NOT a.attisdropped
            ORDER BY a.attnum
        "#;
        let rows = self.client.query(query, &[&self.schema, &table]).await?;

        let columns = rows
            .iter()
            .map(|row| {
                let autoincrement: bool = row.get(4);
                ReflectedColumn {
                    name: row.get(0),
                    native_type: row.get(1),
                    nullable: row.get(2),
                    // Sequence defaults describe the identity, not a literal.
                    default: if autoincrement { None } else { row.get(3) },
                    primary_key: false,
                    autoincrement,
                }
            })
            .collect::<Vec<_>>();
        debug!("{}: {} columns", table, columns.len());
        Ok(columns)
    }

    async fn get_primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        let query = r#"
            SELECT a.attname::text
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'p'
              AND a.attnum = ANY(c.conkey)
            ORDER BY array_position(c.conkey, a.attnum)
        "#;
        let rows = self.client.query(query, &[&self.schema, &table]).await?;
        Ok(rows.iter().map(|r| r.get(0)).collect())
    }

    async fn get_foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyRef>> {
        // One row per column pair, kept in key order.
        let query = r#"
            SELECT c.conname::text, a.attname::text, rt.relname::text, ra.attname::text
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_class rt ON rt.oid = c.confrelid
            CROSS JOIN LATERAL unnest(c.conkey, c.confkey) WITH ORDINALITY AS k(attnum, refnum, pos)
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
            JOIN pg_catalog.pg_attribute ra ON ra.attrelid = rt.oid AND ra.attnum = k.refnum
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'f'
            ORDER BY c.conname, k.pos
        "#;
        let rows = self.client.query(query, &[&self.schema, &table]).await?;
        Ok(rows
            .iter()
            .map(|r| {
                ForeignKeyRef::new(r.get::<_, String>(1), r.get::<_, String>(2), r.get::<_, String>(3))
                    .named(r.get::<_, String>(0))
            })
            .collect())
    }

    async fn get_indexes(&mut self, table: &str) -> Result<Vec<IndexDescriptor>> {
        let query = r#"
            SELECT
                i.relname::text,
                ix.indisunique,
                array_agg(a.attname::text ORDER BY array_position(ix.indkey::int2[], a.attnum))
            FROM pg_catalog.pg_index ix
            JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
            JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            WHERE n.nspname = $1
              AND t.relname = $2
              AND NOT ix.indisprimary
            GROUP BY i.relname, ix.indisunique
            ORDER BY i.relname
        "#;
        let rows = self.client.query(query, &[&self.schema, &table]).await?;
        Ok(rows
            .iter()
            .map(|r| IndexDescriptor::new(r.get::<_, String>(0), r.get(2), r.get(1)))
            .collect())
    }
}

#[async_trait]
impl TargetExecutor for PostgresSession {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        debug!("postgres: {}", sql);
        self.client
            .batch_execute(sql)
            .await
            .map_err(|e| SchemaError::execution(sql, e.to_string()))
    }

    async fn drop_index(&mut self, table: &str, index: &str) -> Result<()> {
        let sql = ddl::drop_index_sql_in(Dialect::Postgres, Some(&self.schema), table, index)?;
        self.execute(&sql).await
    }
}
