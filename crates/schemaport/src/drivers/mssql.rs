//! SQL Server driver over a single Tiberius client.
//!
//! Statements go through `simple_query` so session `SET`s stay in effect
//! for the rest of the connection; metadata queries use `@P` parameters.

use async_trait::async_trait;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::core::identifier::quote_mssql;
use crate::core::schema::{ForeignKeyRef, IndexDescriptor, ReflectedColumn};
use crate::core::traits::{SchemaReader, TargetExecutor};
use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};

use super::common::filter_prefixed;

/// Maximum TDS packet size (32767 bytes, ~32KB).
const TDS_MAX_PACKET_SIZE: u32 = 32767;

pub struct MssqlSession {
    client: Client<Compat<TcpStream>>,
    schema: String,
}

impl MssqlSession {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut tds = Config::new();
        tds.host(&config.host);
        tds.port(config.port_or_default()?);
        tds.database(&config.database);
        tds.authentication(AuthMethod::sql_server(&config.user, &config.password));
        if config.encrypt {
            if config.trust_server_cert {
                tds.trust_cert();
            }
            tds.encryption(EncryptionLevel::Required);
        } else {
            tds.encryption(EncryptionLevel::NotSupported);
        }
        tds.packet_size(TDS_MAX_PACKET_SIZE);

        let context = format!("connecting to {}", config.describe());
        let tcp = TcpStream::connect(tds.get_addr())
            .await
            .map_err(|e| SchemaError::connection(e.to_string(), &context))?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(tds, tcp.compat_write())
            .await
            .map_err(|e| SchemaError::connection(e.to_string(), &context))?;

        let schema = config.schema_or_default();
        info!("Connected to {} (schema {})", config.describe(), schema);
        Ok(Self { client, schema })
    }

    /// `[schema].[table]` for `OBJECT_ID`.
    fn object_name(&self, table: &str) -> Result<String> {
        Ok(format!("{}.{}", quote_mssql(&self.schema)?, quote_mssql(table)?))
    }

    async fn fetch(&mut self, sql: &str, params: &[&dyn tiberius::ToSql]) -> Result<Vec<Row>> {
        let stream = self.client.query(sql, params).await?;
        Ok(stream.into_first_result().await?)
    }
}

fn text(row: &Row, idx: usize) -> Result<String> {
    Ok(row.try_get::<&str, _>(idx)?.unwrap_or_default().to_string())
}

fn int(row: &Row, idx: usize) -> Result<i32> {
    Ok(row.try_get::<i32, _>(idx)?.unwrap_or(0))
}

/// Native spelling with length or precision, e.g. `nvarchar(50)`,
/// `varchar(max)`, `decimal(18,2)`.
fn native_type(data_type: &str, max_length: i32, precision: i32, scale: i32) -> String {
    let lower = data_type.to_lowercase();
    match lower.as_str() {
        "char" | "nchar" | "varchar" | "nvarchar" | "binary" | "varbinary" => {
            if max_length == -1 {
                format!("{}(max)", lower)
            } else if max_length > 0 {
                format!("{}({})", lower, max_length)
            } else {
                lower
            }
        }
        "decimal" | "numeric" => format!("{}({},{})", lower, precision, scale),
        _ => lower,
    }
}

#[async_trait]
impl SchemaReader for MssqlSession {
    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    async fn list_tables(&mut self, prefix: &str) -> Result<Vec<String>> {
        let schema = self.schema.clone();
        let rows = self
            .fetch(
                "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_SCHEMA = @P1 AND TABLE_TYPE = 'BASE TABLE'",
                &[&schema.as_str()],
            )
            .await
            .map_err(|e| SchemaError::SchemaListing(e.to_string()))?;
        let names = rows
            .iter()
            .map(|r| text(r, 0))
            .collect::<Result<Vec<_>>>()?;
        Ok(filter_prefixed(names, prefix))
    }

    async fn has_table(&mut self, table: &str) -> Result<bool> {
        let schema = self.schema.clone();
        let rows = self
            .fetch(
                "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2",
                &[&schema.as_str(), &table],
            )
            .await?;
        Ok(rows.first().map(|r| int(r, 0)).transpose()?.unwrap_or(0) > 0)
    }

    async fn get_columns(&mut self, table: &str) -> Result<Vec<ReflectedColumn>> {
        let schema = self.schema.clone();
        let object = self.object_name(table)?;
        let rows = self
            .fetch(
                r#"
                SELECT
                    c.COLUMN_NAME,
                    c.DATA_TYPE,
                    CAST(COALESCE(c.CHARACTER_MAXIMUM_LENGTH, 0) AS INT),
                    CAST(COALESCE(c.NUMERIC_PRECISION, 0) AS INT),
                    CAST(COALESCE(c.NUMERIC_SCALE, 0) AS INT),
                    CAST(CASE WHEN c.IS_NULLABLE = 'YES' THEN 1 ELSE 0 END AS INT),
                    c.COLUMN_DEFAULT,
                    CAST(COALESCE(COLUMNPROPERTY(OBJECT_ID(@P3), c.COLUMN_NAME, 'IsIdentity'), 0) AS INT)
                FROM INFORMATION_SCHEMA.COLUMNS c
                WHERE c.TABLE_SCHEMA = @P1 AND c.TABLE_NAME = @P2
                ORDER BY c.ORDINAL_POSITION
                "#,
                &[&schema.as_str(), &table, &object.as_str()],
            )
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let data_type = text(row, 1)?;
            columns.push(ReflectedColumn {
                name: text(row, 0)?,
                native_type: native_type(&data_type, int(row, 2)?, int(row, 3)?, int(row, 4)?),
                nullable: int(row, 5)? == 1,
                default: row.try_get::<&str, _>(6)?.map(str::to_string),
                primary_key: false,
                autoincrement: int(row, 7)? == 1,
            });
        }
        debug!("{}: {} columns", table, columns.len());
        Ok(columns)
    }

    async fn get_primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        let schema = self.schema.clone();
        let rows = self
            .fetch(
                r#"
                SELECT kcu.COLUMN_NAME
                FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
                JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
                  ON kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
                 AND kcu.TABLE_SCHEMA = tc.TABLE_SCHEMA
                 AND kcu.TABLE_NAME = tc.TABLE_NAME
                WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
                  AND tc.TABLE_SCHEMA = @P1
                  AND tc.TABLE_NAME = @P2
                ORDER BY kcu.ORDINAL_POSITION
                "#,
                &[&schema.as_str(), &table],
            )
            .await?;
        rows.iter().map(|r| text(r, 0)).collect()
    }

    async fn get_foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyRef>> {
        let object = self.object_name(table)?;
        let rows = self
            .fetch(
                r#"
                SELECT fk.name, pc.name, rt.name, rc.name
                FROM sys.foreign_keys fk
                JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id
                JOIN sys.columns pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
                JOIN sys.tables rt ON rt.object_id = fkc.referenced_object_id
                JOIN sys.columns rc ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
                WHERE fk.parent_object_id = OBJECT_ID(@P1)
                ORDER BY fk.name, fkc.constraint_column_id
                "#,
                &[&object.as_str()],
            )
            .await?;

        let mut fks = Vec::with_capacity(rows.len());
        for row in &rows {
            fks.push(
                ForeignKeyRef::new(text(row, 1)?, text(row, 2)?, text(row, 3)?).named(text(row, 0)?),
            );
        }
        Ok(fks)
    }

    async fn get_indexes(&mut self, table: &str) -> Result<Vec<IndexDescriptor>> {
        let object = self.object_name(table)?;
        let rows = self
            .fetch(
                r#"
                SELECT i.name, CAST(i.is_unique AS INT), c.name
                FROM sys.indexes i
                JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id
                JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
                WHERE i.object_id = OBJECT_ID(@P1)
                  AND i.is_primary_key = 0
                  AND i.type > 0
                  AND ic.is_included_column = 0
                ORDER BY i.name, ic.key_ordinal
                "#,
                &[&object.as_str()],
            )
            .await?;

        let mut indexes: Vec<IndexDescriptor> = Vec::new();
        for row in &rows {
            let name = text(row, 0)?;
            let column = text(row, 2)?;
            match indexes.last_mut() {
                Some(idx) if idx.name == name => idx.columns.push(column),
                _ => indexes.push(IndexDescriptor::new(name, vec![column], int(row, 1)? == 1)),
            }
        }
        Ok(indexes)
    }
}

#[async_trait]
impl TargetExecutor for MssqlSession {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        debug!("mssql: {}", sql);
        let stream = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| SchemaError::execution(sql, e.to_string()))?;
        stream
            .into_results()
            .await
            .map_err(|e| SchemaError::execution(sql, e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_type_spelling() {
        assert_eq!(native_type("nvarchar", 50, 0, 0), "nvarchar(50)");
        assert_eq!(native_type("VARCHAR", -1, 0, 0), "varchar(max)");
        assert_eq!(native_type("decimal", 0, 18, 2), "decimal(18,2)");
        assert_eq!(native_type("datetime2", 0, 0, 0), "datetime2");
        assert_eq!(native_type("int", 0, 10, 0), "int");
    }
}
