//! DDL rendering from generic descriptors.

use crate::core::identifier::{quote_ident, quote_list, quote_literal};
use crate::core::schema::{ColumnDescriptor, DefaultValue, GenericType, IndexDescriptor, TableDescriptor};
use crate::error::Result;

use super::{Dialect, DropIndexSyntax};

/// MySQL cannot index more than 3072 bytes per key part under utf8mb4.
const MYSQL_INDEX_PREFIX_CHARS: u32 = 768;

/// Native column type for a generic type on the given dialect.
pub fn native_type(dialect: Dialect, ty: &GenericType) -> String {
    match dialect {
        Dialect::Mysql => mysql_type(ty),
        Dialect::Oracle => oracle_type(ty),
        Dialect::Mssql => mssql_type(ty),
        Dialect::Postgres => postgres_type(ty),
        Dialect::Sqlite => sqlite_type(ty),
        Dialect::Generic => generic_type(ty),
    }
}

fn clamp_numeric(precision: u32, scale: u32, max_precision: u32, max_scale: u32) -> (u32, u32) {
    let p = precision.min(max_precision);
    let s = scale.min(max_scale).min(p);
    (p, s)
}

fn mysql_type(ty: &GenericType) -> String {
    match ty {
        GenericType::Integer => "INT".into(),
        GenericType::BigInteger => "BIGINT".into(),
        GenericType::SmallInteger => "SMALLINT".into(),
        GenericType::String(n) => format!("VARCHAR({})", n),
        GenericType::Text => "LONGTEXT".into(),
        GenericType::Boolean => "TINYINT(1)".into(),
        GenericType::Numeric { precision: 0, .. } => "DECIMAL(65,30)".into(),
        GenericType::Numeric { precision, scale } => {
            let (p, s) = clamp_numeric(*precision, *scale, 65, 30);
            format!("DECIMAL({},{})", p, s)
        }
        GenericType::Float => "DOUBLE".into(),
        GenericType::Date => "DATE".into(),
        GenericType::Time => "TIME".into(),
        GenericType::DateTime => "DATETIME(6)".into(),
        GenericType::Json | GenericType::Array(_) => "JSON".into(),
        GenericType::LargeBinary => "LONGBLOB".into(),
    }
}

fn oracle_type(ty: &GenericType) -> String {
    match ty {
        GenericType::Integer => "NUMBER(10)".into(),
        GenericType::BigInteger => "NUMBER(19)".into(),
        GenericType::SmallInteger => "NUMBER(5)".into(),
        GenericType::String(n) if *n <= 4000 => format!("VARCHAR2({} CHAR)", (*n).max(1)),
        GenericType::String(_) | GenericType::Text => "CLOB".into(),
        GenericType::Boolean => "NUMBER(1)".into(),
        GenericType::Numeric { precision: 0, .. } => "NUMBER".into(),
        GenericType::Numeric { precision, scale } => {
            let (p, s) = clamp_numeric(*precision, *scale, 38, 38);
            format!("NUMBER({},{})", p, s)
        }
        GenericType::Float => "BINARY_DOUBLE".into(),
        GenericType::Date => "DATE".into(),
        GenericType::Time | GenericType::DateTime => "TIMESTAMP".into(),
        GenericType::Json | GenericType::Array(_) => "CLOB".into(),
        GenericType::LargeBinary => "BLOB".into(),
    }
}

fn mssql_type(ty: &GenericType) -> String {
    match ty {
        GenericType::Integer => "INT".into(),
        GenericType::BigInteger => "BIGINT".into(),
        GenericType::SmallInteger => "SMALLINT".into(),
        GenericType::String(n) if *n <= 4000 => format!("NVARCHAR({})", (*n).max(1)),
        GenericType::String(_) | GenericType::Text => "NVARCHAR(MAX)".into(),
        GenericType::Boolean => "BIT".into(),
        GenericType::Numeric { precision: 0, .. } => "DECIMAL(38,10)".into(),
        GenericType::Numeric { precision, scale } => {
            let (p, s) = clamp_numeric(*precision, *scale, 38, 38);
            format!("DECIMAL({},{})", p, s)
        }
        GenericType::Float => "FLOAT".into(),
        GenericType::Date => "DATE".into(),
        GenericType::Time => "TIME".into(),
        GenericType::DateTime => "DATETIME2".into(),
        GenericType::Json | GenericType::Array(_) => "NVARCHAR(MAX)".into(),
        GenericType::LargeBinary => "VARBINARY(MAX)".into(),
    }
}

fn postgres_type(ty: &GenericType) -> String {
    match ty {
        GenericType::Integer => "INTEGER".into(),
        GenericType::BigInteger => "BIGINT".into(),
        GenericType::SmallInteger => "SMALLINT".into(),
        GenericType::String(n) => format!("VARCHAR({})", n),
        GenericType::Text => "TEXT".into(),
        GenericType::Boolean => "BOOLEAN".into(),
        GenericType::Numeric { precision: 0, .. } => "NUMERIC".into(),
        GenericType::Numeric { precision, scale } => {
            let (p, s) = clamp_numeric(*precision, *scale, 1000, 1000);
            format!("NUMERIC({},{})", p, s)
        }
        GenericType::Float => "DOUBLE PRECISION".into(),
        GenericType::Date => "DATE".into(),
        GenericType::Time => "TIME".into(),
        GenericType::DateTime => "TIMESTAMP".into(),
        GenericType::Json => "JSON".into(),
        GenericType::LargeBinary => "BYTEA".into(),
        GenericType::Array(inner) => format!("{}[]", postgres_type(inner)),
    }
}

fn sqlite_type(ty: &GenericType) -> String {
    match ty {
        GenericType::Integer => "INTEGER".into(),
        GenericType::DateTime => "DATETIME".into(),
        GenericType::Float => "REAL".into(),
        GenericType::Array(_) => "TEXT".into(),
        other => generic_type(other),
    }
}

fn generic_type(ty: &GenericType) -> String {
    match ty {
        GenericType::Integer => "INTEGER".into(),
        GenericType::BigInteger => "BIGINT".into(),
        GenericType::SmallInteger => "SMALLINT".into(),
        GenericType::String(n) => format!("VARCHAR({})", n),
        GenericType::Text | GenericType::Array(_) => "TEXT".into(),
        GenericType::Boolean => "BOOLEAN".into(),
        GenericType::Numeric { precision: 0, .. } => "NUMERIC".into(),
        GenericType::Numeric { precision, scale } => format!("NUMERIC({},{})", precision, scale),
        GenericType::Float => "FLOAT".into(),
        GenericType::Date => "DATE".into(),
        GenericType::Time => "TIME".into(),
        GenericType::DateTime => "TIMESTAMP".into(),
        GenericType::Json => "JSON".into(),
        GenericType::LargeBinary => "BLOB".into(),
    }
}

fn default_sql(dialect: Dialect, value: &DefaultValue) -> String {
    match (dialect, value) {
        (Dialect::Mssql | Dialect::Oracle, DefaultValue::Boolean(b)) => u8::from(*b).to_string(),
        (_, DefaultValue::Boolean(b)) => b.to_string().to_uppercase(),
        (Dialect::Mssql, DefaultValue::Text(s)) => format!("N{}", quote_literal(s)),
        (_, DefaultValue::Text(s)) => quote_literal(s),
        (_, DefaultValue::Integer(v)) => v.to_string(),
        (_, DefaultValue::Float(v)) => v.to_string(),
    }
}

fn identity_clause(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Mysql => " AUTO_INCREMENT",
        Dialect::Mssql => " IDENTITY(1,1)",
        Dialect::Postgres | Dialect::Oracle => " GENERATED BY DEFAULT AS IDENTITY",
        Dialect::Sqlite | Dialect::Generic => "",
    }
}

/// SQLite only autoincrements an inline `INTEGER PRIMARY KEY`.
fn sqlite_rowid_column(table: &TableDescriptor) -> Option<&ColumnDescriptor> {
    match table.primary_key.as_slice() {
        [only] => table
            .column(only)
            .filter(|c| c.autoincrement && c.data_type.is_integer()),
        _ => None,
    }
}

fn column_sql(dialect: Dialect, table: &TableDescriptor, col: &ColumnDescriptor) -> Result<String> {
    let name = quote_ident(dialect, &col.name)?;

    if dialect == Dialect::Sqlite
        && sqlite_rowid_column(table).is_some_and(|c| c.name == col.name)
    {
        return Ok(format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", name));
    }

    let mut sql = format!("{} {}", name, native_type(dialect, &col.data_type));

    let identity = col.autoincrement
        && col.data_type.is_integer()
        && table.primary_key.len() == 1
        && table.primary_key[0] == col.name;
    if identity {
        sql.push_str(identity_clause(dialect));
    } else if let Some(default) = &col.default {
        // MySQL rejects literal defaults on TEXT/BLOB/JSON.
        if !(dialect == Dialect::Mysql && col.data_type.is_large()) {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default_sql(dialect, default));
        }
    }

    if !col.nullable || col.primary_key {
        sql.push_str(" NOT NULL");
    }
    Ok(sql)
}

/// Foreign keys grouped into constraints; edges sharing a constraint
/// name and referenced table become one composite constraint.
fn foreign_key_clauses(dialect: Dialect, table: &TableDescriptor) -> Result<Vec<String>> {
    let mut groups: Vec<(Option<&str>, &str, Vec<String>, Vec<String>)> = Vec::new();
    for fk in &table.foreign_keys {
        let existing = fk.constraint.as_deref().and_then(|name| {
            groups
                .iter_mut()
                .find(|g| g.0 == Some(name) && g.1 == fk.ref_table)
        });
        match existing {
            Some(group) => {
                group.2.push(fk.column.clone());
                group.3.push(fk.ref_column.clone());
            }
            None => groups.push((
                fk.constraint.as_deref(),
                fk.ref_table.as_str(),
                vec![fk.column.clone()],
                vec![fk.ref_column.clone()],
            )),
        }
    }

    groups
        .into_iter()
        .map(|(_, ref_table, cols, ref_cols)| {
            Ok(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                quote_list(dialect, &cols)?,
                quote_ident(dialect, ref_table)?,
                quote_list(dialect, &ref_cols)?
            ))
        })
        .collect()
}

/// `CREATE TABLE` for columns, primary key and foreign keys. Indexes are
/// never part of this statement.
pub fn create_table_sql(dialect: Dialect, table: &TableDescriptor) -> Result<String> {
    let profile = dialect.profile();
    let mut parts = table
        .columns
        .iter()
        .map(|c| column_sql(dialect, table, c))
        .collect::<Result<Vec<_>>>()?;

    let inline_pk = dialect == Dialect::Sqlite && sqlite_rowid_column(table).is_some();
    if table.has_primary_key() && !inline_pk {
        parts.push(format!(
            "PRIMARY KEY ({})",
            quote_list(dialect, &table.primary_key)?
        ));
    }
    parts.extend(foreign_key_clauses(dialect, table)?);

    let create = if profile.create_if_not_exists {
        "CREATE TABLE IF NOT EXISTS"
    } else {
        "CREATE TABLE"
    };
    Ok(format!(
        "{} {} (\n    {}\n){}",
        create,
        quote_ident(dialect, &table.name)?,
        parts.join(",\n    "),
        profile.table_options
    ))
}

/// `CREATE [UNIQUE] INDEX`. MySQL gets key-prefix lengths on long columns.
pub fn create_index_sql(
    dialect: Dialect,
    table: &TableDescriptor,
    index: &IndexDescriptor,
) -> Result<String> {
    let cols = index
        .columns
        .iter()
        .map(|name| {
            let quoted = quote_ident(dialect, name)?;
            if dialect != Dialect::Mysql {
                return Ok(quoted);
            }
            Ok(match table.column(name).map(|c| &c.data_type) {
                Some(t) if t.is_large() => format!("{}(255)", quoted),
                Some(GenericType::String(n)) if *n > MYSQL_INDEX_PREFIX_CHARS => {
                    format!("{}({})", quoted, MYSQL_INDEX_PREFIX_CHARS)
                }
                _ => quoted,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let unique = if index.unique { "UNIQUE " } else { "" };
    Ok(format!(
        "CREATE {}INDEX {} ON {} ({})",
        unique,
        quote_ident(dialect, &index.name)?,
        quote_ident(dialect, &table.name)?,
        cols.join(", ")
    ))
}

/// `DROP INDEX` in the dialect's own spelling.
pub fn drop_index_sql(dialect: Dialect, table: &str, index: &str) -> Result<String> {
    drop_index_sql_in(dialect, None, table, index)
}

/// `DROP INDEX` with the index, or for `ON` syntax the table, qualified by
/// `schema` so the statement does not depend on the session search path.
pub fn drop_index_sql_in(
    dialect: Dialect,
    schema: Option<&str>,
    table: &str,
    index: &str,
) -> Result<String> {
    let qualified = |name: &str| -> Result<String> {
        let quoted = quote_ident(dialect, name)?;
        Ok(match schema {
            Some(s) => format!("{}.{}", quote_ident(dialect, s)?, quoted),
            None => quoted,
        })
    };
    Ok(match dialect.profile().drop_index {
        DropIndexSyntax::OnTable => format!(
            "DROP INDEX {} ON {}",
            quote_ident(dialect, index)?,
            qualified(table)?
        ),
        DropIndexSyntax::Bare => format!("DROP INDEX {}", qualified(index)?),
        DropIndexSyntax::IfExists => format!("DROP INDEX IF EXISTS {}", qualified(index)?),
    })
}

pub fn drop_table_sql(dialect: Dialect, table: &str) -> Result<String> {
    Ok(format!("DROP TABLE {}", quote_ident(dialect, table)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::ForeignKeyRef;

    fn orders() -> TableDescriptor {
        let mut id = ColumnDescriptor::new("id", GenericType::Integer);
        id.primary_key = true;
        id.nullable = false;
        id.autoincrement = true;
        let user_id = ColumnDescriptor::new("user_id", GenericType::Integer);
        let mut status = ColumnDescriptor::new("status", GenericType::String(20));
        status.default = Some(DefaultValue::Text("new".into()));
        let mut table = TableDescriptor::new("t_orders", vec![id, user_id, status]);
        table.primary_key = vec!["id".into()];
        table.foreign_keys = vec![ForeignKeyRef::new("user_id", "t_users", "id")];
        table.indexes = vec![IndexDescriptor::new("idx_t_orders_status", vec!["status".into()], false)];
        table
    }

    #[test]
    fn test_mysql_create_table() {
        let sql = create_table_sql(Dialect::Mysql, &orders()).unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `t_orders`"));
        assert!(sql.contains("`id` INT AUTO_INCREMENT NOT NULL"));
        assert!(sql.contains("`status` VARCHAR(20) DEFAULT 'new'"));
        assert!(sql.contains("PRIMARY KEY (`id`)"));
        assert!(sql.contains("FOREIGN KEY (`user_id`) REFERENCES `t_users` (`id`)"));
        assert!(sql.ends_with("ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"));
        assert!(!sql.contains("idx_t_orders_status"));
    }

    #[test]
    fn test_mssql_create_table() {
        let sql = create_table_sql(Dialect::Mssql, &orders()).unwrap();
        assert!(sql.starts_with("CREATE TABLE [t_orders]"));
        assert!(sql.contains("[id] INT IDENTITY(1,1) NOT NULL"));
        assert!(sql.contains("[status] NVARCHAR(20) DEFAULT N'new'"));
    }

    #[test]
    fn test_sqlite_inline_rowid() {
        let sql = create_table_sql(Dialect::Sqlite, &orders()).unwrap();
        assert!(sql.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(!sql.contains("PRIMARY KEY (\"id\")"));
    }

    #[test]
    fn test_composite_foreign_key_grouped() {
        let mut table = TableDescriptor::new(
            "t_line",
            vec![
                ColumnDescriptor::new("order_id", GenericType::Integer),
                ColumnDescriptor::new("order_rev", GenericType::Integer),
            ],
        );
        table.foreign_keys = vec![
            ForeignKeyRef::new("order_id", "t_order", "id").named("fk_line_order"),
            ForeignKeyRef::new("order_rev", "t_order", "rev").named("fk_line_order"),
        ];
        let sql = create_table_sql(Dialect::Postgres, &table).unwrap();
        assert!(sql.contains(
            "FOREIGN KEY (\"order_id\", \"order_rev\") REFERENCES \"t_order\" (\"id\", \"rev\")"
        ));
    }

    #[test]
    fn test_native_types() {
        assert_eq!(native_type(Dialect::Oracle, &GenericType::String(50)), "VARCHAR2(50 CHAR)");
        assert_eq!(native_type(Dialect::Oracle, &GenericType::String(6000)), "CLOB");
        assert_eq!(native_type(Dialect::Mssql, &GenericType::Text), "NVARCHAR(MAX)");
        assert_eq!(native_type(Dialect::Mysql, &GenericType::numeric(80, 40)), "DECIMAL(65,30)");
        assert_eq!(
            native_type(Dialect::Postgres, &GenericType::Array(Box::new(GenericType::Integer))),
            "INTEGER[]"
        );
        assert_eq!(native_type(Dialect::Sqlite, &GenericType::Float), "REAL");
        assert_eq!(native_type(Dialect::Generic, &GenericType::LargeBinary), "BLOB");
    }

    #[test]
    fn test_mysql_index_prefixes_long_columns() {
        let mut table = orders();
        table.columns.push(ColumnDescriptor::new("notes", GenericType::Text));
        let idx = IndexDescriptor::new("idx_notes", vec!["notes".into(), "status".into()], false);
        let sql = create_index_sql(Dialect::Mysql, &table, &idx).unwrap();
        assert_eq!(sql, "CREATE INDEX `idx_notes` ON `t_orders` (`notes`(255), `status`)");
    }

    #[test]
    fn test_drop_index_syntax() {
        assert_eq!(
            drop_index_sql(Dialect::Mysql, "t", "i").unwrap(),
            "DROP INDEX `i` ON `t`"
        );
        assert_eq!(drop_index_sql(Dialect::Oracle, "t", "i").unwrap(), "DROP INDEX \"i\"");
        assert_eq!(
            drop_index_sql(Dialect::Postgres, "t", "i").unwrap(),
            "DROP INDEX IF EXISTS \"i\""
        );
        assert_eq!(
            drop_index_sql(Dialect::Mssql, "t", "i").unwrap(),
            "DROP INDEX [i] ON [t]"
        );
    }

    #[test]
    fn test_drop_index_schema_qualified() {
        assert_eq!(
            drop_index_sql_in(Dialect::Postgres, Some("staging"), "t_orders", "idx_t_orders_status")
                .unwrap(),
            "DROP INDEX IF EXISTS \"staging\".\"idx_t_orders_status\""
        );
        assert_eq!(
            drop_index_sql_in(Dialect::Mssql, Some("dbo"), "t", "i").unwrap(),
            "DROP INDEX [i] ON [dbo].[t]"
        );
        assert_eq!(
            drop_index_sql_in(Dialect::Postgres, None, "t", "i").unwrap(),
            drop_index_sql(Dialect::Postgres, "t", "i").unwrap()
        );
        assert!(drop_index_sql_in(Dialect::Postgres, Some(""), "t", "i").is_err());
    }
}
