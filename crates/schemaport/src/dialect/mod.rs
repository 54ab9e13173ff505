//! Dialect tags and the per-dialect statement table.
//!
//! Every engine difference that is a fixed list of statements (integrity
//! toggles, bulk session tuning, drop-index syntax, table options) lives in
//! the static [`PROFILES`] table and is looked up by [`Dialect::profile`].
//! Type translation lives in [`typemap`], DDL rendering in [`ddl`].

pub mod ddl;
pub mod typemap;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SchemaError;

pub use ddl::native_type;
pub use typemap::TypeTranslator;

/// Database engine family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// ANSI-ish fallback used when no engine is named.
    Generic,
    /// MySQL and MariaDB.
    Mysql,
    Oracle,
    /// Microsoft SQL Server.
    Mssql,
    Postgres,
    Sqlite,
}

/// How a dialect spells `DROP INDEX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropIndexSyntax {
    /// `DROP INDEX name ON table`
    OnTable,
    /// `DROP INDEX name`
    Bare,
    /// `DROP INDEX IF EXISTS name`
    IfExists,
}

/// Fixed statement sets for one dialect.
#[derive(Debug)]
pub struct DialectProfile {
    pub dialect: Dialect,
    /// Disables foreign-key / constraint checking for the session.
    pub integrity_off: &'static [&'static str],
    /// Restores constraint checking. Runs last in post-flight.
    pub integrity_on: &'static [&'static str],
    /// Bulk-load session tuning, applied after `integrity_off`.
    pub tuning_set: &'static [&'static str],
    /// Undoes `tuning_set`. Runs before `integrity_on`.
    pub tuning_reset: &'static [&'static str],
    pub drop_index: DropIndexSyntax,
    /// Whether `CREATE TABLE IF NOT EXISTS` is accepted.
    pub create_if_not_exists: bool,
    /// Appended after the closing parenthesis of `CREATE TABLE`.
    pub table_options: &'static str,
    /// Length used for strings whose length cannot be inferred.
    pub default_string_length: u32,
    /// Upper bound on an estimated composite primary key, in bytes.
    pub max_key_bytes: u32,
    /// Port used when the connection config leaves it out.
    pub default_port: u16,
}

static PROFILES: [DialectProfile; 6] = [
    DialectProfile {
        dialect: Dialect::Generic,
        integrity_off: &[],
        integrity_on: &[],
        tuning_set: &[],
        tuning_reset: &[],
        drop_index: DropIndexSyntax::Bare,
        create_if_not_exists: true,
        table_options: "",
        default_string_length: 255,
        max_key_bytes: 8000,
        default_port: 0,
    },
    DialectProfile {
        dialect: Dialect::Mysql,
        integrity_off: &["SET FOREIGN_KEY_CHECKS = 0"],
        integrity_on: &["SET FOREIGN_KEY_CHECKS = 1"],
        tuning_set: &[
            "SET UNIQUE_CHECKS = 0",
            "SET AUTOCOMMIT = 0",
            "SET SESSION sql_mode = 'NO_AUTO_VALUE_ON_ZERO'",
            "SET SESSION innodb_lock_wait_timeout = 300",
        ],
        tuning_reset: &["SET UNIQUE_CHECKS = 1", "SET AUTOCOMMIT = 1"],
        drop_index: DropIndexSyntax::OnTable,
        create_if_not_exists: true,
        table_options: " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci",
        default_string_length: 255,
        max_key_bytes: 3000,
        default_port: 3306,
    },
    DialectProfile {
        dialect: Dialect::Oracle,
        integrity_off: &["ALTER SESSION SET CONSTRAINT_CHECK=FALSE"],
        integrity_on: &["ALTER SESSION SET CONSTRAINT_CHECK=TRUE"],
        tuning_set: &["ALTER SESSION SET DDL_LOCK_TIMEOUT=300"],
        tuning_reset: &["ALTER SESSION SET DDL_LOCK_TIMEOUT=0"],
        drop_index: DropIndexSyntax::Bare,
        create_if_not_exists: false,
        table_options: "",
        default_string_length: 4000,
        max_key_bytes: 8000,
        default_port: 1521,
    },
    DialectProfile {
        dialect: Dialect::Mssql,
        integrity_off: &["EXEC sp_msforeachtable 'ALTER TABLE ? NOCHECK CONSTRAINT all'"],
        integrity_on: &["EXEC sp_msforeachtable 'ALTER TABLE ? CHECK CONSTRAINT all'"],
        tuning_set: &["SET ARITHABORT OFF", "SET ANSI_WARNINGS OFF"],
        tuning_reset: &["SET ARITHABORT ON", "SET ANSI_WARNINGS ON"],
        drop_index: DropIndexSyntax::OnTable,
        create_if_not_exists: false,
        table_options: "",
        default_string_length: 4000,
        max_key_bytes: 8000,
        default_port: 1433,
    },
    DialectProfile {
        dialect: Dialect::Postgres,
        integrity_off: &[],
        integrity_on: &[],
        tuning_set: &[],
        tuning_reset: &[],
        drop_index: DropIndexSyntax::IfExists,
        create_if_not_exists: true,
        table_options: "",
        default_string_length: 255,
        max_key_bytes: 8000,
        default_port: 5432,
    },
    DialectProfile {
        dialect: Dialect::Sqlite,
        integrity_off: &[],
        integrity_on: &[],
        tuning_set: &[],
        tuning_reset: &[],
        drop_index: DropIndexSyntax::IfExists,
        create_if_not_exists: true,
        table_options: "",
        default_string_length: 255,
        max_key_bytes: 8000,
        default_port: 0,
    },
];

impl Dialect {
    pub const ALL: [Dialect; 6] = [
        Dialect::Generic,
        Dialect::Mysql,
        Dialect::Oracle,
        Dialect::Mssql,
        Dialect::Postgres,
        Dialect::Sqlite,
    ];

    /// Fixed statement sets for this dialect.
    pub fn profile(self) -> &'static DialectProfile {
        let idx = match self {
            Dialect::Generic => 0,
            Dialect::Mysql => 1,
            Dialect::Oracle => 2,
            Dialect::Mssql => 3,
            Dialect::Postgres => 4,
            Dialect::Sqlite => 5,
        };
        &PROFILES[idx]
    }

    /// Canonical lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Generic => "generic",
            Dialect::Mysql => "mysql",
            Dialect::Oracle => "oracle",
            Dialect::Mssql => "mssql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Whether phase 0 has anything to toggle for this dialect.
    pub fn has_session_toggles(self) -> bool {
        let p = self.profile();
        !(p.integrity_off.is_empty() && p.tuning_set.is_empty())
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "generic" | "" => Ok(Dialect::Generic),
            "mysql" | "mariadb" => Ok(Dialect::Mysql),
            "oracle" => Ok(Dialect::Oracle),
            "mssql" | "sqlserver" | "sql_server" => Ok(Dialect::Mssql),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(SchemaError::UnsupportedDialect(format!(
                "'{}'. Supported: generic, mysql, mariadb, oracle, mssql, postgres, sqlite",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("MariaDB".parse::<Dialect>().unwrap(), Dialect::Mysql);
        assert_eq!("postgresql".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("sql_server".parse::<Dialect>().unwrap(), Dialect::Mssql);
        assert_eq!("sqlite3".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert!("db2".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_profile_lookup_matches_tag() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.profile().dialect, dialect);
        }
    }

    #[test]
    fn test_toggles_only_where_supported() {
        assert!(Dialect::Mysql.has_session_toggles());
        assert!(Dialect::Oracle.has_session_toggles());
        assert!(Dialect::Mssql.has_session_toggles());
        assert!(!Dialect::Postgres.has_session_toggles());
        assert!(!Dialect::Sqlite.has_session_toggles());
        assert!(!Dialect::Generic.has_session_toggles());
    }

    #[test]
    fn test_mysql_statement_set() {
        let p = Dialect::Mysql.profile();
        assert_eq!(p.integrity_off, &["SET FOREIGN_KEY_CHECKS = 0"]);
        assert_eq!(p.integrity_on, &["SET FOREIGN_KEY_CHECKS = 1"]);
        assert_eq!(p.tuning_set.len(), 4);
        assert_eq!(p.max_key_bytes, 3000);
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.to_string().parse::<Dialect>().unwrap(), dialect);
        }
    }
}
