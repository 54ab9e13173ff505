//! Dialect-neutral schema descriptors.
//!
//! Reflection produces [`ReflectedTable`] values holding native type strings.
//! Translation turns them into [`TableDescriptor`]s built from the closed
//! [`GenericType`] vocabulary, which is what ordering, planning, DDL
//! application and verification operate on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Longest length kept as `String(n)`; anything longer becomes `Text`.
pub const MAX_STRING_LENGTH: u32 = 8000;

/// Cross-dialect column type kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenericType {
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInteger,
    /// 16-bit integer (also used for 8-bit source types).
    SmallInteger,
    /// Bounded character string, `n <= MAX_STRING_LENGTH`.
    String(u32),
    /// Unbounded character data.
    Text,
    /// Boolean / bit.
    Boolean,
    /// Exact decimal. A precision of 0 means the engine default.
    Numeric { precision: u32, scale: u32 },
    /// Approximate floating point.
    Float,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time, with or without zone.
    DateTime,
    /// JSON document.
    Json,
    /// Binary large object.
    LargeBinary,
    /// Array of an element type.
    Array(Box<GenericType>),
}

impl GenericType {
    /// Build a string type, collapsing oversized lengths to `Text`.
    pub fn string(length: u32) -> Self {
        if length > MAX_STRING_LENGTH {
            GenericType::Text
        } else {
            GenericType::String(length)
        }
    }

    /// Build a numeric type with an explicit precision and scale.
    pub fn numeric(precision: u32, scale: u32) -> Self {
        GenericType::Numeric { precision, scale }
    }

    /// Large-data kinds may never take part in a primary key.
    pub fn is_large(&self) -> bool {
        matches!(
            self,
            GenericType::Text | GenericType::LargeBinary | GenericType::Json | GenericType::Array(_)
        )
    }

    /// Integer kinds are the only ones eligible for autoincrement.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            GenericType::Integer | GenericType::BigInteger | GenericType::SmallInteger
        )
    }
}

impl fmt::Display for GenericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenericType::Integer => write!(f, "Integer"),
            GenericType::BigInteger => write!(f, "BigInteger"),
            GenericType::SmallInteger => write!(f, "SmallInteger"),
            GenericType::String(n) => write!(f, "String({})", n),
            GenericType::Text => write!(f, "Text"),
            GenericType::Boolean => write!(f, "Boolean"),
            GenericType::Numeric { precision: 0, .. } => write!(f, "Numeric"),
            GenericType::Numeric { precision, scale } => {
                write!(f, "Numeric({}, {})", precision, scale)
            }
            GenericType::Float => write!(f, "Float"),
            GenericType::Date => write!(f, "Date"),
            GenericType::Time => write!(f, "Time"),
            GenericType::DateTime => write!(f, "DateTime"),
            GenericType::Json => write!(f, "JSON"),
            GenericType::LargeBinary => write!(f, "LargeBinary"),
            GenericType::Array(inner) => write!(f, "ARRAY({})", inner),
        }
    }
}

/// Literal column default carried across dialects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
}

impl DefaultValue {
    /// Parse a server-side default expression into a literal.
    ///
    /// Returns `None` for anything that is not a plain literal (function
    /// calls, sequences, `NULL`), since expressions do not translate between
    /// engines. Handles PostgreSQL casts (`'a'::character varying`) and
    /// SQL Server's parenthesised defaults (`((0))`).
    pub fn parse_literal(expr: &str) -> Option<DefaultValue> {
        let mut text = expr.trim();
        while text.starts_with('(') && closing_paren(text) == Some(text.len() - 1) {
            text = text[1..text.len() - 1].trim();
        }

        if let Some(rest) = text.strip_prefix('\'') {
            let end = rest.rfind('\'')?;
            let tail = rest[end + 1..].trim();
            if !tail.is_empty() && !tail.starts_with("::") {
                return None;
            }
            return Some(DefaultValue::Text(rest[..end].replace("''", "'")));
        }
        if let Some(rest) = text.strip_prefix("N'") {
            let end = rest.rfind('\'')?;
            return Some(DefaultValue::Text(rest[..end].replace("''", "'")));
        }

        let bare = text.split("::").next().unwrap_or(text).trim();
        match bare.to_ascii_lowercase().as_str() {
            "true" => return Some(DefaultValue::Boolean(true)),
            "false" => return Some(DefaultValue::Boolean(false)),
            _ => {}
        }
        if let Ok(v) = bare.parse::<i64>() {
            return Some(DefaultValue::Integer(v));
        }
        if let Ok(v) = bare.parse::<f64>() {
            if v.is_finite() {
                return Some(DefaultValue::Float(v));
            }
        }
        None
    }
}

/// Byte offset of the `)` matching the `(` at the start of `text`.
fn closing_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quoted = false;
    for (i, ch) in text.char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Integer(v) => write!(f, "{}", v),
            DefaultValue::Float(v) => write!(f, "{}", v),
            DefaultValue::Boolean(v) => write!(f, "{}", v),
            DefaultValue::Text(v) => write!(f, "'{}'", v.replace('\'', "''")),
        }
    }
}

/// Column definition in generic terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,

    /// Translated type.
    pub data_type: GenericType,

    /// Whether NULL is allowed.
    pub nullable: bool,

    /// Whether the column is part of the primary key.
    pub primary_key: bool,

    /// Only honoured for a single-column integer primary key.
    pub autoincrement: bool,

    /// Literal default, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
}

impl ColumnDescriptor {
    /// Nullable, non-key column without a default.
    pub fn new(name: impl Into<String>, data_type: GenericType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: false,
            autoincrement: false,
            default: None,
        }
    }
}

/// Single-column foreign key edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Referencing column on the owning table.
    pub column: String,

    /// Referenced table (may lie outside the working set).
    pub ref_table: String,

    /// Referenced column.
    pub ref_column: String,

    /// Constraint name; edges sharing one form a composite key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

impl ForeignKeyRef {
    pub fn new(
        column: impl Into<String>,
        ref_table: impl Into<String>,
        ref_column: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            ref_table: ref_table.into(),
            ref_column: ref_column.into(),
            constraint: None,
        }
    }

    /// Attach a constraint name.
    pub fn named(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }
}

/// Secondary index definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Index name, unique per table.
    pub name: String,

    /// Indexed columns in key order.
    pub columns: Vec<String>,

    /// Whether this is a unique index.
    pub unique: bool,
}

impl IndexDescriptor {
    pub fn new(name: impl Into<String>, columns: Vec<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            columns,
            unique,
        }
    }
}

/// Table definition in generic terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name, unique within the working set.
    pub name: String,

    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,

    /// Primary key column names in key order.
    #[serde(default)]
    pub primary_key: Vec<String>,

    /// Foreign key edges.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyRef>,

    /// Planned secondary indexes.
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            columns,
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check if the table has a primary key.
    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Tables this one references, excluding itself.
    pub fn referenced_tables(&self) -> BTreeSet<&str> {
        self.foreign_keys
            .iter()
            .map(|fk| fk.ref_table.as_str())
            .filter(|t| *t != self.name)
            .collect()
    }

    /// Rebuild `primary_key` from the per-column flags.
    ///
    /// Names already in `primary_key` keep their key order as long as their
    /// column is still flagged. Newly flagged columns follow in declaration
    /// order.
    pub fn sync_primary_key(&mut self) {
        let flagged = |name: &str| self.columns.iter().any(|c| c.primary_key && c.name == name);
        let mut key: Vec<String> = self
            .primary_key
            .iter()
            .filter(|name| flagged(name.as_str()))
            .cloned()
            .collect();
        for col in self.columns.iter().filter(|c| c.primary_key) {
            if !key.contains(&col.name) {
                key.push(col.name.clone());
            }
        }
        self.primary_key = key;
    }

    /// Make `key` the primary key, in the given order, and set the column
    /// flags to match. Names with no matching column are skipped.
    pub fn set_primary_key(&mut self, key: &[String]) {
        for col in &mut self.columns {
            col.primary_key = key.contains(&col.name);
        }
        self.primary_key = key
            .iter()
            .filter(|name| self.columns.iter().any(|c| &c.name == *name))
            .cloned()
            .collect();
    }
}

/// Column metadata as reported by an engine, before translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectedColumn {
    pub name: String,
    /// Native type spelling including length/precision, e.g. `varchar(50)`.
    pub native_type: String,
    pub nullable: bool,
    /// Raw default expression as the engine reports it.
    pub default: Option<String>,
    pub primary_key: bool,
    pub autoincrement: bool,
}

impl ReflectedColumn {
    pub fn new(name: impl Into<String>, native_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native_type: native_type.into(),
            nullable: true,
            default: None,
            primary_key: false,
            autoincrement: false,
        }
    }
}

/// Everything reflection knows about one table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReflectedTable {
    pub name: String,
    pub columns: Vec<ReflectedColumn>,
    /// Primary key in constraint order, which can differ from column order.
    #[serde(default)]
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyRef>,
    /// Secondary indexes, primary-key index excluded.
    pub indexes: Vec<IndexDescriptor>,
}
