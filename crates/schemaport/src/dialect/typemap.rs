//! Native type string → [`GenericType`] translation.
//!
//! Translation is total: every input resolves to some generic type. When a
//! string type carries no usable length, the column name decides it (an
//! `email` column gets 320 characters, a `remark` column becomes `Text`),
//! and failing that the target dialect's default length applies.
//!
//! Resolution order:
//! 1. array spellings (`integer[]`, `ARRAY`) wrap the translated element
//! 2. `VARCHAR(n)` family, with `(MAX)` meaning `Text`
//! 3. `VARCHAR` without a length → name heuristic
//! 4. `CHAR(n)` family, `String(255)` without a length
//! 5. `NUMERIC` / `DECIMAL` / `NUMBER` with `(p[,s])`
//! 6. `ENUM` / `SET` → `String(255)`
//! 7. base-type table, first substring match
//! 8. name heuristic

use crate::core::schema::GenericType;

use super::Dialect;

/// Result of a base-type table hit.
#[derive(Debug, Clone)]
enum Base {
    Kind(GenericType),
    /// A string kind that still needs a length.
    Sized,
}

/// Native spellings across dialects, most specific first.
static BASE_TYPES: &[(&str, Base)] = &[
    ("BIGSERIAL", Base::Kind(GenericType::BigInteger)),
    ("BIGINT", Base::Kind(GenericType::BigInteger)),
    ("SMALLSERIAL", Base::Kind(GenericType::SmallInteger)),
    ("SMALLINT", Base::Kind(GenericType::SmallInteger)),
    ("TINYINT", Base::Kind(GenericType::SmallInteger)),
    ("MEDIUMINT", Base::Kind(GenericType::Integer)),
    ("INTEGER", Base::Kind(GenericType::Integer)),
    ("SERIAL", Base::Kind(GenericType::Integer)),
    ("INTERVAL", Base::Sized),
    ("POINT", Base::Sized),
    ("INET", Base::Sized),
    ("INT", Base::Kind(GenericType::Integer)),
    ("CLOB", Base::Kind(GenericType::Text)),
    ("NTEXT", Base::Kind(GenericType::Text)),
    ("TEXT", Base::Kind(GenericType::Text)),
    ("XML", Base::Kind(GenericType::Text)),
    ("UNIQUEIDENTIFIER", Base::Sized),
    ("UUID", Base::Sized),
    ("JSONB", Base::Kind(GenericType::Json)),
    ("JSON", Base::Kind(GenericType::Json)),
    ("BOOLEAN", Base::Kind(GenericType::Boolean)),
    ("BOOL", Base::Kind(GenericType::Boolean)),
    ("BIT", Base::Kind(GenericType::Boolean)),
    ("DATETIME2", Base::Kind(GenericType::DateTime)),
    ("SMALLDATETIME", Base::Kind(GenericType::DateTime)),
    ("DATETIME", Base::Kind(GenericType::DateTime)),
    ("TIMESTAMPTZ", Base::Kind(GenericType::DateTime)),
    ("TIMESTAMP", Base::Kind(GenericType::DateTime)),
    ("DATE", Base::Kind(GenericType::Date)),
    ("TIME", Base::Kind(GenericType::Time)),
    ("SMALLMONEY", Base::Kind(GenericType::Numeric { precision: 10, scale: 4 })),
    ("MONEY", Base::Kind(GenericType::Numeric { precision: 19, scale: 4 })),
    ("NUMERIC", Base::Kind(GenericType::Numeric { precision: 0, scale: 0 })),
    ("DECIMAL", Base::Kind(GenericType::Numeric { precision: 0, scale: 0 })),
    ("NUMBER", Base::Kind(GenericType::Numeric { precision: 0, scale: 0 })),
    ("BINARY_FLOAT", Base::Kind(GenericType::Float)),
    ("BINARY_DOUBLE", Base::Kind(GenericType::Float)),
    ("DOUBLE", Base::Kind(GenericType::Float)),
    ("FLOAT", Base::Kind(GenericType::Float)),
    ("REAL", Base::Kind(GenericType::Float)),
    ("VARBINARY", Base::Kind(GenericType::LargeBinary)),
    ("BLOB", Base::Kind(GenericType::LargeBinary)),
    ("BYTEA", Base::Kind(GenericType::LargeBinary)),
    ("RAW", Base::Kind(GenericType::LargeBinary)),
    ("IMAGE", Base::Kind(GenericType::LargeBinary)),
    ("BINARY", Base::Kind(GenericType::LargeBinary)),
];

/// Length chosen by a column-name rule.
#[derive(Debug, Clone, Copy)]
enum NameLength {
    Chars(u32),
    Unbounded,
}

/// Column-name rules, evaluated in order over the lower-cased name.
static NAME_RULES: &[(&[&str], NameLength)] = &[
    (&["id", "uuid", "guid"], NameLength::Chars(36)),
    (&["ip", "addr", "address"], NameLength::Chars(45)),
    (&["email", "mail"], NameLength::Chars(320)),
    (&["phone", "tel", "mobile", "fax"], NameLength::Chars(20)),
    (&["name", "title", "label"], NameLength::Chars(100)),
    (&["code", "no", "number", "id"], NameLength::Chars(50)),
    (&["url", "uri", "link"], NameLength::Chars(2048)),
    (&["path", "file", "directory"], NameLength::Chars(500)),
    (
        &["desc", "description", "remark", "note", "comment"],
        NameLength::Unbounded,
    ),
    (&["content", "data", "value", "param"], NameLength::Unbounded),
    (&["json", "xml", "config", "setting"], NameLength::Unbounded),
];

/// Maps native column types onto the generic vocabulary for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct TypeTranslator {
    dialect: Dialect,
}

impl TypeTranslator {
    /// Create a translator whose fallback lengths follow `dialect`.
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Translate a native type spelling for the named column.
    pub fn translate(&self, native_type: &str, column: &str) -> GenericType {
        let normalized = normalize(native_type);

        if let Some(element) = array_element(&normalized) {
            let inner = if element.is_empty() {
                GenericType::Text
            } else {
                self.translate(element, column)
            };
            return GenericType::Array(Box::new(inner));
        }

        let (head, args) = split_args(&normalized);

        if head.contains("VARCHAR") {
            return match args.as_deref() {
                Some(a) if a.trim() == "MAX" => GenericType::Text,
                Some(a) => match leading_number(a) {
                    Some(n) => GenericType::string(n),
                    None => self.string_for_name(column),
                },
                None => self.string_for_name(column),
            };
        }

        if head.contains("CHAR") {
            return match args.as_deref().and_then(leading_number) {
                Some(n) => GenericType::string(n),
                None => GenericType::String(255),
            };
        }

        if ["NUMERIC", "DECIMAL", "NUMBER"]
            .iter()
            .any(|k| head.contains(k))
        {
            if let Some((precision, scale)) = args.as_deref().and_then(precision_scale) {
                return GenericType::numeric(precision, scale);
            }
        }

        if head.contains("ENUM") || head.contains("SET") {
            return GenericType::String(255);
        }

        for (spelling, base) in BASE_TYPES {
            if head.contains(spelling) {
                return match base {
                    Base::Kind(kind) => kind.clone(),
                    Base::Sized => self.string_for_name(column),
                };
            }
        }

        self.string_for_name(column)
    }

    /// Pick a string type for a column whose length is unknown.
    pub fn string_for_name(&self, column: &str) -> GenericType {
        let lower = column.to_lowercase();
        for (patterns, length) in NAME_RULES {
            if patterns.iter().any(|p| lower.contains(p)) {
                return match length {
                    NameLength::Chars(n) => GenericType::string(*n),
                    NameLength::Unbounded => GenericType::Text,
                };
            }
        }
        GenericType::String(self.dialect.profile().default_string_length)
    }
}

/// Upper-case, collapse whitespace and fold multi-word spellings.
fn normalize(native_type: &str) -> String {
    let upper = native_type
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase();
    upper
        .replace("NATIONAL CHARACTER VARYING", "NVARCHAR")
        .replace("CHARACTER VARYING", "VARCHAR")
        .replace("CHARACTER", "CHAR")
        .replace("DOUBLE PRECISION", "DOUBLE")
}

/// `INTEGER[]` → `Some("INTEGER")`, bare `ARRAY` → `Some("")`.
fn array_element(normalized: &str) -> Option<&str> {
    if let Some(element) = normalized.strip_suffix("[]") {
        return Some(element.trim_end_matches("[]").trim());
    }
    if normalized == "ARRAY" {
        return Some("");
    }
    None
}

/// Split `TIMESTAMP(6) WITH TIME ZONE` into (`TIMESTAMP WITH TIME ZONE`, `6`).
fn split_args(normalized: &str) -> (String, Option<String>) {
    let Some(open) = normalized.find('(') else {
        return (normalized.to_string(), None);
    };
    let Some(close) = normalized.rfind(')').filter(|c| *c > open) else {
        return (normalized[..open].trim().to_string(), None);
    };
    let before = normalized[..open].trim();
    let after = normalized[close + 1..].trim();
    let head = if after.is_empty() {
        before.to_string()
    } else {
        format!("{} {}", before, after)
    };
    (head, Some(normalized[open + 1..close].to_string()))
}

/// First integer in an argument list: `100 CHAR` → 100.
fn leading_number(args: &str) -> Option<u32> {
    let digits: String = args
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// `10,2` → (10, 2); `10` → (10, 0).
fn precision_scale(args: &str) -> Option<(u32, u32)> {
    let mut parts = args.split(',');
    let precision = parts.next()?.trim().parse().ok()?;
    let scale = match parts.next() {
        Some(s) => s.trim().parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((precision, scale))
}
