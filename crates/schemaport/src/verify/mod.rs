//! Post-apply verification.
//!
//! [`SchemaVerifier`] re-introspects every planned table on the target and
//! reports what it finds next to what was intended. It is diagnostic only:
//! nothing is repaired, and a failed lookup becomes an issue on that table.

pub mod diff;

use serde::Serialize;
use tracing::{info, warn};

use crate::core::schema::{ForeignKeyRef, IndexDescriptor, TableDescriptor};
use crate::core::traits::SchemaReader;

pub use diff::{classify, TableDifferences};

/// One column as the target reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnReport {
    pub name: String,
    pub native_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

/// One foreign key constraint: constrained columns to referenced columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyReport {
    pub constraint: Option<String>,
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
}

impl ForeignKeyReport {
    /// Fold single-column edges into per-constraint entries.
    pub fn group(edges: &[ForeignKeyRef]) -> Vec<ForeignKeyReport> {
        let mut out: Vec<ForeignKeyReport> = Vec::new();
        for fk in edges {
            let existing = fk.constraint.as_ref().and_then(|name| {
                out.iter_mut()
                    .find(|r| r.constraint.as_ref() == Some(name) && r.ref_table == fk.ref_table)
            });
            match existing {
                Some(report) => {
                    report.columns.push(fk.column.clone());
                    report.ref_columns.push(fk.ref_column.clone());
                }
                None => out.push(ForeignKeyReport {
                    constraint: fk.constraint.clone(),
                    columns: vec![fk.column.clone()],
                    ref_table: fk.ref_table.clone(),
                    ref_columns: vec![fk.ref_column.clone()],
                }),
            }
        }
        out
    }
}

/// Something about a table that does not match the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    MissingTable,
    MissingColumn { column: String },
    ExtraColumn { column: String },
    PrimaryKeyMismatch { expected: Vec<String>, actual: Vec<String> },
    MissingIndex { index: String },
    IntrospectionFailed { message: String },
}

/// Verification result for one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: String,
    pub exists: bool,
    pub columns: Vec<ColumnReport>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyReport>,
    pub indexes: Vec<IndexDescriptor>,
    pub issues: Vec<Issue>,
}

impl TableReport {
    fn absent(table: &str, issue: Issue) -> Self {
        Self {
            table: table.to_string(),
            exists: false,
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            issues: vec![issue],
        }
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationSummary {
    pub tables_checked: usize,
    pub tables_present: usize,
    pub tables_missing: usize,
    pub tables_with_issues: usize,
    pub issues: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    pub tables: Vec<TableReport>,
    pub summary: VerificationSummary,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.summary.issues == 0
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    fn push(&mut self, report: TableReport) {
        self.summary.tables_checked += 1;
        if report.exists {
            self.summary.tables_present += 1;
        } else {
            self.summary.tables_missing += 1;
        }
        if !report.is_clean() {
            self.summary.tables_with_issues += 1;
        }
        self.summary.issues += report.issues.len();
        self.tables.push(report);
    }
}

/// Re-introspects the target against the planned descriptors.
pub struct SchemaVerifier<'a, R: SchemaReader + ?Sized> {
    reader: &'a mut R,
}

impl<'a, R: SchemaReader + ?Sized> SchemaVerifier<'a, R> {
    pub fn new(reader: &'a mut R) -> Self {
        Self { reader }
    }

    pub async fn verify(&mut self, planned: &[TableDescriptor]) -> VerificationReport {
        let mut report = VerificationReport::default();
        for table in planned {
            report.push(self.verify_table(table).await);
        }
        info!(
            "Verification: {} tables checked, {} missing, {} with issues",
            report.summary.tables_checked,
            report.summary.tables_missing,
            report.summary.tables_with_issues
        );
        report
    }

    async fn verify_table(&mut self, planned: &TableDescriptor) -> TableReport {
        let name = planned.name.as_str();
        match self.reader.has_table(name).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("{}: missing on target", name);
                return TableReport::absent(name, Issue::MissingTable);
            }
            Err(e) => {
                return TableReport::absent(
                    name,
                    Issue::IntrospectionFailed {
                        message: e.to_string(),
                    },
                );
            }
        }

        let reflected = match self.reader.reflect_table(name).await {
            Ok(r) => r,
            Err(e) => {
                warn!("{}: could not re-introspect: {}", name, e);
                let mut report = TableReport::absent(
                    name,
                    Issue::IntrospectionFailed {
                        message: e.to_string(),
                    },
                );
                report.exists = true;
                return report;
            }
        };

        let primary_key: Vec<String> = if reflected.primary_key.is_empty() {
            reflected
                .columns
                .iter()
                .filter(|c| c.primary_key)
                .map(|c| c.name.clone())
                .collect()
        } else {
            reflected.primary_key.clone()
        };
        let columns: Vec<ColumnReport> = reflected
            .columns
            .iter()
            .map(|c| ColumnReport {
                name: c.name.clone(),
                native_type: c.native_type.clone(),
                nullable: c.nullable,
                default: c.default.clone(),
            })
            .collect();

        let mut issues = Vec::new();
        for col in &planned.columns {
            if !columns.iter().any(|c| c.name.eq_ignore_ascii_case(&col.name)) {
                issues.push(Issue::MissingColumn {
                    column: col.name.clone(),
                });
            }
        }
        for col in &columns {
            if planned.columns.iter().all(|c| !c.name.eq_ignore_ascii_case(&col.name)) {
                issues.push(Issue::ExtraColumn {
                    column: col.name.clone(),
                });
            }
        }
        if !same_names(&planned.primary_key, &primary_key) {
            issues.push(Issue::PrimaryKeyMismatch {
                expected: planned.primary_key.clone(),
                actual: primary_key.clone(),
            });
        }
        for index in &planned.indexes {
            if !reflected.indexes.iter().any(|i| i.name.eq_ignore_ascii_case(&index.name)) {
                issues.push(Issue::MissingIndex {
                    index: index.name.clone(),
                });
            }
        }
        if !issues.is_empty() {
            warn!("{}: {} verification issues", name, issues.len());
        }

        TableReport {
            table: name.to_string(),
            exists: true,
            columns,
            primary_key,
            foreign_keys: ForeignKeyReport::group(&reflected.foreign_keys),
            indexes: reflected.indexes,
            issues,
        }
    }
}

fn same_names(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnDescriptor, GenericType};
    use crate::dialect::Dialect;
    use crate::drivers::memory::MemoryTarget;

    fn orders() -> TableDescriptor {
        let mut id = ColumnDescriptor::new("id", GenericType::Integer);
        id.primary_key = true;
        id.nullable = false;
        let mut t = TableDescriptor::new(
            "t_orders",
            vec![id, ColumnDescriptor::new("user_id", GenericType::Integer)],
        );
        t.sync_primary_key();
        t.foreign_keys = vec![ForeignKeyRef::new("user_id", "t_users", "id").named("fk_orders_user")];
        t.indexes = vec![IndexDescriptor::new("idx_t_orders_user_id", vec!["user_id".into()], false)];
        t
    }

    #[tokio::test]
    async fn test_clean_table() {
        let mut target = MemoryTarget::new(Dialect::Postgres);
        target.insert_table(orders());

        let report = SchemaVerifier::new(&mut target).verify(&[orders()]).await;
        assert!(report.is_clean());
        let t = report.table("t_orders").unwrap();
        assert!(t.exists);
        assert_eq!(t.primary_key, vec!["id"]);
        assert_eq!(t.columns[0].native_type, "INTEGER");
        assert!(!t.columns[0].nullable);
        assert_eq!(t.foreign_keys[0].ref_table, "t_users");
        assert_eq!(t.indexes.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_table_and_drift() {
        let mut target = MemoryTarget::new(Dialect::Mysql);
        let mut drifted = orders();
        drifted.columns.pop();
        drifted.columns.push(ColumnDescriptor::new("note", GenericType::Text));
        drifted.indexes.clear();
        target.insert_table(drifted);

        let mut users = orders();
        users.name = "t_users".into();

        let report = SchemaVerifier::new(&mut target).verify(&[orders(), users]).await;
        assert_eq!(report.summary.tables_missing, 1);
        assert_eq!(report.summary.tables_with_issues, 2);

        let issues = &report.table("t_orders").unwrap().issues;
        assert!(issues.contains(&Issue::MissingColumn { column: "user_id".into() }));
        assert!(issues.contains(&Issue::ExtraColumn { column: "note".into() }));
        assert!(issues.contains(&Issue::MissingIndex { index: "idx_t_orders_user_id".into() }));
        assert_eq!(report.table("t_users").unwrap().issues, vec![Issue::MissingTable]);
    }

    #[tokio::test]
    async fn test_unreadable_table_is_an_issue() {
        let mut target = MemoryTarget::new(Dialect::Sqlite);
        target.insert_table(orders());
        target.mark_unreadable("t_orders");

        let report = SchemaVerifier::new(&mut target).verify(&[orders()]).await;
        let t = report.table("t_orders").unwrap();
        assert!(t.exists);
        assert!(matches!(t.issues[0], Issue::IntrospectionFailed { .. }));
    }

    #[test]
    fn test_composite_fk_grouped() {
        let edges = vec![
            ForeignKeyRef::new("a", "t_p", "x").named("fk1"),
            ForeignKeyRef::new("b", "t_p", "y").named("fk1"),
            ForeignKeyRef::new("c", "t_q", "id"),
        ];
        let grouped = ForeignKeyReport::group(&edges);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].columns, vec!["a", "b"]);
        assert_eq!(grouped[0].ref_columns, vec!["x", "y"]);
    }

    #[test]
    fn test_report_serializes() {
        let mut report = VerificationReport::default();
        report.push(TableReport::absent("t_x", Issue::MissingTable));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["tables"][0]["issues"][0]["kind"], "missing_table");
        assert_eq!(json["summary"]["tables_missing"], 1);
    }
}
