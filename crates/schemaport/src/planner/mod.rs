//! Descriptor translation and refinement.
//!
//! [`SchemaPlanner::describe`] turns a reflected table into a generic
//! descriptor. [`SchemaPlanner::refine`] settles its primary key and
//! secondary indexes for the target.

pub mod index;
pub mod primary_key;

use serde::Serialize;
use tracing::debug;

use crate::core::schema::{
    ColumnDescriptor, DefaultValue, ReflectedColumn, ReflectedTable, TableDescriptor,
};
use crate::dialect::{Dialect, TypeTranslator};

pub use index::{plan_indexes, recommend_indexes, IndexSource, INDEX_KEYWORDS};
pub use primary_key::{estimate_key_bytes, KeyChoice, PrimaryKeySelector};

/// What refinement decided for one table.
#[derive(Debug, Clone, Serialize)]
pub struct Refinement {
    pub table: String,
    pub key: KeyChoice,
    pub indexes_recommended: bool,
    pub index_count: usize,
}

/// Translation and refinement for one target dialect.
#[derive(Debug, Clone, Copy)]
pub struct SchemaPlanner {
    translator: TypeTranslator,
    keys: PrimaryKeySelector,
}

impl SchemaPlanner {
    /// `naming` drives fallback string lengths; `target` drives key limits.
    pub fn new(naming: Dialect, target: Dialect) -> Self {
        Self {
            translator: TypeTranslator::new(naming),
            keys: PrimaryKeySelector::new(target),
        }
    }

    pub fn for_target(target: Dialect) -> Self {
        Self::new(target, target)
    }

    pub fn translator(&self) -> &TypeTranslator {
        &self.translator
    }

    /// Translate a reflected table. Discovered indexes are carried over
    /// unfiltered; [`SchemaPlanner::refine`] decides which survive.
    pub fn describe(&self, reflected: &ReflectedTable) -> TableDescriptor {
        let columns = reflected
            .columns
            .iter()
            .map(|c| self.describe_column(c))
            .collect();
        let mut table = TableDescriptor::new(reflected.name.clone(), columns);
        if reflected.primary_key.is_empty() {
            table.sync_primary_key();
        } else {
            table.set_primary_key(&reflected.primary_key);
        }
        table.foreign_keys = reflected.foreign_keys.clone();
        table.indexes = reflected.indexes.clone();
        table
    }

    fn describe_column(&self, col: &ReflectedColumn) -> ColumnDescriptor {
        let data_type = self.translator.translate(&col.native_type, &col.name);
        debug!("{} {} -> {}", col.name, col.native_type, data_type);
        ColumnDescriptor {
            name: col.name.clone(),
            data_type,
            nullable: col.nullable,
            primary_key: col.primary_key,
            autoincrement: col.autoincrement,
            default: col.default.as_deref().and_then(DefaultValue::parse_literal),
        }
    }

    /// Settle the primary key, then plan indexes against it.
    pub fn refine(&self, table: &mut TableDescriptor) -> Refinement {
        let key = self.keys.select(table);
        let discovered = std::mem::take(&mut table.indexes);
        let (indexes, source) = plan_indexes(table, discovered);
        table.indexes = indexes;
        Refinement {
            table: table.name.clone(),
            key,
            indexes_recommended: source == IndexSource::Recommended,
            index_count: table.indexes.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ForeignKeyRef, GenericType, IndexDescriptor};

    fn reflected() -> ReflectedTable {
        let mut id = ReflectedColumn::new("id", "bigint");
        id.nullable = false;
        id.primary_key = true;
        id.autoincrement = true;
        let mut email = ReflectedColumn::new("email", "character varying");
        email.default = Some("'none'::character varying".into());
        let mut created = ReflectedColumn::new("created_time", "timestamp without time zone");
        created.default = Some("now()".into());
        ReflectedTable {
            name: "t_users".into(),
            columns: vec![id, email, created, ReflectedColumn::new("bio", "text")],
            primary_key: vec!["id".into()],
            foreign_keys: vec![ForeignKeyRef::new("org_id", "t_orgs", "id")],
            indexes: vec![IndexDescriptor::new("ux_users_email", vec!["email".into()], true)],
        }
    }

    #[test]
    fn test_describe_translates_columns() {
        let planner = SchemaPlanner::for_target(Dialect::Mysql);
        let table = planner.describe(&reflected());
        assert_eq!(table.primary_key, vec!["id"]);
        assert_eq!(table.column("id").unwrap().data_type, GenericType::BigInteger);
        assert_eq!(table.column("email").unwrap().data_type, GenericType::String(320));
        assert_eq!(
            table.column("email").unwrap().default,
            Some(DefaultValue::Text("none".into()))
        );
        assert_eq!(table.column("created_time").unwrap().default, None);
        assert_eq!(table.column("bio").unwrap().data_type, GenericType::Text);
        assert_eq!(table.foreign_keys.len(), 1);
    }

    #[test]
    fn test_describe_keeps_constraint_key_order() {
        let planner = SchemaPlanner::for_target(Dialect::Postgres);
        let mut raw = reflected();
        raw.columns[1].primary_key = true;
        raw.primary_key = vec!["email".into(), "id".into()];
        let table = planner.describe(&raw);
        assert_eq!(table.primary_key, vec!["email", "id"]);
    }

    #[test]
    fn test_refine_keeps_key_and_discovered_indexes() {
        let planner = SchemaPlanner::for_target(Dialect::Mysql);
        let mut table = planner.describe(&reflected());
        let summary = planner.refine(&mut table);
        assert_eq!(summary.key, KeyChoice::Existing(vec!["id".into()]));
        assert!(!summary.indexes_recommended);
        assert_eq!(table.indexes[0].name, "ux_users_email");
        assert!(table.column("id").unwrap().autoincrement);
    }

    #[test]
    fn test_refine_synthesizes_key_and_indexes() {
        let planner = SchemaPlanner::for_target(Dialect::Postgres);
        let mut raw = reflected();
        raw.columns[0].primary_key = false;
        raw.primary_key.clear();
        raw.indexes.clear();
        let mut table = planner.describe(&raw);
        let summary = planner.refine(&mut table);
        assert_eq!(summary.key, KeyChoice::Single("id".into()));
        assert!(summary.indexes_recommended);
        assert!(table.column("id").unwrap().autoincrement);
        assert!(table.indexes.iter().any(|i| i.name == "idx_t_users_created_time"));
    }
}
