//! End-to-end pipeline runs against in-memory engines.

use schemaport::{
    Catalog, ColumnDescriptor, Dialect, ForeignKeyRef, GenericType, ImportOptions, IndexDescriptor,
    MemoryTarget, Orchestrator, TableDescriptor,
};

fn table(name: &str, refs: &[&str]) -> TableDescriptor {
    let mut id = ColumnDescriptor::new("id", GenericType::Integer);
    id.primary_key = true;
    id.nullable = false;
    let mut columns = vec![id, ColumnDescriptor::new("label", GenericType::String(80))];
    for r in refs {
        columns.push(ColumnDescriptor::new(format!("{}_id", r), GenericType::Integer));
    }
    let mut t = TableDescriptor::new(name, columns);
    t.sync_primary_key();
    t.foreign_keys = refs
        .iter()
        .map(|r| ForeignKeyRef::new(format!("{}_id", r), *r, "id"))
        .collect();
    t
}

fn position(names: &[String], name: &str) -> usize {
    names.iter().position(|n| n == name).unwrap()
}

#[tokio::test]
async fn independent_tables_all_arrive() {
    let mut source = MemoryTarget::new(Dialect::Postgres);
    for name in ["t_alpha", "t_beta", "t_gamma"] {
        source.insert_table(table(name, &[]));
    }
    let mut target = MemoryTarget::new(Dialect::Sqlite);

    let report = Orchestrator::new(ImportOptions::default())
        .migrate(&mut source, &mut target)
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.tables_created, 3);
    let mut created = target.table_names();
    created.sort();
    assert_eq!(created, vec!["t_alpha", "t_beta", "t_gamma"]);
}

#[tokio::test]
async fn parent_is_created_before_child() {
    let mut source = MemoryTarget::new(Dialect::Mysql);
    source.insert_table(table("t_a_orders", &["t_users"]));
    source.insert_table(table("t_users", &[]));
    let mut target = MemoryTarget::new(Dialect::Postgres);

    let report = Orchestrator::new(ImportOptions::default())
        .migrate(&mut source, &mut target)
        .await
        .unwrap();

    assert_eq!(report.apply.created, vec!["t_users", "t_a_orders"]);
    let creates: Vec<&String> = target
        .statements()
        .iter()
        .filter(|s| s.starts_with("CREATE TABLE"))
        .collect();
    assert!(creates[0].contains("\"t_users\""));
    assert!(creates[1].contains("REFERENCES \"t_users\""));
}

#[tokio::test]
async fn mutual_references_are_kept_and_stable() {
    let mut source = MemoryTarget::new(Dialect::Postgres);
    source.insert_table(table("t_left", &["t_right"]));
    source.insert_table(table("t_right", &["t_left"]));
    source.insert_table(table("t_root", &[]));

    let orchestrator = Orchestrator::new(ImportOptions::default());
    let first = orchestrator.export(&mut source, Dialect::Mysql).await.unwrap();
    let second = orchestrator.export(&mut source, Dialect::Mysql).await.unwrap();

    let names = first.catalog.names();
    assert_eq!(names.len(), 3);
    assert_eq!(names[0], "t_root");
    assert!(names.contains(&"t_left".to_string()));
    assert!(names.contains(&"t_right".to_string()));
    assert_eq!(names, second.catalog.names());
}

#[tokio::test]
async fn failed_table_is_skipped_by_the_index_pass() {
    let mut catalog = Catalog::new(Dialect::Postgres, Dialect::Postgres, "t_");
    for name in ["t_first", "t_broken", "t_last"] {
        let mut t = table(name, &[]);
        t.indexes = vec![IndexDescriptor::new(
            format!("idx_{}_label", name),
            vec!["label".into()],
            false,
        )];
        catalog.insert(t);
    }
    let mut target = MemoryTarget::new(Dialect::Postgres);
    target.reject_statements_containing("CREATE TABLE IF NOT EXISTS \"t_broken\"");

    let mut options = ImportOptions::default();
    options.verify = false;
    let report = Orchestrator::new(options).import(&mut catalog, &mut target).await;

    assert!(!report.success);
    assert_eq!(report.failed_tables, vec!["t_broken"]);
    assert_eq!(report.apply.created, vec!["t_first", "t_last"]);
    assert_eq!(report.indexes_created, 2);
    assert!(!target
        .statements()
        .iter()
        .any(|s| s.contains("idx_t_broken_label")));
}

#[tokio::test]
async fn saved_catalog_imports_like_a_fresh_one() {
    let mut source = MemoryTarget::new(Dialect::Mysql);
    source.insert_table(table("t_orders", &["t_users"]));
    source.insert_table(table("t_users", &[]));

    let orchestrator = Orchestrator::new(ImportOptions::default());
    let export = orchestrator.export(&mut source, Dialect::Sqlite).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    export.catalog.save(&path).unwrap();
    let mut loaded = Catalog::load(&path).unwrap();
    assert_eq!(loaded, export.catalog);

    let mut target = MemoryTarget::new(Dialect::Sqlite);
    let report = orchestrator.import(&mut loaded, &mut target).await;
    assert!(report.success);
    assert!(report.verification.as_ref().unwrap().is_clean());
    assert!(position(&report.apply.created, "t_users") < position(&report.apply.created, "t_orders"));
}

#[tokio::test]
async fn composite_key_keeps_constraint_order() {
    let mut a = ColumnDescriptor::new("t_a", GenericType::Integer);
    a.primary_key = true;
    a.nullable = false;
    let mut b = ColumnDescriptor::new("t_b", GenericType::Integer);
    b.primary_key = true;
    b.nullable = false;
    let mut link = TableDescriptor::new("t_link", vec![a, b]);
    link.primary_key = vec!["t_b".into(), "t_a".into()];

    let mut source = MemoryTarget::new(Dialect::Postgres);
    source.insert_table(link);
    let mut target = MemoryTarget::new(Dialect::Postgres);

    let report = Orchestrator::new(ImportOptions::default())
        .migrate(&mut source, &mut target)
        .await
        .unwrap();

    assert!(report.success);
    assert!(report.verification.as_ref().unwrap().is_clean());
    assert_eq!(target.table("t_link").unwrap().primary_key, vec!["t_b", "t_a"]);
    assert!(target
        .statements()
        .iter()
        .any(|s| s.contains("PRIMARY KEY (\"t_b\", \"t_a\")")));
}

#[tokio::test]
async fn rerun_finds_everything_present() {
    let mut source = MemoryTarget::new(Dialect::Postgres);
    source.insert_table(table("t_users", &[]));
    let mut target = MemoryTarget::new(Dialect::Postgres);
    let orchestrator = Orchestrator::new(ImportOptions::default());

    orchestrator.migrate(&mut source, &mut target).await.unwrap();
    let again = orchestrator.migrate(&mut source, &mut target).await.unwrap();

    assert!(again.success);
    assert_eq!(again.tables_created, 0);
    assert_eq!(again.tables_present, 1);
}
