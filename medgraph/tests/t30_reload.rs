use medgraph::{
    CsvSource, EntityKind, GraphSnapshot, GraphStore, Loader, MemGraph, NodeType, Resolver,
    SchemaRegistry,
};
use std::path::PathBuf;
use tempfile::tempdir;

fn fixtures() -> CsvSource {
    CsvSource::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures"))
}

#[test]
fn t30_second_load_adds_nothing() {
    let store = MemGraph::in_memory();
    SchemaRegistry::hospital().unwrap().apply(&store).unwrap();

    let mut resolver = Resolver::new();
    Loader::new(&store, &mut resolver).load(&fixtures()).unwrap();
    let (nodes, edges) = {
        let s = store.snapshot();
        (s.node_count(None), s.edge_count(None))
    };

    // a fresh resolver has to rediscover every key from the store
    let mut resolver = Resolver::new();
    let summary = Loader::new(&store, &mut resolver).load(&fixtures()).unwrap();
    assert_eq!(summary.created(), 0);
    assert_eq!(summary.duplicates(), 20);
    assert_eq!(summary.get(EntityKind::PatientDiagnoses).unwrap().linked, 0);

    let s = store.snapshot();
    assert_eq!(s.node_count(None), nodes);
    assert_eq!(s.edge_count(None), edges);
}

#[test]
fn t31_reload_from_checkpoint() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hospital.mgraph");

    let first = {
        let store = MemGraph::open(&path).unwrap();
        let mut schema = SchemaRegistry::hospital().unwrap();
        assert!(schema.apply(&store).unwrap());
        let mut resolver = Resolver::new();
        Loader::new(&store, &mut resolver).load(&fixtures()).unwrap();
        let p1 = resolver.lookup(NodeType::Patient, "P1").unwrap();
        store.close().unwrap();
        p1
    };

    let store = MemGraph::open(&path).unwrap();
    // identical schema is a no-op
    SchemaRegistry::hospital().unwrap().apply(&store).unwrap();
    let mut resolver = Resolver::new();
    let summary = Loader::new(&store, &mut resolver).load(&fixtures()).unwrap();
    assert_eq!(summary.created(), 0);
    assert_eq!(resolver.lookup(NodeType::Patient, "P1"), Some(first));
}
