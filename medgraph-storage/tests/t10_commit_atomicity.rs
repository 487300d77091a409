use medgraph_api::{
    Applied, GraphSnapshot, GraphStore, IndexKind, Mutation, NewNode, NodeId, NodeQuery,
    PredicateDef, PropertyValue, RootFunc, ScalarType, SchemaDef, StoreError,
};
use medgraph_storage::MemGraph;

fn schema() -> SchemaDef {
    let mut s = SchemaDef::new();
    s.add_predicate(
        PredicateDef::new("patient_id", ScalarType::String)
            .index(IndexKind::Exact)
            .unique(),
    )
    .unwrap();
    s.add_predicate(PredicateDef::new("name", ScalarType::String).index(IndexKind::Term))
        .unwrap();
    s.add_predicate(PredicateDef::new("age", ScalarType::Int).index(IndexKind::Int))
        .unwrap();
    s.add_predicate(PredicateDef::edge("has_diagnosis").list().reverse().count())
        .unwrap();
    s.add_predicate(PredicateDef::edge("receives_medication").list())
        .unwrap();
    s.add_predicate(
        PredicateDef::new("icd10_code", ScalarType::String)
            .index(IndexKind::Exact)
            .unique(),
    )
    .unwrap();
    s.add_type(
        "PATIENT",
        &["patient_id", "name", "age", "has_diagnosis", "receives_medication"],
    );
    s.add_type("DIAGNOSIS", &["icd10_code"]);
    s
}

fn patient(id: &str, name: &str, age: i64) -> NewNode {
    NewNode::new("PATIENT")
        .with("patient_id", PropertyValue::String(id.into()))
        .with("name", PropertyValue::String(name.into()))
        .with("age", PropertyValue::Int(age))
}

fn created(a: &Applied) -> NodeId {
    match a {
        Applied::Created(id) => *id,
        other => panic!("expected Created, got {other:?}"),
    }
}

#[test]
fn failed_batch_leaves_no_trace() {
    let g = MemGraph::in_memory();
    g.alter(&schema()).unwrap();

    let bad = NewNode::new("PATIENT").with("age", PropertyValue::String("old".into()));
    let err = g
        .commit(vec![
            Mutation::Create(patient("P1", "Ana Diaz", 30)),
            Mutation::Create(bad),
        ])
        .unwrap_err();
    assert!(matches!(err, StoreError::TypeMismatch { .. }));

    let snap = g.snapshot();
    assert_eq!(snap.node_count(None), 0);
    let hits = snap
        .find(&NodeQuery::eq(
            "PATIENT",
            "patient_id",
            PropertyValue::String("P1".into()),
        ))
        .unwrap();
    assert!(hits.is_empty());
}

#[test]
fn snapshot_is_isolated_from_later_commits() {
    let g = MemGraph::in_memory();
    g.alter(&schema()).unwrap();
    g.commit(vec![Mutation::Create(patient("P1", "Ana Diaz", 30))])
        .unwrap();
    let before = g.snapshot();
    g.commit(vec![Mutation::Create(patient("P2", "Luis Mora", 41))])
        .unwrap();
    assert_eq!(before.node_count(Some("PATIENT")), 1);
    assert_eq!(g.snapshot().node_count(Some("PATIENT")), 2);
}

#[test]
fn reverse_edges_require_the_directive() {
    let g = MemGraph::in_memory();
    g.alter(&schema()).unwrap();
    let report = g
        .commit(vec![Mutation::Create(
            NewNode::new("DIAGNOSIS").with("icd10_code", PropertyValue::String("I10".into())),
        )])
        .unwrap();
    let dx = created(&report.applied[0]);

    let mut p = patient("P1", "Ana Diaz", 30);
    p.link("has_diagnosis", dx);
    let report = g.commit(vec![Mutation::Create(p)]).unwrap();
    let pid = created(&report.applied[0]);

    let snap = g.snapshot();
    assert_eq!(snap.reverse(dx, "has_diagnosis").unwrap(), vec![pid]);
    assert_eq!(snap.count_reverse(dx, "has_diagnosis").unwrap(), 1);
    assert!(matches!(
        snap.reverse(dx, "receives_medication"),
        Err(StoreError::ReverseNotIndexed(_))
    ));
}

#[test]
fn root_functions_need_matching_indexes() {
    let g = MemGraph::in_memory();
    g.alter(&schema()).unwrap();
    g.commit(vec![
        Mutation::Create(patient("P1", "Ana Diaz", 30)),
        Mutation::Create(patient("P2", "Luis Diaz", 64)),
        Mutation::Create(patient("P3", "Marta Gil", 18)),
    ])
    .unwrap();
    let snap = g.snapshot();

    let by_term = snap
        .find(&NodeQuery::new(RootFunc::AnyOfTerms {
            field: "name".into(),
            text: "diaz".into(),
        }))
        .unwrap();
    assert_eq!(by_term.len(), 2);

    let err = snap
        .find(&NodeQuery::new(RootFunc::Eq {
            field: "name".into(),
            value: PropertyValue::String("Ana Diaz".into()),
        }))
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingIndex { .. }));

    let adults = snap
        .find(
            &NodeQuery::new(RootFunc::Between {
                field: "age".into(),
                low: PropertyValue::Int(20),
                high: PropertyValue::Int(45),
            })
            .order_by("age", true),
        )
        .unwrap();
    assert_eq!(adults.len(), 1);

    let paged = snap
        .find(&NodeQuery::new(RootFunc::Type("PATIENT".into())).first(2).offset(2))
        .unwrap();
    assert_eq!(paged.len(), 1);
}

#[test]
fn duplicate_within_one_batch_is_collapsed() {
    let g = MemGraph::in_memory();
    g.alter(&schema()).unwrap();
    let report = g
        .commit(vec![
            Mutation::Create(patient("P1", "Ana Diaz", 30)),
            Mutation::Create(patient("P1", "Ana Diaz", 30)),
        ])
        .unwrap();
    assert_eq!(report.created(), 1);
    assert_eq!(report.duplicates(), 1);
}
