use medgraph::query::QueryLibrary;
use medgraph::{
    EntityKind, GraphSnapshot, GraphStore, Loader, MemGraph, MemorySource, NodeType, Resolver,
    SchemaRegistry, Value,
};
use proptest::prelude::*;

const DIAGNOSES: usize = 4;

fn source(patients: usize, links: &[(usize, usize)]) -> MemorySource {
    let mut src = MemorySource::new();
    for d in 0..DIAGNOSES {
        let id = format!("DX{d}");
        let name = format!("Disease {d}");
        src = src.with_rows(
            EntityKind::Diagnoses,
            &[&[("diagnosis_id", id.as_str()), ("disease_name", name.as_str())]],
        );
    }
    for p in 0..patients {
        let id = format!("P{p}");
        src = src.with_rows(EntityKind::Patients, &[&[("patient_id", id.as_str())]]);
    }
    for (p, d) in links {
        let (p, d) = (format!("P{p}"), format!("DX{d}"));
        src = src.with_rows(
            EntityKind::PatientDiagnoses,
            &[&[("patient_id", p.as_str()), ("diagnosis_id", d.as_str())]],
        );
    }
    src
}

fn load(src: &MemorySource) -> (MemGraph, Resolver) {
    let store = MemGraph::in_memory();
    SchemaRegistry::hospital().unwrap().apply(&store).unwrap();
    let mut resolver = Resolver::new();
    Loader::new(&store, &mut resolver).load(src).unwrap();
    (store, resolver)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn disease_counts_sum_to_the_diagnosis_edges(
        patients in 1usize..12,
        links in prop::collection::vec((0usize..12, 0usize..DIAGNOSES), 0..40),
    ) {
        let links: Vec<_> = links.into_iter().filter(|(p, _)| *p < patients).collect();
        let (store, _) = load(&source(patients, &links));
        let snap = store.snapshot();

        let rows = QueryLibrary::new(&snap).disease_counts().unwrap();
        prop_assert_eq!(rows.len(), DIAGNOSES);
        let total: i64 = rows
            .iter()
            .map(|r| r.get("num_patients").and_then(Value::as_int).unwrap())
            .sum();
        prop_assert_eq!(total as u64, snap.edge_count(Some("has_diagnosis")));

        let counts: Vec<i64> = rows
            .iter()
            .map(|r| r.get("num_patients").and_then(Value::as_int).unwrap())
            .collect();
        prop_assert!(counts.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn reloading_keeps_every_identifier(
        patients in 1usize..10,
        links in prop::collection::vec((0usize..10, 0usize..DIAGNOSES), 0..20),
    ) {
        let links: Vec<_> = links.into_iter().filter(|(p, _)| *p < patients).collect();
        let src = source(patients, &links);
        let (store, first) = load(&src);

        let mut second = Resolver::new();
        let summary = Loader::new(&store, &mut second).load(&src).unwrap();
        prop_assert_eq!(summary.created(), 0);
        for p in 0..patients {
            let key = format!("P{p}");
            prop_assert_eq!(
                first.lookup(NodeType::Patient, &key),
                second.lookup(NodeType::Patient, &key)
            );
        }
        prop_assert_eq!(first.len(), second.len());
    }
}
