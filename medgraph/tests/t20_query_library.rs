use medgraph::query::QueryLibrary;
use medgraph::{
    CsvSource, EntityKind, GraphStore, Loader, MemGraph, MemorySource, NodeType, PAGE_SIZE,
    PropertyValue, QueryError, Resolver, Row, SchemaRegistry, Value, prepare,
};
use medgraph_api::parse_datetime;
use std::collections::BTreeSet;
use std::path::PathBuf;

fn loaded() -> (MemGraph, Resolver) {
    let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let store = MemGraph::in_memory();
    SchemaRegistry::hospital().unwrap().apply(&store).unwrap();
    let mut resolver = Resolver::new();
    Loader::new(&store, &mut resolver)
        .load(&CsvSource::new(fixtures))
        .unwrap();
    (store, resolver)
}

fn text<'r>(row: &'r Row, field: &str) -> &'r str {
    row.get(field).and_then(Value::as_str).unwrap()
}

fn nested<'r>(row: &'r Row, field: &str) -> &'r [Value] {
    row.get(field).and_then(Value::as_list).unwrap()
}

fn nested_text<'v>(item: &'v Value, field: &str) -> &'v str {
    item.as_map()
        .and_then(|m| m.get(field))
        .and_then(Value::as_str)
        .unwrap()
}

#[test]
fn t20_exact_by_key() {
    let (store, resolver) = loaded();
    let snap = store.snapshot();
    let lib = QueryLibrary::new(&snap);

    let row = lib.exact_by_key(NodeType::Patient, "P1").unwrap().unwrap();
    assert_eq!(text(&row, "patient_id"), "P1");
    assert_eq!(row.get("age"), Some(&Value::Int(45)));
    assert_eq!(
        row.get("uid").and_then(Value::as_uid),
        resolver.lookup(NodeType::Patient, "P1")
    );
    assert_eq!(
        row.get("assigned_to").and_then(Value::as_uid),
        resolver.lookup(NodeType::Doctor, "D1")
    );
    assert_eq!(nested(&row, "has_diagnosis").len(), 2);

    assert!(lib.exact_by_key(NodeType::Patient, "P404").unwrap().is_none());
    // the resolver short-circuits the store lookup
    let with = QueryLibrary::new(&snap).with_resolver(&resolver);
    assert_eq!(
        with.exact_by_key(NodeType::Doctor, "D2").unwrap().map(|r| r.get("name").cloned()),
        Some(Some(Value::String("Luis".into())))
    );
}

#[test]
fn t21_term_search_and_range_filter() {
    let (store, _) = loaded();
    let snap = store.snapshot();
    let lib = QueryLibrary::new(&snap);

    let ruiz: Vec<_> = lib
        .term_search(NodeType::Patient, "RUIZ")
        .unwrap()
        .iter()
        .map(|r| text(r, "patient_id").to_string())
        .collect();
    assert_eq!(ruiz, ["P1", "P2"]);

    let ana = lib.term_search(NodeType::Doctor, "ana").unwrap();
    assert_eq!(ana.len(), 1);
    assert_eq!(text(&ana[0], "doctor_id"), "D1");

    let adults: Vec<_> = lib
        .range_filter(NodeType::Patient, "age", PropertyValue::Int(40))
        .unwrap()
        .iter()
        .map(|r| text(r, "patient_id").to_string())
        .collect();
    assert_eq!(adults, ["P1", "P3"]);

    let err = lib
        .range_filter(NodeType::Patient, "dosage", PropertyValue::Int(1))
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidParam { ref param, .. } if param == "field"));
}

#[test]
fn t22_disease_cohorts() {
    let (store, _) = loaded();
    let snap = store.snapshot();
    let lib = QueryLibrary::new(&snap);

    let cohort = lib.disease_cohort("diabetes").unwrap();
    assert_eq!(cohort.len(), 1);
    assert_eq!(text(&cohort[0], "disease_name"), "Type 2 Diabetes");
    let ids: Vec<_> = nested(&cohort[0], "patients")
        .iter()
        .map(|p| nested_text(p, "patient_id"))
        .collect();
    assert_eq!(ids, ["P1", "P3", "P4"]);

    let page: Vec<_> = lib
        .paginated_cohort("diabetes", 18, 1)
        .unwrap()
        .iter()
        .map(|r| text(r, "patient_id").to_string())
        .collect();
    assert_eq!(page, ["P1", "P3"]);
    assert!(lib.paginated_cohort("diabetes", 18, 2).unwrap().is_empty());
    assert!(matches!(
        lib.paginated_cohort("diabetes", 18, 0),
        Err(QueryError::InvalidParam { .. })
    ));
}

#[test]
fn t23_doctor_treatments_nest_diagnoses() {
    let (store, _) = loaded();
    let snap = store.snapshot();
    let rows = QueryLibrary::new(&snap).doctor_treatments("DOC-100").unwrap();
    assert_eq!(rows.len(), 1);

    let treatments = nested(&rows[0], "applies_treatment");
    assert_eq!(treatments.len(), 2);
    assert_eq!(nested_text(&treatments[0], "treatment_name"), "Glucose control");
    let dx = treatments[0]
        .as_map()
        .and_then(|m| m.get("common_for_diagnosis"))
        .and_then(Value::as_list)
        .unwrap();
    assert_eq!(nested_text(&dx[0], "icd10_code"), "E11");
}

#[test]
fn t24_patient_children() {
    let (store, _) = loaded();
    let snap = store.snapshot();
    let lib = QueryLibrary::new(&snap);

    let meds = lib.patient_medications("P1").unwrap();
    let list = nested(&meds[0], "receives_medication");
    assert_eq!(nested_text(&list[0], "trade_name"), "Metformin");
    assert!(lib.patient_medications("P404").unwrap().is_empty());

    let recent = lib.recent_readings("P1", 2).unwrap();
    let ids: Vec<_> = nested(&recent[0], "has_vital_sign")
        .iter()
        .map(|r| nested_text(r, "reading_id"))
        .collect();
    assert_eq!(ids, ["R3", "R2"]);
    assert!(lib.recent_readings("P1", -1).is_err());

    let start = parse_datetime("2024-03-01").unwrap();
    let end = parse_datetime("2024-03-02T23:59:59Z").unwrap();
    let ranged = lib.readings_in_range("P1", start, end).unwrap();
    let ids: Vec<_> = nested(&ranged[0], "has_vital_sign")
        .iter()
        .map(|r| nested_text(r, "reading_id"))
        .collect();
    assert_eq!(ids, ["R1", "R2"]);

    assert_eq!(
        nested(&lib.visitors_of_patient("P1").unwrap()[0], "has_visitor").len(),
        2
    );
    let visits = lib.visitors_in_range("P1", start, end).unwrap();
    let names: Vec<_> = nested(&visits[0], "has_visitor")
        .iter()
        .map(|v| nested_text(v, "visitor_name"))
        .collect();
    assert_eq!(names, ["Maria Ruiz"]);
}

#[test]
fn t25_disease_counts_are_ranked() {
    let (store, _) = loaded();
    let snap = store.snapshot();
    let counts: Vec<_> = QueryLibrary::new(&snap)
        .disease_counts()
        .unwrap()
        .iter()
        .map(|r| {
            (
                text(r, "disease_name").to_string(),
                r.get("num_patients").and_then(Value::as_int).unwrap(),
            )
        })
        .collect();
    assert_eq!(
        counts,
        [
            ("Type 2 Diabetes".to_string(), 3),
            ("Hypertension".to_string(), 2),
            ("Influenza".to_string(), 0),
        ]
    );
}

#[test]
fn t26_doctor_search() {
    let (store, _) = loaded();
    let snap = store.snapshot();
    let lib = QueryLibrary::new(&snap);
    let ids = |text: &str| -> Vec<String> {
        lib.doctor_search(text)
            .unwrap()
            .iter()
            .map(|r| r.get("doctor_id").and_then(Value::as_str).unwrap().to_string())
            .collect()
    };
    assert_eq!(ids("DOC-200"), ["D2"]);
    assert_eq!(ids("D1"), ["D1"]);
    assert_eq!(ids("garcia"), ["D2"]);
    assert!(ids("nobody").is_empty());
}

#[test]
fn t27_catalog_by_name() {
    let (store, _) = loaded();
    let snap = store.snapshot();

    let q = prepare("patient-medications").unwrap();
    let params = q.bind_text([("patient_id", "P1")]).unwrap();
    let rows = q.execute(&snap, &params).unwrap();
    let json = serde_json::to_string(&rows[0]).unwrap();
    assert!(json.starts_with(r#"{"uid":"0x"#));
    assert!(json.contains(r#""trade_name":"Metformin""#));

    let q = prepare("range-filter").unwrap();
    let params = q
        .bind_text([("entity", "patient"), ("field", "age"), ("min", "40")])
        .unwrap();
    assert_eq!(q.execute(&snap, &params).unwrap().len(), 2);

    let q = prepare("recent-readings").unwrap();
    let params = q.bind_text([("patient_id", "P1")]).unwrap();
    assert!(matches!(
        q.execute(&snap, &params),
        Err(QueryError::MissingParam { param: "count", .. })
    ));

    // parameter text is a value, never query syntax
    let q = prepare("term-search").unwrap();
    let params = q
        .bind_text([("entity", "PATIENT"), ("text", "\") { uid } #")])
        .unwrap();
    assert!(q.execute(&snap, &params).unwrap().is_empty());
}

#[test]
fn t27_range_filter_on_a_text_field() {
    let (store, _) = loaded();
    let snap = store.snapshot();
    let q = prepare("range-filter").unwrap();
    let licenses = |min: &str| -> Vec<String> {
        let params = q
            .bind_text([("entity", "doctor"), ("field", "license_id"), ("min", min)])
            .unwrap();
        q.execute(&snap, &params)
            .unwrap()
            .iter()
            .map(|r| text(r, "license_id").to_string())
            .collect()
    };

    assert_eq!(licenses("DOC-150"), ["DOC-200"]);
    // numeric or date-like text is still compared as text
    assert_eq!(licenses("1.5"), ["DOC-100", "DOC-200"]);
    assert_eq!(licenses("2024-01-01"), ["DOC-100", "DOC-200"]);
    assert!(licenses("E").is_empty());

    let params = q
        .bind_text([("entity", "patient"), ("field", "age"), ("min", "1.5")])
        .unwrap();
    assert!(matches!(
        q.execute(&snap, &params),
        Err(QueryError::InvalidParam { ref param, .. }) if param == "min"
    ));
}

#[test]
fn t28_doctor_without_treatments() {
    let source = MemorySource::new()
        .with_rows(
            EntityKind::Doctors,
            &[&[("doctor_id", "D1"), ("license_id", "DOC-100"), ("name", "Ana")]],
        )
        .with_rows(
            EntityKind::Patients,
            &[&[("patient_id", "P1"), ("primary_doctor_id", "D1")]],
        );
    let store = MemGraph::in_memory();
    SchemaRegistry::hospital().unwrap().apply(&store).unwrap();
    let mut resolver = Resolver::new();
    Loader::new(&store, &mut resolver).load(&source).unwrap();

    let snap = store.snapshot();
    let lib = QueryLibrary::new(&snap);
    let doctors = lib.doctor_treatments("DOC-100").unwrap();
    assert_eq!(doctors.len(), 1);
    assert_eq!(text(&doctors[0], "name"), "Ana");
    assert!(nested(&doctors[0], "applies_treatment").is_empty());

    let patient = lib.exact_by_key(NodeType::Patient, "P1").unwrap().unwrap();
    assert_eq!(
        patient.get("assigned_to").and_then(Value::as_uid),
        doctors[0].get("uid").and_then(Value::as_uid)
    );
}

#[test]
fn t29_pages_are_disjoint_windows() {
    let ids: Vec<String> = (0..130).map(|i| format!("P{i:03}")).collect();
    let ages: Vec<String> = (0..130).map(|i| (10 + i % 30).to_string()).collect();
    let mut source = MemorySource::new().with_rows(
        EntityKind::Diagnoses,
        &[&[("diagnosis_id", "DX1"), ("disease_name", "Hypertension")]],
    );
    for (id, age) in ids.iter().zip(&ages) {
        source = source
            .with_rows(
                EntityKind::Patients,
                &[&[("patient_id", id.as_str()), ("age", age.as_str())]],
            )
            .with_rows(
                EntityKind::PatientDiagnoses,
                &[&[("patient_id", id.as_str()), ("diagnosis_id", "DX1")]],
            );
    }
    let store = MemGraph::in_memory();
    SchemaRegistry::hospital().unwrap().apply(&store).unwrap();
    let mut resolver = Resolver::new();
    Loader::new(&store, &mut resolver).load(&source).unwrap();

    let snap = store.snapshot();
    let lib = QueryLibrary::new(&snap);
    let page = |n| -> Vec<String> {
        lib.paginated_cohort("Hypertension", 20, n)
            .unwrap()
            .iter()
            .map(|r| text(r, "patient_id").to_string())
            .collect()
    };
    let eligible: Vec<&String> = ids
        .iter()
        .zip(&ages)
        .filter(|(_, a)| a.parse::<i64>().unwrap() >= 20)
        .map(|(id, _)| id)
        .collect();

    let (one, two, three) = (page(1), page(2), page(3));
    assert_eq!(one.len(), PAGE_SIZE);
    assert!(two.len() <= PAGE_SIZE);
    let first: BTreeSet<_> = one.iter().collect();
    assert!(two.iter().all(|p| !first.contains(p)));

    let all: Vec<&String> = one.iter().chain(&two).chain(&three).collect();
    assert_eq!(all, eligible);
    assert!(page(4).is_empty());
}
