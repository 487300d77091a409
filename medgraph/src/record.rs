//! Record model: loosely-typed source rows, their coercion into typed records, and the
//! mutation shape each record produces.

use crate::error::SourceRecordError;
use chrono::{DateTime, Utc};
use medgraph_api::{NewNode, PropertyValue, parse_datetime};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Node types of the hospital graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeType {
    Doctor,
    Patient,
    Diagnosis,
    Medication,
    Treatment,
    VitalSignReading,
    Visitor,
}

impl NodeType {
    pub const ALL: [NodeType; 7] = [
        NodeType::Doctor,
        NodeType::Patient,
        NodeType::Diagnosis,
        NodeType::Medication,
        NodeType::Treatment,
        NodeType::VitalSignReading,
        NodeType::Visitor,
    ];

    /// Type name as declared in the store schema.
    pub fn type_name(self) -> &'static str {
        match self {
            NodeType::Doctor => "DOCTOR",
            NodeType::Patient => "PATIENT",
            NodeType::Diagnosis => "DIAGNOSIS",
            NodeType::Medication => "MEDICATION",
            NodeType::Treatment => "TREATMENT",
            NodeType::VitalSignReading => "VITALSIGNREADING",
            NodeType::Visitor => "VISITOR",
        }
    }

    /// The field other records use to reference this type.
    ///
    /// Readings and visitors are owned by a patient and are never referenced.
    pub fn natural_key(self) -> Option<&'static str> {
        match self {
            NodeType::Doctor => Some("doctor_id"),
            NodeType::Patient => Some("patient_id"),
            NodeType::Diagnosis => Some("diagnosis_id"),
            NodeType::Medication => Some("medication_id"),
            NodeType::Treatment => Some("treatment_id"),
            NodeType::VitalSignReading | NodeType::Visitor => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_uppercase();
        if matches!(wanted.as_str(), "VITALSIGN" | "READING") {
            return Ok(NodeType::VitalSignReading);
        }
        NodeType::ALL
            .into_iter()
            .find(|t| t.type_name() == wanted)
            .ok_or_else(|| format!("unknown node type `{s}`"))
    }
}

/// One kind of source input, in the order a standard load consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Doctors,
    Diagnoses,
    Medications,
    Treatments,
    Patients,
    VitalSigns,
    Visitors,
    DoctorTreatments,
    PatientDiagnoses,
    PatientMedications,
    PatientTreatments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindShape {
    Node(NodeType),
    Link(LinkShape),
}

/// Shape of a many-to-many relationship input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkShape {
    pub source: NodeType,
    pub source_column: &'static str,
    pub predicate: &'static str,
    pub target: NodeType,
    pub target_column: &'static str,
}

impl EntityKind {
    pub const ALL: [EntityKind; 11] = [
        EntityKind::Doctors,
        EntityKind::Diagnoses,
        EntityKind::Medications,
        EntityKind::Treatments,
        EntityKind::Patients,
        EntityKind::VitalSigns,
        EntityKind::Visitors,
        EntityKind::DoctorTreatments,
        EntityKind::PatientDiagnoses,
        EntityKind::PatientMedications,
        EntityKind::PatientTreatments,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Doctors => "doctors",
            EntityKind::Diagnoses => "diagnoses",
            EntityKind::Medications => "medications",
            EntityKind::Treatments => "treatments",
            EntityKind::Patients => "patients",
            EntityKind::VitalSigns => "vital_signs",
            EntityKind::Visitors => "visitors",
            EntityKind::DoctorTreatments => "doctor_treatments",
            EntityKind::PatientDiagnoses => "patient_diagnoses",
            EntityKind::PatientMedications => "patient_medications",
            EntityKind::PatientTreatments => "patient_treatments",
        }
    }

    /// Default CSV file name of this kind.
    pub fn file_name(self) -> String {
        format!("{}.csv", self.name())
    }

    /// What rows of this kind produce: nodes of one type, or edges between existing nodes.
    pub fn shape(self) -> KindShape {
        let link = |source, source_column, predicate, target, target_column| {
            KindShape::Link(LinkShape {
                source,
                source_column,
                predicate,
                target,
                target_column,
            })
        };
        match self {
            EntityKind::Doctors => KindShape::Node(NodeType::Doctor),
            EntityKind::Diagnoses => KindShape::Node(NodeType::Diagnosis),
            EntityKind::Medications => KindShape::Node(NodeType::Medication),
            EntityKind::Treatments => KindShape::Node(NodeType::Treatment),
            EntityKind::Patients => KindShape::Node(NodeType::Patient),
            EntityKind::VitalSigns => KindShape::Node(NodeType::VitalSignReading),
            EntityKind::Visitors => KindShape::Node(NodeType::Visitor),
            EntityKind::DoctorTreatments => link(
                NodeType::Doctor,
                "doctor_id",
                "applies_treatment",
                NodeType::Treatment,
                "treatment_id",
            ),
            EntityKind::PatientDiagnoses => link(
                NodeType::Patient,
                "patient_id",
                "has_diagnosis",
                NodeType::Diagnosis,
                "diagnosis_id",
            ),
            EntityKind::PatientMedications => link(
                NodeType::Patient,
                "patient_id",
                "receives_medication",
                NodeType::Medication,
                "medication_id",
            ),
            EntityKind::PatientTreatments => link(
                NodeType::Patient,
                "patient_id",
                "follows_treatment",
                NodeType::Treatment,
                "treatment_id",
            ),
        }
    }

    /// The node type created by rows of this kind; `None` for relationship inputs.
    pub fn node_type(self) -> Option<NodeType> {
        match self.shape() {
            KindShape::Node(t) => Some(t),
            KindShape::Link(_) => None,
        }
    }

    /// Kinds whose nodes must be committed before rows of this kind can link to them.
    pub fn depends_on(self) -> &'static [EntityKind] {
        use EntityKind::*;
        match self {
            Doctors | Diagnoses | Medications => &[],
            Treatments => &[Diagnoses, Medications],
            Patients => &[Doctors],
            VitalSigns | Visitors => &[Patients],
            DoctorTreatments => &[Doctors, Treatments],
            PatientDiagnoses => &[Patients, Diagnoses],
            PatientMedications => &[Patients, Medications],
            PatientTreatments => &[Patients, Treatments],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_end_matches(".csv");
        EntityKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown entity kind `{s}`"))
    }
}

/// A source row: column name to raw text, with its 1-based line for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub line: u64,
    pub fields: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new(line: u64) -> Self {
        Self {
            line,
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    /// Trimmed value of `column`; blank cells read as absent.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Doctor {
    pub doctor_id: String,
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub specialty: Option<String>,
    pub email: Option<String>,
    pub license_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub patient_id: String,
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i64>,
    pub genre: Option<String>,
    pub telephone: Option<String>,
    pub email: Option<String>,
    pub allergies: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub primary_doctor_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
    pub diagnosis_id: String,
    pub disease_name: Option<String>,
    pub icd10_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Medication {
    pub medication_id: String,
    pub trade_name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Treatment {
    pub treatment_id: String,
    pub treatment_name: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub diagnosis_id: Option<String>,
    pub medication_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VitalSign {
    pub patient_id: String,
    pub reading_id: Option<String>,
    pub kind: Option<String>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    pub patient_id: String,
    pub visitor_id: Option<String>,
    pub visitor_name: Option<String>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub exit_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub shape: LinkShape,
    pub source_key: String,
    pub target_key: String,
}

/// A coerced source row.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Doctor(Doctor),
    Patient(Patient),
    Diagnosis(Diagnosis),
    Medication(Medication),
    Treatment(Treatment),
    VitalSign(VitalSign),
    Visitor(Visit),
    Link(Link),
}

/// A natural key of a given node type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyRef {
    pub node_type: NodeType,
    pub key: String,
}

/// An edge to a node known only by its natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub predicate: &'static str,
    pub target: KeyRef,
}

/// What a record turns into once its references are resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Planned {
    /// A top-level node carrying natural key `key`, plus optional edges.
    Create {
        key: KeyRef,
        node: NewNode,
        references: Vec<Reference>,
    },
    /// A node owned by `owner`, created together with the owning edge.
    Attach { owner: Reference, node: NewNode },
    /// An edge between two existing nodes.
    Link {
        source: KeyRef,
        predicate: &'static str,
        target: KeyRef,
    },
}

struct Fields<'a> {
    kind: EntityKind,
    raw: &'a RawRecord,
}

impl Fields<'_> {
    fn required(&self, column: &str) -> Result<String, SourceRecordError> {
        self.raw
            .get(column)
            .map(str::to_string)
            .ok_or_else(|| SourceRecordError {
                entity: self.kind,
                line: self.raw.line,
                reason: format!("missing required `{column}`"),
            })
    }

    fn text(&self, column: &str) -> Option<String> {
        self.raw.get(column).map(str::to_string)
    }

    fn parsed<T>(&self, column: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let raw = self.raw.get(column)?;
        let value = parse(raw);
        if value.is_none() {
            tracing::warn!(
                entity = %self.kind,
                line = self.raw.line,
                column,
                value = raw,
                "dropping field that failed to coerce"
            );
        }
        value
    }

    fn int(&self, column: &str) -> Option<i64> {
        self.parsed(column, |s| s.parse().ok())
    }

    fn float(&self, column: &str) -> Option<f64> {
        self.parsed(column, |s| s.parse::<f64>().ok().filter(|f| f.is_finite()))
    }

    fn datetime(&self, column: &str) -> Option<DateTime<Utc>> {
        self.parsed(column, parse_datetime)
    }
}

impl Record {
    /// Coerces a raw row of `kind`.
    ///
    /// Fails only when a required key is missing; other fields that do not coerce are
    /// dropped with a warning.
    pub fn coerce(kind: EntityKind, raw: &RawRecord) -> Result<Record, SourceRecordError> {
        let f = Fields { kind, raw };
        let node_type = match kind.shape() {
            KindShape::Node(t) => t,
            KindShape::Link(shape) => {
                return Ok(Record::Link(Link {
                    shape,
                    source_key: f.required(shape.source_column)?,
                    target_key: f.required(shape.target_column)?,
                }));
            }
        };
        Ok(match node_type {
            NodeType::Doctor => Record::Doctor(Doctor {
                doctor_id: f.required("doctor_id")?,
                name: f.text("name"),
                last_name: f.text("last_name"),
                specialty: f.text("specialty"),
                email: f.text("email"),
                license_id: f.text("license_id"),
            }),
            NodeType::Patient => Record::Patient(Patient {
                patient_id: f.required("patient_id")?,
                name: f.text("name"),
                last_name: f.text("last_name"),
                age: f.int("age"),
                genre: f.text("genre"),
                telephone: f.text("telephone"),
                email: f.text("email"),
                allergies: f.text("allergies"),
                height: f.float("height"),
                weight: f.float("weight"),
                primary_doctor_id: f.text("primary_doctor_id"),
            }),
            NodeType::Diagnosis => Record::Diagnosis(Diagnosis {
                diagnosis_id: f.required("diagnosis_id")?,
                disease_name: f.text("disease_name"),
                icd10_code: f.text("icd10_code"),
            }),
            NodeType::Medication => Record::Medication(Medication {
                medication_id: f.required("medication_id")?,
                trade_name: f.text("trade_name"),
                dosage: f.text("dosage"),
                frequency: f.text("frequency"),
            }),
            NodeType::Treatment => Record::Treatment(Treatment {
                treatment_id: f.required("treatment_id")?,
                treatment_name: f.text("treatment_name"),
                start_date: f.datetime("start_date"),
                end_date: f.datetime("end_date"),
                diagnosis_id: f.text("diagnosis_id"),
                medication_id: f.text("medication_id"),
            }),
            NodeType::VitalSignReading => Record::VitalSign(VitalSign {
                patient_id: f.required("patient_id")?,
                reading_id: f.text("reading_id"),
                kind: f.text("type"),
                value: f.float("value"),
                unit: f.text("unit"),
                timestamp: f.datetime("timestamp"),
            }),
            NodeType::Visitor => Record::Visitor(Visit {
                patient_id: f.required("patient_id")?,
                visitor_id: f.text("visitor_id"),
                visitor_name: f.text("visitor_name"),
                arrival_time: f.datetime("arrival_time"),
                exit_time: f.datetime("exit_time"),
            }),
        })
    }

    pub fn plan(&self) -> Planned {
        match self {
            Record::Doctor(d) => {
                let mut node = NewNode::new(NodeType::Doctor.type_name());
                put_str(&mut node, "doctor_id", Some(&d.doctor_id));
                put_str(&mut node, "name", d.name.as_ref());
                put_str(&mut node, "last_name", d.last_name.as_ref());
                put_str(&mut node, "specialty", d.specialty.as_ref());
                put_str(&mut node, "email", d.email.as_ref());
                put_str(&mut node, "license_id", d.license_id.as_ref());
                create(NodeType::Doctor, &d.doctor_id, node, Vec::new())
            }
            Record::Patient(p) => {
                let mut node = NewNode::new(NodeType::Patient.type_name());
                put_str(&mut node, "patient_id", Some(&p.patient_id));
                put_str(&mut node, "name", p.name.as_ref());
                put_str(&mut node, "last_name", p.last_name.as_ref());
                put(&mut node, "age", p.age.map(PropertyValue::Int));
                put_str(&mut node, "genre", p.genre.as_ref());
                put_str(&mut node, "telephone", p.telephone.as_ref());
                put_str(&mut node, "email", p.email.as_ref());
                put_str(&mut node, "allergies", p.allergies.as_ref());
                put(&mut node, "height", p.height.map(PropertyValue::Float));
                put(&mut node, "weight", p.weight.map(PropertyValue::Float));
                let refs = reference("assigned_to", NodeType::Doctor, &p.primary_doctor_id);
                create(NodeType::Patient, &p.patient_id, node, refs)
            }
            Record::Diagnosis(d) => {
                let mut node = NewNode::new(NodeType::Diagnosis.type_name());
                put_str(&mut node, "diagnosis_id", Some(&d.diagnosis_id));
                put_str(&mut node, "disease_name", d.disease_name.as_ref());
                put_str(&mut node, "icd10_code", d.icd10_code.as_ref());
                create(NodeType::Diagnosis, &d.diagnosis_id, node, Vec::new())
            }
            Record::Medication(m) => {
                let mut node = NewNode::new(NodeType::Medication.type_name());
                put_str(&mut node, "medication_id", Some(&m.medication_id));
                put_str(&mut node, "trade_name", m.trade_name.as_ref());
                put_str(&mut node, "dosage", m.dosage.as_ref());
                put_str(&mut node, "frequency", m.frequency.as_ref());
                create(NodeType::Medication, &m.medication_id, node, Vec::new())
            }
            Record::Treatment(t) => {
                let mut node = NewNode::new(NodeType::Treatment.type_name());
                put_str(&mut node, "treatment_id", Some(&t.treatment_id));
                put_str(&mut node, "treatment_name", t.treatment_name.as_ref());
                put(&mut node, "start_date", t.start_date.map(PropertyValue::DateTime));
                put(&mut node, "end_date", t.end_date.map(PropertyValue::DateTime));
                let mut refs =
                    reference("common_for_diagnosis", NodeType::Diagnosis, &t.diagnosis_id);
                refs.extend(reference(
                    "contains_medication",
                    NodeType::Medication,
                    &t.medication_id,
                ));
                create(NodeType::Treatment, &t.treatment_id, node, refs)
            }
            Record::VitalSign(v) => {
                let mut node = NewNode::new(NodeType::VitalSignReading.type_name());
                put_str(&mut node, "reading_id", v.reading_id.as_ref());
                put_str(&mut node, "type", v.kind.as_ref());
                put(&mut node, "value", v.value.map(PropertyValue::Float));
                put_str(&mut node, "unit", v.unit.as_ref());
                put(&mut node, "timestamp", v.timestamp.map(PropertyValue::DateTime));
                Planned::Attach {
                    owner: owner("has_vital_sign", &v.patient_id),
                    node,
                }
            }
            Record::Visitor(v) => {
                let mut node = NewNode::new(NodeType::Visitor.type_name());
                put_str(&mut node, "visitor_id", v.visitor_id.as_ref());
                put_str(&mut node, "visitor_name", v.visitor_name.as_ref());
                put(&mut node, "arrival_time", v.arrival_time.map(PropertyValue::DateTime));
                put(&mut node, "exit_time", v.exit_time.map(PropertyValue::DateTime));
                Planned::Attach {
                    owner: owner("has_visitor", &v.patient_id),
                    node,
                }
            }
            Record::Link(l) => Planned::Link {
                source: KeyRef {
                    node_type: l.shape.source,
                    key: l.source_key.clone(),
                },
                predicate: l.shape.predicate,
                target: KeyRef {
                    node_type: l.shape.target,
                    key: l.target_key.clone(),
                },
            },
        }
    }
}

fn put(node: &mut NewNode, predicate: &str, value: Option<PropertyValue>) {
    if let Some(v) = value {
        node.set(predicate, v);
    }
}

fn put_str(node: &mut NewNode, predicate: &str, value: Option<&String>) {
    put(node, predicate, value.cloned().map(PropertyValue::String));
}

fn create(node_type: NodeType, key: &str, node: NewNode, references: Vec<Reference>) -> Planned {
    Planned::Create {
        key: KeyRef {
            node_type,
            key: key.to_string(),
        },
        node,
        references,
    }
}

fn reference(predicate: &'static str, target: NodeType, key: &Option<String>) -> Vec<Reference> {
    key.iter()
        .map(|k| Reference {
            predicate,
            target: KeyRef {
                node_type: target,
                key: k.clone(),
            },
        })
        .collect()
}

fn owner(predicate: &'static str, patient_id: &str) -> Reference {
    Reference {
        predicate,
        target: KeyRef {
            node_type: NodeType::Patient,
            key: patient_id.to_string(),
        },
    }
}
