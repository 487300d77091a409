use super::{ParamKind, Params, QueryLibrary, Row};
use crate::error::QueryError;
use crate::record::NodeType;
use medgraph_api::GraphSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
}

const fn param(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec { name, kind }
}

/// A named query and the parameters it binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTemplate {
    pub name: &'static str,
    pub params: &'static [ParamSpec],
    pub description: &'static str,
}

/// Every query the library answers, in catalog order.
pub const CATALOG: &[QueryTemplate] = &[
    QueryTemplate {
        name: "exact-by-key",
        params: &[
            param("entity", ParamKind::NodeType),
            param("key", ParamKind::Text),
        ],
        description: "one node by its natural key, with its edges as uids",
    },
    QueryTemplate {
        name: "term-search",
        params: &[
            param("entity", ParamKind::NodeType),
            param("text", ParamKind::Text),
        ],
        description: "nodes of a type sharing a term with the text in any term-indexed field",
    },
    QueryTemplate {
        name: "range-filter",
        params: &[
            param("entity", ParamKind::NodeType),
            param("field", ParamKind::Text),
            param("min", ParamKind::Scalar),
        ],
        description: "nodes of a type whose field is at least min",
    },
    QueryTemplate {
        name: "disease-cohort",
        params: &[param("disease", ParamKind::Text)],
        description: "diagnoses matching the disease, each with its patients",
    },
    QueryTemplate {
        name: "paginated-cohort",
        params: &[
            param("disease", ParamKind::Text),
            param("min_age", ParamKind::Int),
            param("page", ParamKind::Int),
        ],
        description: "one page of 50 patients with the disease and at least min_age",
    },
    QueryTemplate {
        name: "doctor-treatments",
        params: &[param("license_id", ParamKind::Text)],
        description: "treatments a doctor applies and the diagnoses they are common for",
    },
    QueryTemplate {
        name: "patient-medications",
        params: &[param("patient_id", ParamKind::Text)],
        description: "medications a patient receives",
    },
    QueryTemplate {
        name: "recent-readings",
        params: &[
            param("patient_id", ParamKind::Text),
            param("count", ParamKind::Int),
        ],
        description: "a patient's most recent vital-sign readings, newest first",
    },
    QueryTemplate {
        name: "readings-in-range",
        params: &[
            param("patient_id", ParamKind::Text),
            param("start", ParamKind::DateTime),
            param("end", ParamKind::DateTime),
        ],
        description: "a patient's vital-sign readings taken between start and end",
    },
    QueryTemplate {
        name: "disease-counts",
        params: &[],
        description: "number of patients per diagnosis, most common first",
    },
    QueryTemplate {
        name: "visitors-of-patient",
        params: &[param("patient_id", ParamKind::Text)],
        description: "everyone who visited a patient",
    },
    QueryTemplate {
        name: "visitors-in-range",
        params: &[
            param("patient_id", ParamKind::Text),
            param("start", ParamKind::DateTime),
            param("end", ParamKind::DateTime),
        ],
        description: "a patient's visitors who arrived between start and end",
    },
    QueryTemplate {
        name: "doctor-search",
        params: &[param("text", ParamKind::Text)],
        description: "doctors by id, license or any term of their name",
    },
];

/// Looks up a catalog query by name.
pub fn prepare(name: &str) -> Result<PreparedQuery, QueryError> {
    CATALOG
        .iter()
        .find(|t| t.name == name)
        .map(|template| PreparedQuery { template })
        .ok_or_else(|| QueryError::UnknownQuery(name.to_string()))
}

#[derive(Debug, Clone, Copy)]
pub struct PreparedQuery {
    template: &'static QueryTemplate,
}

impl PreparedQuery {
    pub fn name(&self) -> &'static str {
        self.template.name
    }

    pub fn params(&self) -> &'static [ParamSpec] {
        self.template.params
    }

    /// Binds `name=value` text pairs, parsing each value by its declared kind.
    pub fn bind_text<'s>(
        &self,
        pairs: impl IntoIterator<Item = (&'s str, &'s str)>,
    ) -> Result<Params, QueryError> {
        let mut params = Params::new();
        for (name, raw) in pairs {
            let spec = self
                .template
                .params
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| {
                    QueryError::invalid(name, format!("not a parameter of `{}`", self.name()))
                })?;
            let value = spec.kind.parse(raw).ok_or_else(|| {
                QueryError::invalid(name, format!("cannot read `{raw}` as {:?}", spec.kind))
            })?;
            params.insert(name, value);
        }
        Ok(params)
    }

    pub fn execute<S: GraphSnapshot>(
        &self,
        snapshot: &S,
        params: &Params,
    ) -> Result<Vec<Row>, QueryError> {
        self.execute_on(&QueryLibrary::new(snapshot), params)
    }

    pub fn execute_on<S: GraphSnapshot>(
        &self,
        lib: &QueryLibrary<'_, S>,
        params: &Params,
    ) -> Result<Vec<Row>, QueryError> {
        let q = self.name();
        let rows = match q {
            "exact-by-key" => lib
                .exact_by_key(node_type(params, q)?, params.text(q, "key")?)?
                .into_iter()
                .collect(),
            "term-search" => lib.term_search(node_type(params, q)?, params.text(q, "text")?)?,
            "range-filter" => {
                let entity = node_type(params, q)?;
                let field = params.text(q, "field")?;
                let ty = lib
                    .snapshot
                    .schema()
                    .predicate(field)
                    .map(|d| d.ty)
                    .ok_or_else(|| {
                        QueryError::invalid("field", format!("{entity} has no field `{field}`"))
                    })?;
                let min = params.required(q, "min")?;
                let min = min.to_property(ty).ok_or_else(|| {
                    QueryError::invalid("min", format!("not a {} value", ty.keyword()))
                })?;
                lib.range_filter(entity, field, min)?
            }
            "disease-cohort" => lib.disease_cohort(params.text(q, "disease")?)?,
            "paginated-cohort" => lib.paginated_cohort(
                params.text(q, "disease")?,
                params.int(q, "min_age")?,
                params.int(q, "page")?,
            )?,
            "doctor-treatments" => lib.doctor_treatments(params.text(q, "license_id")?)?,
            "patient-medications" => lib.patient_medications(params.text(q, "patient_id")?)?,
            "recent-readings" => lib.recent_readings(
                params.text(q, "patient_id")?,
                params.int(q, "count")?,
            )?,
            "readings-in-range" => lib.readings_in_range(
                params.text(q, "patient_id")?,
                params.datetime(q, "start")?,
                params.datetime(q, "end")?,
            )?,
            "disease-counts" => lib.disease_counts()?,
            "visitors-of-patient" => lib.visitors_of_patient(params.text(q, "patient_id")?)?,
            "visitors-in-range" => lib.visitors_in_range(
                params.text(q, "patient_id")?,
                params.datetime(q, "start")?,
                params.datetime(q, "end")?,
            )?,
            "doctor-search" => lib.doctor_search(params.text(q, "text")?)?,
            other => return Err(QueryError::UnknownQuery(other.to_string())),
        };
        tracing::debug!(query = q, rows = rows.len(), "query executed");
        Ok(rows)
    }
}

fn node_type(params: &Params, query: &'static str) -> Result<NodeType, QueryError> {
    let raw = params.text(query, "entity")?;
    raw.parse()
        .map_err(|reason: String| QueryError::invalid("entity", reason))
}
