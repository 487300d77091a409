use crate::value::PropertyValue;
use crate::{NodeId, NodeRecord};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Root function selecting the candidate node set of a [`NodeQuery`].
///
/// Every variant except `Type` and `Uids` must be backed by an index on `field`.
#[derive(Debug, Clone, PartialEq)]
pub enum RootFunc {
    Type(String),
    Eq { field: String, value: PropertyValue },
    AnyOfTerms { field: String, text: String },
    Ge { field: String, value: PropertyValue },
    Le { field: String, value: PropertyValue },
    Between {
        field: String,
        low: PropertyValue,
        high: PropertyValue,
    },
    Uids(Vec<NodeId>),
}

impl RootFunc {
    /// The same predicate expressed as an unindexed filter.
    pub fn as_filter(&self) -> Option<Filter> {
        Some(match self {
            RootFunc::Type(t) => Filter::Type(t.clone()),
            RootFunc::Eq { field, value } => Filter::Eq {
                field: field.clone(),
                value: value.clone(),
            },
            RootFunc::AnyOfTerms { field, text } => Filter::AnyOfTerms {
                field: field.clone(),
                text: text.clone(),
            },
            RootFunc::Ge { field, value } => Filter::Ge {
                field: field.clone(),
                value: value.clone(),
            },
            RootFunc::Le { field, value } => Filter::Le {
                field: field.clone(),
                value: value.clone(),
            },
            RootFunc::Between { field, low, high } => Filter::Between {
                field: field.clone(),
                low: low.clone(),
                high: high.clone(),
            },
            RootFunc::Uids(_) => return None,
        })
    }
}

/// Predicate evaluated on candidate nodes without index support.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Type(String),
    Eq { field: String, value: PropertyValue },
    AnyOfTerms { field: String, text: String },
    Ge { field: String, value: PropertyValue },
    Le { field: String, value: PropertyValue },
    Between {
        field: String,
        low: PropertyValue,
        high: PropertyValue,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn matches(&self, node: &NodeRecord) -> bool {
        match self {
            Filter::Type(t) => node.type_name == *t,
            Filter::Eq { field, value } => node
                .get(field)
                .and_then(|v| v.compare(value))
                .is_some_and(Ordering::is_eq),
            Filter::AnyOfTerms { field, text } => {
                let wanted = terms(text);
                match node.get(field).and_then(PropertyValue::as_str) {
                    Some(s) => terms(s).iter().any(|t| wanted.contains(t)),
                    None => false,
                }
            }
            Filter::Ge { field, value } => node
                .get(field)
                .and_then(|v| v.compare(value))
                .is_some_and(Ordering::is_ge),
            Filter::Le { field, value } => node
                .get(field)
                .and_then(|v| v.compare(value))
                .is_some_and(Ordering::is_le),
            Filter::Between { field, low, high } => match node.get(field) {
                Some(v) => {
                    v.compare(low).is_some_and(Ordering::is_ge)
                        && v.compare(high).is_some_and(Ordering::is_le)
                }
                None => false,
            },
            Filter::And(parts) => parts.iter().all(|f| f.matches(node)),
            Filter::Or(parts) => parts.iter().any(|f| f.matches(node)),
            Filter::Not(inner) => !inner.matches(node),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub descending: bool,
}

/// Offset + limit window, applied after filtering and ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub first: Option<usize>,
    pub offset: usize,
}

impl Page {
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let it = items.into_iter().skip(self.offset);
        match self.first {
            Some(n) => it.take(n).collect(),
            None => it.collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeQuery {
    pub root: RootFunc,
    pub filter: Option<Filter>,
    pub order: Option<Order>,
    pub page: Page,
}

impl NodeQuery {
    pub fn new(root: RootFunc) -> Self {
        Self {
            root,
            filter: None,
            order: None,
            page: Page::default(),
        }
    }

    /// Nodes of `type_name` whose `field` equals `value`.
    pub fn eq(type_name: &str, field: &str, value: PropertyValue) -> Self {
        Self::new(RootFunc::Eq {
            field: field.to_string(),
            value,
        })
        .filter(Filter::Type(type_name.to_string()))
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => Filter::And(vec![existing, filter]),
            None => filter,
        });
        self
    }

    pub fn order_by(mut self, field: &str, descending: bool) -> Self {
        self.order = Some(Order {
            field: field.to_string(),
            descending,
        });
        self
    }

    pub fn first(mut self, n: usize) -> Self {
        self.page.first = Some(n);
        self
    }

    pub fn offset(mut self, n: usize) -> Self {
        self.page.offset = n;
        self
    }
}

/// Splits text into lowercased alphanumeric terms.
pub fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Sorts records by `order.field`; records missing the field sort last in either
/// direction, ties keep id order.
pub fn sort_records(records: &mut [&NodeRecord], order: &Order) {
    records.sort_by(|a, b| {
        let ord = match (a.get(&order.field), b.get(&order.field)) {
            (Some(x), Some(y)) => {
                let o = x.compare(y).unwrap_or(Ordering::Equal);
                if order.descending { o.reverse() } else { o }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        ord.then(a.id.cmp(&b.id))
    });
}
