//! Reconciliation query encoding.
//!
//! A reconciliation endpoint takes either a single query object in the
//! `query` parameter or a batch of them, keyed `q0, q1, ...`, in the
//! `queries` parameter. Both are JSON, URL-escaped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default number of candidates asked for per query.
pub const DEFAULT_LIMIT: u32 = 3;

/// How strictly candidates must match the requested type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeStrict {
    #[default]
    Any,
    All,
    Should,
}

impl TypeStrict {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeStrict::Any => "any",
            TypeStrict::All => "all",
            TypeStrict::Should => "should",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "any" => Some(TypeStrict::Any),
            "all" => Some(TypeStrict::All),
            "should" => Some(TypeStrict::Should),
            _ => None,
        }
    }
}

/// A property constraint: property id and expected value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub pid: String,
    pub v: Value,
}

/// Options applied to every label query.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOptions {
    pub limit: u32,
    pub type_strict: TypeStrict,
    /// Restrict candidates to this type.
    pub entity_type: Option<String>,
    pub properties: Option<Vec<PropertyValue>>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            type_strict: TypeStrict::Any,
            entity_type: None,
            properties: None,
        }
    }
}

impl ReconcileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn type_strict(mut self, type_strict: TypeStrict) -> Self {
        self.type_strict = type_strict;
        self
    }

    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn properties(mut self, properties: Vec<PropertyValue>) -> Self {
        self.properties = Some(properties);
        self
    }
}

/// What to reconcile.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileQuery {
    /// One label.
    Label(String),
    /// Several labels, sent as one batch.
    Labels(Vec<String>),
    /// A query object or batch built by the caller. Forwarded untouched.
    Prebuilt(Map<String, Value>),
}

impl From<&str> for ReconcileQuery {
    fn from(label: &str) -> Self {
        ReconcileQuery::Label(label.to_string())
    }
}

impl From<String> for ReconcileQuery {
    fn from(label: String) -> Self {
        ReconcileQuery::Label(label)
    }
}

impl From<Vec<String>> for ReconcileQuery {
    fn from(labels: Vec<String>) -> Self {
        ReconcileQuery::Labels(labels)
    }
}

impl From<Vec<&str>> for ReconcileQuery {
    fn from(labels: Vec<&str>) -> Self {
        ReconcileQuery::Labels(labels.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ReconcileQuery {
    fn from(labels: [&str; N]) -> Self {
        ReconcileQuery::Labels(labels.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Map<String, Value>> for ReconcileQuery {
    fn from(query: Map<String, Value>) -> Self {
        ReconcileQuery::Prebuilt(query)
    }
}

/// Request parameter a payload is sent in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileParam {
    Query,
    Queries,
}

impl ReconcileParam {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileParam::Query => "query",
            ReconcileParam::Queries => "queries",
        }
    }
}

/// Encoded reconciliation request: parameter name plus JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileRequest {
    pub param: ReconcileParam,
    pub payload: Value,
}

impl ReconcileRequest {
    /// `param=<json>` form-encoded, ready to append after `?`.
    pub fn query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair(self.param.as_str(), &self.payload.to_string())
            .finish()
    }
}

fn label_query(label: &str, options: &ReconcileOptions) -> Value {
    let mut query = Map::new();
    query.insert("query".into(), Value::from(label));
    query.insert("limit".into(), Value::from(options.limit));
    query.insert("type_strict".into(), Value::from(options.type_strict.as_str()));
    if let Some(entity_type) = &options.entity_type {
        query.insert("type".into(), Value::from(entity_type.as_str()));
    }
    if let Some(properties) = &options.properties {
        query.insert(
            "properties".into(),
            Value::Array(
                properties
                    .iter()
                    .map(|p| serde_json::json!({ "pid": p.pid, "v": p.v }))
                    .collect(),
            ),
        );
    }
    Value::Object(query)
}

/// Build the request for `query`.
///
/// Options only shape label queries; prebuilt objects go out as given, under
/// `query` when they carry a `query` key and under `queries` otherwise.
pub fn encode(query: &ReconcileQuery, options: &ReconcileOptions) -> ReconcileRequest {
    match query {
        ReconcileQuery::Label(label) => ReconcileRequest {
            param: ReconcileParam::Query,
            payload: label_query(label, options),
        },
        ReconcileQuery::Labels(labels) => {
            let batch: Map<String, Value> = labels
                .iter()
                .enumerate()
                .map(|(i, label)| (format!("q{}", i), label_query(label, options)))
                .collect();
            ReconcileRequest {
                param: ReconcileParam::Queries,
                payload: Value::Object(batch),
            }
        }
        ReconcileQuery::Prebuilt(prebuilt) => ReconcileRequest {
            param: if prebuilt.contains_key("query") {
                ReconcileParam::Query
            } else {
                ReconcileParam::Queries
            },
            payload: Value::Object(prebuilt.clone()),
        },
    }
}
