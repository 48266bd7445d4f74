//! Capability clients.
//!
//! Each client is bound to one endpoint URI discovered from dataset metadata
//! and builds one fixed request per operation. Responses go through
//! [`Outcome::settle`], so a [`ResponseMode::Raw`] call or a non-success
//! status hands the body back undecoded.

use std::path::Path;

use chrono::{DateTime, Utc};
use oxrdf::Graph;
use serde::Serialize;
use serde_json::Value;

use crate::changeset::ChangeDocument;
use crate::error::Error;
use crate::facet::{decode_facets, FacetResults};
use crate::rdf::{parse_graph, serialize_graph};
use crate::reconcile::{encode, ReconcileOptions, ReconcileQuery};
use crate::response::{decode_json, Outcome};
use crate::sparql::{decode_boolean, decode_select, SelectResults};
use crate::transport::{HttpResponse, Session};
use crate::types::{media_type, CapabilityKind, JobType, RdfSyntax, ResponseMode};

/// Append form-encoded `pairs` to `base`.
fn with_query(base: &str, pairs: &[(&str, &str)]) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base, separator, query)
}

/// Parse a graph body, resolving relative IRIs against `base`.
///
/// A recognised `content-type` overrides the `syntax` that was asked for.
fn graph_decoder(
    syntax: RdfSyntax,
    base: &str,
) -> impl FnOnce(&HttpResponse) -> Result<Graph, Error> + '_ {
    move |response| {
        let syntax = response
            .header("content-type")
            .and_then(RdfSyntax::from_media_type)
            .unwrap_or(syntax);
        parse_graph(&response.body, syntax, Some(base))
    }
}

fn json_decoder(response: &HttpResponse) -> Result<Value, Error> {
    decode_json(&response.body)
}

/// One discovered endpoint plus the session used to reach it.
#[derive(Debug, Clone)]
pub struct Endpoint {
    uri: String,
    session: Session,
}

impl Endpoint {
    pub fn new(uri: impl Into<String>, session: Session) -> Self {
        Self {
            uri: uri.into(),
            session,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

/// A client for one capability kind.
pub trait CapabilityClient: Sized {
    const KIND: CapabilityKind;

    fn new(endpoint: Endpoint) -> Self;

    fn endpoint(&self) -> &Endpoint;

    /// Borrow the client out of a [`Client`] of the matching variant.
    fn from_client(client: &Client) -> Option<&Self>;

    fn uri(&self) -> &str {
        self.endpoint().uri()
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SparqlClient {
    endpoint: Endpoint,
}

impl SparqlClient {
    /// Run `query` and return the response as sent, whatever its status.
    pub fn sparql(&self, query: &str, accept: &str) -> Result<HttpResponse, Error> {
        let url = with_query(&self.endpoint.uri, &[("query", query)]);
        self.endpoint.session.get(&url, accept)
    }

    /// `DESCRIBE <uri>` as a graph.
    pub fn describe(&self, uri: &str, mode: ResponseMode) -> Result<Outcome<Graph>, Error> {
        let syntax = RdfSyntax::Turtle;
        let response = self.sparql(&format!("describe <{}>", uri), syntax.media_type())?;
        Outcome::settle(response, mode, graph_decoder(syntax, &self.endpoint.uri))
    }

    /// Run a CONSTRUCT query.
    pub fn construct(&self, query: &str, mode: ResponseMode) -> Result<Outcome<Graph>, Error> {
        let syntax = RdfSyntax::Turtle;
        let response = self.sparql(query, syntax.media_type())?;
        Outcome::settle(response, mode, graph_decoder(syntax, &self.endpoint.uri))
    }

    /// Run an ASK query.
    pub fn ask(&self, query: &str, mode: ResponseMode) -> Result<Outcome<bool>, Error> {
        let response = self.sparql(query, media_type::SPARQL_RESULTS_XML)?;
        Outcome::settle(response, mode, |r| decode_boolean(&r.body))
    }

    /// Run a SELECT query.
    pub fn select(&self, query: &str, mode: ResponseMode) -> Result<Outcome<SelectResults>, Error> {
        let response = self.sparql(query, media_type::SPARQL_RESULTS_XML)?;
        Outcome::settle(response, mode, |r| decode_select(&r.body))
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LookupClient {
    endpoint: Endpoint,
}

impl LookupClient {
    /// Description of `uri` held by the dataset.
    pub fn lookup(&self, uri: &str, mode: ResponseMode) -> Result<Outcome<Graph>, Error> {
        let url = with_query(&self.endpoint.uri, &[("about", uri)]);
        let syntax = RdfSyntax::Turtle;
        let response = self.endpoint.session.get(&url, syntax.media_type())?;
        Outcome::settle(response, mode, graph_decoder(syntax, &self.endpoint.uri))
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Paging and ordering for a search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub max: Option<u32>,
    pub offset: Option<u32>,
    pub sort: Option<String>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max(mut self, max: u32) -> Self {
        self.max = Some(max);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct SearchClient {
    endpoint: Endpoint,
}

impl SearchClient {
    /// Full-text search. Results come back as an RSS 1.0 graph.
    pub fn search(
        &self,
        query: &str,
        options: &SearchOptions,
        mode: ResponseMode,
    ) -> Result<Outcome<Graph>, Error> {
        let max = options.max.map(|m| m.to_string());
        let offset = options.offset.map(|o| o.to_string());

        let mut pairs = vec![("query", query)];
        if let Some(max) = &max {
            pairs.push(("max", max));
        }
        if let Some(offset) = &offset {
            pairs.push(("offset", offset));
        }
        if let Some(sort) = &options.sort {
            pairs.push(("sort", sort));
        }

        let url = with_query(&self.endpoint.uri, &pairs);
        let response = self.endpoint.session.get(&url, media_type::RSS)?;
        Outcome::settle(response, mode, graph_decoder(RdfSyntax::RdfXml, &self.endpoint.uri))
    }

    /// Facet counts for `fields` over the items matching `query`.
    pub fn facet(
        &self,
        query: &str,
        fields: &[&str],
        top: Option<u32>,
        mode: ResponseMode,
    ) -> Result<Outcome<FacetResults>, Error> {
        let fields = fields.join(",");
        let top = top.map(|t| t.to_string());

        let mut pairs = vec![("query", query), ("fields", fields.as_str())];
        if let Some(top) = &top {
            pairs.push(("top", top));
        }

        let base = format!("{}/facet", self.endpoint.uri.trim_end_matches('/'));
        let url = with_query(&base, &pairs);
        let response = self.endpoint.session.get(&url, media_type::XML)?;
        Outcome::settle(response, mode, |r| decode_facets(&r.body))
    }
}

// ---------------------------------------------------------------------------
// Augmentation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AugmentationClient {
    endpoint: Endpoint,
}

impl AugmentationClient {
    /// Augment the RSS feed published at `feed_uri`.
    pub fn augment(&self, feed_uri: &str, mode: ResponseMode) -> Result<Outcome<Graph>, Error> {
        let url = with_query(&self.endpoint.uri, &[("data-uri", feed_uri)]);
        let response = self.endpoint.session.get(&url, media_type::RSS)?;
        Outcome::settle(response, mode, graph_decoder(RdfSyntax::RdfXml, &self.endpoint.uri))
    }

    /// Augment an RSS feed supplied inline.
    pub fn augment_feed(&self, feed: &[u8], mode: ResponseMode) -> Result<Outcome<Graph>, Error> {
        let response =
            self.endpoint
                .session
                .post(&self.endpoint.uri, media_type::RSS, media_type::RSS, feed)?;
        Outcome::settle(response, mode, graph_decoder(RdfSyntax::RdfXml, &self.endpoint.uri))
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ReconciliationClient {
    endpoint: Endpoint,
}

impl ReconciliationClient {
    /// Match labels against entities known to the dataset.
    pub fn reconcile(
        &self,
        query: &ReconcileQuery,
        options: &ReconcileOptions,
        mode: ResponseMode,
    ) -> Result<Outcome<Value>, Error> {
        let request = encode(query, options);
        let separator = if self.endpoint.uri.contains('?') { '&' } else { '?' };
        let url = format!("{}{}{}", self.endpoint.uri, separator, request.query_string());
        let response = self.endpoint.session.get(&url, media_type::JSON)?;
        Outcome::settle(response, mode, json_decoder)
    }
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Content type for a file, judged by its extension.
pub fn media_type_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("nt") | Some("ttl") => media_type::TURTLE,
        _ => media_type::RDF_XML,
    }
}

#[derive(Debug, Clone)]
pub struct UpdateClient {
    endpoint: Endpoint,
}

impl UpdateClient {
    /// Store serialized RDF. Success carries the platform's response text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` without sending anything when
    /// `graph_uri` is given: named graphs cannot be targeted.
    pub fn store_data(
        &self,
        data: &[u8],
        graph_uri: Option<&str>,
        media_type: &str,
    ) -> Result<Outcome<String>, Error> {
        if graph_uri.is_some() {
            return Err(Error::sub_graph_unsupported());
        }
        let response = self
            .endpoint
            .session
            .post(&self.endpoint.uri, media_type, media_type::ANY, data)?;
        Outcome::settle(response, ResponseMode::Decoded, |r| Ok(r.body.clone()))
    }

    /// Store a graph, sent as N-Triples under `text/turtle`.
    pub fn store_graph(&self, graph: &Graph, graph_uri: Option<&str>) -> Result<Outcome<String>, Error> {
        if graph_uri.is_some() {
            return Err(Error::sub_graph_unsupported());
        }
        let data = serialize_graph(graph, RdfSyntax::NTriples)?;
        self.store_data(data.as_bytes(), None, media_type::TURTLE)
    }

    /// Store the full contents of a file, read before anything is sent.
    ///
    /// Without `media_type`, `.nt` and `.ttl` files go as `text/turtle` and
    /// everything else as `application/rdf+xml`.
    pub fn store_file(
        &self,
        path: &Path,
        graph_uri: Option<&str>,
        media_type: Option<&str>,
    ) -> Result<Outcome<String>, Error> {
        if graph_uri.is_some() {
            return Err(Error::sub_graph_unsupported());
        }
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let data = std::fs::read(path).map_err(|source| Error::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let media_type = media_type.unwrap_or_else(|| media_type_for_path(path));
        tracing::debug!(path = %path.display(), media_type, bytes = data.len(), "storing file");
        self.store_data(&data, None, media_type)
    }

    /// Patch stored data with a change-set.
    pub fn apply_changeset(
        &self,
        changeset: &impl ChangeDocument,
        graph_uri: Option<&str>,
    ) -> Result<Outcome<String>, Error> {
        if graph_uri.is_some() {
            return Err(Error::sub_graph_unsupported());
        }
        let data = changeset.to_rdf_xml()?;
        self.store_data(data.as_bytes(), None, media_type::CHANGESET)
    }
}

// ---------------------------------------------------------------------------
// Status & Attribution
// ---------------------------------------------------------------------------

fn get_json(endpoint: &Endpoint, mode: ResponseMode) -> Result<Outcome<Value>, Error> {
    let url = with_query(&endpoint.uri, &[("output", "json")]);
    let response = endpoint.session.get(&url, media_type::JSON)?;
    Outcome::settle(response, mode, json_decoder)
}

#[derive(Debug, Clone)]
pub struct StatusClient {
    endpoint: Endpoint,
}

impl StatusClient {
    pub fn get(&self, mode: ResponseMode) -> Result<Outcome<Value>, Error> {
        get_json(&self.endpoint, mode)
    }
}

#[derive(Debug, Clone)]
pub struct AttributionClient {
    endpoint: Endpoint,
}

impl AttributionClient {
    pub fn get(&self, mode: ResponseMode) -> Result<Outcome<Value>, Error> {
        get_json(&self.endpoint, mode)
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Format used for job start times.
pub const JOB_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobRequest<'a> {
    job_type: &'a str,
    start_time: String,
}

/// Accepted job: its URI from the `Location` header, and the JSON body if any.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledJob {
    pub uri: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct JobsClient {
    endpoint: Endpoint,
}

impl JobsClient {
    /// Request body for scheduling `job_type` at `start` (UTC).
    pub fn job_payload(job_type: JobType, start: DateTime<Utc>) -> Result<Vec<u8>, Error> {
        let request = JobRequest {
            job_type: job_type.as_str(),
            start_time: start.format(JOB_TIME_FORMAT).to_string(),
        };
        serde_json::to_vec(&request).map_err(|e| Error::encode("JSON", e))
    }

    /// Schedule a job, starting now unless `start` is given.
    pub fn schedule(
        &self,
        job_type: JobType,
        start: Option<DateTime<Utc>>,
        mode: ResponseMode,
    ) -> Result<Outcome<ScheduledJob>, Error> {
        let start = start.unwrap_or_else(Utc::now);
        let body = Self::job_payload(job_type, start)?;
        tracing::info!(%job_type, %start, "scheduling job");

        let response = self.endpoint.session.post(
            &self.endpoint.uri,
            media_type::JSON,
            media_type::JSON,
            &body,
        )?;
        Outcome::settle(response, mode, |r| {
            Ok(ScheduledJob {
                uri: r.header("location").map(str::to_string),
                body: serde_json::from_str(&r.body).ok(),
            })
        })
    }

    /// Current state of a scheduled job.
    pub fn status(&self, job_uri: &str, mode: ResponseMode) -> Result<Outcome<Value>, Error> {
        let response = self.endpoint.session.get(job_uri, media_type::JSON)?;
        Outcome::settle(response, mode, json_decoder)
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// A client of any capability kind.
#[derive(Debug, Clone)]
pub enum Client {
    Sparql(SparqlClient),
    Lookup(LookupClient),
    Search(SearchClient),
    Augmentation(AugmentationClient),
    Reconciliation(ReconciliationClient),
    Update(UpdateClient),
    Status(StatusClient),
    Jobs(JobsClient),
    Attribution(AttributionClient),
}

impl Client {
    /// Construct the client variant implementing `kind`.
    pub fn for_kind(kind: CapabilityKind, endpoint: Endpoint) -> Self {
        match kind {
            CapabilityKind::Sparql => Client::Sparql(SparqlClient::new(endpoint)),
            CapabilityKind::Lookup => Client::Lookup(LookupClient::new(endpoint)),
            CapabilityKind::Search => Client::Search(SearchClient::new(endpoint)),
            CapabilityKind::Augmentation => Client::Augmentation(AugmentationClient::new(endpoint)),
            CapabilityKind::Reconciliation => {
                Client::Reconciliation(ReconciliationClient::new(endpoint))
            }
            CapabilityKind::Update => Client::Update(UpdateClient::new(endpoint)),
            CapabilityKind::Status => Client::Status(StatusClient::new(endpoint)),
            CapabilityKind::Jobs => Client::Jobs(JobsClient::new(endpoint)),
            CapabilityKind::Attribution => Client::Attribution(AttributionClient::new(endpoint)),
        }
    }

    pub fn kind(&self) -> CapabilityKind {
        match self {
            Client::Sparql(_) => CapabilityKind::Sparql,
            Client::Lookup(_) => CapabilityKind::Lookup,
            Client::Search(_) => CapabilityKind::Search,
            Client::Augmentation(_) => CapabilityKind::Augmentation,
            Client::Reconciliation(_) => CapabilityKind::Reconciliation,
            Client::Update(_) => CapabilityKind::Update,
            Client::Status(_) => CapabilityKind::Status,
            Client::Jobs(_) => CapabilityKind::Jobs,
            Client::Attribution(_) => CapabilityKind::Attribution,
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            Client::Sparql(c) => c.uri(),
            Client::Lookup(c) => c.uri(),
            Client::Search(c) => c.uri(),
            Client::Augmentation(c) => c.uri(),
            Client::Reconciliation(c) => c.uri(),
            Client::Update(c) => c.uri(),
            Client::Status(c) => c.uri(),
            Client::Jobs(c) => c.uri(),
            Client::Attribution(c) => c.uri(),
        }
    }
}

macro_rules! capability_client {
    ($client:ident, $variant:ident) => {
        impl CapabilityClient for $client {
            const KIND: CapabilityKind = CapabilityKind::$variant;

            fn new(endpoint: Endpoint) -> Self {
                Self { endpoint }
            }

            fn endpoint(&self) -> &Endpoint {
                &self.endpoint
            }

            fn from_client(client: &Client) -> Option<&Self> {
                match client {
                    Client::$variant(c) => Some(c),
                    _ => None,
                }
            }
        }
    };
}

capability_client!(SparqlClient, Sparql);
capability_client!(LookupClient, Lookup);
capability_client!(SearchClient, Search);
capability_client!(AugmentationClient, Augmentation);
capability_client!(ReconciliationClient, Reconciliation);
capability_client!(UpdateClient, Update);
capability_client!(StatusClient, Status);
capability_client!(JobsClient, Jobs);
capability_client!(AttributionClient, Attribution);
