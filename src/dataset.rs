//! Dataset handle and capability discovery.
//!
//! A [`Dataset`] fetches its metadata document (`{uri}.ttl`) on first use,
//! finds the service endpoints declared for the dataset URI and routes each
//! operation to the first client of the kind it needs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{DateTime, Utc};
use oxrdf::{Graph, NamedNode, NamedNodeRef, TermRef};
use serde_json::Value;

use crate::changeset::ChangeDocument;
use crate::clients::{
    AttributionClient, AugmentationClient, CapabilityClient, Client, Endpoint, JobsClient,
    LookupClient, ReconciliationClient, ScheduledJob, SearchClient, SearchOptions, SparqlClient,
    StatusClient, UpdateClient,
};
use crate::error::Error;
use crate::facet::FacetResults;
use crate::rdf::decode_graph;
use crate::reconcile::{ReconcileOptions, ReconcileQuery};
use crate::response::Outcome;
use crate::sparql::SelectResults;
use crate::transport::{HttpResponse, Session, Transport};
use crate::types::{media_type, CapabilityKind, ClientConfig, JobType, RdfSyntax, ResponseMode};

const VOID_NS: &str = "http://rdfs.org/ns/void#";
const SERVICES_NS: &str = "http://labs.kasabi.com/ns/services#";

/// A metadata predicate that declares an endpoint of some capability kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceType {
    pub namespace: &'static str,
    pub local_name: &'static str,
    pub kind: CapabilityKind,
}

impl ServiceType {
    const fn new(namespace: &'static str, local_name: &'static str, kind: CapabilityKind) -> Self {
        Self {
            namespace,
            local_name,
            kind,
        }
    }

    /// True when `predicate` is this service type's full IRI.
    pub fn matches(&self, predicate: &str) -> bool {
        predicate
            .strip_prefix(self.namespace)
            .is_some_and(|local| local == self.local_name)
    }

    pub fn predicate(&self) -> String {
        format!("{}{}", self.namespace, self.local_name)
    }
}

/// Service types recognised in dataset metadata.
pub const SERVICE_TYPES: [ServiceType; 9] = [
    ServiceType::new(VOID_NS, "sparqlEndpoint", CapabilityKind::Sparql),
    ServiceType::new(VOID_NS, "uriLookupEndpoint", CapabilityKind::Lookup),
    ServiceType::new(SERVICES_NS, "searchEndpoint", CapabilityKind::Search),
    ServiceType::new(SERVICES_NS, "augmentationEndpoint", CapabilityKind::Augmentation),
    ServiceType::new(SERVICES_NS, "reconciliationEndpoint", CapabilityKind::Reconciliation),
    ServiceType::new(SERVICES_NS, "storeEndpoint", CapabilityKind::Update),
    ServiceType::new(SERVICES_NS, "statusEndpoint", CapabilityKind::Status),
    ServiceType::new(SERVICES_NS, "jobsEndpoint", CapabilityKind::Jobs),
    ServiceType::new(SERVICES_NS, "attributionEndpoint", CapabilityKind::Attribution),
];

/// Capability kind declared by `predicate`, if it is a known service type.
pub fn service_kind(predicate: &str) -> Option<CapabilityKind> {
    SERVICE_TYPES
        .iter()
        .find(|s| s.matches(predicate))
        .map(|s| s.kind)
}

/// Normalized dataset identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetId {
    uid: String,
    uri: String,
}

impl DatasetId {
    /// Normalize a slug or full dataset URI against `platform`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for an empty identifier, an absolute
    /// URI outside `platform`, or a result that is not a valid IRI.
    pub fn parse(identifier: &str, platform: &str) -> Result<Self, Error> {
        let identifier = identifier.trim();
        let uid = match identifier.strip_prefix(platform) {
            Some(rest) => rest,
            None if identifier.contains("://") => {
                return Err(Error::Configuration {
                    message: format!("{} is not a dataset under {}", identifier, platform),
                })
            }
            None => identifier,
        };
        let uid = uid.trim_matches('/');
        if uid.is_empty() {
            return Err(Error::Configuration {
                message: "dataset identifier is empty".into(),
            });
        }

        let uri = format!("{}{}", platform, uid);
        NamedNode::new(uri.as_str()).map_err(|e| Error::Configuration {
            message: format!("invalid dataset uri {}: {}", uri, e),
        })?;

        Ok(Self {
            uid: uid.to_string(),
            uri,
        })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Where the metadata document lives.
    pub fn metadata_url(&self) -> String {
        format!("{}.ttl", self.uri)
    }
}

/// Discovered clients by capability kind.
///
/// Endpoints of one kind are held sorted by URI without duplicates; the first
/// of them serves every call.
#[derive(Debug, Clone, Default)]
pub struct CapabilityMap {
    clients: BTreeMap<CapabilityKind, Vec<Client>>,
}

impl CapabilityMap {
    fn build(endpoints: BTreeMap<CapabilityKind, BTreeSet<String>>, session: &Session) -> Self {
        let clients = endpoints
            .into_iter()
            .map(|(kind, uris)| {
                let clients = uris
                    .into_iter()
                    .map(|uri| Client::for_kind(kind, Endpoint::new(uri, session.clone())))
                    .collect();
                (kind, clients)
            })
            .collect();
        Self { clients }
    }

    pub fn first(&self, kind: CapabilityKind) -> Option<&Client> {
        self.clients.get(&kind).and_then(|c| c.first())
    }

    /// All clients of `kind` in selection order.
    pub fn clients(&self, kind: CapabilityKind) -> &[Client] {
        self.clients.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn endpoints(&self, kind: CapabilityKind) -> Vec<&str> {
        self.clients(kind).iter().map(Client::uri).collect()
    }

    pub fn kinds(&self) -> impl Iterator<Item = CapabilityKind> + '_ {
        self.clients.keys().copied()
    }

    pub fn contains(&self, kind: CapabilityKind) -> bool {
        self.clients.contains_key(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[derive(Debug)]
struct Discovery {
    metadata: Graph,
    capabilities: CapabilityMap,
}

/// A dataset hosted on the platform.
#[derive(Debug)]
pub struct Dataset {
    id: DatasetId,
    session: Session,
    discovery: OnceLock<Discovery>,
    gate: Mutex<()>,
}

impl Dataset {
    /// Dataset reached over HTTP, configured from the environment.
    #[cfg(feature = "remote")]
    pub fn new(identifier: &str, api_key: &str) -> Result<Self, Error> {
        let config = ClientConfig::from_env();
        let transport = crate::transport::HttpTransport::new(&config)?;
        Self::with_config(identifier, api_key, &config, Arc::new(transport))
    }

    /// Dataset under the default platform using `transport` for every request.
    pub fn with_transport(
        identifier: &str,
        api_key: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, Error> {
        Self::with_config(identifier, api_key, &ClientConfig::default(), transport)
    }

    pub fn with_config(
        identifier: &str,
        api_key: &str,
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, Error> {
        Ok(Self {
            id: DatasetId::parse(identifier, &config.platform)?,
            session: Session::new(api_key, transport),
            discovery: OnceLock::new(),
            gate: Mutex::new(()),
        })
    }

    pub fn id(&self) -> &DatasetId {
        &self.id
    }

    pub fn uid(&self) -> &str {
        self.id.uid()
    }

    pub fn uri(&self) -> &str {
        self.id.uri()
    }

    /// The dataset's metadata graph, fetched on first call.
    pub fn metadata(&self) -> Result<&Graph, Error> {
        Ok(&self.discover()?.metadata)
    }

    pub fn capabilities(&self) -> Result<&CapabilityMap, Error> {
        Ok(&self.discover()?.capabilities)
    }

    pub fn has_capability(&self, kind: CapabilityKind) -> Result<bool, Error> {
        Ok(self.capabilities()?.contains(kind))
    }

    /// The client serving capability `C`.
    ///
    /// # Errors
    ///
    /// Returns `Error::CapabilityUnavailable` when the metadata declares no
    /// endpoint of that kind.
    pub fn client<C: CapabilityClient>(&self) -> Result<&C, Error> {
        self.capabilities()?
            .first(C::KIND)
            .and_then(C::from_client)
            .ok_or(Error::CapabilityUnavailable { kind: C::KIND })
    }

    fn discover(&self) -> Result<&Discovery, Error> {
        if let Some(discovery) = self.discovery.get() {
            return Ok(discovery);
        }
        let _gate = self.gate.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(discovery) = self.discovery.get() {
            return Ok(discovery);
        }
        let discovered = self.fetch_metadata()?;
        Ok(self.discovery.get_or_init(|| discovered))
    }

    fn fetch_metadata(&self) -> Result<Discovery, Error> {
        let url = self.id.metadata_url();
        tracing::debug!(dataset = %self.id.uri, url = %url, "discovering capabilities");

        let response = self.session.get(&url, media_type::TURTLE)?;
        if !crate::response::is_success(response.status) {
            tracing::warn!(
                dataset = %self.id.uri,
                status = response.status,
                "metadata unavailable, dataset has no capabilities"
            );
        }
        let metadata = decode_graph(
            response.status,
            &response.body,
            RdfSyntax::Turtle,
            Some(&self.id.uri),
        )?;

        let mut endpoints: BTreeMap<CapabilityKind, BTreeSet<String>> = BTreeMap::new();
        let subject = NamedNodeRef::new_unchecked(&self.id.uri);
        for triple in metadata.triples_for_subject(subject) {
            let Some(kind) = service_kind(triple.predicate.as_str()) else {
                continue;
            };
            match triple.object {
                TermRef::NamedNode(endpoint) => {
                    endpoints
                        .entry(kind)
                        .or_default()
                        .insert(endpoint.as_str().to_string());
                }
                other => {
                    tracing::debug!(%kind, object = %other, "ignoring endpoint that is not an IRI");
                }
            }
        }

        let capabilities = CapabilityMap::build(endpoints, &self.session);
        tracing::info!(
            dataset = %self.id.uri,
            triples = metadata.len(),
            kinds = capabilities.clients.len(),
            "capabilities discovered"
        );
        Ok(Discovery {
            metadata,
            capabilities,
        })
    }

    // Query

    pub fn sparql(&self, query: &str, accept: &str) -> Result<HttpResponse, Error> {
        self.client::<SparqlClient>()?.sparql(query, accept)
    }

    pub fn describe(&self, uri: &str, mode: ResponseMode) -> Result<Outcome<Graph>, Error> {
        self.client::<SparqlClient>()?.describe(uri, mode)
    }

    pub fn construct(&self, query: &str, mode: ResponseMode) -> Result<Outcome<Graph>, Error> {
        self.client::<SparqlClient>()?.construct(query, mode)
    }

    pub fn ask(&self, query: &str, mode: ResponseMode) -> Result<Outcome<bool>, Error> {
        self.client::<SparqlClient>()?.ask(query, mode)
    }

    pub fn select(&self, query: &str, mode: ResponseMode) -> Result<Outcome<SelectResults>, Error> {
        self.client::<SparqlClient>()?.select(query, mode)
    }

    // Lookup, search, augmentation, reconciliation

    pub fn lookup(&self, uri: &str, mode: ResponseMode) -> Result<Outcome<Graph>, Error> {
        self.client::<LookupClient>()?.lookup(uri, mode)
    }

    pub fn search(
        &self,
        query: &str,
        options: &SearchOptions,
        mode: ResponseMode,
    ) -> Result<Outcome<Graph>, Error> {
        self.client::<SearchClient>()?.search(query, options, mode)
    }

    pub fn facet(
        &self,
        query: &str,
        fields: &[&str],
        top: Option<u32>,
        mode: ResponseMode,
    ) -> Result<Outcome<FacetResults>, Error> {
        self.client::<SearchClient>()?.facet(query, fields, top, mode)
    }

    pub fn augment(&self, feed_uri: &str, mode: ResponseMode) -> Result<Outcome<Graph>, Error> {
        self.client::<AugmentationClient>()?.augment(feed_uri, mode)
    }

    pub fn augment_feed(&self, feed: &[u8], mode: ResponseMode) -> Result<Outcome<Graph>, Error> {
        self.client::<AugmentationClient>()?.augment_feed(feed, mode)
    }

    pub fn reconcile(
        &self,
        query: impl Into<ReconcileQuery>,
        options: &ReconcileOptions,
        mode: ResponseMode,
    ) -> Result<Outcome<Value>, Error> {
        self.client::<ReconciliationClient>()?
            .reconcile(&query.into(), options, mode)
    }

    // Update. A sub-graph target fails before discovery so nothing is sent.

    pub fn store_data(
        &self,
        data: &[u8],
        graph_uri: Option<&str>,
        media_type: &str,
    ) -> Result<Outcome<String>, Error> {
        reject_sub_graph(graph_uri)?;
        self.client::<UpdateClient>()?.store_data(data, None, media_type)
    }

    pub fn store_graph(&self, graph: &Graph, graph_uri: Option<&str>) -> Result<Outcome<String>, Error> {
        reject_sub_graph(graph_uri)?;
        self.client::<UpdateClient>()?.store_graph(graph, None)
    }

    pub fn store_file(
        &self,
        path: &Path,
        graph_uri: Option<&str>,
        media_type: Option<&str>,
    ) -> Result<Outcome<String>, Error> {
        reject_sub_graph(graph_uri)?;
        self.client::<UpdateClient>()?.store_file(path, None, media_type)
    }

    pub fn apply_changeset(
        &self,
        changeset: &impl ChangeDocument,
        graph_uri: Option<&str>,
    ) -> Result<Outcome<String>, Error> {
        reject_sub_graph(graph_uri)?;
        self.client::<UpdateClient>()?.apply_changeset(changeset, None)
    }

    // Status, attribution, jobs

    pub fn status(&self, mode: ResponseMode) -> Result<Outcome<Value>, Error> {
        self.client::<StatusClient>()?.get(mode)
    }

    pub fn attribution(&self, mode: ResponseMode) -> Result<Outcome<Value>, Error> {
        self.client::<AttributionClient>()?.get(mode)
    }

    pub fn schedule_job(
        &self,
        job_type: JobType,
        start: Option<DateTime<Utc>>,
        mode: ResponseMode,
    ) -> Result<Outcome<ScheduledJob>, Error> {
        self.client::<JobsClient>()?.schedule(job_type, start, mode)
    }

    /// Schedule a reset of all stored data, starting now.
    pub fn reset_data(&self) -> Result<Outcome<ScheduledJob>, Error> {
        self.schedule_job(JobType::Reset, None, ResponseMode::Decoded)
    }

    pub fn job_status(&self, job_uri: &str, mode: ResponseMode) -> Result<Outcome<Value>, Error> {
        self.client::<JobsClient>()?.status(job_uri, mode)
    }
}

fn reject_sub_graph(graph_uri: Option<&str>) -> Result<(), Error> {
    match graph_uri {
        Some(_) => Err(Error::sub_graph_unsupported()),
        None => Ok(()),
    }
}
