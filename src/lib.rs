//! Kasabi client
//!
//! Client for datasets hosted on the Kasabi data platform.
//!
//! A dataset advertises the APIs it offers (SPARQL, lookup, search,
//! reconciliation, update, status, jobs, attribution, augmentation) in a
//! Turtle metadata document. [`Dataset`] fetches that document once, on first
//! use, and routes each call to the endpoint declared for it. Calls against an
//! API the dataset does not declare fail with
//! [`Error::CapabilityUnavailable`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use kasabi::{BoxError, Dataset, HttpResponse, Method, Outcome, ResponseMode, Transport};
//!
//! struct Canned;
//!
//! impl Transport for Canned {
//!     fn request(
//!         &self,
//!         _method: Method,
//!         url: &str,
//!         _headers: &[(&str, &str)],
//!         _body: Option<&[u8]>,
//!     ) -> Result<HttpResponse, BoxError> {
//!         let body = if url.ends_with(".ttl") {
//!             "<> <http://rdfs.org/ns/void#sparqlEndpoint> <http://api.kasabi.com/dataset/nasa/apis/sparql> ."
//!         } else {
//!             r#"<sparql xmlns="http://www.w3.org/2005/sparql-results#"><head/><boolean>true</boolean></sparql>"#
//!         };
//!         Ok(HttpResponse::new(200, body))
//!     }
//! }
//!
//! let dataset = Dataset::with_transport("nasa", "my-api-key", Arc::new(Canned)).unwrap();
//! let answer = dataset.ask("ASK { ?s ?p ?o }", ResponseMode::Decoded).unwrap();
//! assert_eq!(answer, Outcome::Success(true));
//!
//! // No search endpoint was declared.
//! assert!(dataset.search("apollo", &Default::default(), ResponseMode::Decoded).is_err());
//! ```
//!
//! # Responses
//!
//! | Status | [`ResponseMode::Decoded`] | [`ResponseMode::Raw`] |
//! |--------|---------------------------|-----------------------|
//! | 2xx | [`Outcome::Success`] with the decoded value | [`Outcome::Raw`] |
//! | other | [`Outcome::Failure`] with the body | [`Outcome::Raw`] |
//!
//! A 2xx body that does not decode is an [`Error::Decode`].

mod changeset;
mod clients;
mod dataset;
mod error;
mod facet;
mod rdf;
mod reconcile;
mod response;
mod sparql;
mod transport;
mod types;

pub use changeset::{BatchChangeSet, ChangeDocument, ChangeSet, CS_NS};
pub use clients::{
    media_type_for_path, AttributionClient, AugmentationClient, CapabilityClient, Client,
    Endpoint, JobsClient, LookupClient, ReconciliationClient, ScheduledJob, SearchClient,
    SearchOptions, SparqlClient, StatusClient, UpdateClient, JOB_TIME_FORMAT,
};
pub use dataset::{service_kind, CapabilityMap, Dataset, DatasetId, ServiceType, SERVICE_TYPES};
pub use error::Error;
pub use facet::{decode_facets, FacetField, FacetResults, FacetTerm};
pub use rdf::{decode_graph, parse_graph, serialize_graph};
pub use reconcile::{
    encode as encode_reconcile, PropertyValue, ReconcileOptions, ReconcileParam, ReconcileQuery,
    ReconcileRequest, TypeStrict, DEFAULT_LIMIT,
};
pub use response::{decode_json, is_success, Outcome};
pub use sparql::{decode_boolean, decode_select, Row, SelectResults, Term, SPARQL_RESULTS_NS};
pub use transport::{BoxError, HttpResponse, Method, Session, Transport, API_KEY_HEADER};
pub use types::{
    media_type, CapabilityKind, ClientConfig, JobType, RdfSyntax, ResponseMode, DEFAULT_PLATFORM,
    DEFAULT_TIMEOUT, PLATFORM_ENV,
};

#[cfg(feature = "remote")]
pub use transport::HttpTransport;

pub use oxrdf::Graph;
