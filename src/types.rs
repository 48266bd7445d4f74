//! Core types shared by the registry, clients and decoders.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Platform prefix every dataset URI starts with.
pub const DEFAULT_PLATFORM: &str = "http://data.kasabi.com/dataset/";

/// Default timeout for HTTP requests (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable overriding the platform prefix.
pub const PLATFORM_ENV: &str = "KASABI_PLATFORM";

/// Media types sent in `accept` and `content-type` headers.
pub mod media_type {
    pub const TURTLE: &str = "text/turtle";
    pub const RDF_XML: &str = "application/rdf+xml";
    pub const SPARQL_RESULTS_XML: &str = "application/sparql-results+xml";
    pub const JSON: &str = "application/json";
    pub const XML: &str = "application/xml";
    pub const RSS: &str = "application/rss+xml";
    pub const CHANGESET: &str = "application/vnd.talis.changeset+xml";
    pub const ANY: &str = "*/*";
}

/// A class of operation a dataset may expose.
///
/// Ordering follows declaration order, which is also the order
/// capabilities are listed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Sparql,
    Lookup,
    Search,
    Augmentation,
    Reconciliation,
    Update,
    Status,
    Jobs,
    Attribution,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 9] = [
        CapabilityKind::Sparql,
        CapabilityKind::Lookup,
        CapabilityKind::Search,
        CapabilityKind::Augmentation,
        CapabilityKind::Reconciliation,
        CapabilityKind::Update,
        CapabilityKind::Status,
        CapabilityKind::Jobs,
        CapabilityKind::Attribution,
    ];

    /// Short name used in messages and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Sparql => "sparql",
            CapabilityKind::Lookup => "lookup",
            CapabilityKind::Search => "search",
            CapabilityKind::Augmentation => "augmentation",
            CapabilityKind::Reconciliation => "reconciliation",
            CapabilityKind::Update => "update",
            CapabilityKind::Status => "status",
            CapabilityKind::Jobs => "jobs",
            CapabilityKind::Attribution => "attribution",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a capability call decodes the response body or hands it back untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    #[default]
    Decoded,
    Raw,
}

impl ResponseMode {
    /// Create a mode from a raw flag (true = Raw, false = Decoded).
    pub fn from_raw_flag(raw: bool) -> Self {
        if raw {
            ResponseMode::Raw
        } else {
            ResponseMode::Decoded
        }
    }
}

/// Serialization syntaxes understood by the graph decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RdfSyntax {
    /// Turtle, also used for N3 metadata documents.
    Turtle,
    NTriples,
    RdfXml,
}

impl RdfSyntax {
    pub fn name(&self) -> &'static str {
        match self {
            RdfSyntax::Turtle => "Turtle",
            RdfSyntax::NTriples => "N-Triples",
            RdfSyntax::RdfXml => "RDF/XML",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            RdfSyntax::Turtle => media_type::TURTLE,
            RdfSyntax::NTriples => "application/n-triples",
            RdfSyntax::RdfXml => media_type::RDF_XML,
        }
    }

    /// Map a media type (parameters ignored) onto a syntax.
    pub fn from_media_type(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "text/turtle" | "text/n3" | "text/rdf+n3" | "application/x-turtle" => {
                Some(RdfSyntax::Turtle)
            }
            "application/n-triples" | "text/plain" => Some(RdfSyntax::NTriples),
            "application/rdf+xml" | "application/rss+xml" | "application/xml" => {
                Some(RdfSyntax::RdfXml)
            }
            _ => None,
        }
    }
}

/// Job types accepted by a jobs endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Reset,
    Snapshot,
    Reindex,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Reset => "reset",
            JobType::Snapshot => "snapshot",
            JobType::Reindex => "reindex",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reset" => Some(JobType::Reset),
            "snapshot" => Some(JobType::Snapshot),
            "reindex" => Some(JobType::Reindex),
            _ => None,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Prefix dataset slugs are joined to. Dataset URIs always start with it.
    pub platform: String,
    /// Per-request timeout used by the bundled HTTP transport.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            platform: DEFAULT_PLATFORM.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the platform prefix taken from `KASABI_PLATFORM` when set.
    pub fn from_env() -> Self {
        match std::env::var(PLATFORM_ENV) {
            Ok(platform) if !platform.trim().is_empty() => Self::new().platform(platform),
            _ => Self::new(),
        }
    }

    /// Set the platform prefix. A trailing `/` is added when missing.
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        let mut platform = platform.into();
        if !platform.ends_with('/') {
            platform.push('/');
        }
        self.platform = platform;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_kind_names() {
        assert_eq!(CapabilityKind::Sparql.to_string(), "sparql");
        assert_eq!(CapabilityKind::Reconciliation.as_str(), "reconciliation");
        assert_eq!(CapabilityKind::ALL.len(), 9);
    }

    #[test]
    fn response_mode_from_flag() {
        assert_eq!(ResponseMode::from_raw_flag(true), ResponseMode::Raw);
        assert_eq!(ResponseMode::from_raw_flag(false), ResponseMode::Decoded);
        assert_eq!(ResponseMode::default(), ResponseMode::Decoded);
    }

    #[test]
    fn syntax_from_media_type() {
        assert_eq!(
            RdfSyntax::from_media_type("text/turtle; charset=utf-8"),
            Some(RdfSyntax::Turtle)
        );
        assert_eq!(
            RdfSyntax::from_media_type("application/RDF+XML"),
            Some(RdfSyntax::RdfXml)
        );
        assert_eq!(RdfSyntax::from_media_type("application/json"), None);
    }

    #[test]
    fn job_type_parse() {
        assert_eq!(JobType::parse("reset"), Some(JobType::Reset));
        assert_eq!(JobType::parse("snapshot"), Some(JobType::Snapshot));
        assert_eq!(JobType::parse("purge"), None);
    }

    #[test]
    fn config_platform_gets_trailing_slash() {
        let config = ClientConfig::new().platform("http://localhost:8080/dataset");
        assert_eq!(config.platform, "http://localhost:8080/dataset/");

        let config = ClientConfig::new();
        assert_eq!(config.platform, DEFAULT_PLATFORM);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }
}
