//! Dataset discovery and routing tests.

use std::sync::{Arc, Mutex};

use kasabi::{
    parse_graph, serialize_graph, BoxError, CapabilityKind, ChangeSet, Dataset, Error, Graph,
    HttpResponse, JobType, Method, Outcome, RdfSyntax, ReconcileOptions, ResponseMode,
    SearchOptions, Term, Transport,
};
use oxrdf::{Literal, NamedNode, Triple};

const DATASET: &str = "http://data.kasabi.com/dataset/nasa";
const API: &str = "http://api.kasabi.com/dataset/nasa";

fn metadata() -> String {
    format!(
        r#"@prefix void: <http://rdfs.org/ns/void#> .
@prefix svc: <http://labs.kasabi.com/ns/services#> .
@prefix dct: <http://purl.org/dc/terms/> .

<{DATASET}> dct:title "NASA" ;
    void:sparqlEndpoint <{API}/apis/sparql> ;
    void:uriLookupEndpoint <{API}/apis/lookup> ;
    svc:searchEndpoint <{API}/apis/search> ;
    svc:reconciliationEndpoint <{API}/apis/reconcile> ;
    svc:storeEndpoint <{API}/store> ;
    svc:statusEndpoint "{API}/status" ;
    svc:jobsEndpoint <{API}/jobs> .

<http://data.kasabi.com/dataset/other> svc:attributionEndpoint <{API}/attribution> .
"#
    )
}

struct Request {
    method: Method,
    url: String,
    content_type: Option<String>,
    body: Option<Vec<u8>>,
}

/// In-process platform: serves metadata, keeps Turtle posted to the store and
/// answers lookups from it. Anything else is answered from `routes` by URL
/// prefix.
struct FakePlatform {
    metadata: (u16, String),
    routes: Vec<(String, HttpResponse)>,
    stored: Mutex<Graph>,
    requests: Mutex<Vec<Request>>,
}

impl FakePlatform {
    fn new(metadata: impl Into<String>) -> Self {
        Self::with_status(200, metadata)
    }

    fn with_status(status: u16, metadata: impl Into<String>) -> Self {
        Self {
            metadata: (status, metadata.into()),
            routes: Vec::new(),
            stored: Mutex::new(Graph::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn route(mut self, prefix: &str, response: HttpResponse) -> Self {
        self.routes.push((prefix.to_string(), response));
        self
    }

    fn count(&self, suffix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.ends_with(suffix))
            .count()
    }

    fn total(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_url(&self) -> String {
        self.requests.lock().unwrap().last().unwrap().url.clone()
    }
}

impl Transport for FakePlatform {
    fn request(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, BoxError> {
        let content_type = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.to_string());
        self.requests.lock().unwrap().push(Request {
            method,
            url: url.to_string(),
            content_type: content_type.clone(),
            body: body.map(<[u8]>::to_vec),
        });

        if url.ends_with(".ttl") {
            return Ok(HttpResponse::new(self.metadata.0, self.metadata.1.clone()));
        }
        if url == format!("{API}/store") && content_type.as_deref() == Some("text/turtle") {
            let text = String::from_utf8(body.unwrap_or_default().to_vec())?;
            let graph = parse_graph(&text, RdfSyntax::Turtle, None)?;
            let mut stored = self.stored.lock().unwrap();
            for triple in graph.iter() {
                stored.insert(triple);
            }
            return Ok(HttpResponse::new(202, "stored"));
        }
        if url.starts_with(&format!("{API}/apis/lookup")) {
            let stored = self.stored.lock().unwrap();
            return Ok(HttpResponse::new(200, serialize_graph(&stored, RdfSyntax::NTriples)?));
        }
        for (prefix, response) in &self.routes {
            if url.starts_with(prefix.as_str()) {
                return Ok(response.clone());
            }
        }
        Ok(HttpResponse::new(404, "not found"))
    }
}

fn dataset(platform: &Arc<FakePlatform>) -> Dataset {
    Dataset::with_transport("nasa", "secret", platform.clone()).unwrap()
}

/// Call some operation of `kind`, keeping only the error.
fn call(dataset: &Dataset, kind: CapabilityKind) -> Result<(), Error> {
    let mode = ResponseMode::Decoded;
    match kind {
        CapabilityKind::Sparql => dataset.ask("ASK {}", mode).map(drop),
        CapabilityKind::Lookup => dataset.lookup("http://example.com/a", mode).map(drop),
        CapabilityKind::Search => dataset.search("a", &SearchOptions::new(), mode).map(drop),
        CapabilityKind::Augmentation => dataset.augment("http://example.com/feed", mode).map(drop),
        CapabilityKind::Reconciliation => dataset
            .reconcile("a", &ReconcileOptions::default(), mode)
            .map(drop),
        CapabilityKind::Update => dataset.store_data(b"", None, "text/turtle").map(drop),
        CapabilityKind::Status => dataset.status(mode).map(drop),
        CapabilityKind::Jobs => dataset.job_status("http://example.com/job", mode).map(drop),
        CapabilityKind::Attribution => dataset.attribution(mode).map(drop),
    }
}

fn triple(subject: &str, predicate: &str, object: &str) -> Triple {
    Triple::new(
        NamedNode::new(subject).unwrap(),
        NamedNode::new(predicate).unwrap(),
        Literal::new_simple_literal(object),
    )
}

mod discovery {
    use super::*;

    #[test]
    fn every_kind_unavailable_without_metadata() {
        let platform = Arc::new(FakePlatform::with_status(404, "no such dataset"));
        let dataset = dataset(&platform);

        for kind in CapabilityKind::ALL {
            match call(&dataset, kind) {
                Err(Error::CapabilityUnavailable { kind: missing }) => assert_eq!(missing, kind),
                other => panic!("{}: expected CapabilityUnavailable, got {:?}", kind, other),
            }
        }
        assert!(dataset.metadata().unwrap().is_empty());
        assert_eq!(platform.count(".ttl"), 1);
    }

    #[test]
    fn unavailable_error_names_kind() {
        let platform = Arc::new(FakePlatform::new(metadata()));
        let dataset = dataset(&platform);
        let err = call(&dataset, CapabilityKind::Augmentation).unwrap_err();
        assert_eq!(err.to_string(), "dataset has no augmentation api");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn declared_kinds_only() {
        let platform = Arc::new(FakePlatform::new(metadata()));
        let dataset = dataset(&platform);
        let kinds: Vec<CapabilityKind> = dataset.capabilities().unwrap().kinds().collect();

        // status is a literal and attribution belongs to another subject
        assert_eq!(
            kinds,
            vec![
                CapabilityKind::Sparql,
                CapabilityKind::Lookup,
                CapabilityKind::Search,
                CapabilityKind::Reconciliation,
                CapabilityKind::Update,
                CapabilityKind::Jobs,
            ]
        );
        assert!(dataset.has_capability(CapabilityKind::Update).unwrap());
        assert!(!dataset.has_capability(CapabilityKind::Status).unwrap());
        assert!(!dataset.has_capability(CapabilityKind::Attribution).unwrap());
    }

    #[test]
    fn runs_once() {
        let platform = Arc::new(
            FakePlatform::new(metadata()).route(&format!("{API}/apis/sparql"), HttpResponse::new(
                200,
                r#"<sparql xmlns="http://www.w3.org/2005/sparql-results#"><boolean>true</boolean></sparql>"#,
            )),
        );
        let dataset = dataset(&platform);
        assert_eq!(platform.total(), 0);

        for _ in 0..3 {
            dataset.ask("ASK {}", ResponseMode::Decoded).unwrap();
        }
        dataset.metadata().unwrap();
        call(&dataset, CapabilityKind::Status).unwrap_err();

        assert_eq!(platform.count(".ttl"), 1);
        assert_eq!(platform.total(), 4);
    }

    #[test]
    fn runs_once_under_concurrent_first_use() {
        let platform = Arc::new(FakePlatform::new(metadata()));
        let dataset = dataset(&platform);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    assert!(dataset.has_capability(CapabilityKind::Sparql).unwrap());
                });
            }
        });
        assert_eq!(platform.count(".ttl"), 1);
    }

    #[test]
    fn maps_are_per_dataset() {
        let with_sparql = Arc::new(FakePlatform::new(metadata()));
        let empty = Arc::new(FakePlatform::with_status(404, ""));

        let first = dataset(&with_sparql);
        let second = dataset(&empty);
        assert!(first.has_capability(CapabilityKind::Sparql).unwrap());
        assert!(!second.has_capability(CapabilityKind::Sparql).unwrap());
    }

    #[test]
    fn first_endpoint_is_lexicographic() {
        let metadata = format!(
            "<{DATASET}> <http://rdfs.org/ns/void#sparqlEndpoint> <{API}/sparql-b>, <{API}/sparql-a>, <{API}/sparql-b> ."
        );
        let platform = Arc::new(FakePlatform::new(metadata));
        let dataset = dataset(&platform);

        let endpoints = dataset.capabilities().unwrap().endpoints(CapabilityKind::Sparql);
        assert_eq!(
            endpoints,
            vec![format!("{API}/sparql-a"), format!("{API}/sparql-b")]
        );

        dataset.ask("ASK {}", ResponseMode::Raw).unwrap();
        assert!(platform.last_url().starts_with(&format!("{API}/sparql-a?")));
    }

    #[test]
    fn relative_subject_resolves_to_dataset() {
        let metadata = format!("<> <http://labs.kasabi.com/ns/services#statusEndpoint> <{API}/status> .");
        let platform = Arc::new(FakePlatform::new(metadata));
        assert!(dataset(&platform)
            .has_capability(CapabilityKind::Status)
            .unwrap());
    }

    #[test]
    fn unparseable_metadata_is_retried() {
        let platform = Arc::new(FakePlatform::new("this is not turtle"));
        let dataset = dataset(&platform);

        assert!(matches!(dataset.metadata(), Err(Error::Decode { .. })));
        assert!(matches!(dataset.metadata(), Err(Error::Decode { .. })));
        assert_eq!(platform.count(".ttl"), 2);
    }

    #[test]
    fn metadata_graph_exposed() {
        let platform = Arc::new(FakePlatform::new(metadata()));
        let dataset = dataset(&platform);
        assert_eq!(dataset.metadata().unwrap().len(), 9);
        assert_eq!(dataset.uid(), "nasa");
        assert_eq!(dataset.uri(), DATASET);
    }
}

mod query {
    use super::*;

    const SELECT: &str = r#"<?xml version="1.0"?>
<sparql xmlns="http://www.w3.org/2005/sparql-results#">
  <head><variable name="s"/><variable name="p"/><variable name="o"/></head>
  <results>
    <result>
      <binding name="s"><uri>http://example.com/apollo11</uri></binding>
      <binding name="p"><uri>http://purl.org/dc/terms/title</uri></binding>
      <binding name="o"><literal xml:lang="en">Apollo 11</literal></binding>
    </result>
  </results>
</sparql>"#;

    fn platform(response: HttpResponse) -> Arc<FakePlatform> {
        Arc::new(FakePlatform::new(metadata()).route(&format!("{API}/apis/sparql"), response))
    }

    #[test]
    fn select_rows() {
        let platform = platform(HttpResponse::new(200, SELECT));
        let results = dataset(&platform)
            .select("SELECT * { ?s ?p ?o }", ResponseMode::Decoded)
            .unwrap()
            .success()
            .unwrap();

        assert_eq!(results.headers, vec!["s", "p", "o"]);
        assert_eq!(results.len(), 1);
        let row = &results.rows[0];
        assert_eq!(row.len(), 3);
        assert_eq!(row["s"], Term::uri("http://example.com/apollo11"));
        assert!(row["p"].is_uri());
        assert!(row["o"].is_literal());
        assert_eq!(row["o"].value(), "Apollo 11");
    }

    #[test]
    fn select_failure_returns_body() {
        let platform = platform(HttpResponse::new(400, "syntax error"));
        let outcome = dataset(&platform)
            .select("SELECT", ResponseMode::Decoded)
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Failure {
                status: 400,
                body: "syntax error".into()
            }
        );
    }

    #[test]
    fn raw_select() {
        let platform = platform(HttpResponse::new(200, SELECT));
        let outcome = dataset(&platform)
            .select("SELECT * {}", ResponseMode::Raw)
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Raw {
                status: 200,
                body: SELECT.into()
            }
        );
    }

    #[test]
    fn describe_decodes_turtle() {
        let platform = platform(HttpResponse::new(
            200,
            "<http://example.com/apollo11> <http://purl.org/dc/terms/title> \"Apollo 11\" .",
        ));
        let graph = dataset(&platform)
            .describe("http://example.com/apollo11", ResponseMode::Decoded)
            .unwrap()
            .success()
            .unwrap();
        assert_eq!(graph.len(), 1);
        assert!(platform.last_url().contains("query=describe+%3Chttp"));
    }
}

mod reconciliation {
    use super::*;

    #[test]
    fn label_batch_sent_as_queries() {
        let platform = Arc::new(FakePlatform::new(metadata()).route(
            &format!("{API}/apis/reconcile"),
            HttpResponse::new(200, r#"{"q0":{"result":[]},"q1":{"result":[]}}"#),
        ));
        let dataset = dataset(&platform);
        let json = dataset
            .reconcile(["Apollo", "Gemini"], &ReconcileOptions::default(), ResponseMode::Decoded)
            .unwrap()
            .success()
            .unwrap();
        assert!(json.get("q1").is_some());

        let url = platform.last_url();
        let (_, query) = url.split_once('?').unwrap();
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(pairs[0].0, "queries");
        let payload: serde_json::Value = serde_json::from_str(&pairs[0].1).unwrap();
        assert_eq!(payload["q0"]["query"], "Apollo");
        assert_eq!(payload["q1"]["query"], "Gemini");
    }

    #[test]
    fn undecodable_json_is_error() {
        let platform = Arc::new(FakePlatform::new(metadata()).route(
            &format!("{API}/apis/reconcile"),
            HttpResponse::new(200, "<html>"),
        ));
        let result = dataset(&platform).reconcile("Apollo", &ReconcileOptions::default(), ResponseMode::Decoded);
        assert!(matches!(result, Err(Error::Decode { .. })));
    }
}

mod update {
    use super::*;

    #[test]
    fn stored_graph_comes_back_from_lookup() {
        let platform = Arc::new(FakePlatform::new(metadata()));
        let dataset = dataset(&platform);

        let mut graph = Graph::new();
        graph.insert(&triple(
            "http://example.com/apollo11",
            "http://purl.org/dc/terms/title",
            "Apollo 11",
        ));
        graph.insert(&triple(
            "http://example.com/apollo11",
            "http://purl.org/dc/terms/description",
            "First crewed \"Moon\" landing",
        ));

        let stored = dataset.store_graph(&graph, None).unwrap();
        assert_eq!(stored, Outcome::Success("stored".to_string()));

        let fetched = dataset
            .lookup("http://example.com/apollo11", ResponseMode::Decoded)
            .unwrap()
            .success()
            .unwrap();
        assert_eq!(fetched.len(), graph.len());
        for t in graph.iter() {
            assert!(fetched.contains(t), "missing {}", t);
        }
    }

    #[test]
    fn sub_graph_target_sends_nothing() {
        let platform = Arc::new(FakePlatform::new(metadata()));
        let dataset = dataset(&platform);
        let target = Some("http://example.com/graph/1");

        let changeset = ChangeSet::new(
            NamedNode::new("http://example.com/a").unwrap(),
            "tester",
            "reason",
        );
        let results = [
            dataset.store_data(b"", target, "text/turtle"),
            dataset.store_graph(&Graph::new(), target),
            dataset.store_file(std::path::Path::new("data.ttl"), target, None),
            dataset.apply_changeset(&changeset, target),
        ];
        for result in results {
            assert!(matches!(result, Err(Error::Configuration { .. })));
        }
        assert_eq!(platform.total(), 0);
    }

    #[test]
    fn store_file_infers_turtle() {
        let platform = Arc::new(FakePlatform::new(metadata()));
        let dataset = dataset(&platform);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data.nt");
        std::fs::write(
            &path,
            "<http://example.com/a> <http://example.com/p> \"x\" .\n",
        )
        .unwrap();

        dataset.store_file(&path, None, None).unwrap();
        let requests = platform.requests.lock().unwrap();
        let last = requests.last().unwrap();
        assert_eq!(last.method, Method::Post);
        assert_eq!(last.content_type.as_deref(), Some("text/turtle"));
        assert!(last.body.as_deref().unwrap().starts_with(b"<http://example.com/a>"));
    }

    #[test]
    fn changeset_posted_as_rdf_xml() {
        let platform = Arc::new(FakePlatform::new(metadata()).route(
            &format!("{API}/store"),
            HttpResponse::new(202, ""),
        ));
        let dataset = dataset(&platform);
        let mut changeset = ChangeSet::new(
            NamedNode::new("http://example.com/a").unwrap(),
            "tester",
            "rename",
        );
        changeset.add(triple("http://example.com/a", "http://purl.org/dc/terms/title", "A"));

        let outcome = dataset.apply_changeset(&changeset, None).unwrap();
        assert_eq!(outcome, Outcome::Success(String::new()));

        let requests = platform.requests.lock().unwrap();
        let last = requests.last().unwrap();
        assert_eq!(
            last.content_type.as_deref(),
            Some("application/vnd.talis.changeset+xml")
        );
        let body = String::from_utf8(last.body.clone().unwrap()).unwrap();
        assert!(body.contains("http://purl.org/vocab/changeset/schema#"));
    }
}

mod jobs {
    use super::*;

    #[test]
    fn reset_data_schedules_reset() {
        let platform = Arc::new(FakePlatform::new(metadata()).route(
            &format!("{API}/jobs"),
            HttpResponse::new(201, r#"{"status":"scheduled"}"#)
                .with_header("Location", format!("{API}/jobs/7")),
        ));
        let dataset = dataset(&platform);

        let job = dataset.reset_data().unwrap().success().unwrap();
        assert_eq!(job.uri, Some(format!("{API}/jobs/7")));
        assert_eq!(job.body.unwrap()["status"], "scheduled");

        let requests = platform.requests.lock().unwrap();
        let body: serde_json::Value =
            serde_json::from_slice(requests.last().unwrap().body.as_ref().unwrap()).unwrap();
        assert_eq!(body["jobType"], JobType::Reset.as_str());
        assert!(body["startTime"].as_str().unwrap().ends_with('Z'));
    }
}
