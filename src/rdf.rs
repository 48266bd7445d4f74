//! Graph decoding and serialization.

use oxrdf::Graph;
use oxrdfxml::{RdfXmlParser, RdfXmlSerializer};
use oxttl::{NTriplesParser, NTriplesSerializer, TurtleParser, TurtleSerializer};

use crate::error::Error;
use crate::response::is_success;
use crate::types::RdfSyntax;

/// Decode a response body into a graph.
///
/// A non-success `status` yields an empty graph. A success body that does not
/// parse in `syntax` is an `Error::Decode`.
pub fn decode_graph(
    status: u16,
    body: &str,
    syntax: RdfSyntax,
    base_iri: Option<&str>,
) -> Result<Graph, Error> {
    if !is_success(status) {
        return Ok(Graph::new());
    }
    parse_graph(body, syntax, base_iri)
}

/// Parse serialized RDF into a graph, resolving relative IRIs against `base_iri`.
pub fn parse_graph(body: &str, syntax: RdfSyntax, base_iri: Option<&str>) -> Result<Graph, Error> {
    let format = syntax.name();
    let mut graph = Graph::new();

    match syntax {
        RdfSyntax::Turtle => {
            let mut parser = TurtleParser::new();
            if let Some(base) = base_iri {
                parser = parser
                    .with_base_iri(base)
                    .map_err(|e| Error::decode(format, e))?;
            }
            for triple in parser.for_reader(body.as_bytes()) {
                graph.insert(&triple.map_err(|e| Error::decode(format, e))?);
            }
        }
        RdfSyntax::NTriples => {
            for triple in NTriplesParser::new().for_reader(body.as_bytes()) {
                graph.insert(&triple.map_err(|e| Error::decode(format, e))?);
            }
        }
        RdfSyntax::RdfXml => {
            let mut parser = RdfXmlParser::new();
            if let Some(base) = base_iri {
                parser = parser
                    .with_base_iri(base)
                    .map_err(|e| Error::decode(format, e))?;
            }
            for triple in parser.for_reader(body.as_bytes()) {
                graph.insert(&triple.map_err(|e| Error::decode(format, e))?);
            }
        }
    }

    tracing::trace!(format, triples = graph.len(), "parsed graph");
    Ok(graph)
}

/// Serialize a graph in `syntax`.
pub fn serialize_graph(graph: &Graph, syntax: RdfSyntax) -> Result<String, Error> {
    let format = syntax.name();
    let bytes = match syntax {
        RdfSyntax::NTriples => {
            let mut serializer = NTriplesSerializer::new().for_writer(Vec::new());
            for triple in graph.iter() {
                serializer
                    .serialize_triple(triple)
                    .map_err(|e| Error::encode(format, e))?;
            }
            serializer.finish()
        }
        RdfSyntax::Turtle => {
            let mut serializer = TurtleSerializer::new().for_writer(Vec::new());
            for triple in graph.iter() {
                serializer
                    .serialize_triple(triple)
                    .map_err(|e| Error::encode(format, e))?;
            }
            serializer.finish().map_err(|e| Error::encode(format, e))?
        }
        RdfSyntax::RdfXml => {
            let mut serializer = RdfXmlSerializer::new().for_writer(Vec::new());
            for triple in graph.iter() {
                serializer
                    .serialize_triple(triple)
                    .map_err(|e| Error::encode(format, e))?;
            }
            serializer.finish().map_err(|e| Error::encode(format, e))?
        }
    };
    String::from_utf8(bytes).map_err(|e| Error::encode(format, e))
}
