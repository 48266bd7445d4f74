//! SPARQL Query Results XML decoding.
//!
//! Handles the two shapes a SPARQL endpoint returns for
//! `application/sparql-results+xml`: a single `<boolean>` for ASK queries and
//! a `<head>`/`<results>` table for SELECT queries. Only elements in the
//! results namespace are considered.

use std::collections::BTreeMap;
use std::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use serde::Serialize;

use crate::error::Error;

/// Namespace of the SPARQL Query Results XML format.
pub const SPARQL_RESULTS_NS: &str = "http://www.w3.org/2005/sparql-results#";

const FORMAT: &str = "SPARQL results XML";

/// An RDF term bound in a result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Term {
    Uri {
        value: String,
    },
    Literal {
        value: String,
        #[serde(rename = "xml:lang", skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        datatype: Option<String>,
    },
    Bnode {
        value: String,
    },
}

impl Term {
    pub fn uri(value: impl Into<String>) -> Self {
        Term::Uri {
            value: value.into(),
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            language: None,
            datatype: None,
        }
    }

    pub fn bnode(value: impl Into<String>) -> Self {
        Term::Bnode {
            value: value.into(),
        }
    }

    /// Lexical text of the term.
    pub fn value(&self) -> &str {
        match self {
            Term::Uri { value } | Term::Literal { value, .. } | Term::Bnode { value } => value,
        }
    }

    pub fn is_uri(&self) -> bool {
        matches!(self, Term::Uri { .. })
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal { .. })
    }

    pub fn is_bnode(&self) -> bool {
        matches!(self, Term::Bnode { .. })
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Uri { value } => write!(f, "<{}>", value),
            Term::Literal {
                value,
                language: Some(lang),
                ..
            } => write!(f, "{:?}@{}", value, lang),
            Term::Literal {
                value,
                datatype: Some(datatype),
                ..
            } => write!(f, "{:?}^^<{}>", value, datatype),
            Term::Literal { value, .. } => write!(f, "{:?}", value),
            Term::Bnode { value } => write!(f, "_:{}", value),
        }
    }
}

/// One result row: variable name to bound term. Unbound variables are absent.
pub type Row = BTreeMap<String, Term>;

/// Decoded SELECT results.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SelectResults {
    /// Variable names in the order the `<head>` declares them.
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl SelectResults {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn in_results_ns(ns: &ResolveResult<'_>) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == SPARQL_RESULTS_NS.as_bytes())
}

fn xml_error(e: impl fmt::Display) -> Error {
    Error::decode(FORMAT, e)
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, Error> {
    match element.try_get_attribute(name).map_err(xml_error)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned())),
        None => Ok(None),
    }
}

/// Decode an ASK result.
///
/// The value is `true` iff the text of the `<boolean>` element is exactly
/// `"true"`; any other text is `false`.
///
/// # Errors
///
/// Returns `Error::Decode` if the document is not well-formed XML or has no
/// `<boolean>` element.
pub fn decode_boolean(body: &str) -> Result<bool, Error> {
    let mut reader = NsReader::from_str(body);
    let mut inside = false;
    let mut text = String::new();

    loop {
        let (ns, event) = reader.read_resolved_event().map_err(xml_error)?;
        let ours = in_results_ns(&ns);
        match event {
            Event::Start(e) if ours && e.local_name().as_ref() == b"boolean" => inside = true,
            Event::Empty(e) if ours && e.local_name().as_ref() == b"boolean" => return Ok(false),
            Event::Text(t) if inside => text.push_str(&t.unescape().map_err(xml_error)?),
            Event::CData(c) if inside => text.push_str(&String::from_utf8_lossy(&c)),
            Event::End(e) if inside && e.local_name().as_ref() == b"boolean" => {
                return Ok(text == "true");
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(xml_error("no boolean element in results"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Uri,
    Literal,
    Bnode,
}

impl ValueKind {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"uri" => Some(ValueKind::Uri),
            b"literal" => Some(ValueKind::Literal),
            b"bnode" => Some(ValueKind::Bnode),
            _ => None,
        }
    }
}

/// A `<binding>` being read. Each value slot keeps the last element of that kind.
#[derive(Default)]
struct PendingBinding {
    name: String,
    uri: Option<String>,
    literal: Option<(String, Option<String>, Option<String>)>,
    bnode: Option<String>,
}

impl PendingBinding {
    /// URI wins over Literal, Literal over BlankNode.
    fn into_term(self) -> Result<(String, Term), Error> {
        let term = if let Some(value) = self.uri {
            Term::Uri { value }
        } else if let Some((value, language, datatype)) = self.literal {
            Term::Literal {
                value,
                language,
                datatype,
            }
        } else if let Some(value) = self.bnode {
            Term::Bnode { value }
        } else {
            return Err(Error::MalformedBinding {
                variable: self.name,
            });
        };
        Ok((self.name, term))
    }
}

/// Value element currently collecting text.
struct Capture {
    kind: ValueKind,
    text: String,
    language: Option<String>,
    datatype: Option<String>,
}

impl Capture {
    fn open(kind: ValueKind, element: &BytesStart<'_>) -> Result<Self, Error> {
        let (language, datatype) = if kind == ValueKind::Literal {
            (attribute(element, "xml:lang")?, attribute(element, "datatype")?)
        } else {
            (None, None)
        };
        Ok(Self {
            kind,
            text: String::new(),
            language,
            datatype,
        })
    }

    fn close_into(self, binding: &mut PendingBinding) {
        match self.kind {
            ValueKind::Uri => binding.uri = Some(self.text),
            ValueKind::Literal => binding.literal = Some((self.text, self.language, self.datatype)),
            ValueKind::Bnode => binding.bnode = Some(self.text),
        }
    }
}

/// Decode a SELECT result table.
///
/// # Errors
///
/// Returns `Error::MalformedBinding` when a `<binding>` carries none of
/// `<uri>`, `<literal>` or `<bnode>`, and `Error::Decode` when the body is not
/// a SPARQL results document.
pub fn decode_select(body: &str) -> Result<SelectResults, Error> {
    let mut reader = NsReader::from_str(body);
    let mut results = SelectResults::default();
    let mut seen_root = false;
    let mut row: Option<Row> = None;
    let mut binding: Option<PendingBinding> = None;
    let mut capture: Option<Capture> = None;

    loop {
        let (ns, event) = reader.read_resolved_event().map_err(xml_error)?;
        let ours = in_results_ns(&ns);
        match event {
            Event::Start(e) if ours => match e.local_name().as_ref() {
                b"sparql" => seen_root = true,
                b"variable" => {
                    if let Some(name) = attribute(&e, "name")? {
                        results.headers.push(name);
                    }
                }
                b"result" => row = Some(Row::new()),
                b"binding" if row.is_some() => {
                    binding = Some(PendingBinding {
                        name: attribute(&e, "name")?.unwrap_or_default(),
                        ..PendingBinding::default()
                    });
                }
                name => {
                    if let (Some(kind), Some(_)) = (ValueKind::from_local_name(name), &binding) {
                        capture = Some(Capture::open(kind, &e)?);
                    }
                }
            },
            Event::Empty(e) if ours => match e.local_name().as_ref() {
                b"sparql" => seen_root = true,
                b"variable" => {
                    if let Some(name) = attribute(&e, "name")? {
                        results.headers.push(name);
                    }
                }
                b"result" => results.rows.push(Row::new()),
                b"binding" if row.is_some() => {
                    return Err(Error::MalformedBinding {
                        variable: attribute(&e, "name")?.unwrap_or_default(),
                    });
                }
                name => {
                    if let (Some(kind), Some(pending)) =
                        (ValueKind::from_local_name(name), binding.as_mut())
                    {
                        Capture::open(kind, &e)?.close_into(pending);
                    }
                }
            },
            Event::Text(t) => {
                if let Some(capture) = capture.as_mut() {
                    capture.text.push_str(&t.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(c) => {
                if let Some(capture) = capture.as_mut() {
                    capture.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) if ours => match e.local_name().as_ref() {
                b"binding" => {
                    if let (Some(pending), Some(current)) = (binding.take(), row.as_mut()) {
                        let (name, term) = pending.into_term()?;
                        current.insert(name, term);
                    }
                }
                b"result" => {
                    if let Some(done) = row.take() {
                        results.rows.push(done);
                    }
                }
                name => {
                    if ValueKind::from_local_name(name).is_some() {
                        if let (Some(done), Some(pending)) = (capture.take(), binding.as_mut()) {
                            done.close_into(pending);
                        }
                    }
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(xml_error("no sparql element in results namespace"));
    }
    Ok(results)
}
