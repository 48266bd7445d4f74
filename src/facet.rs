//! Facet results returned by a search endpoint's `/facet` resource.
//!
//! ```xml
//! <facet-results xmlns="http://schemas.talis.com/2007/facet-results#">
//!   <head>...</head>
//!   <fields>
//!     <field name="type">
//!       <term number="12" search-uri="...">City</term>
//!     </field>
//!   </fields>
//! </facet-results>
//! ```

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

use crate::error::Error;

const FORMAT: &str = "facet results XML";

/// One facet value and how many items carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetTerm {
    pub value: String,
    pub number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_uri: Option<String>,
}

/// Terms for one requested field, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetField {
    pub name: String,
    pub terms: Vec<FacetTerm>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FacetResults {
    pub fields: Vec<FacetField>,
}

impl FacetResults {
    /// Terms of the named field.
    pub fn field(&self, name: &str) -> Option<&[FacetTerm]> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.terms.as_slice())
    }
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, Error> {
    match element
        .try_get_attribute(name)
        .map_err(|e| Error::decode(FORMAT, e))?
    {
        Some(attr) => Ok(Some(
            attr.unescape_value()
                .map_err(|e| Error::decode(FORMAT, e))?
                .into_owned(),
        )),
        None => Ok(None),
    }
}

struct PendingTerm {
    value: Option<String>,
    text: String,
    number: u64,
    search_uri: Option<String>,
}

impl PendingTerm {
    fn open(element: &BytesStart<'_>) -> Result<Self, Error> {
        let number = match attribute(element, "number")? {
            Some(n) => n
                .trim()
                .parse()
                .map_err(|_| Error::decode(FORMAT, format!("term number {:?} is not a count", n)))?,
            None => 0,
        };
        Ok(Self {
            value: attribute(element, "value")?,
            text: String::new(),
            number,
            search_uri: attribute(element, "search-uri")?,
        })
    }

    fn finish(self) -> FacetTerm {
        FacetTerm {
            value: self.value.unwrap_or_else(|| self.text.trim().to_string()),
            number: self.number,
            search_uri: self.search_uri,
        }
    }
}

/// Decode a facet results document.
pub fn decode_facets(body: &str) -> Result<FacetResults, Error> {
    let mut reader = Reader::from_str(body);
    let mut results = FacetResults::default();
    let mut seen_root = false;
    let mut field: Option<FacetField> = None;
    let mut term: Option<PendingTerm> = None;

    loop {
        match reader.read_event().map_err(|e| Error::decode(FORMAT, e))? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"facet-results" => seen_root = true,
                b"field" => {
                    field = Some(FacetField {
                        name: attribute(&e, "name")?.unwrap_or_default(),
                        terms: Vec::new(),
                    });
                }
                b"term" if field.is_some() => term = Some(PendingTerm::open(&e)?),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"facet-results" => seen_root = true,
                b"field" => results.fields.push(FacetField {
                    name: attribute(&e, "name")?.unwrap_or_default(),
                    terms: Vec::new(),
                }),
                b"term" => {
                    if let Some(current) = field.as_mut() {
                        current.terms.push(PendingTerm::open(&e)?.finish());
                    }
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some(pending) = term.as_mut() {
                    pending
                        .text
                        .push_str(&t.unescape().map_err(|e| Error::decode(FORMAT, e))?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"term" => {
                    if let (Some(pending), Some(current)) = (term.take(), field.as_mut()) {
                        current.terms.push(pending.finish());
                    }
                }
                b"field" => {
                    if let Some(done) = field.take() {
                        results.fields.push(done);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(Error::decode(FORMAT, "no facet-results element"));
    }
    Ok(results)
}
