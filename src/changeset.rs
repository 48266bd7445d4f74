//! Change-sets: descriptions of triple additions and removals.
//!
//! Rendered in the changeset vocabulary
//! (<http://purl.org/vocab/changeset/schema#>), each added or removed triple
//! reified as an `rdf:Statement`.

use chrono::{DateTime, Utc};
use oxrdf::vocab::{rdf, xsd};
use oxrdf::{BlankNode, Graph, Literal, NamedNode, NamedOrBlankNode, Term, Triple};

use crate::error::Error;
use crate::rdf::serialize_graph;
use crate::types::RdfSyntax;

/// Changeset vocabulary namespace.
pub const CS_NS: &str = "http://purl.org/vocab/changeset/schema#";

mod cs {
    use oxrdf::NamedNodeRef;

    pub const CHANGE_SET: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://purl.org/vocab/changeset/schema#ChangeSet");
    pub const SUBJECT_OF_CHANGE: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://purl.org/vocab/changeset/schema#subjectOfChange");
    pub const CREATED_DATE: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://purl.org/vocab/changeset/schema#createdDate");
    pub const CREATOR_NAME: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://purl.org/vocab/changeset/schema#creatorName");
    pub const CHANGE_REASON: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://purl.org/vocab/changeset/schema#changeReason");
    pub const ADDITION: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://purl.org/vocab/changeset/schema#addition");
    pub const REMOVAL: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://purl.org/vocab/changeset/schema#removal");
}

/// Something that renders to a change-set graph.
pub trait ChangeDocument {
    fn to_graph(&self) -> Graph;

    /// RDF/XML body as submitted to an update endpoint.
    fn to_rdf_xml(&self) -> Result<String, Error> {
        serialize_graph(&self.to_graph(), RdfSyntax::RdfXml)
    }
}

/// Changes to the description of a single subject.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    subject_of_change: NamedNode,
    creator_name: String,
    change_reason: String,
    created: DateTime<Utc>,
    additions: Vec<Triple>,
    removals: Vec<Triple>,
}

impl ChangeSet {
    /// New empty change-set dated now.
    pub fn new(
        subject_of_change: NamedNode,
        creator_name: impl Into<String>,
        change_reason: impl Into<String>,
    ) -> Self {
        Self {
            subject_of_change,
            creator_name: creator_name.into(),
            change_reason: change_reason.into(),
            created: Utc::now(),
            additions: Vec::new(),
            removals: Vec::new(),
        }
    }

    pub fn created_at(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    pub fn subject_of_change(&self) -> &NamedNode {
        &self.subject_of_change
    }

    pub fn additions(&self) -> &[Triple] {
        &self.additions
    }

    pub fn removals(&self) -> &[Triple] {
        &self.removals
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    pub fn add(&mut self, triple: Triple) -> &mut Self {
        self.additions.push(triple);
        self
    }

    pub fn remove(&mut self, triple: Triple) -> &mut Self {
        self.removals.push(triple);
        self
    }

    fn write_into(&self, graph: &mut Graph) {
        let node = BlankNode::default();
        graph.insert(&Triple::new(
            node.clone(),
            rdf::TYPE.into_owned(),
            cs::CHANGE_SET.into_owned(),
        ));
        graph.insert(&Triple::new(
            node.clone(),
            cs::SUBJECT_OF_CHANGE.into_owned(),
            self.subject_of_change.clone(),
        ));
        graph.insert(&Triple::new(
            node.clone(),
            cs::CREATED_DATE.into_owned(),
            Literal::new_typed_literal(
                self.created.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                xsd::DATE_TIME.into_owned(),
            ),
        ));
        graph.insert(&Triple::new(
            node.clone(),
            cs::CREATOR_NAME.into_owned(),
            Literal::new_simple_literal(&self.creator_name),
        ));
        graph.insert(&Triple::new(
            node.clone(),
            cs::CHANGE_REASON.into_owned(),
            Literal::new_simple_literal(&self.change_reason),
        ));

        for (link, triples) in [(cs::ADDITION, &self.additions), (cs::REMOVAL, &self.removals)] {
            for triple in triples {
                let statement = BlankNode::default();
                graph.insert(&Triple::new(node.clone(), link.into_owned(), statement.clone()));
                reify(graph, statement, triple);
            }
        }
    }
}

fn reify(graph: &mut Graph, statement: BlankNode, triple: &Triple) {
    let subject: Term = match &triple.subject {
        NamedOrBlankNode::NamedNode(n) => n.clone().into(),
        NamedOrBlankNode::BlankNode(b) => b.clone().into(),
    };
    graph.insert(&Triple::new(
        statement.clone(),
        rdf::TYPE.into_owned(),
        rdf::STATEMENT.into_owned(),
    ));
    graph.insert(&Triple::new(
        statement.clone(),
        rdf::SUBJECT.into_owned(),
        subject,
    ));
    graph.insert(&Triple::new(
        statement.clone(),
        rdf::PREDICATE.into_owned(),
        triple.predicate.clone(),
    ));
    graph.insert(&Triple::new(
        statement,
        rdf::OBJECT.into_owned(),
        triple.object.clone(),
    ));
}

impl ChangeDocument for ChangeSet {
    fn to_graph(&self) -> Graph {
        let mut graph = Graph::new();
        self.write_into(&mut graph);
        graph
    }
}

/// Changes spanning several subjects, one [`ChangeSet`] per subject.
///
/// Subjects keep the order they were first touched in. Triples with a blank
/// node subject cannot be a subject of change and are rejected.
#[derive(Debug, Clone)]
pub struct BatchChangeSet {
    creator_name: String,
    change_reason: String,
    changesets: Vec<ChangeSet>,
}

impl BatchChangeSet {
    pub fn new(creator_name: impl Into<String>, change_reason: impl Into<String>) -> Self {
        Self {
            creator_name: creator_name.into(),
            change_reason: change_reason.into(),
            changesets: Vec::new(),
        }
    }

    pub fn changesets(&self) -> &[ChangeSet] {
        &self.changesets
    }

    pub fn add(&mut self, triple: Triple) -> Result<&mut Self, Error> {
        self.changeset_for(&triple)?.add(triple);
        Ok(self)
    }

    pub fn remove(&mut self, triple: Triple) -> Result<&mut Self, Error> {
        self.changeset_for(&triple)?.remove(triple);
        Ok(self)
    }

    fn changeset_for(&mut self, triple: &Triple) -> Result<&mut ChangeSet, Error> {
        let NamedOrBlankNode::NamedNode(subject) = &triple.subject else {
            return Err(Error::Configuration {
                message: format!("change-set subject must be a named node: {}", triple.subject),
            });
        };
        let index = match self
            .changesets
            .iter()
            .position(|c| c.subject_of_change == *subject)
        {
            Some(index) => index,
            None => {
                self.changesets.push(ChangeSet::new(
                    subject.clone(),
                    self.creator_name.clone(),
                    self.change_reason.clone(),
                ));
                self.changesets.len() - 1
            }
        };
        Ok(&mut self.changesets[index])
    }
}

impl ChangeDocument for BatchChangeSet {
    fn to_graph(&self) -> Graph {
        let mut graph = Graph::new();
        for changeset in &self.changesets {
            changeset.write_into(&mut graph);
        }
        graph
    }
}
