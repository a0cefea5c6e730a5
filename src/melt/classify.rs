//! Node classification, frequency tallies and stream resolution
//!
//! Classification happens once per run, before any output is opened. The
//! parsed nodes are never modified: each `Record` discriminator is resolved
//! to its abbreviated stream name alongside the node, and a separate
//! [`StreamPlan`] maps node positions to streams.

use crate::error::{MeltError, Result};
use crate::melt::abbrev::AbbreviationRule;
use crate::melt::types::{Kind, Node, StreamName};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Tags that are expected in an export but carry no rows
pub const IGNORED_TAGS: &[&str] = &["Export", "Me"];

/// What a node is, decided once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeClass {
    /// A `Record`, with its discriminator resolved to a stream name
    Discriminated(StreamName),
    /// A `Workout` or `ActivitySummary`; the tag is the discriminator
    Structural(Kind),
    /// `Export` or `Me`
    Ignored,
    /// A `Record` without a `type` attribute
    MissingDiscriminator,
    /// A `Record` whose resolved name can't be used as a file name
    InvalidStreamName(String),
    /// Any other tag
    Unexpected(String),
}

impl NodeClass {
    pub fn of(node: &Node, rule: &AbbreviationRule) -> Self {
        match Kind::from_tag(&node.tag) {
            Some(Kind::Record) => match node.get("type") {
                Some(discriminator) => match StreamName::checked(rule.apply(discriminator)) {
                    Some(name) => NodeClass::Discriminated(name),
                    None => NodeClass::InvalidStreamName(discriminator.to_string()),
                },
                None => NodeClass::MissingDiscriminator,
            },
            Some(kind) => NodeClass::Structural(kind),
            None if IGNORED_TAGS.contains(&node.tag.as_str()) => NodeClass::Ignored,
            None => NodeClass::Unexpected(node.tag.clone()),
        }
    }
}

/// Occurrence counts collected over one document
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    /// Per raw element tag
    pub tags: BTreeMap<String, usize>,
    /// Per attribute name, across all nodes
    pub fields: BTreeMap<String, usize>,
    /// Per `Record` stream name (after abbreviation)
    pub record_types: BTreeMap<String, usize>,
    /// Per structural kind for `Workout` / `ActivitySummary`
    pub other_types: BTreeMap<String, usize>,
    /// Tags outside the recognized set, plus `Record` nodes missing `type`
    /// or with a type that can't name a file
    pub unexpected: BTreeMap<String, usize>,
}

impl Stats {
    /// Human-readable report of tags, fields and record types, sorted by name
    pub fn report(&self) -> String {
        format!(
            "Tags:\n{}\n\nFields:\n{}\n\nRecord types:\n{}\n",
            format_freqs(&self.tags),
            format_freqs(&self.fields),
            format_freqs(&self.record_types),
        )
    }

    /// Count for a structural kind (zero when none were seen)
    pub fn kind_count(&self, kind: Kind) -> usize {
        match kind {
            Kind::Record => self.record_types.values().sum(),
            other => self.other_types.get(other.as_str()).copied().unwrap_or(0),
        }
    }
}

fn format_freqs(counter: &BTreeMap<String, usize>) -> String {
    counter
        .iter()
        .map(|(name, count)| format!("{}: {}", name, count))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Per-node classes plus the tallies derived from them
#[derive(Debug, Clone)]
pub struct Classification {
    pub classes: Vec<NodeClass>,
    pub stats: Stats,
}

impl Classification {
    /// Classify every node and collect the tallies. Unexpected nodes are
    /// reported and otherwise left alone.
    pub fn of(nodes: &[Node], rule: &AbbreviationRule) -> Self {
        let mut stats = Stats::default();
        let mut classes = Vec::with_capacity(nodes.len());

        for node in nodes {
            *stats.tags.entry(node.tag.clone()).or_insert(0) += 1;
            for name in node.attributes.keys() {
                *stats.fields.entry(name.clone()).or_insert(0) += 1;
            }

            let class = NodeClass::of(node, rule);
            match &class {
                NodeClass::Discriminated(name) => {
                    *stats.record_types.entry(name.to_string()).or_insert(0) += 1;
                }
                NodeClass::Structural(kind) => {
                    *stats.other_types.entry(kind.as_str().to_string()).or_insert(0) += 1;
                }
                NodeClass::Ignored => {}
                NodeClass::MissingDiscriminator => {
                    warn!("Record node without a type attribute, skipping");
                    *stats.unexpected.entry("Record (no type)".to_string()).or_insert(0) += 1;
                }
                NodeClass::InvalidStreamName(discriminator) => {
                    warn!("Record type {:?} can't name an output file, skipping", discriminator);
                    *stats.unexpected.entry("Record (invalid type)".to_string()).or_insert(0) += 1;
                }
                NodeClass::Unexpected(tag) => {
                    warn!("Unexpected node of type {}.", tag);
                    *stats.unexpected.entry(tag.clone()).or_insert(0) += 1;
                }
            }
            classes.push(class);
        }

        Classification { classes, stats }
    }

    /// Number of nodes that produce no row
    pub fn skipped(&self) -> usize {
        self.classes
            .iter()
            .filter(|class| !matches!(class, NodeClass::Discriminated(_) | NodeClass::Structural(_)))
            .count()
    }
}

/// A stream the plan will write to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedStream {
    pub kind: Kind,
    pub rows: usize,
}

/// Node index -> resolved stream name, built once before writing
#[derive(Debug, Clone)]
pub struct StreamPlan {
    routes: Vec<Option<StreamName>>,
    streams: BTreeMap<StreamName, PlannedStream>,
}

impl StreamPlan {
    /// Resolve every classified node to its output stream.
    ///
    /// `Record` nodes use their resolved discriminator; the other kinds use
    /// their tag. Two kinds resolving to the same stream name is an error,
    /// since their headers differ.
    pub fn resolve(classification: &Classification) -> Result<Self> {
        let mut routes = Vec::with_capacity(classification.classes.len());
        let mut streams: BTreeMap<StreamName, PlannedStream> = BTreeMap::new();

        for class in &classification.classes {
            let target = match class {
                NodeClass::Discriminated(name) => Some((name.clone(), Kind::Record)),
                NodeClass::Structural(kind) => Some((StreamName::new(kind.as_str()), *kind)),
                _ => None,
            };

            let route = match target {
                Some((name, kind)) => {
                    let planned = streams
                        .entry(name.clone())
                        .or_insert(PlannedStream { kind, rows: 0 });
                    if planned.kind != kind {
                        return Err(MeltError::StreamConflict {
                            stream: name.0,
                            first: planned.kind,
                            second: kind,
                        });
                    }
                    planned.rows += 1;
                    Some(name)
                }
                None => None,
            };
            routes.push(route);
        }

        Ok(StreamPlan { routes, streams })
    }

    /// Stream for the node at `index`, if it produces a row
    pub fn route(&self, index: usize) -> Option<&StreamName> {
        self.routes.get(index).and_then(Option::as_ref)
    }

    pub fn streams(&self) -> &BTreeMap<StreamName, PlannedStream> {
        &self.streams
    }

    pub fn kind_of(&self, name: &StreamName) -> Option<Kind> {
        self.streams.get(name).map(|planned| planned.kind)
    }

    pub fn total_rows(&self) -> usize {
        self.streams.values().map(|planned| planned.rows).sum()
    }
}
