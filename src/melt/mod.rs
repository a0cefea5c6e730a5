//! Health export melting - split an XML export into one CSV per record type
//!
//! The run is a single forward pass: parse the document, classify and tally
//! its nodes, resolve each node to a stream name, then write rows in
//! document order and close every stream.

pub mod types;
pub mod schema;
pub mod abbrev;
pub mod document;
pub mod classify;
pub mod format;
pub mod writer;
pub mod extractor;

pub use types::{FieldType, Kind, MeltConfig, Node, StreamName, DEFAULT_PREFIX_PATTERN};
pub use schema::{KindSchema, SchemaSet};
pub use abbrev::AbbreviationRule;
pub use document::ExportDocument;
pub use classify::{Classification, NodeClass, PlannedStream, Stats, StreamPlan};
pub use format::{format_row, format_value, header_line};
pub use writer::{DirectorySink, RowFile, StreamRegistry, StreamReport, StreamSink, Truncate};
pub use extractor::{ExtractionReport, HealthExtractor, PreparedExport};
