//! Error types for health export melting

use crate::melt::types::Kind;
use thiserror::Error;

/// Errors that abort an extraction run
#[derive(Error, Debug)]
pub enum MeltError {
    /// I/O failure reading the export or creating an output stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The export document is not well-formed XML
    #[error("XML parse error at byte {position}: {message}")]
    Parse { position: u64, message: String },

    /// The document has no root element
    #[error("Export document has no root element")]
    MissingRoot,

    /// Input ended while elements were still open
    #[error("Unexpected end of document ({0} element(s) left open)")]
    UnexpectedEof(usize),

    /// A schema table declares a datatype marker we don't know
    #[error("Unexpected format value: {0}")]
    UnexpectedDatatype(char),

    /// An abbreviation pattern failed to compile or has the wrong shape
    #[error("Invalid abbreviation pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Two structural kinds resolved to the same output stream
    #[error("Stream {stream} claimed by both {first} and {second}")]
    StreamConflict { stream: String, first: Kind, second: Kind },

    /// A row was routed to a stream that was never planned
    #[error("No output stream for {0}")]
    UnknownStream(String),
}

pub type Result<T> = std::result::Result<T, MeltError>;
