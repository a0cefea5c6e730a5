use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Default prefix pattern: `HKQuantityTypeIdentifierStepCount` -> `StepCount`
pub const DEFAULT_PREFIX_PATTERN: &str = r"^HK.*TypeIdentifier(.+)$";

/// The structural kinds of node, each governed by its own schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Record,
    Workout,
    ActivitySummary,
}

impl Kind {
    pub const ALL: [Kind; 3] = [Kind::Record, Kind::Workout, Kind::ActivitySummary];

    /// Map an element tag to its structural kind, if it has one
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Record" => Some(Kind::Record),
            "Workout" => Some(Kind::Workout),
            "ActivitySummary" => Some(Kind::ActivitySummary),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Record => "Record",
            Kind::Workout => "Workout",
            Kind::ActivitySummary => "ActivitySummary",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared datatype of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// Quoted and escaped on output
    String,
    /// Emitted verbatim
    Numeric,
    /// Emitted verbatim, e.g. `2020-01-01 08:00:00 -0400`
    DateTime,
}

impl FieldType {
    /// Whether a loader should coerce this column to a timestamp
    pub fn is_date_like(self) -> bool {
        matches!(self, FieldType::DateTime)
    }
}

/// One direct child of the export root: a single observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub tag: String,
    pub attributes: HashMap<String, String>,
}

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Node {
            tag: tag.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Name of one logical output stream (and, downstream, one table)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamName(pub String);

impl StreamName {
    pub fn new(name: impl Into<String>) -> Self {
        StreamName(name.into())
    }

    /// Accept a name only if it is usable as a bare file stem: not empty,
    /// not `.`/`..`, and free of path separators and control characters.
    pub fn checked(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        let unsafe_char = |c: char| matches!(c, '/' | '\\' | ':') || c.is_control();
        if name.is_empty() || name == "." || name == ".." || name.contains(unsafe_char) {
            return None;
        }
        Some(StreamName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<name>.csv`
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.0)
    }

    /// Relational table identifier the loader derives from the file name
    pub fn table_name(&self) -> String {
        self.0.to_lowercase()
    }
}

impl std::fmt::Display for StreamName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration for the melting process
#[derive(Debug, Clone)]
pub struct MeltConfig {
    /// Shorten `Record` discriminators with `prefix_patterns`
    pub abbreviate: bool,

    /// Regexes with exactly one capture group; the capture becomes the stream name
    pub prefix_patterns: Vec<String>,

    /// Report opened/written streams at info level instead of debug
    pub verbose: bool,

    /// Where to write the CSV files (defaults to the input's directory)
    pub output_dir: Option<PathBuf>,
}

impl Default for MeltConfig {
    fn default() -> Self {
        MeltConfig {
            abbreviate: true,
            prefix_patterns: vec![DEFAULT_PREFIX_PATTERN.to_string()],
            verbose: true,
            output_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_tag() {
        assert_eq!(Kind::from_tag("Record"), Some(Kind::Record));
        assert_eq!(Kind::from_tag("Workout"), Some(Kind::Workout));
        assert_eq!(Kind::from_tag("ActivitySummary"), Some(Kind::ActivitySummary));
        assert_eq!(Kind::from_tag("Export"), None);
        assert_eq!(Kind::from_tag("record"), None);
    }

    #[test]
    fn test_stream_name_derivations() {
        let name = StreamName::new("StepCount");
        assert_eq!(name.file_name(), "StepCount.csv");
        assert_eq!(name.table_name(), "stepcount");
    }

    #[test]
    fn test_checked_rejects_path_like_names() {
        assert_eq!(StreamName::checked("StepCount"), Some(StreamName::new("StepCount")));
        assert_eq!(StreamName::checked("Heart.Rate"), Some(StreamName::new("Heart.Rate")));
        for bad in ["", ".", "..", "../escaped", "Foo/Bar", "/etc/passwd", "C:\\x", "a\\b", "tab\there"] {
            assert_eq!(StreamName::checked(bad), None, "accepted {:?}", bad);
        }
    }
}
