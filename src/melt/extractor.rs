use crate::error::{MeltError, Result};
use crate::melt::abbrev::AbbreviationRule;
use crate::melt::classify::{Classification, Stats, StreamPlan};
use crate::melt::document::ExportDocument;
use crate::melt::schema::SchemaSet;
use crate::melt::types::MeltConfig;
use crate::melt::writer::{DirectorySink, StreamReport, StreamRegistry, StreamSink};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Turns a health export into one CSV stream per record type
pub struct HealthExtractor {
    config: MeltConfig,
    rule: AbbreviationRule,
    schemas: SchemaSet,
}

/// A parsed and classified export, ready to be written
#[derive(Debug, Clone)]
pub struct PreparedExport {
    pub source: Option<PathBuf>,
    pub document: ExportDocument,
    pub classification: Classification,
    pub plan: StreamPlan,
}

impl PreparedExport {
    pub fn stats(&self) -> &Stats {
        &self.classification.stats
    }
}

/// Summary of one extraction run
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub source: Option<PathBuf>,
    pub nodes: usize,
    pub skipped_nodes: usize,
    pub rows_written: usize,
    pub failed_rows: usize,
    pub stats: Stats,
    pub streams: Vec<StreamReport>,
}

impl HealthExtractor {
    /// Validate the schemas and compile the abbreviation rule up front;
    /// either failing is a configuration defect and nothing is read.
    pub fn new(config: MeltConfig) -> Result<Self> {
        let rule = AbbreviationRule::new(&config.prefix_patterns, config.abbreviate)?;
        let schemas = SchemaSet::builtin()?;
        Ok(HealthExtractor { config, rule, schemas })
    }

    pub fn config(&self) -> &MeltConfig {
        &self.config
    }

    /// Read an export file and classify its nodes
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<PreparedExport> {
        let path = path.as_ref();
        info!("Reading data from {}", path.display());
        let document = ExportDocument::from_path(path)?;
        info!("Read {} nodes", document.len());

        let mut prepared = self.prepare(document)?;
        prepared.source = Some(path.to_path_buf());
        Ok(prepared)
    }

    /// Classify an already parsed document and resolve its streams
    pub fn prepare(&self, document: ExportDocument) -> Result<PreparedExport> {
        let classification = Classification::of(&document.nodes, &self.rule);
        let plan = StreamPlan::resolve(&classification)?;

        Ok(PreparedExport {
            source: None,
            document,
            classification,
            plan,
        })
    }

    /// Directory the CSV files go to: the configured one, or the input's
    pub fn output_dir_for(&self, input: &Path) -> PathBuf {
        if let Some(dir) = &self.config.output_dir {
            return dir.clone();
        }
        match input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Load `path` and write its streams next to it (or to `output_dir`)
    pub fn extract_file<P: AsRef<Path>>(&self, path: P) -> Result<ExtractionReport> {
        let prepared = self.load(path.as_ref())?;
        self.write_to_dir(&prepared)
    }

    /// Write a prepared export to CSV files in the output directory
    pub fn write_to_dir(&self, prepared: &PreparedExport) -> Result<ExtractionReport> {
        let dir = match &prepared.source {
            Some(source) => self.output_dir_for(source),
            None => self.config.output_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
        };
        let sink = DirectorySink::new(&dir)?;
        self.write(prepared, sink)
    }

    /// Write every routed node, in document order, to its stream
    pub fn write<S: StreamSink>(&self, prepared: &PreparedExport, sink: S) -> Result<ExtractionReport> {
        let mut registry = StreamRegistry::new(sink, self.schemas.clone(), self.config.verbose);

        for (index, node) in prepared.document.nodes.iter().enumerate() {
            let Some(name) = prepared.plan.route(index) else {
                continue;
            };
            let kind = prepared
                .plan
                .kind_of(name)
                .ok_or_else(|| MeltError::UnknownStream(name.to_string()))?;
            registry.write_row(name, kind, node)?;
        }

        let streams = registry.finish();
        Ok(ExtractionReport {
            source: prepared.source.clone(),
            nodes: prepared.document.len(),
            skipped_nodes: prepared.classification.skipped(),
            rows_written: streams.iter().map(|s| s.rows).sum(),
            failed_rows: streams.iter().map(|s| s.failed_rows).sum(),
            stats: prepared.classification.stats.clone(),
            streams,
        })
    }
}
