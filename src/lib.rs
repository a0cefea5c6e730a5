//! # Crucible - Health Export Melting
//!
//! Splits a personal health-data export (a flat XML list of `Record`,
//! `Workout` and `ActivitySummary` elements) into one CSV file per record
//! type, ready to be loaded into relational tables.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crucible::melt::{HealthExtractor, MeltConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let extractor = HealthExtractor::new(MeltConfig::default())?;
//! let prepared = extractor.load("apple_health_export/export.xml")?;
//! println!("{}", prepared.stats().report());
//!
//! // StepCount.csv, HeartRate.csv, Workout.csv, ... next to export.xml
//! let report = extractor.write_to_dir(&prepared)?;
//! println!("{} rows written", report.rows_written);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::path::Path;

pub mod error;
pub mod melt;

// Re-export commonly used types for convenience
pub use error::MeltError;
pub use melt::{ExtractionReport, HealthExtractor, MeltConfig, StreamName};

/// Main entry point: melt an export file into CSV streams
pub fn melt_export<P: AsRef<Path>>(path: P, config: MeltConfig) -> Result<ExtractionReport> {
    let path = path.as_ref();
    let extractor = HealthExtractor::new(config).context("Invalid melt configuration")?;
    extractor
        .extract_file(path)
        .with_context(|| format!("Failed to melt {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_melting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.xml");
        std::fs::write(
            &path,
            r#"<HealthData><Record type="HKQuantityTypeIdentifierHeartRate" value="61"/></HealthData>"#,
        )
        .unwrap();

        let report = melt_export(&path, MeltConfig::default()).unwrap();

        assert_eq!(report.rows_written, 1);
        assert!(dir.path().join("HeartRate.csv").exists());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(melt_export(dir.path().join("nope.xml"), MeltConfig::default()).is_err());
    }
}
