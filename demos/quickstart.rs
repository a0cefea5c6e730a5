/// Quickstart example - melt a tiny export into CSV files
use crucible::melt::{DirectorySink, ExportDocument, HealthExtractor, MeltConfig};

const EXPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<HealthData locale="en_US">
 <ExportDate value="2020-01-02 09:00:00 -0400"/>
 <Me HKCharacteristicTypeIdentifierBiologicalSex="HKBiologicalSexFemale"/>
 <Record type="HKQuantityTypeIdentifierStepCount" sourceName="Phone" unit="count"
         startDate="2020-01-01 08:00:00 -0400" endDate="2020-01-01 08:10:00 -0400" value="420"/>
 <Record type="HKQuantityTypeIdentifierHeartRate" sourceName="Watch" unit="count/min"
         startDate="2020-01-01 08:05:00 -0400" endDate="2020-01-01 08:05:00 -0400" value="72"/>
 <Record type="HKQuantityTypeIdentifierStepCount" sourceName="Phone" unit="count"
         startDate="2020-01-01 09:00:00 -0400" endDate="2020-01-01 09:10:00 -0400" value="815"/>
 <Workout workoutActivityType="HKWorkoutActivityTypeWalking" duration="12.5" durationUnit="min"/>
 <ActivitySummary dateComponents="2020-01-01" activeEnergyBurned="410" appleStandHours="11"/>
</HealthData>
"#;

fn main() -> anyhow::Result<()> {
    println!("=== Health Export Melt Quick Start ===\n");

    // Step 1: Create an extractor (abbreviation on, default prefix pattern)
    let extractor = HealthExtractor::new(MeltConfig::default())?;

    // Step 2: Parse and classify the export
    let prepared = extractor.prepare(ExportDocument::parse_str(EXPORT)?)?;
    println!("{}", prepared.stats().report());

    // Step 3: Write one CSV per stream
    let out_dir = std::env::temp_dir().join("crucible-quickstart");
    let report = extractor.write(&prepared, DirectorySink::new(&out_dir)?)?;

    println!("Wrote {} rows, skipped {} nodes:", report.rows_written, report.skipped_nodes);
    for stream in &report.streams {
        println!("  • {:<16} {} rows -> {}", stream.name, stream.rows, stream.location);
    }

    println!("\nTry:");
    println!("  cat {}", out_dir.join("StepCount.csv").display());

    Ok(())
}
