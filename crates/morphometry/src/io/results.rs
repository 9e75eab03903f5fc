use std::{fs::File, io::{Read, Write}, path::Path};

use tracing::info;
use crate::{error::Result, types::MeasurementResult};

/// Column order of the results file.
pub const RESULT_COLUMNS: [&str; 10] = [
    "ID",
    "Min Width (mm)",
    "Max Width (mm)",
    "Mean Width (mm)",
    "Width Ratio",
    "Coefficient of Variation (%)",
    "Expected Min Width (mm)",
    "Expected Max Width (mm)",
    "Min Width Error (mm)",
    "Max Width Error (mm)",
];

/// Write one row per result, in the given order, under a header row
pub fn write_results<W: Write>(writer: W, results: &[MeasurementResult]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    if results.is_empty() {
        writer.write_record(RESULT_COLUMNS)?;
    }
    for result in results {
        writer.serialize(result)?;
    }
    writer.flush()?;
    Ok(())
}

/// Save results as CSV, replacing any existing file
pub fn write_results_csv<P: AsRef<Path>>(path: P, results: &[MeasurementResult]) -> Result<()> {
    let path = path.as_ref();
    write_results(File::create(path)?, results)?;
    info!("Results saved to {} ({} rows)", path.display(), results.len());
    Ok(())
}

/// Load a results file written by [`write_results`]
pub fn read_results<R: Read>(reader: R) -> Result<Vec<MeasurementResult>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut results = Vec::new();
    for record in reader.deserialize() {
        results.push(record?);
    }
    Ok(results)
}
