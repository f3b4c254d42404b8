//! CSV export of the measurement list.
//!
//! Fields are joined with commas and never quoted, so a name that contains
//! a comma shifts the remaining columns of its row.

use crate::geometry::Measurement;

/// File name offered to the user for downloads.
pub const CSV_FILE_NAME: &str = "measurements.csv";

const HEADER: [&str; 6] = ["Name", "Point1X", "Point1Y", "Point2X", "Point2Y", "Distance"];

/// Error types for CSV export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Failed to finish CSV output: {0}")]
    Flush(String),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// A finished export, ready to be saved or offered for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub file_name: String,
    pub contents: String,
}

/// Render measurements as CSV, one row per measurement in list order.
pub fn export_csv(measurements: &[Measurement]) -> ExportResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(HEADER)?;
    for measurement in measurements {
        writer.write_record([
            measurement.name.clone(),
            measurement.p1.x().to_string(),
            measurement.p1.y().to_string(),
            measurement.p2.x().to_string(),
            measurement.p2.y().to_string(),
            measurement.distance.to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.error().to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Build the downloadable export for a measurement list.
pub fn build_export(measurements: &[Measurement]) -> ExportResult<CsvExport> {
    Ok(CsvExport {
        file_name: CSV_FILE_NAME.to_string(),
        contents: export_csv(measurements)?,
    })
}
