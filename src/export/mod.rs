use anyhow::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::db::FingerprintRecord;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "JSON",
            ExportFormat::Csv => "CSV",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }
}

/// Write fingerprint records to a file, returning how many were exported.
pub fn export_records(
    records: &[FingerprintRecord],
    output_path: &Path,
    format: ExportFormat,
) -> Result<usize> {
    match format {
        ExportFormat::Json => export_json(records, output_path)?,
        ExportFormat::Csv => export_csv(records, output_path)?,
    }

    Ok(records.len())
}

fn export_json(records: &[FingerprintRecord], output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

fn export_csv(records: &[FingerprintRecord], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    wtr.write_record([
        "id",
        "filename",
        "uploaded_at",
        "content_hash",
        "perceptual_hash",
    ])?;

    for record in records {
        wtr.write_record([
            record.id.to_string(),
            record.filename.clone(),
            record.uploaded_at.clone(),
            record.content_hash.clone(),
            record.perceptual_hash.clone(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
