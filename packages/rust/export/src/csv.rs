//! Append-only CSV export.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info};

use leadgen_shared::{EXPORT_COLUMNS, ExportCapability, ExportRow, LeadGenError, Result};

use crate::ensure_parent_dir;

/// Appends rows to a CSV file, writing the header only into a new or empty file.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ExportCapability for CsvExporter {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn write(&self, rows: &[ExportRow]) -> Result<usize> {
        ensure_parent_dir(&self.path)?;

        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let mut out = String::new();
        if needs_header {
            debug!(path = %self.path.display(), "writing CSV header");
            push_record(&mut out, &EXPORT_COLUMNS);
        }
        for row in rows {
            push_record(&mut out, &row.values());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LeadGenError::io(&self.path, e))?;
        file.write_all(out.as_bytes())
            .map_err(|e| LeadGenError::io(&self.path, e))?;

        info!(rows = rows.len(), path = %self.path.display(), "appended leads to CSV");
        Ok(rows.len())
    }
}

fn push_record(out: &mut String, fields: &[&str]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(field));
    }
    out.push('\n');
}

/// RFC 4180 minimal quoting: quote only fields containing a comma, quote,
/// CR or LF, doubling embedded quotes.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
