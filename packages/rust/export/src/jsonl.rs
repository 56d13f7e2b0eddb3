//! Append-only JSON Lines export.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use leadgen_shared::{ExportCapability, ExportRow, LeadGenError, Result};

use crate::ensure_parent_dir;

/// Appends one JSON object per row; keys follow the export column order.
#[derive(Debug, Clone)]
pub struct JsonLinesExporter {
    path: PathBuf,
}

impl JsonLinesExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ExportCapability for JsonLinesExporter {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn write(&self, rows: &[ExportRow]) -> Result<usize> {
        ensure_parent_dir(&self.path)?;

        let mut out = String::new();
        for row in rows {
            let line = serde_json::to_string(row)
                .map_err(|e| LeadGenError::Export(format!("failed to serialize row: {e}")))?;
            out.push_str(&line);
            out.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LeadGenError::io(&self.path, e))?;
        file.write_all(out.as_bytes())
            .map_err(|e| LeadGenError::io(&self.path, e))?;

        info!(rows = rows.len(), path = %self.path.display(), "appended leads to JSON Lines");
        Ok(rows.len())
    }
}
