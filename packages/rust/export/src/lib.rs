//! Export sinks for scored leads.
//!
//! Every sink implements [`ExportCapability`] and is chosen once, at
//! construction, from the configured [`ExportFormat`]:
//! - [`CsvExporter`]: the fixed 9-column CSV (default)
//! - [`JsonLinesExporter`]: one JSON object per lead
//! - [`NoopExporter`]: accepts rows and writes nothing
//!
//! With `[sheets] enabled`, the file sink is paired with a
//! [`SheetsExporter`] through [`MirroredExporter`].

mod csv;
mod jsonl;
mod sheets;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use leadgen_shared::{AppConfig, ExportCapability, ExportFormat, ExportRow, LeadGenError, Result};

pub use csv::CsvExporter;
pub use jsonl::JsonLinesExporter;
pub use sheets::SheetsExporter;

/// Build the file sink for `format`, writing to `path` where applicable.
pub fn file_exporter(format: ExportFormat, path: &Path) -> Arc<dyn ExportCapability> {
    match format {
        ExportFormat::Csv => Arc::new(CsvExporter::new(path)),
        ExportFormat::Jsonl => Arc::new(JsonLinesExporter::new(path)),
        ExportFormat::None => Arc::new(NoopExporter),
    }
}

/// Build the sink configured by `[output]` and `[sheets]`.
///
/// Fails when Sheets are enabled but the service-account key is unusable.
pub fn build_exporter(config: &AppConfig) -> Result<Arc<dyn ExportCapability>> {
    let file = file_exporter(config.output.format, Path::new(&config.output.file));
    if !config.sheets.enabled {
        return Ok(file);
    }
    let sheets = SheetsExporter::new(&config.sheets)?;
    Ok(Arc::new(MirroredExporter::new(file, Arc::new(sheets))))
}

/// Discards every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExporter;

#[async_trait]
impl ExportCapability for NoopExporter {
    fn location(&self) -> String {
        "(discarded)".into()
    }

    async fn write(&self, rows: &[ExportRow]) -> Result<usize> {
        tracing::debug!(rows = rows.len(), "export disabled, discarding rows");
        Ok(rows.len())
    }
}

/// Writes to `primary`, then copies the rows to `mirror`.
///
/// The primary result is the export result; a failed mirror write is
/// logged and does not fail the export.
pub struct MirroredExporter {
    primary: Arc<dyn ExportCapability>,
    mirror: Arc<dyn ExportCapability>,
}

impl MirroredExporter {
    pub fn new(primary: Arc<dyn ExportCapability>, mirror: Arc<dyn ExportCapability>) -> Self {
        Self { primary, mirror }
    }
}

#[async_trait]
impl ExportCapability for MirroredExporter {
    fn location(&self) -> String {
        format!("{} + {}", self.primary.location(), self.mirror.location())
    }

    async fn write(&self, rows: &[ExportRow]) -> Result<usize> {
        let written = self.primary.write(rows).await?;
        if let Err(e) = self.mirror.write(rows).await {
            warn!(mirror = %self.mirror.location(), error = %e, "mirror export failed");
        }
        Ok(written)
    }
}

/// Create the parent directory of `path` if it does not exist yet.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|e| LeadGenError::io(dir, e))
        }
        _ => Ok(()),
    }
}
