//! Scoring and export stage.

use std::fmt;

use serde::Serialize;
use tracing::{error, info};

use leadgen_shared::{ExportCapability, ExportRow, LeadRecord, LeadScore};

/// How many records landed in each tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub hot: usize,
    pub warm: usize,
    pub cold: usize,
}

impl TierCounts {
    pub fn total(&self) -> usize {
        self.hot + self.warm + self.cold
    }
}

impl fmt::Display for TierCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} hot, {} warm, {} cold", self.hot, self.warm, self.cold)
    }
}

/// What happened to the export batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportStatus {
    Written { rows: usize, location: String },
    Failed { reason: String },
}

impl ExportStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Written { rows, location } => write!(f, "{rows} rows written to {location}"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Score every record (advancing it to `Scored`).
pub fn score_all(records: &mut [LeadRecord]) -> TierCounts {
    let mut tiers = TierCounts::default();
    for record in records.iter_mut() {
        match record.score() {
            LeadScore::Hot => tiers.hot += 1,
            LeadScore::Warm => tiers.warm += 1,
            LeadScore::Cold => tiers.cold += 1,
        }
    }
    tiers
}

/// Hand all rows to the export sink in one batch.
pub async fn export_records(
    records: &[LeadRecord],
    export: &dyn ExportCapability,
) -> ExportStatus {
    let rows: Vec<ExportRow> = records.iter().map(LeadRecord::to_export_row).collect();
    let location = export.location();

    match export.write(&rows).await {
        Ok(written) => {
            info!(rows = written, location = %location, "export complete");
            ExportStatus::Written {
                rows: written,
                location,
            }
        }
        Err(e) => {
            error!(location = %location, error = %e, "export failed");
            ExportStatus::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// Score the batch, then export it.
pub async fn score_and_export(
    records: &mut [LeadRecord],
    export: &dyn ExportCapability,
) -> (TierCounts, ExportStatus) {
    let tiers = score_all(records);
    let status = export_records(records, export).await;
    (tiers, status)
}
