//! The lead record carried through the pipeline, its status enums, and the
//! scoring rule.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{LeadGenError, Result};

/// Upper bound on the word count of an outreach message.
pub const MAX_OUTREACH_WORDS: usize = 120;

/// Export columns, in the order they are written.
pub const EXPORT_COLUMNS: [&str; 9] = [
    "agency_name",
    "country",
    "website",
    "services",
    "niche",
    "contact_name",
    "email",
    "lead_score",
    "outreach_message",
];

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email regex")
});

/// Whether `s` is shaped like an email address.
pub fn looks_like_email(s: &str) -> bool {
    EMAIL_RE.is_match(s)
}

/// Whitespace-delimited word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Whether a website query parameter only carries referral tracking
/// (`utm_*`, click ids, `ref`) and says nothing about the site itself.
pub fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || matches!(key.as_str(), "ref" | "gclid" | "fbclid" | "msclkid")
}

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Outcome of the enrichment stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    #[default]
    Pending,
    Complete,
    Incomplete,
}

/// Outcome of the contact stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    #[default]
    Pending,
    Found,
    NotFound,
}

/// Lead quality tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadScore {
    Hot,
    Warm,
    #[default]
    Cold,
}

impl LeadScore {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "Hot",
            Self::Warm => "Warm",
            Self::Cold => "Cold",
        }
    }
}

impl fmt::Display for LeadScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a record in the pipeline. Only ever moves forward.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RecordStage {
    #[default]
    Seeded,
    Enriched,
    ContactResolved,
    MessageDrafted,
    Scored,
}

// ---------------------------------------------------------------------------
// LeadRecord
// ---------------------------------------------------------------------------

/// One agency lead, progressively filled in by the pipeline stages.
///
/// Fields are only reachable through accessors so the stage invariants hold:
/// later stages never clear what earlier ones set, `email` always looks like
/// an address, and `message_length` always matches `outreach_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadRecord {
    agency_name: String,
    website: String,
    country: String,

    services: Option<String>,
    niche: Option<String>,
    notes: Option<String>,
    enrichment_status: EnrichmentStatus,

    contact_name: Option<String>,
    email: Option<String>,
    contact_status: ContactStatus,

    outreach_message: Option<String>,
    message_length: Option<usize>,

    lead_score: LeadScore,
    stage: RecordStage,
}

impl LeadRecord {
    /// Create a seed record. All three fields are required.
    pub fn new(
        agency_name: impl Into<String>,
        website: impl Into<String>,
        country: impl Into<String>,
    ) -> Result<Self> {
        let agency_name = agency_name.into().trim().to_string();
        let website = website.into().trim().to_string();
        let country = country.into().trim().to_string();

        let missing: Vec<&str> = [
            ("agency_name", &agency_name),
            ("website", &website),
            ("country", &country),
        ]
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| *name)
        .collect();

        if !missing.is_empty() {
            return Err(LeadGenError::validation(format!(
                "lead record requires non-empty {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            agency_name,
            website,
            country,
            services: None,
            niche: None,
            notes: None,
            enrichment_status: EnrichmentStatus::Pending,
            contact_name: None,
            email: None,
            contact_status: ContactStatus::Pending,
            outreach_message: None,
            message_length: None,
            lead_score: LeadScore::Cold,
            stage: RecordStage::Seeded,
        })
    }

    pub fn agency_name(&self) -> &str {
        &self.agency_name
    }

    pub fn website(&self) -> &str {
        &self.website
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn services(&self) -> Option<&str> {
        self.services.as_deref()
    }

    pub fn niche(&self) -> Option<&str> {
        self.niche.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn enrichment_status(&self) -> EnrichmentStatus {
        self.enrichment_status
    }

    pub fn contact_name(&self) -> Option<&str> {
        self.contact_name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn contact_status(&self) -> ContactStatus {
        self.contact_status
    }

    pub fn outreach_message(&self) -> Option<&str> {
        self.outreach_message.as_deref()
    }

    pub fn message_length(&self) -> Option<usize> {
        self.message_length
    }

    /// The tier stored by the last call to [`LeadRecord::score`].
    pub fn lead_score(&self) -> LeadScore {
        self.lead_score
    }

    pub fn stage(&self) -> RecordStage {
        self.stage
    }

    /// Move the record forward to `stage`. Backward moves are ignored.
    pub fn advance_to(&mut self, stage: RecordStage) {
        if stage > self.stage {
            self.stage = stage;
        }
    }

    // --- Enrichment -------------------------------------------------------

    /// Record a successful enrichment. `None` values never clear earlier data.
    pub fn mark_enriched(
        &mut self,
        services: Option<String>,
        niche: Option<String>,
        notes: Option<String>,
    ) {
        if let Some(services) = non_empty(services) {
            self.services = Some(services);
        }
        if let Some(niche) = non_empty(niche) {
            self.niche = Some(niche);
        }
        if let Some(notes) = non_empty(notes) {
            self.notes = Some(notes);
        }
        self.enrichment_status = EnrichmentStatus::Complete;
    }

    /// Record a failed enrichment attempt.
    ///
    /// A record that was already enriched keeps its data and status; a failed
    /// refresh only shows up in the logs.
    pub fn mark_enrichment_failed(&mut self, reason: &str) {
        if self.enrichment_status == EnrichmentStatus::Complete {
            return;
        }
        self.enrichment_status = EnrichmentStatus::Incomplete;
        self.notes = Some(format!("Enrichment failed: {reason}"));
    }

    // --- Contact ----------------------------------------------------------

    /// Attach whatever contact details were resolved and settle the status.
    ///
    /// Invalid email strings are ignored. The status is `Found` only when
    /// both a name and an email are present afterwards.
    pub fn record_contact(
        &mut self,
        contact_name: Option<String>,
        email: Option<String>,
    ) -> ContactStatus {
        if let Some(name) = non_empty(contact_name) {
            self.contact_name = Some(name);
        }
        if let Some(email) = email.map(|e| e.trim().to_lowercase()) {
            if looks_like_email(&email) {
                self.email = Some(email);
            }
        }
        self.contact_status = if self.contact_name.is_some() && self.email.is_some() {
            ContactStatus::Found
        } else {
            ContactStatus::NotFound
        };
        self.contact_status
    }

    // --- Outreach ---------------------------------------------------------

    /// Store an outreach message. It must be non-empty and within
    /// [`MAX_OUTREACH_WORDS`].
    pub fn set_outreach(&mut self, message: impl Into<String>) -> Result<()> {
        let message = message.into().trim().to_string();
        let words = word_count(&message);
        if words == 0 {
            return Err(LeadGenError::validation("outreach message is empty"));
        }
        if words > MAX_OUTREACH_WORDS {
            return Err(LeadGenError::validation(format!(
                "outreach message has {words} words, limit is {MAX_OUTREACH_WORDS}"
            )));
        }
        self.outreach_message = Some(message);
        self.message_length = Some(words);
        Ok(())
    }

    // --- Scoring ----------------------------------------------------------

    /// Classify the record. Pure: the first matching rule wins, in the order
    /// Hot, Warm, Cold.
    pub fn compute_score(&self) -> LeadScore {
        if self.email.is_some() && self.enrichment_status == EnrichmentStatus::Complete {
            LeadScore::Hot
        } else if !self.website.is_empty() && self.services.is_some() {
            LeadScore::Warm
        } else {
            LeadScore::Cold
        }
    }

    /// Recompute and store the tier, marking the record as scored.
    pub fn score(&mut self) -> LeadScore {
        self.lead_score = self.compute_score();
        self.advance_to(RecordStage::Scored);
        self.lead_score
    }

    /// Project the record onto the fixed export schema. The tier is derived
    /// from the current fields, so the row is right even before [`score`](Self::score).
    pub fn to_export_row(&self) -> ExportRow {
        ExportRow {
            agency_name: self.agency_name.clone(),
            country: self.country.clone(),
            website: self.website.clone(),
            services: self.services.clone().unwrap_or_default(),
            niche: self.niche.clone().unwrap_or_default(),
            contact_name: self.contact_name.clone().unwrap_or_default(),
            email: self.email.clone().unwrap_or_default(),
            lead_score: self.compute_score().as_str().to_string(),
            outreach_message: self.outreach_message.clone().unwrap_or_default(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// ExportRow
// ---------------------------------------------------------------------------

/// One exported lead. Field order matches [`EXPORT_COLUMNS`]; absent values
/// are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub agency_name: String,
    pub country: String,
    pub website: String,
    pub services: String,
    pub niche: String,
    pub contact_name: String,
    pub email: String,
    pub lead_score: String,
    pub outreach_message: String,
}

impl ExportRow {
    /// Cell values in column order.
    pub fn values(&self) -> [&str; 9] {
        [
            &self.agency_name,
            &self.country,
            &self.website,
            &self.services,
            &self.niche,
            &self.contact_name,
            &self.email,
            &self.lead_score,
            &self.outreach_message,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> LeadRecord {
        LeadRecord::new("Pixel & Post", "https://x.com", "Finland").expect("valid seed")
    }

    #[test]
    fn new_rejects_empty_required_fields() {
        let err = LeadRecord::new("", "https://x.com", "Finland").unwrap_err();
        assert!(err.to_string().contains("agency_name"));

        let err = LeadRecord::new("Agency", "  ", "").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("website"));
        assert!(msg.contains("country"));
    }

    #[test]
    fn new_record_starts_pending_and_cold() {
        let record = seed();
        assert_eq!(record.enrichment_status(), EnrichmentStatus::Pending);
        assert_eq!(record.contact_status(), ContactStatus::Pending);
        assert_eq!(record.lead_score(), LeadScore::Cold);
        assert_eq!(record.stage(), RecordStage::Seeded);
    }

    #[test]
    fn email_and_complete_enrichment_is_hot() {
        let mut record = seed();
        record.mark_enriched(None, None, None);
        record.record_contact(None, Some("a@b.com".into()));
        assert_eq!(record.compute_score(), LeadScore::Hot);
    }

    #[test]
    fn services_without_email_is_warm() {
        let mut record = seed();
        record.mark_enriched(Some("SMM".into()), None, None);
        assert!(record.email().is_none());
        assert_eq!(record.compute_score(), LeadScore::Warm);
    }

    #[test]
    fn seed_only_is_cold() {
        assert_eq!(seed().compute_score(), LeadScore::Cold);
    }

    #[test]
    fn email_without_complete_enrichment_is_not_hot() {
        let mut record = seed();
        record.mark_enrichment_failed("timeout");
        record.record_contact(Some("Jane Doe".into()), Some("jane@x.com".into()));
        assert_eq!(record.compute_score(), LeadScore::Cold);
    }

    #[test]
    fn hot_wins_over_warm() {
        let mut record = seed();
        record.mark_enriched(Some("SMM".into()), Some("ecommerce".into()), None);
        record.record_contact(None, Some("jane@x.com".into()));
        assert_eq!(record.compute_score(), LeadScore::Hot);
    }

    #[test]
    fn compute_score_is_pure() {
        let mut record = seed();
        record.mark_enriched(Some("SMM".into()), None, None);
        let before = record.clone();
        assert_eq!(record.compute_score(), record.compute_score());
        assert_eq!(record, before);
    }

    #[test]
    fn score_stores_tier_and_advances_stage() {
        let mut record = seed();
        record.mark_enriched(Some("SMM".into()), None, None);
        assert_eq!(record.score(), LeadScore::Warm);
        assert_eq!(record.lead_score(), LeadScore::Warm);
        assert_eq!(record.stage(), RecordStage::Scored);
    }

    #[test]
    fn failed_enrichment_keeps_fields_absent() {
        let mut record = seed();
        record.mark_enrichment_failed("HTTP 503");
        assert_eq!(record.enrichment_status(), EnrichmentStatus::Incomplete);
        assert!(record.services().is_none());
        assert!(record.niche().is_none());
        assert_eq!(record.notes(), Some("Enrichment failed: HTTP 503"));
    }

    #[test]
    fn failed_refresh_does_not_downgrade_complete_record() {
        let mut record = seed();
        record.mark_enriched(Some("SEO".into()), Some("healthcare".into()), None);
        record.mark_enrichment_failed("timeout");
        assert_eq!(record.enrichment_status(), EnrichmentStatus::Complete);
        assert_eq!(record.services(), Some("SEO"));
    }

    #[test]
    fn partial_contact_is_kept_as_not_found() {
        let mut record = seed();
        let status = record.record_contact(None, Some("Hello@X.com".into()));
        assert_eq!(status, ContactStatus::NotFound);
        assert_eq!(record.email(), Some("hello@x.com"));

        let status = record.record_contact(Some("Jane Doe".into()), None);
        assert_eq!(status, ContactStatus::Found);
        assert_eq!(record.email(), Some("hello@x.com"));
    }

    #[test]
    fn invalid_email_is_not_stored() {
        let mut record = seed();
        record.record_contact(Some("Jane Doe".into()), Some("not-an-email".into()));
        assert!(record.email().is_none());
        assert_eq!(record.contact_status(), ContactStatus::NotFound);
    }

    #[test]
    fn outreach_length_tracks_word_count() {
        let mut record = seed();
        record
            .set_outreach("Hi Jane,\n\nQuick question about your SMM work.")
            .expect("valid message");
        assert_eq!(record.message_length(), Some(8));

        let too_long = vec!["word"; MAX_OUTREACH_WORDS + 1].join(" ");
        assert!(record.set_outreach(too_long).is_err());
        assert_eq!(record.message_length(), Some(8));
        assert!(record.set_outreach("   ").is_err());
    }

    #[test]
    fn stage_never_moves_backwards() {
        let mut record = seed();
        record.advance_to(RecordStage::ContactResolved);
        record.advance_to(RecordStage::Enriched);
        assert_eq!(record.stage(), RecordStage::ContactResolved);
    }

    #[test]
    fn export_row_uses_fixed_columns_and_empty_strings() {
        let mut record = seed();
        record.score();
        let row = record.to_export_row();
        assert_eq!(
            row.values(),
            [
                "Pixel & Post",
                "Finland",
                "https://x.com",
                "",
                "",
                "",
                "",
                "Cold",
                ""
            ]
        );

        let json = serde_json::to_value(&row).expect("serialize row");
        let keys: Vec<&str> = json
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        let mut expected = EXPORT_COLUMNS.to_vec();
        expected.sort_unstable();
        let mut keys_sorted = keys.clone();
        keys_sorted.sort_unstable();
        assert_eq!(keys_sorted, expected);
    }

    #[test]
    fn export_row_tier_does_not_wait_for_scoring() {
        let mut record = seed();
        record.mark_enriched(Some("SEO".into()), None, None);
        record.record_contact(None, Some("a@b.com".into()));

        assert_eq!(record.lead_score(), LeadScore::Cold);
        assert_eq!(record.to_export_row().lead_score, "Hot");
        assert_eq!(record.stage(), RecordStage::Seeded);
    }

    #[test]
    fn tracking_params() {
        assert!(is_tracking_param("utm_source"));
        assert!(is_tracking_param("UTM_Campaign"));
        assert!(is_tracking_param("gclid"));
        assert!(!is_tracking_param("lang"));
        assert!(!is_tracking_param("page"));
    }

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("jane.doe+leads@agency.fi"));
        assert!(!looks_like_email("jane@agency"));
        assert!(!looks_like_email("@agency.fi"));
    }
}
