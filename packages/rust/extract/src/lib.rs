//! Text heuristics that turn fetched page text into lead fields.
//!
//! This crate provides:
//! - [`RegexEmailExtractor`]: the
//!   [`EmailExtractionCapability`](leadgen_shared::EmailExtractionCapability)
//! - [`derive_profile`]: services / niche / size signals from website copy
//! - [`find_decision_maker`]: a person's name next to a role marker

pub mod emails;
pub mod people;
pub mod profile;

pub use emails::{RegexEmailExtractor, extract_emails, find_email};
pub use people::{
    ROLE_CONTEXT_WINDOW, ROLE_MARKERS, find_decision_maker, local_part_has_role,
    role_mentioned_near,
};
pub use profile::{AgencyProfile, derive_profile};
