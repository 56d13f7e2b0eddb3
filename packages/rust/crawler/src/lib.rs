//! Web page fetching for leadgen.
//!
//! This crate provides:
//! - [`HttpFetcher`]: the [`ContentFetchCapability`](leadgen_shared::ContentFetchCapability)
//!   used by the enrichment and contact stages
//! - [`html`]: HTML to text conversion and same-site link extraction

pub mod engine;
pub mod html;

pub use engine::{HttpFetcher, is_ssrf_target};
pub use html::{extract_links, html_to_text, same_site};
