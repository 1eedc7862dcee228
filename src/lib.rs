//! # affilscan
//!
//! PubMed affiliation scanner - finds authors with non-academic (company)
//! affiliations in literature search results.
//!
//! ## Modules
//!
//! - [`pubmed`] - E-utilities client (search + per-article fetch)
//! - [`extract`] - Field extraction from article XML
//! - [`classifier`] - Academic keyword denylist
//! - [`store`] - SQLite persistence of searches and records
//! - [`service`] - Search pipeline
//! - [`server`] - HTTP API
//! - [`export`] - CSV export
//! - [`config`] - Runtime settings
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use affilscan::{classifier::AffiliationClassifier, extract::FieldExtractor};
//!
//! fn main() -> affilscan::Result<()> {
//!     let extractor = FieldExtractor::new(AffiliationClassifier::default())?;
//!     let record = extractor.extract("12345", "<ArticleTitle>Example</ArticleTitle>");
//!     println!("{} -> {:?}", record.title, record.non_academic_authors);
//!     Ok(())
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod pubmed;
pub mod server;
pub mod service;
pub mod store;

pub use error::{AffilscanError, Result};
