//! AuroraMag Enrich - relatedness ranking and metadata resolution
//!
//! Orchestrates the provider clients over the core logic:
//! - Related-content search and ranking across concurrent index queries
//! - Descriptor lookup with language fallback
//! - Rating lookup with query derivation and negative caching
//! - The [`MetadataResolver`] that assembles one enrichment record

pub mod descriptor;
pub mod error;
pub mod rating;
pub mod related;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use descriptor::*;
pub use error::*;
pub use rating::*;
pub use related::*;
pub use resolver::*;
