//! AuroraMag Core - domain model and pure enrichment logic
//!
//! This crate provides the I/O-free building blocks:
//! - Enrichment record, candidate and descriptor types
//! - Keyword extraction from noisy release titles
//! - Franchise tables and keyword expansion
//! - Quality tiers and the recommendation score
//! - TTL cache domains shared by the resolver

pub mod cache;
pub mod category;
pub mod files;
pub mod franchises;
pub mod keywords;
pub mod quality;
pub mod record;

pub use cache::*;
pub use category::*;
pub use files::*;
pub use franchises::*;
pub use keywords::*;
pub use quality::*;
pub use record::*;

/// Maximum keywords produced by extraction
pub const MAX_KEYWORDS: usize = 8;

/// Maximum keywords after expansion
pub const MAX_EXPANDED_KEYWORDS: usize = 10;

/// Expanded keywords used as upstream search terms
pub const MAX_SEARCH_TERMS: usize = 4;

/// Maximum related items kept on a record
pub const MAX_RELATED: usize = 12;

/// Descriptor metadata TTL (1 day)
pub const DEFAULT_DESCRIPTOR_TTL_SECS: u64 = 86_400;

/// Index search result TTL (1 hour)
pub const DEFAULT_SEARCH_TTL_SECS: u64 = 3_600;

/// Resolved record TTL (2 hours)
pub const DEFAULT_RECORD_TTL_SECS: u64 = 7_200;

/// Rating data TTL (1 week)
pub const DEFAULT_RATING_TTL_SECS: u64 = 604_800;

/// Entry bound per cache domain
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;
