//! AuroraMag Net - upstream index and metadata provider clients
//!
//! Provides the HTTP boundary of the enrichment pipeline:
//! - Shared client construction with bounded timeouts
//! - Provider traits the resolver is written against
//! - bitmagnet GraphQL index, TMDB descriptors, Douban ratings

pub mod bitmagnet;
pub mod client;
pub mod douban;
pub mod tmdb;
pub mod traits;

pub use bitmagnet::*;
pub use client::*;
pub use douban::*;
pub use tmdb::*;
pub use traits::*;
