//! AuroraMag Runtime - service wiring
//!
//! Turns an [`AuroraConfig`] into a running [`EnrichmentService`]:
//! provider clients, the shared cache and its periodic sweep.

pub mod config;
pub mod service;

pub use config::*;
pub use service::*;
