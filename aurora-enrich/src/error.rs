//! Resolution errors
//!
//! Only base-lookup failures surface to callers. Every enrichment branch
//! degrades to an absent field instead of an error.

use aurora_core::Fingerprint;
use aurora_net::ProviderError;
use thiserror::Error;

/// Fatal-to-request resolution failures
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No record found for {0}")]
    NotFound(Fingerprint),

    #[error("Base lookup for {fingerprint} failed: {source}")]
    BaseLookup {
        fingerprint: Fingerprint,
        #[source]
        source: ProviderError,
    },
}

impl ResolveError {
    pub fn fingerprint(&self) -> &Fingerprint {
        match self {
            ResolveError::NotFound(fp) => fp,
            ResolveError::BaseLookup { fingerprint, .. } => fingerprint,
        }
    }

    /// True when the index answered but has no such record
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound(_))
    }
}
