//! Provider contracts the enrichment pipeline depends on

use async_trait::async_trait;
use aurora_core::{BaseRecord, Descriptor, FileEntry, Fingerprint, IndexItem};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from upstream and metadata providers
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{provider} returned status {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("Failed to decode {provider} response: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// Descriptor media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rating-source search suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSuggestion {
    pub id: String,
    pub title: String,
    pub year: Option<String>,
    pub thumbnail: Option<String>,
}

/// Rating and vote count for one rating-source entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingAbstract {
    pub rating: Option<f64>,
    pub vote_count: Option<u64>,
}

/// Upstream torrent index
#[async_trait]
pub trait UpstreamIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Free-text search; items in upstream relevance order
    async fn search_by_term(&self, term: &str) -> Result<Vec<IndexItem>, ProviderError>;

    /// Canonical record for a fingerprint, `None` when unknown
    async fn get_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<BaseRecord>, ProviderError>;

    /// File inventory; empty when the index has none
    async fn get_file_list(&self, fingerprint: &Fingerprint)
        -> Result<Vec<FileEntry>, ProviderError>;
}

/// Primary movie/TV descriptor source
#[async_trait]
pub trait DescriptorProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn get_by_id(
        &self,
        id: u64,
        media: MediaKind,
        language: &str,
    ) -> Result<Descriptor, ProviderError>;
}

/// Rating source
#[async_trait]
pub trait RatingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn suggest(&self, query: &str) -> Result<Vec<RatingSuggestion>, ProviderError>;

    async fn get_abstract(&self, id: &str) -> Result<Option<RatingAbstract>, ProviderError>;
}

pub type SharedIndex = Arc<dyn UpstreamIndex>;
pub type SharedDescriptorProvider = Arc<dyn DescriptorProvider>;
pub type SharedRatingProvider = Arc<dyn RatingProvider>;
