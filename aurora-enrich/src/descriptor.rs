//! Primary descriptor lookup with language fallback

use aurora_core::{Attributes, CacheLayer, Category, Descriptor};
use aurora_net::{MediaKind, ProviderError, SharedDescriptorProvider};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Attribute names that may carry the descriptor id
pub const DESCRIPTOR_ID_ATTRIBUTES: &[&str] = &["tmdb", "tmdbid"];

pub const DEFAULT_LANGUAGES: &[&str] = &["zh-CN", "en-US"];

/// Try `attempt` with each parameter in order; the first success wins.
/// Failures are logged and swallowed.
pub async fn first_success<P, T, F, Fut>(params: impl IntoIterator<Item = P>, mut attempt: F) -> Option<T>
where
    P: Display,
    F: FnMut(P) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    for param in params {
        let label = param.to_string();
        match attempt(param).await {
            Ok(value) => return Some(value),
            Err(e) => debug!("Attempt with {} failed: {}", label, e),
        }
    }
    None
}

/// Cache key for one descriptor variant
pub fn descriptor_cache_key(media: MediaKind, id: u64, language: &str) -> String {
    format!("{}:{}:{}", media, id, language)
}

pub struct DescriptorLookup {
    provider: SharedDescriptorProvider,
    cache: Arc<CacheLayer>,
    languages: Vec<String>,
    timeout: Duration,
    support_tv: bool,
}

impl DescriptorLookup {
    pub fn new(provider: SharedDescriptorProvider, cache: Arc<CacheLayer>) -> Self {
        Self {
            provider,
            cache,
            languages: DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
            timeout: Duration::from_secs(5),
            support_tv: true,
        }
    }

    /// Languages in priority order (localized first)
    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.languages = languages;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tv_support(mut self, support_tv: bool) -> Self {
        self.support_tv = support_tv;
        self
    }

    /// Media kind to look up for a category, if any
    pub fn media_for(&self, category: Category) -> Option<MediaKind> {
        match category {
            Category::Movie => Some(MediaKind::Movie),
            Category::Tv if self.support_tv => Some(MediaKind::Tv),
            _ => None,
        }
    }

    /// Descriptor for a record, or `None` when not applicable or every
    /// language variant failed
    pub async fn lookup(&self, attributes: &Attributes, category: Category) -> Option<Descriptor> {
        let media = self.media_for(category)?;
        let id: u64 = attributes
            .first_of(DESCRIPTOR_ID_ATTRIBUTES)
            .and_then(|raw| raw.trim().parse().ok())?;

        let found = first_success(self.languages.iter(), |language| {
            self.fetch(media, id, language)
        })
        .await;

        if found.is_none() {
            debug!("No descriptor for {} {}", media, id);
        }
        found
    }

    async fn fetch(
        &self,
        media: MediaKind,
        id: u64,
        language: &str,
    ) -> Result<Descriptor, ProviderError> {
        let key = descriptor_cache_key(media, id, language);
        if let Some(descriptor) = self.cache.descriptors.get(&key) {
            return Ok(descriptor);
        }

        let descriptor = timeout(self.timeout, self.provider.get_by_id(id, media, language))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        self.cache.descriptors.insert(key, descriptor.clone());
        Ok(descriptor)
    }
}
