//! Enrichment service
//!
//! Wires configuration into a cache, provider clients and a resolver, and
//! owns the periodic cache sweep.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

use aurora_core::{
    CacheDomain, CacheLayer, CacheScope, CacheSummary, CandidateItem, Category, EnrichmentRecord,
    Fingerprint,
};
use aurora_enrich::{DescriptorLookup, MetadataResolver, RatingLookup, RelatedSearch, ResolveError};
use aurora_net::{
    BitmagnetIndex, DoubanClient, SharedDescriptorProvider, SharedIndex, SharedRatingProvider,
    TmdbClient,
};

use crate::AuroraConfig;

/// Shortest sweep period accepted by the sweeper
const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(10);

pub struct EnrichmentService {
    resolver: MetadataResolver,
    cache: Arc<CacheLayer>,
}

impl EnrichmentService {
    /// Build HTTP clients for every configured provider
    pub fn from_config(config: &AuroraConfig) -> Result<Self, anyhow::Error> {
        let http = config.http.client_config();

        let index = BitmagnetIndex::new(&config.upstream.url, &http)?
            .with_search_limit(config.upstream.search_limit);

        let descriptors: Option<SharedDescriptorProvider> = if config.tmdb.is_configured() {
            let client = TmdbClient::new(&config.tmdb.api_key, &http)?
                .with_base_url(&config.tmdb.base_url);
            Some(Arc::new(client))
        } else {
            info!("TMDB API key not set, descriptor lookups disabled");
            None
        };

        let ratings: Option<SharedRatingProvider> = if config.douban.enabled {
            let client = DoubanClient::new(&http)?.with_base_url(&config.douban.base_url);
            Some(Arc::new(client))
        } else {
            None
        };

        info!("Upstream index: {}", config.upstream.url);
        Ok(Self::with_providers(config, Arc::new(index), descriptors, ratings))
    }

    /// Build around already constructed providers
    pub fn with_providers(
        config: &AuroraConfig,
        index: SharedIndex,
        descriptors: Option<SharedDescriptorProvider>,
        ratings: Option<SharedRatingProvider>,
    ) -> Self {
        let cache = Arc::new(CacheLayer::new(config.cache.ttls(), config.cache.max_entries));
        let timeout = config.http.timeout();

        let related = RelatedSearch::new(index.clone(), cache.clone()).with_term_timeout(timeout);

        let mut resolver = MetadataResolver::new(index, cache.clone())
            .with_related(related)
            .with_franchises(config.franchise_table())
            .with_lookup_timeout(timeout);

        if let Some(provider) = descriptors {
            resolver = resolver.with_descriptors(
                DescriptorLookup::new(provider, cache.clone())
                    .with_languages(config.tmdb.languages())
                    .with_timeout(timeout)
                    .with_tv_support(config.tmdb.support_tv),
            );
        }

        if let Some(provider) = ratings {
            resolver = resolver.with_ratings(
                RatingLookup::new(provider, cache.clone())
                    .with_timeouts(timeout, config.http.augment_timeout()),
            );
        }

        Self { resolver, cache }
    }

    /// Resolve a hex infohash
    pub async fn resolve(&self, hash: &str) -> Result<EnrichmentRecord, ResolveError> {
        self.resolver.resolve(&Fingerprint::new(hash)).await
    }

    /// Ranked related items for an arbitrary title
    pub async fn related(
        &self,
        title: &str,
        category: Category,
        subject: Option<&str>,
    ) -> Vec<CandidateItem> {
        let subject = Fingerprint::new(subject.unwrap_or_default());
        self.resolver.related_for(&subject, title, category).await
    }

    pub fn cache(&self) -> &Arc<CacheLayer> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheSummary {
        self.cache.summary()
    }

    pub fn clear_cache(&self, scope: CacheScope) {
        self.cache.clear(scope);
        info!("Cleared cache: {:?}", scope);
    }

    /// Start purging expired entries on each domain's check period
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        self.spawn_sweeper_with(|domain| domain.default_check_period())
    }

    /// Like [`spawn_sweeper`](Self::spawn_sweeper) with custom periods
    pub fn spawn_sweeper_with<P>(&self, period: P) -> JoinHandle<()>
    where
        P: Fn(CacheDomain) -> Duration,
    {
        let sweeps: Vec<_> = CacheDomain::ALL
            .iter()
            .map(|domain| {
                let cache = self.cache.clone();
                let period = period(*domain).max(MIN_SWEEP_PERIOD);
                sweep(cache, *domain, period)
            })
            .collect();

        tokio::spawn(async move {
            futures::future::join_all(sweeps).await;
        })
    }
}

async fn sweep(cache: Arc<CacheLayer>, domain: CacheDomain, period: Duration) {
    let mut ticker = interval(period);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let purged = cache.purge_expired(domain);
        if purged > 0 {
            debug!("Purged {} expired {} entries", purged, domain.as_str());
        }
    }
}
