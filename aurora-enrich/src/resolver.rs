//! Metadata Resolver
//!
//! Resolves one fingerprint into an [`EnrichmentRecord`]:
//!
//! ```text
//! cache check -> base lookup -> ( related search | file list | descriptor -> rating ) -> cache store
//! ```
//!
//! Only the base lookup is fatal. The three branches run concurrently and
//! each degrades to an absent field on failure, so a record is returned
//! whenever the index knows the fingerprint.

use aurora_core::{
    analyze_files, expand_keywords, extract_keywords, extract_year, image_files, reference_links,
    CacheLayer, CandidateItem, Category, Descriptor, EnrichmentRecord, FileEntry, Fingerprint,
    FranchiseTable, RatingInfo,
};
use aurora_net::{ProviderError, SharedIndex};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{DescriptorLookup, RatingLookup, RelatedSearch, ResolveError};

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MetadataResolver {
    index: SharedIndex,
    cache: Arc<CacheLayer>,
    related: RelatedSearch,
    descriptors: Option<DescriptorLookup>,
    ratings: Option<RatingLookup>,
    franchises: Arc<FranchiseTable>,
    lookup_timeout: Duration,
}

impl MetadataResolver {
    /// Resolver with related search only; descriptor and rating sources
    /// are attached with the `with_*` builders
    pub fn new(index: SharedIndex, cache: Arc<CacheLayer>) -> Self {
        Self {
            related: RelatedSearch::new(index.clone(), cache.clone()),
            index,
            cache,
            descriptors: None,
            ratings: None,
            franchises: Arc::new(FranchiseTable::builtin()),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_related(mut self, related: RelatedSearch) -> Self {
        self.related = related;
        self
    }

    pub fn with_descriptors(mut self, descriptors: DescriptorLookup) -> Self {
        self.descriptors = Some(descriptors);
        self
    }

    pub fn with_ratings(mut self, ratings: RatingLookup) -> Self {
        self.ratings = Some(ratings);
        self
    }

    pub fn with_franchises(mut self, franchises: FranchiseTable) -> Self {
        self.franchises = Arc::new(franchises);
        self
    }

    /// Timeout for base and file-list lookups
    pub fn with_lookup_timeout(mut self, lookup_timeout: Duration) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }

    pub fn cache(&self) -> &Arc<CacheLayer> {
        &self.cache
    }

    pub fn franchises(&self) -> &FranchiseTable {
        &self.franchises
    }

    /// Resolve a fingerprint, from cache when possible
    pub async fn resolve(&self, fingerprint: &Fingerprint) -> Result<EnrichmentRecord, ResolveError> {
        let span = info_span!(
            "resolve",
            id = %Uuid::new_v4().simple(),
            fingerprint = %fingerprint.short()
        );
        self.resolve_inner(fingerprint).instrument(span).await
    }

    async fn resolve_inner(&self, fingerprint: &Fingerprint) -> Result<EnrichmentRecord, ResolveError> {
        if let Some(record) = self.cache.records.get(fingerprint.as_str()) {
            debug!("Serving cached record");
            return Ok(record);
        }

        let base = match timeout(self.lookup_timeout, self.index.get_by_fingerprint(fingerprint)).await
        {
            Ok(Ok(Some(base))) => base,
            Ok(Ok(None)) => return Err(ResolveError::NotFound(fingerprint.clone())),
            Ok(Err(source)) => {
                return Err(ResolveError::BaseLookup {
                    fingerprint: fingerprint.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(ResolveError::BaseLookup {
                    fingerprint: fingerprint.clone(),
                    source: ProviderError::Timeout(self.lookup_timeout),
                })
            }
        };

        let mut record = EnrichmentRecord::from_base(fingerprint.clone(), base);

        let (related, files, (descriptor, rating)) = tokio::join!(
            self.related_for(fingerprint, &record.title, record.category),
            self.file_list(fingerprint),
            self.describe(&record),
        );

        record.related = related;
        record.descriptor = descriptor;
        record.rating = rating;
        if let Some(files) = files {
            record.file_stats = Some(analyze_files(&files));
            record.image_files = Some(image_files(&files));
            record.files = Some(files);
        }
        record.reference_links = reference_links(&record.title, fingerprint);
        record.resolved_at = Utc::now();

        info!(
            "Resolved {:?}: {} related, descriptor: {}, rating: {}, files: {}",
            record.title,
            record.related.len(),
            record.descriptor.is_some(),
            record.rating.is_some(),
            record.files.as_ref().map_or(0, Vec::len),
        );

        self.cache.records.insert(fingerprint.as_str(), record.clone());
        Ok(record)
    }

    /// Keyword extraction, expansion and ranking for a title
    pub async fn related_for(
        &self,
        subject: &Fingerprint,
        title: &str,
        category: Category,
    ) -> Vec<CandidateItem> {
        let keywords = extract_keywords(title, category);
        let expanded = expand_keywords(&keywords, category, title, &self.franchises);
        self.related.find_related(subject, &keywords, &expanded).await
    }

    /// File inventory, `None` when empty or unavailable
    async fn file_list(&self, fingerprint: &Fingerprint) -> Option<Vec<FileEntry>> {
        match timeout(self.lookup_timeout, self.index.get_file_list(fingerprint)).await {
            Ok(Ok(files)) if !files.is_empty() => Some(files),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                warn!("File list unavailable: {}", e);
                None
            }
            Err(_) => {
                warn!("File list timed out after {:?}", self.lookup_timeout);
                None
            }
        }
    }

    /// Descriptor, then rating (the rating year may come from the descriptor)
    async fn describe(&self, record: &EnrichmentRecord) -> (Option<Descriptor>, Option<RatingInfo>) {
        let descriptor = match &self.descriptors {
            Some(lookup) => lookup.lookup(&record.attributes, record.category).await,
            None => None,
        };

        let rating = match &self.ratings {
            Some(lookup) if record.category.is_video() => {
                let year = extract_year(&record.title).or_else(|| {
                    descriptor
                        .as_ref()
                        .and_then(|d| d.release_year().map(str::to_string))
                });
                lookup.lookup(&record.title, year.as_deref()).await
            }
            _ => None,
        };

        (descriptor, rating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        base_record, descriptor, item, suggestion, MockDescriptors, MockIndex, MockRatings, Reply,
    };
    use std::sync::atomic::Ordering;

    const HASH: &str = "2c6b6858d61da9543d4231a71db4b1c9264b0685";

    fn fast() -> Duration {
        Duration::from_millis(100)
    }

    fn setup(
        index: MockIndex,
        descriptors: MockDescriptors,
        ratings: MockRatings,
    ) -> (MetadataResolver, Arc<MockIndex>, Arc<MockRatings>) {
        let index = Arc::new(index);
        let ratings = Arc::new(ratings);
        let cache = Arc::new(CacheLayer::default());

        let resolver = MetadataResolver::new(index.clone(), cache.clone())
            .with_related(RelatedSearch::new(index.clone(), cache.clone()).with_term_timeout(fast()))
            .with_descriptors(
                DescriptorLookup::new(Arc::new(descriptors), cache.clone()).with_timeout(fast()),
            )
            .with_ratings(RatingLookup::new(ratings.clone(), cache.clone()).with_timeouts(fast(), fast()))
            .with_lookup_timeout(fast());
        (resolver, index, ratings)
    }

    #[tokio::test]
    async fn test_full_resolution() {
        let index = MockIndex::default()
            .with_base(Reply::Ok(Some(base_record(
                "The.Matrix.1999.1080p.BluRay.x264-GROUP",
                Category::Movie,
                Some("603"),
            ))))
            .with_search("Matrix", Reply::Ok(vec![item(HASH, "self"), item("a1", "The Matrix Reloaded")]))
            .with_files(Reply::Ok(vec![
                FileEntry { index: Some(0), path: "movie.mkv".to_string(), size: 4096 },
                FileEntry { index: Some(1), path: "cover.jpg".to_string(), size: 64 },
            ]));
        let descriptors = MockDescriptors::default()
            .with_language("zh-CN", Reply::Ok(descriptor(603, "zh-CN", "1999-03-31")));
        let ratings = MockRatings::default()
            .with_suggestions(Reply::Ok(vec![suggestion("1291843", "黑客帝国", "1999")]));
        let (resolver, _, _) = setup(index, descriptors, ratings);

        let record = resolver.resolve(&Fingerprint::new(HASH)).await.unwrap();

        assert_eq!(record.title, "The.Matrix.1999.1080p.BluRay.x264-GROUP");
        assert_eq!(record.category, Category::Movie);
        assert_eq!(record.descriptor.as_ref().unwrap().id, 603);
        assert_eq!(record.rating.as_ref().unwrap().id, "1291843");
        assert_eq!(record.related.len(), 1);
        assert_eq!(record.related[0].name, "The Matrix Reloaded");
        assert_eq!(record.files.as_ref().unwrap().len(), 2);
        assert_eq!(record.file_stats.as_ref().unwrap().file_count, 2);
        assert_eq!(record.image_files.as_ref().unwrap()[0].path, "cover.jpg");
        assert!(record.reference_links.iter().any(|l| l.source == "BTDig"));
    }

    #[tokio::test]
    async fn test_base_not_found_writes_nothing() {
        let (resolver, _, _) =
            setup(MockIndex::default(), MockDescriptors::default(), MockRatings::default());

        let err = resolver.resolve(&Fingerprint::new(HASH)).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.fingerprint().as_str(), HASH);
        assert_eq!(resolver.cache().records.len(), 0);
    }

    #[tokio::test]
    async fn test_base_failure_and_timeout_are_fatal() {
        let index = MockIndex::default().with_base(Reply::Fail);
        let (resolver, _, _) = setup(index, MockDescriptors::default(), MockRatings::default());
        let err = resolver.resolve(&Fingerprint::new(HASH)).await.unwrap_err();
        assert!(matches!(err, ResolveError::BaseLookup { .. }));
        assert_eq!(resolver.cache().records.len(), 0);

        let index = MockIndex::default().with_base(Reply::Slow(
            Duration::from_secs(2),
            Some(base_record("Late", Category::Movie, None)),
        ));
        let (resolver, _, _) = setup(index, MockDescriptors::default(), MockRatings::default());
        let err = resolver.resolve(&Fingerprint::new(HASH)).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::BaseLookup { source: ProviderError::Timeout(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_all_enrichment_failing_still_resolves() {
        let slow = Duration::from_secs(2);
        let index = MockIndex::default()
            .with_base(Reply::Ok(Some(base_record(
                "Inception.2010.2160p.UHD",
                Category::Movie,
                Some("27205"),
            ))))
            .with_search("2010", Reply::Fail)
            .with_search("Inception", Reply::Slow(slow, vec![item("a1", "Inception")]))
            .with_files(Reply::Fail);
        let descriptors = MockDescriptors::default()
            .with_language("zh-CN", Reply::Fail)
            .with_language("en-US", Reply::Slow(slow, descriptor(27205, "en-US", "2010-07-15")));
        let ratings = MockRatings::default().with_suggestions(Reply::Fail);
        let (resolver, _, _) = setup(index, descriptors, ratings);

        let record = resolver.resolve(&Fingerprint::new(HASH)).await.unwrap();
        assert_eq!(record.title, "Inception.2010.2160p.UHD");
        assert_eq!(record.size, 4 * 1024 * 1024 * 1024);
        assert_eq!(record.category, Category::Movie);
        assert!(record.descriptor.is_none());
        assert!(record.rating.is_none());
        assert!(record.related.is_empty());
        assert!(record.files.is_none());
        assert!(record.file_stats.is_none());
        assert!(record.image_files.is_none());

        // Absent fields still serialize as null
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["descriptor"].is_null());
        assert!(json["rating"].is_null());
        assert!(json["file_stats"].is_null());
    }

    #[tokio::test]
    async fn test_cached_record_skips_upstream() {
        let index = MockIndex::default()
            .with_base(Reply::Ok(Some(base_record("Some Upload", Category::Other, None))));
        let (resolver, index, _) = setup(index, MockDescriptors::default(), MockRatings::default());

        let first = resolver.resolve(&Fingerprint::new(HASH)).await.unwrap();
        let second = resolver.resolve(&Fingerprint::new(&HASH.to_uppercase())).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(index.base_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rating_only_for_video() {
        let index = MockIndex::default().with_base(Reply::Ok(Some(base_record(
            "Elden Ring Deluxe Edition",
            Category::PcGames,
            None,
        ))));
        let ratings = MockRatings::default()
            .with_suggestions(Reply::Ok(vec![suggestion("1", "Elden Ring", "2022")]));
        let (resolver, _, ratings) = setup(index, MockDescriptors::default(), ratings);

        let record = resolver.resolve(&Fingerprint::new(HASH)).await.unwrap();
        assert!(record.rating.is_none());
        assert_eq!(ratings.suggest_calls(), 0);
    }

    #[tokio::test]
    async fn test_rating_year_from_descriptor() {
        let index = MockIndex::default().with_base(Reply::Ok(Some(base_record(
            "Dune Part Two WEB-DL",
            Category::Movie,
            Some("693134"),
        ))));
        let descriptors = MockDescriptors::default()
            .with_language("zh-CN", Reply::Ok(descriptor(693134, "zh-CN", "2024-02-27")));
        let ratings = MockRatings::default().with_suggestions(Reply::Ok(vec![
            suggestion("1", "Dune", "2021"),
            suggestion("2", "Dune: Part Two", "2024"),
        ]));
        let (resolver, _, _) = setup(index, descriptors, ratings);

        let record = resolver.resolve(&Fingerprint::new(HASH)).await.unwrap();
        assert_eq!(record.rating.unwrap().id, "2");
        assert!(resolver.cache().ratings.get("Dune Part Two_2024").is_some());
    }
}
