//! In-memory providers for engine and resolver tests

use async_trait::async_trait;
use aurora_core::{
    Attributes, BaseRecord, Category, Descriptor, FileEntry, Fingerprint, IndexItem,
};
use aurora_net::{
    DescriptorProvider, MediaKind, ProviderError, RatingAbstract, RatingProvider, RatingSuggestion,
    UpstreamIndex,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How a mock answers one call
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Fail,
    /// Sleep, then answer
    Slow(Duration, T),
}

impl<T: Clone> Reply<T> {
    async fn resolve(&self, provider: &'static str) -> Result<T, ProviderError> {
        match self {
            Reply::Ok(v) => Ok(v.clone()),
            Reply::Fail => Err(ProviderError::Status {
                provider,
                status: 500,
            }),
            Reply::Slow(delay, v) => {
                tokio::time::sleep(*delay).await;
                Ok(v.clone())
            }
        }
    }
}

pub fn item(hash: &str, name: &str) -> IndexItem {
    IndexItem {
        fingerprint: Fingerprint::new(hash),
        name: name.to_string(),
        size: 2 * 1024 * 1024 * 1024,
        published_at: None,
        seeders: 10,
        leechers: 2,
    }
}

pub fn base_record(title: &str, category: Category, tmdb_id: Option<&str>) -> BaseRecord {
    let mut attributes = Attributes::new();
    attributes.insert("seeders", "10");
    if let Some(id) = tmdb_id {
        attributes.insert("tmdbid", id);
    }
    BaseRecord {
        title: title.to_string(),
        size: 4 * 1024 * 1024 * 1024,
        category,
        attributes,
        magnet_uri: None,
        published_at: None,
    }
}

pub fn descriptor(id: u64, language: &str, release_date: &str) -> Descriptor {
    Descriptor {
        id,
        language: language.to_string(),
        title: Some(format!("Title {}", id)),
        original_title: None,
        overview: Some("Overview".to_string()),
        poster_path: None,
        backdrop_path: None,
        vote_average: Some(8.0),
        vote_count: Some(100),
        release_date: Some(release_date.to_string()),
        runtime: None,
        genres: Vec::new(),
        cast: Vec::new(),
        posters: Vec::new(),
        backdrops: Vec::new(),
        trailers: Vec::new(),
    }
}

pub fn suggestion(id: &str, title: &str, year: &str) -> RatingSuggestion {
    RatingSuggestion {
        id: id.to_string(),
        title: title.to_string(),
        year: Some(year.to_string()),
        thumbnail: None,
    }
}

pub struct MockIndex {
    pub searches: HashMap<String, Reply<Vec<IndexItem>>>,
    pub base: Reply<Option<BaseRecord>>,
    pub files: Reply<Vec<FileEntry>>,
    pub search_calls: AtomicUsize,
    pub base_calls: AtomicUsize,
}

impl Default for MockIndex {
    fn default() -> Self {
        Self {
            searches: HashMap::new(),
            base: Reply::Ok(None),
            files: Reply::Ok(Vec::new()),
            search_calls: AtomicUsize::new(0),
            base_calls: AtomicUsize::new(0),
        }
    }
}

impl MockIndex {
    pub fn with_search(mut self, term: &str, reply: Reply<Vec<IndexItem>>) -> Self {
        self.searches.insert(term.to_string(), reply);
        self
    }

    pub fn with_base(mut self, reply: Reply<Option<BaseRecord>>) -> Self {
        self.base = reply;
        self
    }

    pub fn with_files(mut self, reply: Reply<Vec<FileEntry>>) -> Self {
        self.files = reply;
        self
    }
}

#[async_trait]
impl UpstreamIndex for MockIndex {
    fn name(&self) -> &str {
        "mock-index"
    }

    async fn search_by_term(&self, term: &str) -> Result<Vec<IndexItem>, ProviderError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        match self.searches.get(term) {
            Some(reply) => reply.resolve("mock-index").await,
            None => Ok(Vec::new()),
        }
    }

    async fn get_by_fingerprint(
        &self,
        _fingerprint: &Fingerprint,
    ) -> Result<Option<BaseRecord>, ProviderError> {
        self.base_calls.fetch_add(1, Ordering::SeqCst);
        self.base.resolve("mock-index").await
    }

    async fn get_file_list(
        &self,
        _fingerprint: &Fingerprint,
    ) -> Result<Vec<FileEntry>, ProviderError> {
        self.files.resolve("mock-index").await
    }
}

#[derive(Default)]
pub struct MockDescriptors {
    /// Reply per language; unknown languages fail
    pub by_language: HashMap<String, Reply<Descriptor>>,
    pub calls: AtomicUsize,
}

impl MockDescriptors {
    pub fn with_language(mut self, language: &str, reply: Reply<Descriptor>) -> Self {
        self.by_language.insert(language.to_string(), reply);
        self
    }
}

#[async_trait]
impl DescriptorProvider for MockDescriptors {
    fn name(&self) -> &str {
        "mock-descriptors"
    }

    async fn get_by_id(
        &self,
        _id: u64,
        _media: MediaKind,
        language: &str,
    ) -> Result<Descriptor, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.by_language.get(language) {
            Some(reply) => reply.resolve("mock-descriptors").await,
            None => Err(ProviderError::Status {
                provider: "mock-descriptors",
                status: 404,
            }),
        }
    }
}

pub struct MockRatings {
    pub suggestions: Reply<Vec<RatingSuggestion>>,
    pub abstracts: Reply<Option<RatingAbstract>>,
    pub queries: parking_lot::Mutex<Vec<String>>,
}

impl Default for MockRatings {
    fn default() -> Self {
        Self {
            suggestions: Reply::Ok(Vec::new()),
            abstracts: Reply::Ok(None),
            queries: parking_lot::Mutex::new(Vec::new()),
        }
    }
}

impl MockRatings {
    pub fn with_suggestions(mut self, reply: Reply<Vec<RatingSuggestion>>) -> Self {
        self.suggestions = reply;
        self
    }

    pub fn with_abstract(mut self, reply: Reply<Option<RatingAbstract>>) -> Self {
        self.abstracts = reply;
        self
    }

    pub fn suggest_calls(&self) -> usize {
        self.queries.lock().len()
    }
}

#[async_trait]
impl RatingProvider for MockRatings {
    fn name(&self) -> &str {
        "mock-ratings"
    }

    async fn suggest(&self, query: &str) -> Result<Vec<RatingSuggestion>, ProviderError> {
        self.queries.lock().push(query.to_string());
        self.suggestions.resolve("mock-ratings").await
    }

    async fn get_abstract(&self, _id: &str) -> Result<Option<RatingAbstract>, ProviderError> {
        self.abstracts.resolve("mock-ratings").await
    }
}
