//! Rating lookup
//!
//! Derives a search query from the release title, picks the best rating
//! source suggestion and augments it with the rating and vote count.
//! Both outcomes are cached: a found entry, and an empty suggestion list
//! as a negative result.

use aurora_core::{CacheLayer, RatingInfo};
use aurora_net::{subject_url, RatingSuggestion, SharedRatingProvider};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

pub const DEFAULT_AUGMENT_TIMEOUT: Duration = Duration::from_secs(3);

/// Queries shorter than this are not sent
const MIN_QUERY_LEN: usize = 2;

/// Below this a tier's query is considered too weak
const WEAK_QUERY_LEN: usize = 3;

const MAX_PHRASE_WORDS: usize = 3;

const MAX_CJK_QUERY_CHARS: usize = 10;

static SEPARATOR_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[._]+").unwrap());

static MULTI_WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u:\b)([A-Z][a-z]+(?:\s+[A-Z][a-z]+)+)(?-u:\b)").unwrap());

static LEADING_ARTICLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(The|A|An)\s+").unwrap());

static SEQUEL_WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(II|III|IV|V|VI|Revolutions?|Reloaded|Resurrection)$").unwrap()
});

static SINGLE_WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u:\b)([A-Z][a-z]{3,})(?-u:\b)").unwrap());

static LEADING_CJK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\u{4e00}-\u{9fa5}]+").unwrap());

static CJK_NOISE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[特效字幕]|\d+").unwrap());

fn is_weak(query: &str) -> bool {
    query.chars().count() < WEAK_QUERY_LEN
}

/// Rating search query for a release title, tiered:
/// 1. a run of capitalized words, minus a leading article and sequel words
/// 2. a single capitalized word of 4+ letters
/// 3. the leading CJK run, minus noise characters
pub fn derive_query(title: &str) -> Option<String> {
    let normalized = SEPARATOR_REGEX.replace_all(title, " ");
    let mut query = String::new();

    if let Some(m) = MULTI_WORD_REGEX.captures(&normalized).and_then(|c| c.get(1)) {
        let phrase = LEADING_ARTICLE_REGEX.replace(m.as_str(), "");
        query = phrase
            .split_whitespace()
            .filter(|w| !SEQUEL_WORD_REGEX.is_match(w))
            .take(MAX_PHRASE_WORDS)
            .collect::<Vec<_>>()
            .join(" ");
    }

    if is_weak(&query) {
        if let Some(m) = SINGLE_WORD_REGEX.captures(&normalized).and_then(|c| c.get(1)) {
            query = m.as_str().to_string();
        }
    }

    if is_weak(&query) {
        if let Some(m) = LEADING_CJK_REGEX.find(&normalized) {
            query = CJK_NOISE_REGEX
                .replace_all(m.as_str(), "")
                .chars()
                .take(MAX_CJK_QUERY_CHARS)
                .collect();
        }
    }

    let query = query.trim();
    (query.chars().count() >= MIN_QUERY_LEN).then(|| query.to_string())
}

/// First suggestion, unless a year is known and there are several
/// suggestions, in which case the first whose year contains it
pub fn best_match<'a>(
    suggestions: &'a [RatingSuggestion],
    year: Option<&str>,
) -> Option<&'a RatingSuggestion> {
    let first = suggestions.first()?;
    match year {
        Some(year) if suggestions.len() > 1 => Some(
            suggestions
                .iter()
                .find(|s| s.year.as_deref().is_some_and(|y| y.contains(year)))
                .unwrap_or(first),
        ),
        _ => Some(first),
    }
}

pub fn rating_cache_key(query: &str, year: Option<&str>) -> String {
    format!("{}_{}", query, year.unwrap_or("noyear"))
}

pub struct RatingLookup {
    provider: SharedRatingProvider,
    cache: Arc<CacheLayer>,
    timeout: Duration,
    augment_timeout: Duration,
}

impl RatingLookup {
    pub fn new(provider: SharedRatingProvider, cache: Arc<CacheLayer>) -> Self {
        Self {
            provider,
            cache,
            timeout: Duration::from_secs(5),
            augment_timeout: DEFAULT_AUGMENT_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, timeout: Duration, augment_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.augment_timeout = augment_timeout;
        self
    }

    /// Rating entry for a title, `None` when skipped, not found or failed
    pub async fn lookup(&self, title: &str, year: Option<&str>) -> Option<RatingInfo> {
        let Some(query) = derive_query(title) else {
            debug!("No usable rating query in {:?}, skipping", title);
            return None;
        };

        let key = rating_cache_key(&query, year);
        if let Some(cached) = self.cache.ratings.get(&key) {
            return cached;
        }

        debug!("Rating search {:?} (year: {:?})", query, year);
        let suggestions = match timeout(self.timeout, self.provider.suggest(&query)).await {
            Ok(Ok(suggestions)) => suggestions,
            Ok(Err(e)) => {
                warn!("{} search for {:?} failed: {}", self.provider.name(), query, e);
                return None;
            }
            Err(_) => {
                warn!("{} search for {:?} timed out", self.provider.name(), query);
                return None;
            }
        };

        let Some(best) = best_match(&suggestions, year) else {
            debug!("No rating results for {:?}", query);
            self.cache.ratings.insert(key, None);
            return None;
        };

        let mut info = RatingInfo {
            id: best.id.clone(),
            title: best.title.clone(),
            year: best.year.clone(),
            url: subject_url(&best.id),
            thumbnail: best.thumbnail.clone(),
            rating: None,
            vote_count: None,
        };

        match timeout(self.augment_timeout, self.provider.get_abstract(&info.id)).await {
            Ok(Ok(Some(abs))) => {
                info.rating = abs.rating;
                info.vote_count = abs.vote_count;
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => debug!("Rating details for {} failed: {}", info.id, e),
            Err(_) => debug!("Rating details for {} timed out", info.id),
        }

        self.cache.ratings.insert(key, Some(info.clone()));
        Some(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{suggestion, MockRatings, Reply};
    use aurora_net::RatingAbstract;

    fn lookup(provider: MockRatings) -> (RatingLookup, Arc<MockRatings>, Arc<CacheLayer>) {
        let provider = Arc::new(provider);
        let cache = Arc::new(CacheLayer::default());
        let lookup = RatingLookup::new(provider.clone(), cache.clone())
            .with_timeouts(Duration::from_millis(200), Duration::from_millis(50));
        (lookup, provider, cache)
    }

    #[test]
    fn test_derive_query_tiers() {
        assert_eq!(derive_query("The.Matrix.Reloaded.2003.1080p").as_deref(), Some("Matrix"));
        assert_eq!(
            derive_query("The Lord Of The Rings 2001").as_deref(),
            Some("Lord Of The")
        );
        assert_eq!(derive_query("Inception.2010.2160p").as_deref(), Some("Inception"));
        assert_eq!(derive_query("流浪地球2 特效字幕 2023").as_deref(), Some("流浪地球"));
        assert_eq!(derive_query("三体Trisolaris.2023").as_deref(), Some("Trisolaris"));
        assert_eq!(derive_query("x264 1080p"), None);
        assert_eq!(derive_query(""), None);
    }

    #[test]
    fn test_best_match() {
        let suggestions = vec![
            suggestion("1", "Dune", "1984"),
            suggestion("2", "Dune", "2021"),
        ];
        assert_eq!(best_match(&suggestions, Some("2021")).unwrap().id, "2");
        assert_eq!(best_match(&suggestions, None).unwrap().id, "1");
        assert_eq!(best_match(&suggestions, Some("1999")).unwrap().id, "1");

        // A single result wins even with a mismatching year
        assert_eq!(best_match(&suggestions[1..], Some("1984")).unwrap().id, "2");
        assert!(best_match(&[], Some("1984")).is_none());
    }

    #[tokio::test]
    async fn test_lookup_with_augmentation() {
        let provider = MockRatings::default()
            .with_suggestions(Reply::Ok(vec![suggestion("1291843", "黑客帝国", "1999")]))
            .with_abstract(Reply::Ok(Some(RatingAbstract {
                rating: Some(9.1),
                vote_count: Some(1800000),
            })));
        let (lookup, provider, _) = lookup(provider);

        let info = lookup.lookup("The.Matrix.1999.1080p", Some("1999")).await.unwrap();
        assert_eq!(info.id, "1291843");
        assert_eq!(info.url, "https://movie.douban.com/subject/1291843/");
        assert_eq!(info.rating, Some(9.1));
        assert_eq!(info.vote_count, Some(1800000));

        // Served from cache the second time
        lookup.lookup("The.Matrix.1999.1080p", Some("1999")).await.unwrap();
        assert_eq!(provider.suggest_calls(), 1);
    }

    #[tokio::test]
    async fn test_augmentation_timeout_keeps_identity() {
        let provider = MockRatings::default()
            .with_suggestions(Reply::Ok(vec![suggestion("42", "Dune", "2021")]))
            .with_abstract(Reply::Slow(
                Duration::from_secs(2),
                Some(RatingAbstract {
                    rating: Some(8.0),
                    vote_count: Some(10),
                }),
            ));
        let (lookup, _, _) = lookup(provider);

        let info = lookup.lookup("Dune.Part.Two.2024", Some("2024")).await.unwrap();
        assert_eq!(info.id, "42");
        assert_eq!(info.title, "Dune");
        assert!(info.rating.is_none());
        assert!(info.vote_count.is_none());
    }

    #[tokio::test]
    async fn test_negative_result_cached() {
        let (lookup, provider, cache) = lookup(MockRatings::default());

        assert!(lookup.lookup("Unknown Film", None).await.is_none());
        assert!(lookup.lookup("Unknown Film", None).await.is_none());
        assert_eq!(provider.suggest_calls(), 1);
        assert_eq!(cache.ratings.get("Unknown Film_noyear"), Some(None));
    }

    #[tokio::test]
    async fn test_failure_not_cached() {
        let (lookup, provider, cache) =
            lookup(MockRatings::default().with_suggestions(Reply::Fail));

        assert!(lookup.lookup("Unknown Film", None).await.is_none());
        assert!(lookup.lookup("Unknown Film", None).await.is_none());
        assert_eq!(provider.suggest_calls(), 2);
        assert_eq!(cache.ratings.len(), 0);
    }

    #[tokio::test]
    async fn test_short_query_skipped() {
        let (lookup, provider, _) = lookup(MockRatings::default());
        assert!(lookup.lookup("1080p x264", None).await.is_none());
        assert_eq!(provider.suggest_calls(), 0);
    }
}
