//! Candidate search and ranking
//!
//! Fans the first expanded keywords out to the upstream index, merges the
//! results and ranks them by keyword match:
//! - every term search runs concurrently under its own timeout
//! - a failed or slow term contributes nothing and never aborts the others
//! - the subject's own fingerprint seeds the dedup set
//! - the sort is stable, so ties keep upstream order

use aurora_core::{
    recommendation_score, CacheLayer, CandidateItem, Fingerprint, IndexItem, Keyword, QualityTier,
    MAX_RELATED, MAX_SEARCH_TERMS,
};
use aurora_net::SharedIndex;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default timeout for one term search
pub const DEFAULT_TERM_TIMEOUT: Duration = Duration::from_secs(5);

/// Weight of an original keyword found in a candidate name
const ORIGINAL_WEIGHT: u32 = 2;

/// Weight of an expansion-only keyword found in a candidate name
const EXPANDED_WEIGHT: u32 = 1;

/// First `max` expanded keywords, used as search terms
pub fn select_terms(expanded: &[Keyword], max: usize) -> Vec<String> {
    expanded.iter().take(max).map(|k| k.text.clone()).collect()
}

/// Relatedness of a candidate name to the subject's keywords
///
/// Two points per original keyword found in the name (case-insensitive
/// substring), one per expanded keyword that is not also an original.
pub fn match_score(name: &str, keywords: &[Keyword], expanded: &[Keyword]) -> u32 {
    let name = name.to_lowercase();
    let originals: HashSet<String> = keywords.iter().map(|k| k.text.to_lowercase()).collect();

    let original_hits = keywords
        .iter()
        .filter(|k| name.contains(&k.text.to_lowercase()))
        .count() as u32;

    let mut counted: HashSet<String> = HashSet::new();
    let expanded_hits = expanded
        .iter()
        .map(|k| k.text.to_lowercase())
        .filter(|k| !originals.contains(k) && counted.insert(k.clone()))
        .filter(|k| name.contains(k.as_str()))
        .count() as u32;

    original_hits * ORIGINAL_WEIGHT + expanded_hits * EXPANDED_WEIGHT
}

/// Merge per-term batches (in term order) into at most `max` ranked candidates
pub fn rank_candidates(
    subject: &Fingerprint,
    batches: Vec<Vec<IndexItem>>,
    keywords: &[Keyword],
    expanded: &[Keyword],
    now: DateTime<Utc>,
    max: usize,
) -> Vec<CandidateItem> {
    let mut seen: HashSet<Fingerprint> = HashSet::new();
    seen.insert(subject.clone());

    let mut candidates: Vec<CandidateItem> = batches
        .into_iter()
        .flatten()
        .filter(|item| seen.insert(item.fingerprint.clone()))
        .map(|item| {
            let quality = QualityTier::from_size(item.size);
            CandidateItem {
                match_score: match_score(&item.name, keywords, expanded),
                recommendation_score: recommendation_score(
                    quality,
                    item.seeders,
                    item.leechers,
                    item.published_at,
                    now,
                ),
                quality,
                fingerprint: item.fingerprint,
                name: item.name,
                size: item.size,
                published_at: item.published_at,
                seeders: item.seeders,
                leechers: item.leechers,
            }
        })
        .collect();

    // Vec::sort_by is stable
    candidates.sort_by(|a, b| b.match_score.cmp(&a.match_score));
    candidates.truncate(max);
    candidates
}

/// Related-content engine over one upstream index
pub struct RelatedSearch {
    index: SharedIndex,
    cache: Arc<CacheLayer>,
    max_terms: usize,
    max_related: usize,
    term_timeout: Duration,
}

impl RelatedSearch {
    pub fn new(index: SharedIndex, cache: Arc<CacheLayer>) -> Self {
        Self {
            index,
            cache,
            max_terms: MAX_SEARCH_TERMS,
            max_related: MAX_RELATED,
            term_timeout: DEFAULT_TERM_TIMEOUT,
        }
    }

    pub fn with_term_timeout(mut self, term_timeout: Duration) -> Self {
        self.term_timeout = term_timeout;
        self
    }

    pub fn with_limits(mut self, max_terms: usize, max_related: usize) -> Self {
        self.max_terms = max_terms.max(1);
        self.max_related = max_related;
        self
    }

    /// Ranked related items for `subject`; empty when nothing can be searched
    pub async fn find_related(
        &self,
        subject: &Fingerprint,
        keywords: &[Keyword],
        expanded: &[Keyword],
    ) -> Vec<CandidateItem> {
        if keywords.is_empty() {
            debug!("No keywords for {}, skipping related search", subject.short());
            return Vec::new();
        }

        let terms = select_terms(expanded, self.max_terms);
        debug!("Related search terms for {}: {:?}", subject.short(), terms);

        // buffered() polls every term at once and yields in term order
        let batches: Vec<Vec<IndexItem>> = stream::iter(terms)
            .map(|term| self.search_term(term))
            .buffered(self.max_terms)
            .collect()
            .await;

        let related = rank_candidates(
            subject,
            batches,
            keywords,
            expanded,
            Utc::now(),
            self.max_related,
        );
        debug!("Found {} related items for {}", related.len(), subject.short());
        related
    }

    /// One term search through the search cache; failures yield nothing
    async fn search_term(&self, term: String) -> Vec<IndexItem> {
        if let Some(items) = self.cache.searches.get(&term) {
            return items;
        }

        match timeout(self.term_timeout, self.index.search_by_term(&term)).await {
            Ok(Ok(items)) => {
                self.cache.searches.insert(term, items.clone());
                items
            }
            Ok(Err(e)) => {
                warn!("Search for {:?} failed: {}", term, e);
                Vec::new()
            }
            Err(_) => {
                warn!("Search for {:?} timed out after {:?}", term, self.term_timeout);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{item, MockIndex, Reply};
    use aurora_core::{expand_keywords, extract_keywords, Category, FranchiseTable, KeywordOrigin};
    use std::sync::atomic::Ordering;
    use std::time::Instant;

    const SUBJECT: &str = "1111111111111111111111111111111111111111";

    fn kw(text: &str) -> Keyword {
        Keyword::new(text, KeywordOrigin::TitleWord)
    }

    fn engine(index: MockIndex) -> (RelatedSearch, Arc<MockIndex>) {
        let index = Arc::new(index);
        let engine = RelatedSearch::new(index.clone(), Arc::new(CacheLayer::default()))
            .with_term_timeout(Duration::from_millis(100));
        (engine, index)
    }

    #[test]
    fn test_match_score_weights() {
        let keywords = vec![kw("Matrix"), kw("1999")];
        let expanded = vec![kw("Matrix"), kw("1999"), kw("2000"), kw("Reloaded")];

        assert_eq!(match_score("The Matrix 1999 1080p", &keywords, &expanded), 4);
        assert_eq!(match_score("the matrix reloaded 2003", &keywords, &expanded), 3);
        assert_eq!(match_score("Something Else", &keywords, &expanded), 0);
        // Originals are not counted a second time as expanded keywords
        assert_eq!(match_score("MATRIX", &keywords, &expanded), 2);
    }

    #[test]
    fn test_case_variant_originals_each_count() {
        let keywords = vec![kw("Matrix"), kw("MATRIX")];
        let expanded = vec![kw("Matrix"), kw("MATRIX"), kw("matrix")];

        assert_eq!(match_score("The Matrix", &keywords, &expanded), 4);
    }

    #[test]
    fn test_rank_excludes_subject_and_dedups() {
        let keywords = vec![kw("Matrix")];
        let batches = vec![
            vec![item(SUBJECT, "The Matrix"), item("a1", "Matrix A"), item("b1", "Other")],
            vec![item("a1", "Matrix A again"), item("c1", "Matrix C")],
        ];
        let ranked = rank_candidates(
            &Fingerprint::new(SUBJECT),
            batches,
            &keywords,
            &keywords,
            Utc::now(),
            MAX_RELATED,
        );

        let names: Vec<_> = ranked.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Matrix A", "Matrix C", "Other"]);
        assert!(ranked.iter().all(|c| c.fingerprint.as_str() != SUBJECT));
    }

    #[test]
    fn test_rank_stable_and_truncated() {
        let keywords = vec![kw("Show")];
        let batch: Vec<_> = (0..20)
            .map(|i| {
                let name = if i % 2 == 0 { format!("Show {}", i) } else { format!("Other {}", i) };
                item(&format!("{:040}", i + 1), &name)
            })
            .collect();

        let ranked = rank_candidates(
            &Fingerprint::new(SUBJECT),
            vec![batch],
            &keywords,
            &keywords,
            Utc::now(),
            MAX_RELATED,
        );

        assert_eq!(ranked.len(), MAX_RELATED);
        assert!(ranked.windows(2).all(|w| w[0].match_score >= w[1].match_score));
        // Ties keep upstream order
        assert_eq!(ranked[0].name, "Show 0");
        assert_eq!(ranked[1].name, "Show 2");
        assert_eq!(ranked[10].name, "Other 1");
    }

    #[tokio::test]
    async fn test_slow_term_contributes_nothing() {
        let a_items: Vec<_> = (0..5)
            .map(|i| item(&format!("a{}", i), &format!("Matrix part {}", i)))
            .collect();
        let index = MockIndex::default()
            .with_search("A", Reply::Ok(a_items))
            .with_search("B", Reply::Slow(Duration::from_secs(2), vec![item("b0", "Matrix B")]));
        let (engine, _) = engine(index);

        let keywords = vec![kw("A"), kw("B")];
        let related = engine
            .find_related(&Fingerprint::new(SUBJECT), &keywords, &keywords)
            .await;

        assert_eq!(related.len(), 5);
        assert!(related.iter().all(|c| c.name.starts_with("Matrix part")));
    }

    #[tokio::test]
    async fn test_failed_term_does_not_abort() {
        let index = MockIndex::default()
            .with_search("A", Reply::Fail)
            .with_search("B", Reply::Ok(vec![item("b0", "B item")]));
        let (engine, _) = engine(index);

        let keywords = vec![kw("A"), kw("B")];
        let related = engine
            .find_related(&Fingerprint::new(SUBJECT), &keywords, &keywords)
            .await;
        assert_eq!(related.len(), 1);
    }

    #[tokio::test]
    async fn test_terms_run_concurrently() {
        let delay = Duration::from_millis(80);
        let index = MockIndex::default()
            .with_search("A", Reply::Slow(delay, vec![item("a0", "A")]))
            .with_search("B", Reply::Slow(delay, vec![item("b0", "B")]))
            .with_search("C", Reply::Slow(delay, vec![item("c0", "C")]))
            .with_search("D", Reply::Slow(delay, vec![item("d0", "D")]));
        let index = Arc::new(index);
        let engine = RelatedSearch::new(index.clone(), Arc::new(CacheLayer::default()))
            .with_term_timeout(Duration::from_secs(5));

        let keywords = vec![kw("A"), kw("B"), kw("C"), kw("D")];
        let started = Instant::now();
        let related = engine
            .find_related(&Fingerprint::new(SUBJECT), &keywords, &keywords)
            .await;

        assert_eq!(related.len(), 4);
        assert!(started.elapsed() < delay * 3);
        // Tied scores keep term order
        let names: Vec<_> = related.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn test_only_first_terms_searched_and_cached() {
        let index = MockIndex::default().with_search("Matrix", Reply::Ok(vec![item("a0", "Matrix")]));
        let (engine, index) = engine(index);

        let keywords = extract_keywords("The.Matrix.1999.1080p.BluRay.x264-GROUP", Category::Movie);
        let expanded = expand_keywords(&keywords, Category::Movie, "The Matrix", &FranchiseTable::builtin());

        engine.find_related(&Fingerprint::new(SUBJECT), &keywords, &expanded).await;
        assert_eq!(index.search_calls.load(Ordering::SeqCst), MAX_SEARCH_TERMS);

        // Second pass is served from the search cache
        engine.find_related(&Fingerprint::new(SUBJECT), &keywords, &expanded).await;
        assert_eq!(index.search_calls.load(Ordering::SeqCst), MAX_SEARCH_TERMS);
    }

    #[tokio::test]
    async fn test_no_keywords_no_search() {
        let (engine, index) = engine(MockIndex::default());
        let related = engine.find_related(&Fingerprint::new(SUBJECT), &[], &[]).await;
        assert!(related.is_empty());
        assert_eq!(index.search_calls.load(Ordering::SeqCst), 0);
    }
}
