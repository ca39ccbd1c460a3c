//! Keyword extraction from noisy release titles
//!
//! Produces a short, ordered list of search terms for a release title:
//! - the release year first (when present)
//! - for movies/TV, a title phrase built from capitalized words, then the
//!   individual words, then sequel/season markers
//! - for games, edition qualifiers, version strings and DLC markers
//! - for software and everything else, a version string and generic words
//!
//! Release-metadata noise (resolutions, codecs, source tags, edition and
//! language tags, bracketed segments) is stripped before word scanning.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::{Category, MAX_KEYWORDS};

/// Where a keyword came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordOrigin {
    /// Four-digit release year
    Year,
    /// Compound title candidate (first capitalized words)
    TitlePhrase,
    /// Single significant word of the title
    TitleWord,
    /// Sequel, season, part or episode marker
    SequelMarker,
    /// Game edition qualifier or DLC/update marker
    Edition,
    /// Version string
    Version,
    /// Generic alphabetic token
    Generic,
    /// Year next to the release year (added by expansion)
    AdjacentYear,
    /// Base title of a sequel (added by expansion)
    FranchiseBase,
    /// Associated term from the franchise tables (added by expansion)
    FranchiseTerm,
}

/// A search term plus its extraction origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    pub origin: KeywordOrigin,
}

impl Keyword {
    pub fn new(text: impl Into<String>, origin: KeywordOrigin) -> Self {
        Self {
            text: text.into(),
            origin,
        }
    }
}

/// Words never emitted on their own
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "of", "in", "on", "at", "by",
];

/// Minimum keyword length in characters
const MIN_KEYWORD_LEN: usize = 2;

static YEAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u:\b)(19\d{2}|20\d{2})(?-u:\b)").unwrap());

// Noise patterns stripped before scanning for words
static NOISE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\[.*?\]",
        r"\(.*?\)",
        r"【.*?】",
        r"(?i)\d{3,4}p",
        r"(?i)(?-u:\b)(HEVC|x264|x265|H\.264|H\.265|AVC|XVID|DIVX|MKV|MP4|AVI)(?-u:\b)",
        r"(?i)(?-u:\b)(BluRay|BRRip|WEB-DL|WEBRip|HDTV|DVDRip|BDRip|BD\d+P)(?-u:\b)",
        r"(?i)(?-u:\b)(AAC|DTS-HD\.MA|DTS|AC3|MP3|FLAC|TrueHD|Atmos|MA)(?-u:\b)",
        r"(?i)(?-u:\b)(PROPER|REPACK|INTERNAL|LIMITED|UNRATED|EXTENDED|SDR|HDR)(?-u:\b)",
        r"(?i)(?-u:\b)(English|Mandarin|CHS|CHT|ENG)(?-u:\b)",
        r"中英|字幕|特效",
        r"&",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static VIDEO_SPLIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s.\-_,:：]+").unwrap());

static GENERIC_SPLIT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s.\-_]+").unwrap());

static CAPITALIZED_WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Za-z]*$").unwrap());

static GROUP_TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(FFans|Fans)$").unwrap());

static LEADING_ARTICLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(The|And)$").unwrap());

// Sequel/season markers, scanned on the raw title in this order
static SEQUEL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(?-u:\b)(Part|Vol|Volume|Chapter|Episode|Season|Series)[\s._]*(\d+|[IVX]+)(?-u:\b)",
        r"(?-u:\b)(II|III|IV|V|VI|VII|VIII|IX|X)(?-u:\b)",
        r"第\s*[一二三四五六七八九十\d]+\s*[季部集]",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static EDITION_PATTERNS: LazyLock<Vec<(Regex, KeywordOrigin)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)(?-u:\b)(GOTY|Game of the Year|Deluxe|Ultimate|Complete|Definitive|Enhanced)(?-u:\b)")
                .unwrap(),
            KeywordOrigin::Edition,
        ),
        (
            Regex::new(r"(?i)(?-u:\b)(v\d+\.\d+|\d+\.\d+\.\d+)(?-u:\b)").unwrap(),
            KeywordOrigin::Version,
        ),
        (
            Regex::new(r"(?i)(?-u:\b)(DLC|Expansion|Update)(?-u:\b)").unwrap(),
            KeywordOrigin::Edition,
        ),
    ]
});

static SOFTWARE_VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?-u:\b)v?\d+\.\d+[.\d]*(?-u:\b)").unwrap());

/// First year token (1900-2099) in a title
pub fn extract_year(title: &str) -> Option<String> {
    YEAR_REGEX.find(title).map(|m| m.as_str().to_string())
}

/// Title with release-metadata noise replaced by spaces
pub fn clean_title(title: &str) -> String {
    NOISE_PATTERNS
        .iter()
        .fold(title.to_string(), |acc, re| re.replace_all(&acc, " ").into_owned())
}

/// Extract up to [`MAX_KEYWORDS`] ordered, distinct keywords from a title.
///
/// An empty result means related content cannot be searched for; it is not
/// an error.
pub fn extract_keywords(title: &str, category: Category) -> Vec<Keyword> {
    let mut keywords = Vec::new();

    if let Some(year) = extract_year(title) {
        keywords.push(Keyword::new(year, KeywordOrigin::Year));
    }

    let clean = clean_title(title);

    match category {
        Category::Movie | Category::Tv => extract_video(title, &clean, &mut keywords),
        Category::PcGames | Category::ConsoleGames => extract_game(&clean, &mut keywords),
        Category::PcSoftware => {
            if let Some(m) = SOFTWARE_VERSION_REGEX.find(&clean) {
                keywords.push(Keyword::new(m.as_str(), KeywordOrigin::Version));
            }
            keywords.extend(generic_words(&clean, 2, 3));
        }
        Category::Other => keywords.extend(generic_words(&clean, 3, 4)),
    }

    finalize(keywords)
}

fn extract_video(title: &str, clean: &str, keywords: &mut Vec<Keyword>) {
    let words: Vec<&str> = VIDEO_SPLIT_REGEX
        .split(clean)
        .filter(|w| w.len() >= 3 && CAPITALIZED_WORD_REGEX.is_match(w))
        .filter(|w| !GROUP_TAG_REGEX.is_match(w))
        .collect();

    let leading: Vec<&str> = words.iter().take(4).copied().collect();

    if leading.len() >= 2 {
        keywords.push(Keyword::new(leading.join(" "), KeywordOrigin::TitlePhrase));
    }
    for word in &leading {
        if !LEADING_ARTICLE_REGEX.is_match(word) {
            keywords.push(Keyword::new(*word, KeywordOrigin::TitleWord));
        }
    }

    for pattern in SEQUEL_PATTERNS.iter() {
        for m in pattern.find_iter(title) {
            let marker = m.as_str().replace(['.', '_'], " ");
            keywords.push(Keyword::new(marker, KeywordOrigin::SequelMarker));
        }
    }
}

fn extract_game(clean: &str, keywords: &mut Vec<Keyword>) {
    for (pattern, origin) in EDITION_PATTERNS.iter() {
        for m in pattern.find_iter(clean) {
            keywords.push(Keyword::new(m.as_str(), *origin));
        }
    }
    keywords.extend(generic_words(clean, 3, 4));
}

/// Alphabetic-bearing tokens of `min_len..=30` characters, first `limit`
fn generic_words(clean: &str, min_len: usize, limit: usize) -> Vec<Keyword> {
    GENERIC_SPLIT_REGEX
        .split(clean)
        .filter(|w| {
            let len = w.chars().count();
            len >= min_len && len <= 30 && w.chars().any(|c| c.is_ascii_alphabetic())
        })
        .take(limit)
        .map(|w| Keyword::new(w, KeywordOrigin::Generic))
        .collect()
}

fn is_stop_word(text: &str) -> bool {
    STOP_WORDS.iter().any(|s| s.eq_ignore_ascii_case(text))
}

/// Trim, drop short and stop words, dedupe (first wins), cap
fn finalize(keywords: Vec<Keyword>) -> Vec<Keyword> {
    let mut seen: HashSet<String> = HashSet::new();

    keywords
        .into_iter()
        .filter_map(|k| {
            let text = k.text.trim().to_string();
            if text.chars().count() < MIN_KEYWORD_LEN || is_stop_word(&text) {
                return None;
            }
            seen.insert(text.clone()).then(|| Keyword::new(text, k.origin))
        })
        .take(MAX_KEYWORDS)
        .collect()
}
