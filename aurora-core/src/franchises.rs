//! Franchise association tables and keyword expansion
//!
//! Expands extracted keywords into a broader related-search term set:
//! adjacent release years, the base title of a sequel, and hand-curated
//! franchise associations looked up by case-insensitive title substring.
//!
//! The built-in tables are seed data. Deployments extend them through the
//! `[franchises]` configuration section (see [`FranchiseTable::extend`]).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::{Category, Keyword, KeywordOrigin, MAX_EXPANDED_KEYWORDS};

/// Built-in movie/TV franchise associations
pub static VIDEO_FRANCHISES: &[(&str, &[&str])] = &[
    ("Marvel", &["MCU", "Avengers", "Spider", "Iron Man", "Captain"]),
    ("DC", &["Batman", "Superman", "Justice League", "Wonder Woman"]),
    ("Star Wars", &["Skywalker", "Mandalorian", "Jedi", "Sith"]),
    ("Star Trek", &["Enterprise", "Voyager", "Discovery", "Picard"]),
    ("Harry Potter", &["Wizarding", "Fantastic Beasts", "Hogwarts"]),
    ("Lord of the Rings", &["Hobbit", "Middle Earth", "LOTR"]),
    ("Fast", &["Furious", "Fast and Furious"]),
    ("Mission Impossible", &["MI", "Impossible"]),
];

/// Built-in game franchise associations
pub static GAME_FRANCHISES: &[(&str, &[&str])] = &[
    ("Call of Duty", &["COD", "Modern Warfare", "Black Ops", "Warzone"]),
    ("Assassin", &["AC", "Creed", "Ubisoft"]),
    ("Grand Theft Auto", &["GTA", "Rockstar"]),
    ("Elder Scrolls", &["Skyrim", "Oblivion", "Morrowind", "TES"]),
    ("Fallout", &["Bethesda", "Wasteland"]),
    ("Witcher", &["Geralt", "CD Projekt"]),
    ("Dark Souls", &["Elden Ring", "Bloodborne", "Sekiro", "FromSoftware"]),
    ("Final Fantasy", &["FF", "Square Enix"]),
];

/// One franchise: title substring and its associated terms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FranchiseEntry {
    pub key: String,
    pub terms: Vec<String>,
}

impl FranchiseEntry {
    fn from_static(key: &str, terms: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            terms: terms.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Franchise lookup tables, built once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FranchiseTable {
    #[serde(default)]
    pub video: Vec<FranchiseEntry>,
    #[serde(default)]
    pub games: Vec<FranchiseEntry>,
}

impl FranchiseTable {
    /// Tables seeded from [`VIDEO_FRANCHISES`] and [`GAME_FRANCHISES`]
    pub fn builtin() -> Self {
        Self {
            video: VIDEO_FRANCHISES
                .iter()
                .map(|(k, t)| FranchiseEntry::from_static(k, t))
                .collect(),
            games: GAME_FRANCHISES
                .iter()
                .map(|(k, t)| FranchiseEntry::from_static(k, t))
                .collect(),
        }
    }

    /// Append extra entries after the existing ones
    pub fn extend(&mut self, extra: FranchiseTable) {
        self.video.extend(extra.video);
        self.games.extend(extra.games);
    }

    /// Associated terms for every franchise key found in `title`
    pub fn terms_for(&self, title: &str, category: Category) -> Vec<&str> {
        let entries = if category.is_video() {
            &self.video
        } else if category.is_game() {
            &self.games
        } else {
            return Vec::new();
        };

        let title_lower = title.to_lowercase();
        entries
            .iter()
            .filter(|e| !e.key.is_empty() && title_lower.contains(&e.key.to_lowercase()))
            .flat_map(|e| e.terms.iter().map(String::as_str))
            .collect()
    }
}

static SEQUEL_HINT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?-u:\b)(Part|Vol|II|III|IV|V)(?-u:\b)").unwrap());

static TRAILING_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\s+(Part|Vol|Volume|Chapter|Episode|Season|Series|II|III|IV|V|VI|VII|VIII|IX|X|\d+))+$",
    )
    .unwrap()
});

fn is_sequel_marker(keyword: &Keyword) -> bool {
    keyword.origin == KeywordOrigin::SequelMarker || SEQUEL_HINT_REGEX.is_match(&keyword.text)
}

/// Base title of a sequel: the longest keyword that is neither a marker nor
/// a year, with trailing marker words removed
fn franchise_base(keywords: &[Keyword]) -> Option<String> {
    let mut best: Option<&Keyword> = None;
    for k in keywords {
        if matches!(
            k.origin,
            KeywordOrigin::SequelMarker | KeywordOrigin::Year | KeywordOrigin::AdjacentYear
        ) {
            continue;
        }
        if best.map_or(true, |b| k.text.chars().count() > b.text.chars().count()) {
            best = Some(k);
        }
    }

    let base = TRAILING_MARKER_REGEX.replace(&best?.text, "").trim().to_string();
    (base.chars().count() >= 2).then_some(base)
}

/// Expand keywords into a superset of at most [`MAX_EXPANDED_KEYWORDS`]
/// terms. Input keywords keep their order and come first.
pub fn expand_keywords(
    keywords: &[Keyword],
    category: Category,
    title: &str,
    table: &FranchiseTable,
) -> Vec<Keyword> {
    let mut expanded: Vec<Keyword> = keywords.to_vec();

    if category.is_video() {
        let year = keywords
            .iter()
            .find(|k| k.origin == KeywordOrigin::Year)
            .and_then(|k| k.text.parse::<u32>().ok());
        if let Some(year) = year {
            expanded.push(Keyword::new((year - 1).to_string(), KeywordOrigin::AdjacentYear));
            expanded.push(Keyword::new((year + 1).to_string(), KeywordOrigin::AdjacentYear));
        }

        if keywords.iter().any(is_sequel_marker) {
            if let Some(base) = franchise_base(keywords) {
                expanded.push(Keyword::new(base, KeywordOrigin::FranchiseBase));
            }
        }
    }

    for term in table.terms_for(title, category) {
        expanded.push(Keyword::new(term, KeywordOrigin::FranchiseTerm));
    }

    let mut seen: HashSet<String> = HashSet::new();
    expanded.retain(|k| seen.insert(k.text.clone()));
    expanded.truncate(MAX_EXPANDED_KEYWORDS.max(keywords.len()));
    expanded
}
