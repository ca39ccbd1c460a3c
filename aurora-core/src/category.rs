//! Torrent content categories
//!
//! The keyword extractor and the resolver branch on a small fixed set of
//! categories. Upstream indexes use their own vocabularies, so
//! [`Category::from_upstream`] folds both bitmagnet content types and
//! torznab-style names into this enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category tag of a torrent record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Movie,
    Tv,
    PcGames,
    ConsoleGames,
    PcSoftware,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Movie,
        Category::Tv,
        Category::PcGames,
        Category::ConsoleGames,
        Category::PcSoftware,
        Category::Other,
    ];

    /// Map an upstream content type or torznab category name
    pub fn from_upstream(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "movie" | "movies" => Category::Movie,
            "tv" | "tv_show" | "tv-show" | "tvshow" => Category::Tv,
            "pc-games" | "game" | "games" => Category::PcGames,
            "console-games" | "console" => Category::ConsoleGames,
            "pc-software" | "software" | "pc-0day" | "pc" => Category::PcSoftware,
            _ => Category::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Movie => "movie",
            Category::Tv => "tv",
            Category::PcGames => "pc-games",
            Category::ConsoleGames => "console-games",
            Category::PcSoftware => "pc-software",
            Category::Other => "other",
        }
    }

    /// Movie or TV content (descriptor and rating lookups apply)
    pub fn is_video(&self) -> bool {
        matches!(self, Category::Movie | Category::Tv)
    }

    pub fn is_game(&self) -> bool {
        matches!(self, Category::PcGames | Category::ConsoleGames)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Category::from_upstream(s))
    }
}
