//! Size-derived quality tiers and the composite recommendation score

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const GIB: u64 = 1024 * 1024 * 1024;

/// Age assumed for items without a publish timestamp
const UNKNOWN_AGE_DAYS: f64 = 365.0;

/// Coarse quality bucket derived purely from total size
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    #[serde(rename = "SD")]
    Sd,
    #[serde(rename = "HD")]
    Hd,
    #[serde(rename = "FHD")]
    Fhd,
    #[serde(rename = "4K")]
    Uhd,
}

impl QualityTier {
    /// Bucket a size in bytes: <1 GiB SD, <3 GiB HD, <8 GiB FHD, else 4K
    pub fn from_size(size: u64) -> Self {
        if size < GIB {
            QualityTier::Sd
        } else if size < 3 * GIB {
            QualityTier::Hd
        } else if size < 8 * GIB {
            QualityTier::Fhd
        } else {
            QualityTier::Uhd
        }
    }

    /// Numeric weight used by the recommendation score (1..=4)
    pub fn weight(&self) -> u32 {
        match self {
            QualityTier::Sd => 1,
            QualityTier::Hd => 2,
            QualityTier::Fhd => 3,
            QualityTier::Uhd => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::Sd => "SD",
            QualityTier::Hd => "HD",
            QualityTier::Fhd => "FHD",
            QualityTier::Uhd => "4K",
        }
    }
}

/// Composite display score: quality dominates, then swarm health, then recency.
///
/// `tier * 10 + (2 * seeders + leechers) / 10 + max(0, 100 - days / 3.65) / 10`
pub fn recommendation_score(
    tier: QualityTier,
    seeders: u32,
    leechers: u32,
    published_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> f64 {
    let health = (seeders as f64) * 2.0 + leechers as f64;
    let days_old = published_at
        .map(|ts| (now - ts).num_milliseconds() as f64 / 86_400_000.0)
        .unwrap_or(UNKNOWN_AGE_DAYS);
    let recency = (100.0 - days_old / 3.65).max(0.0);

    tier.weight() as f64 * 10.0 + health / 10.0 + recency / 10.0
}
