//! Enrichment record and the values it is assembled from
//!
//! The record is the unit the resolver produces and the record cache stores.
//! Optional parts serialize as `null` rather than being omitted, so consumers
//! see the same shape no matter which enrichment sources failed.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::{Category, FileEntry, FileStats, QualityTier, ReferenceLink};

/// Content fingerprint of a torrent (infohash)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Normalize to trimmed lowercase
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 40 hex characters (v1 infohash)
    pub fn is_valid_infohash(&self) -> bool {
        self.0.len() == 40 && self.0.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Short prefix for log lines
    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(8).map(|(i, _)| i).unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Raw upstream attributes, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, keeping the original position on replace
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First present attribute among `names`
    pub fn first_of(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.get(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<(String, String)>> for Attributes {
    fn from(pairs: Vec<(String, String)>) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in pairs {
            attrs.insert(k, v);
        }
        attrs
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Attributes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AttributesVisitor;

        impl<'de> Visitor<'de> for AttributesVisitor {
            type Value = Attributes;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of attribute names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Attributes, A::Error> {
                let mut attrs = Attributes::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    attrs.insert(k, v);
                }
                Ok(attrs)
            }
        }

        deserializer.deserialize_map(AttributesVisitor)
    }
}

/// One search hit from the upstream index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexItem {
    pub fingerprint: Fingerprint,
    pub name: String,
    pub size: u64,
    pub published_at: Option<DateTime<Utc>>,
    pub seeders: u32,
    pub leechers: u32,
}

/// Canonical record returned by the upstream index for a fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseRecord {
    pub title: String,
    pub size: u64,
    pub category: Category,
    pub attributes: Attributes,
    pub magnet_uri: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Cast credit on a descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub name: String,
    pub character: Option<String>,
    pub profile_path: Option<String>,
}

/// Trailer or teaser video reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trailer {
    pub key: String,
    pub site: String,
    pub name: String,
    pub kind: String,
}

/// Rich movie/TV metadata from the primary descriptor source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub id: u64,
    pub language: String,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<u64>,
    pub release_date: Option<String>,
    pub runtime: Option<u32>,
    pub genres: Vec<String>,
    pub cast: Vec<CastMember>,
    pub posters: Vec<String>,
    pub backdrops: Vec<String>,
    pub trailers: Vec<Trailer>,
}

impl Descriptor {
    /// Four-digit year from the release date, if any
    pub fn release_year(&self) -> Option<&str> {
        self.release_date
            .as_deref()
            .filter(|d| d.len() >= 4 && d.is_char_boundary(4))
            .map(|d| &d[..4])
            .filter(|y| y.chars().all(|c| c.is_ascii_digit()))
    }
}

/// Rating-source entry; rating fields stay `None` if augmentation failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingInfo {
    pub id: String,
    pub title: String,
    pub year: Option<String>,
    pub url: String,
    pub thumbnail: Option<String>,
    pub rating: Option<f64>,
    pub vote_count: Option<u64>,
}

/// A torrent proposed as related to the subject record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub fingerprint: Fingerprint,
    pub name: String,
    pub size: u64,
    pub published_at: Option<DateTime<Utc>>,
    pub seeders: u32,
    pub leechers: u32,
    pub quality: QualityTier,
    pub match_score: u32,
    pub recommendation_score: f64,
}

/// Fully resolved enrichment record for one fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub fingerprint: Fingerprint,
    pub title: String,
    pub size: u64,
    pub category: Category,
    pub magnet_uri: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub attributes: Attributes,
    pub descriptor: Option<Descriptor>,
    pub rating: Option<RatingInfo>,
    pub related: Vec<CandidateItem>,
    pub files: Option<Vec<FileEntry>>,
    pub file_stats: Option<FileStats>,
    pub image_files: Option<Vec<FileEntry>>,
    pub reference_links: Vec<ReferenceLink>,
    pub resolved_at: DateTime<Utc>,
}

impl EnrichmentRecord {
    /// Bare record from a base lookup; every enrichment field absent
    pub fn from_base(fingerprint: Fingerprint, base: BaseRecord) -> Self {
        Self {
            fingerprint,
            title: base.title,
            size: base.size,
            category: base.category,
            magnet_uri: base.magnet_uri,
            published_at: base.published_at,
            attributes: base.attributes,
            descriptor: None,
            rating: None,
            related: Vec::new(),
            files: None,
            file_stats: None,
            image_files: None,
            reference_links: Vec::new(),
            resolved_at: Utc::now(),
        }
    }

    pub fn quality(&self) -> QualityTier {
        QualityTier::from_size(self.size)
    }

    /// Related items in display order (recommendation score, descending, stable)
    pub fn related_by_recommendation(&self) -> Vec<&CandidateItem> {
        let mut items: Vec<_> = self.related.iter().collect();
        items.sort_by(|a, b| b.recommendation_score.total_cmp(&a.recommendation_score));
        items
    }
}
