//! File inventory statistics and reference links
//!
//! Groups a torrent's file list by kind (video, audio, subtitle, ...) and
//! builds the external lookup links shown next to a record.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::Fingerprint;

/// Maximum image files surfaced as previews
pub const MAX_IMAGE_FILES: usize = 12;

/// One file inside a torrent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub index: Option<u32>,
    pub path: String,
    pub size: u64,
}

/// Coarse file kind by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Video,
    Audio,
    Subtitle,
    Image,
    Document,
    Archive,
    Other,
}

/// Extension table, checked in order
static KIND_EXTENSIONS: &[(FileKind, &[&str])] = &[
    (
        FileKind::Video,
        &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ts", "m2ts"],
    ),
    (
        FileKind::Audio,
        &["mp3", "flac", "wav", "aac", "ogg", "wma", "m4a", "ape", "dts", "ac3"],
    ),
    (FileKind::Subtitle, &["srt", "ass", "ssa", "sub", "vtt", "idx", "sup"]),
    (FileKind::Image, &["jpg", "jpeg", "png", "gif", "bmp", "webp", "svg"]),
    (FileKind::Document, &["pdf", "doc", "docx", "txt", "rtf", "odt"]),
    (FileKind::Archive, &["zip", "rar", "7z", "tar", "gz", "bz2"]),
];

impl FileKind {
    pub fn from_path(path: &str) -> Self {
        let ext = match path.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => return FileKind::Other,
        };

        KIND_EXTENSIONS
            .iter()
            .find(|(_, exts)| exts.contains(&ext.as_str()))
            .map(|(kind, _)| *kind)
            .unwrap_or(FileKind::Other)
    }
}

/// Count and total size of one file kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindBucket {
    pub count: usize,
    pub size: u64,
}

/// Summary of a torrent's file inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub by_kind: BTreeMap<FileKind, KindBucket>,
    pub total_size: u64,
    pub largest_file: Option<FileEntry>,
    pub file_count: usize,
}

/// Group files by kind and find the largest one
pub fn analyze_files(files: &[FileEntry]) -> FileStats {
    let mut by_kind: BTreeMap<FileKind, KindBucket> = BTreeMap::new();
    let mut largest: Option<&FileEntry> = None;
    let mut total_size = 0u64;

    for file in files {
        let bucket = by_kind.entry(FileKind::from_path(&file.path)).or_default();
        bucket.count += 1;
        bucket.size += file.size;
        total_size += file.size;

        if largest.map_or(true, |l| file.size > l.size) {
            largest = Some(file);
        }
    }

    FileStats {
        by_kind,
        total_size,
        largest_file: largest.cloned(),
        file_count: files.len(),
    }
}

/// Image files usable as previews, capped at [`MAX_IMAGE_FILES`]
pub fn image_files(files: &[FileEntry]) -> Vec<FileEntry> {
    files
        .iter()
        .filter(|f| FileKind::from_path(&f.path) == FileKind::Image)
        .take(MAX_IMAGE_FILES)
        .cloned()
        .collect()
}

/// External page where more about a torrent can be looked up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceLink {
    pub kind: String,
    pub source: String,
    pub url: String,
}

static IMDB_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)tt\d{7,8}").unwrap());

static BRACKETED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]|\([^)]*\)").unwrap());

/// Build lookup links from the fingerprint and title
pub fn reference_links(title: &str, fingerprint: &Fingerprint) -> Vec<ReferenceLink> {
    let mut links = vec![ReferenceLink {
        kind: "torrent_preview".to_string(),
        source: "BTDig".to_string(),
        url: format!("https://btdig.com/search?q={}", fingerprint),
    }];

    if let Some(m) = IMDB_ID_REGEX.find(title) {
        links.push(ReferenceLink {
            kind: "imdb".to_string(),
            source: "IMDB".to_string(),
            url: format!("https://www.imdb.com/title/{}/", m.as_str().to_ascii_lowercase()),
        });
    }

    let clean = BRACKETED_REGEX.replace_all(title, "");
    let clean = clean.trim();
    if !clean.is_empty() {
        links.push(ReferenceLink {
            kind: "search".to_string(),
            source: "Google Images".to_string(),
            url: format!(
                "https://www.google.com/search?tbm=isch&q={}",
                urlencoding::encode(clean)
            ),
        });
    }

    links
}
