//! bitmagnet GraphQL index client
//!
//! Implements [`UpstreamIndex`] over bitmagnet's `/graphql` endpoint:
//! - free-text search via `torrentContent.search(queryString)`
//! - lookup by infohash via `torrentContent.search(infoHashes)`
//! - file inventory via `torrent.files`, paged until a short page

use async_trait::async_trait;
use aurora_core::{Attributes, BaseRecord, Category, FileEntry, Fingerprint, IndexItem};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{create_client, HttpConfig, ProviderError, UpstreamIndex};

/// Items requested per search term
pub const DEFAULT_SEARCH_LIMIT: usize = 8;

/// Files requested per page
pub const FILES_PAGE_SIZE: usize = 200;

const PROVIDER: &str = "bitmagnet";

const SEARCH_QUERY: &str = r#"
query SearchTorrents($query: String!, $limit: Int!) {
  torrentContent {
    search(input: { queryString: $query, limit: $limit }) {
      items {
        infoHash
        title
        seeders
        leechers
        publishedAt
        contentType
        contentSource
        contentId
        torrent { name size filesCount magnetUri }
      }
    }
  }
}
"#;

const TORRENT_QUERY: &str = r#"
query TorrentByHash($infoHash: Hash20!) {
  torrentContent {
    search(input: { infoHashes: [$infoHash], limit: 1 }) {
      items {
        infoHash
        title
        seeders
        leechers
        publishedAt
        contentType
        contentSource
        contentId
        torrent { name size filesCount magnetUri }
      }
    }
  }
}
"#;

const FILES_QUERY: &str = r#"
query TorrentFiles($infoHash: Hash20!, $limit: Int!, $offset: Int!) {
  torrent {
    files(input: { infoHashes: [$infoHash], limit: $limit, offset: $offset }) {
      items { index path size }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphQlMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentData {
    torrent_content: ContentSearch,
}

#[derive(Debug, Deserialize)]
struct ContentSearch {
    search: ContentPage,
}

#[derive(Debug, Deserialize)]
struct ContentPage {
    #[serde(default)]
    items: Vec<ContentNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentNode {
    info_hash: String,
    title: Option<String>,
    seeders: Option<u32>,
    leechers: Option<u32>,
    published_at: Option<DateTime<Utc>>,
    content_type: Option<String>,
    content_source: Option<String>,
    content_id: Option<String>,
    torrent: Option<TorrentNode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TorrentNode {
    name: Option<String>,
    size: Option<u64>,
    files_count: Option<u32>,
    magnet_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FilesData {
    torrent: FilesBlock,
}

#[derive(Debug, Deserialize)]
struct FilesBlock {
    files: FilesPage,
}

#[derive(Debug, Deserialize)]
struct FilesPage {
    #[serde(default)]
    items: Vec<FileNode>,
}

#[derive(Debug, Deserialize)]
struct FileNode {
    index: Option<u32>,
    path: String,
    #[serde(default)]
    size: u64,
}

impl ContentNode {
    fn name(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.torrent.as_ref().and_then(|t| t.name.clone()))
            .unwrap_or_default()
    }

    fn size(&self) -> u64 {
        self.torrent.as_ref().and_then(|t| t.size).unwrap_or(0)
    }

    fn into_index_item(self) -> IndexItem {
        IndexItem {
            fingerprint: Fingerprint::new(&self.info_hash),
            name: self.name(),
            size: self.size(),
            published_at: self.published_at,
            seeders: self.seeders.unwrap_or(0),
            leechers: self.leechers.unwrap_or(0),
        }
    }

    fn into_base_record(self) -> BaseRecord {
        let title = self.name();
        let size = self.size();
        let torrent = self.torrent.unwrap_or_default();

        let magnet_uri = torrent
            .magnet_uri
            .clone()
            .unwrap_or_else(|| format!("magnet:?xt=urn:btih:{}", self.info_hash.to_ascii_lowercase()));

        let mut attributes = Attributes::new();
        attributes.insert("magneturl", magnet_uri.as_str());
        attributes.insert("seeders", self.seeders.unwrap_or(0).to_string());
        attributes.insert("peers", self.leechers.unwrap_or(0).to_string());
        if let Some(count) = torrent.files_count {
            attributes.insert("filescount", count.to_string());
        }
        if let (Some(source), Some(id)) = (&self.content_source, &self.content_id) {
            attributes.insert(source_attribute(source), id.as_str());
        }

        BaseRecord {
            title,
            size,
            category: Category::from_upstream(self.content_type.as_deref().unwrap_or("other")),
            attributes,
            magnet_uri: Some(magnet_uri),
            published_at: self.published_at,
        }
    }
}

/// Attribute name for a content source id (`tmdb` -> `tmdbid`)
fn source_attribute(source: &str) -> String {
    format!("{}id", source.trim().to_ascii_lowercase())
}

/// bitmagnet index client
#[derive(Debug, Clone)]
pub struct BitmagnetIndex {
    client: Client,
    endpoint: String,
    search_limit: usize,
}

impl BitmagnetIndex {
    pub fn new(base_url: &str, http: &HttpConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: create_client(http)?,
            endpoint: format!("{}/graphql", base_url.trim_end_matches('/')),
            search_limit: DEFAULT_SEARCH_LIMIT,
        })
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: response.status().as_u16(),
            });
        }

        let body: GraphQlResponse<T> = response.json().await.map_err(|e| ProviderError::Decode {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        if !body.errors.is_empty() {
            let messages: Vec<_> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(ProviderError::GraphQl(messages.join("; ")));
        }

        body.data.ok_or_else(|| ProviderError::Decode {
            provider: PROVIDER,
            message: "response has no data".to_string(),
        })
    }
}

#[async_trait]
impl UpstreamIndex for BitmagnetIndex {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search_by_term(&self, term: &str) -> Result<Vec<IndexItem>, ProviderError> {
        let data: ContentData = self
            .execute(SEARCH_QUERY, json!({ "query": term, "limit": self.search_limit }))
            .await?;

        let items: Vec<IndexItem> = data
            .torrent_content
            .search
            .items
            .into_iter()
            .map(ContentNode::into_index_item)
            .collect();

        debug!("bitmagnet search {:?} returned {} items", term, items.len());
        Ok(items)
    }

    async fn get_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<BaseRecord>, ProviderError> {
        let data: ContentData = self
            .execute(TORRENT_QUERY, json!({ "infoHash": fingerprint.as_str() }))
            .await?;

        Ok(data
            .torrent_content
            .search
            .items
            .into_iter()
            .next()
            .map(ContentNode::into_base_record))
    }

    async fn get_file_list(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Vec<FileEntry>, ProviderError> {
        let mut files = Vec::new();
        let mut offset = 0usize;

        loop {
            let data: FilesData = self
                .execute(
                    FILES_QUERY,
                    json!({
                        "infoHash": fingerprint.as_str(),
                        "limit": FILES_PAGE_SIZE,
                        "offset": offset,
                    }),
                )
                .await?;

            let page = data.torrent.files.items;
            let page_len = page.len();
            files.extend(page.into_iter().map(|f| FileEntry {
                index: f.index,
                path: f.path,
                size: f.size,
            }));

            if page_len < FILES_PAGE_SIZE {
                break;
            }
            offset += FILES_PAGE_SIZE;
        }

        debug!("bitmagnet {} has {} files", fingerprint.short(), files.len());
        Ok(files)
    }
}
