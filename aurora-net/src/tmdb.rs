//! TMDB descriptor client

use async_trait::async_trait;
use aurora_core::{CastMember, Descriptor, Trailer};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{create_client, DescriptorProvider, HttpConfig, MediaKind, ProviderError};

pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Cast credits kept per descriptor
pub const MAX_CAST: usize = 20;

const PROVIDER: &str = "tmdb";

const TRAILER_SITES: &[&str] = &["YouTube", "Vimeo"];

/// Error body TMDB returns instead of a resource
#[derive(Debug, Deserialize)]
struct TmdbError {
    status_code: i64,
    #[serde(default)]
    status_message: String,
}

#[derive(Debug, Deserialize)]
struct TmdbDetails {
    id: u64,
    #[serde(alias = "name")]
    title: Option<String>,
    #[serde(alias = "original_name")]
    original_title: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    vote_average: Option<f64>,
    vote_count: Option<u64>,
    #[serde(alias = "first_air_date")]
    release_date: Option<String>,
    runtime: Option<u32>,
    #[serde(default)]
    episode_run_time: Vec<u32>,
    #[serde(default)]
    genres: Vec<TmdbGenre>,
    #[serde(default)]
    credits: TmdbCredits,
    #[serde(default)]
    images: TmdbImages,
    #[serde(default)]
    videos: TmdbVideos,
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct TmdbCredits {
    #[serde(default)]
    cast: Vec<TmdbCast>,
}

#[derive(Debug, Deserialize)]
struct TmdbCast {
    name: String,
    character: Option<String>,
    profile_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TmdbImages {
    #[serde(default)]
    posters: Vec<TmdbImage>,
    #[serde(default)]
    backdrops: Vec<TmdbImage>,
}

#[derive(Debug, Deserialize)]
struct TmdbImage {
    file_path: String,
}

#[derive(Debug, Default, Deserialize)]
struct TmdbVideos {
    #[serde(default)]
    results: Vec<TmdbVideo>,
}

#[derive(Debug, Deserialize)]
struct TmdbVideo {
    key: String,
    site: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
}

impl TmdbDetails {
    fn into_descriptor(self, language: &str) -> Descriptor {
        let runtime = self.runtime.or_else(|| self.episode_run_time.first().copied());

        Descriptor {
            id: self.id,
            language: language.to_string(),
            title: self.title,
            original_title: self.original_title,
            overview: self.overview.filter(|o| !o.trim().is_empty()),
            poster_path: self.poster_path,
            backdrop_path: self.backdrop_path,
            vote_average: self.vote_average,
            vote_count: self.vote_count,
            release_date: self.release_date.filter(|d| !d.is_empty()),
            runtime,
            genres: self.genres.into_iter().map(|g| g.name).collect(),
            cast: self
                .credits
                .cast
                .into_iter()
                .take(MAX_CAST)
                .map(|c| CastMember {
                    name: c.name,
                    character: c.character,
                    profile_path: c.profile_path,
                })
                .collect(),
            posters: self.images.posters.into_iter().map(|i| i.file_path).collect(),
            backdrops: self.images.backdrops.into_iter().map(|i| i.file_path).collect(),
            trailers: self
                .videos
                .results
                .into_iter()
                .filter(|v| TRAILER_SITES.contains(&v.site.as_str()))
                .map(|v| Trailer {
                    key: v.key,
                    site: v.site,
                    name: v.name,
                    kind: v.kind,
                })
                .collect(),
        }
    }
}

/// TMDB v3 client
#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    pub fn new(api_key: &str, http: &HttpConfig) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured("tmdb api key"));
        }
        Ok(Self {
            client: create_client(http)?,
            base_url: DEFAULT_TMDB_BASE_URL.to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl DescriptorProvider for TmdbClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn get_by_id(
        &self,
        id: u64,
        media: MediaKind,
        language: &str,
    ) -> Result<Descriptor, ProviderError> {
        let url = format!("{}/{}/{}", self.base_url, media, id);
        debug!("tmdb lookup {}/{} ({})", media, id, language);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("language", language),
                ("append_to_response", "credits,images,videos"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(|e| ProviderError::Decode {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        if body.get("status_code").is_some() {
            let err: TmdbError = serde_json::from_value(body).map_err(|e| ProviderError::Decode {
                provider: PROVIDER,
                message: e.to_string(),
            })?;
            debug!("tmdb error {}: {}", err.status_code, err.status_message);
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }

        let details: TmdbDetails =
            serde_json::from_value(body).map_err(|e| ProviderError::Decode {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        Ok(details.into_descriptor(language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TmdbClient {
        TmdbClient::new("test-key", &HttpConfig::default())
            .unwrap()
            .with_base_url(&server.uri())
    }

    fn movie_body() -> serde_json::Value {
        json!({
            "id": 603,
            "title": "The Matrix",
            "original_title": "The Matrix",
            "overview": "A hacker learns the truth.",
            "poster_path": "/poster.jpg",
            "backdrop_path": "/backdrop.jpg",
            "vote_average": 8.2,
            "vote_count": 25000,
            "release_date": "1999-03-31",
            "runtime": 136,
            "genres": [{ "id": 28, "name": "Action" }, { "id": 878, "name": "Science Fiction" }],
            "credits": { "cast": [
                { "name": "Keanu Reeves", "character": "Neo", "profile_path": "/keanu.jpg" },
                { "name": "Carrie-Anne Moss", "character": "Trinity", "profile_path": null }
            ] },
            "images": {
                "posters": [{ "file_path": "/p1.jpg" }],
                "backdrops": [{ "file_path": "/b1.jpg" }, { "file_path": "/b2.jpg" }]
            },
            "videos": { "results": [
                { "key": "abc", "site": "YouTube", "name": "Trailer", "type": "Trailer" },
                { "key": "zzz", "site": "Dailymotion", "name": "Clip", "type": "Clip" }
            ] }
        })
    }

    #[tokio::test]
    async fn test_movie_descriptor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/603"))
            .and(query_param("api_key", "test-key"))
            .and(query_param("language", "zh-CN"))
            .and(query_param("append_to_response", "credits,images,videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(movie_body()))
            .mount(&server)
            .await;

        let d = client(&server)
            .get_by_id(603, MediaKind::Movie, "zh-CN")
            .await
            .unwrap();

        assert_eq!(d.id, 603);
        assert_eq!(d.language, "zh-CN");
        assert_eq!(d.title.as_deref(), Some("The Matrix"));
        assert_eq!(d.release_year(), Some("1999"));
        assert_eq!(d.genres, vec!["Action", "Science Fiction"]);
        assert_eq!(d.cast.len(), 2);
        assert_eq!(d.cast[0].character.as_deref(), Some("Neo"));
        assert_eq!(d.backdrops.len(), 2);
        assert_eq!(d.trailers.len(), 1);
        assert_eq!(d.trailers[0].site, "YouTube");
    }

    #[tokio::test]
    async fn test_tv_descriptor_aliases() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tv/1396"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1396,
                "name": "Breaking Bad",
                "original_name": "Breaking Bad",
                "first_air_date": "2008-01-20",
                "episode_run_time": [45, 47]
            })))
            .mount(&server)
            .await;

        let d = client(&server)
            .get_by_id(1396, MediaKind::Tv, "en-US")
            .await
            .unwrap();
        assert_eq!(d.title.as_deref(), Some("Breaking Bad"));
        assert_eq!(d.release_year(), Some("2008"));
        assert_eq!(d.runtime, Some(45));
        assert!(d.cast.is_empty());
    }

    #[tokio::test]
    async fn test_status_code_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/1"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "status_code": 34,
                "status_message": "The resource you requested could not be found."
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .get_by_id(1, MediaKind::Movie, "en-US")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 404, .. }));
    }

    #[test]
    fn test_missing_api_key() {
        let err = TmdbClient::new("  ", &HttpConfig::default()).unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
