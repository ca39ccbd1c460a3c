//! Douban rating client
//!
//! Uses the two JSON endpoints behind the movie site's search box:
//! `j/subject_suggest` for candidates and `j/subject_abstract` for the
//! rating of one subject. Both reject requests without a browser user
//! agent and referer; [`create_client`] supplies the former.

use async_trait::async_trait;
use reqwest::header::REFERER;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    create_client, HttpConfig, ProviderError, RatingAbstract, RatingProvider, RatingSuggestion,
};

pub const DEFAULT_DOUBAN_BASE_URL: &str = "https://movie.douban.com";

const PROVIDER: &str = "douban";

#[derive(Debug, Deserialize)]
struct DoubanSuggestion {
    id: String,
    #[serde(default)]
    title: String,
    sub_title: Option<String>,
    year: Option<String>,
    img: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DoubanAbstract {
    subject: Option<DoubanSubject>,
}

#[derive(Debug, Deserialize)]
struct DoubanSubject {
    rate: Option<Value>,
    votes: Option<Value>,
}

/// Positive number from a string or numeric JSON value
fn positive_f64(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (n > 0.0).then_some(n)
}

fn positive_u64(value: Option<&Value>) -> Option<u64> {
    let n = match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (n > 0).then_some(n)
}

/// Public page for a subject
pub fn subject_url(id: &str) -> String {
    format!("{}/subject/{}/", DEFAULT_DOUBAN_BASE_URL, id)
}

/// Douban movie client
#[derive(Debug, Clone)]
pub struct DoubanClient {
    client: Client,
    base_url: String,
}

impl DoubanClient {
    pub fn new(http: &HttpConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: create_client(http)?,
            base_url: DEFAULT_DOUBAN_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        referer: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header(REFERER, referer)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: response.status().as_u16(),
            });
        }

        response.json().await.map_err(|e| ProviderError::Decode {
            provider: PROVIDER,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl RatingProvider for DoubanClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn suggest(&self, query: &str) -> Result<Vec<RatingSuggestion>, ProviderError> {
        let url = format!("{}/j/subject_suggest", self.base_url);
        let raw: Vec<DoubanSuggestion> = self.get_json(&url, &[("q", query)], &self.base_url).await?;

        debug!("douban suggest {:?} returned {} results", query, raw.len());
        Ok(raw
            .into_iter()
            .map(|s| RatingSuggestion {
                title: if s.title.is_empty() {
                    s.sub_title.unwrap_or_default()
                } else {
                    s.title
                },
                id: s.id,
                year: s.year.filter(|y| !y.is_empty()),
                thumbnail: s.img.filter(|i| !i.is_empty()),
            })
            .collect())
    }

    async fn get_abstract(&self, id: &str) -> Result<Option<RatingAbstract>, ProviderError> {
        let url = format!("{}/j/subject_abstract", self.base_url);
        let referer = format!("{}/subject/{}/", self.base_url, id);
        let raw: DoubanAbstract = self.get_json(&url, &[("subject_id", id)], &referer).await?;

        Ok(raw.subject.map(|s| RatingAbstract {
            rating: positive_f64(s.rate.as_ref()),
            vote_count: positive_u64(s.votes.as_ref()),
        }))
    }
}
