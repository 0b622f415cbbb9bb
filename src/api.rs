//! Episode fetching from the external REST API.
//!
//! The API is a json-server style collection:
//!
//! ```text
//! GET {base}/episodes?_limit=12&_sort=published_at&_order=desc   → [RawEpisode]
//! GET {base}/episodes/{id}                                        → RawEpisode | 404
//! ```
//!
//! Page builders talk to an [`EpisodeSource`] rather than to HTTP directly,
//! so tests can feed them canned records. [`HttpEpisodeSource`] is the real
//! implementation. One request per call, no retries: a failed request fails
//! the page that asked for it.

use crate::config::ApiConfig;
use crate::episode::RawEpisode;
use log::debug;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid API base URL {0:?}")]
    InvalidBaseUrl(String),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response status {status} from {url}")]
    Status { url: Url, status: StatusCode },
    #[error("invalid response body from {url}: {source}")]
    Decode {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("episode {id:?} not found")]
    NotFound { id: String },
}

/// Where episodes come from.
pub trait EpisodeSource: Send + Sync + 'static {
    /// Up to `limit` episodes, newest first.
    fn latest(&self, limit: usize)
    -> impl Future<Output = Result<Vec<RawEpisode>, FetchError>> + Send;

    /// One episode by identifier. Missing episodes are [`FetchError::NotFound`].
    fn episode(&self, id: &str) -> impl Future<Output = Result<RawEpisode, FetchError>> + Send;
}

/// [`EpisodeSource`] backed by the episodes REST API.
#[derive(Debug, Clone)]
pub struct HttpEpisodeSource {
    client: Client,
    base_url: Url,
}

impl HttpEpisodeSource {
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|_| FetchError::InvalidBaseUrl(config.base_url.clone()))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidBaseUrl(config.base_url.clone()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("podcastr/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base_url })
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        debug!("GET {url} {query:?}");
        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }
        response
            .json::<T>()
            .await
            .map_err(|source| FetchError::Decode { url, source })
    }
}

impl EpisodeSource for HttpEpisodeSource {
    async fn latest(&self, limit: usize) -> Result<Vec<RawEpisode>, FetchError> {
        let limit = limit.to_string();
        let url = self.endpoint(&["episodes"]);
        let episodes: Vec<RawEpisode> = self
            .get_json(
                url,
                &[
                    ("_limit", limit.as_str()),
                    ("_sort", "published_at"),
                    ("_order", "desc"),
                ],
            )
            .await?;
        debug!("fetched {} episodes", episodes.len());
        Ok(episodes)
    }

    async fn episode(&self, id: &str) -> Result<RawEpisode, FetchError> {
        let url = self.endpoint(&["episodes", id]);
        match self.get_json(url, &[]).await {
            Err(FetchError::Status {
                status: StatusCode::NOT_FOUND,
                ..
            }) => Err(FetchError::NotFound { id: id.to_string() }),
            other => other,
        }
    }
}
