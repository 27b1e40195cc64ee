//! REST client for episode lists.
//!
//! Episode lists change slowly, so responses are kept in a [`TtlCache`] owned
//! by the client. Transient failures are retried with exponential backoff.

use crate::cache::TtlCache;
use crate::error::{PlayerError, Result};
use crate::types::{Episode, StreamSource};
use log::{debug, info, warn};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Maximum number of retry attempts for failed requests.
const MAX_RETRIES: u32 = 3;

/// Base delay between retries in milliseconds (doubles each retry).
const BASE_RETRY_DELAY_MS: u64 = 500;

const USER_AGENT: &str = concat!("anime-player/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EpisodesResponse {
    List(Vec<RawEpisode>),
    Wrapped { episodes: Vec<RawEpisode> },
}

#[derive(Debug, Deserialize)]
struct RawEpisode {
    #[serde(alias = "_id")]
    id: serde_json::Value,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    number: Option<i64>,
    #[serde(default)]
    sources: Vec<RawSource>,
    /// Single-source episodes only carry a bare manifest URL.
    #[serde(default)]
    src: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(default)]
    quality: Option<serde_json::Value>,
    url: String,
}

/// Parse a quality label such as `720`, `"1080p"` or `"auto"`.
///
/// Anything that is not a positive height maps to 0 (unknown/adaptive).
fn parse_quality(value: Option<&serde_json::Value>) -> u32 {
    match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .and_then(|q| u32::try_from(q).ok())
            .unwrap_or(0),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .trim_end_matches(['p', 'P'])
            .parse()
            .unwrap_or(0),
        _ => 0,
    }
}

impl RawEpisode {
    fn into_episode(self) -> Episode {
        let id = match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };

        let mut sources: Vec<StreamSource> = self
            .sources
            .into_iter()
            .filter(|s| !s.url.is_empty())
            .map(|s| StreamSource {
                quality: parse_quality(s.quality.as_ref()),
                url: s.url,
            })
            .collect();
        if let Some(src) = self.src.filter(|s| !s.is_empty()) {
            if !sources.iter().any(|s| s.url == src) {
                sources.push(StreamSource { quality: 0, url: src });
            }
        }
        sources.sort_by(|a, b| b.quality.cmp(&a.quality));

        let title = match (self.title, self.number) {
            (Some(title), _) if !title.is_empty() => title,
            (_, Some(n)) => format!("Episode {}", n),
            _ => id.clone(),
        };

        Episode {
            id,
            title,
            number: self.number,
            sources,
        }
    }
}

/// Parse an episode-list response body.
///
/// Accepts either a bare array or an object with an `episodes` array.
///
/// # Examples
///
/// ```
/// use anime_player::api::episodes_from_json;
///
/// let body = r#"[{"_id": "e1", "title": "Pilot", "src": "https://cdn/e1.m3u8"}]"#;
/// let episodes = episodes_from_json(body).unwrap();
/// assert_eq!(episodes[0].id, "e1");
/// assert_eq!(episodes[0].sources[0].quality, 0);
/// ```
pub fn episodes_from_json(body: &str) -> Result<Vec<Episode>> {
    let parsed: EpisodesResponse = serde_json::from_str(body)?;
    Ok(into_episodes(parsed))
}

fn into_episodes(response: EpisodesResponse) -> Vec<Episode> {
    let raw = match response {
        EpisodesResponse::List(list) => list,
        EpisodesResponse::Wrapped { episodes } => episodes,
    };
    raw.into_iter().map(RawEpisode::into_episode).collect()
}

/// Check if an error is retryable (network errors, timeouts, server errors).
fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout()
        || error.is_connect()
        || error.is_request()
        || error.status().map(|s| s.is_server_error()).unwrap_or(false)
}

/// Retry an async operation with exponential backoff.
///
/// Retries the operation up to `max_retries` times on retryable errors,
/// doubling `base_delay` after each attempt.
async fn retry_with_backoff<T, F, Fut>(
    operation_name: &str,
    max_retries: u32,
    base_delay: Duration,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, reqwest::Error>>,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => {
                if attempt > 0 {
                    info!(
                        "{} succeeded after {} attempts",
                        operation_name,
                        attempt + 1
                    );
                }
                return Ok(result);
            }
            Err(e) if attempt < max_retries && is_retryable_error(&e) => {
                let delay = base_delay * 2_u32.pow(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name,
                    attempt + 1,
                    max_retries + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => {
                return Err(PlayerError::NotFound(format!("{}: {}", operation_name, e)));
            }
            Err(e) => {
                return Err(PlayerError::Network(format!(
                    "{} failed after {} attempts: {}",
                    operation_name,
                    attempt + 1,
                    e
                )));
            }
        }
    }
}

/// Client for the episode-list endpoint.
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    cache: TtlCache<String, Vec<Episode>>,
    max_retries: u32,
    base_delay: Duration,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `http://localhost:5000/api`).
    pub fn new(base_url: &str, cache: TtlCache<String, Vec<Episode>>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.to_string(),
            http,
            cache,
            max_retries: MAX_RETRIES,
            base_delay: Duration::from_millis(BASE_RETRY_DELAY_MS),
        })
    }

    /// Override the retry policy.
    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    fn episodes_url(&self, anime_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            PlayerError::Config(format!("invalid api_url '{}': {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                PlayerError::Config(format!("api_url '{}' cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(["anime", anime_id, "episodes"]);
        Ok(url)
    }

    /// Fetch the episode list for an anime.
    ///
    /// Served from the cache while the cached copy is fresh.
    pub async fn fetch_episodes(&self, anime_id: &str) -> Result<Vec<Episode>> {
        if let Some(episodes) = self.cache.get(anime_id).await {
            debug!("Episode list for {} served from cache", anime_id);
            return Ok(episodes);
        }

        let url = self.episodes_url(anime_id)?;
        debug!("Fetching episodes from {}", url);

        let resp = retry_with_backoff(
            &format!("Fetch episodes for '{}'", anime_id),
            self.max_retries,
            self.base_delay,
            || {
                let client = self.http.clone();
                let url = url.clone();
                async move { client.get(url).send().await?.error_for_status() }
            },
        )
        .await?;

        let parsed: EpisodesResponse = resp.json().await.map_err(|e| {
            PlayerError::Parse(format!("Failed to parse episode list for '{}': {}", anime_id, e))
        })?;
        let episodes = into_episodes(parsed);

        debug!("Found {} episodes for {}", episodes.len(), anime_id);
        self.cache
            .insert(anime_id.to_string(), episodes.clone())
            .await;

        Ok(episodes)
    }

    /// Drop the cached list for an anime. Returns whether one was cached.
    pub async fn invalidate(&self, anime_id: &str) -> bool {
        self.cache.invalidate(anime_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_quality_variants() {
        assert_eq!(parse_quality(Some(&json!(720))), 720);
        assert_eq!(parse_quality(Some(&json!("1080p"))), 1080);
        assert_eq!(parse_quality(Some(&json!("480"))), 480);
        assert_eq!(parse_quality(Some(&json!("auto"))), 0);
        assert_eq!(parse_quality(Some(&json!(-1))), 0);
        assert_eq!(parse_quality(None), 0);
    }

    #[test]
    fn test_episodes_from_json_sorts_sources() {
        let body = json!([{
            "id": "ep-1",
            "title": "Arrival",
            "number": 1,
            "sources": [
                {"quality": "480p", "url": "https://cdn/ep1/480.m3u8"},
                {"quality": 1080, "url": "https://cdn/ep1/1080.m3u8"},
                {"quality": "720p", "url": "https://cdn/ep1/720.m3u8"}
            ]
        }])
        .to_string();

        let episodes = episodes_from_json(&body).unwrap();
        let qualities: Vec<u32> = episodes[0].sources.iter().map(|s| s.quality).collect();
        assert_eq!(qualities, vec![1080, 720, 480]);
        assert_eq!(episodes[0].to_display(), "Ep 1 - Arrival");
    }

    #[test]
    fn test_episodes_from_json_wrapped_with_numeric_id() {
        let body = json!({
            "episodes": [
                {"_id": 42, "number": 3, "src": "https://cdn/42.m3u8"},
                {"_id": "43", "sources": [{"url": ""}]}
            ]
        })
        .to_string();

        let episodes = episodes_from_json(&body).unwrap();
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].id, "42");
        assert_eq!(episodes[0].title, "Episode 3");
        assert_eq!(episodes[0].sources.len(), 1);
        assert_eq!(episodes[1].title, "43");
        assert!(episodes[1].sources.is_empty());
    }

    #[test]
    fn test_src_not_duplicated() {
        let body = json!([{
            "id": "e",
            "src": "https://cdn/e.m3u8",
            "sources": [{"quality": 720, "url": "https://cdn/e.m3u8"}]
        }])
        .to_string();

        let episodes = episodes_from_json(&body).unwrap();
        assert_eq!(episodes[0].sources.len(), 1);
        assert_eq!(episodes[0].sources[0].quality, 720);
    }

    #[test]
    fn test_episodes_from_json_invalid() {
        let err = episodes_from_json("{\"data\": 1}").unwrap_err();
        assert!(matches!(err, PlayerError::Parse(_)));
    }

    #[test]
    fn test_episodes_url_encodes_segments() {
        let client = ApiClient::new(
            "http://localhost:5000/api/",
            TtlCache::new(Duration::from_secs(60)),
        )
        .unwrap();
        let url = client.episodes_url("one piece").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/api/anime/one%20piece/episodes"
        );
    }

    #[test]
    fn test_episodes_url_rejects_bad_base() {
        let client = ApiClient::new("not a url", TtlCache::new(Duration::from_secs(60))).unwrap();
        assert!(matches!(
            client.episodes_url("x"),
            Err(PlayerError::Config(_))
        ));
    }
}
