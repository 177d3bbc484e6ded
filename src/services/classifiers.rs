//! Optional network classifiers used by classified routing
//!
//! - AniList (GraphQL, no key): is a title a known anime?
//! - TMDb (REST, API key): which film industry does a movie belong to?
//!
//! Both fail closed. A network error, a timeout or an unexpected response
//! makes the title "not anime" / [`MovieOrigin::Unknown`] and is only logged.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::OrganizerError;

pub const ANILIST_URL: &str = "https://graphql.anilist.co";
pub const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

const ANILIST_QUERY: &str = r#"
query ($search: String) {
  Media(search: $search, type: ANIME) {
    id
  }
}
"#;

/// Film industry a movie was produced in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovieOrigin {
    Bollywood,
    Hollywood,
    Other,
    Unknown,
}

impl MovieOrigin {
    /// Sub-folder under the movie branch, if the origin is known
    pub fn folder_name(&self) -> Option<&'static str> {
        match self {
            MovieOrigin::Bollywood => Some("bollywood"),
            MovieOrigin::Hollywood => Some("hollywood"),
            MovieOrigin::Other => Some("other"),
            MovieOrigin::Unknown => None,
        }
    }
}

#[async_trait]
pub trait AnimeClassifier: Send + Sync {
    async fn is_anime(&self, title: &str) -> bool;
}

#[async_trait]
pub trait MovieClassifier: Send + Sync {
    async fn classify_movie(&self, title: &str) -> MovieOrigin;
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, OrganizerError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| OrganizerError::Classifier(format!("failed to build HTTP client: {e}")))
}

// ---------------------------------------------------------------------------
// AniList
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AniListResponse {
    pub data: Option<AniListData>,
}

#[derive(Debug, Deserialize)]
pub struct AniListData {
    #[serde(rename = "Media")]
    pub media: Option<AniListMedia>,
}

#[derive(Debug, Deserialize)]
pub struct AniListMedia {
    pub id: i64,
}

impl AniListResponse {
    pub fn found_media(&self) -> bool {
        self.data.as_ref().is_some_and(|d| d.media.is_some())
    }
}

pub struct AniListClassifier {
    client: reqwest::Client,
    url: String,
}

impl AniListClassifier {
    pub fn new(timeout: Duration) -> Result<Self, OrganizerError> {
        Self::with_url(ANILIST_URL, timeout)
    }

    pub fn with_url(url: impl Into<String>, timeout: Duration) -> Result<Self, OrganizerError> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
        })
    }

    async fn lookup(&self, title: &str) -> Result<bool> {
        let body = json!({
            "query": ANILIST_QUERY,
            "variables": { "search": title },
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .context("Failed to reach AniList")?;

        // AniList answers 404 when nothing matches
        if !response.status().is_success() {
            debug!(title = %title, status = %response.status(), "AniList returned no match");
            return Ok(false);
        }

        let parsed: AniListResponse = response
            .json()
            .await
            .context("Failed to parse AniList response")?;
        Ok(parsed.found_media())
    }
}

#[async_trait]
impl AnimeClassifier for AniListClassifier {
    async fn is_anime(&self, title: &str) -> bool {
        match self.lookup(title).await {
            Ok(found) => {
                debug!(title = %title, anime = found, "AniList lookup");
                found
            }
            Err(e) => {
                warn!(title = %title, error = %e, "AniList lookup failed, treating as not anime");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TMDb
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TmdbSearchResponse {
    #[serde(default)]
    pub results: Vec<TmdbSearchHit>,
}

#[derive(Debug, Deserialize)]
pub struct TmdbSearchHit {
    pub id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TmdbMovieDetails {
    #[serde(default)]
    pub production_countries: Vec<TmdbProductionCountry>,
    pub original_language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbProductionCountry {
    pub iso_3166_1: String,
}

impl TmdbMovieDetails {
    /// India wins over the US; English-language films count as Hollywood
    pub fn origin(&self) -> MovieOrigin {
        let produced_in = |code: &str| {
            self.production_countries
                .iter()
                .any(|c| c.iso_3166_1.eq_ignore_ascii_case(code))
        };

        if produced_in("IN") {
            MovieOrigin::Bollywood
        } else if produced_in("US") || self.original_language.as_deref() == Some("en") {
            MovieOrigin::Hollywood
        } else {
            MovieOrigin::Other
        }
    }
}

pub struct TmdbMovieClassifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TmdbMovieClassifier {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, OrganizerError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: TMDB_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search(&self, title: &str) -> Result<Option<i64>> {
        let url = format!("{}/search/movie", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("query", title)])
            .send()
            .await
            .context("Failed to reach TMDb")?;

        if !response.status().is_success() {
            anyhow::bail!("TMDb search failed with status: {}", response.status());
        }

        let parsed: TmdbSearchResponse = response
            .json()
            .await
            .context("Failed to parse TMDb search response")?;
        Ok(parsed.results.first().map(|hit| hit.id))
    }

    async fn details(&self, id: i64) -> Result<TmdbMovieDetails> {
        let url = format!("{}/movie/{}", self.base_url, id);
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await
            .context("Failed to reach TMDb")?;

        if !response.status().is_success() {
            anyhow::bail!("TMDb details failed with status: {}", response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse TMDb movie details")
    }

    async fn lookup(&self, title: &str) -> Result<MovieOrigin> {
        let Some(id) = self.search(title).await? else {
            return Ok(MovieOrigin::Unknown);
        };
        Ok(self.details(id).await?.origin())
    }
}

#[async_trait]
impl MovieClassifier for TmdbMovieClassifier {
    async fn classify_movie(&self, title: &str) -> MovieOrigin {
        match self.lookup(title).await {
            Ok(origin) => {
                debug!(title = %title, origin = ?origin, "TMDb lookup");
                origin
            }
            Err(e) => {
                warn!(title = %title, error = %e, "TMDb lookup failed");
                MovieOrigin::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn details(json: &str) -> TmdbMovieDetails {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_origin_prefers_india() {
        let d = details(
            r#"{"production_countries":[{"iso_3166_1":"US"},{"iso_3166_1":"IN"}],
                "original_language":"en"}"#,
        );
        assert_eq!(d.origin(), MovieOrigin::Bollywood);
    }

    #[test]
    fn test_origin_hollywood_by_country_or_language() {
        let by_country =
            details(r#"{"production_countries":[{"iso_3166_1":"US"}],"original_language":"fr"}"#);
        assert_eq!(by_country.origin(), MovieOrigin::Hollywood);

        let by_language =
            details(r#"{"production_countries":[{"iso_3166_1":"GB"}],"original_language":"en"}"#);
        assert_eq!(by_language.origin(), MovieOrigin::Hollywood);
    }

    #[test]
    fn test_origin_other() {
        let d =
            details(r#"{"production_countries":[{"iso_3166_1":"JP"}],"original_language":"ja"}"#);
        assert_eq!(d.origin(), MovieOrigin::Other);

        let empty = details("{}");
        assert_eq!(empty.origin(), MovieOrigin::Other);
    }

    #[test]
    fn test_folder_names() {
        assert_eq!(MovieOrigin::Bollywood.folder_name(), Some("bollywood"));
        assert_eq!(MovieOrigin::Unknown.folder_name(), None);
    }

    #[test]
    fn test_anilist_response() {
        let hit: AniListResponse =
            serde_json::from_str(r#"{"data":{"Media":{"id":21}}}"#).unwrap();
        assert!(hit.found_media());

        let miss: AniListResponse = serde_json::from_str(r#"{"data":{"Media":null}}"#).unwrap();
        assert!(!miss.found_media());

        let error: AniListResponse =
            serde_json::from_str(r#"{"errors":[{"message":"x"}]}"#).unwrap();
        assert!(!error.found_media());
    }

    #[tokio::test]
    async fn test_unreachable_endpoints_fail_closed() {
        // Nothing listens on port 9 (discard) in the test environment
        let anilist =
            AniListClassifier::with_url("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(!anilist.is_anime("Monster").await);

        let tmdb = TmdbMovieClassifier::new("key", Duration::from_millis(500))
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        assert_eq!(tmdb.classify_movie("Heat").await, MovieOrigin::Unknown);
    }
}
