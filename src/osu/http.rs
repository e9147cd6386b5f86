//! Live v1 API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::{OsuApi, OsuApiError, RawBeatmap, RawMatch, RawUser};
use crate::config::OsuConfig;

/// HTTP client for `https://osu.ppy.sh/api`.
pub struct HttpOsuApi {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpOsuApi {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self, OsuApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("stk-stats/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Build from config, reading the key from the configured env var.
    pub fn from_config(config: &OsuConfig) -> Result<Self, OsuApiError> {
        let key = config
            .api_key()
            .ok_or_else(|| OsuApiError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(
            config.base_url.clone(),
            key,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    fn endpoint(&self, name: &str, params: &[(&str, &str)]) -> Result<Url, OsuApiError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, name))?;
        url.query_pairs_mut()
            .append_pair("k", &self.api_key)
            .extend_pairs(params);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, name: &str, params: &[(&str, &str)]) -> Result<T, OsuApiError> {
        let url = self.endpoint(name, params)?;
        debug!("GET {}?{:?}", name, params);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OsuApiError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl OsuApi for HttpOsuApi {
    fn name(&self) -> &'static str {
        "osu-api-v1"
    }

    async fn get_player_data(&self, ident: &str) -> Result<Option<RawUser>, OsuApiError> {
        let users: Vec<RawUser> = self.get("get_user", &[("u", ident)]).await?;
        Ok(users.into_iter().next())
    }

    async fn get_map_data(&self, beatmap_id: &str) -> Result<Option<RawBeatmap>, OsuApiError> {
        let maps: Vec<RawBeatmap> = self.get("get_beatmaps", &[("b", beatmap_id)]).await?;
        Ok(maps.into_iter().next())
    }

    async fn get_match_data(&self, match_id: &str) -> Result<RawMatch, OsuApiError> {
        let raw: RawMatch = self.get("get_match", &[("mp", match_id)]).await?;
        if raw.info.is_none() {
            return Err(OsuApiError::MatchNotFound(match_id.to_string()));
        }
        Ok(raw)
    }
}
