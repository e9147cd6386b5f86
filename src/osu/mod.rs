//! External game data source.
//!
//! The v1 osu! API is consumed through the [`OsuApi`] trait:
//! - [`HttpOsuApi`]: live API over HTTP
//! - [`StaticOsuApi`]: in-memory or fixture-file data for tests and offline runs

mod de;
mod fixture;
mod http;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

pub use fixture::StaticOsuApi;
pub use http::HttpOsuApi;

/// Errors from the game data source.
#[derive(Debug, Error)]
pub enum OsuApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("API key not set (expected in ${0})")]
    MissingApiKey(String),

    #[error("Match not found: {0}")]
    MatchNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// `get_user` result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawUser {
    #[serde(deserialize_with = "de::id")]
    pub user_id: String,
    pub username: String,
}

/// `get_beatmaps` result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawBeatmap {
    #[serde(deserialize_with = "de::id")]
    pub beatmap_id: String,
    #[serde(deserialize_with = "de::id")]
    pub beatmapset_id: String,
    pub artist: String,
    pub title: String,
    pub version: String,
    pub creator: String,
    #[serde(deserialize_with = "de::number")]
    pub difficultyrating: f64,
    #[serde(deserialize_with = "de::number")]
    pub bpm: f64,
    #[serde(deserialize_with = "de::number")]
    pub total_length: u32,
}

/// One player's result inside a game.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPlayerScore {
    #[serde(deserialize_with = "de::id")]
    pub user_id: String,
    #[serde(deserialize_with = "de::number")]
    pub score: u64,
    #[serde(default, deserialize_with = "de::number")]
    pub maxcombo: u32,
    #[serde(deserialize_with = "de::number")]
    pub count300: u32,
    #[serde(deserialize_with = "de::number")]
    pub count100: u32,
    #[serde(deserialize_with = "de::number")]
    pub count50: u32,
    #[serde(deserialize_with = "de::number")]
    pub countmiss: u32,
    /// `"1"` blue, `"2"` red, `"0"` none
    #[serde(deserialize_with = "de::id")]
    pub team: String,
    #[serde(default = "default_pass", deserialize_with = "de::flag")]
    pub pass: bool,
    /// Per-player mods under free mod; `None` otherwise
    #[serde(default, deserialize_with = "de::optional_number")]
    pub enabled_mods: Option<u32>,
}

fn default_pass() -> bool {
    true
}

/// One map played in a lobby.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawGame {
    #[serde(deserialize_with = "de::id")]
    pub beatmap_id: String,
    #[serde(default, deserialize_with = "de::number")]
    pub mods: u32,
    /// `0` head-to-head, `1` tag co-op, `2` team vs, `3` tag team vs
    #[serde(deserialize_with = "de::number")]
    pub team_type: u8,
    #[serde(default, deserialize_with = "de::number")]
    pub scoring_type: u8,
    #[serde(default, deserialize_with = "de::number")]
    pub play_mode: u8,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub scores: Vec<RawPlayerScore>,
}

impl RawGame {
    /// Team vs and tag team vs.
    pub fn is_team_mode(&self) -> bool {
        matches!(self.team_type, 2 | 3)
    }

    /// Parse `start_time` (`YYYY-MM-DD HH:MM:SS`, UTC).
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.start_time.as_deref()?;
        NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Lobby-level match info.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawMatchInfo {
    #[serde(default, deserialize_with = "de::id")]
    pub match_id: String,
    pub name: String,
}

/// `get_match` result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawMatch {
    #[serde(rename = "match", default, deserialize_with = "de::object_or_none")]
    pub info: Option<RawMatchInfo>,
    #[serde(default)]
    pub games: Vec<RawGame>,
}

impl RawMatch {
    pub fn name(&self) -> &str {
        self.info.as_ref().map(|i| i.name.as_str()).unwrap_or("")
    }
}

/// Read access to players, beatmaps and matches.
#[async_trait]
pub trait OsuApi: Send + Sync {
    /// Human-readable source name.
    fn name(&self) -> &'static str;

    /// Look up a player by id or username.
    async fn get_player_data(&self, ident: &str) -> Result<Option<RawUser>, OsuApiError>;

    async fn get_map_data(&self, beatmap_id: &str) -> Result<Option<RawBeatmap>, OsuApiError>;

    /// Fails with [`OsuApiError::MatchNotFound`] for unknown ids.
    async fn get_match_data(&self, match_id: &str) -> Result<RawMatch, OsuApiError>;
}
