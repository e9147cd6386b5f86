//! Fixture-backed data source.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{OsuApi, OsuApiError, RawBeatmap, RawMatch, RawUser};

#[derive(Debug, Default, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    users: Vec<RawUser>,
    #[serde(default)]
    beatmaps: Vec<RawBeatmap>,
    #[serde(default)]
    matches: HashMap<String, RawMatch>,
}

/// Serves players, maps and matches from memory.
#[derive(Debug, Default)]
pub struct StaticOsuApi {
    users: Vec<RawUser>,
    beatmaps: HashMap<String, RawBeatmap>,
    matches: HashMap<String, RawMatch>,
    player_lookups: AtomicUsize,
}

impl StaticOsuApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `{"users": [...], "beatmaps": [...], "matches": {"<id>": {...}}}`.
    pub fn from_fixture(path: &Path) -> Result<Self, OsuApiError> {
        let contents = std::fs::read_to_string(path)?;
        let file: FixtureFile = serde_json::from_str(&contents)?;
        info!(
            "Loaded fixture {:?}: {} users, {} beatmaps, {} matches",
            path,
            file.users.len(),
            file.beatmaps.len(),
            file.matches.len()
        );

        let mut api = Self::new();
        for user in file.users {
            api = api.with_user(user);
        }
        for map in file.beatmaps {
            api = api.with_map(map);
        }
        for (id, raw) in file.matches {
            api = api.with_match(id, raw);
        }
        Ok(api)
    }

    pub fn with_user(mut self, user: RawUser) -> Self {
        self.users.push(user);
        self
    }

    pub fn with_map(mut self, map: RawBeatmap) -> Self {
        self.beatmaps.insert(map.beatmap_id.clone(), map);
        self
    }

    pub fn with_match(mut self, id: impl Into<String>, raw: RawMatch) -> Self {
        self.matches.insert(id.into(), raw);
        self
    }

    /// How many player lookups have been served.
    pub fn player_lookups(&self) -> usize {
        self.player_lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl OsuApi for StaticOsuApi {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn get_player_data(&self, ident: &str) -> Result<Option<RawUser>, OsuApiError> {
        self.player_lookups.fetch_add(1, Ordering::Relaxed);
        let lower = ident.to_lowercase();
        Ok(self
            .users
            .iter()
            .find(|u| u.user_id == ident)
            .or_else(|| self.users.iter().find(|u| u.username.to_lowercase() == lower))
            .cloned())
    }

    async fn get_map_data(&self, beatmap_id: &str) -> Result<Option<RawBeatmap>, OsuApiError> {
        Ok(self.beatmaps.get(beatmap_id).cloned())
    }

    async fn get_match_data(&self, match_id: &str) -> Result<RawMatch, OsuApiError> {
        self.matches
            .get(match_id)
            .cloned()
            .ok_or_else(|| OsuApiError::MatchNotFound(match_id.to_string()))
    }
}
