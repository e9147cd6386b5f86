//! Match data normalization.
//!
//! Turns one game of a raw `get_match` payload into per-player results with
//! accuracy, side totals, winner and contribution. Names are resolved through
//! a caller-owned [`NameCache`], then the player store, then the game API.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::IngestConfig;
use crate::models::{HitCounts, Mods, Side};
use crate::osu::{OsuApi, OsuApiError, RawMatch};
use crate::storage::{Database, StoreError};

/// Player id to display name, shared across calls for one ingestion.
pub type NameCache = HashMap<String, String>;

/// Errors from normalizing a game.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Match {match_id} map {index} uses unsupported team type {team_type}")]
    UnsupportedMode {
        match_id: String,
        index: usize,
        team_type: u8,
    },

    #[error("Match {match_id} has no map {index} ({games} played)")]
    IndexOutOfRange {
        match_id: String,
        index: usize,
        games: usize,
    },

    #[error("osu! API error: {0}")]
    Api(#[from] OsuApiError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// One counted player's result.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedScore {
    pub user_id: String,
    pub user_name: String,
    pub score: u64,
    pub combo: u32,
    pub hits: HitCounts,
    pub accuracy: f64,
    pub mods: Mods,
    pub passed: bool,
    pub side: Side,
    /// `score / own side total`
    pub contrib: f64,
}

/// One game, normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMap {
    pub match_id: String,
    pub match_name: String,
    pub map_index: usize,
    pub diff_id: String,
    /// Lobby-wide mods
    pub mods: Mods,
    /// `None` on a tie
    pub winner: Option<Side>,
    /// Absolute difference between side totals
    pub score_difference: u64,
    pub blue_total: u64,
    pub red_total: u64,
    pub scores: Vec<NormalizedScore>,
    pub played_at: Option<DateTime<Utc>>,
    pub scoring_type: u8,
    pub team_type: u8,
    pub play_mode: u8,
}

impl NormalizedMap {
    pub fn side_total(&self, side: Side) -> u64 {
        match side {
            Side::Blue => self.blue_total,
            Side::Red => self.red_total,
        }
    }

    /// Positive for the winning side, negative for the losing side, zero on a tie.
    pub fn signed_difference(&self, side: Side) -> i64 {
        let diff = self.score_difference as i64;
        match self.winner {
            Some(w) if w == side => diff,
            Some(_) => -diff,
            None => 0,
        }
    }
}

/// Normalizes games against the configured ignore rules.
#[derive(Clone)]
pub struct Normalizer {
    db: Database,
    api: Arc<dyn OsuApi>,
    ignore_threshold: u64,
    ignore_player_ids: HashSet<String>,
}

impl Normalizer {
    pub fn new(db: Database, api: Arc<dyn OsuApi>, config: &IngestConfig) -> Self {
        Self {
            db,
            api,
            ignore_threshold: config.ignore_threshold,
            ignore_player_ids: config.ignore_player_ids.iter().cloned().collect(),
        }
    }

    fn counted(&self, user_id: &str, score: u64, extra_ignored: &[String]) -> bool {
        score >= self.ignore_threshold
            && !self.ignore_player_ids.contains(user_id)
            && !extra_ignored.iter().any(|id| id == user_id)
    }

    /// Fetch a match and normalize one of its games.
    pub async fn process_match(
        &self,
        match_id: &str,
        index: usize,
        names: &mut NameCache,
    ) -> Result<Option<NormalizedMap>, NormalizeError> {
        let raw = self.api.get_match_data(match_id).await?;
        self.process_match_data(match_id, &raw, index, names, &[])
            .await
    }

    /// Normalize game `index` (zero-based) of an already fetched match.
    ///
    /// Returns `Ok(None)` when the game has no scores at all. Head-to-head
    /// and tag co-op games are rejected with [`NormalizeError::UnsupportedMode`].
    /// `extra_ignored` adds per-match ignored player ids, such as the referee.
    pub async fn process_match_data(
        &self,
        match_id: &str,
        raw: &RawMatch,
        index: usize,
        names: &mut NameCache,
        extra_ignored: &[String],
    ) -> Result<Option<NormalizedMap>, NormalizeError> {
        let game = raw
            .games
            .get(index)
            .ok_or_else(|| NormalizeError::IndexOutOfRange {
                match_id: match_id.to_string(),
                index,
                games: raw.games.len(),
            })?;

        if game.scores.is_empty() {
            debug!("Match {} map {} has no scores", match_id, index);
            return Ok(None);
        }

        if !game.is_team_mode() {
            return Err(NormalizeError::UnsupportedMode {
                match_id: match_id.to_string(),
                index,
                team_type: game.team_type,
            });
        }

        let mut blue_total = 0u64;
        let mut red_total = 0u64;
        for s in &game.scores {
            if !self.counted(&s.user_id, s.score, extra_ignored) {
                continue;
            }
            match Side::from_api(&s.team) {
                Some(Side::Blue) => blue_total += s.score,
                Some(Side::Red) => red_total += s.score,
                None => {}
            }
        }

        let winner = match blue_total.cmp(&red_total) {
            std::cmp::Ordering::Greater => Some(Side::Blue),
            std::cmp::Ordering::Less => Some(Side::Red),
            std::cmp::Ordering::Equal => None,
        };

        let lobby_mods = Mods(game.mods);
        let mut scores = Vec::new();
        for s in &game.scores {
            if !self.counted(&s.user_id, s.score, extra_ignored) {
                continue;
            }
            let Some(side) = Side::from_api(&s.team) else {
                warn!(
                    "Match {} map {}: player {} has no side, skipping",
                    match_id, index, s.user_id
                );
                continue;
            };

            let side_total = match side {
                Side::Blue => blue_total,
                Side::Red => red_total,
            };
            let contrib = if side_total > 0 {
                s.score as f64 / side_total as f64
            } else {
                0.0
            };

            let hits = HitCounts::new(s.count300, s.count100, s.count50, s.countmiss);
            let user_name = self.resolve_name(&s.user_id, names).await?;

            scores.push(NormalizedScore {
                user_id: s.user_id.clone(),
                user_name,
                score: s.score,
                combo: s.maxcombo,
                accuracy: hits.accuracy(),
                hits,
                mods: Mods(game.mods | s.enabled_mods.unwrap_or(0)),
                passed: s.pass,
                side,
                contrib,
            });
        }

        Ok(Some(NormalizedMap {
            match_id: match_id.to_string(),
            match_name: raw.name().to_string(),
            map_index: index,
            diff_id: game.beatmap_id.clone(),
            mods: lobby_mods,
            winner,
            score_difference: blue_total.abs_diff(red_total),
            blue_total,
            red_total,
            scores,
            played_at: game.started_at(),
            scoring_type: game.scoring_type,
            team_type: game.team_type,
            play_mode: game.play_mode,
        }))
    }

    /// Cache, then player store, then game API. Falls back to the id itself.
    async fn resolve_name(&self, user_id: &str, names: &mut NameCache) -> Result<String, NormalizeError> {
        if let Some(name) = names.get(user_id) {
            return Ok(name.clone());
        }

        let name = if let Some(player) = self.db.players().find_by_id(user_id).await? {
            debug!("Resolved player {} from store", user_id);
            player.user_name
        } else if let Some(user) = self.api.get_player_data(user_id).await? {
            debug!("Resolved player {} from {}", user_id, self.api.name());
            user.username
        } else {
            warn!("Could not resolve a name for player {}", user_id);
            user_id.to_string()
        };

        names.insert(user_id.to_string(), name.clone());
        Ok(name)
    }
}
