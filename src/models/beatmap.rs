//! Pool maps and their running statistics.

use serde::{Deserialize, Serialize};

use super::{MapType, RunningAverage, Score, ScoreId};

/// Scores at or above this count toward `one_mils`.
pub const ONE_MILLION: u64 = 1_000_000;

/// Display metadata fetched from the game API.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapMeta {
    pub artist: String,
    pub title: String,
    pub version: String,
    pub creator: String,
    pub star_rating: f64,
    pub bpm: f64,
    /// Drain time in seconds
    pub drain_time: u32,
}

/// Running statistics for one map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapStats {
    /// Distinct matches the map was played in
    pub picks: u32,
    pub bans: u32,
    pub total_scores: u32,
    pub score: RunningAverage,
    pub acc: RunningAverage,
    #[serde(default)]
    pub one_mils: u32,
}

impl MapStats {
    /// Accumulate records and recompute averages.
    pub fn apply_all<'a, I>(&mut self, scores: I)
    where
        I: IntoIterator<Item = &'a Score>,
    {
        for score in scores {
            self.score.add(score.score as f64);
            self.acc.add(score.accuracy);
            self.total_scores += 1;
            if score.score >= ONE_MILLION {
                self.one_mils += 1;
            }
        }
        self.score.recompute(self.total_scores);
        self.acc.recompute(self.total_scores);
    }
}

/// A map in a pool collection, keyed by beatmap id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beatmap {
    #[serde(rename = "_id")]
    pub id: String,

    /// Pool code this map belongs to
    pub pool: String,

    /// Upper-case shorthand within the pool, e.g. `HR2`
    pub shorthand: String,
    pub map_type: MapType,

    pub map_url: String,
    pub thumbnail_url: String,
    pub meta: MapMeta,

    #[serde(default)]
    pub scores: Vec<ScoreId>,

    #[serde(default)]
    pub stats: MapStats,
}

impl Beatmap {
    pub fn map_url_for(id: &str) -> String {
        format!("https://osu.ppy.sh/b/{}", id)
    }

    pub fn thumbnail_url_for(beatmapset_id: &str) -> String {
        format!("https://b.ppy.sh/thumb/{}l.jpg", beatmapset_id)
    }
}
