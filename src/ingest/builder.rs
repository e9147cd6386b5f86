//! Score record construction and batch grouping.

use std::collections::{BTreeMap, HashMap};

use crate::models::{ModCategory, Score, ScoreId};
use crate::normalize::NormalizedMap;

use super::MatchSubmission;

/// Pool-level facts about the map a normalized game was played on.
#[derive(Debug, Clone)]
pub struct MapContext<'a> {
    pub pool: &'a str,
    pub stage: Option<&'a str>,
    pub category: ModCategory,
    /// Player id to Team name, for players registered on a team
    pub teams: &'a HashMap<String, String>,
}

/// One Score record per counted player on the map.
pub fn build_scores(map: &NormalizedMap, ctx: &MapContext<'_>) -> Vec<Score> {
    map.scores
        .iter()
        .map(|s| Score {
            id: ScoreId::new(&s.user_id, &map.match_id, map.map_index),
            user_id: s.user_id.clone(),
            user_name: s.user_name.clone(),
            score: s.score,
            combo: s.combo,
            accuracy: s.accuracy,
            hits: s.hits,
            mod_val: s.mods.0,
            mods: s.mods.names(),
            passed: s.passed,
            side: s.side,
            team_name: ctx.teams.get(&s.user_id).cloned(),
            team_total: map.side_total(s.side),
            contrib: s.contrib,
            score_difference: map.signed_difference(s.side),
            diff_id: map.diff_id.clone(),
            match_id: map.match_id.clone(),
            match_name: map.match_name.clone(),
            match_index: map.map_index,
            pool: ctx.pool.to_string(),
            stage: ctx.stage.map(str::to_string),
            mod_category: ctx.category,
            played_at: map.played_at,
        })
        .collect()
}

/// A submitted match and the positions of its records in the batch.
#[derive(Debug, Clone)]
pub struct MatchEntry {
    pub match_id: String,
    /// Lobby name from the API, used when the match produced no records
    pub match_name: String,
    pub stage: Option<String>,
    pub referee_id: Option<String>,
    pub referee_name: Option<String>,
    /// Indexes into [`ScoreBatch::scores`], in map order
    pub scores: Vec<usize>,
}

/// Ban count for one map within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanCount {
    pub pool: String,
    pub count: u32,
}

/// Every record produced by one ingestion run, grouped four ways.
#[derive(Debug, Clone, Default)]
pub struct ScoreBatch {
    pub scores: Vec<Score>,
    pub matches: Vec<MatchEntry>,
    pub by_player: BTreeMap<String, Vec<usize>>,
    pub by_team: BTreeMap<String, Vec<usize>>,
    pub by_map: BTreeMap<String, Vec<usize>>,
    pub bans: BTreeMap<String, BanCount>,
    /// Games left out, as `match:index (reason)`
    pub skipped_maps: Vec<String>,
    /// Bans that resolved to no pool map, as `match:ban`
    pub unresolved_bans: Vec<String>,
}

impl ScoreBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a match entry. Returns its slot for [`push`](Self::push).
    pub fn begin_match(&mut self, submission: &MatchSubmission, match_name: &str) -> usize {
        self.matches.push(MatchEntry {
            match_id: submission.match_id.clone(),
            match_name: match_name.to_string(),
            stage: submission.stage.clone(),
            referee_id: submission.referee_id.clone(),
            referee_name: submission.referee_name.clone(),
            scores: Vec::new(),
        });
        self.matches.len() - 1
    }

    /// Add a record to the batch and to every grouping it belongs to.
    pub fn push(&mut self, match_slot: usize, score: Score) {
        let idx = self.scores.len();

        if let Some(entry) = self.matches.get_mut(match_slot) {
            entry.scores.push(idx);
        }
        self.by_player
            .entry(score.user_id.clone())
            .or_default()
            .push(idx);
        if let Some(team) = &score.team_name {
            self.by_team.entry(team.clone()).or_default().push(idx);
        }
        self.by_map
            .entry(score.diff_id.clone())
            .or_default()
            .push(idx);

        self.scores.push(score);
    }

    pub fn add_ban(&mut self, diff_id: &str, pool: &str) {
        self.bans
            .entry(diff_id.to_string())
            .or_insert_with(|| BanCount {
                pool: pool.to_string(),
                count: 0,
            })
            .count += 1;
    }

    pub fn bans_for(&self, diff_id: &str) -> u32 {
        self.bans.get(diff_id).map(|b| b.count).unwrap_or(0)
    }

    /// Records at the given positions.
    pub fn scores_at<'a>(&'a self, idxs: &'a [usize]) -> impl Iterator<Item = &'a Score> + 'a {
        idxs.iter().filter_map(move |&i| self.scores.get(i))
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Ids of submitted matches that produced no records.
    pub fn empty_matches(&self) -> Vec<String> {
        self.matches
            .iter()
            .filter(|m| m.scores.is_empty())
            .map(|m| m.match_id.clone())
            .collect()
    }
}
