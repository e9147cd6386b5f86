//! Match summary documents.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Score, ScoreId, Side};

/// Per-side aggregate for one match.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SideStats {
    pub average_acc: f64,
    pub average_score: f64,
    pub average_difference: f64,
    pub scores: u32,
}

impl SideStats {
    fn add(&mut self, score: &Score) {
        self.average_acc += score.accuracy;
        self.average_score += score.score as f64;
        self.average_difference += score.score_difference as f64;
        self.scores += 1;
    }

    fn finish(&mut self) {
        if self.scores > 0 {
            let n = self.scores as f64;
            self.average_acc /= n;
            self.average_score /= n;
            self.average_difference /= n;
        }
    }
}

/// One player's aggregate within one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPlayerStats {
    pub user_name: String,
    pub side: Side,
    pub average_acc: f64,
    pub average_score: f64,
    pub average_contrib: f64,
    pub scores: u32,
}

/// A played lobby. Written once, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(rename = "_id")]
    pub id: String,

    pub match_name: String,

    #[serde(default)]
    pub ref_id: Option<String>,
    #[serde(default)]
    pub ref_name: Option<String>,

    #[serde(default)]
    pub stage: Option<String>,

    /// Score ids in map order
    pub scores: Vec<ScoreId>,

    pub blue_team_stats: SideStats,
    pub red_team_stats: SideStats,

    /// Keyed by player id
    pub player_stats: BTreeMap<String, MatchPlayerStats>,

    pub created_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Summarize a match from its score records, in the order given.
    pub fn from_scores<'a, I>(id: impl Into<String>, scores: I) -> Self
    where
        I: IntoIterator<Item = &'a Score>,
    {
        let mut record = Self {
            id: id.into(),
            match_name: String::new(),
            ref_id: None,
            ref_name: None,
            stage: None,
            scores: Vec::new(),
            blue_team_stats: SideStats::default(),
            red_team_stats: SideStats::default(),
            player_stats: BTreeMap::new(),
            created_at: Utc::now(),
        };

        for score in scores {
            if record.match_name.is_empty() {
                record.match_name = score.match_name.clone();
                record.stage = score.stage.clone();
            }
            record.scores.push(score.id.clone());

            match score.side {
                Side::Blue => record.blue_team_stats.add(score),
                Side::Red => record.red_team_stats.add(score),
            }

            let entry = record
                .player_stats
                .entry(score.user_id.clone())
                .or_insert_with(|| MatchPlayerStats {
                    user_name: score.user_name.clone(),
                    side: score.side,
                    average_acc: 0.0,
                    average_score: 0.0,
                    average_contrib: 0.0,
                    scores: 0,
                });
            entry.average_acc += score.accuracy;
            entry.average_score += score.score as f64;
            entry.average_contrib += score.contrib;
            entry.scores += 1;
        }

        record.blue_team_stats.finish();
        record.red_team_stats.finish();
        for p in record.player_stats.values_mut() {
            let n = p.scores as f64;
            p.average_acc /= n;
            p.average_score /= n;
            p.average_contrib /= n;
        }

        record
    }

    pub fn with_referee(mut self, id: Option<String>, name: Option<String>) -> Self {
        self.ref_id = id;
        self.ref_name = name;
        self
    }

    pub fn side_stats(&self, side: Side) -> &SideStats {
        match side {
            Side::Blue => &self.blue_team_stats,
            Side::Red => &self.red_team_stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stats::tests::score;

    #[test]
    fn test_match_record_side_and_player_averages() {
        let a0 = score("1", "10", 0, 900_000, 0.98, 100_000);
        let a1 = score("1", "10", 1, 700_000, 0.96, -50_000);
        let mut b0 = score("2", "10", 0, 800_000, 0.95, -100_000);
        b0.side = Side::Red;
        b0.user_name = "red".to_string();

        let record = MatchRecord::from_scores("10", [&a0, &b0, &a1]);

        assert_eq!(record.scores.len(), 3);
        assert_eq!(record.scores[1], b0.id);
        assert_eq!(record.blue_team_stats.scores, 2);
        assert!((record.blue_team_stats.average_score - 800_000.0).abs() < 1e-9);
        assert!((record.blue_team_stats.average_difference - 25_000.0).abs() < 1e-9);
        assert!((record.red_team_stats.average_score - 800_000.0).abs() < 1e-9);

        let p1 = &record.player_stats["1"];
        assert_eq!(p1.scores, 2);
        assert_eq!(p1.side, Side::Blue);
        assert!((p1.average_acc - 0.97).abs() < 1e-12);
        assert_eq!(record.player_stats["2"].side, Side::Red);
    }

    #[test]
    fn test_match_record_empty_side_is_zero() {
        let a = score("1", "10", 0, 900_000, 0.98, 0);
        let record = MatchRecord::from_scores("10", [&a]);
        assert_eq!(record.side_stats(Side::Red), &SideStats::default());
        assert_eq!(record.side_stats(Side::Blue).scores, 1);
        assert_eq!(record.match_name, a.match_name);
    }

    #[test]
    fn test_match_record_referee() {
        let record = MatchRecord::from_scores("10", std::iter::empty())
            .with_referee(Some("5".to_string()), Some("ref".to_string()));
        assert_eq!(record.ref_id.as_deref(), Some("5"));
        assert!(record.scores.is_empty());
    }
}
