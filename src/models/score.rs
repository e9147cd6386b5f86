//! Score records: one player's result on one map of one match.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ModCategory, ScoreId};

/// The four hit judgement buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HitCounts {
    pub count_300: u32,
    pub count_100: u32,
    pub count_50: u32,
    pub count_miss: u32,
}

impl HitCounts {
    pub fn new(count_300: u32, count_100: u32, count_50: u32, count_miss: u32) -> Self {
        Self {
            count_300,
            count_100,
            count_50,
            count_miss,
        }
    }

    pub fn total(&self) -> u32 {
        self.count_300 + self.count_100 + self.count_50 + self.count_miss
    }

    /// Accuracy as a fraction in `0..=1`.
    ///
    /// Weighted `(300s + 100s/3 + 50s/6) / total`. Zero judgements yield `0.0`.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let weighted = self.count_300 as f64
            + self.count_100 as f64 / 3.0
            + self.count_50 as f64 / 6.0;
        weighted / total as f64
    }

    pub fn add(&mut self, other: &HitCounts) {
        self.count_300 += other.count_300;
        self.count_100 += other.count_100;
        self.count_50 += other.count_50;
        self.count_miss += other.count_miss;
    }
}

/// One of the two sides of a team-mode lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Blue,
    Red,
}

impl Side {
    /// Parse the API's team flag (`"1"` blue, `"2"` red). Anything else has no side.
    pub fn from_api(flag: &str) -> Option<Self> {
        match flag.trim() {
            "1" => Some(Side::Blue),
            "2" => Some(Side::Red),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Blue => write!(f, "blue"),
            Side::Red => write!(f, "red"),
        }
    }
}

/// An immutable score record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    #[serde(rename = "_id")]
    pub id: ScoreId,

    pub user_id: String,
    pub user_name: String,

    /// Raw score
    pub score: u64,
    pub combo: u32,

    /// Fraction in `0..=1`
    pub accuracy: f64,
    pub hits: HitCounts,

    /// Raw modifier bitmask and its decoded names
    pub mod_val: u32,
    pub mods: Vec<String>,
    pub passed: bool,

    pub side: Side,

    /// Persistent Team the player belongs to, if registered
    #[serde(default)]
    pub team_name: Option<String>,

    /// Sum of counted scores on this player's side
    pub team_total: u64,

    /// `score / team_total`
    pub contrib: f64,

    /// Positive when this side won, negative when it lost, zero on a tie
    pub score_difference: i64,

    pub diff_id: String,
    pub match_id: String,
    pub match_name: String,
    pub match_index: usize,

    /// Pool code the map was resolved to
    pub pool: String,
    #[serde(default)]
    pub stage: Option<String>,
    pub mod_category: ModCategory,

    #[serde(default)]
    pub played_at: Option<DateTime<Utc>>,
}

impl Score {
    pub fn won(&self) -> bool {
        self.score_difference > 0
    }

    pub fn lost(&self) -> bool {
        self.score_difference < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_perfect() {
        assert_eq!(HitCounts::new(100, 0, 0, 0).accuracy(), 1.0);
    }

    #[test]
    fn test_accuracy_all_misses() {
        assert_eq!(HitCounts::new(0, 0, 0, 100).accuracy(), 0.0);
    }

    #[test]
    fn test_accuracy_weighting() {
        let acc = HitCounts::new(50, 50, 0, 0).accuracy();
        assert!((acc - (50.0 + 50.0 / 3.0) / 100.0).abs() < 1e-12);

        let acc = HitCounts::new(0, 0, 60, 0).accuracy();
        assert!((acc - 10.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_accuracy_no_judgements() {
        assert_eq!(HitCounts::default().accuracy(), 0.0);
    }

    #[test]
    fn test_hit_counts_add() {
        let mut a = HitCounts::new(1, 2, 3, 4);
        a.add(&HitCounts::new(10, 20, 30, 40));
        assert_eq!(a, HitCounts::new(11, 22, 33, 44));
        assert_eq!(a.total(), 110);
    }

    #[test]
    fn test_side_from_api() {
        assert_eq!(Side::from_api("1"), Some(Side::Blue));
        assert_eq!(Side::from_api("2"), Some(Side::Red));
        assert_eq!(Side::from_api("0"), None);
    }

    #[test]
    fn test_side_serialization() {
        assert_eq!(serde_json::to_string(&Side::Red).unwrap(), "\"red\"");
    }
}
