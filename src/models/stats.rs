//! Cached aggregate statistics for players and teams.
//!
//! Averages keep their un-averaged running sum (`base`) next to them and are
//! always recomputed as `base / count`, so applying the same records in any
//! order gives the same result.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{HitCounts, ModCategory, Score};

/// A running sum paired with its last computed average.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunningAverage {
    pub average: f64,
    pub base: f64,
}

impl RunningAverage {
    pub fn add(&mut self, value: f64) {
        self.base += value;
    }

    /// Set `average = base / count`. A zero count leaves the average untouched.
    pub fn recompute(&mut self, count: u32) {
        if count > 0 {
            self.average = self.base / count as f64;
        }
    }
}

/// A running average with a tournament-wide rank. Rank 0 means unranked.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RankedAverage {
    #[serde(flatten)]
    pub value: RunningAverage,
    #[serde(default)]
    pub rank: u32,
}

impl RankedAverage {
    pub fn average(&self) -> f64 {
        self.value.average
    }
}

/// One value per modifier category.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ByMod<T> {
    #[serde(rename = "NM")]
    pub nm: T,
    #[serde(rename = "HD")]
    pub hd: T,
    #[serde(rename = "HR")]
    pub hr: T,
    #[serde(rename = "DT")]
    pub dt: T,
    #[serde(rename = "FM")]
    pub fm: T,
}

impl<T> ByMod<T> {
    pub fn get(&self, category: ModCategory) -> &T {
        match category {
            ModCategory::NoMod => &self.nm,
            ModCategory::Hidden => &self.hd,
            ModCategory::HardRock => &self.hr,
            ModCategory::DoubleTime => &self.dt,
            ModCategory::FreeMod => &self.fm,
        }
    }

    pub fn get_mut(&mut self, category: ModCategory) -> &mut T {
        match category {
            ModCategory::NoMod => &mut self.nm,
            ModCategory::Hidden => &mut self.hd,
            ModCategory::HardRock => &mut self.hr,
            ModCategory::DoubleTime => &mut self.dt,
            ModCategory::FreeMod => &mut self.fm,
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        [
            &mut self.nm,
            &mut self.hd,
            &mut self.hr,
            &mut self.dt,
            &mut self.fm,
        ]
        .into_iter()
    }
}

/// Win/loss bookkeeping shared by every aggregate.
fn tally(score: &Score, played: &mut u32, won: &mut u32, lost: &mut u32) {
    *played += 1;
    if score.won() {
        *won += 1;
    } else if score.lost() {
        *lost += 1;
    }
}

/// Per-category breakdown for a player.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerModStats {
    pub maps_played: u32,
    pub maps_won: u32,
    pub maps_lost: u32,
    pub score: RunningAverage,
    pub acc: RunningAverage,
    pub contrib: RunningAverage,
}

/// The `cached` block of a Player document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    pub score: RankedAverage,
    pub acc: RankedAverage,
    pub contrib: RankedAverage,
    pub maps_played: u32,
    pub maps_won: u32,
    pub maps_lost: u32,
    pub hits: HitCounts,
    pub by_mod: ByMod<PlayerModStats>,
}

impl PlayerStats {
    /// Accumulate one score record. Averages are stale until [`recompute`](Self::recompute).
    pub fn apply(&mut self, score: &Score) {
        self.score.value.add(score.score as f64);
        self.acc.value.add(score.accuracy);
        self.contrib.value.add(score.contrib);
        tally(
            score,
            &mut self.maps_played,
            &mut self.maps_won,
            &mut self.maps_lost,
        );
        self.hits.add(&score.hits);

        let m = self.by_mod.get_mut(score.mod_category);
        m.score.add(score.score as f64);
        m.acc.add(score.accuracy);
        m.contrib.add(score.contrib);
        tally(score, &mut m.maps_played, &mut m.maps_won, &mut m.maps_lost);
    }

    pub fn recompute(&mut self) {
        let n = self.maps_played;
        self.score.value.recompute(n);
        self.acc.value.recompute(n);
        self.contrib.value.recompute(n);

        for m in self.by_mod.iter_mut() {
            let n = m.maps_played;
            m.score.recompute(n);
            m.acc.recompute(n);
            m.contrib.recompute(n);
        }
    }
}

/// Per-category breakdown for a team.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TeamModStats {
    pub maps_played: u32,
    pub maps_won: u32,
    pub maps_lost: u32,
    pub total_scores: u32,
    pub score: RunningAverage,
    pub acc: RunningAverage,
}

/// The `cached` block of a Team document.
///
/// Record-level sums count every member's score; `maps_played` and the win
/// and loss counters count each `(match, map index)` once.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TeamStats {
    pub score: RankedAverage,
    pub acc: RankedAverage,
    pub total_scores: u32,
    pub maps_played: u32,
    pub maps_won: u32,
    pub maps_lost: u32,
    pub hits: HitCounts,
    pub by_mod: ByMod<TeamModStats>,
}

impl TeamStats {
    /// Accumulate one ingestion run's records for this team and recompute.
    pub fn apply_all<'a, I>(&mut self, scores: I)
    where
        I: IntoIterator<Item = &'a Score>,
    {
        let mut counted: HashSet<(&'a str, usize)> = HashSet::new();

        for score in scores {
            self.score.value.add(score.score as f64);
            self.acc.value.add(score.accuracy);
            self.total_scores += 1;
            self.hits.add(&score.hits);

            let m = self.by_mod.get_mut(score.mod_category);
            m.score.add(score.score as f64);
            m.acc.add(score.accuracy);
            m.total_scores += 1;

            if counted.insert((score.match_id.as_str(), score.match_index)) {
                tally(
                    score,
                    &mut self.maps_played,
                    &mut self.maps_won,
                    &mut self.maps_lost,
                );
                tally(score, &mut m.maps_played, &mut m.maps_won, &mut m.maps_lost);
            }
        }

        self.recompute();
    }

    pub fn recompute(&mut self) {
        let n = self.total_scores;
        self.score.value.recompute(n);
        self.acc.value.recompute(n);

        for m in self.by_mod.iter_mut() {
            if m.maps_played > 0 {
                m.score.recompute(m.total_scores);
                m.acc.recompute(m.total_scores);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{ScoreId, Side};

    pub(crate) fn score(
        player: &str,
        match_id: &str,
        index: usize,
        value: u64,
        accuracy: f64,
        difference: i64,
    ) -> Score {
        Score {
            id: ScoreId::new(player, match_id, index),
            user_id: player.to_string(),
            user_name: format!("player{}", player),
            score: value,
            combo: 500,
            accuracy,
            hits: HitCounts::new(300, 10, 0, 1),
            mod_val: 0,
            mods: vec!["NM".to_string()],
            passed: true,
            side: Side::Blue,
            team_name: Some("Alpha".to_string()),
            team_total: value * 2,
            contrib: 0.5,
            score_difference: difference,
            diff_id: "100".to_string(),
            match_id: match_id.to_string(),
            match_name: "STK: (Alpha) vs (Beta)".to_string(),
            match_index: index,
            pool: "QF".to_string(),
            stage: Some("Quarterfinals".to_string()),
            mod_category: ModCategory::NoMod,
            played_at: None,
        }
    }

    #[test]
    fn test_running_average_zero_count_keeps_value() {
        let mut avg = RunningAverage {
            average: 42.0,
            base: 0.0,
        };
        avg.recompute(0);
        assert_eq!(avg.average, 42.0);
    }

    #[test]
    fn test_player_average_is_order_independent() {
        let records = vec![
            score("1", "10", 0, 500_000, 0.91, 1),
            score("1", "10", 1, 700_000, 0.97, -1),
            score("1", "11", 0, 300_000, 0.88, 0),
        ];

        let mut forward = PlayerStats::default();
        for s in &records {
            forward.apply(s);
        }
        forward.recompute();

        let mut backward = PlayerStats::default();
        for s in records.iter().rev() {
            backward.apply(s);
        }
        backward.recompute();

        assert!((forward.score.average() - 500_000.0).abs() < 1e-9);
        assert!((forward.acc.average() - (0.91 + 0.97 + 0.88) / 3.0).abs() < 1e-12);
        assert!((forward.score.average() - backward.score.average()).abs() < 1e-9);
        assert!((forward.acc.average() - backward.acc.average()).abs() < 1e-12);
    }

    #[test]
    fn test_player_incremental_batches_match_single_batch() {
        let mut stats = PlayerStats::default();
        stats.apply(&score("1", "10", 0, 400_000, 0.9, 1));
        stats.recompute();
        stats.apply(&score("1", "11", 0, 600_000, 0.8, 1));
        stats.recompute();

        assert_eq!(stats.maps_played, 2);
        assert!((stats.score.average() - 500_000.0).abs() < 1e-9);
        assert!((stats.score.value.base - 1_000_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_win_loss_partition() {
        let mut stats = PlayerStats::default();
        stats.apply(&score("1", "10", 0, 1, 0.5, 10));
        stats.apply(&score("1", "10", 1, 1, 0.5, -10));
        stats.apply(&score("1", "10", 2, 1, 0.5, 0));
        stats.recompute();

        assert_eq!(stats.maps_played, 3);
        assert_eq!(stats.maps_won, 1);
        assert_eq!(stats.maps_lost, 1);
        assert!(stats.maps_won + stats.maps_lost <= stats.maps_played);
    }

    #[test]
    fn test_player_by_mod_breakdown() {
        let mut hr = score("1", "10", 1, 800_000, 0.95, 5);
        hr.mod_category = ModCategory::HardRock;

        let mut stats = PlayerStats::default();
        stats.apply(&score("1", "10", 0, 400_000, 0.9, -5));
        stats.apply(&hr);
        stats.recompute();

        assert_eq!(stats.by_mod.nm.maps_played, 1);
        assert_eq!(stats.by_mod.nm.maps_lost, 1);
        assert_eq!(stats.by_mod.hr.maps_won, 1);
        assert!((stats.by_mod.hr.score.average - 800_000.0).abs() < 1e-9);
        assert_eq!(stats.by_mod.dt.maps_played, 0);
        assert_eq!(stats.by_mod.dt.score.average, 0.0);
    }

    #[test]
    fn test_team_dedupes_maps_per_match_index() {
        let a = score("1", "10", 0, 600_000, 0.9, 100);
        let b = score("2", "10", 0, 400_000, 0.8, 100);

        let mut stats = TeamStats::default();
        stats.apply_all([&a, &b]);

        assert_eq!(stats.maps_played, 1);
        assert_eq!(stats.maps_won, 1);
        assert_eq!(stats.total_scores, 2);
        assert_eq!(stats.by_mod.nm.maps_played, 1);
        assert_eq!(stats.by_mod.nm.total_scores, 2);
        assert!((stats.score.average() - 500_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_team_counts_separate_maps() {
        let a = score("1", "10", 0, 600_000, 0.9, -1);
        let b = score("1", "10", 1, 400_000, 0.8, 0);
        let c = score("2", "11", 0, 400_000, 0.8, 1);

        let mut stats = TeamStats::default();
        stats.apply_all([&a, &b, &c]);

        assert_eq!(stats.maps_played, 3);
        assert_eq!(stats.maps_won, 1);
        assert_eq!(stats.maps_lost, 1);
    }

    #[test]
    fn test_ranked_average_flattens() {
        let ranked = RankedAverage {
            value: RunningAverage {
                average: 1.5,
                base: 3.0,
            },
            rank: 2,
        };
        let json = serde_json::to_value(ranked).unwrap();
        assert_eq!(json["average"], 1.5);
        assert_eq!(json["base"], 3.0);
        assert_eq!(json["rank"], 2);
    }
}
