//! Paginated reads for leaderboards.
//!
//! Pages hold [`PAGE_SIZE`] items. A requested page below 1 reads page 1 and
//! one past the end reads the last page; with no items the page and max page
//! are both 0.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::lookup;
use crate::models::{ModCategory, ModParseError, Player, Score, Team};
use crate::storage::{Collection, Database, Filter, FindOptions, SortOrder, StoreError};

pub const PAGE_SIZE: usize = 10;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Teams have no {0} statistic")]
    UnsupportedStat(Stat),
}

/// A ranked statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Score,
    Accuracy,
    Contrib,
}

impl Stat {
    /// Field on a Score record.
    pub fn score_field(&self) -> &'static str {
        match self {
            Stat::Score => "score",
            Stat::Accuracy => "accuracy",
            Stat::Contrib => "contrib",
        }
    }

    /// Average in a Player or Team `cached` block.
    pub fn cached_field(&self) -> &'static str {
        match self {
            Stat::Score => "cached.score.average",
            Stat::Accuracy => "cached.acc.average",
            Stat::Contrib => "cached.contrib.average",
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stat::Score => "score",
            Stat::Accuracy => "acc",
            Stat::Contrib => "contrib",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Stat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "score" => Ok(Stat::Score),
            "acc" | "accuracy" => Ok(Stat::Accuracy),
            "contrib" | "contribution" => Ok(Stat::Contrib),
            other => Err(format!("unknown statistic '{}'", other)),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page actually returned, 0 when there are no items
    pub page: usize,
    pub max_page: usize,
    pub total_items: usize,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 1-based position of the first item overall.
    pub fn first_position(&self) -> usize {
        self.page.saturating_sub(1) * PAGE_SIZE + 1
    }
}

/// Distinguishes an identifier that did not resolve from one that resolved
/// to an entity with nothing to show.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome<T> {
    EntityNotFound,
    NoRecords,
    Page(Page<T>),
}

impl<T> QueryOutcome<T> {
    fn from_page(page: Page<T>) -> Self {
        if page.total_items == 0 {
            QueryOutcome::NoRecords
        } else {
            QueryOutcome::Page(page)
        }
    }
}

/// Clamp a requested page against `total_items`. Returns `(page, max_page)`.
pub fn clamp_page(requested: i64, total_items: usize) -> (usize, usize) {
    let max_page = total_items.div_ceil(PAGE_SIZE);
    let page = requested.max(1) as usize;
    (page.min(max_page), max_page)
}

async fn paginate<T>(
    collection: &Collection<T>,
    filter: Filter,
    sort_path: &str,
    requested: i64,
) -> Result<Page<T>, StoreError>
where
    T: Serialize + DeserializeOwned,
{
    let total_items = collection.count(&filter).await?;
    let (page, max_page) = clamp_page(requested, total_items);
    if total_items == 0 {
        return Ok(Page {
            items: Vec::new(),
            page,
            max_page,
            total_items,
        });
    }

    let options = FindOptions::default()
        .sort_by(sort_path, SortOrder::Descending)
        .skip((page - 1) * PAGE_SIZE)
        .limit(PAGE_SIZE);
    let items = collection.find(&filter, &options).await?;

    Ok(Page {
        items,
        page,
        max_page,
        total_items,
    })
}

/// Parse a user-supplied modifier filter. `NF` and blank input mean no filter.
pub fn mod_filter(input: Option<&str>) -> Result<Option<ModCategory>, ModParseError> {
    match input.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("NF") => Ok(None),
        Some(s) => s.parse().map(Some),
    }
}

fn with_mod(filter: Filter, category: Option<ModCategory>) -> Filter {
    match category {
        Some(c) => filter.and(Filter::eq("mod_category", c.code())),
        None => filter,
    }
}

/// A player's best scores, highest first.
pub async fn top_player_scores(
    db: &Database,
    player: &str,
    page: i64,
    category: Option<ModCategory>,
) -> Result<QueryOutcome<Score>, QueryError> {
    let Some(player) = lookup::get_player(db, player).await? else {
        return Ok(QueryOutcome::EntityNotFound);
    };
    let filter = with_mod(Filter::eq("user_id", player.id), category);
    let page = paginate(&db.scores(), filter, "score", page).await?;
    Ok(QueryOutcome::from_page(page))
}

/// A team's best scores across all members, highest first.
pub async fn top_team_scores(
    db: &Database,
    team: &str,
    page: i64,
    category: Option<ModCategory>,
) -> Result<QueryOutcome<Score>, QueryError> {
    let Some(team) = lookup::get_team(db, team).await? else {
        return Ok(QueryOutcome::EntityNotFound);
    };
    let filter = with_mod(Filter::eq("team_name", team.name), category);
    let page = paginate(&db.scores(), filter, "score", page).await?;
    Ok(QueryOutcome::from_page(page))
}

/// Best scores on one map, by id or shorthand.
pub async fn top_map_scores(
    db: &Database,
    map: &str,
    pool: Option<&str>,
    page: i64,
    pool_scan_limit: usize,
) -> Result<QueryOutcome<Score>, QueryError> {
    let Some(map) = lookup::get_map(db, map, pool, pool_scan_limit).await? else {
        return Ok(QueryOutcome::EntityNotFound);
    };
    let filter = Filter::eq("diff_id", map.id);
    let page = paginate(&db.scores(), filter, "score", page).await?;
    Ok(QueryOutcome::from_page(page))
}

/// Tournament-wide best score records by `stat`.
pub async fn server_best(
    db: &Database,
    stat: Stat,
    category: Option<ModCategory>,
    page: i64,
) -> Result<Page<Score>, QueryError> {
    let filter = with_mod(Filter::All, category);
    Ok(paginate(&db.scores(), filter, stat.score_field(), page).await?)
}

/// Players ordered by their average `stat`. Players without maps are left out.
pub async fn player_leaderboard(db: &Database, stat: Stat, page: i64) -> Result<Page<Player>, QueryError> {
    let filter = Filter::gt("cached.maps_played", 0);
    Ok(paginate(&db.players(), filter, stat.cached_field(), page).await?)
}

/// Teams ordered by their average `stat`. Contribution is player-only.
pub async fn team_leaderboard(db: &Database, stat: Stat, page: i64) -> Result<Page<Team>, QueryError> {
    if stat == Stat::Contrib {
        return Err(QueryError::UnsupportedStat(stat));
    }
    let filter = Filter::gt("cached.maps_played", 0);
    Ok(paginate(&db.teams(), filter, stat.cached_field(), page).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HitCounts, ScoreId, Side};

    fn record(player: &str, match_id: &str, value: u64, category: ModCategory) -> Score {
        Score {
            id: ScoreId::new(player, match_id, 0),
            user_id: player.to_string(),
            user_name: format!("p{}", player),
            score: value,
            combo: 100,
            accuracy: value as f64 / 1_000_000.0,
            hits: HitCounts::new(100, 0, 0, 0),
            mod_val: 0,
            mods: vec!["NM".to_string()],
            passed: true,
            side: Side::Blue,
            team_name: Some("Alpha".to_string()),
            team_total: value,
            contrib: 1.0,
            score_difference: 0,
            diff_id: "100".to_string(),
            match_id: match_id.to_string(),
            match_name: "m".to_string(),
            match_index: 0,
            pool: "QF".to_string(),
            stage: None,
            mod_category: category,
            played_at: None,
        }
    }

    async fn with_scores(n: usize) -> Database {
        let db = Database::in_memory();
        db.players()
            .insert_many(&[Player::new("1", "One", "Alpha"), Player::new("2", "Two", "Alpha")])
            .await
            .unwrap();
        db.teams().insert_one(&Team::new("Alpha")).await.unwrap();
        let scores: Vec<Score> = (0..n)
            .map(|i| {
                let category = if i % 2 == 0 { ModCategory::NoMod } else { ModCategory::HardRock };
                record("1", &i.to_string(), 100_000 + i as u64 * 1_000, category)
            })
            .collect();
        db.scores().insert_many(&scores).await.unwrap();
        db
    }

    fn page(outcome: QueryOutcome<Score>) -> Page<Score> {
        match outcome {
            QueryOutcome::Page(p) => p,
            other => panic!("expected a page, got {:?}", other),
        }
    }

    #[test]
    fn test_clamp_page() {
        assert_eq!(clamp_page(0, 22), (1, 3));
        assert_eq!(clamp_page(-5, 22), (1, 3));
        assert_eq!(clamp_page(999_999, 22), (3, 3));
        assert_eq!(clamp_page(2, 20), (2, 2));
        assert_eq!(clamp_page(1, 0), (0, 0));
    }

    #[tokio::test]
    async fn test_twenty_two_scores_paginate_to_three_pages() {
        let db = with_scores(22).await;

        let last = page(top_player_scores(&db, "1", 3, None).await.unwrap());
        assert_eq!(last.max_page, 3);
        assert_eq!(last.items.len(), 2);

        let zero = page(top_player_scores(&db, "1", 0, None).await.unwrap());
        let first = page(top_player_scores(&db, "1", 1, None).await.unwrap());
        assert_eq!(zero, first);
        assert_eq!(first.items[0].score, 121_000);

        let beyond = page(top_player_scores(&db, "1", 999_999, None).await.unwrap());
        assert_eq!(beyond, last);
    }

    #[tokio::test]
    async fn test_not_found_and_no_records_are_distinct() {
        let db = with_scores(3).await;
        assert_eq!(
            top_player_scores(&db, "nobody", 1, None).await.unwrap(),
            QueryOutcome::EntityNotFound
        );
        assert_eq!(
            top_player_scores(&db, "2", 1, None).await.unwrap(),
            QueryOutcome::NoRecords
        );
        assert_eq!(
            top_team_scores(&db, "Gamma", 1, None).await.unwrap(),
            QueryOutcome::EntityNotFound
        );
    }

    #[tokio::test]
    async fn test_mod_filter() {
        let db = with_scores(5).await;
        let hr = page(top_team_scores(&db, "alpha", 1, Some(ModCategory::HardRock)).await.unwrap());
        assert_eq!(hr.total_items, 2);
        assert!(hr.items.iter().all(|s| s.mod_category == ModCategory::HardRock));

        let best = server_best(&db, Stat::Accuracy, Some(ModCategory::NoMod), 1).await.unwrap();
        assert_eq!(best.total_items, 3);
        assert_eq!(best.items[0].score, 104_000);
    }

    #[tokio::test]
    async fn test_empty_server_best() {
        let db = Database::in_memory();
        let best = server_best(&db, Stat::Score, None, 4).await.unwrap();
        assert_eq!((best.page, best.max_page), (0, 0));
        assert!(best.is_empty());
    }

    #[tokio::test]
    async fn test_leaderboards_skip_unplayed() {
        let db = Database::in_memory();
        let mut one = Player::new("1", "One", "Alpha");
        one.cached.maps_played = 2;
        one.cached.score.value.average = 300_000.0;
        let mut two = Player::new("2", "Two", "Alpha");
        two.cached.maps_played = 1;
        two.cached.score.value.average = 600_000.0;
        db.players()
            .insert_many(&[one, two, Player::new("3", "Three", "Beta")])
            .await
            .unwrap();

        let board = player_leaderboard(&db, Stat::Score, 1).await.unwrap();
        assert_eq!(board.total_items, 2);
        assert_eq!(board.items[0].id, "2");
        assert_eq!(board.first_position(), 1);

        assert!(matches!(
            team_leaderboard(&db, Stat::Contrib, 1).await,
            Err(QueryError::UnsupportedStat(Stat::Contrib))
        ));
    }

    #[test]
    fn test_mod_filter_parse() {
        assert_eq!(mod_filter(None), Ok(None));
        assert_eq!(mod_filter(Some("nf")), Ok(None));
        assert_eq!(mod_filter(Some("hr")), Ok(Some(ModCategory::HardRock)));
        assert_eq!(mod_filter(Some("TB")), Ok(Some(ModCategory::FreeMod)));
        assert!(mod_filter(Some("EZ")).is_err());
    }

    #[test]
    fn test_stat_parse() {
        assert_eq!("ACC".parse::<Stat>(), Ok(Stat::Accuracy));
        assert!("pp".parse::<Stat>().is_err());
    }
}
