//! Tournament-wide rank recompute.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::models::{Player, Team};
use crate::storage::{Collection, Database, Filter, FindOptions, SortOrder, StoreError};

/// How many documents hold a rank after a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RankReport {
    pub players_ranked: usize,
    pub teams_ranked: usize,
}

/// 1-based positions by `path` descending, counting only documents that
/// have played at least one map.
async fn positions<T, I, P>(
    collection: &Collection<T>,
    path: &str,
    id_of: I,
    played: P,
) -> Result<HashMap<String, u32>, StoreError>
where
    T: Serialize + DeserializeOwned,
    I: Fn(&T) -> &str,
    P: Fn(&T) -> u32,
{
    let sorted = collection
        .find(
            &Filter::All,
            &FindOptions::default().sort_by(path, SortOrder::Descending),
        )
        .await?;

    let mut ranks = HashMap::new();
    let mut next = 1u32;
    for doc in sorted.iter().filter(|d| played(*d) > 0) {
        ranks.insert(id_of(doc).to_string(), next);
        next += 1;
    }
    Ok(ranks)
}

fn player_id(p: &Player) -> &str {
    &p.id
}

fn player_played(p: &Player) -> u32 {
    p.cached.maps_played
}

fn team_id(t: &Team) -> &str {
    &t.name
}

fn team_played(t: &Team) -> u32 {
    t.cached.maps_played
}

/// Rewrite every Player and Team rank field.
///
/// Players rank on score, accuracy and contribution; teams on score and
/// accuracy. Anything with no maps played is left at rank 0.
pub async fn recompute_ranks(db: &Database) -> Result<RankReport, StoreError> {
    let players = db.players();
    let by_score = positions(&players, "cached.score.average", player_id, player_played).await?;
    let by_acc = positions(&players, "cached.acc.average", player_id, player_played).await?;
    let by_contrib = positions(&players, "cached.contrib.average", player_id, player_played).await?;

    let mut report = RankReport::default();
    for mut player in players.find(&Filter::All, &FindOptions::default()).await? {
        let before = (
            player.cached.score.rank,
            player.cached.acc.rank,
            player.cached.contrib.rank,
        );
        player.cached.score.rank = by_score.get(&player.id).copied().unwrap_or(0);
        player.cached.acc.rank = by_acc.get(&player.id).copied().unwrap_or(0);
        player.cached.contrib.rank = by_contrib.get(&player.id).copied().unwrap_or(0);

        if player.cached.score.rank > 0 {
            report.players_ranked += 1;
        }
        let after = (
            player.cached.score.rank,
            player.cached.acc.rank,
            player.cached.contrib.rank,
        );
        if before != after {
            players.replace(&player.id, &player).await?;
        }
    }

    let teams = db.teams();
    let by_score = positions(&teams, "cached.score.average", team_id, team_played).await?;
    let by_acc = positions(&teams, "cached.acc.average", team_id, team_played).await?;

    for mut team in teams.find(&Filter::All, &FindOptions::default()).await? {
        let before = (team.cached.score.rank, team.cached.acc.rank);
        team.cached.score.rank = by_score.get(&team.name).copied().unwrap_or(0);
        team.cached.acc.rank = by_acc.get(&team.name).copied().unwrap_or(0);

        if team.cached.score.rank > 0 {
            report.teams_ranked += 1;
        }
        if before != (team.cached.score.rank, team.cached.acc.rank) {
            teams.replace(&team.name, &team).await?;
        }
    }

    info!(
        "Ranked {} players and {} teams",
        report.players_ranked, report.teams_ranked
    );
    Ok(report)
}
