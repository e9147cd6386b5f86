//! Aggregate update phases.
//!
//! Each phase loads the current document, folds the batch's records into it
//! and writes it back with a full replace. A document that no longer resolves
//! is logged and skipped.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{info, warn};

use crate::models::{MatchRecord, Player, Team};
use crate::storage::{Database, Filter, FindOptions, StoreError};

use super::builder::ScoreBatch;

/// Outcome of one aggregate phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub updated: usize,
    /// Identifiers whose document did not resolve
    pub skipped: Vec<String>,
}

impl PhaseReport {
    fn skip(&mut self, kind: &str, id: &str) {
        warn!("{} {} not found, skipping its update", kind, id);
        self.skipped.push(id.to_string());
    }
}

pub async fn update_players(db: &Database, batch: &ScoreBatch) -> Result<PhaseReport, StoreError> {
    let players = db.players();
    let mut report = PhaseReport::default();
    let mut loaded: HashMap<String, Player> = players
        .find(
            &Filter::any_of("_id", batch.by_player.keys().cloned()),
            &FindOptions::default(),
        )
        .await?
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();

    for (player_id, idxs) in &batch.by_player {
        let Some(mut player) = loaded.remove(player_id) else {
            report.skip("Player", player_id);
            continue;
        };

        for score in batch.scores_at(idxs) {
            player.cached.apply(score);
            player.scores.push(score.id.clone());
        }
        player.cached.recompute();

        players.replace(player_id, &player).await?;
        report.updated += 1;
    }

    info!(
        "Updated {} players ({} skipped)",
        report.updated,
        report.skipped.len()
    );
    Ok(report)
}

pub async fn update_teams(db: &Database, batch: &ScoreBatch) -> Result<PhaseReport, StoreError> {
    let teams = db.teams();
    let mut report = PhaseReport::default();
    let mut loaded: HashMap<String, Team> = teams
        .find(
            &Filter::any_of("_id", batch.by_team.keys().cloned()),
            &FindOptions::default(),
        )
        .await?
        .into_iter()
        .map(|t| (t.name.clone(), t))
        .collect();

    for (team_name, idxs) in &batch.by_team {
        let Some(mut team) = loaded.remove(team_name) else {
            report.skip("Team", team_name);
            continue;
        };

        team.cached.apply_all(batch.scores_at(idxs));
        team.scores
            .extend(batch.scores_at(idxs).map(|s| s.id.clone()));

        teams.replace(team_name, &team).await?;
        report.updated += 1;
    }

    info!(
        "Updated {} teams ({} skipped)",
        report.updated,
        report.skipped.len()
    );
    Ok(report)
}

/// Fold scores, picks and bans into pool Map documents.
///
/// Picks count distinct matches. Banned maps without scores in the batch
/// still receive their ban count.
pub async fn update_maps(db: &Database, batch: &ScoreBatch) -> Result<PhaseReport, StoreError> {
    let mut report = PhaseReport::default();

    for (diff_id, idxs) in &batch.by_map {
        let Some(pool) = batch.scores_at(idxs).next().map(|s| s.pool.clone()) else {
            continue;
        };
        let maps = db.pool(&pool);
        let Some(mut map) = maps.find_by_id(diff_id).await? else {
            report.skip("Map", diff_id);
            continue;
        };

        let picked_in: BTreeSet<&str> = batch
            .scores_at(idxs)
            .map(|s| s.match_id.as_str())
            .collect();

        map.stats.apply_all(batch.scores_at(idxs));
        map.stats.picks += picked_in.len() as u32;
        map.stats.bans += batch.bans_for(diff_id);
        map.scores
            .extend(batch.scores_at(idxs).map(|s| s.id.clone()));

        maps.replace(diff_id, &map).await?;
        report.updated += 1;
    }

    for (diff_id, ban) in &batch.bans {
        if batch.by_map.contains_key(diff_id) {
            continue;
        }
        let maps = db.pool(&ban.pool);
        let Some(mut map) = maps.find_by_id(diff_id).await? else {
            report.skip("Map", diff_id);
            continue;
        };
        map.stats.bans += ban.count;
        maps.replace(diff_id, &map).await?;
        report.updated += 1;
    }

    info!(
        "Updated {} maps ({} skipped)",
        report.updated,
        report.skipped.len()
    );
    Ok(report)
}

/// Insert one Match document per submitted match.
///
/// A match that produced no records still gets a document, named from the
/// lobby, with empty side stats.
pub async fn create_matches(db: &Database, batch: &ScoreBatch) -> Result<usize, StoreError> {
    let records: Vec<MatchRecord> = batch
        .matches
        .iter()
        .map(|entry| {
            if entry.scores.is_empty() {
                warn!("Match {} produced no scores", entry.match_id);
            }
            let mut record = MatchRecord::from_scores(&entry.match_id, batch.scores_at(&entry.scores))
                .with_referee(entry.referee_id.clone(), entry.referee_name.clone());
            if record.match_name.is_empty() {
                record.match_name = entry.match_name.clone();
            }
            if entry.stage.is_some() {
                record.stage = entry.stage.clone();
            }
            record
        })
        .collect();

    let inserted = db.matches().insert_many(&records).await?;
    info!("Created {} match documents", inserted);
    Ok(inserted)
}
