//! Ingestion pipeline.
//!
//! Runs submitted matches through a fixed sequence of phases:
//! 1. Normalize every game and build Score records
//! 2. Bulk-insert the records
//! 3. Update Player aggregates
//! 4. Update Team aggregates
//! 5. Update Map aggregates, picks and bans
//! 6. Create Match documents
//! 7. Recompute ranks
//!
//! Each phase finishes its writes before the next starts. Nothing is rolled
//! back if a later phase fails.

pub mod aggregate;
pub mod builder;
pub mod progress;
pub mod ranks;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::lookup;
use crate::normalize::{NameCache, NormalizeError, Normalizer};
use crate::osu::{OsuApi, OsuApiError};
use crate::storage::{Database, Filter, FindOptions, SortOrder, StoreError};

pub use aggregate::PhaseReport;
pub use builder::{build_scores, BanCount, MapContext, MatchEntry, ScoreBatch};
pub use progress::{LogProgress, NoProgress, Progress, ProgressReporter};
pub use ranks::{recompute_ranks, RankReport};

/// Number of progress steps one ingestion reports.
pub const INGEST_STEPS: usize = 7;

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("osu! API error: {0}")]
    Api(#[from] OsuApiError),

    #[error("Normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// One match as submitted for ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSubmission {
    pub match_id: String,

    /// Stage label copied onto every record, e.g. `Quarterfinals`
    #[serde(default)]
    pub stage: Option<String>,

    /// Pool to resolve bans in. Defaults to the pool of the match's first
    /// scored map, then the active pool.
    #[serde(default)]
    pub pool: Option<String>,

    /// Banned maps as shorthand (`HR2`) or beatmap id
    #[serde(default)]
    pub bans: Vec<String>,

    /// Zero-based game indexes to leave out (warmups, aborts)
    #[serde(default)]
    pub ignored_indexes: Vec<usize>,

    #[serde(default)]
    pub referee_id: Option<String>,

    #[serde(default)]
    pub referee_name: Option<String>,
}

impl MatchSubmission {
    pub fn new(match_id: impl Into<String>) -> Self {
        Self {
            match_id: match_id.into(),
            ..Default::default()
        }
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = Some(pool.into());
        self
    }

    /// Parse a comma separated ban list such as `NM1, hr2`.
    pub fn with_bans(mut self, bans: &str) -> Self {
        self.bans = bans
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_uppercase)
            .collect();
        self
    }

    pub fn ignoring(mut self, indexes: impl IntoIterator<Item = usize>) -> Self {
        self.ignored_indexes.extend(indexes);
        self
    }

    pub fn with_referee(mut self, id: impl Into<String>, name: Option<String>) -> Self {
        self.referee_id = Some(id.into());
        self.referee_name = name;
        self
    }
}

/// What one ingestion run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub matches_submitted: usize,
    pub scores_inserted: usize,
    pub players: PhaseReport,
    pub teams: PhaseReport,
    pub maps: PhaseReport,
    pub matches_created: usize,
    pub ranks: RankReport,
    pub skipped_maps: Vec<String>,
    pub unresolved_bans: Vec<String>,
    /// Submitted matches that produced no score records
    pub empty_matches: Vec<String>,
    pub duration: Duration,
}

impl IngestReport {
    /// Entities whose aggregate update was skipped.
    pub fn skipped_entities(&self) -> usize {
        self.players.skipped.len() + self.teams.skipped.len() + self.maps.skipped.len()
    }

    /// True when the run completed with some entities skipped.
    pub fn is_partial(&self) -> bool {
        self.skipped_entities() > 0
    }
}

/// Drives submitted matches through every ingestion phase.
pub struct Ingestor {
    db: Database,
    api: Arc<dyn OsuApi>,
    config: IngestConfig,
    normalizer: Normalizer,
    progress: Progress,
}

impl Ingestor {
    pub fn new(db: Database, api: Arc<dyn OsuApi>, config: &IngestConfig) -> Self {
        Self {
            normalizer: Normalizer::new(db.clone(), Arc::clone(&api), config),
            db,
            api,
            config: config.clone(),
            progress: Progress::silent(),
        }
    }

    /// Report phases as steps `offset + 1 ..= offset + 7` of `total`.
    pub fn with_progress(mut self, reporter: Arc<dyn ProgressReporter>, offset: usize, total: usize) -> Self {
        self.progress = Progress::new(reporter, offset, total);
        self
    }

    /// Run every phase for `submissions`.
    ///
    /// `create_index` adds a descending index on the raw score field after
    /// the records are inserted. A match already ingested fails the run with
    /// [`StoreError::DuplicateKey`] before anything is written.
    pub async fn ingest(
        &self,
        submissions: &[MatchSubmission],
        create_index: bool,
    ) -> Result<IngestReport, IngestError> {
        let start = Instant::now();
        info!("Ingesting {} matches", submissions.len());

        self.reject_recorded(submissions).await?;
        let batch = self.build_batch(submissions).await?;
        if batch.is_empty() {
            warn!("Submitted matches produced no score records");
        }
        self.progress.step(1, "Built score records");

        let scores_inserted = self.db.scores().insert_many(&batch.scores).await?;
        if create_index {
            self.db.scores().create_index("score", SortOrder::Descending).await?;
        }
        info!("Inserted {} score records", scores_inserted);
        self.progress.step(2, "Inserted scores");

        let players = aggregate::update_players(&self.db, &batch).await?;
        self.progress.step(3, "Updated players");

        let teams = aggregate::update_teams(&self.db, &batch).await?;
        self.progress.step(4, "Updated teams");

        let maps = aggregate::update_maps(&self.db, &batch).await?;
        self.progress.step(5, "Updated maps");

        let matches_created = aggregate::create_matches(&self.db, &batch).await?;
        self.progress.step(6, "Created matches");

        let ranks = recompute_ranks(&self.db).await?;
        self.progress.step(7, "Recomputed ranks");

        let empty_matches = batch.empty_matches();
        let report = IngestReport {
            matches_submitted: submissions.len(),
            scores_inserted,
            players,
            teams,
            maps,
            matches_created,
            ranks,
            skipped_maps: batch.skipped_maps,
            empty_matches,
            unresolved_bans: batch.unresolved_bans,
            duration: start.elapsed(),
        };

        if report.is_partial() {
            warn!(
                "Ingestion completed with {} entities skipped",
                report.skipped_entities()
            );
        }
        info!(
            "Ingestion finished in {:?}: {} scores, {} matches",
            report.duration, report.scores_inserted, report.matches_created
        );
        Ok(report)
    }

    /// Fail with `DuplicateKey` when a submitted match already has a Match document.
    async fn reject_recorded(&self, submissions: &[MatchSubmission]) -> Result<(), StoreError> {
        let matches = self.db.matches();
        let recorded = matches
            .find(
                &Filter::any_of("_id", submissions.iter().map(|s| s.match_id.clone())),
                &FindOptions::default().limit(1),
            )
            .await?;
        match recorded.into_iter().next() {
            Some(existing) => Err(StoreError::DuplicateKey {
                namespace: matches.namespace().clone(),
                id: existing.id,
            }),
            None => Ok(()),
        }
    }

    /// Phase 1: normalize every game and build the grouped record batch.
    ///
    /// Performs no writes.
    pub async fn build_batch(&self, submissions: &[MatchSubmission]) -> Result<ScoreBatch, IngestError> {
        let mut batch = ScoreBatch::new();
        let mut names = NameCache::new();
        let mut teams: HashMap<String, String> = HashMap::new();
        let mut teams_checked: HashSet<String> = HashSet::new();

        for submission in submissions {
            let raw = self.api.get_match_data(&submission.match_id).await?;
            let slot = batch.begin_match(submission, raw.name());
            let extra_ignored: Vec<String> = submission.referee_id.iter().cloned().collect();
            let mut match_pool: Option<String> = None;

            for index in 0..raw.games.len() {
                if submission.ignored_indexes.contains(&index) {
                    debug!("Match {} map {} ignored by submission", submission.match_id, index);
                    continue;
                }

                let normalized = match self
                    .normalizer
                    .process_match_data(&submission.match_id, &raw, index, &mut names, &extra_ignored)
                    .await
                {
                    Ok(Some(map)) => map,
                    Ok(None) => continue,
                    Err(NormalizeError::UnsupportedMode { team_type, .. }) if self.config.skip_unsupported_maps => {
                        warn!(
                            "Match {} map {} uses team type {}, skipping",
                            submission.match_id, index, team_type
                        );
                        batch
                            .skipped_maps
                            .push(format!("{}:{} (unsupported mode)", submission.match_id, index));
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };

                let Some(pool) =
                    lookup::determine_pool(&self.db, &normalized.diff_id, self.config.pool_scan_limit).await?
                else {
                    warn!(
                        "Match {} map {} ({}) is in no pool, skipping",
                        submission.match_id, index, normalized.diff_id
                    );
                    batch
                        .skipped_maps
                        .push(format!("{}:{} (not pooled)", submission.match_id, index));
                    continue;
                };

                let category = match self.db.pool(&pool).find_by_id(&normalized.diff_id).await? {
                    Some(map) => map.map_type.category(),
                    None => normalized.mods.category(),
                };

                for s in &normalized.scores {
                    if teams_checked.insert(s.user_id.clone()) {
                        if let Some(team) = self.team_of(&s.user_id).await? {
                            teams.insert(s.user_id.clone(), team);
                        }
                    }
                }

                let ctx = MapContext {
                    pool: &pool,
                    stage: submission.stage.as_deref(),
                    category,
                    teams: &teams,
                };
                for score in build_scores(&normalized, &ctx) {
                    batch.push(slot, score);
                }

                if match_pool.is_none() {
                    match_pool = Some(pool);
                }
            }

            let ban_pool = submission.pool.clone().or(match_pool);
            for ban in &submission.bans {
                match lookup::get_map(&self.db, ban, ban_pool.as_deref(), self.config.pool_scan_limit).await? {
                    Some(map) => batch.add_ban(&map.id, &map.pool),
                    None => {
                        warn!("Match {}: ban {} matches no pool map", submission.match_id, ban);
                        batch
                            .unresolved_bans
                            .push(format!("{}:{}", submission.match_id, ban));
                    }
                }
            }
        }

        info!(
            "Built {} score records from {} matches",
            batch.scores.len(),
            batch.matches.len()
        );
        Ok(batch)
    }

    /// Owning Team from the Player document, falling back to team membership.
    async fn team_of(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        if let Some(player) = self.db.players().find_by_id(user_id).await? {
            if !player.team_name.is_empty() {
                return Ok(Some(player.team_name));
            }
        }
        lookup::determine_team(&self.db, user_id).await
    }
}
