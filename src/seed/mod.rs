//! Tournament setup and the rebuild-everything operation.
//!
//! Seed data is a TOML file:
//!
//! ```toml
//! [meta]
//! full_name = "Some Tournament"
//! shorthand = "STK"
//! active_pool = "QF"
//!
//! [[pools]]
//! code = "QF"
//! long_name = "Quarterfinals"
//! maps = [{ id = "1734126", shorthand = "NM1" }]
//!
//! [[teams]]
//! name = "Alpha"
//! players = ["Vaxei", "4787150"]
//!
//! [[matches]]
//! match_id = "81220473"
//! stage = "Quarterfinals"
//! bans = ["HR2"]
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::IngestConfig;
use crate::ingest::{IngestError, IngestReport, Ingestor, MatchSubmission, Progress, ProgressReporter, INGEST_STEPS};
use crate::models::{Beatmap, MapMeta, MapStats, ModParseError, Player, PoolMeta, Shorthand, Team, TournamentMeta};
use crate::osu::{OsuApi, OsuApiError};
use crate::storage::{Collection, Database, StoreError};

/// Steps reported by [`rebuild_all`]: four setup steps, then ingestion.
pub const REBUILD_STEPS: usize = 4 + INGEST_STEPS;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Seed file parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Pool {pool}: bad shorthand {shorthand}: {source}")]
    InvalidShorthand {
        pool: String,
        shorthand: String,
        source: ModParseError,
    },

    #[error("osu! API error: {0}")]
    Api(#[from] OsuApiError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaSeed {
    pub full_name: String,
    pub shorthand: String,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub active_pool: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSeed {
    pub id: String,
    /// Pool slot such as `HR2`; the prefix gives the map type
    pub shorthand: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSeed {
    pub code: String,
    pub long_name: String,
    #[serde(default)]
    pub maps: Vec<MapSeed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSeed {
    pub name: String,
    /// Usernames or ids
    #[serde(default)]
    pub players: Vec<String>,
}

/// Everything needed to build a tournament from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedData {
    pub meta: MetaSeed,
    #[serde(default)]
    pub pools: Vec<PoolSeed>,
    #[serde(default)]
    pub teams: Vec<TeamSeed>,
    #[serde(default)]
    pub matches: Vec<MatchSubmission>,
}

impl SeedData {
    pub fn from_file(path: &Path) -> Result<Self, SeedError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, SeedError> {
        Ok(toml::from_str(contents)?)
    }
}

/// Counts from the setup steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub maps: usize,
    pub pools: usize,
    pub players: usize,
    pub teams: usize,
    /// Map ids the data source did not know
    pub unresolved_maps: Vec<String>,
    /// Player identifiers the data source did not know
    pub unresolved_players: Vec<String>,
}

/// Outcome of [`rebuild_all`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RebuildReport {
    pub seed: SeedReport,
    pub ingest: IngestReport,
}

async fn upsert<T>(collection: &Collection<T>, id: &str, doc: &T) -> Result<(), StoreError>
where
    T: Serialize + serde::de::DeserializeOwned,
{
    if !collection.replace(id, doc).await? {
        collection.insert_one(doc).await?;
    }
    Ok(())
}

/// Write the single Tournament Meta document.
pub async fn add_meta(db: &Database, meta: &MetaSeed) -> Result<TournamentMeta, SeedError> {
    let doc = TournamentMeta {
        id: TournamentMeta::ID.to_string(),
        full_name: meta.full_name.clone(),
        shorthand: meta.shorthand.clone(),
        icon_url: meta.icon_url.clone(),
        active_pool: meta.active_pool.clone(),
    };
    upsert(&db.tournament_meta(), TournamentMeta::ID, &doc).await?;
    info!("Tournament meta set for {}", doc.full_name);
    Ok(doc)
}

/// Create one pool collection of Map documents per pool, plus its Pool Meta.
///
/// Map display metadata comes from the data source. Maps it does not know
/// are left out of the pool with a warning.
pub async fn add_pools(db: &Database, api: &dyn OsuApi, pools: &[PoolSeed]) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();

    for pool in pools {
        let mut maps = Vec::with_capacity(pool.maps.len());
        for seed in &pool.maps {
            let shorthand: Shorthand = seed.shorthand.parse().map_err(|source| SeedError::InvalidShorthand {
                pool: pool.code.clone(),
                shorthand: seed.shorthand.clone(),
                source,
            })?;

            let Some(raw) = api.get_map_data(&seed.id).await? else {
                warn!("Pool {}: map {} not found, skipping", pool.code, seed.id);
                report.unresolved_maps.push(seed.id.clone());
                continue;
            };

            maps.push(Beatmap {
                id: seed.id.clone(),
                pool: pool.code.clone(),
                shorthand: shorthand.code(),
                map_type: shorthand.map_type,
                map_url: Beatmap::map_url_for(&seed.id),
                thumbnail_url: Beatmap::thumbnail_url_for(&raw.beatmapset_id),
                meta: MapMeta {
                    artist: raw.artist,
                    title: raw.title,
                    version: raw.version,
                    creator: raw.creator,
                    star_rating: raw.difficultyrating,
                    bpm: raw.bpm,
                    drain_time: raw.total_length,
                },
                scores: Vec::new(),
                stats: MapStats::default(),
            });
        }

        db.pool(&pool.code).insert_many(&maps).await?;
        db.pool_meta()
            .insert_one(&PoolMeta {
                code: pool.code.clone(),
                long_name: pool.long_name.clone(),
                diff_ids: maps.iter().map(|m| m.id.clone()).collect(),
            })
            .await?;

        info!("Added pool {} with {} maps", pool.code, maps.len());
        report.maps += maps.len();
        report.pools += 1;
    }

    Ok(report)
}

/// Create Team and Player documents with zeroed statistics.
///
/// Each player identifier is resolved through the data source so the
/// canonical id and name are stored.
pub async fn add_players_and_teams(
    db: &Database,
    api: &dyn OsuApi,
    teams: &[TeamSeed],
) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();
    let mut team_docs = Vec::with_capacity(teams.len());
    let mut player_docs = Vec::new();

    for seed in teams {
        let mut team = Team::new(&seed.name);
        for ident in &seed.players {
            let Some(user) = api.get_player_data(ident).await? else {
                warn!("Team {}: player {} not found, skipping", seed.name, ident);
                report.unresolved_players.push(ident.clone());
                continue;
            };
            team.players.push(user.user_id.clone());
            player_docs.push(Player::new(user.user_id, user.username, &seed.name));
        }
        team_docs.push(team);
    }

    report.players = db.players().insert_many(&player_docs).await?;
    report.teams = db.teams().insert_many(&team_docs).await?;
    info!("Added {} players on {} teams", report.players, report.teams);
    Ok(report)
}

/// Drop every database, seed the tournament, ingest every listed match and
/// recompute ranks.
pub async fn rebuild_all(
    db: &Database,
    api: Arc<dyn OsuApi>,
    config: &IngestConfig,
    data: &SeedData,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<RebuildReport, SeedError> {
    let progress = Progress::new(Arc::clone(&reporter), 0, REBUILD_STEPS);

    db.drop_all().await?;
    progress.step(1, "Dropped databases");

    add_meta(db, &data.meta).await?;
    progress.step(2, "Built tournament meta");

    let pools = add_pools(db, api.as_ref(), &data.pools).await?;
    progress.step(3, "Built mappools");

    let people = add_players_and_teams(db, api.as_ref(), &data.teams).await?;
    progress.step(4, "Built players and teams");

    let ingest = Ingestor::new(db.clone(), api, config)
        .with_progress(reporter, 4, REBUILD_STEPS)
        .ingest(&data.matches, true)
        .await?;

    Ok(RebuildReport {
        seed: SeedReport {
            maps: pools.maps,
            pools: pools.pools,
            players: people.players,
            teams: people.teams,
            unresolved_maps: pools.unresolved_maps,
            unresolved_players: people.unresolved_players,
        },
        ingest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::progress::tests::RecordingProgress;
    use crate::models::MapType;
    use crate::normalize::tests::{raw_game, raw_match, raw_score};
    use crate::osu::{RawBeatmap, RawUser, StaticOsuApi};

    const SEED: &str = r#"
        [meta]
        full_name = "Some Tournament"
        shorthand = "STK"
        active_pool = "QF"

        [[pools]]
        code = "QF"
        long_name = "Quarterfinals"
        maps = [
            { id = "100", shorthand = "hd1" },
            { id = "404", shorthand = "NM2" },
        ]

        [[teams]]
        name = "Alpha"
        players = ["one"]

        [[teams]]
        name = "Beta"
        players = ["2", "ghost"]

        [[matches]]
        match_id = "10"
        stage = "Quarterfinals"
    "#;

    fn api() -> StaticOsuApi {
        StaticOsuApi::new()
            .with_user(RawUser {
                user_id: "1".to_string(),
                username: "One".to_string(),
            })
            .with_user(RawUser {
                user_id: "2".to_string(),
                username: "Two".to_string(),
            })
            .with_map(RawBeatmap {
                beatmap_id: "100".to_string(),
                beatmapset_id: "50".to_string(),
                artist: "Artist".to_string(),
                title: "Title".to_string(),
                version: "Extra".to_string(),
                creator: "Mapper".to_string(),
                difficultyrating: 6.2,
                bpm: 180.0,
                total_length: 95,
            })
            .with_match(
                "10",
                raw_match(
                    "10",
                    vec![raw_game(
                        "100",
                        2,
                        vec![raw_score("1", "1", 900_000), raw_score("2", "2", 800_000)],
                    )],
                ),
            )
    }

    #[test]
    fn test_parse_seed() {
        let data = SeedData::parse(SEED).unwrap();
        assert_eq!(data.pools[0].maps.len(), 2);
        assert_eq!(data.teams[1].players, vec!["2", "ghost"]);
        assert_eq!(data.matches[0].stage.as_deref(), Some("Quarterfinals"));
    }

    #[tokio::test]
    async fn test_add_pools_fetches_metadata() {
        let db = Database::in_memory();
        let data = SeedData::parse(SEED).unwrap();

        let report = add_pools(&db, &api(), &data.pools).await.unwrap();
        assert_eq!(report.maps, 1);
        assert_eq!(report.unresolved_maps, vec!["404".to_string()]);

        let map = db.pool("QF").find_by_id("100").await.unwrap().unwrap();
        assert_eq!(map.shorthand, "HD1");
        assert_eq!(map.map_type, MapType::HD);
        assert_eq!(map.thumbnail_url, "https://b.ppy.sh/thumb/50l.jpg");
        assert_eq!(map.meta.drain_time, 95);

        let meta = db.pool_meta().find_by_id("QF").await.unwrap().unwrap();
        assert_eq!(meta.diff_ids, vec!["100".to_string()]);
    }

    #[tokio::test]
    async fn test_bad_shorthand_rejected() {
        let db = Database::in_memory();
        let pools = vec![PoolSeed {
            code: "QF".to_string(),
            long_name: "Quarterfinals".to_string(),
            maps: vec![MapSeed {
                id: "100".to_string(),
                shorthand: "XX1".to_string(),
            }],
        }];
        assert!(matches!(
            add_pools(&db, &api(), &pools).await,
            Err(SeedError::InvalidShorthand { .. })
        ));
    }

    #[tokio::test]
    async fn test_players_resolved_through_api() {
        let db = Database::in_memory();
        let data = SeedData::parse(SEED).unwrap();

        let report = add_players_and_teams(&db, &api(), &data.teams).await.unwrap();
        assert_eq!((report.players, report.teams), (2, 2));
        assert_eq!(report.unresolved_players, vec!["ghost".to_string()]);

        let one = db.players().find_by_id("1").await.unwrap().unwrap();
        assert_eq!(one.user_name_lower, "one");
        assert_eq!(one.team_name, "Alpha");
        let beta = db.teams().find_by_id("Beta").await.unwrap().unwrap();
        assert_eq!(beta.players, vec!["2".to_string()]);
    }

    #[tokio::test]
    async fn test_rebuild_all_reports_eleven_steps() {
        let db = Database::in_memory();
        db.players()
            .insert_one(&Player::new("999", "Stale", "Old"))
            .await
            .unwrap();
        let data = SeedData::parse(SEED).unwrap();
        let recorder = Arc::new(RecordingProgress::default());

        let report = rebuild_all(&db, Arc::new(api()), &IngestConfig::default(), &data, recorder.clone())
            .await
            .unwrap();

        assert_eq!(report.ingest.scores_inserted, 2);
        assert!(db.players().find_by_id("999").await.unwrap().is_none());
        let one = db.players().find_by_id("1").await.unwrap().unwrap();
        assert_eq!(one.cached.score.rank, 1);

        let steps = recorder.steps.lock().unwrap();
        assert_eq!(steps.len(), REBUILD_STEPS);
        assert_eq!(steps.last().map(|s| (s.0, s.1)), Some((11, 11)));
    }

    #[tokio::test]
    async fn test_add_meta_replaces() {
        let db = Database::in_memory();
        let data = SeedData::parse(SEED).unwrap();
        add_meta(&db, &data.meta).await.unwrap();
        let mut changed = data.meta.clone();
        changed.active_pool = Some("SF".to_string());
        add_meta(&db, &changed).await.unwrap();

        let meta = db.tournament_meta().find_by_id("meta").await.unwrap().unwrap();
        assert_eq!(meta.active_pool.as_deref(), Some("SF"));
        assert_eq!(db.tournament_meta().estimated_document_count().await.unwrap(), 1);
    }
}
