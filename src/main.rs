use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stk_stats::config::{AppConfig, StorageBackend};
use stk_stats::ingest::{IngestReport, Ingestor, LogProgress, MatchSubmission};
use stk_stats::lookup;
use stk_stats::models::{MatchRecord, Score, Side};
use stk_stats::osu::{HttpOsuApi, OsuApi, StaticOsuApi};
use stk_stats::query::{self, Page, QueryOutcome, Stat};
use stk_stats::seed::{self, SeedData};
use stk_stats::storage::{Database, JsonlStore};

#[derive(Parser)]
#[command(name = "stk-stats")]
#[command(about = "Score ingestion and statistics for osu! team tournaments")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory path (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Serve game data from a JSON fixture instead of the osu! API
    #[arg(long)]
    fixture: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add tournament meta, pools, players and teams from a seed file
    Seed {
        /// Seed TOML file
        file: PathBuf,
    },

    /// Drop everything and rebuild from a seed file
    Rebuild {
        /// Seed TOML file
        file: PathBuf,
    },

    /// Ingest a single match
    AddMatch {
        /// osu! multiplayer match id
        match_id: String,

        /// Stage label (e.g. "Quarterfinals")
        #[arg(long)]
        stage: Option<String>,

        /// Pool to resolve bans in
        #[arg(long)]
        pool: Option<String>,

        /// Banned maps, comma-separated shorthand (e.g. "NM1,HR2")
        #[arg(long, default_value = "")]
        bans: String,

        /// Map indexes to skip (comma-separated, zero-based)
        #[arg(long, value_delimiter = ',')]
        ignore: Vec<usize>,

        /// Referee player id, excluded from scoring
        #[arg(long)]
        referee: Option<String>,

        /// Referee display name
        #[arg(long)]
        referee_name: Option<String>,
    },

    /// Ingest every match listed in a TOML file (`[[matches]]` tables)
    Ingest {
        file: PathBuf,

        /// Create the score index after inserting
        #[arg(long)]
        create_index: bool,
    },

    /// Recompute player and team ranks
    Ranks,

    /// A player's best scores
    PlayerBest {
        player: String,
        #[arg(long, default_value = "1")]
        page: i64,
        /// Modifier category (NM, HD, HR, DT, FM)
        #[arg(long = "mod")]
        mod_filter: Option<String>,
    },

    /// A team's best scores
    TeamBest {
        team: String,
        #[arg(long, default_value = "1")]
        page: i64,
        #[arg(long = "mod")]
        mod_filter: Option<String>,
    },

    /// Best scores on a map (id or shorthand)
    MapBest {
        map: String,
        #[arg(long)]
        pool: Option<String>,
        #[arg(long, default_value = "1")]
        page: i64,
    },

    /// Tournament-wide best scores
    ServerBest {
        /// score, acc or contrib
        #[arg(long, default_value = "score")]
        stat: String,
        #[arg(long = "mod")]
        mod_filter: Option<String>,
        #[arg(long, default_value = "1")]
        page: i64,
    },

    /// Player or team average leaderboard
    Leaderboard {
        /// score, acc or contrib
        #[arg(long, default_value = "score")]
        stat: String,
        /// Rank teams instead of players
        #[arg(long)]
        teams: bool,
        #[arg(long, default_value = "1")]
        page: i64,
    },

    /// Show a player document
    Player { ident: String },

    /// Show a team document
    Team { name: String },

    /// Show a match document
    Match { match_id: String },

    /// Link a chat user to a player
    Link { discord_id: String, player: String },

    /// Remove a chat user's link
    Unlink { discord_id: String },

    /// Show who a chat user is linked to
    Whois { discord_id: String },
}

#[derive(Debug, Deserialize)]
struct MatchFile {
    #[serde(default)]
    matches: Vec<MatchSubmission>,
}

fn open_database(config: &AppConfig) -> Database {
    match config.storage.backend {
        StorageBackend::Jsonl => Database::new(Arc::new(JsonlStore::new(config.data_dir.clone()))),
        StorageBackend::Memory => Database::in_memory(),
    }
}

fn osu_api(config: &AppConfig, fixture: Option<&Path>) -> Result<Arc<dyn OsuApi>> {
    match fixture {
        Some(path) => Ok(Arc::new(StaticOsuApi::from_fixture(path)?)),
        None => Ok(Arc::new(HttpOsuApi::from_config(&config.osu)?)),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_match(record: &MatchRecord) {
    println!("\n=== {} ({}) ===", record.match_name, record.id);
    if let Some(stage) = &record.stage {
        println!("Stage:   {}", stage);
    }
    if let Some(referee) = record.ref_name.as_ref().or(record.ref_id.as_ref()) {
        println!("Referee: {}", referee);
    }
    println!("Maps:    {}", record.scores.len());
    for side in [Side::Blue, Side::Red] {
        let stats = record.side_stats(side);
        println!(
            "  {:<5} {:>3} scores, avg {:>10.0}, acc {:>6.2}%, diff {:>+10.0}",
            side.to_string(),
            stats.scores,
            stats.average_score,
            stats.average_acc * 100.0,
            stats.average_difference
        );
    }
    for (id, p) in &record.player_stats {
        println!(
            "  {:<20} {:<5} {:>3} maps, avg {:>10.0}, acc {:>6.2}%, contrib {:>5.1}%",
            format!("{} ({})", p.user_name, id),
            p.side.to_string(),
            p.scores,
            p.average_score,
            p.average_acc * 100.0,
            p.average_contrib * 100.0
        );
    }
}

fn print_ingest_report(report: &IngestReport) {
    println!("\n=== Ingestion Results ===");
    println!("Matches submitted: {}", report.matches_submitted);
    println!("Scores inserted:   {}", report.scores_inserted);
    println!("Players updated:   {}", report.players.updated);
    println!("Teams updated:     {}", report.teams.updated);
    println!("Maps updated:      {}", report.maps.updated);
    println!("Matches created:   {}", report.matches_created);
    println!("Players ranked:    {}", report.ranks.players_ranked);
    println!("Duration:          {:?}", report.duration);

    if !report.skipped_maps.is_empty() {
        println!("\nSkipped maps:");
        for map in &report.skipped_maps {
            println!("  - {}", map);
        }
    }
    if !report.empty_matches.is_empty() {
        println!("\nMatches with no scores:");
        for id in &report.empty_matches {
            println!("  - {}", id);
        }
    }
    if !report.unresolved_bans.is_empty() {
        println!("\nUnresolved bans:");
        for ban in &report.unresolved_bans {
            println!("  - {}", ban);
        }
    }
    if report.is_partial() {
        println!("\n{} entities were skipped:", report.skipped_entities());
        for id in report
            .players
            .skipped
            .iter()
            .chain(&report.teams.skipped)
            .chain(&report.maps.skipped)
        {
            println!("  - {}", id);
        }
    }
}

fn print_score_page(title: &str, page: &Page<Score>) {
    println!("\n=== {} (page {}/{}) ===", title, page.page, page.max_page);
    for (i, s) in page.items.iter().enumerate() {
        println!(
            "{:>3}. {:<16} {:>9} {:>6.2}% {:<8} {} #{}",
            page.first_position() + i,
            s.user_name,
            s.score,
            s.accuracy * 100.0,
            s.mods.join(""),
            s.match_name,
            s.match_index
        );
    }
}

fn print_score_outcome(title: &str, outcome: &QueryOutcome<Score>, what: &str) {
    match outcome {
        QueryOutcome::EntityNotFound => println!("No {} found", what),
        QueryOutcome::NoRecords => println!("No scores yet for this {}", what),
        QueryOutcome::Page(page) => print_score_page(title, page),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    config.validate()?;

    // Initialize tracing
    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting stk-stats v{}", env!("CARGO_PKG_VERSION"));

    let db = open_database(&config);
    let fixture = cli.fixture.as_deref();

    match cli.command {
        Commands::Seed { file } => {
            let data = SeedData::from_file(&file)?;
            let api = osu_api(&config, fixture)?;

            seed::add_meta(&db, &data.meta).await?;
            let pools = seed::add_pools(&db, api.as_ref(), &data.pools).await?;
            let people = seed::add_players_and_teams(&db, api.as_ref(), &data.teams).await?;

            println!("\n=== Seed Results ===");
            println!("Pools:   {}", pools.pools);
            println!("Maps:    {}", pools.maps);
            println!("Players: {}", people.players);
            println!("Teams:   {}", people.teams);
            for id in pools.unresolved_maps.iter().chain(&people.unresolved_players) {
                println!("  unresolved: {}", id);
            }
        }

        Commands::Rebuild { file } => {
            let data = SeedData::from_file(&file)?;
            let api = osu_api(&config, fixture)?;

            let report = seed::rebuild_all(&db, api, &config.ingest, &data, Arc::new(LogProgress)).await?;
            println!("\n=== Rebuild Results ===");
            println!("Pools:   {}", report.seed.pools);
            println!("Maps:    {}", report.seed.maps);
            println!("Players: {}", report.seed.players);
            println!("Teams:   {}", report.seed.teams);
            print_ingest_report(&report.ingest);
        }

        Commands::AddMatch {
            match_id,
            stage,
            pool,
            bans,
            ignore,
            referee,
            referee_name,
        } => {
            let mut submission = MatchSubmission::new(match_id).with_bans(&bans).ignoring(ignore);
            submission.stage = stage;
            submission.pool = pool;
            if let Some(id) = referee {
                submission = submission.with_referee(id, referee_name);
            }

            let api = osu_api(&config, fixture)?;
            let report = Ingestor::new(db.clone(), api, &config.ingest)
                .ingest(&[submission], false)
                .await?;
            print_ingest_report(&report);
        }

        Commands::Ingest { file, create_index } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let list: MatchFile = toml::from_str(&contents)?;
            let api = osu_api(&config, fixture)?;

            let report = Ingestor::new(db.clone(), api, &config.ingest)
                .with_progress(Arc::new(LogProgress), 0, stk_stats::ingest::INGEST_STEPS)
                .ingest(&list.matches, create_index)
                .await?;
            print_ingest_report(&report);
        }

        Commands::Ranks => {
            let report = stk_stats::ingest::recompute_ranks(&db).await?;
            println!("Players ranked: {}", report.players_ranked);
            println!("Teams ranked:   {}", report.teams_ranked);
        }

        Commands::PlayerBest { player, page, mod_filter } => {
            let category = query::mod_filter(mod_filter.as_deref())?;
            let outcome = query::top_player_scores(&db, &player, page, category).await?;
            print_score_outcome(&format!("Best scores for {}", player), &outcome, "player");
        }

        Commands::TeamBest { team, page, mod_filter } => {
            let category = query::mod_filter(mod_filter.as_deref())?;
            let outcome = query::top_team_scores(&db, &team, page, category).await?;
            print_score_outcome(&format!("Best scores for {}", team), &outcome, "team");
        }

        Commands::MapBest { map, pool, page } => {
            let outcome =
                query::top_map_scores(&db, &map, pool.as_deref(), page, config.ingest.pool_scan_limit).await?;
            print_score_outcome(&format!("Best scores on {}", map), &outcome, "map");
        }

        Commands::ServerBest { stat, mod_filter, page } => {
            let stat: Stat = stat.parse().map_err(|e: String| anyhow!(e))?;
            let category = query::mod_filter(mod_filter.as_deref())?;
            let page = query::server_best(&db, stat, category, page).await?;
            if page.is_empty() {
                println!("No scores yet");
            } else {
                print_score_page(&format!("Best scores by {}", stat), &page);
            }
        }

        Commands::Leaderboard { stat, teams, page } => {
            let stat: Stat = stat.parse().map_err(|e: String| anyhow!(e))?;
            if teams {
                let page = query::team_leaderboard(&db, stat, page).await?;
                println!("\n=== Teams by {} (page {}/{}) ===", stat, page.page, page.max_page);
                for (i, t) in page.items.iter().enumerate() {
                    let value = match stat {
                        Stat::Accuracy => t.cached.acc.average() * 100.0,
                        _ => t.cached.score.average(),
                    };
                    println!("{:>3}. {:<24} {:>12.2}", page.first_position() + i, t.name, value);
                }
            } else {
                let page = query::player_leaderboard(&db, stat, page).await?;
                println!("\n=== Players by {} (page {}/{}) ===", stat, page.page, page.max_page);
                for (i, p) in page.items.iter().enumerate() {
                    let value = match stat {
                        Stat::Score => p.cached.score.average(),
                        Stat::Accuracy => p.cached.acc.average() * 100.0,
                        Stat::Contrib => p.cached.contrib.average() * 100.0,
                    };
                    println!(
                        "{:>3}. {:<16} {:<20} {:>12.2}",
                        page.first_position() + i,
                        p.user_name,
                        p.team_name,
                        value
                    );
                }
            }
        }

        Commands::Player { ident } => match lookup::get_player(&db, &ident).await? {
            Some(player) => print_json(&player)?,
            None => println!("No player found"),
        },

        Commands::Team { name } => match lookup::get_team(&db, &name).await? {
            Some(team) => print_json(&team)?,
            None => println!("No team found"),
        },

        Commands::Match { match_id } => match lookup::get_match(&db, &match_id).await? {
            Some(record) => print_match(&record),
            None => println!("No match found"),
        },

        Commands::Link { discord_id, player } => {
            match lookup::link_discord_user(&db, &discord_id, &player).await? {
                Some(user) => println!(
                    "Linked {} to {}",
                    discord_id,
                    user.osu_name.unwrap_or_default()
                ),
                None => println!("No player found"),
            }
        }

        Commands::Unlink { discord_id } => {
            lookup::unlink_discord_user(&db, &discord_id).await?;
            println!("Unlinked {}", discord_id);
        }

        Commands::Whois { discord_id } => {
            let user = lookup::get_or_create_discord_user(&db, &discord_id).await?;
            match (&user.osu_name, &user.team_name) {
                (Some(name), team) => println!(
                    "{} is {} ({})",
                    discord_id,
                    name,
                    team.as_deref().unwrap_or("no team")
                ),
                (None, _) => println!("{} is not linked", discord_id),
            }
        }
    }

    Ok(())
}
