//! Identifier resolution.
//!
//! Every resolver returns `Ok(None)` for an identifier that does not resolve;
//! errors are reserved for the store itself failing.

use tracing::debug;

use crate::models::{Beatmap, DiscordUser, MatchRecord, Player, Shorthand, Team, TournamentMeta};
use crate::storage::{Database, Filter, FindOptions, StoreError};

/// A map reference as typed by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapIdent {
    /// Numeric beatmap id
    Id(String),
    /// Pool shorthand such as `HR2`
    Shorthand(Shorthand),
}

impl MapIdent {
    /// Numeric input is an id; anything else is tried as shorthand.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.parse::<u64>().is_ok() {
            return Some(MapIdent::Id(input.to_string()));
        }
        input.parse::<Shorthand>().ok().map(MapIdent::Shorthand)
    }
}

/// By id first, then case-insensitively by name.
pub async fn get_player(db: &Database, ident: &str) -> Result<Option<Player>, StoreError> {
    let ident = ident.trim();
    if let Some(player) = db.players().find_by_id(ident).await? {
        return Ok(Some(player));
    }
    db.players()
        .find_one(&Filter::eq("user_name_lower", ident.to_lowercase()))
        .await
}

/// Case-insensitive exact name match.
pub async fn get_team(db: &Database, name: &str) -> Result<Option<Team>, StoreError> {
    db.teams()
        .find_one(&Filter::eq("name_lower", name.trim().to_lowercase()))
        .await
}

pub async fn get_match(db: &Database, match_id: &str) -> Result<Option<MatchRecord>, StoreError> {
    db.matches().find_by_id(match_id.trim()).await
}

pub async fn get_tournament_meta(db: &Database) -> Result<Option<TournamentMeta>, StoreError> {
    db.tournament_meta().find_by_id(TournamentMeta::ID).await
}

/// Code of the first pool (within `limit` pools) listing `diff_id`.
pub async fn determine_pool(db: &Database, diff_id: &str, limit: usize) -> Result<Option<String>, StoreError> {
    let pools = db
        .pool_meta()
        .find(&Filter::All, &FindOptions::default().limit(limit))
        .await?;
    Ok(pools
        .into_iter()
        .find(|p| p.contains(diff_id))
        .map(|p| p.code))
}

/// Name of the Team listing `user_id` as a member.
pub async fn determine_team(db: &Database, user_id: &str) -> Result<Option<String>, StoreError> {
    Ok(db
        .teams()
        .find_one(&Filter::eq("players", user_id))
        .await?
        .map(|t| t.name))
}

/// Resolve a map by id or shorthand.
///
/// An id is looked up in `pool` when given, otherwise in whichever pool
/// lists it. Shorthand needs a pool; without one the tournament's active
/// pool is used.
pub async fn get_map(
    db: &Database,
    ident: &str,
    pool: Option<&str>,
    pool_scan_limit: usize,
) -> Result<Option<Beatmap>, StoreError> {
    match MapIdent::parse(ident) {
        Some(MapIdent::Id(id)) => {
            let pool = match pool {
                Some(p) => p.to_string(),
                None => match determine_pool(db, &id, pool_scan_limit).await? {
                    Some(p) => p,
                    None => return Ok(None),
                },
            };
            db.pool(&pool).find_by_id(&id).await
        }
        Some(MapIdent::Shorthand(code)) => {
            let pool = match pool {
                Some(p) => p.to_string(),
                None => match get_tournament_meta(db).await?.and_then(|m| m.active_pool) {
                    Some(p) => p,
                    None => {
                        debug!("No active pool set; cannot resolve {}", code);
                        return Ok(None);
                    }
                },
            };
            db.pool(&pool)
                .find_one(&Filter::eq("shorthand", code.code()))
                .await
        }
        None => Ok(None),
    }
}

/// Fetch a chat-user link, creating an empty one on first reference.
pub async fn get_or_create_discord_user(db: &Database, discord_id: &str) -> Result<DiscordUser, StoreError> {
    if let Some(user) = db.discord_users().find_by_id(discord_id).await? {
        return Ok(user);
    }
    let user = DiscordUser::new(discord_id);
    db.discord_users().insert_one(&user).await?;
    debug!("Created chat-user link {}", discord_id);
    Ok(user)
}

/// Link a chat user to a player. `None` when the player does not resolve.
pub async fn link_discord_user(
    db: &Database,
    discord_id: &str,
    player_ident: &str,
) -> Result<Option<DiscordUser>, StoreError> {
    let Some(player) = get_player(db, player_ident).await? else {
        return Ok(None);
    };

    let mut user = get_or_create_discord_user(db, discord_id).await?;
    user.osu_id = Some(player.id);
    user.osu_name = Some(player.user_name);
    user.team_name = Some(player.team_name);
    db.discord_users().replace(discord_id, &user).await?;
    Ok(Some(user))
}

/// Clear a chat user's link. Returns the cleared document.
pub async fn unlink_discord_user(db: &Database, discord_id: &str) -> Result<DiscordUser, StoreError> {
    let mut user = get_or_create_discord_user(db, discord_id).await?;
    user.osu_id = None;
    user.osu_name = None;
    user.team_name = None;
    db.discord_users().replace(discord_id, &user).await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MapMeta, MapStats, MapType, PoolMeta};

    fn beatmap(id: &str, pool: &str, shorthand: &str, map_type: MapType) -> Beatmap {
        Beatmap {
            id: id.to_string(),
            pool: pool.to_string(),
            shorthand: shorthand.to_string(),
            map_type,
            map_url: Beatmap::map_url_for(id),
            thumbnail_url: Beatmap::thumbnail_url_for("1"),
            meta: MapMeta::default(),
            scores: Vec::new(),
            stats: MapStats::default(),
        }
    }

    async fn seeded() -> Database {
        let db = Database::in_memory();
        db.players()
            .insert_one(&Player::new("4787150", "Vaxei", "Alpha"))
            .await
            .unwrap();
        let mut team = Team::new("Alpha");
        team.players.push("4787150".to_string());
        db.teams().insert_one(&team).await.unwrap();

        db.pool_meta()
            .insert_many(&[
                PoolMeta {
                    code: "QF".to_string(),
                    long_name: "Quarterfinals".to_string(),
                    diff_ids: vec!["100".to_string()],
                },
                PoolMeta {
                    code: "SF".to_string(),
                    long_name: "Semifinals".to_string(),
                    diff_ids: vec!["200".to_string()],
                },
            ])
            .await
            .unwrap();
        db.pool("QF")
            .insert_one(&beatmap("100", "QF", "NM1", MapType::NM))
            .await
            .unwrap();
        db.pool("SF")
            .insert_one(&beatmap("200", "SF", "HR2", MapType::HR))
            .await
            .unwrap();
        db.tournament_meta()
            .insert_one(&TournamentMeta {
                id: TournamentMeta::ID.to_string(),
                full_name: "Some Tournament".to_string(),
                shorthand: "STK".to_string(),
                icon_url: None,
                active_pool: Some("SF".to_string()),
            })
            .await
            .unwrap();
        db
    }

    #[test]
    fn test_map_ident_parse() {
        assert_eq!(MapIdent::parse("1734126"), Some(MapIdent::Id("1734126".to_string())));
        assert!(matches!(MapIdent::parse("nm1"), Some(MapIdent::Shorthand(_))));
        assert_eq!(MapIdent::parse("banana"), None);
    }

    #[tokio::test]
    async fn test_get_player_by_id_then_name() {
        let db = seeded().await;
        assert!(get_player(&db, "4787150").await.unwrap().is_some());
        assert_eq!(
            get_player(&db, "VAXEI").await.unwrap().unwrap().id,
            "4787150"
        );
        assert!(get_player(&db, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_team_case_insensitive() {
        let db = seeded().await;
        let found = tokio_test::assert_ok!(get_team(&db, "alpha").await);
        assert!(found.is_some());
        assert!(get_team(&db, "alph").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_determine_pool_and_team() {
        let db = seeded().await;
        assert_eq!(determine_pool(&db, "200", 100).await.unwrap().as_deref(), Some("SF"));
        assert_eq!(determine_pool(&db, "999", 100).await.unwrap(), None);
        assert_eq!(determine_pool(&db, "200", 1).await.unwrap(), None);
        assert_eq!(
            determine_team(&db, "4787150").await.unwrap().as_deref(),
            Some("Alpha")
        );
        assert_eq!(determine_team(&db, "1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_map_by_id_and_shorthand() {
        let db = seeded().await;

        assert_eq!(get_map(&db, "100", None, 100).await.unwrap().unwrap().id, "100");
        assert_eq!(get_map(&db, "100", Some("QF"), 100).await.unwrap().unwrap().id, "100");
        assert!(get_map(&db, "100", Some("SF"), 100).await.unwrap().is_none());

        // active pool fallback, lowercase input
        assert_eq!(get_map(&db, "hr2", None, 100).await.unwrap().unwrap().id, "200");
        assert_eq!(get_map(&db, "NM1", Some("QF"), 100).await.unwrap().unwrap().id, "100");
        assert!(get_map(&db, "NM1", None, 100).await.unwrap().is_none());
        assert!(get_map(&db, "???", None, 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_discord_links() {
        let db = seeded().await;

        let fresh = get_or_create_discord_user(&db, "555").await.unwrap();
        assert!(fresh.osu_id.is_none());

        let linked = link_discord_user(&db, "555", "vaxei").await.unwrap().unwrap();
        assert_eq!(linked.osu_id.as_deref(), Some("4787150"));
        assert_eq!(linked.team_name.as_deref(), Some("Alpha"));
        assert!(link_discord_user(&db, "555", "nobody").await.unwrap().is_none());

        let cleared = unlink_discord_user(&db, "555").await.unwrap();
        assert!(cleared.osu_name.is_none());
        assert_eq!(db.discord_users().estimated_document_count().await.unwrap(), 1);
    }
}
