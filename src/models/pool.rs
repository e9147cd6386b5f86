//! Pool and tournament metadata.

use serde::{Deserialize, Serialize};

/// Join table from a pool code to its beatmap ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolMeta {
    /// Short pool code, e.g. `QF`
    #[serde(rename = "_id")]
    pub code: String,

    pub long_name: String,

    #[serde(default)]
    pub diff_ids: Vec<String>,
}

impl PoolMeta {
    pub fn contains(&self, diff_id: &str) -> bool {
        self.diff_ids.iter().any(|id| id == diff_id)
    }
}

/// The single tournament-wide settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentMeta {
    #[serde(rename = "_id")]
    pub id: String,

    pub full_name: String,
    pub shorthand: String,

    #[serde(default)]
    pub icon_url: Option<String>,

    /// Pool used when a map is referenced by shorthand alone
    #[serde(default)]
    pub active_pool: Option<String>,
}

impl TournamentMeta {
    pub const ID: &'static str = "meta";
}

/// Link between a chat-platform user and a tournament player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordUser {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub osu_id: Option<String>,
    #[serde(default)]
    pub osu_name: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
}

impl DiscordUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            osu_id: None,
            osu_name: None,
            team_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_meta_contains() {
        let pool = PoolMeta {
            code: "QF".to_string(),
            long_name: "Quarterfinals".to_string(),
            diff_ids: vec!["1".to_string(), "2".to_string()],
        };
        assert!(pool.contains("2"));
        assert!(!pool.contains("3"));
    }

    #[test]
    fn test_discord_user_defaults() {
        let user: DiscordUser = serde_json::from_str(r#"{"_id": "99"}"#).unwrap();
        assert_eq!(user, DiscordUser::new("99"));
    }
}
