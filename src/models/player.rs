//! Tournament players and teams.

use serde::{Deserialize, Serialize};

use super::{PlayerStats, ScoreId, TeamStats};

/// A tournament competitor, keyed by their game account id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    #[serde(rename = "_id")]
    pub id: String,

    pub user_name: String,

    /// Lowercased `user_name` for case-insensitive lookup
    pub user_name_lower: String,

    /// Name of the owning Team
    pub team_name: String,

    #[serde(default)]
    pub pfp_url: Option<String>,

    #[serde(default)]
    pub scores: Vec<ScoreId>,

    #[serde(default)]
    pub cached: PlayerStats,
}

impl Player {
    pub fn new(id: impl Into<String>, user_name: impl Into<String>, team_name: impl Into<String>) -> Self {
        let id = id.into();
        let user_name = user_name.into();
        Self {
            pfp_url: Some(format!("https://a.ppy.sh/{}", id)),
            user_name_lower: user_name.to_lowercase(),
            id,
            user_name,
            team_name: team_name.into(),
            scores: Vec::new(),
            cached: PlayerStats::default(),
        }
    }
}

/// A tournament team. The name is the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    #[serde(rename = "_id")]
    pub name: String,

    pub name_lower: String,

    /// Member player ids
    #[serde(default)]
    pub players: Vec<String>,

    #[serde(default)]
    pub scores: Vec<ScoreId>,

    #[serde(default)]
    pub cached: TeamStats,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            name_lower: name.to_lowercase(),
            name,
            players: Vec::new(),
            scores: Vec::new(),
            cached: TeamStats::default(),
        }
    }
}
