//! Composite score identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a `Score` document.
///
/// Formed as `{player_id}-{match_id}-{map_index}`, which makes one score per
/// player per map instance. Serialized as the bare string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreId(String);

impl ScoreId {
    /// Build the id for a player's result on one map of one match.
    pub fn new(player_id: &str, match_id: &str, map_index: usize) -> Self {
        Self(format!("{}-{}-{}", player_id, match_id, map_index))
    }

    /// Split the id back into `(player_id, match_id, map_index)`.
    pub fn parts(&self) -> Option<(&str, &str, usize)> {
        let mut it = self.0.splitn(3, '-');
        let player = it.next()?;
        let match_id = it.next()?;
        let index = it.next()?.parse().ok()?;
        Some((player, match_id, index))
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ScoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScoreId({})", self.0)
    }
}

impl From<String> for ScoreId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ScoreId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_id_format() {
        let id = ScoreId::new("1234", "59424609", 3);
        assert_eq!(id.as_str(), "1234-59424609-3");
    }

    #[test]
    fn test_score_id_parts() {
        let id = ScoreId::new("1234", "59424609", 3);
        assert_eq!(id.parts(), Some(("1234", "59424609", 3)));
    }

    #[test]
    fn test_score_id_parts_malformed() {
        assert_eq!(ScoreId::from("1234-only").parts(), None);
        assert_eq!(ScoreId::from("a-b-notanumber").parts(), None);
    }

    #[test]
    fn test_score_id_serializes_as_string() {
        let id = ScoreId::new("1", "2", 0);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"1-2-0\"");

        let back: ScoreId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_score_id_equality() {
        assert_eq!(ScoreId::new("1", "2", 0), ScoreId::from("1-2-0"));
        assert_ne!(ScoreId::new("1", "2", 0), ScoreId::new("1", "2", 1));
    }
}
