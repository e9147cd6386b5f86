//! Gameplay modifiers, pool map types and shorthand map notation.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing modifier and shorthand strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModParseError {
    #[error("Unknown modifier category: {0}")]
    UnknownCategory(String),

    #[error("Unknown map type: {0}")]
    UnknownMapType(String),

    #[error("Invalid shorthand notation: {0}")]
    InvalidShorthand(String),
}

/// Raw modifier bitmask as reported by the game API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mods(pub u32);

const MOD_NAMES: &[(u32, &str)] = &[
    (1, "NF"),
    (2, "EZ"),
    (4, "TD"),
    (8, "HD"),
    (16, "HR"),
    (32, "SD"),
    (64, "DT"),
    (128, "RX"),
    (256, "HT"),
    (512, "NC"),
    (1024, "FL"),
    (2048, "AT"),
    (4096, "SO"),
    (8192, "AP"),
    (16384, "PF"),
    (32768, "4K"),
    (65536, "5K"),
    (131072, "6K"),
    (262144, "7K"),
    (524288, "8K"),
    (1048576, "FI"),
    (2097152, "RD"),
    (4194304, "CN"),
    (8388608, "TP"),
    (16777216, "9K"),
    (33554432, "CO"),
    (67108864, "1K"),
    (134217728, "3K"),
    (268435456, "2K"),
    (536870912, "V2"),
    (1073741824, "MR"),
];

impl Mods {
    pub const HIDDEN: u32 = 8;
    pub const HARD_ROCK: u32 = 16;
    pub const DOUBLE_TIME: u32 = 64;
    pub const NIGHTCORE: u32 = 512;

    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    /// Names of every set flag in bit order; `["NM"]` when nothing is set.
    pub fn names(&self) -> Vec<String> {
        if self.0 == 0 {
            return vec!["NM".to_string()];
        }
        MOD_NAMES
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, name)| name.to_string())
            .collect()
    }

    /// Best-effort category for a map whose pool type is unknown.
    pub fn category(&self) -> ModCategory {
        let hd = self.contains(Self::HIDDEN);
        let hr = self.contains(Self::HARD_ROCK);
        let dt = self.contains(Self::DOUBLE_TIME) || self.contains(Self::NIGHTCORE);

        match (hd, hr, dt) {
            (false, false, false) => ModCategory::NoMod,
            (true, false, false) => ModCategory::Hidden,
            (false, true, false) => ModCategory::HardRock,
            (false, false, true) => ModCategory::DoubleTime,
            _ => ModCategory::FreeMod,
        }
    }
}

/// The five modifier categories statistics are broken down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModCategory {
    #[serde(rename = "NM")]
    NoMod,
    #[serde(rename = "HD")]
    Hidden,
    #[serde(rename = "HR")]
    HardRock,
    #[serde(rename = "DT")]
    DoubleTime,
    #[serde(rename = "FM")]
    FreeMod,
}

impl ModCategory {
    pub fn code(&self) -> &'static str {
        match self {
            ModCategory::NoMod => "NM",
            ModCategory::Hidden => "HD",
            ModCategory::HardRock => "HR",
            ModCategory::DoubleTime => "DT",
            ModCategory::FreeMod => "FM",
        }
    }
}

impl fmt::Display for ModCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ModCategory {
    type Err = ModParseError;

    /// Case-insensitive; tiebreaker counts as free mod.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<MapType>()
            .map(|t| t.category())
            .map_err(|_| ModParseError::UnknownCategory(s.to_string()))
    }
}

/// The slot a map occupies in a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapType {
    NM,
    HD,
    HR,
    DT,
    FM,
    TB,
}

impl MapType {
    /// Aggregation category; tiebreakers are grouped with free mod.
    pub fn category(&self) -> ModCategory {
        match self {
            MapType::NM => ModCategory::NoMod,
            MapType::HD => ModCategory::Hidden,
            MapType::HR => ModCategory::HardRock,
            MapType::DT => ModCategory::DoubleTime,
            MapType::FM | MapType::TB => ModCategory::FreeMod,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            MapType::NM => "NM",
            MapType::HD => "HD",
            MapType::HR => "HR",
            MapType::DT => "DT",
            MapType::FM => "FM",
            MapType::TB => "TB",
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for MapType {
    type Err = ModParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NM" => Ok(MapType::NM),
            "HD" => Ok(MapType::HD),
            "HR" => Ok(MapType::HR),
            "DT" => Ok(MapType::DT),
            "FM" => Ok(MapType::FM),
            "TB" => Ok(MapType::TB),
            _ => Err(ModParseError::UnknownMapType(s.to_string())),
        }
    }
}

/// Pool shorthand such as `NM1` or `hr2` (normalized to upper case).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shorthand {
    pub map_type: MapType,
    pub slot: u32,
}

fn shorthand_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?i)(NM|HD|HR|DT|FM|TB)(\d+)$").expect("valid shorthand pattern"))
}

impl Shorthand {
    /// Canonical upper-case code, e.g. `HR2`.
    pub fn code(&self) -> String {
        format!("{}{}", self.map_type.code(), self.slot)
    }
}

impl FromStr for Shorthand {
    type Err = ModParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = shorthand_regex()
            .captures(s.trim())
            .ok_or_else(|| ModParseError::InvalidShorthand(s.to_string()))?;
        let map_type = caps[1].parse()?;
        let slot = caps[2]
            .parse()
            .map_err(|_| ModParseError::InvalidShorthand(s.to_string()))?;
        Ok(Self { map_type, slot })
    }
}

impl fmt::Display for Shorthand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.map_type.code(), self.slot)
    }
}
