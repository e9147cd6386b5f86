//! Document record types for the tournament statistics store.

mod beatmap;
mod ids;
mod match_record;
mod mods;
mod player;
mod pool;
mod score;
mod stats;

pub use beatmap::*;
pub use ids::*;
pub use match_record::*;
pub use mods::*;
pub use player::*;
pub use pool::*;
pub use score::*;
pub use stats::*;
