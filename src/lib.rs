//! # stk-stats
//!
//! Score ingestion and statistics for osu! team tournaments.
//!
//! ## Architecture
//!
//! - **models**: Score, Match, Player, Team, Map and pool records, plus the running-average math
//! - **storage**: Document store seam with in-memory and JSONL backends
//! - **osu**: Game API seam with an HTTP client and a fixture-backed source
//! - **normalize**: Turns raw match games into per-player results
//! - **ingest**: Builds score records and updates every aggregate
//! - **lookup**: Resolves loosely typed identifiers to documents
//! - **query**: Paginated leaderboards
//! - **seed**: Tournament setup and full rebuilds
//! - **config**: Configuration loading and validation

pub mod config;
pub mod ingest;
pub mod lookup;
pub mod models;
pub mod normalize;
pub mod osu;
pub mod query;
pub mod seed;
pub mod storage;

pub use models::*;
