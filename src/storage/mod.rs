//! Document store access.
//!
//! Documents are JSON objects keyed by `_id`, grouped into collections
//! within logical databases:
//! - `matches_and_scores`: score records and match summaries
//! - `mappools`: pool meta plus one collection of maps per pool code
//! - `players_and_teams`: players and teams
//! - `tournament_data`: tournament meta and chat-user links
//!
//! [`DocumentStore`] is the untyped backend seam; [`Collection`] decodes
//! documents into record types at the boundary.

pub mod jsonl;
pub mod memory;
pub mod query;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{Beatmap, DiscordUser, MatchRecord, Player, PoolMeta, Score, Team, TournamentMeta};

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate key {id} in {namespace}")]
    DuplicateKey { namespace: Namespace, id: String },

    #[error("Document without _id in {0}")]
    MissingId(Namespace),

    #[error("Invalid document {id} in {namespace}: {source}")]
    InvalidDocument {
        namespace: Namespace,
        id: String,
        source: serde_json::Error,
    },

    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("Corrupt line {line} in {path:?}: {source}")]
    CorruptLine {
        path: std::path::PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

/// A collection within a logical database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Document filter. Paths are dotted (`cached.score.average`).
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Eq(String, Value),
    In(String, Vec<Value>),
    /// Field sorts strictly after the value
    Gt(String, Value),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(path.into(), value.into())
    }

    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt(path.into(), value.into())
    }

    /// Field equals any of `values`.
    pub fn any_of<I, V>(path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In(path.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Filter::Eq("_id".to_string(), Value::String(id.into()))
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::All => other,
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            f => Filter::And(vec![f, other]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Sort, skip and limit applied to a `find`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<(String, SortOrder)>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn sort_by(mut self, path: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some((path.into(), order));
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// Async document store backend.
///
/// Replace is a full-document overwrite with no version check: concurrent
/// writers to the same document race and the last write wins.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    async fn find(
        &self,
        ns: &Namespace,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError>;

    async fn find_one(&self, ns: &Namespace, filter: &Filter) -> Result<Option<Value>, StoreError> {
        let mut docs = self
            .find(ns, filter, &FindOptions::default().limit(1))
            .await?;
        Ok(docs.pop())
    }

    async fn count(&self, ns: &Namespace, filter: &Filter) -> Result<usize, StoreError>;

    /// Insert documents. Fails without writing anything if any `_id` already
    /// exists or repeats within the batch.
    async fn insert_many(&self, ns: &Namespace, docs: Vec<Value>) -> Result<usize, StoreError>;

    async fn insert_one(&self, ns: &Namespace, doc: Value) -> Result<(), StoreError> {
        self.insert_many(ns, vec![doc]).await.map(|_| ())
    }

    /// Replace the first matching document. Returns whether one matched.
    async fn replace_one(&self, ns: &Namespace, filter: &Filter, doc: Value) -> Result<bool, StoreError>;

    /// Delete the first matching document. Returns whether one matched.
    async fn delete_one(&self, ns: &Namespace, filter: &Filter) -> Result<bool, StoreError>;

    /// Record an index spec. Backends may use it only as metadata.
    async fn create_index(&self, ns: &Namespace, path: &str, order: SortOrder) -> Result<(), StoreError>;

    async fn drop_database(&self, database: &str) -> Result<(), StoreError>;
}

/// Extract the `_id` of a document as a string.
pub fn document_id(ns: &Namespace, doc: &Value) -> Result<String, StoreError> {
    match doc.get("_id") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(StoreError::MissingId(ns.clone())),
    }
}

/// A typed view over one collection.
pub struct Collection<T> {
    store: Arc<dyn DocumentStore>,
    ns: Namespace,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ns: self.ns.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> Collection<T> {
    pub fn new(store: Arc<dyn DocumentStore>, ns: Namespace) -> Self {
        Self {
            store,
            ns,
            _marker: PhantomData,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    fn decode(&self, doc: Value) -> Result<T, StoreError> {
        let id = doc
            .get("_id")
            .map(|v| v.to_string())
            .unwrap_or_default();
        serde_json::from_value(doc).map_err(|source| StoreError::InvalidDocument {
            namespace: self.ns.clone(),
            id,
            source,
        })
    }

    pub async fn find_one(&self, filter: &Filter) -> Result<Option<T>, StoreError> {
        match self.store.find_one(&self.ns, filter).await? {
            Some(doc) => Ok(Some(self.decode(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.find_one(&Filter::id(id)).await
    }

    pub async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<T>, StoreError> {
        self.store
            .find(&self.ns, filter, options)
            .await?
            .into_iter()
            .map(|doc| self.decode(doc))
            .collect()
    }

    pub async fn count(&self, filter: &Filter) -> Result<usize, StoreError> {
        self.store.count(&self.ns, filter).await
    }

    pub async fn estimated_document_count(&self) -> Result<usize, StoreError> {
        self.store.count(&self.ns, &Filter::All).await
    }

    pub async fn insert_one(&self, doc: &T) -> Result<(), StoreError> {
        self.store
            .insert_one(&self.ns, serde_json::to_value(doc)?)
            .await
    }

    pub async fn insert_many(&self, docs: &[T]) -> Result<usize, StoreError> {
        if docs.is_empty() {
            return Ok(0);
        }
        let values = docs
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        self.store.insert_many(&self.ns, values).await
    }

    /// Full replace of the document with the given id.
    pub async fn replace(&self, id: &str, doc: &T) -> Result<bool, StoreError> {
        self.store
            .replace_one(&self.ns, &Filter::id(id), serde_json::to_value(doc)?)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.store.delete_one(&self.ns, &Filter::id(id)).await
    }

    pub async fn create_index(&self, path: &str, order: SortOrder) -> Result<(), StoreError> {
        self.store.create_index(&self.ns, path, order).await
    }
}

/// Injected handle over the tournament's four logical databases.
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
}

impl Database {
    pub const MATCHES_AND_SCORES: &'static str = "matches_and_scores";
    pub const MAPPOOLS: &'static str = "mappools";
    pub const PLAYERS_AND_TEAMS: &'static str = "players_and_teams";
    pub const TOURNAMENT_DATA: &'static str = "tournament_data";

    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// In-memory database, mostly for tests and dry runs.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    fn collection<T: Serialize + DeserializeOwned>(&self, db: &str, coll: &str) -> Collection<T> {
        Collection::new(Arc::clone(&self.store), Namespace::new(db, coll))
    }

    pub fn scores(&self) -> Collection<Score> {
        self.collection(Self::MATCHES_AND_SCORES, "scores")
    }

    pub fn matches(&self) -> Collection<MatchRecord> {
        self.collection(Self::MATCHES_AND_SCORES, "matches")
    }

    pub fn pool_meta(&self) -> Collection<PoolMeta> {
        self.collection(Self::MAPPOOLS, "meta")
    }

    /// Maps of one pool, e.g. `pool("QF")`.
    pub fn pool(&self, code: &str) -> Collection<Beatmap> {
        self.collection(Self::MAPPOOLS, code)
    }

    pub fn players(&self) -> Collection<Player> {
        self.collection(Self::PLAYERS_AND_TEAMS, "players")
    }

    pub fn teams(&self) -> Collection<Team> {
        self.collection(Self::PLAYERS_AND_TEAMS, "teams")
    }

    pub fn tournament_meta(&self) -> Collection<TournamentMeta> {
        self.collection(Self::TOURNAMENT_DATA, "meta")
    }

    pub fn discord_users(&self) -> Collection<DiscordUser> {
        self.collection(Self::TOURNAMENT_DATA, "discord_users")
    }

    /// Drop all four databases.
    pub async fn drop_all(&self) -> Result<(), StoreError> {
        for db in [
            Self::MATCHES_AND_SCORES,
            Self::MAPPOOLS,
            Self::PLAYERS_AND_TEAMS,
            Self::TOURNAMENT_DATA,
        ] {
            self.store.drop_database(db).await?;
        }
        Ok(())
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.store.name())
            .finish()
    }
}
