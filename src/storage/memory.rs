//! Process-local document store.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::query::apply_options;
use super::{document_id, DocumentStore, Filter, FindOptions, Namespace, SortOrder, StoreError};

/// Insertion-ordered in-memory collections.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Namespace, Vec<Value>>>,
    indexes: RwLock<HashMap<Namespace, Vec<(String, SortOrder)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index specs recorded for a collection.
    pub async fn indexes(&self, ns: &Namespace) -> Vec<(String, SortOrder)> {
        self.indexes
            .read()
            .await
            .get(ns)
            .cloned()
            .unwrap_or_default()
    }
}

/// Reject a batch that collides with `existing` or with itself.
pub(crate) fn check_unique(ns: &Namespace, existing: &[Value], docs: &[Value]) -> Result<(), StoreError> {
    let mut seen: std::collections::HashSet<String> = existing
        .iter()
        .filter_map(|d| document_id(ns, d).ok())
        .collect();
    for doc in docs {
        let id = document_id(ns, doc)?;
        if !seen.insert(id.clone()) {
            return Err(StoreError::DuplicateKey {
                namespace: ns.clone(),
                id,
            });
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn find(
        &self,
        ns: &Namespace,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError> {
        let guard = self.collections.read().await;
        let docs = guard
            .get(ns)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default();
        Ok(apply_options(docs, options))
    }

    async fn count(&self, ns: &Namespace, filter: &Filter) -> Result<usize, StoreError> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(ns)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).count())
            .unwrap_or(0))
    }

    async fn insert_many(&self, ns: &Namespace, docs: Vec<Value>) -> Result<usize, StoreError> {
        let mut guard = self.collections.write().await;
        let coll = guard.entry(ns.clone()).or_default();
        check_unique(ns, coll, &docs)?;

        let count = docs.len();
        coll.extend(docs);
        debug!("Inserted {} documents into {}", count, ns);
        Ok(count)
    }

    async fn replace_one(&self, ns: &Namespace, filter: &Filter, doc: Value) -> Result<bool, StoreError> {
        document_id(ns, &doc)?;
        let mut guard = self.collections.write().await;
        let Some(coll) = guard.get_mut(ns) else {
            return Ok(false);
        };
        match coll.iter_mut().find(|d| filter.matches(d)) {
            Some(slot) => {
                *slot = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_one(&self, ns: &Namespace, filter: &Filter) -> Result<bool, StoreError> {
        let mut guard = self.collections.write().await;
        let Some(coll) = guard.get_mut(ns) else {
            return Ok(false);
        };
        match coll.iter().position(|d| filter.matches(d)) {
            Some(pos) => {
                coll.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_index(&self, ns: &Namespace, path: &str, order: SortOrder) -> Result<(), StoreError> {
        let mut guard = self.indexes.write().await;
        let specs = guard.entry(ns.clone()).or_default();
        if !specs.iter().any(|(p, o)| p == path && *o == order) {
            specs.push((path.to_string(), order));
        }
        Ok(())
    }

    async fn drop_database(&self, database: &str) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .retain(|ns, _| ns.database != database);
        self.indexes
            .write()
            .await
            .retain(|ns, _| ns.database != database);
        Ok(())
    }
}
