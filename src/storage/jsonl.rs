//! JSONL (JSON Lines) document store.
//!
//! Each collection is one file at `<root>/<database>/<collection>.jsonl`
//! with one document per line. Replace and delete rewrite the whole file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::memory::check_unique;
use super::query::apply_options;
use super::{document_id, DocumentStore, Filter, FindOptions, Namespace, SortOrder, StoreError};

/// Writes typed records as JSON lines.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    fn write_lines(&self, file: File, docs: &[T]) -> Result<usize, StoreError> {
        let mut writer = BufWriter::new(file);
        for doc in docs {
            serde_json::to_writer(&mut writer, doc)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(docs.len())
    }

    fn open(&self, append: bool) -> Result<File, StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&self.path)?;
        Ok(file)
    }

    /// Append records. An empty slice leaves the file untouched.
    pub fn append_batch(&self, docs: &[T]) -> Result<usize, StoreError> {
        if docs.is_empty() {
            return Ok(0);
        }
        let count = self.write_lines(self.open(true)?, docs)?;
        debug!("Appended {} lines to {:?}", count, self.path);
        Ok(count)
    }

    /// Replace the file's contents with `docs`.
    pub fn write_all(&self, docs: &[T]) -> Result<usize, StoreError> {
        let count = self.write_lines(self.open(false)?, docs)?;
        debug!("Rewrote {:?} with {} lines", self.path, count);
        Ok(count)
    }
}

/// Reads typed records from JSON lines.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Every record in the file. A missing file is empty. An unparseable
    /// line fails the whole read, so a rewrite never drops it.
    pub fn read_all(&self) -> Result<Vec<T>, StoreError> {
        if !self.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut docs = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let doc = serde_json::from_str(&line).map_err(|source| StoreError::CorruptLine {
                path: self.path.clone(),
                line: idx + 1,
                source,
            })?;
            docs.push(doc);
        }
        Ok(docs)
    }
}

/// Recorded index spec, one per line in `<collection>.indexes.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub path: String,
    pub descending: bool,
}

/// File-backed document store.
#[derive(Debug)]
pub struct JsonlStore {
    root: PathBuf,
    lock: Mutex<()>,
}

fn valid_segment(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\'])
}

impl JsonlStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn database_dir(&self, database: &str) -> Result<PathBuf, StoreError> {
        if !valid_segment(database) {
            return Err(StoreError::InvalidNamespace(database.to_string()));
        }
        Ok(self.root.join(database))
    }

    /// Path of a collection file.
    pub fn collection_path(&self, ns: &Namespace) -> Result<PathBuf, StoreError> {
        if !valid_segment(&ns.collection) {
            return Err(StoreError::InvalidNamespace(ns.to_string()));
        }
        Ok(self
            .database_dir(&ns.database)?
            .join(format!("{}.jsonl", ns.collection)))
    }

    fn index_path(&self, ns: &Namespace) -> Result<PathBuf, StoreError> {
        Ok(self
            .database_dir(&ns.database)?
            .join(format!("{}.indexes.jsonl", ns.collection)))
    }

    fn load(&self, ns: &Namespace) -> Result<Vec<Value>, StoreError> {
        JsonlReader::new(self.collection_path(ns)?).read_all()
    }

    fn save(&self, ns: &Namespace, docs: &[Value]) -> Result<(), StoreError> {
        JsonlWriter::new(self.collection_path(ns)?).write_all(docs)?;
        Ok(())
    }

    /// Index specs recorded for a collection.
    pub fn indexes(&self, ns: &Namespace) -> Result<Vec<IndexSpec>, StoreError> {
        JsonlReader::new(self.index_path(ns)?).read_all()
    }
}

#[async_trait]
impl DocumentStore for JsonlStore {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    async fn find(
        &self,
        ns: &Namespace,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError> {
        let _guard = self.lock.lock().await;
        let docs = self
            .load(ns)?
            .into_iter()
            .filter(|d| filter.matches(d))
            .collect();
        Ok(apply_options(docs, options))
    }

    async fn count(&self, ns: &Namespace, filter: &Filter) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load(ns)?.iter().filter(|d| filter.matches(d)).count())
    }

    async fn insert_many(&self, ns: &Namespace, docs: Vec<Value>) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let existing = self.load(ns)?;
        check_unique(ns, &existing, &docs)?;

        let count = JsonlWriter::new(self.collection_path(ns)?).append_batch(&docs)?;
        info!("Inserted {} documents into {}", count, ns);
        Ok(count)
    }

    async fn replace_one(&self, ns: &Namespace, filter: &Filter, doc: Value) -> Result<bool, StoreError> {
        document_id(ns, &doc)?;
        let _guard = self.lock.lock().await;
        let mut docs = self.load(ns)?;
        let Some(slot) = docs.iter_mut().find(|d| filter.matches(d)) else {
            return Ok(false);
        };
        *slot = doc;
        self.save(ns, &docs)?;
        Ok(true)
    }

    async fn delete_one(&self, ns: &Namespace, filter: &Filter) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut docs = self.load(ns)?;
        let Some(pos) = docs.iter().position(|d| filter.matches(d)) else {
            return Ok(false);
        };
        docs.remove(pos);
        self.save(ns, &docs)?;
        Ok(true)
    }

    async fn create_index(&self, ns: &Namespace, path: &str, order: SortOrder) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let spec = IndexSpec {
            path: path.to_string(),
            descending: order == SortOrder::Descending,
        };
        let index_path = self.index_path(ns)?;
        if JsonlReader::<IndexSpec>::new(index_path.clone())
            .read_all()?
            .contains(&spec)
        {
            return Ok(());
        }
        JsonlWriter::new(index_path).append_batch(&[spec])?;
        debug!("Created index on {} ({})", ns, path);
        Ok(())
    }

    async fn drop_database(&self, database: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let dir = self.database_dir(database)?;
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            info!("Dropped database {:?}", dir);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestEntity {
        id: String,
        value: u32,
    }

    fn ns() -> Namespace {
        Namespace::new("players_and_teams", "players")
    }

    #[test]
    fn test_jsonl_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.jsonl");

        let entities = vec![
            TestEntity {
                id: "1".to_string(),
                value: 100,
            },
            TestEntity {
                id: "2".to_string(),
                value: 200,
            },
        ];

        let writer: JsonlWriter<TestEntity> = JsonlWriter::new(path.clone());
        assert_eq!(writer.write_all(&entities).unwrap(), 2);

        let reader: JsonlReader<TestEntity> = JsonlReader::new(path);
        assert_eq!(reader.read_all().unwrap(), entities);
    }

    #[test]
    fn test_read_all_skips_blank_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blank_lines.jsonl");

        std::fs::write(&path, "{\"id\":\"1\",\"value\":1}\n\n{\"id\":\"2\",\"value\":2}\n").unwrap();

        let reader: JsonlReader<TestEntity> = JsonlReader::new(path);
        let entities = reader.read_all().unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[1].id, "2");
    }

    #[test]
    fn test_read_all_rejects_bad_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad_lines.jsonl");

        std::fs::write(&path, "{\"id\":\"1\",\"value\":1}\nnot-valid-json\n").unwrap();

        let reader: JsonlReader<TestEntity> = JsonlReader::new(path);
        let err = reader.read_all().unwrap_err();
        assert!(matches!(err, StoreError::CorruptLine { line: 2, .. }));
    }

    #[tokio::test]
    async fn test_corrupt_collection_is_never_rewritten() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlStore::new(temp_dir.path());
        let teams = Namespace::new("players_and_teams", "teams");
        store
            .insert_many(
                &teams,
                vec![json!({"_id": "Alpha", "v": 1}), json!({"_id": "Beta", "v": 2})],
            )
            .await
            .unwrap();

        let path = store.collection_path(&teams).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let truncated = contents.replace("{\"_id\":\"Beta\",\"v\":2}", "{\"_id\":\"Be");
        assert_ne!(truncated, contents);
        std::fs::write(&path, &truncated).unwrap();

        assert!(matches!(
            store.count(&teams, &Filter::All).await,
            Err(StoreError::CorruptLine { line: 2, .. })
        ));
        let err = store
            .replace_one(&teams, &Filter::id("Alpha"), json!({"_id": "Alpha", "v": 10}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CorruptLine { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), truncated);
    }

    #[test]
    fn test_append_batch_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty_batch.jsonl");

        let writer: JsonlWriter<TestEntity> = JsonlWriter::new(path.clone());
        assert_eq!(writer.append_batch(&[]).unwrap(), 0);
        assert!(!JsonlReader::<TestEntity>::new(path).exists());
    }

    #[test]
    fn test_collection_path_layout() {
        let store = JsonlStore::new("/data");
        let path = store.collection_path(&ns()).unwrap();
        assert_eq!(path, PathBuf::from("/data/players_and_teams/players.jsonl"));
    }

    #[test]
    fn test_rejects_path_like_names() {
        let store = JsonlStore::new("/data");
        assert!(store
            .collection_path(&Namespace::new("mappools", "../escape"))
            .is_err());
        assert!(store.collection_path(&Namespace::new("", "x")).is_err());
    }

    #[tokio::test]
    async fn test_store_persists_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = JsonlStore::new(temp_dir.path());
            store
                .insert_many(&ns(), vec![json!({"_id": "1", "v": 1}), json!({"_id": "2", "v": 2})])
                .await
                .unwrap();
            store
                .replace_one(&ns(), &Filter::id("1"), json!({"_id": "1", "v": 10}))
                .await
                .unwrap();
        }

        let store = JsonlStore::new(temp_dir.path());
        let docs = store
            .find(
                &ns(),
                &Filter::All,
                &FindOptions::default().sort_by("v", SortOrder::Descending),
            )
            .await
            .unwrap();
        assert_eq!(docs[0]["_id"], "1");
        assert_eq!(docs[0]["v"], 10);
    }

    #[tokio::test]
    async fn test_store_duplicate_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlStore::new(temp_dir.path());
        store.insert_one(&ns(), json!({"_id": "1"})).await.unwrap();

        let err = store.insert_one(&ns(), json!({"_id": "1"})).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert_eq!(store.count(&ns(), &Filter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_delete_and_drop() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlStore::new(temp_dir.path());
        store
            .insert_many(&ns(), vec![json!({"_id": "1"}), json!({"_id": "2"})])
            .await
            .unwrap();

        assert!(store.delete_one(&ns(), &Filter::id("1")).await.unwrap());
        assert_eq!(store.count(&ns(), &Filter::All).await.unwrap(), 1);

        store.drop_database("players_and_teams").await.unwrap();
        assert_eq!(store.count(&ns(), &Filter::All).await.unwrap(), 0);
        assert!(!temp_dir.path().join("players_and_teams").exists());
    }

    #[tokio::test]
    async fn test_store_create_index_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlStore::new(temp_dir.path());
        let scores = Namespace::new("matches_and_scores", "scores");

        store.create_index(&scores, "score", SortOrder::Descending).await.unwrap();
        store.create_index(&scores, "score", SortOrder::Descending).await.unwrap();

        let specs = store.indexes(&scores).unwrap();
        assert_eq!(
            specs,
            vec![IndexSpec {
                path: "score".to_string(),
                descending: true
            }]
        );
    }
}
