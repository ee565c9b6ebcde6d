#![doc = include_str!("../README.md")]

mod users;

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub use users::{hash_password, verify_password, SeedService, User};

/// Directory under the server root holding one file per entity type.
pub const DATABASE_DIR: &str = "Database";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file is corrupt: {0}")]
    Corrupt(String),

    #[error("no entity with id {0}")]
    NotFound(i64),
}

/// A persistable domain entity.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The file stem under the `Database` directory.
    const COLLECTION: &'static str;

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
}

/// A file-backed store of one entity type.
///
/// Records are `u32`-length-prefixed bincode documents. The full record
/// set lives in memory; every mutation rewrites the file. Access is
/// serialized by an internal lock, which is the entirety of the store's
/// concurrency story.
pub struct FileStore<T: Entity> {
    path: PathBuf,
    records: Mutex<Vec<T>>,
    _marker: PhantomData<T>,
}

impl<T: Entity> FileStore<T> {
    /// Opens (or creates) the store under `root/Database`.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        let dir = root.join(DATABASE_DIR);
        fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}.db", T::COLLECTION));
        let records = if path.exists() {
            Self::read_records(&path)?
        } else {
            Vec::new()
        };

        info!(
            collection = T::COLLECTION,
            records = records.len(),
            "entity store opened"
        );

        Ok(Self {
            path,
            records: Mutex::new(records),
            _marker: PhantomData,
        })
    }

    fn read_records(path: &Path) -> Result<Vec<T>, StoreError> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        let mut len_buf = [0u8; 4];

        loop {
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            let mut record = vec![0u8; len];
            reader.read_exact(&mut record).map_err(|_| {
                StoreError::Corrupt(format!("record truncated at {len} bytes"))
            })?;

            records.push(
                bincode::deserialize(&record)
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            );
        }

        Ok(records)
    }

    fn write_records(&self, records: &[T]) -> Result<(), StoreError> {
        let mut writer = BufWriter::new(
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&self.path)?,
        );

        for record in records {
            let bytes =
                bincode::serialize(record).map_err(|e| StoreError::Corrupt(e.to_string()))?;
            writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
            writer.write_all(&bytes)?;
        }

        writer.flush()?;
        Ok(())
    }

    pub fn get_all(&self) -> Vec<T> {
        self.records.lock().clone()
    }

    pub fn get_by_id(&self, id: i64) -> Option<T> {
        self.records.lock().iter().find(|r| r.id() == id).cloned()
    }

    /// Inserts an entity, assigning the next id when the entity carries a
    /// non-positive one. Returns the stored form.
    pub fn insert(&self, mut entity: T) -> Result<T, StoreError> {
        let mut records = self.records.lock();

        if entity.id() <= 0 {
            let next = records.iter().map(Entity::id).max().unwrap_or(0) + 1;
            entity.set_id(next);
        }

        records.push(entity.clone());
        self.write_records(&records)?;

        debug!(collection = T::COLLECTION, id = entity.id(), "entity inserted");
        Ok(entity)
    }

    pub fn update(&self, entity: T) -> Result<(), StoreError> {
        let mut records = self.records.lock();

        let slot = records
            .iter_mut()
            .find(|r| r.id() == entity.id())
            .ok_or(StoreError::NotFound(entity.id()))?;
        *slot = entity;

        self.write_records(&records)
    }

    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut records = self.records.lock();

        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() == before {
            return Err(StoreError::NotFound(id));
        }

        self.write_records(&records)
    }

    pub fn count(&self) -> usize {
        self.records.lock().len()
    }

    /// All entities matching a predicate, in insertion order.
    pub fn search(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.records
            .lock()
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    use super::*;

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    struct Widget {
        id: i64,
        name: String,
    }

    impl Entity for Widget {
        const COLLECTION: &'static str = "widgets";

        fn id(&self) -> i64 {
            self.id
        }

        fn set_id(&mut self, id: i64) {
            self.id = id;
        }
    }

    fn widget(name: &str) -> Widget {
        Widget { id: 0, name: name.into() }
    }

    #[test]
    fn crud_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::<Widget>::open(dir.path()).unwrap();

        let a = store.insert(widget("a")).unwrap();
        let b = store.insert(widget("b")).unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(store.count(), 2);

        store
            .update(Widget { id: 1, name: "a2".into() })
            .unwrap();
        assert_eq!(store.get_by_id(1).unwrap().name, "a2");

        store.delete(2).unwrap();
        assert!(matches!(store.delete(2), Err(StoreError::NotFound(2))));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = FileStore::<Widget>::open(dir.path()).unwrap();
            store.insert(widget("persisted")).unwrap();
        }

        let reopened = FileStore::<Widget>::open(dir.path()).unwrap();
        assert_eq!(reopened.count(), 1);
        assert_eq!(reopened.get_by_id(1).unwrap().name, "persisted");
    }

    #[test]
    fn search_filters_by_predicate() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::<Widget>::open(dir.path()).unwrap();

        store.insert(widget("apple")).unwrap();
        store.insert(widget("banana")).unwrap();
        store.insert(widget("avocado")).unwrap();

        let hits = store.search(|w| w.name.starts_with('a'));
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn truncated_files_are_reported_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::<Widget>::open(dir.path()).unwrap();
            store.insert(widget("x")).unwrap();
        }

        let path = dir.path().join(DATABASE_DIR).join("widgets.db");
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();

        assert!(matches!(
            FileStore::<Widget>::open(dir.path()),
            Err(StoreError::Corrupt(_))
        ));
    }
}
