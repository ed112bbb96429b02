//! Card state persistence with file locking.
//!
//! All of a data directory's card states live in one JSON file. Readers take
//! a shared lock on the file; every write (including the whole
//! read-modify-write of [`CardStore::update`]) holds an exclusive lock on a
//! sidecar `.lock` file, so two ratings for the same card are applied one
//! after the other instead of racing.

use crate::{CardKey, CardRecord, CardState, Error, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const STORE_VERSION: u32 = 1;

/// Keyed storage of card states
pub trait CardStore {
    fn get(&self, key: &CardKey) -> Result<Option<CardRecord>>;

    /// Insert or overwrite a record
    fn put(&mut self, record: CardRecord) -> Result<()>;

    /// Insert a record unless one already exists; returns whether it was inserted
    fn insert(&mut self, record: CardRecord) -> Result<bool>;

    /// Delete a record; returns whether it existed
    fn remove(&mut self, key: &CardKey) -> Result<bool>;

    /// All records owned by `user_id`, optionally restricted to one deck
    fn cards_for(&self, user_id: &str, deck_id: Option<&str>) -> Result<Vec<CardRecord>>;

    /// Replace a record's state with `f(current)` without interleaving writers
    fn update<F>(&mut self, key: &CardKey, f: F) -> Result<CardRecord>
    where
        F: FnOnce(&CardRecord) -> Result<CardState>;
}

/// On-disk layout of the store file
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    cards: Vec<CardRecord>,
}

type Records = BTreeMap<CardKey, CardRecord>;

/// JSON file-backed card store
pub struct JsonCardStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonCardStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read records for a query
    ///
    /// A missing file is an empty store. An unreadable or corrupt file logs a
    /// warning and also reads as empty.
    fn load_lenient(&self) -> Result<Records> {
        match self.load_strict() {
            Ok(records) => Ok(records),
            Err(Error::Io(e)) if e.kind() != std::io::ErrorKind::NotFound => {
                tracing::warn!("Unable to read card store {:?}: {}. Using empty store.", self.path, e);
                Ok(Records::new())
            }
            Err(Error::Json(e)) => {
                tracing::warn!("Failed to parse card store {:?}: {}. Using empty store.", self.path, e);
                Ok(Records::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Read records before a write; corruption is an error so it is never overwritten
    fn load_strict(&self) -> Result<Records> {
        if !self.path.exists() {
            tracing::debug!("No card store at {:?}, starting empty", self.path);
            return Ok(Records::new());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        let store: StoreFile = serde_json::from_str(&contents)?;
        if store.version != STORE_VERSION {
            tracing::warn!(
                "Card store {:?} has version {}, expected {}",
                self.path,
                store.version,
                STORE_VERSION
            );
        }

        Ok(store
            .cards
            .into_iter()
            .map(|record| (record.key.clone(), record))
            .collect())
    }

    /// Atomically replace the store file (temp file, fsync, rename)
    fn save(&self, records: &Records) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "store path missing parent")
        })?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let store = StoreFile {
                version: STORE_VERSION,
                cards: records.values().cloned().collect(),
            };
            serde_json::to_writer(&mut writer, &store)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} card states to {:?}", records.len(), self.path);
        Ok(())
    }

    /// Run `f` under the exclusive writer lock
    fn with_write_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if let Some(parent) = self.lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        lock.lock_exclusive()?;

        let result = f();

        lock.unlock()?;
        result
    }
}

impl CardStore for JsonCardStore {
    fn get(&self, key: &CardKey) -> Result<Option<CardRecord>> {
        Ok(self.load_lenient()?.remove(key))
    }

    fn put(&mut self, record: CardRecord) -> Result<()> {
        self.with_write_lock(|| {
            let mut records = self.load_strict()?;
            tracing::info!("Storing card state for {}", record.key);
            records.insert(record.key.clone(), record);
            self.save(&records)
        })
    }

    fn insert(&mut self, record: CardRecord) -> Result<bool> {
        self.with_write_lock(|| {
            let mut records = self.load_strict()?;
            if records.contains_key(&record.key) {
                tracing::debug!("Card {} already stored, leaving it untouched", record.key);
                return Ok(false);
            }
            tracing::info!("Added card {}", record.key);
            records.insert(record.key.clone(), record);
            self.save(&records)?;
            Ok(true)
        })
    }

    fn remove(&mut self, key: &CardKey) -> Result<bool> {
        self.with_write_lock(|| {
            let mut records = self.load_strict()?;
            if records.remove(key).is_none() {
                return Ok(false);
            }
            self.save(&records)?;
            tracing::info!("Removed card {}", key);
            Ok(true)
        })
    }

    fn cards_for(&self, user_id: &str, deck_id: Option<&str>) -> Result<Vec<CardRecord>> {
        let records = self.load_lenient()?;
        let cards: Vec<CardRecord> = records
            .into_values()
            .filter(|record| record.key.user_id == user_id)
            .filter(|record| deck_id.map_or(true, |deck| record.deck_id.as_deref() == Some(deck)))
            .collect();

        tracing::debug!("Loaded {} cards for user {}", cards.len(), user_id);
        Ok(cards)
    }

    fn update<F>(&mut self, key: &CardKey, f: F) -> Result<CardRecord>
    where
        F: FnOnce(&CardRecord) -> Result<CardState>,
    {
        self.with_write_lock(|| {
            let mut records = self.load_strict()?;
            let record = records.get_mut(key).ok_or_else(|| Error::CardNotFound {
                user_id: key.user_id.clone(),
                card_id: key.card_id.clone(),
            })?;

            let next = f(&*record)?;
            record.state = next;
            let updated = record.clone();
            self.save(&records)?;
            Ok(updated)
        })
    }
}
