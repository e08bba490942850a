use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::config::{RankStorageType, RanksConfig};
use crate::error::PersistenceError;
use crate::game_logic::Rank;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoredRank {
    pub quiz_id: String,
    pub rank: Rank,
}

/// Durable `quiz id -> rank` storage read by the quiz list page. One value per quiz,
/// last write wins.
#[async_trait]
pub trait RankStore: Send + Sync {
    async fn save_rank(&self, quiz_id: &str, rank: Rank) -> Result<(), PersistenceError>;

    async fn load_rank(&self, quiz_id: &str) -> Result<Option<Rank>, PersistenceError>;

    async fn all_ranks(&self) -> Result<Vec<StoredRank>, PersistenceError>;
}

pub fn build_rank_store(config: &RanksConfig) -> Arc<dyn RankStore> {
    match config.storage {
        RankStorageType::File => Arc::new(JsonFileRankStore::new(
            PathBuf::from(&config.file_path),
            config.key_prefix.clone(),
        )),
        RankStorageType::Memory => Arc::new(MemoryRankStore::new(config.key_prefix.clone())),
    }
}

fn strip_keys(prefix: &str, entries: &BTreeMap<String, Rank>) -> Vec<StoredRank> {
    entries
        .iter()
        .filter_map(|(key, rank)| {
            key.strip_prefix(prefix).map(|quiz_id| StoredRank {
                quiz_id: quiz_id.to_string(),
                rank: *rank,
            })
        })
        .collect()
}

/// Keeps every rank in one JSON object on disk, e.g. `{"quizRank_M1-1": "A"}`.
pub struct JsonFileRankStore {
    path: PathBuf,
    key_prefix: String,
    write_lock: Mutex<()>,
}

impl JsonFileRankStore {
    pub fn new(path: PathBuf, key_prefix: String) -> Self {
        Self {
            path,
            key_prefix,
            write_lock: Mutex::new(()),
        }
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    async fn read_entries(&self) -> Result<BTreeMap<String, Rank>, PersistenceError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

#[async_trait]
impl RankStore for JsonFileRankStore {
    #[tracing::instrument(skip(self))]
    async fn save_rank(&self, quiz_id: &str, rank: Rank) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.read_entries().await?;
        entries.insert(format!("{}{}", self.key_prefix, quiz_id), rank);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        // Write to a sibling file first so a crash never leaves half a document behind.
        let tmp_path = self.path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(&entries)?;
        tokio::fs::write(&tmp_path, body)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::debug!(quiz.id = %quiz_id, rank = %rank, "Rank saved");
        Ok(())
    }

    async fn load_rank(&self, quiz_id: &str) -> Result<Option<Rank>, PersistenceError> {
        let entries = self.read_entries().await?;
        Ok(entries
            .get(&format!("{}{}", self.key_prefix, quiz_id))
            .copied())
    }

    async fn all_ranks(&self) -> Result<Vec<StoredRank>, PersistenceError> {
        let entries = self.read_entries().await?;
        Ok(strip_keys(&self.key_prefix, &entries))
    }
}

/// In-process store; ranks are lost on restart.
pub struct MemoryRankStore {
    key_prefix: String,
    entries: RwLock<BTreeMap<String, Rank>>,
    writes: RwLock<Vec<(String, Rank)>>,
}

impl MemoryRankStore {
    pub fn new(key_prefix: String) -> Self {
        Self {
            key_prefix,
            entries: RwLock::new(BTreeMap::new()),
            writes: RwLock::new(Vec::new()),
        }
    }

    /// Every write in order, keyed by the full storage key.
    pub async fn write_log(&self) -> Vec<(String, Rank)> {
        self.writes.read().await.clone()
    }
}

#[async_trait]
impl RankStore for MemoryRankStore {
    async fn save_rank(&self, quiz_id: &str, rank: Rank) -> Result<(), PersistenceError> {
        let key = format!("{}{}", self.key_prefix, quiz_id);
        self.entries.write().await.insert(key.clone(), rank);
        self.writes.write().await.push((key, rank));
        Ok(())
    }

    async fn load_rank(&self, quiz_id: &str) -> Result<Option<Rank>, PersistenceError> {
        let key = format!("{}{}", self.key_prefix, quiz_id);
        Ok(self.entries.read().await.get(&key).copied())
    }

    async fn all_ranks(&self) -> Result<Vec<StoredRank>, PersistenceError> {
        Ok(strip_keys(&self.key_prefix, &*self.entries.read().await))
    }
}
