use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::error::{CompanionError, Result};
use super::memory::{AutonomousThought, ConversationTurn};
use super::mood::Mood;
use super::profile::UserProfile;
use super::relationship::{RelationshipMetrics, RelationshipStage};

/// The durable form of the companion's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default)]
    pub profile: UserProfile,
    #[serde(default)]
    pub mood: Mood,
    #[serde(default)]
    pub relationships: RelationshipMetrics,
    #[serde(default)]
    pub autonomous_thoughts: Vec<AutonomousThought>,
    pub last_updated: DateTime<Utc>,
}

/// JSON snapshot file with at most one write in flight.
///
/// Every write carries the sequence number it was taken at; the lock guards the
/// highest one committed so far.
pub struct SnapshotStore {
    path: PathBuf,
    write_lock: Mutex<u64>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. `Ok(None)` when the file does not exist yet.
    pub async fn read(&self) -> Result<Option<PersistedSnapshot>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot = serde_json::from_str(&content)?;
        Ok(Some(snapshot))
    }

    /// Replace the snapshot on disk with the one taken at `seq`.
    ///
    /// A snapshot older than the last committed one is skipped and `Ok(false)`
    /// returned. Writes go to a sibling temp file that is renamed over the
    /// target, so a crash mid-write leaves the previous snapshot intact.
    pub async fn write(&self, snapshot: &PersistedSnapshot, seq: u64) -> Result<bool> {
        let mut committed = self.write_lock.lock().await;
        if seq <= *committed {
            debug!(seq, committed = *committed, "Skipping stale snapshot");
            return Ok(false);
        }

        ensure_parent(&self.path).await?;

        let content = serde_json::to_string_pretty(snapshot)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| CompanionError::Persist(format!("{}: {}", self.path.display(), e)))?;

        *committed = seq;
        Ok(true)
    }
}

/// Context recorded next to each training example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub mood: Mood,
    pub relationship_stage: RelationshipStage,
    pub affection: f64,
    pub timestamp: DateTime<Utc>,
}

/// One (prompt, completion, metadata) line of the training log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub id: Uuid,
    pub prompt: String,
    pub completion: String,
    pub metadata: TrainingMetadata,
}

/// Append-only JSONL file. Entries are never rewritten or truncated.
pub struct TrainingLog {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl TrainingLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, example: &TrainingExample) -> Result<()> {
        let _guard = self.append_lock.lock().await;

        ensure_parent(&self.path).await?;

        let mut line = serde_json::to_string(example)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Read every entry back, skipping lines that fail to parse.
    pub async fn read_all(&self) -> Result<Vec<TrainingExample>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}
