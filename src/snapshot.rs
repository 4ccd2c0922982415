//! Snapshot Repository: single-file JSON persistence with atomic write-temp/fsync/rename.
//!
//! Durable writes are isolated behind a small repository type backed by the filesystem, since
//! the runtime owns no database.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::game::GameRecord;
use crate::domain::lobby::LobbyRecord;
use crate::domain::session::SessionRecord;

const SCHEMA: &str = "fun-euchre.runtime.snapshot";
const LOG_TARGET: &str = "snapshot";

#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema: String,
    pub version: u32,
    pub generated_at_ms: u64,
    pub lobby_records: Vec<LobbyRecord>,
    pub game_records: Vec<GameRecord>,
    pub session_records: Vec<SessionRecord>,
}

impl Snapshot {
    pub fn new(
        generated_at_ms: u64,
        lobby_records: Vec<LobbyRecord>,
        game_records: Vec<GameRecord>,
        session_records: Vec<SessionRecord>,
    ) -> Self {
        Self {
            schema: SCHEMA.to_string(),
            version: 1,
            generated_at_ms,
            lobby_records,
            game_records,
            session_records,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct SnapshotRepository {
    path: PathBuf,
}

impl SnapshotRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Writes the snapshot atomically: serialize to a sibling temp file, fsync it, then rename
    /// over the target path (rename is atomic on the same filesystem).
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp_path = self.tmp_path();

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp_path, &self.path).await?;
        tracing::info!(
            target = LOG_TARGET,
            path = %self.path.display(),
            bytes = bytes.len(),
            "snapshot written"
        );
        Ok(())
    }

    pub async fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone();
        let file_name = tmp
            .file_name()
            .map(|name| format!("{}.tmp", name.to_string_lossy()))
            .unwrap_or_else(|| "snapshot.tmp".to_string());
        tmp.set_file_name(file_name);
        tmp
    }
}

/// Normalizes every restored session to disconnected with a fresh reconnect deadline, since no
/// socket survives a process restart.
pub fn normalize_restored_sessions(
    mut sessions: Vec<SessionRecord>,
    now_ms: u64,
    reconnect_grace_ms: u64,
) -> Vec<SessionRecord> {
    for session in &mut sessions {
        session.mark_disconnected(now_ms, reconnect_grace_ms);
    }
    sessions
}

pub fn default_persistence_path() -> PathBuf {
    Path::new("fun-euchre-snapshot.json").to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("fun-euchre-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("snapshot.json");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let repo = SnapshotRepository::new(&path);

        let snapshot = Snapshot::new(123, vec![], vec![], vec![]);
        repo.save(&snapshot).await.unwrap();

        let loaded = repo.load().await.unwrap().unwrap();
        assert_eq!(loaded.generated_at_ms, 123);
        assert_eq!(loaded.schema, SCHEMA);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn load_missing_file_returns_none() {
        let repo = SnapshotRepository::new("/nonexistent/path/snapshot.json");
        assert!(repo.load().await.unwrap().is_none());
    }
}
