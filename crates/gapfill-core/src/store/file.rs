//! Local JSON-backed store.
//!
//! The document is `{"rows": [["", "Timestamp", "Delta", ...], ...]}` holding
//! cells as entered. Evaluation is delegated to [`MemoryStore`]; every accepted
//! write is persisted with a write-to-temp-then-rename so a crash never leaves
//! a truncated document behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::memory::{Checkpoint, MemoryStore};
use super::{InputMode, TabularStore};
use crate::columns::RangeSpec;
use crate::error::StoreError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    rows: Vec<Vec<String>>,
}

/// Store persisted as a JSON document on disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    memory: MemoryStore,
}

impl FileStore {
    /// Open an existing document.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Connection(format!("{}: {e}", path.display())))?;
        let document: Document = serde_json::from_str(&content)
            .map_err(|e| StoreError::InvalidResponse(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), rows = document.rows.len(), "Opened file store");
        Ok(Self {
            path: path.to_path_buf(),
            memory: MemoryStore::from_rows(document.rows),
        })
    }

    /// Cells as entered, as they are persisted.
    #[must_use]
    pub fn raw_rows(&self) -> Vec<Vec<String>> {
        self.memory.raw_rows()
    }

    /// Persist the last write, undoing it in memory when the disk rejects it.
    fn commit(&self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        self.persist().inspect_err(|err| {
            tracing::warn!(path = %self.path.display(), error = %err, "Persist failed; write undone");
            self.memory.restore(checkpoint);
        })
    }

    fn persist(&self) -> Result<(), StoreError> {
        let document = Document {
            rows: self.memory.raw_rows(),
        };
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| StoreError::Io(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json).map_err(|e| StoreError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::Io(e.to_string()))
    }
}

#[async_trait]
impl TabularStore for FileStore {
    async fn read_all(&self) -> Result<Vec<Vec<String>>, StoreError> {
        self.memory.read_all().await
    }

    async fn insert_row(
        &self,
        values: &[String],
        position: usize,
        mode: InputMode,
    ) -> Result<(), StoreError> {
        let checkpoint = self.memory.checkpoint();
        self.memory.insert_row(values, position, mode).await?;
        self.commit(checkpoint)
    }

    async fn update_cell(
        &self,
        position: usize,
        column: u32,
        value: &str,
    ) -> Result<(), StoreError> {
        let checkpoint = self.memory.checkpoint();
        self.memory.update_cell(position, column, value).await?;
        self.commit(checkpoint)
    }

    async fn update_range(
        &self,
        range: &RangeSpec,
        values: &[Vec<String>],
        mode: InputMode,
    ) -> Result<(), StoreError> {
        let checkpoint = self.memory.checkpoint();
        self.memory.update_range(range, values, mode).await?;
        self.commit(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_doc(dir: &Path, rows: serde_json::Value) -> PathBuf {
        let path = dir.join("log.json");
        std::fs::write(&path, serde_json::json!({ "rows": rows }).to_string()).unwrap();
        path
    }

    #[tokio::test]
    async fn writes_are_persisted_as_entered() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(
            dir.path(),
            serde_json::json!([
                ["", "Timestamp", "Delta"],
                ["", "2025-06-22 09:00:00", ""],
                ["", "2025-06-22 11:00:00", "=IF(ISDATE(B3),ROUND((B3-B2)*24,2),)"]
            ]),
        );

        let store = FileStore::open(&path).unwrap();
        store
            .insert_row(
                &[
                    String::new(),
                    "=DATE(2025,6,22)+TIME(10,0,0)".into(),
                    "=IF(ISDATE(B3),ROUND((B3-B2)*24,2),)".into(),
                ],
                3,
                InputMode::UserEntered,
            )
            .await
            .unwrap();

        let reopened = FileStore::open(&path).unwrap();
        let raw = reopened.raw_rows();
        assert_eq!(raw.len(), 4);
        assert_eq!(raw[2][1], "=DATE(2025,6,22)+TIME(10,0,0)");
        assert_eq!(raw[3][2], "=IF(ISDATE(B4),ROUND((B4-B3)*24,2),)");

        let shown = reopened.read_all().await.unwrap();
        assert_eq!(shown[2][1], "2025-06-22 10:00:00");
        assert_eq!(shown[3][2], "1");
        assert!(!dir.path().join("log.json.tmp").exists());
    }

    #[tokio::test]
    async fn failed_persist_leaves_the_log_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(
            dir.path(),
            serde_json::json!([
                ["", "Timestamp", "Delta"],
                ["", "2025-06-22 09:00:00", ""],
                ["", "2025-06-22 11:00:00", "=IF(ISDATE(B3),ROUND((B3-B2)*24,2),)"]
            ]),
        );
        let store = FileStore::open(&path).unwrap();
        let before = store.raw_rows();
        // a directory where the temp file should go makes the write fail
        std::fs::create_dir(dir.path().join("log.json.tmp")).unwrap();

        let err = store
            .insert_row(
                &[String::new(), "=DATE(2025,6,22)+TIME(10,0,0)".into()],
                3,
                InputMode::UserEntered,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(store.raw_rows(), before);
        assert_eq!(FileStore::open(&path).unwrap().raw_rows(), before);

        // once the disk recovers, the same insert lands at the same position
        std::fs::remove_dir(dir.path().join("log.json.tmp")).unwrap();
        store
            .insert_row(
                &[String::new(), "=DATE(2025,6,22)+TIME(10,0,0)".into()],
                3,
                InputMode::UserEntered,
            )
            .await
            .unwrap();
        let shown = store.read_all().await.unwrap();
        assert_eq!(shown[2][1], "2025-06-22 10:00:00");
        assert_eq!(shown[3][1], "2025-06-22 11:00:00");
    }

    #[test]
    fn missing_file_is_a_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileStore::open(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));
    }

    #[test]
    fn malformed_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        std::fs::write(&path, "{\"rows\": 7}").unwrap();
        assert!(matches!(
            FileStore::open(&path),
            Err(StoreError::InvalidResponse(_))
        ));
    }
}
