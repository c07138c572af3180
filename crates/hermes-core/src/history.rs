use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, Transfer};

/// Persistence seam for finished transfers.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn load(&self) -> CoreResult<Vec<Transfer>>;

    async fn save(&self, transfers: &[Transfer]) -> CoreResult<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryDocument {
    #[serde(default)]
    transfers: Vec<Transfer>,
}

/// `{ "transfers": [...] }` on disk. A missing or blank file is an empty history.
#[derive(Debug, Clone)]
pub struct JsonFileHistoryStore {
    path: PathBuf,
}

impl JsonFileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistoryStore for JsonFileHistoryStore {
    async fn load(&self) -> CoreResult<Vec<Transfer>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(CoreError::Persistence(format!(
                    "failed to read transfer history from {}: {err}",
                    self.path.display()
                )))
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let document: HistoryDocument = serde_json::from_str(&raw).map_err(|err| {
            CoreError::Persistence(format!(
                "failed to parse transfer history from {}: {err}",
                self.path.display()
            ))
        })?;
        Ok(document.transfers)
    }

    async fn save(&self, transfers: &[Transfer]) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|err| {
                    CoreError::Persistence(format!(
                        "failed to create history directory {}: {err}",
                        parent.display()
                    ))
                })?;
            }
        }

        let document = HistoryDocument {
            transfers: transfers.to_vec(),
        };
        let rendered = serde_json::to_string_pretty(&document)
            .map_err(|err| CoreError::Persistence(format!("failed to encode history: {err}")))?;
        tokio::fs::write(&self.path, rendered).await.map_err(|err| {
            CoreError::Persistence(format!(
                "failed to write transfer history to {}: {err}",
                self.path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TransferDirection, TransferStatus};

    #[tokio::test]
    async fn missing_and_blank_files_are_empty_history() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let store = JsonFileHistoryStore::new(dir.path().join("transfers.json"));
        assert!(store.load().await.expect("missing file").is_empty());

        std::fs::write(store.path(), "  \n").expect("write blank");
        assert!(store.load().await.expect("blank file").is_empty());

        std::fs::write(store.path(), "{}").expect("write empty object");
        assert!(store.load().await.expect("no transfers key").is_empty());
    }

    #[tokio::test]
    async fn saved_history_is_read_back() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let store = JsonFileHistoryStore::new(dir.path().join("nested").join("transfers.json"));
        let transfer = Transfer::new(TransferDirection::Send, "bob", "a.txt", 12)
            .with_status(TransferStatus::Completed);

        store
            .save(std::slice::from_ref(&transfer))
            .await
            .expect("save");
        let raw = std::fs::read_to_string(store.path()).expect("read raw");
        assert!(raw.contains("\"transfers\""));
        assert!(raw.contains("\"fileName\": \"a.txt\""));

        assert_eq!(store.load().await.expect("load"), vec![transfer]);
    }

    #[tokio::test]
    async fn corrupt_history_is_a_persistence_error() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let store = JsonFileHistoryStore::new(dir.path().join("transfers.json"));
        std::fs::write(store.path(), "{ nope").expect("write corrupt");

        let error = store.load().await.expect_err("corrupt");
        assert!(matches!(error, CoreError::Persistence(_)));
    }
}
