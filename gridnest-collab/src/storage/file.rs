//! JSON file backend.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gridnest_core::ConfigDocument;
use uuid::Uuid;

use crate::error::StoreError;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path of the config document
    pub path: PathBuf,
    /// Deadline for each read or write
    pub io_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".liveedit.config.json"),
            io_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    /// Config for tests: given path, short deadline.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_timeout: Duration::from_secs(2),
        }
    }
}

/// Reads and atomically rewrites the config document.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    config: StoreConfig,
}

impl DocumentStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn io_timeout(&self) -> Duration {
        self.config.io_timeout
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = std::io::Result<T>>,
    {
        match tokio::time::timeout(self.config.io_timeout, fut).await {
            Ok(result) => result.map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    StoreError::NotFound(self.config.path.display().to_string())
                }
                _ => StoreError::Io(e),
            }),
            Err(_) => Err(StoreError::Timeout {
                op,
                limit: self.config.io_timeout,
            }),
        }
    }

    /// File contents as stored.
    pub async fn load_raw(&self) -> Result<String, StoreError> {
        self.bounded("read", tokio::fs::read_to_string(&self.config.path))
            .await
    }

    pub async fn load(&self) -> Result<ConfigDocument, StoreError> {
        let raw = self.load_raw().await?;
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    /// Encode, verify the encoding parses back, then replace the file.
    /// Returns the text written.
    pub async fn save(&self, doc: &ConfigDocument) -> Result<String, StoreError> {
        let encoded = encode_checked(doc)?;

        let tmp = self.temp_path();
        self.bounded("write", tokio::fs::write(&tmp, encoded.as_bytes()))
            .await?;
        if let Err(e) = self.bounded("rename", tokio::fs::rename(&tmp, &self.config.path)).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }

        log::debug!("wrote {} bytes to {}", encoded.len(), self.config.path.display());
        Ok(encoded)
    }

    /// Sibling temp file, unique per write: an abandoned write that lands
    /// after its deadline cannot clobber a later one.
    fn temp_path(&self) -> PathBuf {
        let name = self
            .config
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string());
        self.config
            .path
            .with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()))
    }
}

/// Two-space JSON that is known to parse back into a document.
pub fn encode_checked(doc: &ConfigDocument) -> Result<String, StoreError> {
    let encoded = doc
        .to_pretty_json()
        .map_err(|e| StoreError::RoundTrip(e.to_string()))?;
    verify_round_trip(&encoded)?;
    Ok(encoded)
}

pub fn verify_round_trip(encoded: &str) -> Result<(), StoreError> {
    serde_json::from_str::<ConfigDocument>(encoded)
        .map(|_| ())
        .map_err(|e| StoreError::RoundTrip(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridnest_core::ComponentConfig;
    use serde_json::json;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn sample() -> ConfigDocument {
        let props = json!({"cols": 4, "layout": []}).as_object().cloned().unwrap();
        ConfigDocument::new("1.0").with_component("main-grid", ComponentConfig::new("Grid", props))
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(StoreConfig::for_testing(dir.path().join("cfg.json")));

        let written = store.save(&sample()).await.unwrap();
        assert!(written.contains("\n  \"schema\""));
        assert_eq!(store.load().await.unwrap(), sample());
        assert_eq!(store.load_raw().await.unwrap(), written);
        assert_eq!(entries(dir.path()), vec!["cfg.json"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(StoreConfig::for_testing(dir.path().join("absent.json")));
        assert!(matches!(store.load().await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, "{ nope").unwrap();
        let store = DocumentStore::new(StoreConfig::for_testing(path));
        assert!(matches!(store.load().await, Err(StoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        // A non-empty directory in the document's place makes the rename fail.
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();
        let store = DocumentStore::new(StoreConfig::for_testing(&path));

        assert!(matches!(store.save(&sample()).await, Err(StoreError::Io(_))));
        assert_eq!(entries(dir.path()), vec!["cfg.json"]);
        assert!(path.join("keep").exists());
    }

    #[tokio::test]
    async fn test_writes_use_distinct_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(StoreConfig::for_testing(dir.path().join("cfg.json")));
        let first = store.temp_path();
        let second = store.temp_path();
        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(dir.path()));
        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".cfg.json.") && name.ends_with(".tmp"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stalled_read_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        // Opening a FIFO for reading blocks until a writer shows up.
        let status = std::process::Command::new("mkfifo").arg(&path).status().unwrap();
        assert!(status.success());
        let store = DocumentStore::new(StoreConfig {
            path: path.clone(),
            io_timeout: Duration::from_millis(50),
        });

        match store.load().await {
            Err(StoreError::Timeout { op, limit }) => {
                assert_eq!(op, "read");
                assert_eq!(limit, Duration::from_millis(50));
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        // Release the abandoned reader.
        drop(std::fs::OpenOptions::new().write(true).open(&path).unwrap());
    }

    #[test]
    fn test_round_trip_guard() {
        assert!(verify_round_trip(&encode_checked(&sample()).unwrap()).is_ok());
        assert!(matches!(
            verify_round_trip("{\"components\": 3}"),
            Err(StoreError::RoundTrip(_))
        ));
    }
}
