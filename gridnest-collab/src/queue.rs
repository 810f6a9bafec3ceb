//! Single-lane write queue for the config document.
//!
//! All mutations go through one task that owns the read → modify → write →
//! broadcast cycle, so two patches can never both read the pre-patch
//! document. Jobs run strictly in submission order. A failed job still
//! replies to its caller and the lane moves on to the next one.
//!
//! ```text
//!  patch_prop ──┐
//!  patch_batch ─┼─► mpsc ─► lane task ─► load ─► mutate ─► save ─► broadcast
//!  reset ───────┘                                   │
//!                                       oneshot reply per job
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gridnest_core::ConfigDocument;
use tokio::sync::{mpsc, oneshot};

use crate::broadcast::BroadcastGroup;
use crate::error::StoreError;
use crate::protocol::BroadcastMessage;
use crate::storage::DocumentStore;

/// In-place edit of the current document.
pub type EditFn = Box<dyn FnOnce(&mut ConfigDocument) -> Result<(), StoreError> + Send>;

pub enum Mutation {
    /// Load the current document and edit it.
    Edit { label: String, edit: EditFn },
    /// Replace the document wholesale.
    Replace(ConfigDocument),
}

impl Mutation {
    fn label(&self) -> &str {
        match self {
            Mutation::Edit { label, .. } => label,
            Mutation::Replace(_) => "reset",
        }
    }
}

struct Job {
    mutation: Mutation,
    reply: oneshot::Sender<Result<ConfigDocument, StoreError>>,
}

/// Counters for committed and rejected writes.
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub committed: u64,
    pub rejected: u64,
}

struct AtomicQueueStats {
    committed: AtomicU64,
    rejected: AtomicU64,
}

/// Handle to the lane task. Cheap to clone.
#[derive(Clone)]
pub struct WriteQueue {
    tx: mpsc::Sender<Job>,
    stats: Arc<AtomicQueueStats>,
}

impl WriteQueue {
    /// Spawn the lane on the current runtime.
    pub fn spawn(store: DocumentStore, broadcast: Arc<BroadcastGroup>, depth: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Job>(depth.max(1));
        let stats = Arc::new(AtomicQueueStats {
            committed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        });

        let lane_stats = stats.clone();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let label = job.mutation.label().to_string();
                let result = run_job(&store, &broadcast, job.mutation).await;
                match &result {
                    Ok(_) => {
                        lane_stats.committed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        lane_stats.rejected.fetch_add(1, Ordering::Relaxed);
                        log::warn!("rejected {label}: {e}");
                    }
                }
                // The caller may have gone away; the write stands either way.
                let _ = job.reply.send(result);
            }
            log::debug!("write queue closed");
        });

        Self { tx, stats }
    }

    /// Enqueue a mutation and wait for its outcome.
    pub async fn submit(&self, mutation: Mutation) -> Result<ConfigDocument, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job { mutation, reply })
            .await
            .map_err(|_| StoreError::QueueClosed)?;
        rx.await.map_err(|_| StoreError::QueueClosed)?
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            committed: self.stats.committed.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
        }
    }
}

async fn run_job(
    store: &DocumentStore,
    broadcast: &BroadcastGroup,
    mutation: Mutation,
) -> Result<ConfigDocument, StoreError> {
    let doc = match mutation {
        Mutation::Edit { label, edit } => {
            let mut doc = store.load().await?;
            edit(&mut doc)?;
            store.save(&doc).await?;
            log::info!("updated {label}");
            doc
        }
        Mutation::Replace(doc) => {
            store.save(&doc).await?;
            log::info!("config document reset");
            doc
        }
    };

    match broadcast.broadcast(&BroadcastMessage::config_update(doc.clone())) {
        Ok(receivers) => log::debug!("config update sent to {receivers} subscribers"),
        // Already on disk; a failed push is repaired by the next fetch.
        Err(e) => log::error!("config update not broadcast: {e}"),
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreConfig;
    use gridnest_core::ComponentConfig;
    use serde_json::{json, Map};

    async fn setup() -> (tempfile::TempDir, WriteQueue, Arc<BroadcastGroup>) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(StoreConfig::for_testing(dir.path().join("cfg.json")));
        let doc = ConfigDocument::new("1.0")
            .with_component("g", ComponentConfig::new("Grid", Map::new()));
        store.save(&doc).await.unwrap();
        let broadcast = Arc::new(BroadcastGroup::new(16));
        let queue = WriteQueue::spawn(store, broadcast.clone(), 32);
        (dir, queue, broadcast)
    }

    fn set(key: &'static str, value: i64) -> Mutation {
        Mutation::Edit {
            label: key.to_string(),
            edit: Box::new(move |doc| {
                let component = doc
                    .component_mut("g")
                    .ok_or_else(|| StoreError::UnknownSurface("g".into()))?;
                component.props.insert(key.to_string(), json!(value));
                Ok(())
            }),
        }
    }

    #[tokio::test]
    async fn test_jobs_apply_in_order() {
        let (_dir, queue, _bc) = setup().await;
        let mut handles = Vec::new();
        for i in 0..20 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move { queue.submit(set("n", i)).await }));
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let last = queue.submit(set("done", 1)).await.unwrap();
        assert_eq!(last.component("g").unwrap().props["n"], json!(19));
        assert_eq!(queue.stats().committed, 21);
    }

    #[tokio::test]
    async fn test_failed_job_does_not_block_lane() {
        let (_dir, queue, _bc) = setup().await;
        let failing = Mutation::Edit {
            label: "bad".into(),
            edit: Box::new(|_| Err(StoreError::UnknownSurface("nope".into()))),
        };
        assert!(matches!(
            queue.submit(failing).await,
            Err(StoreError::UnknownSurface(_))
        ));
        assert!(queue.submit(set("a", 1)).await.is_ok());
        let stats = queue.stats();
        assert_eq!((stats.committed, stats.rejected), (1, 1));
    }

    #[tokio::test]
    async fn test_commit_broadcasts_full_document() {
        let (_dir, queue, broadcast) = setup().await;
        let mut rx = broadcast.subscribe();
        queue.submit(set("a", 7)).await.unwrap();
        let frame = rx.recv().await.unwrap();
        let config = BroadcastMessage::decode(&frame).unwrap().into_config().unwrap();
        assert_eq!(config.component("g").unwrap().props["a"], json!(7));
    }

    #[tokio::test]
    async fn test_rejected_job_does_not_broadcast() {
        let (_dir, queue, broadcast) = setup().await;
        let mut rx = broadcast.subscribe();
        let failing = Mutation::Edit {
            label: "bad".into(),
            edit: Box::new(|_| Err(StoreError::InvalidPatch("x".into()))),
        };
        let _ = queue.submit(failing).await;
        assert!(rx.try_recv().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timed_out_job_does_not_block_lane() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let status = std::process::Command::new("mkfifo").arg(&path).status().unwrap();
        assert!(status.success());
        let store = DocumentStore::new(StoreConfig {
            path: path.clone(),
            io_timeout: std::time::Duration::from_millis(200),
        });
        let queue = WriteQueue::spawn(store, Arc::new(BroadcastGroup::new(16)), 8);

        assert!(matches!(
            queue.submit(set("a", 1)).await,
            Err(StoreError::Timeout { op: "read", .. })
        ));

        // Unblock the stalled read, then put a real document in place.
        drop(std::fs::OpenOptions::new().write(true).open(&path).unwrap());
        std::fs::remove_file(&path).unwrap();
        let doc = ConfigDocument::new("1.0")
            .with_component("g", ComponentConfig::new("Grid", Map::new()));
        DocumentStore::new(StoreConfig::for_testing(&path))
            .save(&doc)
            .await
            .unwrap();

        let next = queue.submit(set("a", 2)).await.unwrap();
        assert_eq!(next.component("g").unwrap().props["a"], json!(2));
        let stats = queue.stats();
        assert_eq!((stats.committed, stats.rejected), (1, 1));
    }
}
