//! The config store: validated patch, batch and reset operations over the
//! persisted document, executed through the [`WriteQueue`].

use std::sync::Arc;

use gridnest_core::tree::check_unique_ids;
use gridnest_core::{ConfigDocument, LayoutItem};
use serde_json::{Map, Value};

use crate::broadcast::BroadcastGroup;
use crate::error::StoreError;
use crate::queue::{Mutation, QueueStats, WriteQueue};
use crate::storage::{DocumentStore, StoreConfig};

/// Clamp range of `rows` and `cols`.
pub const GRID_COUNT_RANGE: (i64, i64) = (1, 20);
/// Clamp range of `gap`.
pub const GAP_RANGE: (i64, i64) = (0, 50);

const QUEUE_DEPTH: usize = 1024;

/// Integer value of a numeric prop: JSON numbers are truncated, strings
/// are read like a leading-integer parse (`"12px"` is 12).
fn integer_value(prop: &str, value: &Value) -> Result<i64, StoreError> {
    let invalid = || StoreError::InvalidPatch(format!("{prop} must be numeric, got {value}"));
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .ok_or_else(invalid),
        Value::String(s) => {
            let s = s.trim_start();
            let (sign, digits) = match s.strip_prefix('-') {
                Some(rest) => (-1, rest),
                None => (1, s.strip_prefix('+').unwrap_or(s)),
            };
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            digits[..end]
                .parse::<i64>()
                .map(|n| sign * n)
                .map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}

/// Normalise one incoming prop value. `rows`/`cols` and `gap` are clamped,
/// `layout` must be a well-formed item list, everything else passes through.
pub fn sanitize_prop(prop: &str, value: Value) -> Result<Value, StoreError> {
    match prop {
        "rows" | "cols" => {
            let (lo, hi) = GRID_COUNT_RANGE;
            Ok(Value::from(integer_value(prop, &value)?.clamp(lo, hi)))
        }
        "gap" => {
            let (lo, hi) = GAP_RANGE;
            Ok(Value::from(integer_value(prop, &value)?.clamp(lo, hi)))
        }
        "layout" => {
            let items: Vec<LayoutItem> = serde_json::from_value(value.clone())
                .map_err(|e| StoreError::InvalidPatch(format!("layout: {e}")))?;
            check_unique_ids(&items).map_err(|e| StoreError::InvalidPatch(format!("layout: {e}")))?;
            Ok(value)
        }
        _ => Ok(value),
    }
}

fn edit_props(
    surface_id: String,
    updates: Vec<(String, Value)>,
) -> impl FnOnce(&mut ConfigDocument) -> Result<(), StoreError> + Send {
    move |doc: &mut ConfigDocument| {
        let component = doc
            .component_mut(&surface_id)
            .ok_or(StoreError::UnknownSurface(surface_id))?;
        for (key, value) in updates {
            component.props.insert(key, value);
        }
        Ok(())
    }
}

/// Single source of truth for the project document.
pub struct ConfigStore {
    storage: DocumentStore,
    queue: WriteQueue,
    broadcast: Arc<BroadcastGroup>,
}

impl ConfigStore {
    /// Open the store and start its write lane. Needs a tokio runtime.
    pub fn open(config: StoreConfig, broadcast: Arc<BroadcastGroup>) -> Self {
        let storage = DocumentStore::new(config);
        let queue = WriteQueue::spawn(storage.clone(), broadcast.clone(), QUEUE_DEPTH);
        Self {
            storage,
            queue,
            broadcast,
        }
    }

    /// Set `props[prop_name]` of `surface_id`.
    pub async fn patch_prop(
        &self,
        surface_id: &str,
        prop_name: &str,
        value: Value,
    ) -> Result<ConfigDocument, StoreError> {
        let value = sanitize_prop(prop_name, value)?;
        self.queue
            .submit(Mutation::Edit {
                label: format!("{surface_id}.{prop_name}"),
                edit: Box::new(edit_props(
                    surface_id.to_string(),
                    vec![(prop_name.to_string(), value)],
                )),
            })
            .await
    }

    /// Set several props of `surface_id` in one write.
    pub async fn patch_batch(
        &self,
        surface_id: &str,
        updates: Map<String, Value>,
    ) -> Result<ConfigDocument, StoreError> {
        let keys: Vec<String> = updates.keys().cloned().collect();
        let updates = updates
            .into_iter()
            .map(|(key, value)| sanitize_prop(&key, value).map(|value| (key, value)))
            .collect::<Result<Vec<_>, _>>()?;
        self.queue
            .submit(Mutation::Edit {
                label: format!("{surface_id} [{}]", keys.join(", ")),
                edit: Box::new(edit_props(surface_id.to_string(), updates)),
            })
            .await
    }

    /// Replace the whole document.
    pub async fn reset(&self, doc: ConfigDocument) -> Result<ConfigDocument, StoreError> {
        self.queue.submit(Mutation::Replace(doc)).await
    }

    /// Current document as stored on disk.
    pub async fn read_raw(&self) -> Result<String, StoreError> {
        self.storage.load_raw().await
    }

    pub async fn document(&self) -> Result<ConfigDocument, StoreError> {
        self.storage.load().await
    }

    pub fn broadcast(&self) -> &Arc<BroadcastGroup> {
        &self.broadcast
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }
}
