use crate::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Process-lifetime cache of generated Foley clips, keyed by event type.
///
/// Entries are filled lazily and never invalidated. Concurrent first requests
/// for one type wait on the same cell, so the clip is generated once; a failed
/// generation leaves the cell empty for the next caller.
#[derive(Debug, Default)]
pub struct EffectCache {
    cells: Mutex<HashMap<String, Arc<OnceCell<PathBuf>>>>,
}

impl EffectCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, event_type: &str) -> Option<PathBuf> {
        let cells = self.cells.lock().await;
        cells.get(event_type).and_then(|cell| cell.get().cloned())
    }

    pub async fn get_or_generate<F, Fut>(&self, event_type: &str, generate: F) -> Result<PathBuf>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PathBuf>>,
    {
        let cell = {
            let mut cells = self.cells.lock().await;
            cells
                .entry(event_type.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };
        cell.get_or_try_init(generate).await.cloned()
    }

    pub async fn len(&self) -> usize {
        let cells = self.cells.lock().await;
        cells.values().filter(|c| c.initialized()).count()
    }
}
