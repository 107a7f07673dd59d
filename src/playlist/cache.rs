use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

use crate::mood::MoodLabel;

type Slot = Arc<AsyncMutex<Option<String>>>;

/// Process-wide playlist URL per mood.
///
/// Each mood has its own async slot. Creation runs while holding the slot, so
/// concurrent callers for the same mood queue behind the first one and then
/// see its result instead of creating a second playlist.
#[derive(Default)]
pub struct PlaylistCache {
    slots: Mutex<HashMap<MoodLabel, Slot>>,
}

/// How [`PlaylistCache::get_or_create`] obtained its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(String),
    Created(String),
}

impl PlaylistCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, mood: MoodLabel) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(mood).or_default().clone()
    }

    /// Cached URL for the mood, without waiting on an in-flight creation.
    pub fn peek(&self, mood: MoodLabel) -> Option<String> {
        let slot = self.slot(mood);
        let guard = slot.try_lock().ok()?;
        guard.clone()
    }

    /// Returns the cached URL or runs `create` under the mood's lock.
    ///
    /// Nothing is cached when `create` fails or yields `None`; the next caller
    /// tries again.
    pub async fn get_or_create<F, Fut, E>(
        &self,
        mood: MoodLabel,
        create: F,
    ) -> Result<Option<CacheLookup>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<String>, E>>,
    {
        let slot = self.slot(mood);
        let mut guard = slot.lock().await;
        if let Some(url) = guard.as_ref() {
            return Ok(Some(CacheLookup::Hit(url.clone())));
        }

        let created = create().await?;
        if let Some(url) = &created {
            *guard = Some(url.clone());
        }
        Ok(created.map(CacheLookup::Created))
    }

    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = self
            .slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        slots
            .iter()
            .filter(|slot| matches!(slot.try_lock(), Ok(guard) if guard.is_some()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
