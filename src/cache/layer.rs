//! Session cache sitting between request handlers and upstream authentication.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::Result;
use crate::session::{Session, SessionFactory};

use super::key::SessionKey;

struct Entry {
  session: Arc<Session>,
  created_at: Instant,
}

/// One key's entry behind its own async lock. The lock is held across
/// construction so racing requests authenticate once.
type Slot = Arc<tokio::sync::Mutex<Option<Entry>>>;

/// Time-bounded cache of authenticated sessions.
///
/// Entries expire a fixed `lifespan` after creation and are rebuilt lazily on
/// the next lookup for their key; nothing sweeps in the background.
pub struct SessionCache {
  factory: Arc<dyn SessionFactory>,
  lifespan: Duration,
  slots: Mutex<HashMap<String, Slot>>,
}

impl SessionCache {
  pub fn new(factory: Arc<dyn SessionFactory>, lifespan: Duration) -> Self {
    Self {
      factory,
      lifespan,
      slots: Mutex::new(HashMap::new()),
    }
  }

  fn is_expired(&self, created_at: Instant) -> bool {
    created_at.elapsed() >= self.lifespan
  }

  /// The map only ever gains or loses whole slots, so a poisoned guard is
  /// still consistent.
  fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn slot(&self, hash: &str) -> Slot {
    let mut slots = self.slots();
    Arc::clone(slots.entry(hash.to_string()).or_default())
  }

  /// Return the live session for `key`, building one if there is none,
  /// the cached one has expired, or `force_refresh` is set.
  ///
  /// Failed authentication is returned as is and leaves nothing cached.
  pub async fn get_or_create(&self, key: &SessionKey, force_refresh: bool) -> Result<Arc<Session>> {
    let hash = key.cache_hash();
    let slot = self.slot(&hash);
    let mut entry = slot.lock().await;

    if force_refresh && entry.take().is_some() {
      tracing::debug!(?key, "Session refresh requested, dropping cached session");
    }

    if let Some(cached) = entry.as_ref() {
      if !self.is_expired(cached.created_at) {
        tracing::debug!(?key, "Session cache hit");
        return Ok(Arc::clone(&cached.session));
      }
      tracing::debug!(?key, "Session expired, evicting");
      *entry = None;
    }

    match self.factory.connect(&key.credentials, key.selector).await {
      Ok(session) => {
        let session = Arc::new(session);
        *entry = Some(Entry {
          session: Arc::clone(&session),
          created_at: Instant::now(),
        });
        tracing::info!(?key, "Session created");
        drop(entry);
        self.prune_expired(&hash);
        Ok(session)
      }
      Err(e) => {
        tracing::warn!(?key, error = %e, "Session creation failed");
        drop(entry);
        self.forget_empty(&hash, &slot);
        Err(e)
      }
    }
  }

  /// Drop the slot for a failed key unless another request has filled or
  /// replaced it meanwhile.
  fn forget_empty(&self, hash: &str, slot: &Slot) {
    let mut slots = self.slots();
    let unused = slots
      .get(hash)
      .is_some_and(|current| Arc::ptr_eq(current, slot))
      && slot.try_lock().is_ok_and(|entry| entry.is_none());
    if unused {
      slots.remove(hash);
    }
  }

  /// Drop every other slot whose entry has expired or was never filled.
  /// Slots locked by an in-flight lookup are left alone.
  fn prune_expired(&self, keep: &str) {
    let mut slots = self.slots();
    let before = slots.len();
    slots.retain(|hash, slot| {
      hash == keep
        || match slot.try_lock() {
          Ok(entry) => entry
            .as_ref()
            .is_some_and(|e| !self.is_expired(e.created_at)),
          Err(_) => true,
        }
    });
    let pruned = before - slots.len();
    if pruned > 0 {
      tracing::debug!(pruned, remaining = slots.len(), "Pruned expired sessions");
    }
  }

  /// Evict the entry for `key`, if any. Returns whether one was removed.
  #[allow(dead_code)]
  pub async fn invalidate(&self, key: &SessionKey) -> bool {
    let slot = self.slots().remove(&key.cache_hash());
    match slot {
      Some(slot) => slot.lock().await.take().is_some(),
      None => false,
    }
  }

  /// Number of keys with a slot, live or expired.
  #[allow(dead_code)]
  pub fn len(&self) -> usize {
    self.slots().len()
  }

  #[allow(dead_code)]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
