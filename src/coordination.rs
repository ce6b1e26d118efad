use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Identifies one issued request. Later requests compare greater, so a
/// response whose token is no longer the expected one is a late arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Issues monotonically increasing tokens
#[derive(Debug, Default)]
pub struct TokenCounter {
    last: AtomicU64,
}

impl TokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> RequestToken {
        RequestToken(self.last.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Most recently issued token, if any
    pub fn latest(&self) -> Option<RequestToken> {
        match self.last.load(Ordering::SeqCst) {
            0 => None,
            n => Some(RequestToken(n)),
        }
    }

    pub fn is_latest(&self, token: RequestToken) -> bool {
        self.latest() == Some(token)
    }
}

/// At most one in-flight operation per key.
///
/// Callers that find the key busy are expected to back off rather than queue.
#[derive(Debug, Clone)]
pub struct InFlight<K> {
    owners: HashMap<K, RequestToken>,
}

impl<K> Default for InFlight<K> {
    fn default() -> Self {
        Self {
            owners: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> InFlight<K> {
    /// Claim `key` for `token`. Returns false if another request holds it.
    pub fn try_begin(&mut self, key: K, token: RequestToken) -> bool {
        if self.owners.contains_key(&key) {
            return false;
        }
        self.owners.insert(key, token);
        true
    }

    /// Release `key` if `token` still owns it.
    pub fn finish(&mut self, key: &K, token: RequestToken) -> bool {
        if self.owners.get(key) == Some(&token) {
            self.owners.remove(key);
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.owners.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Forget every owner, e.g. when the state they target is replaced.
    pub fn clear(&mut self) {
        self.owners.clear();
    }
}

/// Runs operations on the same key one at a time, in arrival order.
///
/// Operations on different keys never wait on each other. Slots are created
/// on demand and dropped once nobody holds or waits on them.
#[derive(Debug)]
pub struct KeyedSerializer<K> {
    slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedSerializer<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedSerializer<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other holder of `key` remains, then hold it until the
    /// returned guard is dropped.
    pub async fn acquire(&self, key: K) -> KeyGuard<'_, K> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(key.clone()).or_default().clone()
        };
        let guard = slot.lock_owned().await;

        KeyGuard {
            serializer: self,
            key,
            guard: Some(guard),
        }
    }

    /// Whether an operation on `key` currently holds or waits for the slot
    pub fn is_busy(&self, key: &K) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    fn release(&self, key: &K) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map's own reference left: nobody holds or waits
        if slots.get(key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(key);
        }
    }
}

/// Exclusive hold on one key of a [`KeyedSerializer`]
pub struct KeyGuard<'a, K: Eq + Hash + Clone> {
    serializer: &'a KeyedSerializer<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        // Unlock first so the slot's reference count reflects waiters only
        drop(self.guard.take());
        self.serializer.release(&self.key);
    }
}
