// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Reference-counted deduplication of immutable objects.

An [`ObjectCache`] hands out one shared `Arc<T>` per distinct key.  Each
`instantiate` takes a reference; each `release` drops one, and the last
release tears the object down.  Entries live in an arena of slots indexed by
both key and value identity, so releasing by value never has to recompute
the key.
*/

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use wasm_safe_mutex::Mutex;

struct Entry<K, T: ?Sized> {
    key: K,
    value: Arc<T>,
    ref_count: u32,
}

struct Inner<K, T: ?Sized> {
    slots: Vec<Option<Entry<K, T>>>,
    free: Vec<u32>,
    by_key: HashMap<K, u32>,
    by_value: HashMap<usize, u32>,
}

fn identity<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value).cast::<()>() as usize
}

impl<K: Hash + Eq + Clone, T: ?Sized> Inner<K, T> {
    fn acquire(&mut self, key: &K) -> Option<Arc<T>> {
        let slot = *self.by_key.get(key)?;
        let entry = self.slots[slot as usize].as_mut()?;
        entry.ref_count += 1;
        Some(entry.value.clone())
    }

    fn insert(&mut self, key: K, value: Arc<T>) {
        let entry = Entry {
            key: key.clone(),
            value: value.clone(),
            ref_count: 1,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                (self.slots.len() - 1) as u32
            }
        };
        self.by_key.insert(key, slot);
        self.by_value.insert(identity(&value), slot);
    }
}

pub struct ObjectCache<K, T: ?Sized> {
    inner: Mutex<Inner<K, T>>,
}

impl<K: Hash + Eq + Clone, T: ?Sized> ObjectCache<K, T> {
    pub fn new() -> Self {
        ObjectCache {
            inner: Mutex::new(Inner {
                slots: Vec::new(),
                free: Vec::new(),
                by_key: HashMap::new(),
                by_value: HashMap::new(),
            }),
        }
    }

    /// Returns the object for `key`, creating it with `compute` on a miss.
    ///
    /// `compute` runs without the cache lock held.  If another caller inserts
    /// the same key meanwhile, theirs wins and ours goes to `discard`.
    pub fn instantiate<E>(
        &self,
        key: K,
        compute: impl FnOnce(&K) -> Result<Arc<T>, E>,
        discard: impl FnOnce(Arc<T>),
    ) -> Result<Arc<T>, E> {
        if let Some(hit) = self.inner.lock_sync().acquire(&key) {
            logwise::debuginternal_sync!("object cache hit");
            return Ok(hit);
        }
        logwise::debuginternal_sync!("object cache miss");
        let created = compute(&key)?;
        let winner = {
            let mut inner = self.inner.lock_sync();
            match inner.acquire(&key) {
                Some(winner) => Some(winner),
                None => {
                    inner.insert(key, created.clone());
                    None
                }
            }
        };
        match winner {
            Some(winner) => {
                logwise::trace_sync!("object cache lost an insertion race");
                discard(created);
                Ok(winner)
            }
            None => Ok(created),
        }
    }

    /// Drops one reference to `value`.
    ///
    /// Returns true when this was the last reference, after `teardown` has run.
    /// Values this cache never handed out are ignored.
    pub fn release(&self, value: &Arc<T>, teardown: impl FnOnce(K, Arc<T>)) -> bool {
        let removed = {
            let mut inner = self.inner.lock_sync();
            let Some(&slot) = inner.by_value.get(&identity(value)) else {
                return false;
            };
            let Some(entry) = inner.slots[slot as usize].as_mut() else {
                return false;
            };
            entry.ref_count -= 1;
            if entry.ref_count > 0 {
                return false;
            }
            let entry = inner.slots[slot as usize].take();
            if let Some(entry) = &entry {
                inner.by_key.remove(&entry.key);
            }
            inner.by_value.remove(&identity(value));
            inner.free.push(slot);
            entry
        };
        match removed {
            Some(entry) => {
                teardown(entry.key, entry.value);
                true
            }
            None => false,
        }
    }

    /// Whether `value` is an object this cache currently holds.
    pub fn contains(&self, value: &Arc<T>) -> bool {
        self.inner.lock_sync().by_value.contains_key(&identity(value))
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        self.inner.lock_sync().by_key.len()
    }

    pub fn ref_count(&self, key: &K) -> u32 {
        let inner = self.inner.lock_sync();
        inner
            .by_key
            .get(key)
            .and_then(|slot| inner.slots[*slot as usize].as_ref())
            .map(|e| e.ref_count)
            .unwrap_or(0)
    }

    /// Empties the cache without tearing anything down; for a lost context
    /// whose objects are already gone.
    pub fn clear(&self) {
        let mut inner = self.inner.lock_sync();
        inner.slots.clear();
        inner.free.clear();
        inner.by_key.clear();
        inner.by_value.clear();
    }
}

impl<K: Hash + Eq + Clone, T: ?Sized> Default for ObjectCache<K, T> {
    fn default() -> Self {
        ObjectCache::new()
    }
}

impl<K, T: ?Sized> std::fmt::Debug for ObjectCache<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCache").finish_non_exhaustive()
    }
}
