//! Bounded key-value table with optional per-entry expiry.
//!
//! Backs the three long-lived tables of the stack: the ARP cache (entries
//! expire after the cache TTL), the ARP pending queue (expiry doubles as
//! the request rate limit), and the UDP port table (no expiry).
//!
//! Expiry is lazy: an entry past its TTL is removed the next time it is
//! looked up. There is no background sweep.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::error::NetError;

struct Entry<V> {
    value: V,
    stamp: Instant,
}

/// Bounded map whose entries vanish `ttl` after insertion or last refresh.
///
/// `ttl = None` means entries never expire. Inserting over an existing key
/// replaces the value and resets its expiry clock; lookups do not.
pub struct TtlMap<K, V> {
    entries: HashMap<K, Entry<V>>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl<K: Eq + Hash, V> TtlMap<K, V> {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        TtlMap {
            entries: HashMap::with_capacity(capacity),
            capacity,
            ttl,
        }
    }

    fn expired(&self, entry: &Entry<V>) -> bool {
        match self.ttl {
            Some(ttl) => entry.stamp.elapsed() >= ttl,
            None => false,
        }
    }

    /// Look up a live entry, evicting it first if its TTL has elapsed.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.entries.get(key).is_some_and(|e| self.expired(e)) {
            self.entries.remove(key);
        }
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.entries.get(key).is_some_and(|e| self.expired(e)) {
            self.entries.remove(key);
        }
        self.entries.get_mut(key).map(|e| &mut e.value)
    }

    /// Insert or replace an entry, resetting its expiry clock.
    ///
    /// Fails with [`NetError::TableFull`] when the table is at capacity and
    /// `key` is not already present (expired entries count as absent).
    pub fn set(&mut self, key: K, value: V) -> Result<(), NetError> {
        if self.entries.get(&key).is_some_and(|e| self.expired(e)) {
            self.entries.remove(&key);
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            return Err(NetError::TableFull);
        }
        self.entries.insert(
            key,
            Entry {
                value,
                stamp: Instant::now(),
            },
        );
        Ok(())
    }

    /// Remove an entry, returning its value if it was present and live.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.remove(key)?;
        if self.expired(&entry) {
            return None;
        }
        Some(entry.value)
    }

    /// Visit every live entry with its insertion timestamp.
    pub fn for_each(&self, mut visit: impl FnMut(&K, &V, Instant)) {
        for (key, entry) in &self.entries {
            if !self.expired(entry) {
                visit(key, &entry.value, entry.stamp);
            }
        }
    }

    /// Number of entries held, counting any not yet evicted by lazy expiry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn set_get_remove() {
        let mut map: TtlMap<u16, &str> = TtlMap::new(4, None);
        map.set(80, "http").unwrap();
        assert_eq!(map.get(&80), Some(&"http"));
        assert_eq!(map.remove(&80), Some("http"));
        assert_eq!(map.get(&80), None);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let mut map: TtlMap<u8, u8> = TtlMap::new(4, Some(Duration::from_millis(20)));
        map.set(1, 10).unwrap();
        assert_eq!(map.get(&1), Some(&10));
        sleep(Duration::from_millis(30));
        assert_eq!(map.get(&1), None);
        assert!(map.is_empty());
    }

    #[test]
    fn overwrite_resets_expiry() {
        let mut map: TtlMap<u8, u8> = TtlMap::new(4, Some(Duration::from_millis(40)));
        map.set(1, 10).unwrap();
        sleep(Duration::from_millis(25));
        map.set(1, 11).unwrap();
        sleep(Duration::from_millis(25));
        // 50ms after the first insert but only 25ms after the refresh.
        assert_eq!(map.get(&1), Some(&11));
    }

    #[test]
    fn no_ttl_never_expires() {
        let mut map: TtlMap<u8, u8> = TtlMap::new(4, None);
        map.set(1, 10).unwrap();
        sleep(Duration::from_millis(10));
        assert_eq!(map.get(&1), Some(&10));
    }

    #[test]
    fn capacity_bound_rejects_new_keys_only() {
        let mut map: TtlMap<u8, u8> = TtlMap::new(2, None);
        map.set(1, 10).unwrap();
        map.set(2, 20).unwrap();
        assert!(matches!(map.set(3, 30), Err(NetError::TableFull)));
        // Overwriting an existing key is always allowed.
        map.set(2, 21).unwrap();
        assert_eq!(map.get(&2), Some(&21));
    }

    #[test]
    fn expired_entry_frees_its_slot() {
        let mut map: TtlMap<u8, u8> = TtlMap::new(1, Some(Duration::from_millis(10)));
        map.set(1, 10).unwrap();
        sleep(Duration::from_millis(20));
        map.set(2, 20).expect("expired entry should not hold the slot");
        assert_eq!(map.get(&2), Some(&20));
    }

    #[test]
    fn for_each_skips_expired() {
        let mut map: TtlMap<u8, u8> = TtlMap::new(4, Some(Duration::from_millis(20)));
        map.set(1, 10).unwrap();
        sleep(Duration::from_millis(30));
        map.set(2, 20).unwrap();
        let mut seen = Vec::new();
        map.for_each(|k, v, _| seen.push((*k, *v)));
        assert_eq!(seen, vec![(2, 20)]);
    }
}
