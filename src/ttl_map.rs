//! A keyed store whose entries can age out.

use rustc_hash::FxHashMap;
use std::{
    hash::Hash,
    time::{Duration, Instant},
};

/// A map from keys to timestamped values with lazy expiry.
///
/// Entries older than the configured time to live behave as absent on every
/// lookup; a `ttl` of `None` disables expiry. Whether an expired entry is
/// physically purged or left for a later overwrite is not observable through
/// this interface.
///
/// The map takes ownership of inserted values, so a value that owns
/// variable-length content, such as a queued [`Message`](crate::Message),
/// is deep copied by its owner before insertion when the caller needs to
/// keep using it.
#[derive(Debug)]
pub struct TtlMap<K, V> {
    entries: FxHashMap<K, Entry<V>>,
    ttl: Option<Duration>,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    updated: Instant,
}

impl<K: Eq + Hash, V> TtlMap<K, V> {
    /// Creates a store whose entries expire after `ttl`, or never when `ttl`
    /// is `None`.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: FxHashMap::default(),
            ttl,
        }
    }

    /// Inserts or overwrites the entry for `key`, refreshing its timestamp.
    pub fn set(&mut self, key: K, value: V) {
        self.set_at(key, value, Instant::now());
    }

    /// Returns the live value for `key`. An expired entry is a miss.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.get_at(key, Instant::now())
    }

    /// Removes and returns the live value for `key`.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_at(key, Instant::now())
    }

    /// Whether a live entry exists for `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Visits every live entry in unspecified order.
    pub fn for_each(&self, mut visit: impl FnMut(&K, &V)) {
        let now = Instant::now();
        for (key, entry) in &self.entries {
            if self.is_live(entry, now) {
                visit(key, &entry.value);
            }
        }
    }

    /// [`TtlMap::set`] with the timestamp supplied by the caller.
    pub fn set_at(&mut self, key: K, value: V, now: Instant) {
        self.entries.insert(key, Entry { value, updated: now });
    }

    /// [`TtlMap::get`] evaluated at the supplied point in time.
    pub fn get_at(&self, key: &K, now: Instant) -> Option<&V> {
        let entry = self.entries.get(key)?;
        self.is_live(entry, now).then_some(&entry.value)
    }

    /// [`TtlMap::remove`] evaluated at the supplied point in time.
    pub fn remove_at(&mut self, key: &K, now: Instant) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.is_live(&entry, now).then_some(entry.value)
    }

    fn is_live(&self, entry: &Entry<V>, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(entry.updated) < ttl,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let mut map = TtlMap::new(None);
        map.set("a", 1);
        map.set("b", 2);
        assert_eq!(map.get(&"a"), Some(&1));
        assert_eq!(map.remove(&"a"), Some(1));
        assert_eq!(map.get(&"a"), None);
        assert_eq!(map.get(&"b"), Some(&2));
    }

    #[test]
    fn overwrite() {
        let mut map = TtlMap::new(None);
        map.set("a", 1);
        map.set("a", 2);
        assert_eq!(map.get(&"a"), Some(&2));
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let ttl = Duration::from_secs(60);
        let start = Instant::now();
        let mut map = TtlMap::new(Some(ttl));
        map.set_at("a", 1, start);
        assert_eq!(map.get_at(&"a", start + Duration::from_secs(59)), Some(&1));
        assert_eq!(map.get_at(&"a", start + ttl), None);
        assert_eq!(map.remove_at(&"a", start + ttl), None);
    }

    #[test]
    fn overwrite_refreshes_timestamp() {
        let ttl = Duration::from_secs(60);
        let start = Instant::now();
        let mut map = TtlMap::new(Some(ttl));
        map.set_at("a", 1, start);
        map.set_at("a", 2, start + Duration::from_secs(50));
        assert_eq!(map.get_at(&"a", start + Duration::from_secs(70)), Some(&2));
    }

    #[test]
    fn for_each_skips_expired() {
        let ttl = Duration::from_millis(0);
        let mut map = TtlMap::new(Some(ttl));
        map.set("a", 1);
        let mut visited = 0;
        map.for_each(|_, _| visited += 1);
        assert_eq!(visited, 0);
    }
}
