// Signature-verification cache shared across engine runs.
use std::collections::HashMap;

use sompi_core::Hash;

/// Cache key: the signed message digest plus the exact key and signature
/// bytes (scheme-tagged by construction, since key lengths differ).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SigCacheKey {
    pub message: Hash,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

/// A capacity-bounded map from verification triples to their outcome. A hit
/// skips the curve operation entirely.
#[derive(Debug)]
pub struct SigCache {
    map: HashMap<SigCacheKey, bool>,
    capacity: usize,
}

impl SigCache {
    pub fn new(capacity: usize) -> Self {
        Self { map: HashMap::with_capacity(capacity.min(1024)), capacity: capacity.max(1) }
    }

    pub fn get(&self, key: &SigCacheKey) -> Option<bool> {
        self.map.get(key).copied()
    }

    pub fn insert(&mut self, key: SigCacheKey, valid: bool) {
        if self.map.len() >= self.capacity && !self.map.contains_key(&key) {
            // Evict an arbitrary entry to stay within bounds.
            if let Some(evicted) = self.map.keys().next().cloned() {
                self.map.remove(&evicted);
            }
        }
        self.map.insert(key, valid);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for SigCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> SigCacheKey {
        SigCacheKey { message: Hash::from_bytes([n; 32]), public_key: vec![n; 32], signature: vec![n; 64] }
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = SigCache::new(4);
        cache.insert(key(1), true);
        cache.insert(key(2), false);
        assert_eq!(cache.get(&key(1)), Some(true));
        assert_eq!(cache.get(&key(2)), Some(false));
        assert_eq!(cache.get(&key(3)), None);
    }

    #[test]
    fn test_capacity_bound() {
        let mut cache = SigCache::new(2);
        for n in 0..10 {
            cache.insert(key(n), true);
        }
        assert!(cache.len() <= 2);
    }
}
