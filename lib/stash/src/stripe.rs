use parking_lot::{Mutex, MutexGuard};
use std::hash::{Hash, Hasher};

/// Fixed-width array of mutexes providing per-key mutual exclusion without
/// per-key overhead. A key's stripe is `hash(key) mod stripe_count`.
pub struct StripeLocks {
    stripes: Vec<Mutex<()>>,
}

impl StripeLocks {
    pub fn new(count: usize) -> Self {
        assert!(count > 0, "stripe count must be positive");
        Self {
            stripes: (0..count).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn lock(&self, key: &[u8]) -> MutexGuard<'_, ()> {
        self.stripes[Self::stripe_of(key, self.stripes.len())].lock()
    }

    fn stripe_of(key: &[u8], count: usize) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_maps_to_same_stripe() {
        let locks = StripeLocks::new(16);
        assert_eq!(
            StripeLocks::stripe_of(b"foo", 16),
            StripeLocks::stripe_of(b"foo", 16)
        );
        let _guard = locks.lock(b"foo");
    }
}
