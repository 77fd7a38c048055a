//! In-memory metadata index: storage key -> known variant keys.
//!
//! Pure acceleration structure. The backend stays authoritative; the
//! index starts empty each session, is populated lazily per storage
//! key, and can be discarded at any time without changing observable
//! behavior. Locking is the engine's job, not this struct's.

use std::collections::{HashMap, HashSet};

use crate::{StorageKey, VariantKey};

#[derive(Debug, Default)]
pub(crate) struct VariantIndex {
    map: HashMap<StorageKey, HashSet<VariantKey>>,
}

impl VariantIndex {
    pub(crate) fn get(&self, key: &StorageKey) -> Option<&HashSet<VariantKey>> {
        self.map.get(key)
    }

    /// Record the authoritative variant set for a key, typically fresh
    /// from a backend enumeration.
    pub(crate) fn replace(
        &mut self,
        key: StorageKey,
        variants: HashSet<VariantKey>,
    ) {
        self.map.insert(key, variants);
    }

    pub(crate) fn insert_variant(
        &mut self,
        key: StorageKey,
        variant: VariantKey,
    ) {
        self.map.entry(key).or_default().insert(variant);
    }

    pub(crate) fn remove(&mut self, key: &StorageKey) {
        self.map.remove(key);
    }

    pub(crate) fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_variants_per_storage_key() {
        let mut index = VariantIndex::default();
        let key = StorageKey::derive("https://example.com/");
        let variant = VariantKey::from_raw("aa");

        assert!(index.get(&key).is_none());
        index.insert_variant(key.clone(), variant.clone());
        assert!(index.get(&key).unwrap().contains(&variant));

        index.remove(&key);
        assert!(index.get(&key).is_none());
    }

    #[test]
    fn replace_overwrites_wholesale() {
        let mut index = VariantIndex::default();
        let key = StorageKey::derive("https://example.com/");
        index.insert_variant(key.clone(), VariantKey::from_raw("aa"));

        let fresh: HashSet<VariantKey> =
            [VariantKey::from_raw("bb")].into_iter().collect();
        index.replace(key.clone(), fresh);

        let variants = index.get(&key).unwrap();
        assert!(!variants.contains(&VariantKey::from_raw("aa")));
        assert!(variants.contains(&VariantKey::from_raw("bb")));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut index = VariantIndex::default();
        index.insert_variant(
            StorageKey::derive("https://a/"),
            VariantKey::from_raw("aa"),
        );
        index.clear();
        assert!(index.get(&StorageKey::derive("https://a/")).is_none());
    }
}
