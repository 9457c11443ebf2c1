//! Session-lifetime dedup cache keyed by barcode.
//!
//! Every id moves through `absent → Pending → (Resolved | Unresolvable)` at most
//! once. Entries are never evicted or updated after reaching a terminal state;
//! growth is bounded only by the number of distinct barcodes seen in a session.

use std::{collections::HashMap, sync::Arc};

use nutrition::{BarcodeId, NutritionRecord};

#[derive(Clone, Debug, PartialEq)]
pub enum CacheEntry {
    /// A lookup has been claimed for this id but has not reported back.
    Pending,
    Resolved(Arc<NutritionRecord>),
    /// Lookup failed; do not retry this session.
    Unresolvable,
}

/// Terminal value recorded once a lookup completes.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheValue {
    Resolved(Arc<NutritionRecord>),
    Unresolvable,
}

/// Answer to [`DedupCache::get_or_mark_pending`].
#[derive(Clone, Debug, PartialEq)]
pub enum CacheLookup {
    Hit(Arc<NutritionRecord>),
    Unresolvable,
    /// Another caller already owns the lookup for this id.
    Pending,
    /// The caller now owns the lookup and must report back via `insert`.
    Miss,
}

#[derive(Default)]
pub struct DedupCache {
    entries: HashMap<BarcodeId, CacheEntry>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached state for `id`, claiming it as pending when absent.
    ///
    /// `Miss` is handed out exactly once per id.
    pub fn get_or_mark_pending(&mut self, id: &BarcodeId) -> CacheLookup {
        if let Some(entry) = self.entries.get(id) {
            return Self::as_lookup(entry);
        }
        self.entries.insert(id.clone(), CacheEntry::Pending);
        CacheLookup::Miss
    }

    /// Record the lookup result for `id`. First result wins: returns `true` only
    /// when the entry transitions to a terminal value, `false` if one was
    /// already recorded.
    pub fn insert(&mut self, id: BarcodeId, value: CacheValue) -> bool {
        let terminal = match value {
            CacheValue::Resolved(record) => CacheEntry::Resolved(record),
            CacheValue::Unresolvable => CacheEntry::Unresolvable,
        };
        match self.entries.get_mut(&id) {
            Some(entry) if matches!(entry, CacheEntry::Pending) => {
                *entry = terminal;
                true
            }
            Some(_) => false,
            None => {
                self.entries.insert(id, terminal);
                true
            }
        }
    }

    /// Inspect `id` without claiming it.
    pub fn peek(&self, id: &BarcodeId) -> CacheLookup {
        self.entries
            .get(id)
            .map_or(CacheLookup::Miss, Self::as_lookup)
    }

    pub fn get(&self, id: &BarcodeId) -> Option<&CacheEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| matches!(entry, CacheEntry::Resolved(_)))
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BarcodeId, &CacheEntry)> {
        self.entries.iter()
    }

    fn as_lookup(entry: &CacheEntry) -> CacheLookup {
        match entry {
            CacheEntry::Pending => CacheLookup::Pending,
            CacheEntry::Resolved(record) => CacheLookup::Hit(record.clone()),
            CacheEntry::Unresolvable => CacheLookup::Unresolvable,
        }
    }
}

#[cfg(test)]
mod tests {
    use nutrition::Nutrient;

    use super::*;

    fn apple() -> Arc<NutritionRecord> {
        Arc::new(NutritionRecord::new(
            Some("Apple".into()),
            Nutrient::Value(52.0),
            Nutrient::Value(0.3),
            Nutrient::Value(10.4),
            Nutrient::Value(14.0),
            Nutrient::Value(0.2),
        ))
    }

    #[test]
    fn first_call_misses_then_pending() {
        let mut cache = DedupCache::new();
        let id = BarcodeId::new("012345");
        assert_eq!(cache.get_or_mark_pending(&id), CacheLookup::Miss);
        assert_eq!(cache.get_or_mark_pending(&id), CacheLookup::Pending);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.resolved_count(), 0);
    }

    #[test]
    fn first_insert_wins() {
        let mut cache = DedupCache::new();
        let id = BarcodeId::new("012345");
        assert_eq!(cache.get_or_mark_pending(&id), CacheLookup::Miss);
        assert!(cache.insert(id.clone(), CacheValue::Resolved(apple())));
        assert!(!cache.insert(id.clone(), CacheValue::Unresolvable));
        assert_eq!(cache.peek(&id), CacheLookup::Hit(apple()));
    }

    #[test]
    fn hits_are_stable() {
        let mut cache = DedupCache::new();
        let id = BarcodeId::new("1");
        cache.get_or_mark_pending(&id);
        cache.insert(id.clone(), CacheValue::Resolved(apple()));
        let first = cache.get_or_mark_pending(&id);
        for _ in 0..10 {
            assert_eq!(cache.get_or_mark_pending(&id), first);
        }
    }

    #[test]
    fn unresolvable_is_terminal() {
        let mut cache = DedupCache::new();
        let id = BarcodeId::new("404");
        cache.get_or_mark_pending(&id);
        assert!(cache.insert(id.clone(), CacheValue::Unresolvable));
        assert!(!cache.insert(id.clone(), CacheValue::Resolved(apple())));
        assert_eq!(cache.get_or_mark_pending(&id), CacheLookup::Unresolvable);
        assert_eq!(cache.get(&id), Some(&CacheEntry::Unresolvable));
    }

    #[test]
    fn insert_without_claim_is_accepted_once() {
        let mut cache = DedupCache::new();
        let id = BarcodeId::new("9");
        assert!(cache.insert(id.clone(), CacheValue::Unresolvable));
        assert!(!cache.insert(id.clone(), CacheValue::Unresolvable));
        assert_eq!(cache.peek(&BarcodeId::new("other")), CacheLookup::Miss);
        assert!(cache.get(&BarcodeId::new("other")).is_none());
    }

    #[test]
    fn ids_compare_exactly() {
        let mut cache = DedupCache::new();
        assert_eq!(cache.get_or_mark_pending(&BarcodeId::new("0123")), CacheLookup::Miss);
        assert_eq!(cache.get_or_mark_pending(&BarcodeId::new("123")), CacheLookup::Miss);
        assert_eq!(cache.get_or_mark_pending(&BarcodeId::new("0123 ")), CacheLookup::Miss);
        assert_eq!(cache.iter().count(), 3);
    }
}
