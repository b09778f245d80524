//! Process-wide collision description cache
//!
//! A model's blob is decoded once; every ragdoll instance of that model
//! shares the resulting [`CollisionDescription`]. Read-mostly after warmup,
//! so a coarse `RwLock` over the map is enough. Entries live for the whole
//! process; authored content is finite and reused constantly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use log::debug;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::skeleton::Skeleton;

use super::{parse_description, CollisionDescription, ModelId};

lazy_static! {
    static ref GLOBAL: DescriptionCache = DescriptionCache::new();
}

/// The process-wide cache instance
pub fn global() -> &'static DescriptionCache {
    &GLOBAL
}

/// Keyed store of parsed collision descriptions
#[derive(Default)]
pub struct DescriptionCache {
    entries: RwLock<FxHashMap<ModelId, Arc<CollisionDescription>>>,
    parses: AtomicUsize,
}

impl DescriptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached description for `model`, decoding `blob()` on the
    /// first request. The blob is only fetched when a parse is needed.
    ///
    /// Racing first requests both parse; last write wins and the results are
    /// structurally identical, so either is fine to hand out.
    pub fn get_or_parse<'a>(
        &self,
        model: ModelId,
        blob: impl FnOnce() -> &'a [u8],
        skeleton: &Skeleton,
    ) -> Arc<CollisionDescription> {
        if let Some(desc) = self.entries.read().get(&model) {
            return desc.clone();
        }

        let desc = Arc::new(parse_description(blob(), skeleton));
        self.parses.fetch_add(1, Ordering::Relaxed);
        debug!(
            "parsed collision description for {}: {} solids, {} constraints",
            model,
            desc.solids.len(),
            desc.constraints.len()
        );
        self.entries.write().insert(model, desc.clone());
        desc
    }

    /// Cached description, if this model was ever parsed
    pub fn get(&self, model: ModelId) -> Option<Arc<CollisionDescription>> {
        self.entries.read().get(&model).cloned()
    }

    /// Number of blob parses performed so far
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::super::parser::test_blob::{chain_skeleton, BlobBuilder};
    use super::*;

    fn chain_blob() -> Vec<u8> {
        BlobBuilder::new()
            .solid("pelvis", 0, 1, 10.0)
            .solid("spine", 1, 1, 6.0)
            .constraint(0, 1)
            .finish()
    }

    #[test]
    fn test_second_request_does_not_reparse() {
        let cache = DescriptionCache::new();
        let skeleton = chain_skeleton(&["pelvis", "spine"]);
        let blob = chain_blob();
        let model = ModelId(7);

        let first = cache.get_or_parse(model, || &blob, &skeleton);
        let second = cache.get_or_parse(model, || &blob, &skeleton);

        assert_eq!(cache.parse_count(), 1);
        assert_eq!(first.solids.len(), second.solids.len());
        assert_eq!(first.constraints.len(), second.constraints.len());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_distinct_models_parse_separately() {
        let cache = DescriptionCache::new();
        let skeleton = chain_skeleton(&["pelvis", "spine"]);
        let blob = chain_blob();

        cache.get_or_parse(ModelId(1), || &blob, &skeleton);
        cache.get_or_parse(ModelId(2), || &blob, &skeleton);

        assert_eq!(cache.parse_count(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_blob_not_fetched_on_hit() {
        let cache = DescriptionCache::new();
        let skeleton = chain_skeleton(&["pelvis", "spine"]);
        let blob = chain_blob();
        let model = ModelId(3);

        cache.get_or_parse(model, || &blob, &skeleton);
        // A cache hit must not touch the blob at all
        let hit = cache.get_or_parse(model, || panic!("blob fetched on cache hit"), &skeleton);
        assert_eq!(hit.solids.len(), 2);
    }
}
