//! Per-kernel compile cache.
//!
//! Artifacts are keyed by kernel object identity ([`KernelKey`]). Each
//! key owns a slot with its own lock: the first caller builds while
//! holding the slot lock, concurrent callers for the same kernel wait on
//! it and then reuse the result. Callers for other kernels never wait.
//! A failed build removes its slot so the next call retries. No shard
//! lock of the map is held while a slot lock is taken.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::Result;
use crate::kernel::{Kernel, KernelKey};

struct Slot<A> {
    /// Keeps the kernel allocation, and so its address, alive while cached.
    _kernel: Arc<dyn Kernel>,
    artifact: Mutex<Option<Arc<A>>>,
}

pub struct KernelCache<A> {
    slots: DashMap<KernelKey, Arc<Slot<A>>>,
}

impl<A> KernelCache<A> {
    pub fn new() -> Self {
        KernelCache {
            slots: DashMap::new(),
        }
    }

    /// The cached artifact for `kernel`, building it with `build` on the
    /// first call. `build` runs at most once per kernel unless it fails;
    /// a failed build drops its slot, and with it the kernel reference.
    pub fn get_or_build(
        &self,
        kernel: &Arc<dyn Kernel>,
        build: impl FnOnce() -> Result<A>,
    ) -> Result<Arc<A>> {
        let key = KernelKey::of(kernel);
        loop {
            let slot = self.slot(key, kernel);
            let mut artifact = slot.artifact.lock();
            if let Some(built) = artifact.as_ref() {
                return Ok(Arc::clone(built));
            }
            if !self.is_current(key, &slot) {
                // Removed by a failed build while this caller waited.
                continue;
            }
            tracing::debug!(kernel = ?key, "compiling kernel");
            return match build() {
                Ok(built) => {
                    let built = Arc::new(built);
                    *artifact = Some(Arc::clone(&built));
                    Ok(built)
                }
                Err(err) => {
                    self.slots.remove_if(&key, |_, current| Arc::ptr_eq(current, &slot));
                    Err(err)
                }
            };
        }
    }

    /// The slot for `key`, cloned out so no shard lock is held while it
    /// is locked.
    fn slot(&self, key: KernelKey, kernel: &Arc<dyn Kernel>) -> Arc<Slot<A>> {
        Arc::clone(
            self.slots
                .entry(key)
                .or_insert_with(|| {
                    Arc::new(Slot {
                        _kernel: Arc::clone(kernel),
                        artifact: Mutex::new(None),
                    })
                })
                .value(),
        )
    }

    fn is_current(&self, key: KernelKey, slot: &Arc<Slot<A>>) -> bool {
        self.slots
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current.value(), slot))
    }

    /// Every slot, cloned out of the map before any of them is locked.
    fn snapshot(&self) -> Vec<Arc<Slot<A>>> {
        self.slots.iter().map(|slot| Arc::clone(slot.value())).collect()
    }

    pub fn contains(&self, kernel: &Arc<dyn Kernel>) -> bool {
        let slot = self
            .slots
            .get(&KernelKey::of(kernel))
            .map(|slot| Arc::clone(slot.value()));
        slot.is_some_and(|slot| slot.artifact.lock().is_some())
    }

    /// Number of built artifacts.
    pub fn len(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|slot| slot.artifact.lock().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every built artifact.
    pub fn drain(&self) -> Vec<Arc<A>> {
        let keys: Vec<KernelKey> = self.slots.iter().map(|slot| *slot.key()).collect();
        keys.into_iter()
            .filter_map(|key| self.slots.remove(&key))
            .filter_map(|(_, slot)| slot.artifact.lock().take())
            .collect()
    }
}

impl<A> Default for KernelCache<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
