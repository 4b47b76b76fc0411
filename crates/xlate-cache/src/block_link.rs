//! Block-link registry: every host-code site that branches to a given guest
//! address, keyed so `erase` can find and delink them all (spec §4.2).

use std::collections::BTreeMap;

/// One registered branch site. `delinker` rewrites that site back to the
/// dispatcher trampoline; it's a boxed closure rather than a raw function
/// pointer since `jit-core`'s direct/indirect delinkers close over the
/// buffer and the site's byte offset.
pub struct BlockLink {
    pub delinker: Box<dyn FnMut() + Send>,
}

/// Keyed by `(target_guest_rip, site)` so `erase(target)` can range-scan
/// every site branching to it (spec: "Iterating `[target, *]` finds all
/// sites branching to `target`").
#[derive(Default)]
pub struct BlockLinkSet {
    links: BTreeMap<(u64, u64), BlockLink>,
}

impl BlockLinkSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, target: u64, site: u64, delinker: impl FnMut() + Send + 'static) {
        self.links.insert((target, site), BlockLink { delinker: Box::new(delinker) });
    }

    /// Run and remove every delinker registered against `target`.
    pub fn delink_all(&mut self, target: u64) {
        let keys: Vec<(u64, u64)> = self
            .links
            .range((target, u64::MIN)..=(target, u64::MAX))
            .map(|(k, _)| *k)
            .collect();
        for key in keys {
            if let Some(mut link) = self.links.remove(&key) {
                (link.delinker)();
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
