//! The three-tier guest-to-host lookup cache (spec §3 "Lookup cache", §4.2).
//!
//! L1 is a direct-mapped array read without the lock — a torn read just
//! fails the `guest` compare and falls through to the locked path, so it
//! costs a cache miss, never a wrong answer. L2/L3 and all L1 *writes* hold
//! [`ReentrantMutex`] (recursive because `erase`'s delinkers may, in
//! principle, trigger a fresh lookup from the same thread).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::block_link::BlockLinkSet;
use crate::code_pages::CodePageMap;
use crate::recursive_mutex::ReentrantMutex;

/// `2^20` entries (spec §3).
pub const L1_ENTRIES: usize = 1 << 20;
const L1_MASK: u64 = (L1_ENTRIES as u64) - 1;

const L2_PAGE_ENTRIES: usize = 4096;
const L2_PAGE_MASK: u64 = (L2_PAGE_ENTRIES as u64) - 1;

/// Sentinel `guest` value meaning "this L1 slot is empty". Real guest
/// addresses at 0 would alias it, but guest address 0 is never a valid
/// translation entry point in user-mode address spaces this targets.
const L1_EMPTY_GUEST: u64 = 0;

struct L1Slot {
    guest: AtomicU64,
    host: AtomicU64,
}

impl L1Slot {
    const fn empty() -> Self {
        Self {
            guest: AtomicU64::new(L1_EMPTY_GUEST),
            host: AtomicU64::new(0),
        }
    }
}

#[derive(Clone, Copy)]
struct Entry {
    guest: u64,
    host: u64,
}

struct L2Page {
    entries: Box<[Option<Entry>; L2_PAGE_ENTRIES]>,
}

impl L2Page {
    fn new() -> Self {
        Self {
            entries: Box::new([None; L2_PAGE_ENTRIES]),
        }
    }
}

/// How many L2 pages may be resident at once before a lookup's `insert`
/// must flush L2 and retry (spec §4.2 Insert step 2; §7 recoverable
/// condition table).
const DEFAULT_L2_PAGE_POOL_CAPACITY: usize = 4096;

struct Inner {
    l2_pages: HashMap<u64, L2Page>,
    l2_pool_capacity: usize,
    l3: HashMap<u64, u64>,
    block_links: BlockLinkSet,
    code_pages: CodePageMap,
}

pub struct LookupCache {
    l1: Box<[L1Slot]>,
    inner: ReentrantMutex<Inner>,
}

impl LookupCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_l2_pool_capacity(DEFAULT_L2_PAGE_POOL_CAPACITY)
    }

    #[must_use]
    pub fn with_l2_pool_capacity(l2_pool_capacity: usize) -> Self {
        let mut l1 = Vec::with_capacity(L1_ENTRIES);
        l1.resize_with(L1_ENTRIES, L1Slot::empty);
        Self {
            l1: l1.into_boxed_slice(),
            inner: ReentrantMutex::new(Inner {
                l2_pages: HashMap::new(),
                l2_pool_capacity,
                l3: HashMap::new(),
                block_links: BlockLinkSet::new(),
                code_pages: CodePageMap::new(),
            }),
        }
    }

    fn l1_index(guest: u64) -> usize {
        (guest & L1_MASK) as usize
    }

    /// Step 1-5 of spec §4.2 Lookup. May run concurrently with writers;
    /// never blocks.
    #[must_use]
    pub fn lookup(&self, guest: u64) -> Option<u64> {
        let slot = &self.l1[Self::l1_index(guest)];
        if slot.guest.load(Ordering::Acquire) == guest {
            let host = slot.host.load(Ordering::Acquire);
            if host != 0 {
                return Some(host);
            }
        }

        let mut inner = self.inner.lock();
        let page = guest >> 12;
        let off = (guest & 0xFFF) as usize;
        if let Some(l2_page) = inner.l2_pages.get(&page) {
            if let Some(entry) = l2_page.entries[off] {
                if entry.guest == guest {
                    self.publish_l1(guest, entry.host);
                    return Some(entry.host);
                }
            }
        }

        if let Some(&host) = inner.l3.get(&guest) {
            self.publish_l1(guest, host);
            Self::publish_l2(&mut inner, guest, host);
            return Some(host);
        }

        None
    }

    fn publish_l1(&self, guest: u64, host: u64) {
        let slot = &self.l1[Self::l1_index(guest)];
        slot.host.store(host, Ordering::Release);
        slot.guest.store(guest, Ordering::Release);
    }

    fn publish_l2(inner: &mut Inner, guest: u64, host: u64) {
        let page = guest >> 12;
        let off = (guest & 0xFFF) as usize;
        if let Some(l2_page) = inner.l2_pages.get_mut(&page) {
            l2_page.entries[off] = Some(Entry { guest, host });
        }
        // A miss here (page not resident) is fine — a subsequent lookup
        // will just fall through to L3 again until `insert` allocates it.
    }

    /// spec §4.2 Insert. Recoverable L2 exhaustion (pool at capacity) is
    /// handled internally by flushing L2 and retrying once, never surfaced
    /// to the caller (spec §7).
    pub fn insert(&self, guest: u64, host: u64) {
        let mut inner = self.inner.lock();
        debug_assert!(!inner.l3.contains_key(&guest), "guest rip already present in L3");
        inner.l3.insert(guest, host);
        self.publish_l1(guest, host);

        let page = guest >> 12;
        if !inner.l2_pages.contains_key(&page) {
            if inner.l2_pages.len() >= inner.l2_pool_capacity {
                inner.l2_pages.clear();
            }
            inner.l2_pages.insert(page, L2Page::new());
        }
        Self::publish_l2(&mut inner, guest, host);
    }

    /// spec §4.2 Erase. Runs every delinker registered against `guest`
    /// before removing the entry itself, so in-flight branches are
    /// redirected before the target stops existing.
    pub fn erase(&self, guest: u64) {
        let mut inner = self.inner.lock();
        inner.block_links.delink_all(guest);
        inner.l3.remove(&guest);

        let slot = &self.l1[Self::l1_index(guest)];
        if slot.guest.load(Ordering::Acquire) == guest {
            // host_ptr deliberately left in place (spec §3 invariant): a
            // racing reader must never observe a null host pointer for a
            // guest value that still matches.
            slot.guest.store(L1_EMPTY_GUEST, Ordering::Release);
        }

        let page = guest >> 12;
        let off = (guest & 0xFFF) as usize;
        if let Some(l2_page) = inner.l2_pages.get_mut(&page) {
            if l2_page.entries[off].is_some_and(|e| e.guest == guest) {
                l2_page.entries[off] = None;
            }
        }
    }

    pub fn add_block_link(&self, target: u64, site: u64, delinker: impl FnMut() + Send + 'static) {
        self.inner.lock().block_links.add(target, site, delinker);
    }

    #[must_use]
    pub fn add_block_executable_range(&self, guest_rip: u64, start: u64, length: u64) -> bool {
        self.inner
            .lock()
            .code_pages
            .add_block_executable_range(guest_rip, start, length)
    }

    #[must_use]
    pub fn block_link_count(&self) -> usize {
        self.inner.lock().block_links.len()
    }
}

impl Default for LookupCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn miss_then_insert_then_hit_through_l3_populates_l1_and_l2() {
        let cache = LookupCache::new();
        assert_eq!(cache.lookup(0x4000_1000), None);
        cache.insert(0x4000_1000, 0x7f00_0000);
        assert_eq!(cache.lookup(0x4000_1000), Some(0x7f00_0000));
    }

    #[test]
    fn erase_clears_guest_but_preserves_stale_host_pointer() {
        let cache = LookupCache::new();
        cache.insert(0x4000_2000, 0x7f00_1000);
        assert_eq!(cache.lookup(0x4000_2000), Some(0x7f00_1000));
        cache.erase(0x4000_2000);
        assert_eq!(cache.lookup(0x4000_2000), None);

        let slot = &cache.l1[LookupCache::l1_index(0x4000_2000)];
        assert_eq!(slot.guest.load(AtomicOrdering::Acquire), 0);
        assert_eq!(slot.host.load(AtomicOrdering::Acquire), 0x7f00_1000);
    }

    #[test]
    fn erase_runs_registered_delinkers() {
        let cache = LookupCache::new();
        cache.insert(0x5000, 0x9000);
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        cache.add_block_link(0x5000, 1, move || {
            f.fetch_add(1, AtomicOrdering::SeqCst);
        });
        cache.erase(0x5000);
        assert_eq!(fired.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn l2_pool_exhaustion_clears_and_continues_serving_inserts() {
        let cache = LookupCache::with_l2_pool_capacity(2);
        for i in 0..10u64 {
            let guest = i * 0x1000;
            cache.insert(guest, guest + 1);
        }
        // Most recently inserted entries must still be reachable (via L3
        // at worst, since L2 may have been flushed along the way).
        assert_eq!(cache.lookup(9 * 0x1000), Some(9 * 0x1000 + 1));
    }

    #[test]
    fn concurrent_lookups_and_inserts_never_observe_a_wrong_host_pointer() {
        let cache = Arc::new(LookupCache::new());
        let barrier = Arc::new(Barrier::new(4));
        let mut handles = Vec::new();
        for t in 0..4u64 {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                for i in 0..256u64 {
                    let guest = (t << 16) | i;
                    cache.insert(guest, guest ^ 0xFFFF_FFFF);
                    if let Some(host) = cache.lookup(guest) {
                        assert_eq!(host, guest ^ 0xFFFF_FFFF);
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }
}
