//! Cross-block direct linking (spec §4.4 "Block linking / delinking").
//!
//! A compiled block ends with an exit stub that either falls through to a
//! dispatcher (the target isn't compiled yet) or jumps straight into the
//! target block's host code (it is). [`link_exit`] performs the lookup and
//! picks a direct `B` patch when the target is in range, otherwise an
//! indirect load-and-branch through a pointer slot the exit stub reserved.
//! Either way a delinker closure is registered with the cache so a later
//! `erase` of the target can undo the patch and fall back to the
//! dispatcher.

use xlate_cache::LookupCache;
use xlate_core::buffer::Buffer;
use xlate_core::label::PatchKind;
use xlate_core::register::x;

fn b_word(imm: i64) -> u32 {
    (0b000101 << 26) | (((imm / 4) as u32) & 0x3FF_FFFF)
}

/// Where a compiled block's exit stub can be patched.
#[derive(Debug, Clone, Copy)]
pub struct ExitSite {
    /// Guest RIP this exit falls through to if taken.
    pub target_guest_rip: u64,
    /// Byte offset, within the owning buffer, of the direct-branch slot
    /// (always emitted, even when unused, so relinking never needs to grow
    /// the block).
    pub branch_site_offset: usize,
    /// Byte offset of the 8-byte indirect-pointer slot used when the
    /// target is out of direct-branch range.
    pub pointer_site_offset: usize,
    /// Identifies this exit for `LookupCache::add_block_link`'s `site` key.
    pub site_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Target wasn't in the cache; exit stub left pointing at the dispatcher.
    Miss,
    /// Patched a direct `B` at `branch_site_offset`.
    Direct,
    /// Patched the pointer slot at `pointer_site_offset`; the exit stub's
    /// indirect-branch path will pick it up.
    Indirect,
}

/// Attempt to link `exit` to its target block, if the target is already
/// compiled. On a hit, also registers a delinker so [`LookupCache::erase`]
/// of the target reverts this patch back to a dispatcher exit.
pub fn link_exit(cache: &LookupCache, buffer_base: *mut u8, exit: ExitSite) -> LinkOutcome {
    let Some(host_target) = cache.lookup(exit.target_guest_rip) else {
        return LinkOutcome::Miss;
    };

    let branch_addr = buffer_base as i64 + exit.branch_site_offset as i64;
    let delta = host_target as i64 - branch_addr;

    let outcome = if PatchKind::B.check_range(delta).is_ok() {
        patch_direct(buffer_base, exit.branch_site_offset, delta);
        LinkOutcome::Direct
    } else {
        patch_indirect(buffer_base, exit.pointer_site_offset, host_target);
        LinkOutcome::Indirect
    };

    let dispatcher_buffer_base = buffer_base as usize;
    let offset = exit.branch_site_offset;
    let pointer_offset = exit.pointer_site_offset;
    let style = outcome;
    cache.add_block_link(exit.target_guest_rip, exit.site_id, move || {
        // SAFETY: `dispatcher_buffer_base` names a buffer kept alive for as
        // long as this closure is registered — the buffer manager retains
        // it until every link into it has been delinked.
        let base = dispatcher_buffer_base as *mut u8;
        match style {
            LinkOutcome::Direct => unpatch_direct(base, offset),
            LinkOutcome::Indirect => unpatch_indirect(base, pointer_offset),
            LinkOutcome::Miss => {}
        }
    });

    outcome
}

fn patch_direct(buffer_base: *mut u8, site_offset: usize, delta: i64) {
    // SAFETY: `site_offset` lies within the buffer this patch targets, and
    // the caller (the buffer manager) guarantees exclusive access while
    // linking runs.
    let mut buf = unsafe { Buffer::new(buffer_base, site_offset + 4) };
    buf.patch_u32_at(site_offset, |_| b_word(delta));
}

/// Relinks the exit stub back to the dispatcher fallthrough: the stub
/// always reserves the next four bytes as a `B` to the per-block dispatcher
/// call, so unpatching is just re-pointing one instruction ahead.
fn unpatch_direct(buffer_base: *mut u8, site_offset: usize) {
    let mut buf = unsafe { Buffer::new(buffer_base, site_offset + 4) };
    buf.patch_u32_at(site_offset, |_| b_word(4));
}

fn patch_indirect(buffer_base: *mut u8, pointer_offset: usize, host_target: u64) {
    // SAFETY: see `patch_direct`.
    let mut buf = unsafe { Buffer::new(buffer_base, pointer_offset + 8) };
    buf.patch_u64_at(pointer_offset, host_target);
}

fn unpatch_indirect(buffer_base: *mut u8, pointer_offset: usize) {
    let mut buf = unsafe { Buffer::new(buffer_base, pointer_offset + 8) };
    buf.patch_u64_at(pointer_offset, 0);
}

/// Scratch register used to hold an indirect exit target while branching
/// through it (spec §6.3 fallback/indirect branch convention).
pub const INDIRECT_SCRATCH: xlate_core::register::XRegister = x::R16;

#[cfg(test)]
mod tests {
    use super::*;

    fn backing(len: usize) -> Vec<u8> {
        vec![0u8; len]
    }

    #[test]
    fn miss_leaves_slots_untouched() {
        let cache = LookupCache::new();
        let mut mem = backing(64);
        let outcome = link_exit(
            &cache,
            mem.as_mut_ptr(),
            ExitSite {
                target_guest_rip: 0x4000,
                branch_site_offset: 0,
                pointer_site_offset: 16,
                site_id: 1,
            },
        );
        assert_eq!(outcome, LinkOutcome::Miss);
        assert_eq!(&mem[0..4], &[0, 0, 0, 0]);
    }

    #[test]
    fn hit_within_branch_range_patches_direct_and_delink_restores_fallthrough() {
        let cache = LookupCache::new();
        let mut mem = backing(64);
        let base = mem.as_mut_ptr();
        cache.insert(0x4000, base as u64 + 32);
        let outcome = link_exit(
            &cache,
            base,
            ExitSite {
                target_guest_rip: 0x4000,
                branch_site_offset: 0,
                pointer_site_offset: 16,
                site_id: 1,
            },
        );
        assert_eq!(outcome, LinkOutcome::Direct);
        let patched = u32::from_le_bytes(mem[0..4].try_into().unwrap());
        assert_eq!(patched >> 26, 0b000101);

        cache.erase(0x4000);
        let restored = u32::from_le_bytes(mem[0..4].try_into().unwrap());
        assert_eq!(restored, b_word(4));
    }

    #[test]
    fn hit_far_away_patches_indirect_pointer_slot() {
        let cache = LookupCache::new();
        let mut mem = backing(64);
        let base = mem.as_mut_ptr();
        let far_target = 0x20_0000_0000u64;
        cache.insert(0x5000, far_target);
        let outcome = link_exit(
            &cache,
            base,
            ExitSite {
                target_guest_rip: 0x5000,
                branch_site_offset: 0,
                pointer_site_offset: 16,
                site_id: 2,
            },
        );
        assert_eq!(outcome, LinkOutcome::Indirect);
        let patched = u64::from_le_bytes(mem[16..24].try_into().unwrap());
        assert_eq!(patched, far_target);

        cache.erase(0x5000);
        let restored = u64::from_le_bytes(mem[16..24].try_into().unwrap());
        assert_eq!(restored, 0);
    }
}
