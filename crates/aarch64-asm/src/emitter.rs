//! The label-aware cursor every encoder module (`alu`, `branch`, `loadstore`,
//! `system`, `scalar_fp`, `asimd`, `sve`) adds inherent methods to.
//!
//! `Emitter` itself only knows how to place words and patch them once a
//! label binds; it has no opinion on what any particular opcode looks like.
//! That split mirrors the teacher's per-opcode-family module layout, just
//! applied to an instruction encoder instead of a CPU's opcode table.

use std::ops::{Deref, DerefMut};

use xlate_core::buffer::Buffer;
use xlate_core::label::{BackwardLabel, BiDirectionalLabel, ForwardLabel, PatchKind, Site};
use xlate_core::register::XRegister;

pub struct Emitter {
    buf: Buffer,
}

impl Deref for Emitter {
    type Target = Buffer;
    fn deref(&self) -> &Buffer {
        &self.buf
    }
}

impl DerefMut for Emitter {
    fn deref_mut(&mut self) -> &mut Buffer {
        &mut self.buf
    }
}

impl Emitter {
    #[must_use]
    pub fn new(buf: Buffer) -> Self {
        Self { buf }
    }

    #[must_use]
    pub fn into_buffer(self) -> Buffer {
        self.buf
    }

    /// Run `f` with the cursor temporarily relocated to `offset`, restoring
    /// it afterwards. Unlike `Buffer::with_cursor_at`, `f` sees the whole
    /// `Emitter` so it can call encoder methods, not just raw word writes.
    pub fn with_cursor_at(&mut self, offset: usize, f: impl FnOnce(&mut Self)) {
        let saved = self.buf.cursor_offset();
        self.buf.set_cursor_offset(offset);
        f(self);
        self.buf.set_cursor_offset(saved);
    }

    pub fn bind_backward(&mut self, label: &mut BackwardLabel) {
        label.bind(self.buf.cursor_offset());
    }

    pub fn bind_forward(&mut self, label: &mut ForwardLabel) {
        let bound = self.buf.cursor_offset();
        let sites: Vec<Site> = label.sites().copied().collect();
        for site in sites {
            self.patch_site(site, bound);
        }
        label.mark_bound();
    }

    pub fn bind_bidirectional(&mut self, label: &mut BiDirectionalLabel) {
        if !label.backward.is_bound() {
            self.bind_backward(&mut label.backward);
        }
        self.bind_forward(&mut label.forward);
    }

    /// Offset from the current cursor to an already-bound backward label,
    /// for encoders that compute the immediate inline rather than queuing a
    /// patch.
    pub fn backward_offset(&self, label: &BackwardLabel) -> i64 {
        let location = label
            .location()
            .expect("using an unbound backward label") as i64;
        location - self.buf.cursor_offset() as i64
    }

    /// Record a forward use at the current cursor position. Callers follow
    /// this with a raw emit of the placeholder instruction (immediate = 0).
    pub fn record_forward_use(&mut self, label: &mut ForwardLabel, kind: PatchKind) {
        let site = self.buf.cursor_offset();
        label.add_site(Site {
            emit_offset: site,
            kind,
        });
    }

    fn patch_site(&mut self, site: Site, bound_offset: usize) {
        let offset = bound_offset as i64 - site.emit_offset as i64;
        match site.kind {
            PatchKind::B => {
                site.kind.check_range(offset).expect("label out of range");
                let imm26 = ((offset / 4) as u32) & 0x3FF_FFFF;
                self.buf
                    .patch_u32_at(site.emit_offset, |word| (word & !0x3FF_FFFF) | imm26);
            }
            PatchKind::BCond | PatchKind::RelativeLoad => {
                site.kind.check_range(offset).expect("label out of range");
                let imm19 = ((offset / 4) as u32) & 0x7_FFFF;
                self.buf
                    .patch_u32_at(site.emit_offset, |word| (word & !(0x7_FFFF << 5)) | (imm19 << 5));
            }
            PatchKind::TestBranch => {
                site.kind.check_range(offset).expect("label out of range");
                let imm14 = ((offset / 4) as u32) & 0x3FFF;
                self.buf
                    .patch_u32_at(site.emit_offset, |word| (word & !(0x3FFF << 5)) | (imm14 << 5));
            }
            PatchKind::Adr => {
                site.kind.check_range(offset).expect("label out of range");
                let (immlo, immhi) = encode_adr_split(offset);
                self.buf.patch_u32_at(site.emit_offset, |word| {
                    let mask = (0b11 << 29) | (0x7_FFFF << 5);
                    (word & !mask) | (immlo << 29) | (immhi << 5)
                });
            }
            PatchKind::Adrp => {
                let page_offset = (bound_offset as i64 >> 12) - (site.emit_offset as i64 >> 12);
                site.kind.check_range(page_offset).expect("label out of range");
                let (immlo, immhi) = encode_adr_split(page_offset);
                self.buf.patch_u32_at(site.emit_offset, |word| {
                    let mask = (0b11 << 29) | (0x7_FFFF << 5);
                    (word & !mask) | (immlo << 29) | (immhi << 5)
                });
            }
            PatchKind::LongAddressGen => self.patch_long_address_gen(site.emit_offset, bound_offset),
        }
    }

    /// Resolve a previously-recorded long-address-generation use into either
    /// `nop; adr` (target within ADR's unscaled ±1 MiB reach of the second
    /// instruction slot), `nop; adrp` (target is itself 4 KiB-aligned, so a
    /// bare page address is the whole answer), or `adrp; add` (general case).
    fn patch_long_address_gen(&mut self, site_offset: usize, bound_offset: usize) {
        let rd = XRegister::new(self.buf.read_u32_at(site_offset));
        let second_slot = site_offset + 4;

        let imm_from_second = bound_offset as i64 - second_slot as i64;
        if PatchKind::Adr.check_range(imm_from_second).is_ok() {
            self.with_cursor_at(site_offset, |e| {
                e.nop();
                e.adr_raw(rd, imm_from_second);
            });
            return;
        }

        if bound_offset & 0xFFF == 0 {
            let page_offset = (bound_offset as i64 >> 12) - (second_slot as i64 >> 12);
            PatchKind::Adrp
                .check_range(page_offset)
                .expect("adrp page offset out of range in long address generation");
            self.with_cursor_at(site_offset, |e| {
                e.nop();
                e.adrp_raw(rd, page_offset);
            });
            return;
        }

        let page_offset = (bound_offset as i64 >> 12) - (site_offset as i64 >> 12);
        PatchKind::Adrp
            .check_range(page_offset)
            .expect("adrp page offset out of range in long address generation");
        let add_imm = (bound_offset & 0xFFF) as u32;
        self.with_cursor_at(site_offset, |e| {
            e.adrp_raw(rd, page_offset);
            e.add_imm(xlate_core::register::Size::I64, rd, rd, add_imm);
        });
    }

    /// Emit a `nop; nop` placeholder pair for a long-address-generation use
    /// and record the site. The destination register index is stashed in
    /// the first placeholder word so `patch_long_address_gen` can recover it
    /// without a separate side table.
    pub fn record_long_address_gen(&mut self, label: &mut ForwardLabel, rd: XRegister) {
        self.record_forward_use(label, PatchKind::LongAddressGen);
        self.buf.emit_u32(rd.idx());
        self.buf.emit_u32(0);
    }
}

/// Split a 21-bit signed byte offset into ADR/ADRP's `immlo`(2)/`immhi`(19)
/// fields.
pub(crate) fn encode_adr_split(imm: i64) -> (u32, u32) {
    let imm21 = (imm as i32 as u32) & 0x1F_FFFF;
    let immlo = imm21 & 0b11;
    let immhi = imm21 >> 2;
    (immlo, immhi)
}
