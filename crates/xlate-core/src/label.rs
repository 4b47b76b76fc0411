//! Backward, forward, and bidirectional jump-target bookkeeping.
//!
//! These types only record *where* a patch needs to happen and *how* to
//! interpret the immediate field once the target address is known; the
//! actual bit-splicing lives in `aarch64-asm::emitter::Emitter::bind`,
//! since that's the layer that knows each instruction's field layout.

/// How a referring instruction's immediate field should be interpreted when
/// a label is bound. Each variant corresponds to a distinct immediate
/// width/scale/signedness combination — see the range table below.
///
/// | Kind | Range | Scale |
/// |---|---|---|
/// | `B` | ±128 MiB | 4 |
/// | `BCond` / `RelativeLoad` | ±1 MiB | 4 |
/// | `TestBranch` | ±32 KiB | 4 |
/// | `Adr` | ±1 MiB | 1 |
/// | `Adrp` | ±4 GiB | 4096 |
/// | `LongAddressGen` | resolved at bind time to one of the above | — |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    Adr,
    Adrp,
    B,
    BCond,
    TestBranch,
    RelativeLoad,
    LongAddressGen,
}

impl PatchKind {
    /// Validate `offset` (bytes, signed, target minus site) against this
    /// patch kind's documented range. `LongAddressGen` performs its own
    /// range analysis at bind time and is never checked here directly.
    pub fn check_range(self, offset: i64) -> Result<(), crate::error::EncodeError> {
        let ok = match self {
            PatchKind::B => (-128 * 1024 * 1024..=128 * 1024 * 1024 - 4).contains(&offset) && offset % 4 == 0,
            PatchKind::BCond | PatchKind::RelativeLoad => {
                (-(1 << 20)..=(1 << 20) - 4).contains(&offset) && offset % 4 == 0
            }
            PatchKind::TestBranch => (-(1 << 15)..=(1 << 15) - 4).contains(&offset) && offset % 4 == 0,
            PatchKind::Adr => (-(1 << 20)..=(1 << 20) - 1).contains(&offset),
            PatchKind::Adrp => {
                let page_offset = (1i64 << 32) - 1;
                (-(1i64 << 32)..=page_offset).contains(&offset)
            }
            PatchKind::LongAddressGen => true,
        };
        if ok {
            Ok(())
        } else {
            Err(crate::error::EncodeError::LabelOutOfRange { kind: self, offset })
        }
    }
}

/// One unresolved use of a forward (or not-yet-bound bidirectional) label:
/// the byte offset of the referring instruction within its buffer, and how
/// to patch it.
#[derive(Debug, Clone, Copy)]
pub struct Site {
    pub emit_offset: usize,
    pub kind: PatchKind,
}

/// A label bound to an address that lies *before* all of its uses.
///
/// Bound exactly once, at the point it's emitted; every reference to it
/// (which must come later in program order) computes its own offset
/// immediately rather than queuing a patch.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackwardLabel {
    location: Option<usize>,
}

impl BackwardLabel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.location.is_some()
    }

    #[must_use]
    pub fn location(&self) -> Option<usize> {
        self.location
    }

    /// Bind this label to `offset`. Panics if already bound — binding a
    /// label twice is a fatal programmer error, not a recoverable one.
    pub fn bind(&mut self, offset: usize) {
        assert!(self.location.is_none(), "binding a backward label twice");
        self.location = Some(offset);
    }
}

/// A label whose uses all precede its binding site.
///
/// The first referring site is stored inline so the overwhelmingly common
/// single-use case allocates nothing; only a second or later use spills
/// into the heap-allocated tail.
#[derive(Debug, Clone, Default)]
pub struct ForwardLabel {
    first: Option<Site>,
    rest: Vec<Site>,
    bound: bool,
}

impl ForwardLabel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn add_site(&mut self, site: Site) {
        assert!(!self.bound, "adding a use after a forward label was bound");
        if self.first.is_none() {
            self.first = Some(site);
        } else {
            self.rest.push(site);
        }
    }

    pub fn sites(&self) -> impl Iterator<Item = &Site> {
        self.first.iter().chain(self.rest.iter())
    }

    /// Mark this label as bound. Panics if already bound. Does not itself
    /// patch anything — callers (the `Emitter`) iterate `sites()` first,
    /// then call this once all patches have been applied.
    pub fn mark_bound(&mut self) {
        assert!(!self.bound, "binding a forward label twice");
        self.bound = true;
    }
}

/// A label that may be used both before and after its binding point.
/// Backward uses are resolved immediately at the use site (as with
/// `BackwardLabel`); forward uses queue into the `ForwardLabel` half and are
/// patched when `bind` runs.
#[derive(Debug, Clone, Default)]
pub struct BiDirectionalLabel {
    pub backward: BackwardLabel,
    pub forward: ForwardLabel,
}

impl BiDirectionalLabel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
