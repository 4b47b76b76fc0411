//! The guest-to-host block lookup cache: L1/L2/L3 lookup, block-link
//! registry, and code-page tracking (spec §3 "Lookup cache", §4.2).

pub mod block_link;
pub mod code_pages;
pub mod lookup;
pub mod recursive_mutex;

pub use block_link::{BlockLink, BlockLinkSet};
pub use code_pages::CodePageMap;
pub use lookup::LookupCache;
pub use recursive_mutex::{ReentrantMutex, ReentrantMutexGuard};
