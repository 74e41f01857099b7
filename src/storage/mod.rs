//! Per-class node storage: turns a class's data-page list into a place to
//! add, remove and enumerate [`Value`](crate::types::Value) records.
//!
//! Two strategies share the page-list plumbing here: [`const_size`] for
//! classes with a fixed byte width (arithmetic, positional addressing) and
//! [`var_size`] for classes containing a string somewhere (an intra-page
//! free list threaded through freed slots).

pub mod const_size;
pub mod var_size;

pub use const_size::ConstSizeNodeStorage;
pub use var_size::VarSizeNodeStorage;

use crate::alloc::PAGETABLE_OFFSET;
use crate::file::Offset;
use crate::page::{PageIndex, PAGE_SIZE};

/// Sentinel meaning "no free slot" in a page's `free_offset` field, distinct
/// from the bump-pointer meaning that field carries right after a page is
/// freshly allocated (see `PageAllocator::allocate_page`, which sets it
/// equal to `initialized_offset`). Node storage overwrites it with this
/// sentinel the moment it takes ownership of a page.
pub const NO_FREE_SLOT: u32 = u32::MAX;

pub(crate) fn page_addr(index: PageIndex) -> Offset {
    PAGETABLE_OFFSET + index * PAGE_SIZE
}
