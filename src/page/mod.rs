//! Page records and the circular doubly-linked intrusive page list.
//!
//! Every page — whether a data page, a class header, or a free page — opens
//! with the same fixed-width header. Page lists (the free list, the class
//! list, each class's data-page list) thread pages together through that
//! header's `prev`/`next` fields and are anchored by a sentinel record
//! stored at a fixed offset rather than inside the page table itself.

use crate::error::{DbError, Result};
use crate::file::{File, Offset};

/// Fixed page size for the whole file.
pub const PAGE_SIZE: u64 = 4096;

/// On-disk width of a [`Page`] header.
pub const PAGE_HEADER_SIZE: u64 = 48;

/// Identifies a page by its position in the page table, or the reserved
/// sentinel value used by every [`PageList`] anchor.
pub type PageIndex = u64;

/// Reserved index naming a list's sentinel record rather than a real page.
pub const SENTINEL_INDEX: PageIndex = u64::MAX;

const KIND_OFFSET: Offset = 0;
const INDEX_OFFSET: Offset = 8;
const INITIALIZED_OFFSET_OFFSET: Offset = 16;
const FREE_OFFSET_OFFSET: Offset = 20;
const ACTUAL_SIZE_OFFSET: Offset = 24;
const PREV_OFFSET: Offset = 32;
const NEXT_OFFSET: Offset = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    ClassHeader,
    Data,
    Free,
    Sentinel,
}

impl PageKind {
    fn to_u8(self) -> u8 {
        match self {
            PageKind::ClassHeader => 0,
            PageKind::Data => 1,
            PageKind::Free => 2,
            PageKind::Sentinel => 3,
        }
    }

    fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(PageKind::ClassHeader),
            1 => Ok(PageKind::Data),
            2 => Ok(PageKind::Free),
            3 => Ok(PageKind::Sentinel),
            other => Err(DbError::Structure(format!("unknown page kind tag {other}"))),
        }
    }
}

/// A page header: kind, position, payload bookkeeping, and list links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub kind: PageKind,
    pub index: PageIndex,
    pub initialized_offset: u32,
    pub free_offset: u32,
    pub actual_size: u64,
    pub prev: PageIndex,
    pub next: PageIndex,
}

impl Page {
    /// A standalone free page, self-looped (not yet linked into any list).
    pub fn fresh(index: PageIndex) -> Self {
        Page {
            kind: PageKind::Free,
            index,
            initialized_offset: PAGE_HEADER_SIZE as u32,
            free_offset: PAGE_HEADER_SIZE as u32,
            actual_size: 0,
            prev: index,
            next: index,
        }
    }

    /// An empty sentinel record: self-looped onto the reserved index.
    pub fn empty_sentinel() -> Self {
        Page {
            kind: PageKind::Sentinel,
            index: SENTINEL_INDEX,
            initialized_offset: 0,
            free_offset: 0,
            actual_size: 0,
            prev: SENTINEL_INDEX,
            next: SENTINEL_INDEX,
        }
    }

    pub fn read_at(file: &mut File, offset: Offset) -> Result<Self> {
        let kind = PageKind::from_u8(file.read::<u8>(offset + KIND_OFFSET)?)?;
        Ok(Page {
            kind,
            index: file.read::<u64>(offset + INDEX_OFFSET)?,
            initialized_offset: file.read::<u32>(offset + INITIALIZED_OFFSET_OFFSET)?,
            free_offset: file.read::<u32>(offset + FREE_OFFSET_OFFSET)?,
            actual_size: file.read::<u64>(offset + ACTUAL_SIZE_OFFSET)?,
            prev: file.read::<u64>(offset + PREV_OFFSET)?,
            next: file.read::<u64>(offset + NEXT_OFFSET)?,
        })
    }

    pub fn write_at(&self, file: &mut File, offset: Offset) -> Result<()> {
        file.write::<u8>(offset + KIND_OFFSET, self.kind.to_u8())?;
        file.write::<u64>(offset + INDEX_OFFSET, self.index)?;
        file.write::<u32>(offset + INITIALIZED_OFFSET_OFFSET, self.initialized_offset)?;
        file.write::<u32>(offset + FREE_OFFSET_OFFSET, self.free_offset)?;
        file.write::<u64>(offset + ACTUAL_SIZE_OFFSET, self.actual_size)?;
        file.write::<u64>(offset + PREV_OFFSET, self.prev)?;
        file.write::<u64>(offset + NEXT_OFFSET, self.next)?;
        Ok(())
    }
}

/// A circular doubly-linked list of pages, anchored by a sentinel record
/// living at a fixed offset (inside the superblock or a class header)
/// rather than in the page table.
pub struct PageList {
    sentinel_offset: Offset,
    page_table_base: Offset,
}

impl PageList {
    pub fn new(sentinel_offset: Offset, page_table_base: Offset) -> Self {
        PageList {
            sentinel_offset,
            page_table_base,
        }
    }

    fn address_of(&self, index: PageIndex) -> Offset {
        if index == SENTINEL_INDEX {
            self.sentinel_offset
        } else {
            self.page_table_base + index * PAGE_SIZE
        }
    }

    fn count_offset(&self) -> Offset {
        self.sentinel_offset + PAGE_HEADER_SIZE
    }

    pub fn read_page(&self, file: &mut File, index: PageIndex) -> Result<Page> {
        Page::read_at(file, self.address_of(index))
    }

    pub fn write_page(&self, file: &mut File, page: &Page) -> Result<()> {
        page.write_at(file, self.address_of(page.index))
    }

    /// Writes an empty sentinel and zero count; used when a fresh list is
    /// first created.
    pub fn init_empty(&self, file: &mut File) -> Result<()> {
        Page::empty_sentinel().write_at(file, self.sentinel_offset)?;
        file.write::<u64>(self.count_offset(), 0)
    }

    pub fn pages_count(&self, file: &mut File) -> Result<u64> {
        file.read::<u64>(self.count_offset())
    }

    fn set_pages_count(&self, file: &mut File, count: u64) -> Result<()> {
        file.write::<u64>(self.count_offset(), count)
    }

    pub fn is_empty(&self, file: &mut File) -> Result<bool> {
        Ok(self.pages_count(file)? == 0)
    }

    /// Head of the list (first pushed via `push_front`), or `None` if empty.
    pub fn front(&self, file: &mut File) -> Result<Option<PageIndex>> {
        let sentinel = self.read_page(file, SENTINEL_INDEX)?;
        if sentinel.next == SENTINEL_INDEX {
            Ok(None)
        } else {
            Ok(Some(sentinel.next))
        }
    }

    /// Tail of the list (last pushed via `push_back`), or `None` if empty.
    pub fn back(&self, file: &mut File) -> Result<Option<PageIndex>> {
        let sentinel = self.read_page(file, SENTINEL_INDEX)?;
        if sentinel.prev == SENTINEL_INDEX {
            Ok(None)
        } else {
            Ok(Some(sentinel.prev))
        }
    }

    /// Splices `index` into the list immediately before `before`.
    pub fn link_before(&self, file: &mut File, before: PageIndex, index: PageIndex) -> Result<()> {
        let mut before_page = self.read_page(file, before)?;
        let before_prev_index = before_page.prev;
        let mut before_prev_page = self.read_page(file, before_prev_index)?;

        let mut it = self.read_page(file, index)?;
        it.prev = before_prev_index;
        it.next = before;
        self.write_page(file, &it)?;

        before_prev_page.next = index;
        self.write_page(file, &before_prev_page)?;

        before_page.prev = index;
        self.write_page(file, &before_page)?;

        let count = self.pages_count(file)?;
        self.set_pages_count(file, count + 1)
    }

    /// Removes `index` from wherever it sits in the list. Unlinking the
    /// sole remaining element restores the sentinel's self-loop because its
    /// own prev/next are written back unchanged.
    pub fn unlink(&self, file: &mut File, index: PageIndex) -> Result<()> {
        let it = self.read_page(file, index)?;
        let mut prev_page = self.read_page(file, it.prev)?;
        let mut next_page = self.read_page(file, it.next)?;

        prev_page.next = it.next;
        self.write_page(file, &prev_page)?;

        next_page.prev = it.prev;
        self.write_page(file, &next_page)?;

        let count = self.pages_count(file)?;
        self.set_pages_count(file, count.saturating_sub(1))
    }

    pub fn push_front(&self, file: &mut File, index: PageIndex) -> Result<()> {
        let sentinel = self.read_page(file, SENTINEL_INDEX)?;
        self.link_before(file, sentinel.next, index)
    }

    pub fn push_back(&self, file: &mut File, index: PageIndex) -> Result<()> {
        self.link_before(file, SENTINEL_INDEX, index)
    }

    pub fn pop_front(&self, file: &mut File) -> Result<Option<PageIndex>> {
        match self.front(file)? {
            None => Ok(None),
            Some(index) => {
                self.unlink(file, index)?;
                Ok(Some(index))
            }
        }
    }

    pub fn pop_back(&self, file: &mut File) -> Result<Option<PageIndex>> {
        match self.back(file)? {
            None => Ok(None),
            Some(index) => {
                self.unlink(file, index)?;
                Ok(Some(index))
            }
        }
    }

    /// Collects every page index reachable from the sentinel, walking the
    /// `prev` chain (the order the original implementation iterates in).
    pub fn iter_indices(&self, file: &mut File) -> Result<Vec<PageIndex>> {
        let mut out = Vec::new();
        let sentinel = self.read_page(file, SENTINEL_INDEX)?;
        let mut cur = sentinel.prev;
        while cur != SENTINEL_INDEX {
            out.push(cur);
            let page = self.read_page(file, cur)?;
            cur = page.prev;
        }
        Ok(out)
    }
}
