//! The superblock and the page allocator built on top of it.
//!
//! The superblock lives in the file's first page: a magic number, the free
//! list's sentinel and count, the total page count, and the class list's
//! sentinel and count. Everything past the first page is the page table
//! proper, addressed as `PAGETABLE_OFFSET + index * PAGE_SIZE`.

use crate::error::{DbError, Result};
use crate::file::{File, Offset};
use crate::page::{Page, PageIndex, PageKind, PageList, PAGE_HEADER_SIZE, PAGE_SIZE};

/// Constant identifying a well-formed database file.
pub const MAGIC: u64 = 0xDEAD_BEEF;

const MAGIC_OFFSET: Offset = 0;
const FREE_SENTINEL_OFFSET: Offset = 8;
const PAGES_COUNT_OFFSET: Offset = FREE_SENTINEL_OFFSET + PAGE_HEADER_SIZE + 8;
const CLASS_SENTINEL_OFFSET: Offset = PAGES_COUNT_OFFSET + 8;

/// First byte of the page table; page 0 of the superblock's own "page" is
/// reserved for the header above.
pub const PAGETABLE_OFFSET: Offset = PAGE_SIZE;

/// Owns no state of its own — every method takes the `File` it operates on,
/// matching the single-owner-handle design the rest of the engine uses.
pub struct PageAllocator;

impl PageAllocator {
    /// Writes a fresh superblock: empty free list, zero pages, empty class
    /// list. Used by `Write` mode and by `Default` mode's recovery path.
    pub fn init(file: &mut File) -> Result<()> {
        file.write::<u64>(MAGIC_OFFSET, MAGIC)?;
        Self::free_list().init_empty(file)?;
        file.write::<u64>(PAGES_COUNT_OFFSET, 0)?;
        Self::class_list().init_empty(file)?;
        if file.size() < PAGETABLE_OFFSET {
            file.extend(PAGETABLE_OFFSET - file.size())?;
        }
        Ok(())
    }

    /// Validates the magic number without touching anything else.
    pub fn check(file: &mut File) -> Result<()> {
        if file.size() < PAGETABLE_OFFSET {
            return Err(DbError::Structure("file too small for a superblock".into()));
        }
        let magic = file.read::<u64>(MAGIC_OFFSET)?;
        if magic != MAGIC {
            return Err(DbError::Structure(format!(
                "bad superblock magic: {magic:#x}"
            )));
        }
        Ok(())
    }

    pub fn free_list() -> PageList {
        PageList::new(FREE_SENTINEL_OFFSET, PAGETABLE_OFFSET)
    }

    pub fn class_list() -> PageList {
        PageList::new(CLASS_SENTINEL_OFFSET, PAGETABLE_OFFSET)
    }

    pub fn pages_count(file: &mut File) -> Result<u64> {
        file.read::<u64>(PAGES_COUNT_OFFSET)
    }

    fn set_pages_count(file: &mut File, count: u64) -> Result<()> {
        file.write::<u64>(PAGES_COUNT_OFFSET, count)
    }

    /// Pops the free list's front if non-empty, else grows the file by one
    /// page. Either way returns a standalone page (self-looped `prev`/
    /// `next`) of the requested kind, header-only.
    pub fn allocate_page(file: &mut File, kind: PageKind) -> Result<PageIndex> {
        let free = Self::free_list();
        if let Some(index) = free.pop_front(file)? {
            let mut page = free.read_page(file, index)?;
            page.kind = kind;
            page.initialized_offset = PAGE_HEADER_SIZE as u32;
            page.free_offset = PAGE_HEADER_SIZE as u32;
            page.actual_size = 0;
            page.prev = index;
            page.next = index;
            free.write_page(file, &page)?;
            return Ok(index);
        }

        let index = Self::pages_count(file)?;
        file.extend(PAGE_SIZE)?;
        let mut page = Page::fresh(index);
        page.kind = kind;
        page.write_at(file, PAGETABLE_OFFSET + index * PAGE_SIZE)?;
        Self::set_pages_count(file, index + 1)?;
        Ok(index)
    }

    /// Marks `index` free and links it at the front of the free list. The
    /// caller must already have unlinked `index` from any list it was a
    /// member of.
    pub fn free_page(file: &mut File, index: PageIndex) -> Result<()> {
        let free = Self::free_list();
        let mut page = free.read_page(file, index)?;
        page.kind = PageKind::Free;
        page.prev = index;
        page.next = index;
        free.write_page(file, &page)?;
        free.push_front(file, index)?;
        Self::truncate_trailing_free_pages(file)?;
        Ok(())
    }

    /// Best-effort: if the file's tail pages are all on the free list,
    /// unlink and drop them to shrink the file. Not required for
    /// correctness, only for reclaiming disk space.
    fn truncate_trailing_free_pages(file: &mut File) -> Result<()> {
        let free = Self::free_list();
        loop {
            let count = Self::pages_count(file)?;
            if count == 0 {
                break;
            }
            let last = count - 1;
            let free_indices = free.iter_indices(file)?;
            if !free_indices.contains(&last) {
                break;
            }
            free.unlink(file, last)?;
            file.truncate(PAGETABLE_OFFSET + last * PAGE_SIZE)?;
            Self::set_pages_count(file, last)?;
        }
        Ok(())
    }
}
