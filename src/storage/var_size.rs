//! Variable-size node storage: records differ in length (any class
//! containing a string), so slots can't be addressed positionally. Ids
//! come from the class header's `next_id` counter instead, and freed
//! slots are tracked by an intra-page free list distinct from the node
//! framing used for live records — a free slot also has to remember its
//! own capacity so a scan can skip over it, which the shared `Node::free`
//! representation doesn't carry.

use crate::alloc::PageAllocator;
use crate::catalog::{node_list, ClassStorage};
use crate::error::{DbError, Result};
use crate::file::{File, Offset};
use crate::node::{Node, VALID_HEADER_SIZE};
use crate::page::{Page, PageIndex, PageKind, PageList, PAGE_HEADER_SIZE, PAGE_SIZE};
use crate::types::object::type_mismatch;
use crate::types::{Class, Value};

use super::{page_addr, NO_FREE_SLOT};

const FREE_NEXT_REL: u64 = 8;
const FREE_CAPACITY_REL: u64 = 12;
/// Minimum span a free-slot header needs; every var-size class's smallest
/// possible record (a single empty string field) is at least this wide.
const FREE_HEADER_SIZE: u64 = 20;

pub struct VarSizeNodeStorage;

impl VarSizeNodeStorage {
    fn write_free_header(file: &mut File, offset: Offset, magic: u64, next_free: u32, capacity: u64) -> Result<()> {
        file.write::<u64>(offset, !magic)?;
        file.write::<u32>(offset + FREE_NEXT_REL, next_free)?;
        file.write::<u64>(offset + FREE_CAPACITY_REL, capacity)
    }

    fn read_free_next(file: &mut File, offset: Offset) -> Result<u32> {
        file.read::<u32>(offset + FREE_NEXT_REL)
    }

    fn read_free_capacity(file: &mut File, offset: Offset) -> Result<u64> {
        file.read::<u64>(offset + FREE_CAPACITY_REL)
    }

    /// Registers `value`, reusing a same-or-larger free slot in any of the
    /// class's pages if one exists, else appending to the last page's
    /// unused tail, else growing the class with a fresh page.
    pub fn add_node(
        catalog: &ClassStorage,
        file: &mut File,
        class_index: PageIndex,
        class: &Class,
        value: Value,
    ) -> Result<u64> {
        if !value.matches_class(class) {
            return Err(type_mismatch(class));
        }

        let required = VALID_HEADER_SIZE + value.size();
        let magic = catalog.magic(file, class_index)?;
        let list = node_list(class_index);

        // A candidate slot is only usable if it fits exactly or leaves a
        // remainder wide enough to carry its own free header — otherwise
        // the leftover bytes after the new, shorter record would sit
        // untracked between it and the next record, and a sequential scan
        // would land inside them instead of at a record or a free header.
        let mut reuse: Option<(PageIndex, u32, u32, u64)> = None; // (page, slot_rel, prev_rel_or_sentinel, capacity)
        'pages: for index in list.iter_indices(file)? {
            let page = Page::read_at(file, page_addr(index))?;
            let mut prev_rel = NO_FREE_SLOT;
            let mut cur = page.free_offset;
            while cur != NO_FREE_SLOT {
                let slot_addr = page_addr(index) + cur as u64;
                let capacity = Self::read_free_capacity(file, slot_addr)?;
                if capacity == required || capacity >= required + FREE_HEADER_SIZE {
                    reuse = Some((index, cur, prev_rel, capacity));
                    break 'pages;
                }
                prev_rel = cur;
                cur = Self::read_free_next(file, slot_addr)?;
            }
        }

        let id = catalog.next_id(file, class_index)?;
        catalog.set_next_id(file, class_index, id + 1)?;
        let node = Node::valid(id, value);

        if let Some((page_index, slot_rel, prev_rel, capacity)) = reuse {
            let mut page = Page::read_at(file, page_addr(page_index))?;
            let slot_addr = page_addr(page_index) + slot_rel as u64;
            let mut next = Self::read_free_next(file, slot_addr)?;

            if capacity > required {
                let remainder_addr = slot_addr + required;
                let remainder_rel = (remainder_addr - page_addr(page_index)) as u32;
                Self::write_free_header(file, remainder_addr, magic, next, capacity - required)?;
                next = remainder_rel;
            }

            if prev_rel == NO_FREE_SLOT {
                page.free_offset = next;
            } else {
                let prev_addr = page_addr(page_index) + prev_rel as u64;
                file.write::<u32>(prev_addr + FREE_NEXT_REL, next)?;
            }
            page.actual_size += 1;
            page.write_at(file, page_addr(page_index))?;
            node.write(file, slot_addr, magic)?;
            return Ok(id);
        }

        // No reusable slot: try the last page's bump tail, else grow.
        let page_index = match list.back(file)? {
            Some(index) => {
                let page = Page::read_at(file, page_addr(index))?;
                if (page.initialized_offset as u64) + required <= PAGE_SIZE {
                    index
                } else {
                    Self::allocate_class_page(file, &list)?
                }
            }
            None => Self::allocate_class_page(file, &list)?,
        };

        let mut page = Page::read_at(file, page_addr(page_index))?;
        let offset = page_addr(page_index) + page.initialized_offset as u64;
        node.write(file, offset, magic)?;
        page.initialized_offset += required as u32;
        page.actual_size += 1;
        page.write_at(file, page_addr(page_index))?;
        Ok(id)
    }

    fn allocate_class_page(file: &mut File, list: &PageList) -> Result<PageIndex> {
        let index = PageAllocator::allocate_page(file, PageKind::Data)?;
        let mut page = Page::read_at(file, page_addr(index))?;
        page.free_offset = NO_FREE_SLOT;
        page.write_at(file, page_addr(index))?;
        list.push_back(file, index)?;
        Ok(index)
    }

    /// Scans every page looking for `id`, frees its slot in place, and
    /// drops the page entirely once it holds no more live records.
    pub fn remove_node(
        catalog: &ClassStorage,
        file: &mut File,
        class_index: PageIndex,
        class: &Class,
        id: u64,
    ) -> Result<()> {
        let magic = catalog.magic(file, class_index)?;
        let list = node_list(class_index);
        for index in list.iter_indices(file)? {
            let mut page = Page::read_at(file, page_addr(index))?;
            let mut cursor: u32 = PAGE_HEADER_SIZE as u32;
            while (cursor as u64) < page.initialized_offset as u64 {
                let offset = page_addr(index) + cursor as u64;
                let tag = file.read::<u64>(offset)?;
                if tag == magic {
                    let node = Node::read(class, file, offset, magic)?;
                    let record_size = (VALID_HEADER_SIZE + node.value()?.size()) as u32;
                    if node.id()? == id {
                        Self::write_free_header(file, offset, magic, page.free_offset, record_size as u64)?;
                        page.free_offset = cursor;
                        page.actual_size = page.actual_size.saturating_sub(1);
                        if page.actual_size == 0 {
                            list.unlink(file, index)?;
                            PageAllocator::free_page(file, index)?;
                        } else {
                            page.write_at(file, page_addr(index))?;
                        }
                        return Ok(());
                    }
                    cursor += record_size;
                } else if tag == !magic {
                    let capacity = Self::read_free_capacity(file, offset)? as u32;
                    cursor += capacity.max(FREE_HEADER_SIZE as u32);
                } else {
                    break;
                }
            }
        }
        Err(DbError::BadArgument(format!("no node with id {id}")))
    }

    /// Calls `f` with every live `(id, value)` pair across every page.
    pub fn visit_nodes<F>(
        catalog: &ClassStorage,
        file: &mut File,
        class_index: PageIndex,
        class: &Class,
        mut f: F,
    ) -> Result<()>
    where
        F: FnMut(u64, &Value) -> Result<()>,
    {
        let magic = catalog.magic(file, class_index)?;
        let list = node_list(class_index);
        for index in list.iter_indices(file)? {
            let page = Page::read_at(file, page_addr(index))?;
            let mut cursor: u32 = PAGE_HEADER_SIZE as u32;
            while (cursor as u64) < page.initialized_offset as u64 {
                let offset = page_addr(index) + cursor as u64;
                let tag = file.read::<u64>(offset)?;
                if tag == magic {
                    let node = Node::read(class, file, offset, magic)?;
                    let record_size = (VALID_HEADER_SIZE + node.value()?.size()) as u32;
                    f(node.id()?, node.value()?)?;
                    cursor += record_size;
                } else if tag == !magic {
                    let capacity = Self::read_free_capacity(file, offset)? as u32;
                    cursor += capacity.max(FREE_HEADER_SIZE as u32);
                } else {
                    break;
                }
            }
        }
        Ok(())
    }
}
