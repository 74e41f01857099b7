//! Fixed-slot node storage: every record in a class's data pages is the
//! same width, so a record's id is derived purely from where it sits —
//! `page_index * slots_per_page + local_slot` — rather than from a
//! separately allocated counter. Freeing a slot never touches this
//! arithmetic, so the positional id stays authoritative even across a
//! free/reuse cycle: whatever value gets written there next recomputes and
//! stores the very same id.

use crate::alloc::PageAllocator;
use crate::catalog::{node_list, ClassStorage};
use crate::error::{DbError, Result};
use crate::file::File;
use crate::node::{Node, VALID_HEADER_SIZE};
use crate::page::{Page, PageIndex, PageKind, PAGE_HEADER_SIZE, PAGE_SIZE};
use crate::types::object::type_mismatch;
use crate::types::{Class, Value};

use super::{page_addr, NO_FREE_SLOT};

pub struct ConstSizeNodeStorage;

impl ConstSizeNodeStorage {
    pub fn record_size(class: &Class) -> u64 {
        VALID_HEADER_SIZE
            + class
                .size()
                .expect("ConstSizeNodeStorage requires a fixed-size class")
    }

    pub fn slots_per_page(class: &Class) -> u64 {
        (PAGE_SIZE - PAGE_HEADER_SIZE) / Self::record_size(class)
    }

    fn slot_offset(page_index: PageIndex, local_slot: u64, record_size: u64) -> u64 {
        page_addr(page_index) + PAGE_HEADER_SIZE + local_slot * record_size
    }

    /// Appends `value` to the first data page with room, allocating a new
    /// page if every existing one is full. Returns the freshly assigned id.
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

        let record_size = Self::record_size(class);
        let slots_per_page = Self::slots_per_page(class);
        let magic = catalog.magic(file, class_index)?;
        let list = node_list(class_index);

        let mut target = None;
        for index in list.iter_indices(file)? {
            let page = Page::read_at(file, page_addr(index))?;
            let has_bump_room = (page.initialized_offset as u64) + record_size <= PAGE_SIZE;
            if page.free_offset != NO_FREE_SLOT || has_bump_room {
                target = Some(index);
                break;
            }
        }

        let page_index = match target {
            Some(index) => index,
            None => {
                let index = PageAllocator::allocate_page(file, PageKind::Data)?;
                let mut page = Page::read_at(file, page_addr(index))?;
                page.free_offset = NO_FREE_SLOT;
                page.write_at(file, page_addr(index))?;
                list.push_back(file, index)?;
                index
            }
        };

        let mut page = Page::read_at(file, page_addr(page_index))?;
        let local_slot = if page.free_offset != NO_FREE_SLOT {
            let slot_rel = page.free_offset as u64;
            let local = (slot_rel - PAGE_HEADER_SIZE) / record_size;
            let freed = Node::read(
                class,
                file,
                page_addr(page_index) + slot_rel,
                magic,
            )?;
            page.free_offset = freed.next_free()?;
            local
        } else {
            let local = (page.initialized_offset as u64 - PAGE_HEADER_SIZE) / record_size;
            page.initialized_offset += record_size as u32;
            local
        };
        page.actual_size += 1;
        page.write_at(file, page_addr(page_index))?;

        let id = page_index * slots_per_page + local_slot;
        let node = Node::valid(id, value);
        node.write(file, Self::slot_offset(page_index, local_slot, record_size), magic)?;
        Ok(id)
    }

    /// Frees the slot holding `id`. Frees the owning page too once its last
    /// record is gone.
    pub fn remove_node(
        catalog: &ClassStorage,
        file: &mut File,
        class_index: PageIndex,
        class: &Class,
        id: u64,
    ) -> Result<()> {
        let slots_per_page = Self::slots_per_page(class);
        let record_size = Self::record_size(class);
        let page_index = id / slots_per_page;
        let local_slot = id % slots_per_page;
        let magic = catalog.magic(file, class_index)?;
        let offset = Self::slot_offset(page_index, local_slot, record_size);

        let existing = Node::read(class, file, offset, magic)?;
        if !existing.is_valid() || existing.id()? != id {
            return Err(DbError::BadArgument(format!("no node with id {id}")));
        }

        let mut page = Page::read_at(file, page_addr(page_index))?;
        let freed = Node::free(page.free_offset);
        freed.write(file, offset, magic)?;
        page.free_offset = (offset - page_addr(page_index)) as u32;
        page.actual_size = page.actual_size.saturating_sub(1);

        if page.actual_size == 0 {
            let list = node_list(class_index);
            list.unlink(file, page_index)?;
            PageAllocator::free_page(file, page_index)?;
        } else {
            page.write_at(file, page_addr(page_index))?;
        }
        Ok(())
    }

    /// Calls `f` with every valid `(id, value)` pair across every page the
    /// class owns.
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
        let record_size = Self::record_size(class);
        let list = node_list(class_index);
        for index in list.iter_indices(file)? {
            let page = Page::read_at(file, page_addr(index))?;
            let slots_used = (page.initialized_offset as u64 - PAGE_HEADER_SIZE) / record_size;
            for local in 0..slots_used {
                let offset = Self::slot_offset(index, local, record_size);
                let node = Node::read(class, file, offset, magic)?;
                if node.is_valid() {
                    f(node.id()?, node.value()?)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Primitive, PrimitiveType};
    use tempfile::NamedTempFile;

    fn fresh() -> (NamedTempFile, File, ClassStorage, Class, PageIndex) {
        let tmp = NamedTempFile::new().unwrap();
        let mut file = File::open(tmp.path(), false).unwrap();
        PageAllocator::init(&mut file).unwrap();
        let mut catalog = ClassStorage::new();
        let class = Class::primitive("age", PrimitiveType::I32).unwrap();
        let index = catalog.add_class(&mut file, &class).unwrap();
        (tmp, file, catalog, class, index)
    }

    #[test]
    fn add_then_visit_round_trips() {
        let (_tmp, mut file, catalog, class, index) = fresh();
        let id =
            ConstSizeNodeStorage::add_node(&catalog, &mut file, index, &class, Value::Primitive(Primitive::I32(7)))
                .unwrap();

        let mut seen = Vec::new();
        ConstSizeNodeStorage::visit_nodes(&catalog, &mut file, index, &class, |node_id, value| {
            seen.push((node_id, value.clone()));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(id, Value::Primitive(Primitive::I32(7)))]);
    }

    #[test]
    fn remove_then_reinsert_reuses_slot_and_id() {
        let (_tmp, mut file, catalog, class, index) = fresh();
        let id =
            ConstSizeNodeStorage::add_node(&catalog, &mut file, index, &class, Value::Primitive(Primitive::I32(1)))
                .unwrap();
        ConstSizeNodeStorage::remove_node(&catalog, &mut file, index, &class, id).unwrap();
        let reused =
            ConstSizeNodeStorage::add_node(&catalog, &mut file, index, &class, Value::Primitive(Primitive::I32(2)))
                .unwrap();
        assert_eq!(id, reused);
    }

    #[test]
    fn removing_last_node_frees_the_page() {
        let (_tmp, mut file, catalog, class, index) = fresh();
        let id =
            ConstSizeNodeStorage::add_node(&catalog, &mut file, index, &class, Value::Primitive(Primitive::I32(1)))
                .unwrap();
        assert_eq!(catalog.node_pages_count(&mut file, index).unwrap(), 1);
        ConstSizeNodeStorage::remove_node(&catalog, &mut file, index, &class, id).unwrap();
        assert_eq!(catalog.node_pages_count(&mut file, index).unwrap(), 0);
    }

    #[test]
    fn filling_a_page_allocates_another() {
        let (_tmp, mut file, catalog, class, index) = fresh();
        let slots = ConstSizeNodeStorage::slots_per_page(&class);
        for i in 0..slots + 1 {
            ConstSizeNodeStorage::add_node(
                &catalog,
                &mut file,
                index,
                &class,
                Value::Primitive(Primitive::I32(i as i32)),
            )
            .unwrap();
        }
        assert_eq!(catalog.node_pages_count(&mut file, index).unwrap(), 2);
    }

    #[test]
    fn add_node_rejects_mismatched_value() {
        let (_tmp, mut file, catalog, class, index) = fresh();
        let err = ConstSizeNodeStorage::add_node(
            &catalog,
            &mut file,
            index,
            &class,
            Value::Primitive(Primitive::I64(1)),
        )
        .unwrap_err();
        assert!(matches!(err, DbError::Type(_)));
    }

    #[test]
    fn remove_node_rejects_unknown_id() {
        let (_tmp, mut file, catalog, class, index) = fresh();
        ConstSizeNodeStorage::add_node(&catalog, &mut file, index, &class, Value::Primitive(Primitive::I32(1)))
            .unwrap();
        // slot 1 of page 0 was never written: still zeroed, so it decodes
        // as neither a valid nor a free record.
        let err = ConstSizeNodeStorage::remove_node(&catalog, &mut file, index, &class, 1).unwrap_err();
        assert!(matches!(err, DbError::BadArgument(_)));
    }
}
