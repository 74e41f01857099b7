//! The class catalog: the persistent list of registered classes and the
//! in-memory cache keyed by serialized class string.

use std::collections::HashMap;

use crate::alloc::{PageAllocator, PAGETABLE_OFFSET};
use crate::error::{DbError, Result};
use crate::file::{File, Offset};
use crate::page::{Page, PageIndex, PageKind, PageList, PAGE_HEADER_SIZE, PAGE_SIZE};
use crate::types::{derive_magic, Class, ClassObject};
use crate::{log_debug, log_warn};

/// `node_list_sentinel` begins right after the base page header.
const NODE_LIST_SENTINEL_REL: u64 = PAGE_HEADER_SIZE;
/// The sentinel's own page header is followed by the `PageList`'s element
/// count, which `PageList` reads and writes itself (`push_back`/`unlink`
/// keep it current) — this header does not duplicate that field.
const NEXT_ID_REL: u64 = NODE_LIST_SENTINEL_REL + PAGE_HEADER_SIZE + 8;
const MAGIC_REL: u64 = NEXT_ID_REL + 8;
/// Total header size; the serialized class bytes start right after.
pub const CLASS_HEADER_SIZE: u64 = MAGIC_REL + 8;

fn page_base(index: PageIndex) -> Offset {
    PAGETABLE_OFFSET + index * PAGE_SIZE
}

fn node_list_sentinel_offset(index: PageIndex) -> Offset {
    page_base(index) + NODE_LIST_SENTINEL_REL
}

fn next_id_offset(index: PageIndex) -> Offset {
    page_base(index) + NEXT_ID_REL
}

fn magic_offset(index: PageIndex) -> Offset {
    page_base(index) + MAGIC_REL
}

fn payload_offset(index: PageIndex) -> Offset {
    page_base(index) + CLASS_HEADER_SIZE
}

/// Which sources `find_class` is allowed to consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindMode {
    /// Consult the in-memory cache only.
    Cache,
    /// Also fall back to scanning the on-disk class list, and verify that
    /// a cache hit is still coherent with disk.
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindResult {
    CacheHit(PageIndex),
    FileHit(PageIndex),
    Miss,
}

impl FindResult {
    pub fn page_index(self) -> Option<PageIndex> {
        match self {
            FindResult::CacheHit(i) | FindResult::FileHit(i) => Some(i),
            FindResult::Miss => None,
        }
    }
}

/// The per-class data-page list, exposed so `NodeStorage` can anchor its
/// own `PageList` without reaching back into `ClassStorage` internals.
pub fn node_list(index: PageIndex) -> PageList {
    PageList::new(node_list_sentinel_offset(index), PAGETABLE_OFFSET)
}

/// Persistent catalog of classes: an on-disk `PageList` of `ClassHeader`
/// pages plus an in-memory map from serialized class string to page index.
#[derive(Debug)]
pub struct ClassStorage {
    cache: HashMap<String, PageIndex>,
}

impl Default for ClassStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassStorage {
    pub fn new() -> Self {
        ClassStorage {
            cache: HashMap::new(),
        }
    }

    /// Populates the cache by scanning every `ClassHeader` page already on
    /// disk. Called once when a `Database` opens an existing file.
    pub fn initialize_cache(&mut self, file: &mut File) -> Result<()> {
        self.cache.clear();
        for index in PageAllocator::class_list().iter_indices(file)? {
            let serialized = self.read_serialized(file, index)?;
            self.cache.insert(serialized, index);
        }
        Ok(())
    }

    fn read_serialized(&self, file: &mut File, index: PageIndex) -> Result<String> {
        ClassObject::read(file, payload_offset(index))
    }

    fn is_coherent(&self, file: &mut File, index: PageIndex, expected: &str) -> Result<bool> {
        Ok(self.read_serialized(file, index)? == expected)
    }

    pub fn find_class(
        &mut self,
        file: &mut File,
        class: &Class,
        mode: FindMode,
    ) -> Result<FindResult> {
        let serialized = class.serialize();
        if let Some(&index) = self.cache.get(&serialized) {
            if mode == FindMode::Cache || self.is_coherent(file, index, &serialized)? {
                return Ok(FindResult::CacheHit(index));
            }
            log_warn!("class cache entry for {serialized} was stale at page {index}; evicting");
            self.cache.remove(&serialized);
        }

        if mode == FindMode::File {
            for index in PageAllocator::class_list().iter_indices(file)? {
                if self.read_serialized(file, index)? == serialized {
                    self.cache.insert(serialized, index);
                    return Ok(FindResult::FileHit(index));
                }
            }
        }

        Ok(FindResult::Miss)
    }

    /// Registers `class`, deduplicating against both the cache and the
    /// on-disk list. Idempotent: calling it again with the same class
    /// leaves the class list unchanged and returns the existing page.
    pub fn add_class(&mut self, file: &mut File, class: &Class) -> Result<PageIndex> {
        let serialized = class.serialize();
        match self.find_class(file, class, FindMode::File)? {
            FindResult::CacheHit(index) => {
                log_debug!("add_class: {serialized} already registered at page {index}");
                Ok(index)
            }
            FindResult::FileHit(index) => Ok(index),
            FindResult::Miss => self.create_class_header(file, &serialized),
        }
    }

    fn create_class_header(&mut self, file: &mut File, serialized: &str) -> Result<PageIndex> {
        let payload_size = ClassObject::size(serialized);
        if CLASS_HEADER_SIZE + payload_size > PAGE_SIZE {
            return Err(DbError::NotImplemented(format!(
                "class serialization of {} bytes does not fit in one page",
                payload_size
            )));
        }

        let index = PageAllocator::allocate_page(file, PageKind::ClassHeader)?;

        let sentinel_list = PageList::new(node_list_sentinel_offset(index), PAGETABLE_OFFSET);
        sentinel_list.init_empty(file)?;
        file.write::<u64>(next_id_offset(index), 0)?;
        file.write::<u64>(magic_offset(index), derive_magic(serialized))?;

        let mut page = Page::read_at(file, page_base(index))?;
        page.initialized_offset = (CLASS_HEADER_SIZE + payload_size) as u32;
        page.free_offset = page.initialized_offset;
        page.actual_size = payload_size;
        page.write_at(file, page_base(index))?;

        ClassObject::write(file, payload_offset(index), serialized)?;
        PageAllocator::class_list().push_back(file, index)?;
        self.cache.insert(serialized.to_string(), index);
        Ok(index)
    }

    /// Frees every data page owned by the class before freeing the header
    /// itself — leaving nodes dangling would leak pages the allocator can
    /// never reclaim.
    pub fn remove_class(&mut self, file: &mut File, class: &Class) -> Result<()> {
        let serialized = class.serialize();
        let index = self
            .find_class(file, class, FindMode::File)?
            .page_index()
            .ok_or_else(|| DbError::BadArgument(format!("class {serialized} is not registered")))?;

        let data_pages = node_list(index);
        for data_index in data_pages.iter_indices(file)? {
            data_pages.unlink(file, data_index)?;
            PageAllocator::free_page(file, data_index)?;
        }

        PageAllocator::class_list().unlink(file, index)?;
        PageAllocator::free_page(file, index)?;
        self.cache.remove(&serialized);
        Ok(())
    }

    pub fn visit_classes<F>(&self, file: &mut File, mut f: F) -> Result<()>
    where
        F: FnMut(PageIndex, &Class) -> Result<()>,
    {
        for index in PageAllocator::class_list().iter_indices(file)? {
            let serialized = self.read_serialized(file, index)?;
            let class = Class::parse(&serialized)?;
            f(index, &class)?;
        }
        Ok(())
    }

    pub fn magic(&self, file: &mut File, index: PageIndex) -> Result<u64> {
        file.read::<u64>(magic_offset(index))
    }

    pub fn next_id(&self, file: &mut File, index: PageIndex) -> Result<u64> {
        file.read::<u64>(next_id_offset(index))
    }

    pub fn set_next_id(&self, file: &mut File, index: PageIndex, value: u64) -> Result<()> {
        file.write::<u64>(next_id_offset(index), value)
    }

    /// The class's data-page count: the node list's own element count, kept
    /// current by `PageList::push_back`/`unlink` as pages come and go.
    pub fn node_pages_count(&self, file: &mut File, index: PageIndex) -> Result<u64> {
        node_list(index).pages_count(file)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveType;
    use tempfile::NamedTempFile;

    fn fresh() -> (NamedTempFile, File, ClassStorage) {
        let tmp = NamedTempFile::new().unwrap();
        let mut file = File::open(tmp.path(), false).unwrap();
        PageAllocator::init(&mut file).unwrap();
        (tmp, file, ClassStorage::new())
    }

    #[test]
    fn add_class_registers_and_is_findable() {
        let (_tmp, mut file, mut storage) = fresh();
        let class = Class::string("name").unwrap();
        let index = storage.add_class(&mut file, &class).unwrap();
        let found = storage.find_class(&mut file, &class, FindMode::Cache).unwrap();
        assert_eq!(found, FindResult::CacheHit(index));
    }

    #[test]
    fn add_class_is_idempotent() {
        let (_tmp, mut file, mut storage) = fresh();
        let class = Class::primitive("age", PrimitiveType::I32).unwrap();
        let first = storage.add_class(&mut file, &class).unwrap();
        let second = storage.add_class(&mut file, &class).unwrap();
        assert_eq!(first, second);
        assert_eq!(PageAllocator::class_list().pages_count(&mut file).unwrap(), 1);
        assert_eq!(storage.cache_len(), 1);
    }

    #[test]
    fn remove_class_erases_cache_and_frees_page() {
        let (_tmp, mut file, mut storage) = fresh();
        let class = Class::string("name").unwrap();
        storage.add_class(&mut file, &class).unwrap();
        storage.remove_class(&mut file, &class).unwrap();
        assert_eq!(storage.cache_len(), 0);
        assert_eq!(PageAllocator::class_list().pages_count(&mut file).unwrap(), 0);
    }

    #[test]
    fn remove_class_frees_its_data_pages_too() {
        let (_tmp, mut file, mut storage) = fresh();
        let class = Class::string("name").unwrap();
        let index = storage.add_class(&mut file, &class).unwrap();
        let data_page = PageAllocator::allocate_page(&mut file, PageKind::Data).unwrap();
        node_list(index).push_back(&mut file, data_page).unwrap();

        storage.remove_class(&mut file, &class).unwrap();

        let free_indices = PageAllocator::free_list().iter_indices(&mut file).unwrap();
        assert!(free_indices.contains(&data_page));
    }

    #[test]
    fn rebuilding_cache_from_disk_recovers_entries() {
        let (_tmp, mut file, mut storage) = fresh();
        let class = Class::string("name").unwrap();
        let index = storage.add_class(&mut file, &class).unwrap();

        let mut reopened = ClassStorage::new();
        reopened.initialize_cache(&mut file).unwrap();
        let found = reopened.find_class(&mut file, &class, FindMode::Cache).unwrap();
        assert_eq!(found, FindResult::CacheHit(index));
    }

    #[test]
    fn oversized_class_is_rejected() {
        let (_tmp, mut file, mut storage) = fresh();
        let huge_name: String = "a".repeat(4090);
        let class = Class::string(&huge_name).unwrap();
        let err = storage.add_class(&mut file, &class).unwrap_err();
        assert!(matches!(err, DbError::NotImplemented(_)));
    }

    #[test]
    fn visit_classes_yields_every_registered_class() {
        let (_tmp, mut file, mut storage) = fresh();
        storage.add_class(&mut file, &Class::string("a").unwrap()).unwrap();
        storage
            .add_class(&mut file, &Class::primitive("b", PrimitiveType::I32).unwrap())
            .unwrap();

        let mut seen = Vec::new();
        storage
            .visit_classes(&mut file, |_, class| {
                seen.push(class.serialize());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen.len(), 2);
    }
}
