//! # daedalus
//!
//! An embedded, single-file object-and-relation store with a dynamic,
//! reflection-style type system: classes are described at runtime rather
//! than fixed at compile time, objects are addressed by a per-class id, and
//! relations between objects are themselves typed, queryable records.

pub mod alloc;
pub mod catalog;
pub mod error;
pub mod file;
pub mod log;
pub mod node;
pub mod page;
pub mod pattern;
pub mod storage;
pub mod types;

pub use error::{DbError, Result};
pub use pattern::Pattern;
pub use types::{Class, ObjectId, Primitive, PrimitiveType, Value};

use std::path::{Path, PathBuf};

use alloc::PageAllocator;
use catalog::{ClassStorage, FindMode};
use file::File;
use page::PageIndex;
use pattern::PatternNode;
use storage::{ConstSizeNodeStorage, VarSizeNodeStorage};

/// How `Database::open` should treat the superblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Fail unless the file already has a valid superblock.
    Read,
    /// Always write a fresh superblock, discarding whatever was there.
    Write,
    /// Open an existing, valid database; if the superblock is absent or
    /// corrupt, fall back to `Write`'s behavior instead of failing.
    Default,
}

fn is_const_size(class: &Class) -> bool {
    class.size().is_some()
}

/// The embedded database handle: a file, the class catalog read from it,
/// and the dispatch logic that picks const- or var-size node storage per
/// class.
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    file: File,
    catalog: ClassStorage,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let read_only = mode == OpenMode::Read;
        let mut file = File::open(&path, read_only)?;

        match mode {
            OpenMode::Read => PageAllocator::check(&mut file)?,
            OpenMode::Write => PageAllocator::init(&mut file)?,
            OpenMode::Default => match PageAllocator::check(&mut file) {
                Ok(()) => {}
                Err(DbError::Structure(reason)) => {
                    crate::log_warn!("superblock invalid ({reason}); reinitializing {}", path.display());
                    PageAllocator::init(&mut file)?;
                }
                Err(other) => return Err(other),
            },
        }

        let mut catalog = ClassStorage::new();
        catalog.initialize_cache(&mut file)?;
        Ok(Database { path, file, catalog })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Calls `f` with the name and canonical serialization of every
    /// registered class, in catalog order.
    pub fn visit_class_names<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&str, &str) -> Result<()>,
    {
        self.catalog
            .visit_classes(&mut self.file, |_, class| f(class.name(), &class.serialize()))
    }

    /// Looks up a registered class by its plain name (not its full grammar
    /// string). Used by the CLI, where users type `person` rather than the
    /// class's serialized form.
    pub fn find_class_by_name(&mut self, name: &str) -> Result<Option<Class>> {
        let mut found = None;
        self.catalog.visit_classes(&mut self.file, |_, class| {
            if class.name() == name {
                found = Some(class.clone());
            }
            Ok(())
        })?;
        Ok(found)
    }

    fn class_index(&mut self, class: &Class) -> Result<PageIndex> {
        self.catalog
            .find_class(&mut self.file, class, FindMode::File)?
            .page_index()
            .ok_or_else(|| {
                DbError::BadArgument(format!(
                    "class {} is not registered; call add_class first",
                    class.serialize()
                ))
            })
    }

    pub fn add_class(&mut self, class: &Class) -> Result<PageIndex> {
        let index = self.catalog.add_class(&mut self.file, class)?;
        self.file.sync()?;
        Ok(index)
    }

    pub fn remove_class(&mut self, class: &Class) -> Result<()> {
        self.catalog.remove_class(&mut self.file, class)?;
        self.file.sync()
    }

    pub fn add_node(&mut self, class: &Class, value: Value) -> Result<ObjectId> {
        let index = self.class_index(class)?;
        let id = if is_const_size(class) {
            ConstSizeNodeStorage::add_node(&self.catalog, &mut self.file, index, class, value)?
        } else {
            VarSizeNodeStorage::add_node(&self.catalog, &mut self.file, index, class, value)?
        };
        self.file.sync()?;
        Ok(id)
    }

    /// Calls `f` with every node of `class` for which `pred` holds.
    pub fn visit_nodes<P, F>(&mut self, class: &Class, pred: P, mut f: F) -> Result<()>
    where
        P: Fn(ObjectId, &Value) -> bool,
        F: FnMut(ObjectId, &Value) -> Result<()>,
    {
        let index = self.class_index(class)?;
        let visitor = |id: ObjectId, value: &Value| -> Result<()> {
            if pred(id, value) {
                f(id, value)
            } else {
                Ok(())
            }
        };
        if is_const_size(class) {
            ConstSizeNodeStorage::visit_nodes(&self.catalog, &mut self.file, index, class, visitor)
        } else {
            VarSizeNodeStorage::visit_nodes(&self.catalog, &mut self.file, index, class, visitor)
        }
    }

    pub fn collect_nodes_if<P>(&mut self, class: &Class, pred: P) -> Result<Vec<(ObjectId, Value)>>
    where
        P: Fn(ObjectId, &Value) -> bool,
    {
        let mut out = Vec::new();
        self.visit_nodes(class, pred, |id, value| {
            out.push((id, value.clone()));
            Ok(())
        })?;
        Ok(out)
    }

    fn get_node(&mut self, class: &Class, id: ObjectId) -> Result<Option<Value>> {
        Ok(self
            .collect_nodes_if(class, move |node_id, _| node_id == id)?
            .into_iter()
            .next()
            .map(|(_, value)| value))
    }

    /// Removes every node of `class` for which `pred` holds, returning how
    /// many were removed.
    pub fn remove_nodes_if<P>(&mut self, class: &Class, pred: P) -> Result<usize>
    where
        P: Fn(ObjectId, &Value) -> bool,
    {
        let ids: Vec<ObjectId> = self
            .collect_nodes_if(class, pred)?
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        let index = self.class_index(class)?;
        let count = ids.len();
        for id in ids {
            if is_const_size(class) {
                ConstSizeNodeStorage::remove_node(&self.catalog, &mut self.file, index, class, id)?;
            } else {
                VarSizeNodeStorage::remove_node(&self.catalog, &mut self.file, index, class, id)?;
            }
        }
        self.file.sync()?;
        Ok(count)
    }

    /// Enumerates every tuple of node ids satisfying `pattern`, one id per
    /// pattern vertex in root-then-depth-first-children order.
    pub fn pattern_match(&mut self, pattern: &Pattern) -> Result<Vec<Vec<ObjectId>>> {
        let root_nodes = self.collect_nodes_if(pattern.root_class(), |_, _| true)?;
        let mut results = Vec::new();
        for (root_id, root_value) in root_nodes {
            for completion in self.match_node(pattern, root_id, &root_value)? {
                let mut tuple = vec![root_id];
                tuple.extend(completion);
                results.push(tuple);
            }
        }
        Ok(results)
    }

    fn match_node(
        &mut self,
        pattern: &Pattern,
        node_id: ObjectId,
        node_value: &Value,
    ) -> Result<Vec<Vec<ObjectId>>> {
        let mut combos: Vec<Vec<ObjectId>> = vec![Vec::new()];
        for (relation_class, predicate, child) in pattern.edges() {
            let relations = self.collect_nodes_if(relation_class, move |_, v| {
                matches!(v, Value::Relation { ingress_id, .. } if *ingress_id == node_id)
            })?;

            let mut edge_options: Vec<Vec<ObjectId>> = Vec::new();
            for (_, relation_value) in relations {
                let Value::Relation { egress_id, .. } = relation_value else {
                    continue;
                };
                let Some(child_value) = self.get_node(child.root_class(), egress_id)? else {
                    continue;
                };
                let from = PatternNode { id: node_id, value: node_value.clone() };
                let to = PatternNode { id: egress_id, value: child_value.clone() };
                if !predicate(&from, &to) {
                    continue;
                }
                for sub in self.match_node(child, egress_id, &child_value)? {
                    let mut seq = vec![egress_id];
                    seq.extend(sub);
                    edge_options.push(seq);
                }
            }

            if edge_options.is_empty() {
                return Ok(Vec::new());
            }
            let mut new_combos = Vec::with_capacity(combos.len() * edge_options.len());
            for base in &combos {
                for option in &edge_options {
                    let mut combined = base.clone();
                    combined.extend(option.clone());
                    new_combos.push(combined);
                }
            }
            combos = new_combos;
        }
        Ok(combos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn point_class() -> Class {
        Class::primitive("value", PrimitiveType::I32).unwrap()
    }

    fn name_class() -> Class {
        Class::string("name").unwrap()
    }

    #[test]
    fn open_write_then_default_reopens_without_reinitializing() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut db = Database::open(tmp.path(), OpenMode::Write).unwrap();
            db.add_class(&point_class()).unwrap();
        }
        let mut reopened = Database::open(tmp.path(), OpenMode::Default).unwrap();
        assert_eq!(reopened.catalog.cache_len(), 1);
        let index = reopened.class_index(&point_class()).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn open_read_on_fresh_file_fails() {
        let tmp = NamedTempFile::new().unwrap();
        let err = Database::open(tmp.path(), OpenMode::Read).unwrap_err();
        assert!(matches!(err, DbError::Structure(_)));
    }

    #[test]
    fn add_node_requires_registered_class() {
        let tmp = NamedTempFile::new().unwrap();
        let mut db = Database::open(tmp.path(), OpenMode::Write).unwrap();
        let err = db
            .add_node(&point_class(), Value::Primitive(Primitive::I32(1)))
            .unwrap_err();
        assert!(matches!(err, DbError::BadArgument(_)));
    }

    #[test]
    fn fixed_size_round_trip_through_the_facade() {
        let tmp = NamedTempFile::new().unwrap();
        let mut db = Database::open(tmp.path(), OpenMode::Write).unwrap();
        let class = point_class();
        db.add_class(&class).unwrap();
        let id = db.add_node(&class, Value::Primitive(Primitive::I32(42))).unwrap();

        let found = db.collect_nodes_if(&class, |node_id, _| node_id == id).unwrap();
        assert_eq!(found, vec![(id, Value::Primitive(Primitive::I32(42)))]);

        let removed = db.remove_nodes_if(&class, |node_id, _| node_id == id).unwrap();
        assert_eq!(removed, 1);
        assert!(db.collect_nodes_if(&class, |_, _| true).unwrap().is_empty());
    }

    #[test]
    fn variable_size_round_trip_through_the_facade() {
        let tmp = NamedTempFile::new().unwrap();
        let mut db = Database::open(tmp.path(), OpenMode::Write).unwrap();
        let class = name_class();
        db.add_class(&class).unwrap();
        let id = db.add_node(&class, Value::Str("Ada".into())).unwrap();
        let found = db.collect_nodes_if(&class, |node_id, _| node_id == id).unwrap();
        assert_eq!(found, vec![(id, Value::Str("Ada".into()))]);
    }

    #[test]
    fn pattern_match_follows_a_star_of_edges() {
        let tmp = NamedTempFile::new().unwrap();
        let mut db = Database::open(tmp.path(), OpenMode::Write).unwrap();
        let point = point_class();
        let edge = Class::relation("edge", point.clone(), point.clone()).unwrap();
        db.add_class(&point).unwrap();
        db.add_class(&edge).unwrap();

        let hub = db.add_node(&point, Value::Primitive(Primitive::I32(0))).unwrap();
        let mut leaves = Vec::new();
        for i in 1..5 {
            let leaf = db.add_node(&point, Value::Primitive(Primitive::I32(i))).unwrap();
            db.add_node(
                &edge,
                Value::Relation { ingress_id: hub, egress_id: leaf, attributes: None },
            )
            .unwrap();
            leaves.push(leaf);
        }

        let mut pattern = Pattern::new(point);
        pattern.add_relation(edge, Box::new(|_, _| true)).unwrap();
        let matches = db.pattern_match(&pattern).unwrap();
        assert_eq!(matches.len(), 4);
        for m in matches {
            assert_eq!(m[0], hub);
            assert!(leaves.contains(&m[1]));
        }
    }
}
