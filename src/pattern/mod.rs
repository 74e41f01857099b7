//! Graph patterns: a rooted tree of class vertices connected by relation
//! edges, each edge carrying a predicate over the two endpoint nodes.
//! `Database::pattern_match` walks a `Pattern` against persisted data;
//! this module only holds the shape and the attachment rule.

use crate::error::{DbError, Result};
use crate::types::{Class, ObjectId, Value};

/// A decoded node handed to a predicate: its id and its value, with no
/// reference back to the page it lives on.
#[derive(Debug, Clone)]
pub struct PatternNode {
    pub id: ObjectId,
    pub value: Value,
}

pub type Predicate = Box<dyn Fn(&PatternNode, &PatternNode) -> bool>;

struct Edge {
    relation_class: Class,
    predicate: Predicate,
    child: Pattern,
}

/// A rooted tree of class vertices. The root's class is fixed at
/// construction; every subsequent `add_relation` call either attaches a
/// new edge to whichever vertex its relation's ingress class names, or
/// fails if no such vertex exists in the tree yet.
pub struct Pattern {
    root_class: Class,
    edges: Vec<Edge>,
}

impl Pattern {
    pub fn new(root_class: Class) -> Self {
        Pattern {
            root_class,
            edges: Vec::new(),
        }
    }

    pub fn root_class(&self) -> &Class {
        &self.root_class
    }

    /// Attaches `relation_class` wherever its ingress class matches an
    /// existing vertex, growing that vertex a new child whose own class is
    /// the relation's egress class.
    pub fn add_relation(&mut self, relation_class: Class, predicate: Predicate) -> Result<()> {
        let (ingress_key, egress_class) = match &relation_class {
            Class::Relation { ingress, egress, .. } => (ingress.serialize(), (**egress).clone()),
            _ => {
                return Err(DbError::Type(
                    "add_relation requires a Relation class".into(),
                ))
            }
        };

        match self.find_attachment(&ingress_key) {
            Some(target) => {
                target.edges.push(Edge {
                    relation_class,
                    predicate,
                    child: Pattern::new(egress_class),
                });
                Ok(())
            }
            None => Err(DbError::Runtime(
                "pattern insertion with no anchor: no vertex matches the relation's ingress class"
                    .into(),
            )),
        }
    }

    fn find_attachment(&mut self, ingress_key: &str) -> Option<&mut Pattern> {
        if self.root_class.serialize() == ingress_key {
            return Some(self);
        }
        for edge in &mut self.edges {
            if let Some(found) = edge.child.find_attachment(ingress_key) {
                return Some(found);
            }
        }
        None
    }

    pub(crate) fn edges(&self) -> impl Iterator<Item = (&Class, &Predicate, &Pattern)> {
        self.edges
            .iter()
            .map(|e| (&e.relation_class, &e.predicate, &e.child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveType;

    fn point_class() -> Class {
        Class::primitive("point", PrimitiveType::I32).unwrap()
    }

    fn edge_class(name: &str) -> Class {
        Class::relation(name, point_class(), point_class()).unwrap()
    }

    #[test]
    fn add_relation_attaches_at_matching_root() {
        let mut pattern = Pattern::new(point_class());
        pattern
            .add_relation(edge_class("edge"), Box::new(|_, _| true))
            .unwrap();
        assert_eq!(pattern.edges().count(), 1);
    }

    #[test]
    fn add_relation_recurses_into_children() {
        let mut pattern = Pattern::new(point_class());
        pattern
            .add_relation(edge_class("edge"), Box::new(|_, _| true))
            .unwrap();
        // attaches to the child just created, since its root class is also `point`
        pattern
            .add_relation(edge_class("edge2"), Box::new(|_, _| true))
            .unwrap();
        let (_, _, child) = pattern.edges().next().unwrap();
        assert_eq!(child.edges().count(), 1);
    }

    #[test]
    fn add_relation_with_no_matching_vertex_is_runtime_error() {
        let mut pattern = Pattern::new(Class::string("name").unwrap());
        let err = pattern
            .add_relation(edge_class("edge"), Box::new(|_, _| true))
            .unwrap_err();
        assert!(matches!(err, DbError::Runtime(_)));
    }

    #[test]
    fn add_relation_rejects_non_relation_class() {
        let mut pattern = Pattern::new(point_class());
        let err = pattern
            .add_relation(point_class(), Box::new(|_, _| true))
            .unwrap_err();
        assert!(matches!(err, DbError::Type(_)));
    }
}
