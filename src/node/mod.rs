//! Node framing: the fixed prefix every stored record carries, pairing a
//! value object with a magic tag and either an id (valid) or a next-free
//! offset (free).

use crate::error::{DbError, Result};
use crate::file::{File, Offset};
use crate::types::{Class, Value};

/// Width of the magic tag.
pub const TAG_SIZE: u64 = 8;
/// Width of the id field in a valid record.
pub const ID_SIZE: u64 = 8;
/// Width of the next-free offset in a free record.
pub const NEXT_FREE_SIZE: u64 = 4;
/// `TAG_SIZE + ID_SIZE`: the fixed prefix of every valid record.
pub const VALID_HEADER_SIZE: u64 = TAG_SIZE + ID_SIZE;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeState {
    Valid { id: u64, value: Value },
    Free { next_free: u32 },
    /// Anything else: end-of-initialized-region as far as an iterator is
    /// concerned.
    Invalid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub state: NodeState,
}

impl Node {
    pub fn valid(id: u64, value: Value) -> Self {
        Node {
            state: NodeState::Valid { id, value },
        }
    }

    pub fn free(next_free: u32) -> Self {
        Node {
            state: NodeState::Free { next_free },
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.state, NodeState::Valid { .. })
    }

    pub fn is_free(&self) -> bool {
        matches!(self.state, NodeState::Free { .. })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.state, NodeState::Invalid)
    }

    /// The record's id. Errors with `BadArgument` unless the node is valid.
    pub fn id(&self) -> Result<u64> {
        match &self.state {
            NodeState::Valid { id, .. } => Ok(*id),
            _ => Err(DbError::BadArgument(
                "Id() called on a non-valid node".into(),
            )),
        }
    }

    /// The free slot's next-free offset. Errors unless the node is free.
    pub fn next_free(&self) -> Result<u32> {
        match &self.state {
            NodeState::Free { next_free } => Ok(*next_free),
            _ => Err(DbError::BadArgument(
                "NextFree() called on a non-free node".into(),
            )),
        }
    }

    pub fn value(&self) -> Result<&Value> {
        match &self.state {
            NodeState::Valid { value, .. } => Ok(value),
            _ => Err(DbError::BadArgument(
                "Data() called on a non-valid node".into(),
            )),
        }
    }

    /// Decodes the node at `offset` under `class`'s shape, using `magic`
    /// to distinguish valid from free from invalid.
    pub fn read(class: &Class, file: &mut File, offset: Offset, magic: u64) -> Result<Node> {
        let tag = file.read::<u64>(offset)?;
        if tag == magic {
            let id = file.read::<u64>(offset + TAG_SIZE)?;
            let (value, _) = Value::read(class, file, offset + VALID_HEADER_SIZE)?;
            Ok(Node::valid(id, value))
        } else if tag == !magic {
            let next_free = file.read::<u32>(offset + TAG_SIZE)?;
            Ok(Node::free(next_free))
        } else {
            Ok(Node {
                state: NodeState::Invalid,
            })
        }
    }

    /// Writes the node at `offset`. For a valid node this writes
    /// `magic || id || payload` and returns the offset just past the
    /// payload; for a free node it writes `~magic || next_free` and
    /// returns `offset + VALID_HEADER_SIZE` (free slots still reserve the
    /// full valid-header width so a later valid write fits in place).
    pub fn write(&self, file: &mut File, offset: Offset, magic: u64) -> Result<Offset> {
        match &self.state {
            NodeState::Valid { id, value } => {
                file.write::<u64>(offset, magic)?;
                file.write::<u64>(offset + TAG_SIZE, *id)?;
                value.write(file, offset + VALID_HEADER_SIZE)
            }
            NodeState::Free { next_free } => {
                file.write::<u64>(offset, !magic)?;
                file.write::<u32>(offset + TAG_SIZE, *next_free)?;
                Ok(offset + VALID_HEADER_SIZE)
            }
            NodeState::Invalid => Err(DbError::BadArgument(
                "cannot write a node in the Invalid state".into(),
            )),
        }
    }
}
