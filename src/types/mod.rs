//! The reflection-style type system: runtime [`Class`] descriptors and the
//! [`Value`] objects that round-trip through them.

pub mod class;
pub mod object;

pub use class::{derive_magic, Class, PrimitiveType};
pub use object::{ClassObject, Primitive, Value};

/// A per-class record identifier: a positional slot for fixed-size storage,
/// a counter value drawn from the class header for variable-size storage.
pub type ObjectId = u64;
