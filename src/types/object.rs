//! Value objects: the polymorphic mirror of [`Class`](super::class::Class)
//! that actually holds data and knows how to size, write and read itself.

use crate::error::{DbError, Result};
use crate::file::{File, Offset};

use super::class::{Class, PrimitiveType};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Primitive {
    pub fn ty(&self) -> PrimitiveType {
        match self {
            Primitive::Bool(_) => PrimitiveType::Bool,
            Primitive::I8(_) => PrimitiveType::I8,
            Primitive::U8(_) => PrimitiveType::U8,
            Primitive::I16(_) => PrimitiveType::I16,
            Primitive::U16(_) => PrimitiveType::U16,
            Primitive::I32(_) => PrimitiveType::I32,
            Primitive::U32(_) => PrimitiveType::U32,
            Primitive::I64(_) => PrimitiveType::I64,
            Primitive::U64(_) => PrimitiveType::U64,
            Primitive::F32(_) => PrimitiveType::F32,
            Primitive::F64(_) => PrimitiveType::F64,
        }
    }
}

/// A value object: `Primitive`, `String`, `Struct` or `Relation`, mirroring
/// [`Class`]'s variants one-to-one.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Primitive(Primitive),
    Str(String),
    Struct(Vec<Value>),
    Relation {
        ingress_id: u64,
        egress_id: u64,
        attributes: Option<Box<Value>>,
    },
}

impl Value {
    /// Whether this value is shaped like `class` — checked before writing
    /// a node so a mismatched value is rejected with `TypeError` rather
    /// than silently corrupting the page.
    pub fn matches_class(&self, class: &Class) -> bool {
        match (self, class) {
            (Value::Primitive(p), Class::Primitive { ty, .. }) => p.ty() == *ty,
            (Value::Str(_), Class::String { .. }) => true,
            (Value::Struct(values), Class::Struct { fields, .. }) => {
                values.len() == fields.len()
                    && values.iter().zip(fields).all(|(v, f)| v.matches_class(f))
            }
            (
                Value::Relation { attributes, .. },
                Class::Relation {
                    attributes: attr_class,
                    ..
                },
            ) => match (attributes, attr_class) {
                (None, None) => true,
                (Some(a), Some(c)) => a.matches_class(c),
                _ => false,
            },
            _ => false,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Value::Primitive(p) => p.ty().width(),
            Value::Str(s) => 4 + s.len() as u64,
            Value::Struct(fields) => fields.iter().map(Value::size).sum(),
            Value::Relation { attributes, .. } => {
                16 + attributes.as_ref().map(|a| a.size()).unwrap_or(0)
            }
        }
    }

    /// Writes the value at `offset`, returning the offset just past it.
    pub fn write(&self, file: &mut File, offset: Offset) -> Result<Offset> {
        match self {
            Value::Primitive(p) => {
                match p {
                    Primitive::Bool(v) => file.write::<bool>(offset, *v)?,
                    Primitive::I8(v) => file.write::<u8>(offset, *v as u8)?,
                    Primitive::U8(v) => file.write::<u8>(offset, *v)?,
                    Primitive::I16(v) => file.write::<u16>(offset, *v as u16)?,
                    Primitive::U16(v) => file.write::<u16>(offset, *v)?,
                    Primitive::I32(v) => file.write::<i32>(offset, *v)?,
                    Primitive::U32(v) => file.write::<u32>(offset, *v)?,
                    Primitive::I64(v) => file.write::<i64>(offset, *v)?,
                    Primitive::U64(v) => file.write::<u64>(offset, *v)?,
                    Primitive::F32(v) => file.write::<f32>(offset, *v)?,
                    Primitive::F64(v) => file.write::<f64>(offset, *v)?,
                }
                Ok(offset + p.ty().width())
            }
            Value::Str(s) => {
                file.write::<u32>(offset, s.len() as u32)?;
                file.write_string(offset + 4, s)?;
                Ok(offset + 4 + s.len() as u64)
            }
            Value::Struct(fields) => {
                let mut cursor = offset;
                for f in fields {
                    cursor = f.write(file, cursor)?;
                }
                Ok(cursor)
            }
            Value::Relation {
                ingress_id,
                egress_id,
                attributes,
            } => {
                file.write::<u64>(offset, *ingress_id)?;
                file.write::<u64>(offset + 8, *egress_id)?;
                let mut cursor = offset + 16;
                if let Some(a) = attributes {
                    cursor = a.write(file, cursor)?;
                }
                Ok(cursor)
            }
        }
    }

    /// Reads a value shaped like `class` starting at `offset`, returning
    /// the value and the offset just past it.
    pub fn read(class: &Class, file: &mut File, offset: Offset) -> Result<(Value, Offset)> {
        match class {
            Class::Primitive { ty, .. } => {
                let (p, width) = match ty {
                    PrimitiveType::Bool => (Primitive::Bool(file.read::<bool>(offset)?), 1),
                    PrimitiveType::I8 => (Primitive::I8(file.read::<u8>(offset)? as i8), 1),
                    PrimitiveType::U8 => (Primitive::U8(file.read::<u8>(offset)?), 1),
                    PrimitiveType::I16 => (Primitive::I16(file.read::<u16>(offset)? as i16), 2),
                    PrimitiveType::U16 => (Primitive::U16(file.read::<u16>(offset)?), 2),
                    PrimitiveType::I32 => (Primitive::I32(file.read::<i32>(offset)?), 4),
                    PrimitiveType::U32 => (Primitive::U32(file.read::<u32>(offset)?), 4),
                    PrimitiveType::I64 => (Primitive::I64(file.read::<i64>(offset)?), 8),
                    PrimitiveType::U64 => (Primitive::U64(file.read::<u64>(offset)?), 8),
                    PrimitiveType::F32 => (Primitive::F32(file.read::<f32>(offset)?), 4),
                    PrimitiveType::F64 => (Primitive::F64(file.read::<f64>(offset)?), 8),
                };
                Ok((Value::Primitive(p), offset + width))
            }
            Class::String { .. } => {
                let len = file.read::<u32>(offset)? as usize;
                let s = file.read_string(offset + 4, len)?;
                Ok((Value::Str(s), offset + 4 + len as u64))
            }
            Class::Struct { fields, .. } => {
                let mut cursor = offset;
                let mut values = Vec::with_capacity(fields.len());
                for f in fields {
                    let (v, next) = Value::read(f, file, cursor)?;
                    values.push(v);
                    cursor = next;
                }
                Ok((Value::Struct(values), cursor))
            }
            Class::Relation { attributes, .. } => {
                let ingress_id = file.read::<u64>(offset)?;
                let egress_id = file.read::<u64>(offset + 8)?;
                let mut cursor = offset + 16;
                let attrs = match attributes {
                    None => None,
                    Some(class) => {
                        let (v, next) = Value::read(class, file, cursor)?;
                        cursor = next;
                        Some(Box::new(v))
                    }
                };
                Ok((
                    Value::Relation {
                        ingress_id,
                        egress_id,
                        attributes: attrs,
                    },
                    cursor,
                ))
            }
        }
    }

    /// Human-readable rendering, mirroring the original's `ToString`.
    pub fn display(&self, class: &Class) -> String {
        match (self, class) {
            (Value::Primitive(Primitive::Bool(v)), _) => {
                format!("{}: {}", class.name(), v)
            }
            (Value::Primitive(p), _) => format!("{}: {}", class.name(), primitive_to_string(p)),
            (Value::Str(s), _) => format!("{}: \"{}\"", class.name(), s),
            (Value::Struct(values), Class::Struct { fields, .. }) => {
                let parts: Vec<String> = values
                    .iter()
                    .zip(fields)
                    .map(|(v, f)| v.display(f))
                    .collect();
                format!("{}: {{ {} }}", class.name(), parts.join(", "))
            }
            (
                Value::Relation {
                    ingress_id,
                    egress_id,
                    attributes,
                },
                Class::Relation {
                    ingress,
                    egress,
                    attributes: attr_class,
                    ..
                },
            ) => {
                let mut s = format!(
                    "relation: {} ( ingress: ( id: {}, class: {} ), egress: ( id: {}, class: {} )",
                    class.name(),
                    ingress_id,
                    ingress.name(),
                    egress_id,
                    egress.name(),
                );
                if let (Some(a), Some(c)) = (attributes, attr_class) {
                    s.push_str(&format!(", attributes: {}", a.display(c)));
                }
                s.push_str(" )");
                s
            }
            _ => format!("{}: <mismatched class>", class.name()),
        }
    }
}

fn primitive_to_string(p: &Primitive) -> String {
    match p {
        Primitive::Bool(v) => v.to_string(),
        Primitive::I8(v) => v.to_string(),
        Primitive::U8(v) => v.to_string(),
        Primitive::I16(v) => v.to_string(),
        Primitive::U16(v) => v.to_string(),
        Primitive::I32(v) => v.to_string(),
        Primitive::U32(v) => v.to_string(),
        Primitive::I64(v) => v.to_string(),
        Primitive::U64(v) => v.to_string(),
        Primitive::F32(v) => v.to_string(),
        Primitive::F64(v) => v.to_string(),
    }
}

/// Persisted form of a `Class`: `u32 length || serialized bytes`.
pub struct ClassObject;

impl ClassObject {
    pub fn size(serialized: &str) -> u64 {
        4 + serialized.len() as u64
    }

    pub fn write(file: &mut File, offset: Offset, serialized: &str) -> Result<Offset> {
        file.write::<u32>(offset, serialized.len() as u32)?;
        file.write_string(offset + 4, serialized)?;
        Ok(offset + 4 + serialized.len() as u64)
    }

    pub fn read(file: &mut File, offset: Offset) -> Result<String> {
        let len = file.read::<u32>(offset)? as usize;
        file.read_string(offset + 4, len)
    }
}

pub(crate) fn type_mismatch(class: &Class) -> DbError {
    DbError::Type(format!(
        "value does not match class {}",
        class.serialize()
    ))
}
