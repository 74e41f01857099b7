//! Runtime class descriptors: the closed set of {primitive, string, struct,
//! relation} variants and their canonical textual serialization.

use crate::error::{DbError, Result};

const FORBIDDEN_NAME_CHARS: [char; 4] = ['@', '_', '<', '>'];

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DbError::Type("class name must not be empty".into()));
    }
    if name.chars().any(|c| FORBIDDEN_NAME_CHARS.contains(&c)) {
        return Err(DbError::Type(format!(
            "invalid class name {name:?}: must not contain '@', '_', '<' or '>'"
        )));
    }
    Ok(())
}

/// The flat set of supported scalar types, standing in for the original's
/// arbitrary-`T` template — idiomatic Rust prefers an enum over generating
/// one monomorphization per scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl PrimitiveType {
    pub fn width(self) -> u64 {
        match self {
            PrimitiveType::Bool | PrimitiveType::I8 | PrimitiveType::U8 => 1,
            PrimitiveType::I16 | PrimitiveType::U16 => 2,
            PrimitiveType::I32 | PrimitiveType::U32 | PrimitiveType::F32 => 4,
            PrimitiveType::I64 | PrimitiveType::U64 | PrimitiveType::F64 => 8,
        }
    }

    /// The grammar's `<type-tag>`, whitespace already stripped.
    pub fn tag(self) -> &'static str {
        match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::I8 => "char",
            PrimitiveType::U8 => "unsignedchar",
            PrimitiveType::I16 => "shortint",
            PrimitiveType::U16 => "shortunsignedint",
            PrimitiveType::I32 => "int",
            PrimitiveType::U32 => "unsignedint",
            PrimitiveType::I64 => "longlongint",
            PrimitiveType::U64 => "unsignedlong",
            PrimitiveType::F32 => "float",
            PrimitiveType::F64 => "double",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "bool" => PrimitiveType::Bool,
            "char" => PrimitiveType::I8,
            "unsignedchar" => PrimitiveType::U8,
            "shortint" => PrimitiveType::I16,
            "shortunsignedint" => PrimitiveType::U16,
            "int" => PrimitiveType::I32,
            "unsignedint" => PrimitiveType::U32,
            "longlongint" => PrimitiveType::I64,
            "unsignedlong" => PrimitiveType::U64,
            "float" => PrimitiveType::F32,
            "double" => PrimitiveType::F64,
            _ => return None,
        })
    }
}

/// A runtime type descriptor. Equality between two classes is defined by
/// equality of their serialized form, not structural Rust equality — use
/// `serialize()` for that comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Class {
    Primitive {
        name: String,
        ty: PrimitiveType,
    },
    String {
        name: String,
    },
    Struct {
        name: String,
        fields: Vec<Class>,
    },
    Relation {
        name: String,
        ingress: Box<Class>,
        egress: Box<Class>,
        attributes: Option<Box<Class>>,
    },
}

impl Class {
    pub fn primitive(name: &str, ty: PrimitiveType) -> Result<Self> {
        validate_name(name)?;
        Ok(Class::Primitive {
            name: name.to_string(),
            ty,
        })
    }

    pub fn string(name: &str) -> Result<Self> {
        validate_name(name)?;
        Ok(Class::String {
            name: name.to_string(),
        })
    }

    pub fn strct(name: &str, fields: Vec<Class>) -> Result<Self> {
        validate_name(name)?;
        Ok(Class::Struct {
            name: name.to_string(),
            fields,
        })
    }

    pub fn relation(name: &str, ingress: Class, egress: Class) -> Result<Self> {
        validate_name(name)?;
        Ok(Class::Relation {
            name: name.to_string(),
            ingress: Box::new(ingress),
            egress: Box::new(egress),
            attributes: None,
        })
    }

    pub fn relation_with_attributes(
        name: &str,
        ingress: Class,
        egress: Class,
        attributes: Class,
    ) -> Result<Self> {
        validate_name(name)?;
        Ok(Class::Relation {
            name: name.to_string(),
            ingress: Box::new(ingress),
            egress: Box::new(egress),
            attributes: Some(Box::new(attributes)),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Class::Primitive { name, .. }
            | Class::String { name }
            | Class::Struct { name, .. }
            | Class::Relation { name, .. } => name,
        }
    }

    /// Count of scalar slots; used to validate constructor arity upstream.
    pub fn count(&self) -> u64 {
        match self {
            Class::Primitive { .. } | Class::String { .. } => 1,
            Class::Struct { fields, .. } => fields.iter().map(Class::count).sum(),
            Class::Relation { attributes, .. } => {
                2 + attributes.as_ref().map(|a| a.count()).unwrap_or(0)
            }
        }
    }

    /// Byte width on disk, or `None` when variable-size (a string, or a
    /// struct/relation containing one).
    pub fn size(&self) -> Option<u64> {
        match self {
            Class::Primitive { ty, .. } => Some(ty.width()),
            Class::String { .. } => None,
            Class::Struct { fields, .. } => {
                let mut total = 0u64;
                for f in fields {
                    total += f.size()?;
                }
                Some(total)
            }
            Class::Relation {
                ingress: _,
                egress: _,
                attributes,
                ..
            } => {
                let id_pair = 2 * std::mem::size_of::<u64>() as u64;
                match attributes {
                    None => Some(id_pair),
                    Some(a) => a.size().map(|s| s + id_pair),
                }
            }
        }
    }

    /// Canonical grammar-based serialization, also the content-addressed
    /// cache key used by the class catalog.
    pub fn serialize(&self) -> String {
        match self {
            Class::Primitive { name, ty } => format!("_{}@{}_", ty.tag(), name),
            Class::String { name } => format!("_string@{name}_"),
            Class::Struct { name, fields } => {
                let mut s = format!("_struct@{name}_<");
                for f in fields {
                    s.push_str(&f.serialize());
                }
                s.push_str(">_");
                s
            }
            Class::Relation {
                name,
                ingress,
                egress,
                attributes,
            } => {
                let mut s = format!("_relation@{name}_{}{}", ingress.serialize(), egress.serialize());
                match attributes {
                    Some(a) => {
                        s.push('1');
                        s.push_str(&a.serialize());
                    }
                    None => s.push('_'),
                }
                s
            }
        }
    }

    /// Parses a class back out of its canonical serialization.
    pub fn parse(serialized: &str) -> Result<Class> {
        let mut parser = Parser {
            chars: serialized.chars().peekable(),
        };
        parser
            .parse_class()?
            .ok_or_else(|| DbError::Type("empty class serialization".into()))
    }
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn next_char(&mut self) -> Result<char> {
        self.chars
            .next()
            .ok_or_else(|| DbError::Type("unexpected end of class serialization".into()))
    }

    fn read_until(&mut self, end: char) -> Result<String> {
        let mut out = String::new();
        loop {
            let c = self.next_char()?;
            if c == end {
                return Ok(out);
            }
            out.push(c);
        }
    }

    /// `None` means the next token was the `>` closing a struct's field
    /// list rather than another class.
    fn parse_class(&mut self) -> Result<Option<Class>> {
        let delim = self.next_char()?;
        if delim == '>' {
            return Ok(None);
        }
        if delim != '_' {
            return Err(DbError::Type(format!(
                "expected '_' or '>' in class grammar, found {delim:?}"
            )));
        }

        let tag = self.read_until('@')?;
        match tag.as_str() {
            "struct" => {
                let name = self.read_until('_')?;
                let open = self.next_char()?;
                if open != '<' {
                    return Err(DbError::Type("expected '<' after struct name".into()));
                }
                let mut fields = Vec::new();
                while let Some(field) = self.parse_class()? {
                    fields.push(field);
                }
                let close = self.next_char()?;
                if close != '_' {
                    return Err(DbError::Type("expected trailing '_' after struct body".into()));
                }
                Ok(Some(Class::Struct { name, fields }))
            }
            "relation" => {
                let name = self.read_until('_')?;
                let ingress = self
                    .parse_class()?
                    .ok_or_else(|| DbError::Type("relation missing ingress class".into()))?;
                let egress = self
                    .parse_class()?
                    .ok_or_else(|| DbError::Type("relation missing egress class".into()))?;
                let marker = self.next_char()?;
                let attributes = match marker {
                    '1' => Some(Box::new(self.parse_class()?.ok_or_else(|| {
                        DbError::Type("relation attribute marker set but class missing".into())
                    })?)),
                    '_' => None,
                    other => {
                        return Err(DbError::Type(format!(
                            "expected '_' or '1' after relation egress, found {other:?}"
                        )))
                    }
                };
                Ok(Some(Class::Relation {
                    name,
                    ingress: Box::new(ingress),
                    egress: Box::new(egress),
                    attributes,
                }))
            }
            "string" => {
                let name = self.read_until('_')?;
                Ok(Some(Class::String { name }))
            }
            other => {
                let ty = PrimitiveType::from_tag(other).ok_or_else(|| {
                    DbError::Type(format!("unsupported class tag for deserialization: {other}"))
                })?;
                let name = self.read_until('_')?;
                Ok(Some(Class::Primitive { name, ty }))
            }
        }
    }
}

/// Deterministic, per-class magic tag derived from the class's
/// serialization — resolves the open question about `InitClassHeader`
/// never assigning a distinct value in the original source.
pub fn derive_magic(serialized: &str) -> u64 {
    // FNV-1a.
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in serialized.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_class() -> Class {
        Class::strct(
            "person",
            vec![
                Class::string("name").unwrap(),
                Class::string("surname").unwrap(),
                Class::primitive("age", PrimitiveType::I32).unwrap(),
                Class::primitive("money", PrimitiveType::U64).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn person_serializes_to_the_literal_seed_string() {
        let person = person_class();
        assert_eq!(
            person.serialize(),
            "_struct@person_<_string@name__string@surname__int@age__unsignedlong@money_>_"
        );
    }

    #[test]
    fn serialize_then_parse_round_trips() {
        let person = person_class();
        let parsed = Class::parse(&person.serialize()).unwrap();
        assert_eq!(parsed.serialize(), person.serialize());
    }

    #[test]
    fn primitive_round_trips() {
        let c = Class::primitive("lat", PrimitiveType::F64).unwrap();
        let parsed = Class::parse(&c.serialize()).unwrap();
        assert_eq!(parsed.serialize(), c.serialize());
        assert_eq!(parsed.size(), Some(8));
    }

    #[test]
    fn relation_without_attributes_round_trips() {
        let point = Class::primitive("value", PrimitiveType::I32).unwrap();
        let rel = Class::relation("edge", point.clone(), point).unwrap();
        let parsed = Class::parse(&rel.serialize()).unwrap();
        assert_eq!(parsed.serialize(), rel.serialize());
        assert_eq!(rel.size(), Some(16));
    }

    #[test]
    fn relation_with_attributes_round_trips() {
        let point = Class::primitive("value", PrimitiveType::I32).unwrap();
        let weight = Class::primitive("weight", PrimitiveType::F64).unwrap();
        let rel =
            Class::relation_with_attributes("weighted_edge", point.clone(), point, weight).unwrap();
        let parsed = Class::parse(&rel.serialize()).unwrap();
        assert_eq!(parsed.serialize(), rel.serialize());
        assert_eq!(rel.size(), Some(24));
    }

    #[test]
    fn struct_with_variable_field_has_unknown_size() {
        let c = Class::strct("name_holder", vec![Class::string("name").unwrap()]).unwrap();
        assert_eq!(c.size(), None);
    }

    #[test]
    fn name_rejects_forbidden_characters() {
        for bad in ["a@b", "a_b", "a<b", "a>b", ""] {
            assert!(Class::string(bad).is_err());
        }
    }

    #[test]
    fn count_sums_nested_struct_fields() {
        let person = person_class();
        assert_eq!(person.count(), 4);
    }

    #[test]
    fn derive_magic_is_deterministic_and_distinct() {
        let a = derive_magic("_int@x_");
        let b = derive_magic("_int@x_");
        let c = derive_magic("_int@y_");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
