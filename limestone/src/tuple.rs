//! Fields, schemas, and tuples.
//!
//! Every field has a fixed on-disk width so that pages can hold
//! fixed-size records: ints are 4 big-endian bytes, strings are a 4-byte
//! big-endian length followed by exactly `STRING_CAPACITY` payload bytes.

use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut};

use crate::error::DbError;
use crate::RecordId;

/// Maximum number of bytes a string field can hold.
pub const STRING_CAPACITY: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    Str,
}

impl FieldType {
    /// On-disk width of a field of this type.
    pub fn byte_len(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::Str => 4 + STRING_CAPACITY,
        }
    }
}

/// Comparison operators applicable to fields. `Like` is substring
/// containment on strings and plain equality on ints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Int,
            Field::Str(_) => FieldType::Str,
        }
    }

    /// Compares `self op other`. Comparisons across types are false.
    pub fn compare(&self, op: CompareOp, other: &Field) -> bool {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => match op {
                CompareOp::Eq | CompareOp::Like => a == b,
                CompareOp::Ne => a != b,
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                CompareOp::Ge => a >= b,
            },
            (Field::Str(a), Field::Str(b)) => match op {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                CompareOp::Ge => a >= b,
                CompareOp::Like => a.contains(b.as_str()),
            },
            _ => false,
        }
    }

    /// Appends the fixed-width encoding of this field to `buf`.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        match self {
            Field::Int(v) => buf.put_i32(*v),
            Field::Str(s) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(STRING_CAPACITY);
                buf.put_u32(len as u32);
                buf.put_slice(&bytes[..len]);
                buf.put_bytes(0, STRING_CAPACITY - len);
            }
        }
    }

    /// Reads one field of type `ftype` from `buf`.
    pub fn parse(ftype: FieldType, buf: &mut impl Buf) -> Result<Field, DbError> {
        match ftype {
            FieldType::Int => {
                if buf.remaining() < 4 {
                    return Err(truncated());
                }
                Ok(Field::Int(buf.get_i32()))
            }
            FieldType::Str => {
                if buf.remaining() < 4 + STRING_CAPACITY {
                    return Err(truncated());
                }
                let len = (buf.get_u32() as usize).min(STRING_CAPACITY);
                let mut payload = [0u8; STRING_CAPACITY];
                buf.copy_to_slice(&mut payload);
                Ok(Field::Str(
                    String::from_utf8_lossy(&payload[..len]).into_owned(),
                ))
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}

fn truncated() -> DbError {
    DbError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "field data truncated",
    ))
}

/// The schema of a tuple: an ordered sequence of field types with
/// optional names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TupleDesc {
    items: Vec<(FieldType, Option<String>)>,
}

impl TupleDesc {
    pub fn new(items: Vec<(FieldType, Option<String>)>) -> Self {
        Self { items }
    }

    /// A schema with anonymous fields.
    pub fn unnamed(types: Vec<FieldType>) -> Self {
        Self {
            items: types.into_iter().map(|t| (t, None)).collect(),
        }
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn field_type(&self, i: usize) -> FieldType {
        self.items[i].0
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.items[i].1.as_deref()
    }

    /// Index of the first field with the given name.
    pub fn field_index(&self, name: &str) -> Result<usize, DbError> {
        self.items
            .iter()
            .position(|(_, n)| n.as_deref() == Some(name))
            .ok_or_else(|| DbError::NoSuchField(name.to_string()))
    }

    /// Byte size of a tuple with this schema.
    pub fn size(&self) -> usize {
        self.items.iter().map(|(t, _)| t.byte_len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldType, Option<&str>)> {
        self.items.iter().map(|(t, n)| (*t, n.as_deref()))
    }

    /// Concatenates two schemas, `a`'s fields first.
    pub fn merge(a: &TupleDesc, b: &TupleDesc) -> TupleDesc {
        let mut items = a.items.clone();
        items.extend(b.items.iter().cloned());
        TupleDesc { items }
    }
}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (t, n)) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}({})", t, n.as_deref().unwrap_or(""))?;
        }
        Ok(())
    }
}

/// A row: a schema, one field per schema entry, and (once stored) the
/// record id of its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    rid: Option<RecordId>,
}

impl Tuple {
    /// Builds a tuple, checking each field against the schema.
    pub fn new(desc: Arc<TupleDesc>, fields: Vec<Field>) -> Result<Self, DbError> {
        if fields.len() != desc.num_fields() {
            return Err(DbError::SchemaMismatch);
        }
        for (i, f) in fields.iter().enumerate() {
            if f.field_type() != desc.field_type(i) {
                return Err(DbError::SchemaMismatch);
            }
        }
        Ok(Self {
            desc,
            fields,
            rid: None,
        })
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.rid
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.rid = rid;
    }

    /// Appends this tuple's `desc.size()` bytes to `buf`.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        for f in &self.fields {
            f.serialize(buf);
        }
    }

    /// Reads one tuple with the given schema from `buf`.
    pub fn parse(desc: Arc<TupleDesc>, buf: &mut impl Buf) -> Result<Tuple, DbError> {
        let mut fields = Vec::with_capacity(desc.num_fields());
        for i in 0..desc.num_fields() {
            fields.push(Field::parse(desc.field_type(i), buf)?);
        }
        Ok(Tuple {
            desc,
            fields,
            rid: None,
        })
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}
