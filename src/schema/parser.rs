// Schema protocol walker
//
// Turns a parsed JSON document into a `Schema` tree, placing every leaf in a
// byte buffer as it is discovered so inline values can be written and
// `{"reference": path}` lengths can be read back while parsing continues.
// A structure-only walk keeps just the inline values.

use serde_json::{Map, Value};
use tracing::trace;

use crate::codec::array::{read_element, write_elements, write_str};
use crate::codec::element::Scalar;
use crate::internal::endianness::Endianness;
use crate::internal::error::{Error, Result};
use crate::schema::hierarchy::Schema;
use crate::schema::types::{DataType, TypeId};
use crate::schema::utils::{path_segments, PARENT};

/// Backing memory for the leaves of a walk
pub(crate) enum Buffer<'b> {
    /// Grows as leaves are placed
    Owned(Vec<u8>),
    /// Caller memory; placing a leaf past its end fails
    External(&'b mut [u8]),
    /// No memory behind the leaves. Inline values are kept as
    /// `(offset, bytes)` segments in the order they were written.
    Detached(Vec<(usize, Vec<u8>)>),
}

impl<'b> Buffer<'b> {
    fn len(&self) -> usize {
        match self {
            Buffer::Owned(bytes) => bytes.len(),
            Buffer::External(bytes) => bytes.len(),
            Buffer::Detached(_) => 0,
        }
    }

    /// Makes sure `end` bytes are addressable
    fn reserve(&mut self, end: usize) -> Result<()> {
        match self {
            Buffer::Owned(bytes) => {
                if bytes.len() < end {
                    bytes.resize(end, 0);
                }
                Ok(())
            }
            Buffer::External(bytes) if bytes.len() < end => Err(Error::OutOfRange(format!(
                "external buffer of {} bytes cannot hold a layout spanning {} bytes",
                bytes.len(),
                end
            ))),
            Buffer::External(_) | Buffer::Detached(_) => Ok(()),
        }
    }

    /// Runs `write` over the memory of `dtype`. A detached buffer hands it
    /// room for the first `count` elements only and records the result.
    fn write_leaf<F>(&mut self, dtype: &DataType, count: usize, write: F) -> Result<()>
    where
        F: FnOnce(&mut [u8], &DataType) -> Result<()>,
    {
        match self {
            Buffer::Owned(bytes) => write(&mut bytes[..], dtype),
            Buffer::External(bytes) => write(&mut bytes[..], dtype),
            Buffer::Detached(segments) => {
                let local = relocated(dtype, count);
                let mut bytes = vec![0u8; local.spanned_bytes()];
                write(&mut bytes[..], &local)?;
                segments.push((dtype.offset(), bytes));
                Ok(())
            }
        }
    }

    /// Reads the first element of a placed numeric leaf
    fn read_first(&self, dtype: &DataType) -> Result<Scalar> {
        match self {
            Buffer::Owned(bytes) => read_element(bytes, dtype, 0),
            Buffer::External(bytes) => read_element(bytes, dtype, 0),
            Buffer::Detached(segments) => {
                let local = relocated(dtype, dtype.number_of_elements().min(1));
                let mut bytes = vec![0u8; local.spanned_bytes()];
                let start = dtype.offset();
                let end = start + bytes.len();
                // later segments overwrite earlier ones, as in a real buffer
                for (at, segment) in segments {
                    let lo = start.max(*at);
                    let hi = end.min(at + segment.len());
                    if lo < hi {
                        bytes[lo - start..hi - start].copy_from_slice(&segment[lo - at..hi - at]);
                    }
                }
                read_element(&bytes, &local, 0)
            }
        }
    }
}

/// `dtype` moved to offset 0 and cut to `count` elements
fn relocated(dtype: &DataType, count: usize) -> DataType {
    DataType::new(
        dtype.id(),
        count,
        0,
        dtype.stride(),
        dtype.element_bytes(),
        dtype.endianness(),
    )
}

/// How leaf offsets are assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Leaves follow each other from offset 0; an explicit `offset` is absolute
    Contiguous,
    /// Each leaf gets its own region at the end of the buffer; an explicit
    /// `offset` is relative to that region
    Allocate,
}

/// A partially built ancestor, used to resolve `..` in reference paths
struct Scope<'s> {
    schema: &'s Schema,
    parent: Option<&'s Scope<'s>>,
}

pub(crate) struct SchemaWalker<'b> {
    buffer: Buffer<'b>,
    placement: Placement,
}

impl<'b> SchemaWalker<'b> {
    pub(crate) fn new(buffer: Buffer<'b>, placement: Placement) -> Self {
        Self { buffer, placement }
    }

    /// Walks a whole document
    pub(crate) fn walk_document(&mut self, document: &Value) -> Result<Schema> {
        self.walk(document, 0, None)
    }

    pub(crate) fn into_buffer(self) -> Buffer<'b> {
        self.buffer
    }

    fn walk(&mut self, jvalue: &Value, offset: usize, scope: Option<&Scope>) -> Result<Schema> {
        match jvalue {
            Value::Object(members) => match members.get("dtype") {
                Some(Value::Object(_)) => self.walk_repeated(members, offset, scope),
                Some(Value::String(_)) => self.walk_leaf(members, offset, scope),
                Some(other) => Err(Error::ParseError(format!(
                    "dtype must be a type name or an object, found {}",
                    other
                ))),
                None => self.walk_object(members, offset, scope),
            },
            Value::Array(items) => {
                let mut list = Schema::list();
                let mut curr = offset;
                for item in items {
                    let child = {
                        let frame = Scope {
                            schema: &list,
                            parent: scope,
                        };
                        self.walk(item, curr, Some(&frame))?
                    };
                    curr = advance(curr, &child)?;
                    list.append_schema(child)?;
                }
                Ok(list)
            }
            Value::String(name) => {
                let id: TypeId = name.parse()?;
                if !id.is_leaf() {
                    return Ok(Schema::from_type_id(id));
                }
                let dtype = self.place_leaf(DataType::leaf(id, 1), None, offset)?;
                Ok(Schema::from_dtype(dtype))
            }
            other => Err(Error::ParseError(format!(
                "expected an object, array or type name in schema text, found {}",
                other
            ))),
        }
    }

    fn walk_object(&mut self, members: &Map<String, Value>, offset: usize, scope: Option<&Scope>) -> Result<Schema> {
        let mut object = Schema::object();
        let mut curr = offset;
        for (name, value) in members {
            let child = {
                let frame = Scope {
                    schema: &object,
                    parent: scope,
                };
                self.walk(value, curr, Some(&frame))?
            };
            curr = advance(curr, &child)?;
            object.insert_member(name, child)?;
        }
        Ok(object)
    }

    /// `{"dtype": {...}, "length": n}`: `n` copies of the block, as a list
    fn walk_repeated(&mut self, members: &Map<String, Value>, offset: usize, scope: Option<&Scope>) -> Result<Schema> {
        let block = &members["dtype"];
        let length = match members.get("length") {
            Some(length) => self.length_value(length, scope)?,
            None => 1,
        };
        let mut list = Schema::list();
        let mut curr = offset;
        for _ in 0..length {
            let child = {
                let frame = Scope {
                    schema: &list,
                    parent: scope,
                };
                self.walk(block, curr, Some(&frame))?
            };
            curr = advance(curr, &child)?;
            list.append_schema(child)?;
        }
        Ok(list)
    }

    /// `{"dtype": "<name>", ...}`: a leaf with explicit layout and optional value
    fn walk_leaf(&mut self, members: &Map<String, Value>, offset: usize, scope: Option<&Scope>) -> Result<Schema> {
        let name = members["dtype"].as_str().unwrap_or_default();
        let id: TypeId = name.parse()?;
        if !id.is_leaf() {
            return Ok(Schema::from_type_id(id));
        }

        let value = members.get("value");
        let number_of_elements = match members.get("length") {
            Some(length) => self.length_value(length, scope)?,
            None => match value {
                Some(Value::Array(items)) => items.len(),
                Some(Value::String(text)) => text.len(),
                _ => 1,
            },
        };

        let natural = id.default_bytes();
        let element_bytes = usize_member(members, "element_bytes")?.unwrap_or(natural);
        if element_bytes < natural {
            return Err(Error::ParseError(format!(
                "element_bytes {} is smaller than the {} bytes of {}",
                element_bytes, natural, id
            )));
        }
        let stride = usize_member(members, "stride")?.unwrap_or(element_bytes);
        let endianness = match members.get("endianness") {
            Some(Value::String(text)) => Endianness::from_name(text),
            Some(other) => {
                return Err(Error::ParseError(format!("endianness must be a string, found {}", other)))
            }
            None => Endianness::Default,
        };

        let dtype = DataType::new(id, number_of_elements, 0, stride, element_bytes, endianness);
        let dtype = self.place_leaf(dtype, usize_member(members, "offset")?, offset)?;
        if let Some(value) = value {
            self.write_inline(value, &dtype)?;
        }
        Ok(Schema::from_dtype(dtype))
    }

    fn place_leaf(&mut self, mut dtype: DataType, explicit: Option<usize>, curr: usize) -> Result<DataType> {
        let offset = match self.placement {
            Placement::Contiguous => Some(explicit.unwrap_or(curr)),
            Placement::Allocate => self.buffer.len().checked_add(explicit.unwrap_or(0)),
        }
        .ok_or_else(|| too_large(&dtype))?;
        dtype.set_offset(offset);
        let end = dtype.checked_spanned_bytes().ok_or_else(|| too_large(&dtype))?;
        self.buffer.reserve(end)?;
        trace!(dtype = %dtype.id(), offset, bytes = dtype.total_bytes(), "placed leaf");
        Ok(dtype)
    }

    /// Writes an inline `value` into a freshly placed leaf
    fn write_inline(&mut self, value: &Value, dtype: &DataType) -> Result<()> {
        let capacity = dtype.number_of_elements();
        match value {
            Value::Null => Ok(()),
            Value::Bool(flag) => {
                if dtype.id() != TypeId::UInt8 {
                    return Err(incompatible("boolean", dtype));
                }
                check_capacity(1, capacity)?;
                let scalar = Scalar::UInt(u64::from(*flag));
                self.buffer.write_leaf(dtype, 1, |bytes, dtype| write_elements(bytes, dtype, &[scalar]))
            }
            Value::Number(_) => {
                if !dtype.is_number() {
                    return Err(incompatible("number", dtype));
                }
                check_capacity(1, capacity)?;
                let scalar = Scalar::from_json(value).ok_or_else(|| incompatible("number", dtype))?;
                self.buffer.write_leaf(dtype, 1, |bytes, dtype| write_elements(bytes, dtype, &[scalar]))
            }
            Value::String(text) => {
                if !dtype.is_string() {
                    return Err(incompatible("string", dtype));
                }
                check_capacity(text.len(), capacity)?;
                self.buffer.write_leaf(dtype, text.len(), |bytes, dtype| write_str(bytes, dtype, text))
            }
            Value::Array(items) => {
                if !dtype.is_number() {
                    return Err(incompatible("array", dtype));
                }
                let scalars = items
                    .iter()
                    .map(Scalar::from_json)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| Error::ParseError("inline value arrays must only hold numbers".to_string()))?;
                check_capacity(scalars.len(), capacity)?;
                self.buffer
                    .write_leaf(dtype, scalars.len(), |bytes, dtype| write_elements(bytes, dtype, &scalars))
            }
            Value::Object(_) => Err(incompatible("object", dtype)),
        }
    }

    /// A `length` member: a non-negative integer or `{"reference": path}`
    fn length_value(&self, length: &Value, scope: Option<&Scope>) -> Result<usize> {
        match length {
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| Error::ParseError(format!("length must be a non-negative integer, found {}", n))),
            Value::Object(reference) => match reference.get("reference") {
                Some(Value::String(path)) => self.resolve_reference(path, scope),
                _ => Err(Error::ParseError(
                    "length objects must carry a string reference".to_string(),
                )),
            },
            other => Err(Error::ParseError(format!("invalid length: {}", other))),
        }
    }

    /// Reads the length stored at `path`, which starts at the node being
    /// parsed. Its first `..` reaches the nearest enclosing object or list.
    fn resolve_reference(&self, path: &str, scope: Option<&Scope>) -> Result<usize> {
        let unresolved = |reason: &str| Error::ParseError(format!("reference '{}' {}", path, reason));

        // None: still at the node under construction
        let mut frame: Option<&Scope> = None;
        let mut descended: Vec<&Schema> = Vec::new();
        for segment in path_segments(path) {
            if segment == PARENT {
                if descended.pop().is_some() {
                    continue;
                }
                frame = match frame {
                    None => scope,
                    Some(current) => current.parent,
                };
                if frame.is_none() {
                    return Err(unresolved("climbs above the document root"));
                }
                continue;
            }
            let current = match (descended.last(), frame) {
                (Some(schema), _) => *schema,
                (None, Some(current)) => current.schema,
                (None, None) => return Err(unresolved("descends into the node being parsed")),
            };
            let child = current
                .fetch_child(segment)
                .map_err(|_| unresolved("does not name a parsed node"))?;
            descended.push(child);
        }

        let target = match (descended.last(), frame) {
            (Some(schema), _) => *schema,
            (None, Some(current)) => current.schema,
            (None, None) => return Err(unresolved("points at the node being parsed")),
        };
        if !target.dtype().is_number() {
            return Err(unresolved("does not point at a numeric leaf"));
        }
        let value = self
            .buffer
            .read_first(&target.dtype())
            .map_err(|e| unresolved(&format!("cannot be read: {}", e)))?;
        value
            .to_index()
            .ok_or_else(|| unresolved("does not hold a non-negative integer"))
    }
}

fn usize_member(members: &Map<String, Value>, key: &str) -> Result<Option<usize>> {
    match members.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| Error::ParseError(format!("{} must be a non-negative integer, found {}", key, value))),
    }
}

/// Offset after `child`, which was placed at `curr`
fn advance(curr: usize, child: &Schema) -> Result<usize> {
    curr.checked_add(child.total_bytes()).ok_or_else(|| {
        Error::ParseError(format!(
            "layout does not fit in memory: {} bytes follow offset {}",
            child.total_bytes(),
            curr
        ))
    })
}

fn too_large(dtype: &DataType) -> Error {
    Error::ParseError(format!(
        "{} leaf of {} elements at offset {} does not fit in memory",
        dtype.id(),
        dtype.number_of_elements(),
        dtype.offset()
    ))
}

fn check_capacity(count: usize, capacity: usize) -> Result<()> {
    if count > capacity {
        return Err(Error::ParseError(format!(
            "inline value holds {} elements but the leaf declares {}",
            count, capacity
        )));
    }
    Ok(())
}

fn incompatible(kind: &str, dtype: &DataType) -> Error {
    Error::ParseError(format!(
        "inline {} value is incompatible with a {} leaf",
        kind,
        dtype.id()
    ))
}
