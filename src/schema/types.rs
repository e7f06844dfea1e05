// Leaf and shape descriptors for the strata data model
//
// `TypeId` names every kind a schema node can describe and `DataType`
// describes how the elements of a leaf are laid out in a byte buffer:
// count, offset, stride, element width and declared byte order.

use std::fmt;
use std::str::FromStr;

use crate::internal::endianness::Endianness;
use crate::internal::error::{Error, Result};
use crate::schema::render::{write_key, write_quoted};

/// Identifies the kind described by a `DataType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeId {
    /// No content
    Empty,
    /// Named, ordered children
    Object,
    /// Unnamed, ordered children
    List,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// UTF-8 bytes, one element per byte
    Utf8String,
}

impl TypeId {
    /// Every type id, in declaration order
    pub const ALL: [TypeId; 14] = [
        TypeId::Empty,
        TypeId::Object,
        TypeId::List,
        TypeId::Int8,
        TypeId::Int16,
        TypeId::Int32,
        TypeId::Int64,
        TypeId::UInt8,
        TypeId::UInt16,
        TypeId::UInt32,
        TypeId::UInt64,
        TypeId::Float32,
        TypeId::Float64,
        TypeId::Utf8String,
    ];

    /// Canonical spelling used in schema text
    pub fn name(self) -> &'static str {
        match self {
            TypeId::Empty => "empty",
            TypeId::Object => "object",
            TypeId::List => "list",
            TypeId::Int8 => "int8",
            TypeId::Int16 => "int16",
            TypeId::Int32 => "int32",
            TypeId::Int64 => "int64",
            TypeId::UInt8 => "uint8",
            TypeId::UInt16 => "uint16",
            TypeId::UInt32 => "uint32",
            TypeId::UInt64 => "uint64",
            TypeId::Float32 => "float32",
            TypeId::Float64 => "float64",
            TypeId::Utf8String => "utf8_string",
        }
    }

    /// Case-sensitive lookup of a canonical name
    pub fn from_name(name: &str) -> Option<TypeId> {
        TypeId::ALL.iter().copied().find(|id| id.name() == name)
    }

    /// Natural width in bytes of one element of this kind (0 for non-leaf kinds)
    pub fn default_bytes(self) -> usize {
        match self {
            TypeId::Int8 | TypeId::UInt8 | TypeId::Utf8String => 1,
            TypeId::Int16 | TypeId::UInt16 => 2,
            TypeId::Int32 | TypeId::UInt32 | TypeId::Float32 => 4,
            TypeId::Int64 | TypeId::UInt64 | TypeId::Float64 => 8,
            TypeId::Empty | TypeId::Object | TypeId::List => 0,
        }
    }

    /// Returns true if this id is one of the ten numeric kinds
    pub fn is_number(self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_integer(self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub fn is_signed_integer(self) -> bool {
        matches!(self, TypeId::Int8 | TypeId::Int16 | TypeId::Int32 | TypeId::Int64)
    }

    pub fn is_unsigned_integer(self) -> bool {
        matches!(self, TypeId::UInt8 | TypeId::UInt16 | TypeId::UInt32 | TypeId::UInt64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, TypeId::Float32 | TypeId::Float64)
    }

    pub fn is_string(self) -> bool {
        matches!(self, TypeId::Utf8String)
    }

    /// Returns true for kinds that describe bytes directly (numbers and strings)
    pub fn is_leaf(self) -> bool {
        self.is_number() || self.is_string()
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TypeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TypeId::from_name(s).ok_or_else(|| Error::ParseError(format!("Unknown type name: {}", s)))
    }
}

/// Layout description of a leaf: `number_of_elements` elements of kind `id`,
/// the first starting `offset` bytes into the owning buffer and each
/// following one `stride` bytes after the previous.
///
/// For `Empty`, `Object` and `List` the numeric fields are not meaningful;
/// the size of those schemas is owned by `Schema`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataType {
    id: TypeId,
    number_of_elements: usize,
    offset: usize,
    stride: usize,
    element_bytes: usize,
    endianness: Endianness,
}

impl Default for DataType {
    fn default() -> Self {
        DataType::empty()
    }
}

impl DataType {
    /// Creates a fully specified data type
    pub fn new(
        id: TypeId,
        number_of_elements: usize,
        offset: usize,
        stride: usize,
        element_bytes: usize,
        endianness: Endianness,
    ) -> Self {
        Self {
            id,
            number_of_elements,
            offset,
            stride,
            element_bytes,
            endianness,
        }
    }

    /// Creates a contiguous leaf at offset 0 using the natural width of `id`
    pub fn leaf(id: TypeId, number_of_elements: usize) -> Self {
        let bytes = id.default_bytes();
        Self::new(id, number_of_elements, 0, bytes, bytes, Endianness::Default)
    }

    pub fn empty() -> Self {
        Self::new(TypeId::Empty, 0, 0, 0, 0, Endianness::Default)
    }

    pub fn object() -> Self {
        Self::new(TypeId::Object, 0, 0, 0, 0, Endianness::Default)
    }

    pub fn list() -> Self {
        Self::new(TypeId::List, 0, 0, 0, 0, Endianness::Default)
    }

    pub fn int8(n: usize) -> Self {
        Self::leaf(TypeId::Int8, n)
    }

    pub fn int16(n: usize) -> Self {
        Self::leaf(TypeId::Int16, n)
    }

    pub fn int32(n: usize) -> Self {
        Self::leaf(TypeId::Int32, n)
    }

    pub fn int64(n: usize) -> Self {
        Self::leaf(TypeId::Int64, n)
    }

    pub fn uint8(n: usize) -> Self {
        Self::leaf(TypeId::UInt8, n)
    }

    pub fn uint16(n: usize) -> Self {
        Self::leaf(TypeId::UInt16, n)
    }

    pub fn uint32(n: usize) -> Self {
        Self::leaf(TypeId::UInt32, n)
    }

    pub fn uint64(n: usize) -> Self {
        Self::leaf(TypeId::UInt64, n)
    }

    pub fn float32(n: usize) -> Self {
        Self::leaf(TypeId::Float32, n)
    }

    pub fn float64(n: usize) -> Self {
        Self::leaf(TypeId::Float64, n)
    }

    /// A string leaf holding `n` UTF-8 bytes
    pub fn utf8_string(n: usize) -> Self {
        Self::leaf(TypeId::Utf8String, n)
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn number_of_elements(&self) -> usize {
        self.number_of_elements
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn element_bytes(&self) -> usize {
        self.element_bytes
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn set_number_of_elements(&mut self, n: usize) {
        self.number_of_elements = n;
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    pub fn set_stride(&mut self, stride: usize) {
        self.stride = stride;
    }

    pub fn set_element_bytes(&mut self, element_bytes: usize) {
        self.element_bytes = element_bytes;
    }

    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    pub fn is_number(&self) -> bool {
        self.id.is_number()
    }

    pub fn is_integer(&self) -> bool {
        self.id.is_integer()
    }

    pub fn is_signed_integer(&self) -> bool {
        self.id.is_signed_integer()
    }

    pub fn is_unsigned_integer(&self) -> bool {
        self.id.is_unsigned_integer()
    }

    pub fn is_float(&self) -> bool {
        self.id.is_float()
    }

    pub fn is_string(&self) -> bool {
        self.id.is_string()
    }

    pub fn is_leaf(&self) -> bool {
        self.id.is_leaf()
    }

    /// Natural element width for a type id
    pub fn default_bytes(id: TypeId) -> usize {
        id.default_bytes()
    }

    /// Maps a canonical type name onto its id
    pub fn name_to_id(name: &str) -> Result<TypeId> {
        name.parse()
    }

    pub fn id_to_name(id: TypeId) -> &'static str {
        id.name()
    }

    /// Byte offset of element `idx` from the start of the owning buffer
    pub fn element_index(&self, idx: usize) -> usize {
        self.offset + idx * self.stride
    }

    /// Bytes covered by the elements as declared, from the first element's
    /// start to the last element's end. The leading `offset` is not counted.
    pub fn total_bytes(&self) -> usize {
        if !self.is_leaf() || self.number_of_elements == 0 {
            return 0;
        }
        if self.stride == self.element_bytes {
            self.number_of_elements * self.element_bytes
        } else {
            self.stride * (self.number_of_elements - 1) + self.element_bytes
        }
    }

    /// Bytes the elements occupy once packed back-to-back
    pub fn total_bytes_compact(&self) -> usize {
        if !self.is_leaf() {
            return 0;
        }
        self.number_of_elements * self.element_bytes
    }

    /// Size a buffer must have to hold this leaf at its declared offset
    pub fn spanned_bytes(&self) -> usize {
        if self.total_bytes() == 0 {
            return 0;
        }
        self.offset + self.total_bytes()
    }

    /// `spanned_bytes`, or `None` when the declared layout or its compact
    /// form does not fit in `usize`
    pub fn checked_spanned_bytes(&self) -> Option<usize> {
        if !self.is_leaf() || self.number_of_elements == 0 {
            return Some(0);
        }
        self.element_bytes.checked_mul(self.number_of_elements)?;
        let total = self
            .stride
            .checked_mul(self.number_of_elements - 1)?
            .checked_add(self.element_bytes)?;
        if total == 0 {
            return Some(0);
        }
        self.offset.checked_add(total)
    }

    /// True when elements are packed back-to-back
    pub fn is_compact(&self) -> bool {
        self.stride == self.element_bytes
    }

    /// Writes the compact form of this data type into `dest`: same kind,
    /// count and byte order, stride collapsed to the element width.
    /// The offset is reset to 0; callers place the result.
    pub fn compact_to(&self, dest: &mut DataType) {
        *dest = self.compacted();
    }

    pub fn compacted(&self) -> DataType {
        DataType::new(
            self.id,
            self.number_of_elements,
            0,
            self.element_bytes,
            self.element_bytes,
            self.endianness,
        )
    }

    /// Textual form of this data type as understood by the schema protocol
    pub fn to_json(&self, detailed: bool) -> String {
        let mut out = String::new();
        self.write_json(&mut out, detailed);
        out
    }

    pub(crate) fn write_json(&self, out: &mut String, detailed: bool) {
        out.push('{');
        write_key(out, "dtype");
        write_quoted(out, self.id.name());
        if self.id == TypeId::Empty || !self.is_leaf() {
            out.push('}');
            return;
        }
        out.push_str(", ");
        write_key(out, "length");
        out.push_str(&self.number_of_elements.to_string());
        if detailed {
            out.push_str(", ");
            write_key(out, "offset");
            out.push_str(&self.offset.to_string());
            out.push_str(", ");
            write_key(out, "stride");
            out.push_str(&self.stride.to_string());
            out.push_str(", ");
            write_key(out, "element_bytes");
            out.push_str(&self.element_bytes.to_string());
            out.push_str(", ");
            write_key(out, "endianness");
            write_quoted(out, self.endianness.name());
        }
        out.push('}');
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json(true))
    }
}
