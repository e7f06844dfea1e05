// Live schema + data container
//
// A `Node` pairs a `Schema` with the bytes it describes. The bytes are
// either owned or borrowed from the caller; typed access goes through the
// `DataArray` views of the codec module.

use bytes::Bytes;
use tracing::debug;

use crate::codec::array::{compact_leaf, read_element, read_str, write_elements, write_leaf_json, write_str, DataArray, DataArrayMut};
use crate::codec::element::{Element, Scalar};
use crate::internal::endianness::{swap_elements_in_place, Endianness};
use crate::internal::error::{Error, Result};
use crate::schema::generator::{Generator, Protocol};
use crate::schema::hierarchy::Schema;
use crate::schema::render::{write_block, write_key, JsonOptions};
use crate::schema::types::DataType;

#[derive(Debug)]
enum NodeData<'a> {
    Owned(Vec<u8>),
    External(&'a mut [u8]),
}

/// A schema bound to the memory it describes
#[derive(Debug)]
pub struct Node<'a> {
    schema: Schema,
    data: NodeData<'a>,
}

fn check_capacity(schema: &Schema, len: usize) -> Result<()> {
    let needed = schema.spanned_bytes();
    if len < needed {
        return Err(Error::OutOfRange(format!(
            "buffer of {} bytes cannot hold a layout spanning {} bytes",
            len, needed
        )));
    }
    Ok(())
}

impl Node<'static> {
    /// Allocates zeroed memory for `schema`
    pub fn from_schema(mut schema: Schema) -> Self {
        let data = vec![0u8; schema.spanned_bytes()];
        schema.set_root(true);
        Self {
            schema,
            data: NodeData::Owned(data),
        }
    }

    /// Adopts `data` as the memory of `schema`
    pub fn with_data(mut schema: Schema, data: Vec<u8>) -> Result<Self> {
        check_capacity(&schema, data.len())?;
        schema.set_root(true);
        Ok(Self {
            schema,
            data: NodeData::Owned(data),
        })
    }
}

impl<'a> Node<'a> {
    /// Binds `schema` to caller memory without copying
    pub fn external(mut schema: Schema, data: &'a mut [u8]) -> Result<Self> {
        check_capacity(&schema, data.len())?;
        schema.set_root(true);
        debug!(bytes = data.len(), "bound node to external memory");
        Ok(Self {
            schema,
            data: NodeData::External(data),
        })
    }

    /// Rebuilds a node from schema text and the bytes it describes, as
    /// produced by `to_parts`
    pub fn from_parts(text: &str, data: &'a mut [u8]) -> Result<Self> {
        Generator::with_data(text, Protocol::Schema, data).walk_external()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn dtype(&self) -> DataType {
        self.schema.dtype()
    }

    pub fn data(&self) -> &[u8] {
        match &self.data {
            NodeData::Owned(bytes) => bytes,
            NodeData::External(bytes) => bytes,
        }
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        match &mut self.data {
            NodeData::Owned(bytes) => bytes,
            NodeData::External(bytes) => bytes,
        }
    }

    /// True when the memory belongs to the caller
    pub fn is_external(&self) -> bool {
        matches!(self.data, NodeData::External(_))
    }

    /// Read access to the whole tree
    pub fn view(&self) -> NodeRef<'_> {
        NodeRef {
            schema: &self.schema,
            data: self.data(),
        }
    }

    /// Write access to the whole tree
    pub fn view_mut(&mut self) -> NodeMut<'_> {
        let data = match &mut self.data {
            NodeData::Owned(bytes) => bytes.as_mut_slice(),
            NodeData::External(bytes) => &mut **bytes,
        };
        NodeMut {
            schema: &self.schema,
            data,
        }
    }

    pub fn fetch(&self, path: &str) -> Result<NodeRef<'_>> {
        self.view().fetch(path)
    }

    pub fn child(&self, idx: usize) -> Result<NodeRef<'_>> {
        self.view().child(idx)
    }

    pub fn fetch_mut(&mut self, path: &str) -> Result<NodeMut<'_>> {
        self.view_mut().fetch_mut(path)
    }

    pub fn child_mut(&mut self, idx: usize) -> Result<NodeMut<'_>> {
        self.view_mut().child_mut(idx)
    }

    /// Copies every leaf into a new packed buffer
    pub fn compact_to(&self) -> Result<Node<'static>> {
        let (schema, data) = self.compact_parts()?;
        debug!(from = self.data().len(), to = data.len(), "compacted node");
        Node::with_data(schema, data)
    }

    /// The packed bytes of every leaf, in schema order
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(self.compact_parts()?.1)
    }

    /// Schema text and packed bytes, ready to be sent as a two part message
    pub fn to_parts(&self) -> Result<(String, Bytes)> {
        let (schema, data) = self.compact_parts()?;
        Ok((schema.to_json(), Bytes::from(data)))
    }

    fn compact_parts(&self) -> Result<(Schema, Vec<u8>)> {
        let compact = self.schema.compacted();
        let mut data = vec![0u8; compact.total_bytes()];
        for (source, dest) in self.schema.leaves().iter().zip(compact.leaves()) {
            compact_leaf(self.data(), source, &mut data[dest.offset()..])?;
        }
        Ok((compact, data))
    }

    /// Renders the values of the tree
    pub fn to_json(&self, options: &JsonOptions) -> Result<String> {
        self.view().to_json(options)
    }

    /// Rewrites every numeric leaf in the given byte order, in place, and
    /// records the new order in the schema
    pub fn endian_swap(&mut self, endianness: Endianness) {
        let target = endianness.resolve();
        let data = match &mut self.data {
            NodeData::Owned(bytes) => bytes.as_mut_slice(),
            NodeData::External(bytes) => &mut **bytes,
        };
        debug!(to = %target, "swapping node byte order");
        swap_leaves(&mut self.schema, data, target);
    }
}

fn swap_leaves(schema: &mut Schema, data: &mut [u8], target: Endianness) {
    if schema.is_leaf() {
        let mut dtype = schema.dtype();
        if !dtype.is_number() || dtype.endianness().resolve() == target {
            return;
        }
        let width = dtype.id().default_bytes();
        for idx in 0..dtype.number_of_elements() {
            let start = dtype.element_index(idx);
            swap_elements_in_place(&mut data[start..start + width], width);
        }
        dtype.set_endianness(target);
        schema.set_dtype(dtype);
        return;
    }
    for idx in 0..schema.number_of_children() {
        if let Ok(child) = schema.child_mut(idx) {
            swap_leaves(child, data, target);
        }
    }
}

/// A borrowed subtree of a node
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'n> {
    schema: &'n Schema,
    data: &'n [u8],
}

impl<'n> NodeRef<'n> {
    pub fn schema(&self) -> &'n Schema {
        self.schema
    }

    pub fn dtype(&self) -> DataType {
        self.schema.dtype()
    }

    /// Bytes of the whole node this subtree belongs to
    pub fn data(&self) -> &'n [u8] {
        self.data
    }

    pub fn number_of_children(&self) -> usize {
        self.schema.number_of_children()
    }

    pub fn fetch(&self, path: &str) -> Result<NodeRef<'n>> {
        Ok(NodeRef {
            schema: self.schema.fetch_child(path)?,
            data: self.data,
        })
    }

    pub fn child(&self, idx: usize) -> Result<NodeRef<'n>> {
        Ok(NodeRef {
            schema: self.schema.child(idx)?,
            data: self.data,
        })
    }

    pub fn as_array<T: Element>(&self) -> Result<DataArray<'n, T>> {
        DataArray::new(self.data, self.schema.dtype())
    }

    /// First element of a leaf
    pub fn value<T: Element>(&self) -> Result<T> {
        self.as_array::<T>()?
            .get(0)
            .ok_or_else(|| Error::OutOfRange("leaf has no elements".to_string()))
    }

    /// First element of any numeric leaf, as a length or position
    pub fn to_index(&self) -> Result<usize> {
        read_element(self.data, &self.schema.dtype(), 0)?
            .to_index()
            .ok_or_else(|| Error::InvalidState("value is not a non-negative integer".to_string()))
    }

    /// First element of any numeric leaf, widened
    pub fn to_scalar(&self) -> Result<Scalar> {
        read_element(self.data, &self.schema.dtype(), 0)
    }

    pub fn as_str(&self) -> Result<String> {
        read_str(self.data, &self.schema.dtype())
    }

    pub fn to_json(&self, options: &JsonOptions) -> Result<String> {
        let mut out = String::new();
        write_values(&mut out, self.schema, self.data, options, options.depth)?;
        Ok(out)
    }
}

fn write_values(out: &mut String, schema: &Schema, data: &[u8], options: &JsonOptions, depth: usize) -> Result<()> {
    let mut result = Ok(());
    if schema.is_object() {
        write_block(
            out,
            options,
            depth,
            '{',
            '}',
            schema.names().iter().zip(schema.children()),
            |out, (name, child)| {
                write_key(out, name);
                out.push(' ');
                if result.is_ok() {
                    result = write_values(out, child, data, options, depth + 1);
                }
            },
        );
    } else if schema.is_list() {
        write_block(out, options, depth, '[', ']', schema.children().iter(), |out, child| {
            if result.is_ok() {
                result = write_values(out, child, data, options, depth + 1);
            }
        });
    } else if schema.is_leaf() {
        result = write_leaf_json(out, data, &schema.dtype());
    } else {
        out.push_str("null");
    }
    result
}

/// A mutably borrowed subtree of a node
#[derive(Debug)]
pub struct NodeMut<'n> {
    schema: &'n Schema,
    data: &'n mut [u8],
}

impl<'n> NodeMut<'n> {
    pub fn schema(&self) -> &'n Schema {
        self.schema
    }

    pub fn dtype(&self) -> DataType {
        self.schema.dtype()
    }

    pub fn view(&self) -> NodeRef<'_> {
        NodeRef {
            schema: self.schema,
            data: &*self.data,
        }
    }

    /// Narrows this borrow to the subtree at `path`
    pub fn fetch_mut(self, path: &str) -> Result<NodeMut<'n>> {
        Ok(NodeMut {
            schema: self.schema.fetch_child(path)?,
            data: self.data,
        })
    }

    pub fn child_mut(self, idx: usize) -> Result<NodeMut<'n>> {
        Ok(NodeMut {
            schema: self.schema.child(idx)?,
            data: self.data,
        })
    }

    pub fn as_array_mut<T: Element>(&mut self) -> Result<DataArrayMut<'_, T>> {
        DataArrayMut::new(&mut *self.data, self.schema.dtype())
    }

    /// Casts `values` to the leaf kind and writes them from element 0
    pub fn set_values<S: Element>(&mut self, values: &[S]) -> Result<()> {
        let scalars: Vec<Scalar> = values.iter().map(|v| v.to_scalar()).collect();
        write_elements(&mut *self.data, &self.schema.dtype(), &scalars)
    }

    pub fn set_str(&mut self, value: &str) -> Result<()> {
        write_str(&mut *self.data, &self.schema.dtype(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::TypeId;

    fn point_schema() -> Schema {
        let mut schema = Schema::new();
        schema.fetch("x").unwrap().set_dtype(DataType::float64(1));
        let mut y = DataType::float64(1);
        y.set_offset(8);
        schema.fetch("y").unwrap().set_dtype(y);
        schema
    }

    #[test]
    fn test_from_schema_allocates_zeroed() {
        let node = Node::from_schema(point_schema());
        assert_eq!(node.data(), &[0u8; 16][..]);
        assert!(node.schema().is_root());
        assert!(!node.is_external());
    }

    #[test]
    fn test_with_data_checks_size() {
        let err = Node::with_data(point_schema(), vec![0u8; 10]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Out Of Range: buffer of 10 bytes cannot hold a layout spanning 16 bytes"
        );
    }

    #[test]
    fn test_fetch_and_set_values() {
        let mut node = Node::from_schema(point_schema());
        node.fetch_mut("y").unwrap().set_values(&[2i32]).unwrap();
        assert_eq!(node.fetch("y").unwrap().value::<f64>().unwrap(), 2.0);
        assert!(matches!(node.fetch("y").unwrap().value::<f32>(), Err(Error::InvalidState(_))));
        assert!(matches!(node.fetch("z"), Err(Error::PathNotFound(_))));
    }

    #[test]
    fn test_external_memory_is_shared() {
        let mut memory = [0u8; 16];
        {
            let mut node = Node::external(point_schema(), &mut memory).unwrap();
            assert!(node.is_external());
            let mut x = node.fetch_mut("x").unwrap();
            x.as_array_mut::<f64>().unwrap().set_element(0, 1.5);
        }
        assert_eq!(&memory[..8], &1.5f64.to_ne_bytes());
    }

    #[test]
    fn test_compact_strided_leaf() {
        let mut schema = Schema::new();
        schema
            .fetch("v")
            .unwrap()
            .set_dtype(DataType::new(TypeId::UInt16, 3, 2, 4, 2, Endianness::Little));
        let mut node = Node::from_schema(schema);
        node.fetch_mut("v").unwrap().set_values(&[10u16, 20, 30]).unwrap();

        let compact = node.compact_to().unwrap();
        let v = compact.schema().fetch_child("v").unwrap().dtype();
        assert_eq!(v.offset(), 0);
        assert_eq!(v.stride(), 2);
        assert_eq!(compact.data(), &[10, 0, 20, 0, 30, 0][..]);
        assert_eq!(node.serialize().unwrap(), compact.data());
    }

    #[test]
    fn test_parts_round_trip() {
        let mut node = Generator::new(r#"{"n": {"dtype":"int32", "value":[4, 5]}, "s": {"dtype":"utf8_string", "value":"abc"}}"#)
            .walk_external()
            .unwrap();
        node.fetch_mut("n").unwrap().set_values(&[6i64]).unwrap();
        let (text, bytes) = node.to_parts().unwrap();

        let mut received = bytes.to_vec();
        let rebuilt = Node::from_parts(&text, &mut received).unwrap();
        assert!(rebuilt.is_external());
        assert_eq!(rebuilt.fetch("n").unwrap().as_array::<i32>().unwrap().to_vec(), vec![6, 5]);
        assert_eq!(rebuilt.fetch("s").unwrap().as_str().unwrap(), "abc");
    }

    #[test]
    fn test_to_json_renders_values() {
        let node = Generator::with_protocol(r#"{"a": [1, 2], "b": "hi", "c": null, "d": [true, 1.5]}"#, Protocol::Json)
            .walk_external()
            .unwrap();
        let json = node.to_json(&JsonOptions::compact()).unwrap();
        assert_eq!(json, "{\"a\": [1, 2],\"b\": \"hi\",\"c\": null,\"d\": [1,1.5]}");
    }

    #[test]
    fn test_to_index() {
        let node = Generator::new(r#"{"n": {"dtype":"uint8", "value":3}, "f": {"dtype":"float32", "value":-1}}"#)
            .walk_external()
            .unwrap();
        assert_eq!(node.fetch("n").unwrap().to_index().unwrap(), 3);
        assert!(matches!(node.fetch("f").unwrap().to_index(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_endian_swap() {
        let mut node = Generator::new(r#"{"a": {"dtype":"uint16", "value":[1, 258], "endianness":"big"}, "s": {"dtype":"utf8_string", "value":"ab"}}"#)
            .walk_external()
            .unwrap();
        assert_eq!(&node.data()[..4], &[0, 1, 1, 2]);

        node.endian_swap(Endianness::Little);
        assert_eq!(&node.data()[..4], &[1, 0, 2, 1]);
        assert_eq!(node.dtype(), DataType::object());
        let a = node.fetch("a").unwrap();
        assert_eq!(a.dtype().endianness(), Endianness::Little);
        assert_eq!(a.as_array::<u16>().unwrap().to_vec(), vec![1, 258]);
        assert_eq!(node.fetch("s").unwrap().as_str().unwrap(), "ab");
    }
}
