// strata library entry point
// Hierarchical, self-describing, strided binary data model

pub mod codec;
pub mod internal;
pub mod node;
pub mod schema;

pub use crate::codec::{DataArray, DataArrayMut, Element, Scalar};
pub use crate::internal::endianness::Endianness;
pub use crate::internal::error::{Error, Result};
pub use crate::node::{Node, NodeMut, NodeRef};
pub use crate::schema::{DataType, Generator, JsonOptions, Protocol, Schema, TypeId};
