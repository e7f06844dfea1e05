// Codec module for strata leaf data
//
// Typed, endianness-aware access to the elements a leaf describes.

pub use self::array::{DataArray, DataArrayMut};
pub use self::element::{Element, Scalar};

pub mod array;
pub mod element;
