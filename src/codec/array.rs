// Typed array views
//
// `DataArray` and `DataArrayMut` borrow a byte buffer and interpret it
// through a leaf `DataType`: element `i` lives at `offset + i * stride` and
// is stored in the declared byte order. Views never own the buffer.

use std::marker::PhantomData;
use std::mem::size_of;

use crate::codec::element::{read_scalar, write_scalar, Element, Scalar};
use crate::internal::error::{Error, Result};
use crate::schema::render::write_quoted;
use crate::schema::types::{DataType, TypeId};

/// Checks that `len` bytes can back a view of `dtype`
pub fn check_layout(len: usize, dtype: &DataType) -> Result<()> {
    if !dtype.is_leaf() {
        return Err(Error::InvalidState(format!(
            "cannot view a {} schema as an array",
            dtype.id()
        )));
    }
    if dtype.number_of_elements() > 0 && dtype.element_bytes() < dtype.id().default_bytes() {
        return Err(Error::InvalidState(format!(
            "element_bytes {} is smaller than the {} bytes of {}",
            dtype.element_bytes(),
            dtype.id().default_bytes(),
            dtype.id()
        )));
    }
    let needed = dtype.spanned_bytes();
    if len < needed {
        return Err(Error::OutOfRange(format!(
            "buffer of {} bytes cannot hold a {} leaf spanning {} bytes",
            len,
            dtype.id(),
            needed
        )));
    }
    Ok(())
}

fn check_element_type<T: Element>(dtype: &DataType) -> Result<()> {
    if T::TYPE_ID != dtype.id() {
        return Err(Error::InvalidState(format!(
            "cannot view {} data as {}",
            dtype.id(),
            T::TYPE_ID
        )));
    }
    Ok(())
}

/// Bytes of element `idx`, from its start to the end of the buffer
fn element_bytes<'d>(data: &'d [u8], dtype: &DataType, idx: usize) -> &'d [u8] {
    &data[dtype.element_index(idx)..]
}

/// Reads element `idx` of a numeric leaf as a scalar
pub fn read_element(data: &[u8], dtype: &DataType, idx: usize) -> Result<Scalar> {
    check_layout(data.len(), dtype)?;
    if idx >= dtype.number_of_elements() {
        return Err(Error::OutOfRange(format!(
            "element {} of a leaf with {} elements",
            idx,
            dtype.number_of_elements()
        )));
    }
    read_scalar(dtype.id(), element_bytes(data, dtype, idx), dtype.endianness()).ok_or_else(|| {
        Error::InvalidState(format!("cannot read a number from a {} leaf", dtype.id()))
    })
}

/// Casts `values` to the leaf kind and writes them from element 0
pub fn write_elements(data: &mut [u8], dtype: &DataType, values: &[Scalar]) -> Result<()> {
    check_layout(data.len(), dtype)?;
    if values.len() > dtype.number_of_elements() {
        return Err(Error::OutOfRange(format!(
            "{} values do not fit a leaf with {} elements",
            values.len(),
            dtype.number_of_elements()
        )));
    }
    for (idx, value) in values.iter().enumerate() {
        let start = dtype.element_index(idx);
        write_scalar(dtype.id(), &mut data[start..], dtype.endianness(), *value)?;
    }
    Ok(())
}

/// Copies the UTF-8 bytes of `value` into a string leaf
pub fn write_str(data: &mut [u8], dtype: &DataType, value: &str) -> Result<()> {
    check_layout(data.len(), dtype)?;
    if !dtype.is_string() {
        return Err(Error::InvalidState(format!(
            "cannot write a string into a {} leaf",
            dtype.id()
        )));
    }
    if value.len() > dtype.number_of_elements() {
        return Err(Error::OutOfRange(format!(
            "string of {} bytes does not fit a leaf with {} elements",
            value.len(),
            dtype.number_of_elements()
        )));
    }
    for (idx, byte) in value.bytes().enumerate() {
        data[dtype.element_index(idx)] = byte;
    }
    Ok(())
}

/// Reads the bytes of a string leaf. Trailing NUL bytes are dropped.
pub fn read_str(data: &[u8], dtype: &DataType) -> Result<String> {
    check_layout(data.len(), dtype)?;
    if !dtype.is_string() {
        return Err(Error::InvalidState(format!(
            "cannot read a string from a {} leaf",
            dtype.id()
        )));
    }
    let mut bytes: Vec<u8> = (0..dtype.number_of_elements())
        .map(|idx| data[dtype.element_index(idx)])
        .collect();
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|e| Error::InvalidState(format!("string leaf is not UTF-8: {}", e)))
}

/// Copies every element of a leaf back-to-back into `dest`, reading each at
/// `offset + i * stride` and writing `element_bytes` bytes per element.
pub fn compact_leaf(data: &[u8], dtype: &DataType, dest: &mut [u8]) -> Result<()> {
    check_layout(data.len(), dtype)?;
    let width = dtype.element_bytes();
    let needed = dtype.total_bytes_compact();
    if dest.len() < needed {
        return Err(Error::OutOfRange(format!(
            "destination of {} bytes cannot hold {} compact bytes",
            dest.len(),
            needed
        )));
    }
    if needed == 0 {
        return Ok(());
    }
    if dtype.is_compact() {
        let start = dtype.offset();
        dest[..needed].copy_from_slice(&data[start..start + needed]);
        return Ok(());
    }
    for (idx, chunk) in dest[..needed].chunks_exact_mut(width).enumerate() {
        let start = dtype.element_index(idx);
        chunk.copy_from_slice(&data[start..start + width]);
    }
    Ok(())
}

/// Renders a leaf: a scalar for one element, a bracketed list otherwise.
/// Strings render as one quoted string. Formatting follows the runtime kind.
pub fn leaf_to_json(data: &[u8], dtype: &DataType) -> Result<String> {
    let mut out = String::new();
    write_leaf_json(&mut out, data, dtype)?;
    Ok(out)
}

pub(crate) fn write_leaf_json(out: &mut String, data: &[u8], dtype: &DataType) -> Result<()> {
    if dtype.is_string() {
        write_quoted(out, &read_str(data, dtype)?);
        return Ok(());
    }
    check_layout(data.len(), dtype)?;
    write_numbers(out, data, dtype);
    Ok(())
}

/// Writes a numeric leaf whose layout has been checked against `data`
fn write_numbers(out: &mut String, data: &[u8], dtype: &DataType) {
    let count = dtype.number_of_elements();
    if count != 1 {
        out.push('[');
    }
    for idx in 0..count {
        if idx > 0 {
            out.push_str(", ");
        }
        write_number(out, dtype, element_bytes(data, dtype, idx));
    }
    if count != 1 {
        out.push(']');
    }
}

fn write_number(out: &mut String, dtype: &DataType, bytes: &[u8]) {
    let endianness = dtype.endianness();
    match dtype.id() {
        TypeId::Float32 => {
            let v = f32::read(bytes, endianness);
            write_float(out, v.is_finite(), format!("{:?}", v));
        }
        TypeId::Float64 => {
            let v = f64::read(bytes, endianness);
            write_float(out, v.is_finite(), format!("{:?}", v));
        }
        id => match read_scalar(id, bytes, endianness) {
            Some(Scalar::Int(v)) => out.push_str(&v.to_string()),
            Some(Scalar::UInt(v)) => out.push_str(&v.to_string()),
            Some(Scalar::Float(v)) => out.push_str(&v.to_string()),
            None => out.push_str("null"),
        },
    }
}

/// Non-finite floats have no JSON form and render as `null`
fn write_float(out: &mut String, finite: bool, formatted: String) {
    if finite {
        out.push_str(&formatted);
    } else {
        out.push_str("null");
    }
}

/// Read-only typed view over a leaf
#[derive(Debug, Clone, Copy)]
pub struct DataArray<'a, T: Element> {
    data: &'a [u8],
    dtype: DataType,
    _marker: PhantomData<T>,
}

impl<'a, T: Element> DataArray<'a, T> {
    /// Creates a view, checking the element type and that `data` covers the
    /// whole declared layout
    pub fn new(data: &'a [u8], dtype: DataType) -> Result<Self> {
        check_element_type::<T>(&dtype)?;
        check_layout(data.len(), &dtype)?;
        Ok(Self {
            data,
            dtype,
            _marker: PhantomData,
        })
    }

    pub fn dtype(&self) -> &DataType {
        &self.dtype
    }

    pub fn number_of_elements(&self) -> usize {
        self.dtype.number_of_elements()
    }

    pub fn is_empty(&self) -> bool {
        self.number_of_elements() == 0
    }

    /// Element `idx`. Panics if the element lies outside the buffer.
    pub fn element(&self, idx: usize) -> T {
        T::read(element_bytes(self.data, &self.dtype, idx), self.dtype.endianness())
    }

    /// Element `idx`, or `None` past the declared count
    pub fn get(&self, idx: usize) -> Option<T> {
        (idx < self.number_of_elements()).then(|| self.element(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.number_of_elements()).map(move |idx| self.element(idx))
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Borrows the elements directly when they are packed, in host byte
    /// order and suitably aligned
    pub fn as_slice(&self) -> Option<&'a [T]> {
        if !self.dtype.is_compact()
            || self.dtype.element_bytes() != size_of::<T>()
            || self.dtype.endianness().needs_swap()
        {
            return None;
        }
        let start = self.dtype.offset();
        let end = start + self.dtype.total_bytes_compact();
        bytemuck::try_cast_slice(&self.data[start..end]).ok()
    }

    pub fn to_json(&self) -> String {
        let mut out = String::new();
        write_numbers(&mut out, self.data, &self.dtype);
        out
    }

    pub fn compact_elements_to(&self, dest: &mut [u8]) -> Result<()> {
        compact_leaf(self.data, &self.dtype, dest)
    }
}

/// Mutable typed view over a leaf
#[derive(Debug)]
pub struct DataArrayMut<'a, T: Element> {
    data: &'a mut [u8],
    dtype: DataType,
    _marker: PhantomData<T>,
}

impl<'a, T: Element> DataArrayMut<'a, T> {
    pub fn new(data: &'a mut [u8], dtype: DataType) -> Result<Self> {
        check_element_type::<T>(&dtype)?;
        check_layout(data.len(), &dtype)?;
        Ok(Self {
            data,
            dtype,
            _marker: PhantomData,
        })
    }

    pub fn dtype(&self) -> &DataType {
        &self.dtype
    }

    pub fn number_of_elements(&self) -> usize {
        self.dtype.number_of_elements()
    }

    pub fn is_empty(&self) -> bool {
        self.number_of_elements() == 0
    }

    /// Reborrows as a read-only view
    pub fn as_array(&self) -> DataArray<'_, T> {
        DataArray {
            data: &*self.data,
            dtype: self.dtype,
            _marker: PhantomData,
        }
    }

    pub fn element(&self, idx: usize) -> T {
        self.as_array().element(idx)
    }

    pub fn get(&self, idx: usize) -> Option<T> {
        self.as_array().get(idx)
    }

    /// Writes element `idx`. Panics if the element lies outside the buffer.
    pub fn set_element(&mut self, idx: usize, value: T) {
        let start = self.dtype.element_index(idx);
        value.write(&mut self.data[start..], self.dtype.endianness());
    }

    /// Casts `values` to `T` and writes them from element 0
    pub fn set<S: Element>(&mut self, values: &[S]) -> Result<()> {
        if values.len() > self.number_of_elements() {
            return Err(Error::OutOfRange(format!(
                "{} values do not fit a leaf with {} elements",
                values.len(),
                self.number_of_elements()
            )));
        }
        for (idx, value) in values.iter().enumerate() {
            self.set_element(idx, T::cast_from(*value));
        }
        Ok(())
    }

    /// Writes `value` into every element
    pub fn fill(&mut self, value: T) {
        for idx in 0..self.number_of_elements() {
            self.set_element(idx, value);
        }
    }

    pub fn as_mut_slice(&mut self) -> Option<&mut [T]> {
        if !self.dtype.is_compact()
            || self.dtype.element_bytes() != size_of::<T>()
            || self.dtype.endianness().needs_swap()
        {
            return None;
        }
        let start = self.dtype.offset();
        let end = start + self.dtype.total_bytes_compact();
        bytemuck::try_cast_slice_mut(&mut self.data[start..end]).ok()
    }

    pub fn to_json(&self) -> String {
        self.as_array().to_json()
    }

    pub fn compact_elements_to(&self, dest: &mut [u8]) -> Result<()> {
        compact_leaf(&*self.data, &self.dtype, dest)
    }
}
