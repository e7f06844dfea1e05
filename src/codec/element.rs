// Numeric element kinds
//
// The ten numeric leaf kinds map onto Rust primitives through `Element`.
// Values are read and written by value with an explicit byte order, so a
// view never needs an aligned reference into the underlying buffer.

use std::fmt::Debug;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytemuck::Pod;

use crate::internal::endianness::Endianness;
use crate::internal::error::{Error, Result};
use crate::schema::types::TypeId;

/// A numeric value detached from its storage width
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Scalar {
    /// Reads a JSON number. Integers that do not fit `i64` become `UInt`.
    pub fn from_json(value: &serde_json::Value) -> Option<Scalar> {
        if let Some(v) = value.as_i64() {
            Some(Scalar::Int(v))
        } else if let Some(v) = value.as_u64() {
            Some(Scalar::UInt(v))
        } else {
            value.as_f64().map(Scalar::Float)
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Scalar::Float(_))
    }

    /// Converts with `as` semantics (truncating or saturating like a cast)
    pub fn as_i64(self) -> i64 {
        match self {
            Scalar::Int(v) => v,
            Scalar::UInt(v) => v as i64,
            Scalar::Float(v) => v as i64,
        }
    }

    pub fn as_u64(self) -> u64 {
        match self {
            Scalar::Int(v) => v as u64,
            Scalar::UInt(v) => v,
            Scalar::Float(v) => v as u64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Int(v) => v as f64,
            Scalar::UInt(v) => v as f64,
            Scalar::Float(v) => v,
        }
    }

    /// Interprets the value as a length or position. Negative and fractional
    /// values are rejected.
    pub fn to_index(self) -> Option<usize> {
        match self {
            Scalar::Int(v) => usize::try_from(v).ok(),
            Scalar::UInt(v) => usize::try_from(v).ok(),
            Scalar::Float(v) if v >= 0.0 && v.fract() == 0.0 => usize::try_from(v as u64).ok(),
            Scalar::Float(_) => None,
        }
    }
}

/// A Rust primitive standing in for one numeric leaf kind
pub trait Element: Pod + PartialEq + Debug + 'static {
    /// The leaf kind this primitive represents
    const TYPE_ID: TypeId;

    /// Reads one value from the start of `bytes`
    fn read(bytes: &[u8], endianness: Endianness) -> Self;

    /// Writes this value to the start of `bytes`
    fn write(self, bytes: &mut [u8], endianness: Endianness);

    fn to_scalar(self) -> Scalar;

    /// Casts a scalar to this kind with `as` semantics
    fn from_scalar(value: Scalar) -> Self;

    /// Numeric cast from any other element kind
    fn cast_from<S: Element>(value: S) -> Self {
        Self::from_scalar(value.to_scalar())
    }
}

macro_rules! impl_from_scalar {
    ($ty:ty) => {
        fn from_scalar(value: Scalar) -> Self {
            match value {
                Scalar::Int(v) => v as $ty,
                Scalar::UInt(v) => v as $ty,
                Scalar::Float(v) => v as $ty,
            }
        }
    };
}

macro_rules! impl_byte_element {
    ($ty:ty, $id:expr, $variant:ident) => {
        impl Element for $ty {
            const TYPE_ID: TypeId = $id;

            fn read(bytes: &[u8], _endianness: Endianness) -> Self {
                bytes[0] as $ty
            }

            fn write(self, bytes: &mut [u8], _endianness: Endianness) {
                bytes[0] = self as u8;
            }

            fn to_scalar(self) -> Scalar {
                Scalar::$variant(self as _)
            }

            impl_from_scalar!($ty);
        }
    };
}

macro_rules! impl_wide_element {
    ($ty:ty, $id:expr, $variant:ident, $read:ident, $write:ident) => {
        impl Element for $ty {
            const TYPE_ID: TypeId = $id;

            fn read(bytes: &[u8], endianness: Endianness) -> Self {
                match endianness.resolve() {
                    Endianness::Big => BigEndian::$read(bytes),
                    _ => LittleEndian::$read(bytes),
                }
            }

            fn write(self, bytes: &mut [u8], endianness: Endianness) {
                match endianness.resolve() {
                    Endianness::Big => BigEndian::$write(bytes, self),
                    _ => LittleEndian::$write(bytes, self),
                }
            }

            fn to_scalar(self) -> Scalar {
                Scalar::$variant(self as _)
            }

            impl_from_scalar!($ty);
        }
    };
}

impl_byte_element!(i8, TypeId::Int8, Int);
impl_byte_element!(u8, TypeId::UInt8, UInt);
impl_wide_element!(i16, TypeId::Int16, Int, read_i16, write_i16);
impl_wide_element!(i32, TypeId::Int32, Int, read_i32, write_i32);
impl_wide_element!(i64, TypeId::Int64, Int, read_i64, write_i64);
impl_wide_element!(u16, TypeId::UInt16, UInt, read_u16, write_u16);
impl_wide_element!(u32, TypeId::UInt32, UInt, read_u32, write_u32);
impl_wide_element!(u64, TypeId::UInt64, UInt, read_u64, write_u64);
impl_wide_element!(f32, TypeId::Float32, Float, read_f32, write_f32);
impl_wide_element!(f64, TypeId::Float64, Float, read_f64, write_f64);

/// Reads one value of the runtime kind `id` from the start of `bytes`.
/// Returns `None` for non-numeric kinds.
pub fn read_scalar(id: TypeId, bytes: &[u8], endianness: Endianness) -> Option<Scalar> {
    let value = match id {
        TypeId::Int8 => i8::read(bytes, endianness).to_scalar(),
        TypeId::Int16 => i16::read(bytes, endianness).to_scalar(),
        TypeId::Int32 => i32::read(bytes, endianness).to_scalar(),
        TypeId::Int64 => i64::read(bytes, endianness).to_scalar(),
        TypeId::UInt8 => u8::read(bytes, endianness).to_scalar(),
        TypeId::UInt16 => u16::read(bytes, endianness).to_scalar(),
        TypeId::UInt32 => u32::read(bytes, endianness).to_scalar(),
        TypeId::UInt64 => u64::read(bytes, endianness).to_scalar(),
        TypeId::Float32 => f32::read(bytes, endianness).to_scalar(),
        TypeId::Float64 => f64::read(bytes, endianness).to_scalar(),
        _ => return None,
    };
    Some(value)
}

/// Casts `value` to the runtime kind `id` and writes it to the start of `bytes`
pub fn write_scalar(id: TypeId, bytes: &mut [u8], endianness: Endianness, value: Scalar) -> Result<()> {
    match id {
        TypeId::Int8 => i8::from_scalar(value).write(bytes, endianness),
        TypeId::Int16 => i16::from_scalar(value).write(bytes, endianness),
        TypeId::Int32 => i32::from_scalar(value).write(bytes, endianness),
        TypeId::Int64 => i64::from_scalar(value).write(bytes, endianness),
        TypeId::UInt8 => u8::from_scalar(value).write(bytes, endianness),
        TypeId::UInt16 => u16::from_scalar(value).write(bytes, endianness),
        TypeId::UInt32 => u32::from_scalar(value).write(bytes, endianness),
        TypeId::UInt64 => u64::from_scalar(value).write(bytes, endianness),
        TypeId::Float32 => f32::from_scalar(value).write(bytes, endianness),
        TypeId::Float64 => f64::from_scalar(value).write(bytes, endianness),
        other => {
            return Err(Error::InvalidState(format!(
                "cannot write a number into a {} leaf",
                other
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_big_and_little() {
        let mut bytes = [0u8; 4];
        0x0102_0304u32.write(&mut bytes, Endianness::Big);
        assert_eq!(bytes, [1, 2, 3, 4]);
        assert_eq!(u32::read(&bytes, Endianness::Big), 0x0102_0304);
        assert_eq!(u32::read(&bytes, Endianness::Little), 0x0403_0201);

        (-2i16).write(&mut bytes, Endianness::Little);
        assert_eq!(&bytes[..2], &[0xfe, 0xff]);
    }

    #[test]
    fn test_default_endianness_is_native() {
        let mut bytes = [0u8; 8];
        1.5f64.write(&mut bytes, Endianness::Default);
        assert_eq!(bytes, 1.5f64.to_ne_bytes());
        assert_eq!(f64::read(&bytes, Endianness::Default), 1.5);
    }

    #[test]
    fn test_casts() {
        assert_eq!(u8::cast_from(300i32), 44);
        assert_eq!(i32::cast_from(2.9f64), 2);
        assert_eq!(f32::cast_from(7u64), 7.0);
        assert_eq!(i8::cast_from(-1i64), -1);
        assert_eq!(u16::from_scalar(Scalar::Int(-1)), u16::MAX);
    }

    #[test]
    fn test_scalar_from_json() {
        assert_eq!(Scalar::from_json(&serde_json::json!(3)), Some(Scalar::Int(3)));
        assert_eq!(Scalar::from_json(&serde_json::json!(u64::MAX)), Some(Scalar::UInt(u64::MAX)));
        assert_eq!(Scalar::from_json(&serde_json::json!(2.5)), Some(Scalar::Float(2.5)));
        assert_eq!(Scalar::from_json(&serde_json::json!("3")), None);
    }

    #[test]
    fn test_scalar_to_index() {
        assert_eq!(Scalar::Int(4).to_index(), Some(4));
        assert_eq!(Scalar::Int(-4).to_index(), None);
        assert_eq!(Scalar::Float(3.0).to_index(), Some(3));
        assert_eq!(Scalar::Float(3.5).to_index(), None);
    }

    #[test]
    fn test_runtime_dispatch() {
        let mut bytes = [0u8; 8];
        write_scalar(TypeId::Int32, &mut bytes, Endianness::Little, Scalar::Float(-7.0)).unwrap();
        assert_eq!(read_scalar(TypeId::Int32, &bytes, Endianness::Little), Some(Scalar::Int(-7)));
        assert_eq!(read_scalar(TypeId::Utf8String, &bytes, Endianness::Little), None);
        let err = write_scalar(TypeId::Object, &mut bytes, Endianness::Little, Scalar::Int(1)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid State: cannot write a number into a object leaf");
    }
}
