// Pure value protocol
//
// Infers a schema from plain JSON literals and stores their values:
// objects become objects, homogeneous numeric arrays become one int64 or
// float64 leaf, other arrays become lists, strings become UTF-8 leaves,
// booleans become uint8 and null leaves the node empty. Leaves are packed
// back-to-back in an owned buffer.

use serde_json::Value;
use tracing::trace;

use crate::codec::array::{write_elements, write_str};
use crate::codec::element::Scalar;
use crate::internal::error::Result;
use crate::schema::hierarchy::Schema;
use crate::schema::types::{DataType, TypeId};

/// Result of inferring a document: the schema and the bytes it describes
#[derive(Debug, Clone, PartialEq)]
pub struct InferredValue {
    pub schema: Schema,
    pub data: Vec<u8>,
}

/// Infers the schema of `document` and encodes its values
pub fn infer(document: &Value) -> Result<InferredValue> {
    let mut inference = Inference { data: Vec::new() };
    let schema = inference.walk(document)?;
    Ok(InferredValue {
        schema,
        data: inference.data,
    })
}

/// Element kind of a homogeneous numeric array, or `None` when the array
/// holds anything that is not a number.
///
/// Any non-integral element, or an integer outside the `i64` range,
/// promotes the whole array to float64.
pub fn numeric_array_kind(items: &[Value]) -> Option<TypeId> {
    if items.is_empty() || !items.iter().all(Value::is_number) {
        return None;
    }
    if items.iter().all(Value::is_i64) {
        Some(TypeId::Int64)
    } else {
        Some(TypeId::Float64)
    }
}

struct Inference {
    data: Vec<u8>,
}

impl Inference {
    fn walk(&mut self, value: &Value) -> Result<Schema> {
        match value {
            Value::Object(members) => {
                let mut object = Schema::object();
                for (name, member) in members {
                    let child = self.walk(member)?;
                    object.insert_member(name, child)?;
                }
                Ok(object)
            }
            Value::Array(items) => match numeric_array_kind(items) {
                Some(TypeId::Int64) => {
                    let scalars: Vec<Scalar> = items.iter().filter_map(Value::as_i64).map(Scalar::Int).collect();
                    self.numeric_leaf(DataType::int64(scalars.len()), &scalars)
                }
                Some(_) => {
                    let scalars: Vec<Scalar> = items.iter().filter_map(Value::as_f64).map(Scalar::Float).collect();
                    self.numeric_leaf(DataType::float64(scalars.len()), &scalars)
                }
                None => {
                    let mut list = Schema::list();
                    for item in items {
                        let child = self.walk(item)?;
                        list.append_schema(child)?;
                    }
                    Ok(list)
                }
            },
            Value::String(text) => {
                let dtype = self.place(DataType::utf8_string(text.len()));
                write_str(&mut self.data, &dtype, text)?;
                Ok(Schema::from_dtype(dtype))
            }
            Value::Bool(flag) => self.numeric_leaf(DataType::uint8(1), &[Scalar::UInt(u64::from(*flag))]),
            Value::Number(n) => {
                let (dtype, scalar) = if let Some(v) = n.as_i64() {
                    (DataType::int64(1), Scalar::Int(v))
                } else if let Some(v) = n.as_u64() {
                    (DataType::uint64(1), Scalar::UInt(v))
                } else {
                    (DataType::float64(1), Scalar::Float(n.as_f64().unwrap_or(f64::NAN)))
                };
                self.numeric_leaf(dtype, &[scalar])
            }
            Value::Null => Ok(Schema::new()),
        }
    }

    fn numeric_leaf(&mut self, dtype: DataType, values: &[Scalar]) -> Result<Schema> {
        let dtype = self.place(dtype);
        write_elements(&mut self.data, &dtype, values)?;
        Ok(Schema::from_dtype(dtype))
    }

    /// Appends room for `dtype` at the end of the buffer
    fn place(&mut self, mut dtype: DataType) -> DataType {
        let offset = self.data.len();
        dtype.set_offset(offset);
        self.data.resize(offset + dtype.total_bytes(), 0);
        trace!(dtype = %dtype.id(), offset, "inferred leaf");
        dtype
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::array::{read_element, read_str};

    fn infer_text(text: &str) -> InferredValue {
        infer(&serde_json::from_str(text).unwrap()).unwrap()
    }

    #[test]
    fn test_numeric_array_kind() {
        let ints: Vec<Value> = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(numeric_array_kind(&ints), Some(TypeId::Int64));
        let mixed: Vec<Value> = serde_json::from_str("[1, 2.5]").unwrap();
        assert_eq!(numeric_array_kind(&mixed), Some(TypeId::Float64));
        let huge: Vec<Value> = serde_json::from_str("[1, 18446744073709551615]").unwrap();
        assert_eq!(numeric_array_kind(&huge), Some(TypeId::Float64));
        let other: Vec<Value> = serde_json::from_str("[1, \"a\"]").unwrap();
        assert_eq!(numeric_array_kind(&other), None);
        assert_eq!(numeric_array_kind(&[]), None);
    }

    #[test]
    fn test_integer_array() {
        let inferred = infer_text("[1,2,3]");
        assert_eq!(inferred.schema.dtype(), DataType::int64(3));
        assert_eq!(read_element(&inferred.data, &inferred.schema.dtype(), 2).unwrap(), Scalar::Int(3));
    }

    #[test]
    fn test_float_promotion() {
        let inferred = infer_text("[1, 2.5, 3]");
        let dtype = inferred.schema.dtype();
        assert_eq!(dtype, DataType::float64(3));
        assert_eq!(read_element(&inferred.data, &dtype, 0).unwrap(), Scalar::Float(1.0));
        assert_eq!(read_element(&inferred.data, &dtype, 1).unwrap(), Scalar::Float(2.5));
    }

    #[test]
    fn test_mixed_array_becomes_list() {
        let inferred = infer_text(r#"[1, "two", true, null]"#);
        let schema = &inferred.schema;
        assert!(schema.is_list());
        assert_eq!(schema.child(0).unwrap().dtype(), DataType::int64(1));
        assert_eq!(schema.child(1).unwrap().type_id(), TypeId::Utf8String);
        assert_eq!(schema.child(2).unwrap().dtype().offset(), 8 + 3);
        assert!(schema.child(3).unwrap().is_empty());
        assert_eq!(inferred.data.len(), 12);
    }

    #[test]
    fn test_object_members_and_strings() {
        let inferred = infer_text(r#"{"name": "strata", "flag": false, "big": 18446744073709551615}"#);
        let schema = &inferred.schema;
        assert_eq!(schema.paths(), vec!["name", "flag", "big"]);
        let name = schema.fetch_child("name").unwrap().dtype();
        assert_eq!(read_str(&inferred.data, &name).unwrap(), "strata");
        assert_eq!(schema.fetch_child("big").unwrap().type_id(), TypeId::UInt64);
        assert_eq!(schema.fetch_child("flag").unwrap().dtype(), {
            let mut dtype = DataType::uint8(1);
            dtype.set_offset(6);
            dtype
        });
    }

    #[test]
    fn test_dtype_member_rejected() {
        let err = infer(&serde_json::from_str(r#"{"dtype": 1}"#).unwrap()).unwrap_err();
        assert!(matches!(err, crate::internal::error::Error::ParseError(_)));
    }

    #[test]
    fn test_empty_array_is_empty_list() {
        let inferred = infer_text("[]");
        assert!(inferred.schema.is_list());
        assert_eq!(inferred.schema.number_of_children(), 0);
    }
}
