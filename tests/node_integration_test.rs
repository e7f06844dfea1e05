use strata::internal::endianness::Endianness;
use strata::{DataType, Generator, JsonOptions, Node, Protocol, Schema, TypeId};

/// Builds an interleaved x/y layout over one buffer
fn interleaved_schema(points: usize) -> Schema {
    let mut schema = Schema::new();
    schema
        .fetch("x")
        .unwrap()
        .set_dtype(DataType::new(TypeId::Float64, points, 0, 16, 8, Endianness::Default));
    schema
        .fetch("y")
        .unwrap()
        .set_dtype(DataType::new(TypeId::Float64, points, 8, 16, 8, Endianness::Default));
    schema
}

/// Interleaved values come out split per field after compaction
#[test]
fn test_compact_interleaved_values() {
    let mut node = Node::from_schema(interleaved_schema(3));
    node.fetch_mut("x").unwrap().set_values(&[1.0f64, 2.0, 3.0]).unwrap();
    node.fetch_mut("y").unwrap().set_values(&[10i32, 20, 30]).unwrap();

    let compact = node.compact_to().unwrap();
    assert_eq!(compact.data().len(), 48);
    assert_eq!(compact.schema().fetch_child("y").unwrap().dtype().offset(), 24);
    assert_eq!(compact.fetch("x").unwrap().as_array::<f64>().unwrap().to_vec(), vec![1.0, 2.0, 3.0]);
    assert_eq!(compact.fetch("y").unwrap().as_array::<f64>().unwrap().to_vec(), vec![10.0, 20.0, 30.0]);
}

/// Schema text plus packed bytes rebuild an equivalent tree
#[test]
fn test_two_part_message_round_trip() {
    let mut node = Node::from_schema(interleaved_schema(2));
    node.fetch_mut("x").unwrap().set_values(&[0.5f64, 1.5]).unwrap();
    node.fetch_mut("y").unwrap().set_values(&[-0.5f64, -1.5]).unwrap();

    let (text, payload) = node.to_parts().unwrap();
    assert_eq!(payload.len(), 32);

    let mut received = payload.to_vec();
    let rebuilt = Node::from_parts(&text, &mut received).unwrap();
    assert_eq!(rebuilt.schema(), node.compact_to().unwrap().schema());
    let options = JsonOptions::compact();
    assert_eq!(rebuilt.to_json(&options).unwrap(), node.to_json(&options).unwrap());
}

/// Values render in the declared kind of each leaf
#[test]
fn test_value_rendering() {
    let node = Generator::new(r#"{"n": {"dtype":"int16", "value":[-1, 2]}, "f": {"dtype":"float32", "value":0.25}, "s": {"dtype":"utf8_string", "value":"hi"}}"#)
        .walk_external()
        .unwrap();
    assert_eq!(
        node.to_json(&JsonOptions::default()).unwrap(),
        "{\n  \"n\": [-1, 2],\n  \"f\": 0.25,\n  \"s\": \"hi\"\n}"
    );
}

/// Pure JSON documents keep their values through serialize
#[test]
fn test_pure_document_serialize() {
    let node = Generator::with_protocol(r#"{"id": 7, "tags": ["a", "bc"]}"#, Protocol::Json)
        .walk_external()
        .unwrap();
    let bytes = node.serialize().unwrap();
    assert_eq!(bytes.len(), 8 + 1 + 2);
    assert_eq!(&bytes[8..], b"abc");
    assert_eq!(node.fetch("tags/1").unwrap().as_str().unwrap(), "bc");
}
