use strata::internal::endianness::Endianness;
use strata::{DataType, Error, JsonOptions, Schema, TypeId};

/// Builds a schema touching every state: nested objects, lists, strided
/// leaves, explicit byte orders and empty nodes.
fn sample_schema() -> Schema {
    let mut schema = Schema::new();
    schema.fetch("header/version").unwrap().set_dtype(DataType::uint16(1));
    schema
        .fetch("header/flags")
        .unwrap()
        .set_dtype(DataType::new(TypeId::UInt32, 1, 2, 4, 4, Endianness::Big));
    schema
        .fetch("points")
        .unwrap()
        .set_dtype(DataType::new(TypeId::Float64, 3, 8, 16, 8, Endianness::Little));
    let samples = schema.fetch("samples").unwrap();
    samples.append_dtype(DataType::int8(4)).unwrap();
    samples.append_dtype(DataType::utf8_string(5)).unwrap();
    samples.append().unwrap();
    schema.fetch("nothing").unwrap().set_dtype(DataType::object());
    schema
}

/// Checks that rendering and re-parsing gives back the same tree
#[test]
fn test_text_round_trip() {
    let schema = sample_schema();

    // Default (detailed, multi-line) layout
    let text = schema.to_json();
    let mut parsed = Schema::new();
    parsed.set_json(&text).unwrap();
    assert_eq!(parsed, schema);

    // Single-line layout parses to the same tree
    let single_line = schema.to_json_with(&JsonOptions::compact());
    let parsed: Schema = single_line.parse().unwrap();
    assert_eq!(parsed, schema);
    assert_eq!(parsed.to_string(), text);
}

/// Compacting twice gives the same offsets as compacting once
#[test]
fn test_compaction_idempotent() {
    let schema = sample_schema();
    let once = schema.compacted();
    let twice = once.compacted();
    assert_eq!(once, twice);
    assert_eq!(once.total_bytes(), schema.total_bytes_compact());
    assert_eq!(once.total_bytes(), once.total_bytes_compact());

    // counts and kinds survive compaction
    let points = once.fetch_child("points").unwrap().dtype();
    assert_eq!(points.id(), TypeId::Float64);
    assert_eq!(points.number_of_elements(), 3);
    assert_eq!(points.endianness(), Endianness::Little);
}

/// Padded layouts shrink when compacted, unpadded ones do not
#[test]
fn test_compact_size_matches_only_without_padding() {
    let padded = sample_schema();
    assert!(padded.total_bytes_compact() < padded.total_bytes());

    let mut packed = Schema::new();
    packed.fetch("a").unwrap().set_dtype(DataType::int32(2));
    packed.fetch("b").unwrap().set_dtype(DataType::float32(1));
    assert_eq!(packed.total_bytes_compact(), packed.total_bytes());
}

/// Strided leaf compacts to a contiguous one
#[test]
fn test_compact_strided_leaf() {
    let source = Schema::from_dtype(DataType::new(TypeId::Float64, 3, 8, 16, 8, Endianness::Default));
    let mut dest = Schema::from_dtype(DataType::int8(1));
    source.compact_to(&mut dest);

    let dtype = dest.dtype();
    assert_eq!(dtype.offset(), 0);
    assert_eq!(dtype.stride(), 8);
    assert_eq!(dtype.element_bytes(), 8);
    assert_eq!(dtype.number_of_elements(), 3);
    assert_eq!(dest.total_bytes_compact(), 24);
}

/// Removing a member keeps names and positions consistent
#[test]
fn test_remove_member_reindexes() {
    let mut schema = Schema::new();
    for name in ["x", "y", "z"] {
        schema.fetch(name).unwrap().set_dtype(DataType::float32(1));
    }
    schema.remove_path("y").unwrap();
    assert_eq!(schema.paths(), vec!["x", "z"]);
    assert_eq!(schema.child_index("x").unwrap(), 0);
    assert_eq!(schema.child_index("z").unwrap(), 1);
    assert!(matches!(schema.child_index("y"), Err(Error::PathNotFound(_))));
}

/// Interleaved appends and removals never break the name index
#[test]
fn test_object_index_integrity() {
    let mut schema = Schema::new();
    let mut expected: Vec<String> = Vec::new();
    for round in 0..12 {
        let name = format!("m{}", round);
        schema.fetch(&name).unwrap().set_dtype(DataType::uint8(1));
        expected.push(name);
        if round % 3 == 2 {
            let victim = round % expected.len();
            schema.remove(victim).unwrap();
            expected.remove(victim);
        }
        assert_eq!(schema.paths(), expected);
        for (position, name) in expected.iter().enumerate() {
            assert_eq!(schema.child_index(name).unwrap(), position);
        }
    }
}

/// Files written by save can be loaded back
#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layout.json");
    let schema = sample_schema();
    schema.save(&path, &JsonOptions::default()).unwrap();

    let mut loaded = Schema::new();
    loaded.load(&path).unwrap();
    assert_eq!(loaded, schema);
}

/// Missing files are reported, and a failed load leaves the schema alone
#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut schema = sample_schema();
    let err = schema.load(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, Error::IOError(_)));
    assert_eq!(schema, sample_schema());
}

/// A failed re-parse leaves the schema untouched
#[test]
fn test_set_json_is_atomic() {
    let mut schema = sample_schema();
    assert!(matches!(schema.set_json("{\"a\": \"bogus\"}"), Err(Error::ParseError(_))));
    assert!(matches!(schema.set_json("{\"a\": "), Err(Error::ParseError(_))));
    assert_eq!(schema, sample_schema());
}

/// Paths resolve through objects, lists and parent segments
#[test]
fn test_path_navigation() {
    let schema = sample_schema();
    assert!(schema.has_path("header/version").unwrap());
    assert!(schema.has_path("header/../points").unwrap());
    assert!(!schema.has_path("header/version/deeper").unwrap());
    assert_eq!(schema.fetch_child("samples/1").unwrap().type_id(), TypeId::Utf8String);
    assert!(schema.fetch_child("samples/2").unwrap().is_empty());
    assert!(matches!(schema.fetch_child("samples/3"), Err(Error::PathNotFound(_))));
    assert!(matches!(schema.fetch_child("../header"), Err(Error::PathNotFound(_))));
}

/// Every segment in front of a `..` must exist
#[test]
fn test_parent_segments_are_checked() {
    let mut schema = sample_schema();
    assert!(matches!(schema.fetch_child("nope/../header"), Err(Error::PathNotFound(_))));
    assert!(!schema.has_path("nope/../header").unwrap());
    schema.fetch("extra/made/../kept").unwrap().set_dtype(DataType::int8(1));
    assert_eq!(schema.fetch_child("extra").unwrap().paths(), vec!["made", "kept"]);
}

/// Layouts describing huge regions parse without reserving them, and
/// layouts past the address space are rejected
#[test]
fn test_text_layout_limits() {
    let schema = Schema::from_json(r#"{"big": {"dtype":"uint8", "length":268435456}}"#).unwrap();
    assert_eq!(schema.total_bytes(), 268435456);
    let mut loaded = Schema::new();
    loaded
        .set_json(r#"{"far": {"dtype":"int32", "offset":1099511627776}}"#)
        .unwrap();
    assert_eq!(loaded.fetch_child("far").unwrap().dtype().offset(), 1099511627776);

    let err = Schema::from_json(r#"{"dtype":"float64","length":4611686018427387904}"#).unwrap_err();
    assert!(matches!(err, Error::ParseError(_)));
    let err = Schema::from_json(r#"{"dtype":"uint8","offset":18446744073709551615}"#).unwrap_err();
    assert!(matches!(err, Error::ParseError(_)));
}

/// `dtype` would turn an object back into a leaf or a list when reparsed
#[test]
fn test_dtype_member_name_is_reserved() {
    let mut schema = Schema::new();
    assert!(matches!(schema.fetch("dtype"), Err(Error::InvalidState(_))));
    let text = r#"{"dtype": {"x": "int8"}}"#;
    let reparsed = Schema::from_json(text).unwrap();
    assert!(reparsed.is_list());
    assert!(!reparsed.has_path("dtype").unwrap_or(false));
}
