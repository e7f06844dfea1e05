// Schema module for the strata data model
//
// This module provides the layout description side of the data model:
//
// 1. Leaf descriptors (type ids, counts, offsets, strides, byte order)
// 2. The recursive schema tree with path access and compaction
// 3. Deterministic textual rendering
// 4. Schema text parsing with the schema and pure value protocols

// Re-export public types and functions
pub use self::generator::{Generator, Protocol};
pub use self::hierarchy::Schema;
pub use self::inference::{infer, InferredValue};
pub use self::render::JsonOptions;
pub use self::types::{DataType, TypeId};

// Sub-modules
pub mod generator;
pub mod hierarchy;
pub mod inference;
pub mod render;
pub mod types;

mod parser;

// Internal module for shared utilities
mod utils;
