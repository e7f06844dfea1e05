// Recursive schema tree
//
// A `Schema` node is exactly one of empty, leaf, object or list. Objects
// keep their children, the ordered member names and a name -> position map
// in lock-step; lists keep an ordered sequence of unnamed children. Each
// node exclusively owns its subtree.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::internal::error::{Error, Result};
use crate::schema::generator::Generator;
use crate::schema::render::{write_block, write_key, JsonOptions};
use crate::schema::types::{DataType, TypeId};
use crate::schema::utils::{parse_index, path_segments, PARENT};

/// Named, ordered children of an object schema
#[derive(Debug, Clone, Default, PartialEq)]
struct ObjectHierarchy {
    children: Vec<Schema>,
    object_order: Vec<String>,
    object_map: HashMap<String, usize>,
}

impl ObjectHierarchy {
    fn index_of(&self, name: &str) -> Option<usize> {
        self.object_map.get(name).copied()
    }

    /// Appends a new member, returning its position. Names must be unique.
    fn push(&mut self, name: String, child: Schema) -> usize {
        let idx = self.children.len();
        self.object_map.insert(name.clone(), idx);
        self.object_order.push(name);
        self.children.push(child);
        idx
    }

    fn remove(&mut self, idx: usize) -> Schema {
        let name = self.object_order.remove(idx);
        self.object_map.remove(&name);
        // every later member moves down one position, wherever it sits in the map
        for position in self.object_map.values_mut() {
            if *position > idx {
                *position -= 1;
            }
        }
        self.children.remove(idx)
    }
}

/// The four states a schema node can be in
#[derive(Debug, Clone, PartialEq)]
enum SchemaState {
    Empty,
    Leaf(DataType),
    Object(ObjectHierarchy),
    List(Vec<Schema>),
}

/// A node of a hierarchical layout description
#[derive(Debug, Clone)]
pub struct Schema {
    state: SchemaState,
    /// bookkeeping for `Node`: set when a node owns this schema
    root: bool,
}

impl Default for Schema {
    fn default() -> Self {
        Schema::new()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

impl Schema {
    /// Creates an empty schema
    pub fn new() -> Self {
        Self {
            state: SchemaState::Empty,
            root: false,
        }
    }

    /// Creates an object schema with no members
    pub fn object() -> Self {
        Self::from_dtype(DataType::object())
    }

    /// Creates a list schema with no children
    pub fn list() -> Self {
        Self::from_dtype(DataType::list())
    }

    pub fn from_dtype(dtype: DataType) -> Self {
        let mut schema = Schema::new();
        schema.set_dtype(dtype);
        schema
    }

    pub fn from_type_id(id: TypeId) -> Self {
        let mut schema = Schema::new();
        schema.set_type_id(id);
        schema
    }

    /// Parses schema text with the schema protocol
    pub fn from_json(text: &str) -> Result<Self> {
        Generator::new(text).walk()
    }

    /// Returns the schema to the empty state, releasing any children
    pub fn reset(&mut self) {
        self.state = SchemaState::Empty;
    }

    /// Replaces this schema with a deep copy of `other`
    pub fn set(&mut self, other: &Schema) {
        self.state = other.state.clone();
    }

    /// Replaces this schema with `dtype`. Object and list data types start
    /// with no children; `Empty` resets.
    pub fn set_dtype(&mut self, dtype: DataType) {
        self.state = match dtype.id() {
            TypeId::Empty => SchemaState::Empty,
            TypeId::Object => SchemaState::Object(ObjectHierarchy::default()),
            TypeId::List => SchemaState::List(Vec::new()),
            _ => SchemaState::Leaf(dtype),
        };
    }

    /// Replaces this schema with a single-element leaf of kind `id`
    /// (or an empty object/list for the non-leaf kinds)
    pub fn set_type_id(&mut self, id: TypeId) {
        match id {
            TypeId::Empty | TypeId::Object | TypeId::List => {
                self.set_dtype(DataType::new(id, 0, 0, 0, 0, Default::default()))
            }
            _ => self.set_dtype(DataType::leaf(id, 1)),
        }
    }

    /// Re-parses schema text and installs the result. On failure `self` is
    /// left untouched.
    pub fn set_json(&mut self, text: &str) -> Result<()> {
        let parsed = Generator::new(text).walk()?;
        self.state = parsed.state;
        Ok(())
    }

    pub fn dtype(&self) -> DataType {
        match &self.state {
            SchemaState::Empty => DataType::empty(),
            SchemaState::Leaf(dtype) => *dtype,
            SchemaState::Object(_) => DataType::object(),
            SchemaState::List(_) => DataType::list(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.dtype().id()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.state, SchemaState::Empty)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.state, SchemaState::Leaf(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self.state, SchemaState::Object(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.state, SchemaState::List(_))
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn set_root(&mut self, value: bool) {
        self.root = value;
    }

    /// Byte offset of element `idx` of a leaf
    pub fn element_index(&self, idx: usize) -> usize {
        self.dtype().element_index(idx)
    }

    /// Declared byte size: the sum over children for objects and lists
    pub fn total_bytes(&self) -> usize {
        match &self.state {
            SchemaState::Empty => 0,
            SchemaState::Leaf(dtype) => dtype.total_bytes(),
            SchemaState::Object(hierarchy) => sum_bytes(hierarchy.children.iter().map(Schema::total_bytes)),
            SchemaState::List(children) => sum_bytes(children.iter().map(Schema::total_bytes)),
        }
    }

    /// Byte size once every leaf is packed back-to-back
    pub fn total_bytes_compact(&self) -> usize {
        match &self.state {
            SchemaState::Empty => 0,
            SchemaState::Leaf(dtype) => dtype.total_bytes_compact(),
            SchemaState::Object(hierarchy) => {
                sum_bytes(hierarchy.children.iter().map(Schema::total_bytes_compact))
            }
            SchemaState::List(children) => sum_bytes(children.iter().map(Schema::total_bytes_compact)),
        }
    }

    /// Size a buffer must have to hold every leaf at its declared offset
    pub fn spanned_bytes(&self) -> usize {
        self.leaves().iter().map(DataType::spanned_bytes).max().unwrap_or(0)
    }

    /// Leaf data types in depth-first order (object member order, list order)
    pub fn leaves(&self) -> Vec<DataType> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves(&self, leaves: &mut Vec<DataType>) {
        match &self.state {
            SchemaState::Leaf(dtype) => leaves.push(*dtype),
            SchemaState::Object(_) | SchemaState::List(_) => {
                for child in self.children() {
                    child.collect_leaves(leaves);
                }
            }
            SchemaState::Empty => {}
        }
    }

    //
    // Transformation
    //

    /// Rebuilds this tree into `dest` with every leaf packed contiguously
    /// from offset 0, preserving member order, list order, kinds and counts.
    pub fn compact_to(&self, dest: &mut Schema) {
        self.compact_to_offset(dest, 0);
    }

    /// Same as `compact_to`, starting at `start`. Returns the offset one past
    /// the last compacted byte.
    pub fn compact_to_offset(&self, dest: &mut Schema, start: usize) -> usize {
        dest.reset();
        self.compact_into(dest, start)
    }

    /// Returns the compact form of this tree
    pub fn compacted(&self) -> Schema {
        let mut dest = Schema::new();
        self.compact_to(&mut dest);
        dest
    }

    fn compact_into(&self, dest: &mut Schema, mut offset: usize) -> usize {
        match &self.state {
            SchemaState::Empty => dest.reset(),
            SchemaState::Leaf(dtype) => {
                let mut compact = dtype.compacted();
                compact.set_offset(offset);
                offset += compact.total_bytes();
                dest.state = SchemaState::Leaf(compact);
            }
            SchemaState::Object(hierarchy) => {
                let mut compact = ObjectHierarchy::default();
                for (name, child) in hierarchy.object_order.iter().zip(&hierarchy.children) {
                    let mut child_dest = Schema::new();
                    offset = child.compact_into(&mut child_dest, offset);
                    compact.push(name.clone(), child_dest);
                }
                dest.state = SchemaState::Object(compact);
            }
            SchemaState::List(children) => {
                let mut compact = Vec::with_capacity(children.len());
                for child in children {
                    let mut child_dest = Schema::new();
                    offset = child.compact_into(&mut child_dest, offset);
                    compact.push(child_dest);
                }
                dest.state = SchemaState::List(compact);
            }
        }
        offset
    }

    /// Renders this schema with the default options
    pub fn to_json(&self) -> String {
        self.to_json_with(&JsonOptions::default())
    }

    pub fn to_json_with(&self, options: &JsonOptions) -> String {
        let mut out = String::new();
        self.write_json(&mut out, options, options.depth);
        out
    }

    fn write_json(&self, out: &mut String, options: &JsonOptions, depth: usize) {
        match &self.state {
            SchemaState::Object(hierarchy) => write_block(
                out,
                options,
                depth,
                '{',
                '}',
                hierarchy.object_order.iter().zip(hierarchy.children.iter()),
                |out, (name, child)| {
                    write_key(out, name);
                    out.push(' ');
                    child.write_json(out, options, depth + 1);
                },
            ),
            SchemaState::List(children) => {
                write_block(out, options, depth, '[', ']', children.iter(), |out, child| {
                    child.write_json(out, options, depth + 1)
                })
            }
            SchemaState::Leaf(dtype) => dtype.write_json(out, options.detailed),
            SchemaState::Empty => DataType::empty().write_json(out, options.detailed),
        }
    }

    //
    // Basic I/O
    //

    /// Writes the textual form of this schema to `path`
    pub fn save(&self, path: impl AsRef<Path>, options: &JsonOptions) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json_with(options))
            .map_err(|e| Error::IOError(format!("failed to write {}: {}", path.display(), e)))
    }

    /// Replaces this schema with the one described in the file at `path`
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::IOError(format!("failed to open {}: {}", path.display(), e)))?;
        self.set_json(&text)
    }

    //
    // Children (object and list)
    //

    /// Number of children for objects and lists, 0 otherwise
    pub fn number_of_children(&self) -> usize {
        self.children().len()
    }

    /// Children in order; empty for leaves and empty schemas
    pub fn children(&self) -> &[Schema] {
        match &self.state {
            SchemaState::Object(hierarchy) => &hierarchy.children,
            SchemaState::List(children) => children,
            SchemaState::Leaf(_) | SchemaState::Empty => &[],
        }
    }

    fn children_mut(&mut self, operation: &str) -> Result<&mut Vec<Schema>> {
        match &mut self.state {
            SchemaState::Object(hierarchy) => Ok(&mut hierarchy.children),
            SchemaState::List(children) => Ok(children),
            other => Err(Error::InvalidState(format!(
                "<Schema::{}> schema is not an object or list, dtype is {}",
                operation,
                state_name(other)
            ))),
        }
    }

    pub fn child(&self, idx: usize) -> Result<&Schema> {
        if !(self.is_object() || self.is_list()) {
            return Err(Error::InvalidState(format!(
                "<Schema::child> schema is not an object or list, dtype is {}",
                state_name(&self.state)
            )));
        }
        let count = self.number_of_children();
        self.children().get(idx).ok_or_else(|| {
            Error::OutOfRange(format!("<Schema::child> invalid index: {} >= {}", idx, count))
        })
    }

    pub fn child_mut(&mut self, idx: usize) -> Result<&mut Schema> {
        let children = self.children_mut("child_mut")?;
        let count = children.len();
        children.get_mut(idx).ok_or_else(|| {
            Error::OutOfRange(format!("<Schema::child_mut> invalid index: {} >= {}", idx, count))
        })
    }

    /// Removes and returns the child at `idx`
    pub fn remove(&mut self, idx: usize) -> Result<Schema> {
        let count = self.number_of_children();
        match &mut self.state {
            SchemaState::Object(hierarchy) if idx < count => Ok(hierarchy.remove(idx)),
            SchemaState::List(children) if idx < count => Ok(children.remove(idx)),
            SchemaState::Object(_) | SchemaState::List(_) => Err(Error::OutOfRange(format!(
                "<Schema::remove> invalid index: {} >= {}",
                idx, count
            ))),
            other => Err(Error::InvalidState(format!(
                "<Schema::remove> schema is not an object or list, dtype is {}",
                state_name(other)
            ))),
        }
    }

    /// Removes and returns the child at the end of `path`
    pub fn remove_path(&mut self, path: &str) -> Result<Schema> {
        let mut trail = self.trail(path)?;
        let idx = trail
            .pop()
            .ok_or_else(|| Error::PathNotFound(format!("<Schema::remove_path> empty path: '{}'", path)))?;
        self.descend_mut(&trail)?.remove(idx)
    }

    //
    // Object interface
    //

    /// Returns the schema at `path`, creating missing members along the way.
    /// Any node on the path that is not an object is converted to one.
    /// Segments before a `..` are created too. `dtype` cannot name a new member.
    pub fn fetch(&mut self, path: &str) -> Result<&mut Schema> {
        let mut trail = Vec::new();
        for segment in path_segments(path) {
            if segment == PARENT {
                trail.pop().ok_or_else(|| no_parent(path))?;
                continue;
            }
            let current = self.descend_mut(&trail)?;
            trail.push(current.member_or_create(segment)?);
        }
        self.descend_mut(&trail)
    }

    fn member_or_create(&mut self, name: &str) -> Result<usize> {
        let hierarchy = self.object_hierarchy_mut()?;
        match hierarchy.index_of(name) {
            Some(idx) => Ok(idx),
            None if name == DTYPE_MEMBER => Err(Error::InvalidState(reserved_member(name))),
            None => Ok(hierarchy.push(name.to_string(), Schema::new())),
        }
    }

    /// Returns the schema at `path` without modifying the tree
    pub fn fetch_child(&self, path: &str) -> Result<&Schema> {
        let trail = self.trail(path)?;
        self.descend(&trail)
    }

    pub fn fetch_child_mut(&mut self, path: &str) -> Result<&mut Schema> {
        let trail = self.trail(path)?;
        self.descend_mut(&trail)
    }

    /// Returns true when every segment of `path` exists. Empty schemas have
    /// no paths; leaves and lists cannot be asked.
    pub fn has_path(&self, path: &str) -> Result<bool> {
        match &self.state {
            SchemaState::Empty => return Ok(false),
            SchemaState::Object(_) => {}
            other => {
                return Err(Error::InvalidState(format!(
                    "<Schema::has_path> schema is not an object, dtype is {}",
                    state_name(other)
                )))
            }
        }
        Ok(self.trail(path).is_ok())
    }

    /// Position of the member `name` of an object
    pub fn child_index(&self, name: &str) -> Result<usize> {
        match &self.state {
            SchemaState::Object(hierarchy) => hierarchy.index_of(name).ok_or_else(|| {
                Error::PathNotFound(format!("<Schema::child_index> attempt to access invalid child: {}", name))
            }),
            other => Err(Error::InvalidState(format!(
                "<Schema::child_index> schema is not an object, dtype is {}",
                state_name(other)
            ))),
        }
    }

    /// Member names of an object in insertion order
    pub fn paths(&self) -> Vec<String> {
        self.names().to_vec()
    }

    pub fn names(&self) -> &[String] {
        match &self.state {
            SchemaState::Object(hierarchy) => &hierarchy.object_order,
            _ => &[],
        }
    }

    //
    // List interface
    //

    /// Appends an empty child, converting this schema to a list if needed
    pub fn append(&mut self) -> Result<&mut Schema> {
        self.append_schema(Schema::new())
    }

    pub fn append_dtype(&mut self, dtype: DataType) -> Result<&mut Schema> {
        self.append_schema(Schema::from_dtype(dtype))
    }

    pub fn append_schema(&mut self, schema: Schema) -> Result<&mut Schema> {
        let children = self.list_children_mut()?;
        children.push(schema);
        let last = children.len() - 1;
        Ok(&mut children[last])
    }

    //
    // State helpers
    //

    fn object_hierarchy_mut(&mut self) -> Result<&mut ObjectHierarchy> {
        if !self.is_object() {
            if !self.is_empty() {
                debug!(from = state_name(&self.state), "converting schema to object");
            }
            self.state = SchemaState::Object(ObjectHierarchy::default());
        }
        match &mut self.state {
            SchemaState::Object(hierarchy) => Ok(hierarchy),
            other => Err(conversion_failed("object", other)),
        }
    }

    fn list_children_mut(&mut self) -> Result<&mut Vec<Schema>> {
        if !self.is_list() {
            if !self.is_empty() {
                debug!(from = state_name(&self.state), "converting schema to list");
            }
            self.state = SchemaState::List(Vec::new());
        }
        match &mut self.state {
            SchemaState::List(children) => Ok(children),
            other => Err(conversion_failed("list", other)),
        }
    }

    /// Position of the child named by one path segment: a member name for
    /// objects, a decimal index for lists.
    fn segment_index(&self, segment: &str, path: &str) -> Result<usize> {
        match &self.state {
            SchemaState::Object(hierarchy) => hierarchy.index_of(segment).ok_or_else(|| {
                Error::PathNotFound(format!(
                    "attempt to access invalid child '{}' in path '{}'",
                    segment, path
                ))
            }),
            SchemaState::List(children) => parse_index(segment)
                .filter(|idx| *idx < children.len())
                .ok_or_else(|| {
                    Error::PathNotFound(format!(
                        "attempt to access invalid list index '{}' in path '{}'",
                        segment, path
                    ))
                }),
            other => Err(Error::InvalidState(format!(
                "cannot access '{}' in path '{}': schema is {}",
                segment,
                path,
                state_name(other)
            ))),
        }
    }

    /// Child positions along `path`. Every segment is checked in order and
    /// a `..` steps back to the node before it.
    fn trail(&self, path: &str) -> Result<Vec<usize>> {
        let mut trail = Vec::new();
        for segment in path_segments(path) {
            if segment == PARENT {
                trail.pop().ok_or_else(|| no_parent(path))?;
                continue;
            }
            let idx = self.descend(&trail)?.segment_index(segment, path)?;
            trail.push(idx);
        }
        Ok(trail)
    }

    fn descend(&self, trail: &[usize]) -> Result<&Schema> {
        let mut current = self;
        for idx in trail {
            current = current.child(*idx)?;
        }
        Ok(current)
    }

    fn descend_mut(&mut self, trail: &[usize]) -> Result<&mut Schema> {
        let mut current = self;
        for idx in trail {
            current = current.child_mut(*idx)?;
        }
        Ok(current)
    }

    /// Appends `child` as member `name` without path splitting.
    /// Fails if the name is already taken or is `dtype`.
    pub(crate) fn insert_member(&mut self, name: &str, child: Schema) -> Result<&mut Schema> {
        if name == DTYPE_MEMBER {
            return Err(Error::ParseError(reserved_member(name)));
        }
        let hierarchy = self.object_hierarchy_mut()?;
        if hierarchy.index_of(name).is_some() {
            return Err(Error::ParseError(format!("duplicate member name: {}", name)));
        }
        let idx = hierarchy.push(name.to_string(), child);
        Ok(&mut hierarchy.children[idx])
    }
}

/// Overlapping leaves placed at explicit offsets can add up past `usize`
fn sum_bytes(sizes: impl Iterator<Item = usize>) -> usize {
    sizes.fold(0, usize::saturating_add)
}

/// Object text with this key describes a leaf or a repeated block, so no
/// member may carry the name
const DTYPE_MEMBER: &str = "dtype";

fn reserved_member(name: &str) -> String {
    format!("'{}' is reserved and cannot name an object member", name)
}

/// A `..` above the receiver: a schema reached by value has no parent
fn no_parent(path: &str) -> Error {
    Error::PathNotFound(format!("{} has no parent to resolve '..' against", path))
}

fn conversion_failed(target: &str, state: &SchemaState) -> Error {
    Error::InvalidState(format!(
        "schema could not be converted to {}, dtype is {}",
        target,
        state_name(state)
    ))
}

fn state_name(state: &SchemaState) -> &'static str {
    match state {
        SchemaState::Empty => "empty",
        SchemaState::Leaf(dtype) => dtype.id().name(),
        SchemaState::Object(_) => "object",
        SchemaState::List(_) => "list",
    }
}

impl From<DataType> for Schema {
    fn from(dtype: DataType) -> Self {
        Schema::from_dtype(dtype)
    }
}

impl FromStr for Schema {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Schema::from_json(s)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}
