// Schema generator
//
// Front door for turning schema text into a `Schema` or a live `Node`.
// The text is parsed with serde_json and handed to the schema protocol
// walker or to pure value inference depending on the protocol.

use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::internal::error::{Error, Result};
use crate::node::Node;
use crate::schema::hierarchy::Schema;
use crate::schema::inference::{infer, InferredValue};
use crate::schema::parser::{Buffer, Placement, SchemaWalker};

/// How schema text is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// Layout descriptions: type names, `dtype` objects, lists
    #[default]
    Schema,
    /// Plain JSON values with inferred types
    Json,
}

impl Protocol {
    pub fn name(self) -> &'static str {
        match self {
            Protocol::Schema => "schema",
            Protocol::Json => "json",
        }
    }

    pub fn from_name(name: &str) -> Result<Protocol> {
        match name {
            "schema" | "conduit" => Ok(Protocol::Schema),
            "json" => Ok(Protocol::Json),
            other => Err(Error::ParseError(format!("Unknown protocol: {}", other))),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses schema text, optionally binding the result to caller memory.
/// A generator is consumed by the walks that produce a `Node`.
pub struct Generator<'a> {
    text: String,
    protocol: Protocol,
    data: Option<&'a mut [u8]>,
}

impl<'a> Generator<'a> {
    /// Creates a generator for the schema protocol with no external memory
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_protocol(text, Protocol::Schema)
    }

    pub fn with_protocol(text: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            text: text.into(),
            protocol,
            data: None,
        }
    }

    /// Creates a generator whose leaves are bound into `data`
    pub fn with_data(text: impl Into<String>, protocol: Protocol, data: &'a mut [u8]) -> Self {
        Self {
            text: text.into(),
            protocol,
            data: Some(data),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    fn document(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.text)?)
    }

    /// Parses the structure only. No memory is reserved for the leaves;
    /// inline values are kept aside so that length references resolve.
    pub fn walk(&self) -> Result<Schema> {
        debug!(protocol = %self.protocol, bytes = self.text.len(), "walking schema text");
        let document = self.document()?;
        match self.protocol {
            Protocol::Json => Ok(infer(&document)?.schema),
            Protocol::Schema => {
                let mut walker = SchemaWalker::new(Buffer::Detached(Vec::new()), Placement::Contiguous);
                walker.walk_document(&document)
            }
        }
    }

    /// Parses into a node and returns its compact form: leaves packed from
    /// offset 0 whatever offsets the text declares.
    pub fn walk_node(self) -> Result<Node<'static>> {
        self.walk_external()?.compact_to()
    }

    /// Parses into a node. With the schema protocol and external memory,
    /// every leaf is bound into that memory at its computed offset;
    /// without it, memory for each leaf is allocated as it is discovered.
    /// The pure value protocol always allocates.
    pub fn walk_external(self) -> Result<Node<'a>> {
        debug!(
            protocol = %self.protocol,
            bytes = self.text.len(),
            external = self.data.is_some(),
            "walking schema text into a node"
        );
        let document = self.document()?;
        match (self.protocol, self.data) {
            (Protocol::Json, data) => {
                if data.is_some() {
                    debug!("external memory is ignored by the json protocol");
                }
                let InferredValue { schema, data } = infer(&document)?;
                Node::with_data(schema, data)
            }
            (Protocol::Schema, Some(external)) => {
                let mut walker = SchemaWalker::new(Buffer::External(external), Placement::Contiguous);
                let schema = walker.walk_document(&document)?;
                into_node(schema, walker.into_buffer())
            }
            (Protocol::Schema, None) => {
                let mut walker = SchemaWalker::new(Buffer::Owned(Vec::new()), Placement::Allocate);
                let schema = walker.walk_document(&document)?;
                into_node(schema, walker.into_buffer())
            }
        }
    }
}

fn into_node(schema: Schema, buffer: Buffer<'_>) -> Result<Node<'_>> {
    match buffer {
        Buffer::Owned(data) => Node::with_data(schema, data),
        Buffer::External(external) => Node::external(schema, external),
        Buffer::Detached(_) => Err(Error::InvalidState(
            "a structure-only walk holds no data for a node".to_string(),
        )),
    }
}
