// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Conversion of syntax trees to JSON documents.
//!
//! Composite nodes become JSON objects whose first key is the
//! discriminator (`"_type"` by default) holding the node kind, followed
//! by the fields in the order declared by the registry. Sequences
//! become arrays and primitives are copied as is. Signed and unsigned
//! integers stay JSON integers and floats stay JSON floats, so `2.0`
//! is emitted as `2.0`.
//!
//! The traversal runs on an explicit work stack. Nesting is still
//! bounded by [`Options::max_depth`], as both the text encoding and
//! the destruction of a [`serde_json::Value`] recurse on its depth.

use crate::registry::{FieldSpec, NodeType, Quantifier, Registry};
use crate::tree::{Node, Path, Primitive, Segment, Value};
use serde_json::Map;

pub const DEFAULT_DISCRIMINATOR: &str = "_type";
pub const DEFAULT_MAX_DEPTH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Key of the entry holding the node kind.
    pub discriminator: String,
    /// Emit the attributes declared for each node kind after its fields.
    pub include_attributes: bool,
    /// Maximum number of nested nodes and sequences.
    pub max_depth: usize,
}

/// Type of serialization errors.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("{path}: value of type `{type_name}` is not a node, sequence, or primitive")]
    UnclassifiableValue { type_name: String, path: Path },
    #[error("{path}: node kind `{kind}` has no registered field order")]
    FieldOrderMissing { kind: String, path: Path },
    #[error("{path}: number {value} has no JSON encoding")]
    UnencodableNumber { value: f64, path: Path },
    #[error("{path}: node `{kind}` is missing the required field `{field}`")]
    MissingField { kind: String, field: String, path: Path },
    #[error("{path}: node `{kind}` holds the undeclared field `{field}`")]
    UndeclaredField { kind: String, field: String, path: Path },
    #[error("{path}: nesting exceeds the maximum depth of {limit}")]
    DepthLimitExceeded { limit: usize, path: Path },
    #[error("field `{field}` of node kind `{kind}` collides with the discriminator `{discriminator}`")]
    DiscriminatorCollision { kind: String, field: String, discriminator: String },
    #[error("JSON encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Serializer bound to a node registry.
#[derive(Debug, Clone)]
pub struct Serializer<'r> {
    registry: &'r Registry,
    options: Options,
}

/// Path to the value being visited, borrowing field names from the
/// registry. Converted to an owned [`Path`] only when reporting errors.
#[derive(Default)]
struct Cursor<'a>(Vec<Step<'a>>);

#[derive(Clone, Copy)]
enum Step<'a> {
    Field(&'a str),
    Index(usize),
}

/// Partially emitted composite value.
enum Frame<'a> {
    Node {
        node: &'a Node,
        node_type: &'a NodeType,
        specs: Vec<&'a FieldSpec>,
        next: usize,
        object: Map<String, serde_json::Value>,
    },
    Sequence {
        items: std::iter::Enumerate<std::slice::Iter<'a, Value>>,
        array: Vec<serde_json::Value>,
    },
}

impl Default for Options {
    fn default() -> Options {
        Options {
            discriminator: DEFAULT_DISCRIMINATOR.to_owned(),
            include_attributes: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Cursor<'_> {
    fn path(&self) -> Path {
        Path(
            self.0
                .iter()
                .map(|step| match step {
                    Step::Field(name) => Segment::Field((*name).to_owned()),
                    Step::Index(index) => Segment::Index(*index),
                })
                .collect(),
        )
    }
}

impl<'a> Frame<'a> {
    /// Return the next child to serialize, or `None` when the frame
    /// is complete. Absent optional and sequence fields are filled in
    /// with their empty value on the way.
    fn next_child(
        &mut self,
        cursor: &Cursor<'a>,
    ) -> Result<Option<(Step<'a>, &'a Value)>, SerializeError> {
        match self {
            Frame::Node { node, node_type, specs, next, object } => {
                let (node, node_type): (&'a Node, &'a NodeType) = (*node, *node_type);
                while let Some(&spec) = specs.get(*next) {
                    *next += 1;
                    if let Some(child) = node.get(&spec.name) {
                        return Ok(Some((Step::Field(&spec.name), child)));
                    }
                    let default = match spec.quantifier {
                        Quantifier::Optional => serde_json::Value::Null,
                        Quantifier::Sequence => serde_json::Value::Array(vec![]),
                        Quantifier::Required => {
                            return Err(SerializeError::MissingField {
                                kind: node_type.kind.clone(),
                                field: spec.name.clone(),
                                path: cursor.path(),
                            })
                        }
                    };
                    object.insert(spec.name.clone(), default);
                }
                Ok(None)
            }
            Frame::Sequence { items, .. } => {
                Ok(items.next().map(|(index, item)| (Step::Index(index), item)))
            }
        }
    }

    /// Store the serialized value of the child last returned by
    /// `next_child`.
    fn accept(&mut self, value: serde_json::Value) {
        match self {
            Frame::Node { specs, next, object, .. } => {
                object.insert(specs[*next - 1].name.clone(), value);
            }
            Frame::Sequence { array, .. } => array.push(value),
        }
    }

    fn finish(self) -> serde_json::Value {
        match self {
            Frame::Node { object, .. } => serde_json::Value::Object(object),
            Frame::Sequence { array, .. } => serde_json::Value::Array(array),
        }
    }
}

impl<'r> Serializer<'r> {
    /// Create a serializer, checking that no field declared in the
    /// registry uses the discriminator key.
    pub fn new(registry: &'r Registry, options: Options) -> Result<Serializer<'r>, SerializeError> {
        for node_type in registry.iter() {
            if let Some(field) =
                node_type.iter_all().find(|field| field.name == options.discriminator)
            {
                return Err(SerializeError::DiscriminatorCollision {
                    kind: node_type.kind.clone(),
                    field: field.name.clone(),
                    discriminator: options.discriminator.clone(),
                });
            }
        }
        Ok(Serializer { registry, options })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Serialize a tree to a JSON value.
    ///
    /// All node kinds are checked against the registry before any
    /// output is produced. Errors abort the serialization and report
    /// the path of the offending value.
    pub fn serialize(&self, root: &Value) -> Result<serde_json::Value, SerializeError> {
        self.check_registration(root)?;

        let mut stack: Vec<Frame<'_>> = vec![];
        let mut cursor = Cursor::default();
        let mut nodes = 0;
        let mut completed = self.enter(root, &cursor, &mut stack, &mut nodes)?;
        while let Some(frame) = stack.last_mut() {
            if let Some(value) = completed.take() {
                frame.accept(value);
                cursor.0.pop();
            }
            match frame.next_child(&cursor)? {
                Some((step, child)) => {
                    cursor.0.push(step);
                    completed = self.enter(child, &cursor, &mut stack, &mut nodes)?;
                }
                None => completed = stack.pop().map(Frame::finish),
            }
        }

        tracing::debug!(nodes, "tree serialized");
        Ok(completed.unwrap_or(serde_json::Value::Null))
    }

    /// Serialize a tree to compact JSON text.
    pub fn to_string(&self, root: &Value) -> Result<String, SerializeError> {
        Ok(serde_json::to_string(&self.serialize(root)?)?)
    }

    /// Serialize a tree to indented JSON text.
    pub fn to_string_pretty(&self, root: &Value) -> Result<String, SerializeError> {
        Ok(serde_json::to_string_pretty(&self.serialize(root)?)?)
    }

    /// Classify a value. Primitives are converted immediately,
    /// composite values push a new frame and return `None`.
    fn enter<'a>(
        &'a self,
        value: &'a Value,
        cursor: &Cursor<'a>,
        stack: &mut Vec<Frame<'a>>,
        nodes: &mut usize,
    ) -> Result<Option<serde_json::Value>, SerializeError> {
        let frame = match value {
            Value::Primitive(primitive) => return self.encode_primitive(primitive, cursor).map(Some),
            Value::Opaque(opaque) => {
                return Err(SerializeError::UnclassifiableValue {
                    type_name: opaque.type_name.clone(),
                    path: cursor.path(),
                })
            }
            Value::Sequence(items) => Frame::Sequence {
                items: items.iter().enumerate(),
                array: Vec::with_capacity(items.len()),
            },
            Value::Node(node) => {
                let node_type = self.node_type(node, cursor)?;
                for (name, _) in node.fields() {
                    if !node_type.declares(name) {
                        return Err(SerializeError::UndeclaredField {
                            kind: node.kind().to_owned(),
                            field: name.to_owned(),
                            path: cursor.path(),
                        });
                    }
                }
                let specs: Vec<&FieldSpec> = if self.options.include_attributes {
                    node_type.iter_all().collect()
                } else {
                    node_type.fields.iter().collect()
                };
                let mut object = Map::with_capacity(specs.len() + 1);
                object.insert(
                    self.options.discriminator.clone(),
                    serde_json::Value::String(node.kind().to_owned()),
                );
                *nodes += 1;
                Frame::Node { node, node_type, specs, next: 0, object }
            }
        };

        if stack.len() >= self.options.max_depth {
            return Err(SerializeError::DepthLimitExceeded {
                limit: self.options.max_depth,
                path: cursor.path(),
            });
        }
        stack.push(frame);
        Ok(None)
    }

    fn encode_primitive(
        &self,
        primitive: &Primitive,
        cursor: &Cursor,
    ) -> Result<serde_json::Value, SerializeError> {
        Ok(match primitive {
            Primitive::Null => serde_json::Value::Null,
            Primitive::Bool(value) => serde_json::Value::Bool(*value),
            Primitive::Int(value) => serde_json::Value::from(*value),
            Primitive::UInt(value) => serde_json::Value::from(*value),
            Primitive::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .ok_or_else(|| SerializeError::UnencodableNumber {
                    value: *value,
                    path: cursor.path(),
                })?,
            Primitive::Str(value) => serde_json::Value::String(value.clone()),
        })
    }

    fn node_type<'a>(
        &'a self,
        node: &Node,
        cursor: &Cursor,
    ) -> Result<&'a NodeType, SerializeError> {
        self.registry.get(node.kind()).ok_or_else(|| SerializeError::FieldOrderMissing {
            kind: node.kind().to_owned(),
            path: cursor.path(),
        })
    }

    /// Check that every node kind in the tree is registered.
    /// Values are visited in document order, so the first reported
    /// node is the first one the serializer would have emitted.
    fn check_registration(&self, root: &Value) -> Result<(), SerializeError> {
        let mut cursor = Cursor::default();
        let mut pending: Vec<(usize, Option<Step<'_>>, &Value)> = vec![(0, None, root)];
        while let Some((depth, step, value)) = pending.pop() {
            cursor.0.truncate(depth.saturating_sub(1));
            cursor.0.extend(step);
            match value {
                Value::Node(node) => {
                    let node_type = self.node_type(node, &cursor)?;
                    let specs: Vec<&FieldSpec> = if self.options.include_attributes {
                        node_type.iter_all().collect()
                    } else {
                        node_type.fields.iter().collect()
                    };
                    for spec in specs.into_iter().rev() {
                        if let Some(child) = node.get(&spec.name) {
                            pending.push((depth + 1, Some(Step::Field(&spec.name)), child));
                        }
                    }
                }
                Value::Sequence(items) => {
                    for (index, item) in items.iter().enumerate().rev() {
                        pending.push((depth + 1, Some(Step::Index(index)), item));
                    }
                }
                Value::Primitive(_) | Value::Opaque(_) => (),
            }
        }
        Ok(())
    }
}

/// Serialize a tree with the default options.
pub fn serialize(registry: &Registry, root: &Value) -> Result<serde_json::Value, SerializeError> {
    Serializer::new(registry, Options::default())?.serialize(root)
}
