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

//! Syntax tree values consumed by the serializer.

use crate::registry::{Quantifier, RegistryBuilder, RegistryError};
use std::collections::BTreeMap;
use std::fmt;

/// Atomic value without further structure.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

/// Composite node: a kind and its named children.
///
/// Children are stored by name; the order in which they are emitted
/// is defined by the registry entry for the node kind, never by the
/// order of insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    kind: String,
    fields: BTreeMap<String, Value>,
}

/// Value the tree producer could not map to a node, sequence, or
/// primitive. It can be carried in a tree but never serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque {
    pub type_name: String,
    pub repr: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Node(Node),
    Sequence(Vec<Value>),
    Primitive(Primitive),
    Opaque(Opaque),
}

/// Step from a value to one of its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(usize),
}

/// Chain of segments leading from the tree root to a value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Path(pub Vec<Segment>);

/// Conversion of Rust values into tree values.
///
/// Implemented by `#[derive(TreeNode)]` for Rust syntax tree types.
pub trait TreeNode {
    /// Quantifier of fields holding values of this type.
    const QUANTIFIER: Quantifier = Quantifier::Required;

    /// Register the node kinds contributed by this type, and
    /// recursively by the types of its fields.
    fn declare(_registry: &mut RegistryBuilder) -> Result<(), RegistryError> {
        Ok(())
    }

    fn to_tree(&self) -> Value;
}

impl Node {
    pub fn new(kind: impl Into<String>) -> Node {
        Node { kind: kind.into(), fields: BTreeMap::new() }
    }

    /// Builder variant of [`Node::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Node {
        self.insert(name, value);
        self
    }

    /// Set the value of a field, returning the previous value if any.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Iterate over the stored fields, sorted by name.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Opaque {
    pub fn new(type_name: impl Into<String>, repr: impl Into<String>) -> Opaque {
        Opaque { type_name: type_name.into(), repr: repr.into() }
    }
}

impl Value {
    /// Name of the value category, or the node kind for nodes.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Node(node) => node.kind(),
            Value::Sequence(_) => "sequence",
            Value::Primitive(Primitive::Null) => "null",
            Value::Primitive(Primitive::Bool(_)) => "bool",
            Value::Primitive(Primitive::Int(_) | Primitive::UInt(_)) => "int",
            Value::Primitive(Primitive::Float(_)) => "float",
            Value::Primitive(Primitive::Str(_)) => "string",
            Value::Opaque(opaque) => &opaque.type_name,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn null() -> Value {
        Value::Primitive(Primitive::Null)
    }
}

impl Path {
    pub fn push(&mut self, segment: Segment) {
        self.0.push(segment)
    }

    pub fn pop(&mut self) -> Option<Segment> {
        self.0.pop()
    }

    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => write!(f, ".{}", name),
            Segment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root")?;
        self.0.iter().try_for_each(|segment| write!(f, "{}", segment))
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Value {
        Value::Node(node)
    }
}

impl From<Primitive> for Value {
    fn from(primitive: Primitive) -> Value {
        Value::Primitive(primitive)
    }
}

impl From<Opaque> for Value {
    fn from(opaque: Opaque) -> Value {
        Value::Opaque(opaque)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Value {
        Value::Sequence(values)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Value {
        Value::Primitive(Primitive::Bool(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Value {
        Value::Primitive(Primitive::Int(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Value {
        Value::Primitive(Primitive::Int(value.into()))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Value {
        Value::Primitive(Primitive::UInt(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Value {
        Value::Primitive(Primitive::Float(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Value {
        Value::Primitive(Primitive::Str(value.to_owned()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Value {
        Value::Primitive(Primitive::Str(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Value {
        value.map_or_else(Value::null, Into::into)
    }
}

macro_rules! primitive_tree_node {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl TreeNode for $ty {
                fn to_tree(&self) -> Value {
                    Value::Primitive(Primitive::$variant((*self).into()))
                }
            }
        )*
    };
}

primitive_tree_node! {
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => UInt,
    u16 => UInt,
    u32 => UInt,
    u64 => UInt,
    f32 => Float,
    f64 => Float,
}

impl TreeNode for usize {
    fn to_tree(&self) -> Value {
        Value::Primitive(Primitive::UInt(*self as u64))
    }
}

impl TreeNode for str {
    fn to_tree(&self) -> Value {
        Value::from(self)
    }
}

impl TreeNode for String {
    fn to_tree(&self) -> Value {
        Value::from(self.as_str())
    }
}

impl TreeNode for Value {
    fn to_tree(&self) -> Value {
        self.clone()
    }
}

impl<T: TreeNode> TreeNode for Option<T> {
    const QUANTIFIER: Quantifier = Quantifier::Optional;

    fn declare(registry: &mut RegistryBuilder) -> Result<(), RegistryError> {
        T::declare(registry)
    }

    fn to_tree(&self) -> Value {
        self.as_ref().map_or_else(Value::null, TreeNode::to_tree)
    }
}

impl<T: TreeNode> TreeNode for Vec<T> {
    const QUANTIFIER: Quantifier = Quantifier::Sequence;

    fn declare(registry: &mut RegistryBuilder) -> Result<(), RegistryError> {
        T::declare(registry)
    }

    fn to_tree(&self) -> Value {
        Value::Sequence(self.iter().map(TreeNode::to_tree).collect())
    }
}

impl<T: TreeNode + ?Sized> TreeNode for Box<T> {
    const QUANTIFIER: Quantifier = T::QUANTIFIER;

    fn declare(registry: &mut RegistryBuilder) -> Result<(), RegistryError> {
        T::declare(registry)
    }

    fn to_tree(&self) -> Value {
        self.as_ref().to_tree()
    }
}

impl<T: TreeNode + ?Sized> TreeNode for &T {
    const QUANTIFIER: Quantifier = T::QUANTIFIER;

    fn declare(registry: &mut RegistryBuilder) -> Result<(), RegistryError> {
        T::declare(registry)
    }

    fn to_tree(&self) -> Value {
        (**self).to_tree()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_path_display() {
        let mut path = Path::default();
        assert_eq!(path.to_string(), "root");
        path.push(Segment::Field("children".to_owned()));
        path.push(Segment::Index(1));
        path.push(Segment::Field("body".to_owned()));
        assert_eq!(path.to_string(), "root.children[1].body");
        path.truncate(1);
        assert_eq!(path.to_string(), "root.children");
    }

    #[test]
    fn test_node_fields_are_keyed_by_name() {
        let mut node = Node::new("BinOp").with("right", 3).with("left", 2);
        assert_eq!(node.insert("left", 4), Some(Value::from(2)));
        assert_eq!(node.get("left"), Some(&Value::from(4)));
        assert_eq!(node.len(), 2);
        let names: Vec<_> = node.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["left", "right"]);
    }

    #[test]
    fn test_type_name() {
        assert_eq!(Value::from(Node::new("Name")).type_name(), "Name");
        assert_eq!(Value::Sequence(vec![]).type_name(), "sequence");
        assert_eq!(Value::from(None::<i64>).type_name(), "null");
        assert_eq!(Value::from(1.5).type_name(), "float");
        assert_eq!(Value::from(Opaque::new("bytes", "b'x'")).type_name(), "bytes");
    }

    #[test]
    fn test_tree_node_containers() {
        let values: Vec<Option<Box<u8>>> = vec![Some(Box::new(1)), None];
        assert_eq!(
            values.to_tree(),
            Value::Sequence(vec![
                Value::Primitive(Primitive::UInt(1)),
                Value::Primitive(Primitive::Null)
            ])
        );
        assert_eq!("x".to_tree(), Value::from("x"));
        assert_eq!(2.5f32.to_tree(), Value::from(2.5));
    }

    #[test]
    fn test_quantifiers() {
        assert_eq!(<String as TreeNode>::QUANTIFIER, Quantifier::Required);
        assert_eq!(<Option<Box<u8>> as TreeNode>::QUANTIFIER, Quantifier::Optional);
        assert_eq!(<Box<Vec<u8>> as TreeNode>::QUANTIFIER, Quantifier::Sequence);
    }
}
