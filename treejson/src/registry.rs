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

//! Registry of node kinds and their ordered field lists.

use crate::tree::TreeNode;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Multiplicity of a declared field.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantifier {
    /// Exactly one value.
    #[default]
    Required,
    /// Zero or one value, `?` in grammars.
    Optional,
    /// Zero or more values, `*` in grammars.
    Sequence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub quantifier: Quantifier,
}

/// Declaration of a single node kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeType {
    pub kind: String,
    /// Fields, in emission order.
    pub fields: Vec<FieldSpec>,
    /// Location attributes, emitted after the fields on request.
    pub attributes: Vec<FieldSpec>,
}

/// Type of registration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("node kind `{kind}` is declared more than once")]
    DuplicateKind { kind: String },
    #[error("node kind `{kind}` declares `{field}` more than once")]
    DuplicateField { kind: String, field: String },
}

/// Immutable mapping from node kind to its declaration.
///
/// Declarations are kept in registration order so that dumps of the
/// registry are reproducible.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Registry {
    types: Vec<NodeType>,
    #[serde(skip_serializing)]
    index: HashMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: Registry,
    visited: HashSet<&'static str>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, quantifier: Quantifier) -> FieldSpec {
        FieldSpec { name: name.into(), quantifier }
    }

    pub fn required(name: impl Into<String>) -> FieldSpec {
        FieldSpec::new(name, Quantifier::Required)
    }
}

impl NodeType {
    pub fn new(kind: impl Into<String>) -> NodeType {
        NodeType { kind: kind.into(), fields: vec![], attributes: vec![] }
    }

    pub fn with_field(mut self, name: impl Into<String>, quantifier: Quantifier) -> NodeType {
        self.fields.push(FieldSpec::new(name, quantifier));
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, quantifier: Quantifier) -> NodeType {
        self.attributes.push(FieldSpec::new(name, quantifier));
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&FieldSpec> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    /// Test if `name` is declared either as a field or as an attribute.
    pub fn declares(&self, name: &str) -> bool {
        self.field(name).is_some() || self.attribute(name).is_some()
    }

    /// Iterate over the fields followed by the attributes.
    pub fn iter_all(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().chain(self.attributes.iter())
    }
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn get(&self, kind: &str) -> Option<&NodeType> {
        self.index.get(kind).map(|index| &self.types[*index])
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.index.contains_key(kind)
    }

    /// Iterate over the declarations in registration order.
    pub fn iter(&self) -> std::slice::Iter<'_, NodeType> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl RegistryBuilder {
    /// Register a node kind whose fields are all required.
    pub fn node(mut self, kind: &str, fields: &[&str]) -> Result<Self, RegistryError> {
        let node_type = fields
            .iter()
            .fold(NodeType::new(kind), |node_type, name| {
                node_type.with_field(*name, Quantifier::Required)
            });
        self.declare(node_type)?;
        Ok(self)
    }

    /// Register a complete node declaration.
    pub fn declare(&mut self, node_type: NodeType) -> Result<(), RegistryError> {
        if self.registry.index.contains_key(&node_type.kind) {
            return Err(RegistryError::DuplicateKind { kind: node_type.kind });
        }
        let mut names = HashSet::new();
        for field in node_type.iter_all() {
            if !names.insert(field.name.as_str()) {
                return Err(RegistryError::DuplicateField {
                    kind: node_type.kind.clone(),
                    field: field.name.clone(),
                });
            }
        }
        self.registry.index.insert(node_type.kind.clone(), self.registry.types.len());
        self.registry.types.push(node_type);
        Ok(())
    }

    /// Register the node kinds contributed by the Rust type `T`.
    pub fn register<T: TreeNode + ?Sized>(mut self) -> Result<Self, RegistryError> {
        T::declare(&mut self)?;
        Ok(self)
    }

    /// Mark the Rust type `type_name` as visited.
    /// Returns false if it was already visited, which lets recursive
    /// types stop registering themselves.
    pub fn visit(&mut self, type_name: &'static str) -> bool {
        self.visited.insert(type_name)
    }

    pub fn build(self) -> Registry {
        tracing::debug!(kinds = self.registry.len(), "node registry built");
        self.registry
    }
}
