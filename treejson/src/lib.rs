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

//! Serialization of syntax trees to JSON.
//!
//! Node kinds and the order of their fields are declared in a
//! [`registry::Registry`], loaded from an abstract grammar
//! ([`grammars`]) or derived from Rust types. The
//! [`serializer::Serializer`] then turns a [`tree::Value`] into a JSON
//! document where every node is an object starting with its kind.

pub mod analyzer;
pub mod ast;
pub mod backends;
pub mod dump;
pub mod grammars;
pub mod parser;
pub mod registry;
pub mod serializer;
#[cfg(test)]
pub mod test_utils;
pub mod tree;
