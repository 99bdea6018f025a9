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

//! Registry loaders.

use crate::analyzer::{self, Diagnostics};
use crate::ast::SourceDatabase;
use crate::parser;
use crate::registry::Registry;

/// Abstract grammar of the Python 3.12 `ast` module.
pub const PYTHON: &str = include_str!("python.asdl");

/// Parse and analyze a grammar given as a string.
pub fn load_inline(
    sources: &mut SourceDatabase,
    name: &str,
    source: String,
) -> Result<Registry, Diagnostics> {
    let grammar = parser::parse_inline(sources, name, source)?;
    analyzer::analyze(&grammar)
}

/// Parse and analyze a grammar file.
pub fn load_file(sources: &mut SourceDatabase, path: &str) -> Result<Registry, Diagnostics> {
    let grammar = parser::parse_file(sources, path)?;
    analyzer::analyze(&grammar)
}

/// Load the registry of the Python abstract syntax.
pub fn python(sources: &mut SourceDatabase) -> Result<Registry, Diagnostics> {
    load_inline(sources, "python.asdl", PYTHON.to_owned())
}
