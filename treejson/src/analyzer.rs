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

use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files;
use codespan_reporting::term;
use codespan_reporting::term::termcolor;
use std::collections::HashMap;
use std::fmt;

use crate::ast::*;
use crate::registry::{FieldSpec, NodeType, Registry};

/// Field types provided by the grammar language itself.
pub const BUILTIN_TYPES: [&str; 7] =
    ["identifier", "string", "bytes", "int", "object", "singleton", "constant"];

/// List of unique errors reported as analyzer diagnostics.
#[repr(u16)]
#[derive(Copy, Clone)]
pub enum ErrorCode {
    DuplicateDeclIdentifier = 1,
    DuplicateNodeKind = 2,
    DuplicateFieldIdentifier = 3,
    UndeclaredTypeIdentifier = 4,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "E{}", *self as u16)
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        format!("{}", code)
    }
}

/// Aggregate analyzer diagnostics.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub diagnostics: Vec<Diagnostic<FileId>>,
}

impl Diagnostics {
    fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    fn push(&mut self, diagnostic: Diagnostic<FileId>) {
        self.diagnostics.push(diagnostic)
    }

    fn err_or<T>(self, value: T) -> Result<T, Diagnostics> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    pub fn emit(
        &self,
        sources: &SourceDatabase,
        writer: &mut dyn termcolor::WriteColor,
    ) -> Result<(), files::Error> {
        let config = term::Config::default();
        for d in self.diagnostics.iter() {
            term::emit_to_write_style(writer, &config, sources, d)?;
        }
        Ok(())
    }
}

impl From<Diagnostic<FileId>> for Diagnostics {
    fn from(diagnostic: Diagnostic<FileId>) -> Self {
        Diagnostics { diagnostics: vec![diagnostic] }
    }
}

/// Check declaration identifiers.
/// Raises error diagnostics for the following cases:
///      - duplicate type identifier
fn check_decl_identifiers(grammar: &Grammar) -> Result<(), Diagnostics> {
    let mut diagnostics: Diagnostics = Default::default();
    let mut scope: HashMap<&str, &Decl> = HashMap::new();
    for decl in &grammar.declarations {
        let id = decl.id();
        if let Some(prev) = scope.insert(id, decl) {
            diagnostics.push(
                Diagnostic::error()
                    .with_code(ErrorCode::DuplicateDeclIdentifier)
                    .with_message(format!("redeclaration of {} type `{}`", decl.kind(), id))
                    .with_labels(vec![
                        decl.loc.primary(),
                        prev.loc.secondary().with_message(format!("`{id}` is first declared here")),
                    ]),
            )
        }
    }

    diagnostics.err_or(())
}

/// Check node kinds.
/// Raises error diagnostics for the following cases:
///      - constructor or product type declaring an existing node kind
fn check_node_kinds(grammar: &Grammar) -> Result<(), Diagnostics> {
    let mut diagnostics: Diagnostics = Default::default();
    let mut scope: HashMap<&str, NodeDecl> = HashMap::new();
    for node in grammar.nodes() {
        if let Some(prev) = scope.insert(node.id, node) {
            diagnostics.push(
                Diagnostic::error()
                    .with_code(ErrorCode::DuplicateNodeKind)
                    .with_message(format!("redeclaration of node kind `{}`", node.id))
                    .with_labels(vec![
                        node.loc.primary(),
                        prev.loc
                            .secondary()
                            .with_message(format!("`{}` is first declared here", node.id)),
                    ]),
            )
        }
    }

    diagnostics.err_or(())
}

/// Check field identifiers.
/// Raises error diagnostics for the following cases:
///      - duplicate field or attribute name within a node kind
fn check_field_identifiers(grammar: &Grammar) -> Result<(), Diagnostics> {
    let mut diagnostics: Diagnostics = Default::default();
    for node in grammar.nodes() {
        let mut local_scope: HashMap<&str, &Field> = HashMap::new();
        for field in node.iter_all() {
            if let Some(prev) = local_scope.insert(&field.id, field) {
                diagnostics.push(
                    Diagnostic::error()
                        .with_code(ErrorCode::DuplicateFieldIdentifier)
                        .with_message(format!(
                            "redeclaration of field `{}` in node kind `{}`",
                            field.id, node.id
                        ))
                        .with_labels(vec![
                            field.loc.primary(),
                            prev.loc
                                .secondary()
                                .with_message(format!("`{}` is first declared here", field.id)),
                        ]),
                )
            }
        }
    }

    diagnostics.err_or(())
}

/// Check field types.
/// Raises error diagnostics for the following cases:
///      - field type neither builtin nor declared in the module
fn check_field_types(grammar: &Grammar) -> Result<(), Diagnostics> {
    let mut diagnostics: Diagnostics = Default::default();
    let declared: Vec<&str> = grammar.declarations.iter().map(Decl::id).collect();
    for decl in &grammar.declarations {
        for field in decl.iter_fields() {
            let type_id = field.type_id.as_str();
            if !BUILTIN_TYPES.contains(&type_id) && !declared.contains(&type_id) {
                diagnostics.push(
                    Diagnostic::error()
                        .with_code(ErrorCode::UndeclaredTypeIdentifier)
                        .with_message(format!("undeclared type `{}`", type_id))
                        .with_labels(vec![field.loc.primary()]),
                )
            }
        }
    }

    diagnostics.err_or(())
}

fn field_spec(field: &Field) -> FieldSpec {
    FieldSpec::new(field.id.clone(), field.quantifier)
}

/// Analyze a grammar and build the registry of the node kinds it
/// declares, in declaration order.
pub fn analyze(grammar: &Grammar) -> Result<Registry, Diagnostics> {
    check_decl_identifiers(grammar)?;
    check_node_kinds(grammar)?;
    check_field_identifiers(grammar)?;
    check_field_types(grammar)?;

    let mut builder = Registry::builder();
    for node in grammar.nodes() {
        let node_type = NodeType {
            kind: node.id.to_owned(),
            fields: node.fields.iter().map(field_spec).collect(),
            attributes: node.attributes.iter().map(field_spec).collect(),
        };
        // Duplicates were rejected above.
        builder.declare(node_type).map_err(|err| {
            Diagnostics::from(
                Diagnostic::error().with_message(err.to_string()).with_labels(vec![node.loc.primary()]),
            )
        })?;
    }
    Ok(builder.build())
}
