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

//! Abstract syntax of node grammars.

use crate::registry::Quantifier;
use codespan_reporting::diagnostic;
use codespan_reporting::files;
use serde::Serialize;
use std::fmt;
use std::ops;

/// File identifier.
/// References a source file in the source database.
pub type FileId = usize;

/// Source database.
/// Stores the source file contents for reference.
pub type SourceDatabase = files::SimpleFiles<String, String>;

#[derive(Debug, Default, Copy, Clone, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceLocation {
    /// Byte offset into the file (counted from zero).
    pub offset: usize,
    /// Line number (counted from zero).
    pub line: usize,
    /// Column number (counted from zero)
    pub column: usize,
}

#[derive(Default, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRange {
    pub file: FileId,
    pub start: SourceLocation,
    pub end: SourceLocation,
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "kind", rename = "comment")]
pub struct Comment {
    pub loc: SourceRange,
    pub text: String,
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "kind", rename = "field")]
pub struct Field {
    pub loc: SourceRange,
    pub type_id: String,
    pub quantifier: Quantifier,
    pub id: String,
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "kind", rename = "constructor")]
pub struct Constructor {
    pub loc: SourceRange,
    pub id: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum DeclDesc {
    /// Type with alternative constructors, each constructor being a
    /// node kind.
    #[serde(rename = "sum_declaration")]
    Sum { id: String, constructors: Vec<Constructor>, attributes: Vec<Field> },
    /// Type with a single anonymous constructor, the type itself
    /// being a node kind.
    #[serde(rename = "product_declaration")]
    Product { id: String, fields: Vec<Field>, attributes: Vec<Field> },
}

#[derive(Debug, Serialize, Clone)]
pub struct Decl {
    pub loc: SourceRange,
    #[serde(flatten)]
    pub desc: DeclDesc,
}

#[derive(Debug, Serialize, Clone)]
pub struct Grammar {
    pub module: String,
    pub file: FileId,
    pub comments: Vec<Comment>,
    pub declarations: Vec<Decl>,
}

/// Node kind declared by a grammar: a sum type constructor or a
/// product type.
#[derive(Debug, Clone, Copy)]
pub struct NodeDecl<'d> {
    pub id: &'d str,
    pub loc: SourceRange,
    pub fields: &'d [Field],
    pub attributes: &'d [Field],
}

impl SourceLocation {
    /// Construct a new source location.
    ///
    /// The `line_starts` indicates the byte offsets where new lines
    /// start in the file. The first element should thus be `0` since
    /// every file has at least one line starting at offset `0`.
    pub fn new(offset: usize, line_starts: &[usize]) -> SourceLocation {
        let mut loc = SourceLocation { offset, line: 0, column: offset };
        for (line, start) in line_starts.iter().enumerate() {
            if *start > offset {
                break;
            }
            loc = SourceLocation { offset, line, column: offset - start };
        }
        loc
    }
}

impl SourceRange {
    pub fn primary(&self) -> diagnostic::Label<FileId> {
        diagnostic::Label::primary(self.file, self.start.offset..self.end.offset)
    }
    pub fn secondary(&self) -> diagnostic::Label<FileId> {
        diagnostic::Label::secondary(self.file, self.start.offset..self.end.offset)
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(f, "{}:{}-{}", self.start.line, self.start.column, self.end.column)
        } else {
            write!(
                f,
                "{}:{}-{}:{}",
                self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

impl fmt::Debug for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRange").finish_non_exhaustive()
    }
}

impl ops::Add<SourceRange> for SourceRange {
    type Output = SourceRange;

    fn add(self, rhs: SourceRange) -> SourceRange {
        assert_eq!(self.file, rhs.file);
        SourceRange {
            file: self.file,
            start: self.start.min(rhs.start),
            end: self.end.max(rhs.end),
        }
    }
}

impl Eq for Field {}
impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        // Implement structural equality, leave out loc.
        self.type_id == other.type_id && self.quantifier == other.quantifier && self.id == other.id
    }
}

impl Eq for Constructor {}
impl PartialEq for Constructor {
    fn eq(&self, other: &Self) -> bool {
        // Implement structural equality, leave out loc.
        self.id == other.id && self.fields == other.fields
    }
}

impl Eq for Decl {}
impl PartialEq for Decl {
    fn eq(&self, other: &Self) -> bool {
        // Implement structural equality, leave out loc.
        self.desc == other.desc
    }
}

impl Decl {
    pub fn id(&self) -> &str {
        match &self.desc {
            DeclDesc::Sum { id, .. } | DeclDesc::Product { id, .. } => id,
        }
    }

    pub fn kind(&self) -> &str {
        match &self.desc {
            DeclDesc::Sum { .. } => "sum",
            DeclDesc::Product { .. } => "product",
        }
    }

    pub fn attributes(&self) -> &[Field] {
        match &self.desc {
            DeclDesc::Sum { attributes, .. } | DeclDesc::Product { attributes, .. } => attributes,
        }
    }

    /// Iterate over the node kinds introduced by the declaration.
    pub fn nodes(&self) -> impl Iterator<Item = NodeDecl<'_>> {
        let attributes = self.attributes();
        let (product, constructors) = match &self.desc {
            DeclDesc::Product { id, fields, .. } => {
                (Some(NodeDecl { id, loc: self.loc, fields, attributes }), &[][..])
            }
            DeclDesc::Sum { constructors, .. } => (None, &constructors[..]),
        };
        product.into_iter().chain(constructors.iter().map(move |constructor| NodeDecl {
            id: &constructor.id,
            loc: constructor.loc,
            fields: &constructor.fields,
            attributes,
        }))
    }

    /// Iterate over all fields and attributes in the declaration.
    pub fn iter_fields(&self) -> Box<dyn Iterator<Item = &Field> + '_> {
        match &self.desc {
            DeclDesc::Sum { constructors, attributes, .. } => Box::new(
                constructors
                    .iter()
                    .flat_map(|constructor| constructor.fields.iter())
                    .chain(attributes.iter()),
            ),
            DeclDesc::Product { fields, attributes, .. } => {
                Box::new(fields.iter().chain(attributes.iter()))
            }
        }
    }
}

impl Eq for Grammar {}
impl PartialEq for Grammar {
    fn eq(&self, other: &Self) -> bool {
        // Implement structural equality, leave out comments.
        self.module == other.module && self.declarations == other.declarations
    }
}

impl Grammar {
    pub fn new(file: FileId) -> Grammar {
        Grammar { module: String::new(), comments: vec![], declarations: vec![], file }
    }

    /// Iterate over every node kind declared in the grammar, in
    /// declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeDecl<'_>> {
        self.declarations.iter().flat_map(Decl::nodes)
    }
}

impl NodeDecl<'_> {
    /// Iterate over the fields followed by the attributes.
    pub fn iter_all(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().chain(self.attributes.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_location_new() {
        let line_starts = &[0, 20, 80, 120, 150];
        assert_eq!(
            SourceLocation::new(0, line_starts),
            SourceLocation { offset: 0, line: 0, column: 0 }
        );
        assert_eq!(
            SourceLocation::new(50, line_starts),
            SourceLocation { offset: 50, line: 1, column: 30 }
        );
        assert_eq!(
            SourceLocation::new(1000, line_starts),
            SourceLocation { offset: 1000, line: 4, column: 850 }
        );
    }

    #[test]
    fn source_location_new_no_crash_with_empty_line_starts() {
        let loc = SourceLocation::new(100, &[]);
        assert_eq!(loc, SourceLocation { offset: 100, line: 0, column: 100 });
    }

    fn field(type_id: &str, quantifier: Quantifier, id: &str) -> Field {
        Field {
            loc: SourceRange::default(),
            type_id: type_id.to_owned(),
            quantifier,
            id: id.to_owned(),
        }
    }

    #[test]
    fn decl_nodes() {
        let attributes = vec![field("int", Quantifier::Required, "lineno")];
        let sum = Decl {
            loc: SourceRange::default(),
            desc: DeclDesc::Sum {
                id: "expr".to_owned(),
                constructors: vec![
                    Constructor {
                        loc: SourceRange::default(),
                        id: "Name".to_owned(),
                        fields: vec![field("identifier", Quantifier::Required, "id")],
                    },
                    Constructor { loc: SourceRange::default(), id: "Load".to_owned(), fields: vec![] },
                ],
                attributes: attributes.clone(),
            },
        };
        let nodes: Vec<_> = sum.nodes().map(|node| (node.id, node.fields.len())).collect();
        assert_eq!(nodes, vec![("Name", 1), ("Load", 0)]);
        assert!(sum.nodes().all(|node| node.attributes == &attributes[..]));

        let product = Decl {
            loc: SourceRange::default(),
            desc: DeclDesc::Product {
                id: "alias".to_owned(),
                fields: vec![
                    field("identifier", Quantifier::Required, "name"),
                    field("identifier", Quantifier::Optional, "asname"),
                ],
                attributes: vec![],
            },
        };
        let nodes: Vec<_> = product.nodes().map(|node| node.id).collect();
        assert_eq!(nodes, vec!["alias"]);
        assert_eq!(product.iter_fields().count(), 2);
    }
}
