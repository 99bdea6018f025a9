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

use crate::ast;
use crate::registry::Quantifier;
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files;
use pest::iterators::{Pair, Pairs};
use pest::{Parser, Token};
use std::iter::{Filter, Peekable};

// Generate the grammar parser.
//
// The accepted language is the subset of ASDL used to describe
// abstract syntax trees: every field must be named, and type
// declarations cannot be parameterized.
#[derive(pest_derive::Parser)]
#[grammar_inline = r#"
WHITESPACE = _{ " " | "\n" | "\r" | "\t" }
COMMENT = { "--" ~ (!"\n" ~ ANY)* }

alpha = { 'a'..'z' | 'A'..'Z' }
digit = { '0'..'9' }
alphanum = { alpha | digit | "_" }

identifier = @{ (alpha | "_") ~ alphanum* }
quantifier = @{ "*" | "?" }

MODULE = @{ "module" ~ WHITESPACE }
ATTRIBUTES = @{ "attributes" ~ !alphanum }

field = { identifier ~ quantifier? ~ identifier }
field_list = { "(" ~ (field ~ ("," ~ field)*)? ~ ")" }
attributes = { ATTRIBUTES ~ field_list }

constructor = { identifier ~ field_list? }
sum_declaration = {
    identifier ~ "=" ~
        constructor ~ ("|" ~ constructor)* ~
    attributes?
}

product_declaration = {
    identifier ~ "=" ~
        field_list ~
    attributes?
}

declaration = _{
    product_declaration |
    sum_declaration
}

grammar = {
    SOI ~
    MODULE ~ identifier ~ "{" ~
        declaration* ~
    "}" ~
    EOI
}
"#]
pub struct AsdlParser;

type Node<'i> = Pair<'i, Rule>;
type NodeIterator<'i> = Peekable<Filter<Pairs<'i, Rule>, fn(&Node<'i>) -> bool>>;
struct Context<'a> {
    file: ast::FileId,
    line_starts: &'a Vec<usize>,
}

trait Helpers<'i> {
    fn children(self) -> NodeIterator<'i>;
    fn as_loc(&self, context: &Context) -> ast::SourceRange;
    fn as_string(&self) -> String;
}

impl<'i> Helpers<'i> for Node<'i> {
    fn children(self) -> NodeIterator<'i> {
        self.into_inner().filter((|n| n.as_rule() != Rule::COMMENT) as fn(&Self) -> bool).peekable()
    }

    fn as_loc(&self, context: &Context) -> ast::SourceRange {
        let span = self.as_span();
        ast::SourceRange {
            file: context.file,
            start: ast::SourceLocation::new(span.start_pos().pos(), context.line_starts),
            end: ast::SourceLocation::new(span.end_pos().pos(), context.line_starts),
        }
    }

    fn as_string(&self) -> String {
        self.as_str().to_owned()
    }
}

fn err_unexpected_rule<T>(expected: Rule, found: Rule) -> Result<T, String> {
    Err(format!("expected rule {:?}, got {:?}", expected, found))
}

fn err_missing_rule<T>(expected: Rule) -> Result<T, String> {
    Err(format!("expected rule {:?}, got nothing", expected))
}

fn expect<'i>(iter: &mut impl Iterator<Item = Node<'i>>, rule: Rule) -> Result<Node<'i>, String> {
    match iter.next() {
        Some(node) if node.as_rule() == rule => Ok(node),
        Some(node) => err_unexpected_rule(rule, node.as_rule()),
        None => err_missing_rule(rule),
    }
}

fn maybe<'i>(iter: &mut NodeIterator<'i>, rule: Rule) -> Option<Node<'i>> {
    iter.next_if(|n| n.as_rule() == rule)
}

fn parse_identifier(iter: &mut NodeIterator<'_>) -> Result<String, String> {
    expect(iter, Rule::identifier).map(|n| n.as_string())
}

fn parse_quantifier_opt(iter: &mut NodeIterator<'_>) -> Result<Quantifier, String> {
    match maybe(iter, Rule::quantifier) {
        None => Ok(Quantifier::Required),
        Some(n) => match n.as_str() {
            "?" => Ok(Quantifier::Optional),
            "*" => Ok(Quantifier::Sequence),
            text => Err(format!("invalid quantifier '{}'", text)),
        },
    }
}

fn parse_field(node: Node<'_>, context: &Context) -> Result<ast::Field, String> {
    if node.as_rule() != Rule::field {
        err_unexpected_rule(Rule::field, node.as_rule())
    } else {
        let loc = node.as_loc(context);
        let mut children = node.children();
        let type_id = parse_identifier(&mut children)?;
        let quantifier = parse_quantifier_opt(&mut children)?;
        let id = parse_identifier(&mut children)?;
        Ok(ast::Field { loc, type_id, quantifier, id })
    }
}

fn parse_field_list(node: Node<'_>, context: &Context) -> Result<Vec<ast::Field>, String> {
    if node.as_rule() != Rule::field_list {
        err_unexpected_rule(Rule::field_list, node.as_rule())
    } else {
        node.children().map(|n| parse_field(n, context)).collect()
    }
}

fn parse_field_list_opt(
    iter: &mut NodeIterator<'_>,
    context: &Context,
) -> Result<Vec<ast::Field>, String> {
    maybe(iter, Rule::field_list).map_or(Ok(vec![]), |n| parse_field_list(n, context))
}

fn parse_attributes_opt(
    iter: &mut NodeIterator<'_>,
    context: &Context,
) -> Result<Vec<ast::Field>, String> {
    maybe(iter, Rule::attributes).map_or(Ok(vec![]), |n| {
        let mut children = n.children();
        expect(&mut children, Rule::ATTRIBUTES)?;
        expect(&mut children, Rule::field_list).and_then(|n| parse_field_list(n, context))
    })
}

fn parse_constructor(node: Node<'_>, context: &Context) -> Result<ast::Constructor, String> {
    if node.as_rule() != Rule::constructor {
        err_unexpected_rule(Rule::constructor, node.as_rule())
    } else {
        let loc = node.as_loc(context);
        let mut children = node.children();
        let id = parse_identifier(&mut children)?;
        let fields = parse_field_list_opt(&mut children, context)?;
        Ok(ast::Constructor { loc, id, fields })
    }
}

fn parse_toplevel(root: Node<'_>, context: &Context) -> Result<ast::Grammar, String> {
    let mut grammar = ast::Grammar::new(context.file);

    let mut comment_start = vec![];
    for token in root.clone().tokens() {
        match token {
            Token::Start { rule: Rule::COMMENT, pos } => comment_start.push(pos),
            Token::End { rule: Rule::COMMENT, pos } => {
                let Some(start_pos) = comment_start.pop() else {
                    return Err("unbalanced comment tokens".to_owned());
                };
                grammar.comments.push(ast::Comment {
                    loc: ast::SourceRange {
                        file: context.file,
                        start: ast::SourceLocation::new(start_pos.pos(), context.line_starts),
                        end: ast::SourceLocation::new(pos.pos(), context.line_starts),
                    },
                    text: start_pos.span(&pos).as_str().to_owned(),
                })
            }
            _ => (),
        }
    }

    let mut children = root.children();
    expect(&mut children, Rule::MODULE)?;
    grammar.module = parse_identifier(&mut children)?;

    for node in children {
        let loc = node.as_loc(context);
        let rule = node.as_rule();
        match rule {
            Rule::sum_declaration => {
                let mut children = node.children();
                let id = parse_identifier(&mut children)?;
                let mut constructors = vec![];
                while let Some(n) = maybe(&mut children, Rule::constructor) {
                    constructors.push(parse_constructor(n, context)?);
                }
                let attributes = parse_attributes_opt(&mut children, context)?;
                tracing::trace!(id = id.as_str(), constructors = constructors.len(), "sum type");
                grammar.declarations.push(ast::Decl {
                    loc,
                    desc: ast::DeclDesc::Sum { id, constructors, attributes },
                })
            }
            Rule::product_declaration => {
                let mut children = node.children();
                let id = parse_identifier(&mut children)?;
                let fields = expect(&mut children, Rule::field_list)
                    .and_then(|n| parse_field_list(n, context))?;
                let attributes = parse_attributes_opt(&mut children, context)?;
                tracing::trace!(id = id.as_str(), fields = fields.len(), "product type");
                grammar.declarations.push(ast::Decl {
                    loc,
                    desc: ast::DeclDesc::Product { id, fields, attributes },
                })
            }
            Rule::EOI => (),
            _ => return Err(format!("expected rule *_declaration, got {:?}", rule)),
        }
    }
    Ok(grammar)
}

/// Parse a grammar from a string.
///
/// The file is added to the compilation database under the provided
/// name.
pub fn parse_inline(
    sources: &mut ast::SourceDatabase,
    name: &str,
    source: String,
) -> Result<ast::Grammar, Diagnostic<ast::FileId>> {
    let root = AsdlParser::parse(Rule::grammar, &source)
        .map_err(|e| {
            Diagnostic::error()
                .with_message(format!("failed to parse input file '{}': {}", name, e))
        })?
        .next()
        .ok_or_else(|| {
            Diagnostic::error().with_message(format!("failed to parse input file '{}'", name))
        })?;
    let line_starts: Vec<_> = files::line_starts(&source).collect();
    let file = sources.add(name.to_owned(), source.clone());
    parse_toplevel(root, &Context { file, line_starts: &line_starts })
        .map_err(|e| Diagnostic::error().with_message(e))
}

/// Parse a new grammar file.
///
/// The source file is fully read and added to the compilation
/// database. Returns the constructed AST, or a descriptive error
/// message in case of syntax error.
pub fn parse_file(
    sources: &mut ast::SourceDatabase,
    name: &str,
) -> Result<ast::Grammar, Diagnostic<ast::FileId>> {
    let source = std::fs::read_to_string(name).map_err(|e| {
        Diagnostic::error().with_message(format!("failed to read input file '{}': {}", name, e))
    })?;
    parse_inline(sources, name, source)
}
