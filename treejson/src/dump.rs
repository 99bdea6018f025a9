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

//! Reader for the textual dump of Python syntax trees.
//!
//! Accepts the output of `ast.dump(tree)`, with or without
//! `annotate_fields` and `include_attributes`, and with any `indent`.

use crate::ast::{FileId, SourceDatabase};
use crate::registry::Registry;
use crate::tree::{Node, Opaque, Value};
use codespan_reporting::diagnostic::{Diagnostic, Label};
use pest::error::InputLocation;
use pest::iterators::Pair;
use pest::Parser;

/// Maximum bracket nesting accepted in a dump.
pub const MAX_NESTING: usize = 512;

#[derive(pest_derive::Parser)]
#[grammar_inline = r#"
WHITESPACE = _{ " " | "\n" | "\r" | "\t" }

ident_char = _{ ASCII_ALPHANUMERIC | "_" }
identifier = @{ (ASCII_ALPHA | "_") ~ ident_char* }

none_literal = @{ "None" ~ !ident_char }
true_literal = @{ "True" ~ !ident_char }
false_literal = @{ "False" ~ !ident_char }
ellipsis_literal = @{ "Ellipsis" ~ !ident_char }

exponent = _{ ("e" | "E") ~ ("+" | "-")? ~ ASCII_DIGIT+ }
decimal = _{
    ASCII_DIGIT+ ~ "." ~ ASCII_DIGIT* ~ exponent? |
    "." ~ ASCII_DIGIT+ ~ exponent? |
    ASCII_DIGIT+ ~ exponent
}
special = _{ "inf" | "nan" }
real = _{ decimal | ASCII_DIGIT+ | special }
imaginary = _{ real ~ ("j" | "J") }

complex = @{
    "-"? ~ imaginary ~ !ident_char |
    "(" ~ "-"? ~ real ~ ("+" | "-") ~ imaginary ~ ")"
}
float = @{ "-"? ~ (decimal | special) ~ !ident_char }
integer = @{ "-"? ~ ASCII_DIGIT+ ~ !ident_char }

quoted = _{
    "'" ~ ("\\" ~ ANY | !"'" ~ ANY)* ~ "'" |
    "\"" ~ ("\\" ~ ANY | !"\"" ~ ANY)* ~ "\""
}
string = @{ quoted }
bytes = @{ "b" ~ quoted }

keyword = { identifier ~ "=" ~ value }
node = { identifier ~ "(" ~ ((keyword | value) ~ ("," ~ (keyword | value))* ~ ","?)? ~ ")" }
list = { "[" ~ (value ~ ("," ~ value)* ~ ","?)? ~ "]" }
tuple = { "(" ~ (value ~ ("," ~ value)* ~ ","?)? ~ ")" }

value = _{
    bytes |
    string |
    complex |
    float |
    integer |
    none_literal |
    true_literal |
    false_literal |
    ellipsis_literal |
    node |
    list |
    tuple
}

dump = { SOI ~ value ~ EOI }
"#]
pub struct DumpParser;

struct Context<'r> {
    file: FileId,
    registry: &'r Registry,
}

impl Context<'_> {
    fn error(&self, pair: &Pair<'_, Rule>, message: String) -> Diagnostic<FileId> {
        let span = pair.as_span();
        Diagnostic::error()
            .with_message(message)
            .with_labels(vec![Label::primary(self.file, span.start()..span.end())])
    }
}

/// Compute the bracket nesting of a dump, ignoring quoted text.
fn nesting_depth(text: &str) -> usize {
    let mut depth: usize = 0;
    let mut max_depth = 0;
    let mut quote = None;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(_), '\\') => {
                chars.next();
            }
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => (),
            (None, '\'' | '"') => quote = Some(c),
            (None, '(' | '[') => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, _) => (),
        }
    }
    max_depth
}

fn hex_escape(chars: &mut std::str::Chars<'_>, len: usize) -> Result<char, String> {
    let digits: String = chars.take(len).collect();
    if digits.len() != len {
        return Err(format!("truncated escape sequence '{}'", digits));
    }
    let code = u32::from_str_radix(&digits, 16)
        .map_err(|_| format!("invalid escape sequence '{}'", digits))?;
    char::from_u32(code).ok_or_else(|| format!("escape sequence '{}' is not a valid character", digits))
}

/// Decode the escape sequences of a Python string literal body.
fn unescape(body: &str) -> Result<String, String> {
    let mut output = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => output.push('\\'),
            Some('\'') => output.push('\''),
            Some('"') => output.push('"'),
            Some('n') => output.push('\n'),
            Some('r') => output.push('\r'),
            Some('t') => output.push('\t'),
            Some('a') => output.push('\x07'),
            Some('b') => output.push('\x08'),
            Some('f') => output.push('\x0c'),
            Some('v') => output.push('\x0b'),
            Some('x') => output.push(hex_escape(&mut chars, 2)?),
            Some('u') => output.push(hex_escape(&mut chars, 4)?),
            Some('U') => output.push(hex_escape(&mut chars, 8)?),
            Some(d @ '0'..='7') => {
                let mut code = d as u32 - '0' as u32;
                for _ in 0..2 {
                    match chars.clone().next() {
                        Some(d @ '0'..='7') => {
                            code = code * 8 + (d as u32 - '0' as u32);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                output.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            Some('\n') => (),
            Some(c) => {
                output.push('\\');
                output.push(c);
            }
            None => return Err("trailing backslash in string literal".to_owned()),
        }
    }
    Ok(output)
}

fn parse_integer(pair: &Pair<'_, Rule>, context: &Context) -> Result<Value, Diagnostic<FileId>> {
    let text = pair.as_str();
    if let Ok(value) = text.parse::<i64>() {
        Ok(Value::from(value))
    } else if let Ok(value) = text.parse::<u64>() {
        Ok(Value::from(value))
    } else {
        Err(context.error(pair, format!("integer literal {} is out of the 64-bit range", text)))
    }
}

fn parse_node(pair: Pair<'_, Rule>, context: &Context) -> Result<Value, Diagnostic<FileId>> {
    let mut children = pair.clone().into_inner();
    let kind = match children.next() {
        Some(identifier) if identifier.as_rule() == Rule::identifier => identifier.as_str(),
        _ => return Err(context.error(&pair, "expected node kind".to_owned())),
    };
    let node_type = context.registry.get(kind);
    let mut node = Node::new(kind);
    let mut position = 0;
    let mut keywords = false;

    for child in children {
        let (name, value) = if child.as_rule() == Rule::keyword {
            keywords = true;
            let mut inner = child.clone().into_inner();
            let (Some(name), Some(value)) = (inner.next(), inner.next()) else {
                return Err(context.error(&child, "malformed keyword argument".to_owned()));
            };
            (name.as_str(), parse_value(value, context)?)
        } else {
            if keywords {
                return Err(
                    context.error(&child, "positional argument follows keyword argument".to_owned())
                );
            }
            let Some(node_type) = node_type else {
                return Err(context.error(
                    &child,
                    format!("positional argument for undeclared node kind `{}`", kind),
                ));
            };
            let Some(spec) = node_type.iter_all().nth(position) else {
                return Err(context.error(
                    &child,
                    format!(
                        "too many positional arguments for `{}`, expected at most {}",
                        kind,
                        node_type.iter_all().count()
                    ),
                ));
            };
            position += 1;
            (spec.name.as_str(), parse_value(child.clone(), context)?)
        };
        if node.insert(name, value).is_some() {
            return Err(context.error(
                &child,
                format!("field `{}` of `{}` is given more than once", name, kind),
            ));
        }
    }

    Ok(Value::Node(node))
}

fn parse_value(pair: Pair<'_, Rule>, context: &Context) -> Result<Value, Diagnostic<FileId>> {
    match pair.as_rule() {
        Rule::node => parse_node(pair, context),
        Rule::list | Rule::tuple => Ok(Value::Sequence(
            pair.into_inner().map(|item| parse_value(item, context)).collect::<Result<_, _>>()?,
        )),
        Rule::none_literal => Ok(Value::null()),
        Rule::true_literal => Ok(Value::from(true)),
        Rule::false_literal => Ok(Value::from(false)),
        Rule::integer => parse_integer(&pair, context),
        Rule::float => pair
            .as_str()
            .parse::<f64>()
            .map(Value::from)
            .map_err(|err| context.error(&pair, format!("invalid float literal: {}", err))),
        Rule::string => {
            let text = pair.as_str();
            unescape(&text[1..text.len() - 1])
                .map(Value::from)
                .map_err(|err| context.error(&pair, err))
        }
        Rule::bytes => Ok(Value::from(Opaque::new("bytes", pair.as_str()))),
        Rule::complex => Ok(Value::from(Opaque::new("complex", pair.as_str()))),
        Rule::ellipsis_literal => Ok(Value::from(Opaque::new("ellipsis", pair.as_str()))),
        rule => Err(context.error(&pair, format!("unexpected rule {:?}", rule))),
    }
}

/// Read a dump from a string.
///
/// The text is added to the source database under the provided name.
/// Positional arguments are matched against the fields, then the
/// attributes, declared for the node kind in `registry`.
pub fn parse_inline(
    sources: &mut SourceDatabase,
    registry: &Registry,
    name: &str,
    text: String,
) -> Result<Value, Diagnostic<FileId>> {
    let file = sources.add(name.to_owned(), text.clone());
    let depth = nesting_depth(&text);
    if depth > MAX_NESTING {
        return Err(Diagnostic::error().with_message(format!(
            "input '{}' is nested {} levels deep, the limit is {}",
            name, depth, MAX_NESTING
        )));
    }

    let root = DumpParser::parse(Rule::dump, &text)
        .map_err(|err| {
            let range = match err.location {
                InputLocation::Pos(pos) => pos..pos,
                InputLocation::Span((start, end)) => start..end,
            };
            Diagnostic::error()
                .with_message(format!("failed to parse input file '{}'", name))
                .with_labels(vec![Label::primary(file, range).with_message(err.variant.message())])
        })?
        .next()
        .ok_or_else(|| {
            Diagnostic::error().with_message(format!("failed to parse input file '{}'", name))
        })?;

    let context = Context { file, registry };
    let Some(value) = root.clone().into_inner().next() else {
        return Err(context.error(&root, "empty dump".to_owned()));
    };
    let value = parse_value(value, &context)?;
    tracing::debug!(file = name, kind = value.type_name(), "dump parsed");
    Ok(value)
}

/// Read a dump file.
pub fn parse_file(
    sources: &mut SourceDatabase,
    registry: &Registry,
    name: &str,
) -> Result<Value, Diagnostic<FileId>> {
    let text = std::fs::read_to_string(name).map_err(|e| {
        Diagnostic::error().with_message(format!("failed to read input file '{}': {}", name, e))
    })?;
    parse_inline(sources, registry, name, text)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::grammars;
    use crate::tree::Primitive;
    use googletest::prelude::{assert_that, eq};

    fn read(text: &str) -> Result<Value, Diagnostic<FileId>> {
        let mut sources = SourceDatabase::new();
        let registry = grammars::python(&mut sources).unwrap();
        parse_inline(&mut sources, &registry, "stdin", text.to_owned())
    }

    fn constant(text: &str) -> Value {
        let value = read(text).unwrap();
        value.as_node().unwrap().get("value").unwrap().clone()
    }

    #[test]
    fn test_keyword_arguments() {
        let value = read(
            "BinOp(left=Constant(value=1), op=Add(), right=Name(id='x', ctx=Load()))",
        )
        .unwrap();
        let expected = Node::new("BinOp")
            .with("left", Node::new("Constant").with("value", 1))
            .with("op", Node::new("Add"))
            .with("right", Node::new("Name").with("id", "x").with("ctx", Node::new("Load")));
        assert_eq!(value, Value::from(expected));
    }

    #[test]
    fn test_positional_arguments() {
        let value = read("Module([Expr(BinOp(Constant(1), Add(), Constant(2)))], [])").unwrap();
        let module = value.as_node().unwrap();
        assert_eq!(module.get("type_ignores"), Some(&Value::Sequence(vec![])));
        let Some(Value::Sequence(body)) = module.get("body") else { panic!("missing body") };
        let binop = body[0].as_node().unwrap().get("value").unwrap().as_node().unwrap();
        assert_eq!(binop.kind(), "BinOp");
        assert_eq!(binop.get("right"), Some(&Value::from(Node::new("Constant").with("value", 2))));
    }

    #[test]
    fn test_positional_then_keyword_arguments() {
        let value =
            read("arguments([], [arg('a')], kwonlyargs=[], kw_defaults=[], defaults=[Constant(1)])")
                .unwrap();
        let arguments = value.as_node().unwrap();
        assert_that!(arguments.len(), eq(5));
        assert!(arguments.get("posonlyargs").is_some());
        assert!(arguments.get("vararg").is_none());
    }

    #[test]
    fn test_positional_attributes() {
        let value = read("Name('x', Load(), 1, 0, 1, 1)").unwrap();
        let name = value.as_node().unwrap();
        assert_eq!(name.get("lineno"), Some(&Value::from(1)));
        assert_eq!(name.get("col_offset"), Some(&Value::from(0)));
        assert_eq!(name.get("end_col_offset"), Some(&Value::from(1)));
    }

    #[test]
    fn test_argument_errors() {
        let err = read("Name('x', Load(), 1, 0, 1, 1, 7)").unwrap_err();
        assert_eq!(err.message, "too many positional arguments for `Name`, expected at most 6");

        let err = read("Frobnicate(1)").unwrap_err();
        assert_eq!(err.message, "positional argument for undeclared node kind `Frobnicate`");

        let err = read("Name(id='x', 'y')").unwrap_err();
        assert_eq!(err.message, "positional argument follows keyword argument");

        let err = read("Name(id='x', id='y')").unwrap_err();
        assert_eq!(err.message, "field `id` of `Name` is given more than once");

        let err = read("Name('x', id='y')").unwrap_err();
        assert_eq!(err.message, "field `id` of `Name` is given more than once");
    }

    #[test]
    fn test_undeclared_kind_with_keywords() {
        let value = read("Frobnicate(level=3)").unwrap();
        assert_eq!(value, Value::from(Node::new("Frobnicate").with("level", 3)));
    }

    #[test]
    fn test_strings() {
        assert_eq!(constant(r#"Constant(value='it\'s')"#), Value::from("it's"));
        assert_eq!(constant(r#"Constant(value="it's")"#), Value::from("it's"));
        assert_eq!(
            constant(r#"Constant(value='a\n\t\\\x41é\U0001F600\0')"#),
            Value::from("a\n\t\\A\u{e9}\u{1F600}\0")
        );
        assert_eq!(constant("Constant(value='a\u{e9}')"), Value::from("a\u{e9}"));
        assert!(read(r#"Constant(value='\ud800')"#).is_err());
    }

    #[test]
    fn test_numbers() {
        assert_eq!(constant("Constant(value=-42)"), Value::from(-42));
        assert_eq!(
            constant("Constant(value=18446744073709551615)"),
            Value::Primitive(Primitive::UInt(u64::MAX))
        );
        assert_eq!(constant("Constant(value=1.5)"), Value::from(1.5));
        assert_eq!(constant("Constant(value=1e+100)"), Value::from(1e100));
        assert_eq!(constant("Constant(value=inf)"), Value::from(f64::INFINITY));
        assert_eq!(constant("Constant(value=-inf)"), Value::from(f64::NEG_INFINITY));
        let Value::Primitive(Primitive::Float(nan)) = constant("Constant(value=nan)") else {
            panic!("expected a float")
        };
        assert!(nan.is_nan());

        let err = read("Constant(value=1000000000000000000000000000000)").unwrap_err();
        assert_eq!(
            err.message,
            "integer literal 1000000000000000000000000000000 is out of the 64-bit range"
        );
    }

    #[test]
    fn test_singletons() {
        assert_eq!(constant("Constant(value=None)"), Value::null());
        assert_eq!(constant("Constant(value=True)"), Value::from(true));
        assert_eq!(constant("Constant(value=False)"), Value::from(false));
    }

    #[test]
    fn test_opaque_values() {
        assert_eq!(
            constant("Constant(value=Ellipsis)"),
            Value::from(Opaque::new("ellipsis", "Ellipsis"))
        );
        assert_eq!(
            constant(r#"Constant(value=b'\x00')"#),
            Value::from(Opaque::new("bytes", r#"b'\x00'"#))
        );
        assert_eq!(constant("Constant(value=1j)"), Value::from(Opaque::new("complex", "1j")));
        assert_eq!(
            constant("Constant(value=(-0-1j))"),
            Value::from(Opaque::new("complex", "(-0-1j)"))
        );
    }

    #[test]
    fn test_tuples() {
        assert_eq!(
            constant("Constant(value=(1, 'a'))"),
            Value::Sequence(vec![Value::from(1), Value::from("a")])
        );
        assert_eq!(constant("Constant(value=())"), Value::Sequence(vec![]));
    }

    #[test]
    fn test_indented_dump() {
        let value = read(
            r#"
Module(
  body=[
    Expr(
      value=Name(id='y', ctx=Load()))],
  type_ignores=[])
"#,
        )
        .unwrap();
        assert_eq!(value.as_node().unwrap().kind(), "Module");
    }

    #[test]
    fn test_syntax_error() {
        let err = read("BinOp(left=").unwrap_err();
        assert_eq!(err.message, "failed to parse input file 'stdin'");
        assert_that!(err.labels.len(), eq(1));
    }

    #[test]
    fn test_nesting_limit() {
        let text = format!("{}{}", "[".repeat(MAX_NESTING + 1), "]".repeat(MAX_NESTING + 1));
        assert!(read(&text).is_err());
        assert_eq!(nesting_depth("Name(id='((', ctx=Load())"), 2);
    }

    #[test]
    fn test_parse_file() {
        let mut sources = SourceDatabase::new();
        let registry = grammars::python(&mut sources).unwrap();
        assert!(parse_file(&mut sources, &registry, "does/not/exist.dump").is_err());
    }
}
