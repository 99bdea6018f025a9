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

//! JSON backend.

use crate::ast;
use crate::registry::Registry;

/// Turn the grammar AST into a JSON representation.
pub fn generate_grammar(grammar: &ast::Grammar) -> Result<String, String> {
    serde_json::to_string_pretty(&grammar)
        .map_err(|err| format!("could not JSON serialize grammar: {err}"))
}

/// Turn the node registry into a JSON representation.
pub fn generate_registry(registry: &Registry) -> Result<String, String> {
    serde_json::to_string_pretty(&registry)
        .map_err(|err| format!("could not JSON serialize registry: {err}"))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analyzer;
    use crate::parser::parse_inline;
    use crate::test_utils::assert_contains;

    const GRAMMAR: &str = r#"
    module M {
        -- binary operations
        expr = BinOp(expr left, operator op, expr right)
             | Num(int? n)
             attributes (int lineno)
        operator = Add | Sub
    }
    "#;

    #[test]
    fn test_generate_grammar() {
        let mut sources = ast::SourceDatabase::new();
        let grammar = parse_inline(&mut sources, "stdin", GRAMMAR.to_owned()).unwrap();
        let json = generate_grammar(&grammar).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["module"], "M");
        assert_eq!(value["comments"][0]["text"], "-- binary operations");
        assert_eq!(value["declarations"][0]["kind"], "sum_declaration");
        assert_eq!(value["declarations"][0]["constructors"][1]["fields"][0]["quantifier"], "optional");
        assert_contains(&json, "\"attributes\"");
    }

    #[test]
    fn test_generate_registry() {
        let mut sources = ast::SourceDatabase::new();
        let grammar = parse_inline(&mut sources, "stdin", GRAMMAR.to_owned()).unwrap();
        let registry = analyzer::analyze(&grammar).unwrap();
        let json = generate_registry(&registry).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let types = value["types"].as_array().unwrap();
        let kinds: Vec<_> = types.iter().map(|t| t["kind"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["BinOp", "Num", "Add", "Sub"]);
        assert_eq!(types[0]["fields"][1]["name"], "op");
        assert_eq!(types[1]["attributes"][0]["quantifier"], "required");
        assert!(value.get("index").is_none());
    }
}
