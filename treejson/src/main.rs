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

//! Syntax tree to JSON converter.

use argh::FromArgs;
use codespan_reporting::term::termcolor;
use std::io::Read;
use tracing_subscriber::EnvFilter;

use treejson::{analyzer, ast, backends, dump, grammars, parser, registry, serializer};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Tree,
    Grammar,
    Registry,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "tree" => Ok(Self::Tree),
            "grammar" => Ok(Self::Grammar),
            "registry" => Ok(Self::Registry),
            _ => Err(format!(
                "could not parse {input:?}, valid option are 'tree', 'grammar', 'registry'."
            )),
        }
    }
}

#[derive(FromArgs, Debug)]
/// Convert Python syntax tree dumps to JSON.
struct Opt {
    #[argh(switch)]
    /// print tool version and exit.
    version: bool,

    #[argh(option)]
    /// abstract grammar declaring the node kinds.
    /// Defaults to the Python 3.12 grammar.
    grammar: Option<String>,

    #[argh(option, default = "OutputFormat::Tree")]
    /// generate output in this format ("tree", "grammar", "registry").
    /// The output will be printed on stdout in all cases.
    output_format: OutputFormat,

    #[argh(switch)]
    /// indent the JSON output.
    pretty: bool,

    #[argh(switch)]
    /// emit node attributes (source positions) after the fields.
    include_attributes: bool,

    #[argh(option, default = "serializer::DEFAULT_DISCRIMINATOR.to_owned()")]
    /// key of the entry holding the node kind.
    discriminator: String,

    #[argh(option, default = "serializer::DEFAULT_MAX_DEPTH")]
    /// maximum nesting of nodes and sequences.
    max_depth: usize,

    #[argh(positional)]
    /// input file containing the output of Python's `ast.dump`,
    /// or '-' for the standard input.
    input_file: Option<String>,
}

/// Print diagnostics on stderr and return `message` as error.
fn report(sources: &ast::SourceDatabase, diagnostics: &analyzer::Diagnostics, message: &str) -> String {
    let writer = termcolor::StandardStream::stderr(termcolor::ColorChoice::Auto);
    let result = match diagnostics.emit(sources, &mut writer.lock()) {
        Ok(()) => message.to_owned(),
        Err(err) => format!("{message} (could not print diagnostics: {err})"),
    };
    result
}

fn load_grammar(
    opt: &Opt,
    sources: &mut ast::SourceDatabase,
) -> Result<(ast::Grammar, registry::Registry), String> {
    let grammar = match &opt.grammar {
        Some(path) => parser::parse_file(sources, path),
        None => parser::parse_inline(sources, "python.asdl", grammars::PYTHON.to_owned()),
    }
    .map_err(|err| report(sources, &err.into(), "Error while parsing grammar"))?;
    let registry = analyzer::analyze(&grammar)
        .map_err(|diagnostics| report(sources, &diagnostics, "Analysis failed"))?;
    Ok((grammar, registry))
}

fn convert(
    opt: &Opt,
    sources: &mut ast::SourceDatabase,
    registry: &registry::Registry,
) -> Result<String, String> {
    let Some(input_file) = opt.input_file.as_ref() else {
        return Err("No input file is specified".to_owned());
    };

    let tree = if input_file == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|err| format!("failed to read the standard input: {err}"))?;
        dump::parse_inline(sources, registry, "<stdin>", text)
    } else {
        dump::parse_file(sources, registry, input_file)
    }
    .map_err(|err| report(sources, &err.into(), "Error while parsing input"))?;

    let options = serializer::Options {
        discriminator: opt.discriminator.clone(),
        include_attributes: opt.include_attributes,
        max_depth: opt.max_depth,
    };
    let serializer = serializer::Serializer::new(registry, options).map_err(|err| err.to_string())?;
    let json = if opt.pretty { serializer.to_string_pretty(&tree) } else { serializer.to_string(&tree) };
    json.map_err(|err| {
        tracing::debug!(?err, "serialization failed");
        err.to_string()
    })
}

fn main() -> Result<(), String> {
    let opt: Opt = argh::from_env();

    if opt.version {
        println!("treejson {}\nCopyright (C) 2023 Google LLC", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TREEJSON_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut sources = ast::SourceDatabase::new();
    let (grammar, registry) = load_grammar(&opt, &mut sources)?;

    match opt.output_format {
        OutputFormat::Tree => println!("{}", convert(&opt, &mut sources, &registry)?),
        OutputFormat::Grammar => println!("{}", backends::json::generate_grammar(&grammar)?),
        OutputFormat::Registry => println!("{}", backends::json::generate_registry(&registry)?),
    }

    Ok(())
}
