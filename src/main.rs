use std::fs;
use std::io::{self, Read};
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;

use shorthand::definition::{self, Definition};
use shorthand::{Config, Flags, Passthrough, Processor, Scope};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to resolve; standard input if absent
    #[arg(value_name = "FILE")]
    file: Option<String>,

    /// Macro definition, e.g. 'em(text, level=1)=<em$level>$text</em$level>'
    #[arg(short = 'D', long = "define", value_name = "DEFINITION")]
    define: Vec<String>,

    /// File of macro definitions, one per line
    #[arg(long, value_name = "FILE")]
    definitions: Vec<String>,

    /// Value passed to every macro without appearing in the text
    #[arg(short = 'P', long = "pass", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pass: Vec<(String, String)>,

    /// Opening delimiter
    #[arg(long, value_name = "TEXT")]
    lead_in: Option<String>,

    /// Closing delimiter
    #[arg(long, value_name = "TEXT")]
    lead_out: Option<String>,

    /// Escape token; empty to disable escaping
    #[arg(long, value_name = "TEXT")]
    escape: Option<String>,

    /// Argument separator
    #[arg(long, value_name = "TEXT")]
    separator: Option<String>,

    /// Assignment operator for named arguments
    #[arg(long = "assign", value_name = "TEXT")]
    assignment_operator: Option<String>,

    /// Pattern flags: any of i, m, s, x
    #[arg(long, value_name = "LETTERS")]
    flags: Option<String>,

    /// Do not fail on unbalanced delimiters
    #[arg(long = "unsafe")]
    skip_leftover_check: bool,

    /// Print markup for macro NAME with the given values instead of resolving
    #[arg(long, value_name = "NAME", num_args = 1.., allow_hyphen_values = true)]
    produce: Vec<String>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

fn config(args: &Args) -> Result<Config> {
    let mut config = Config::default();
    if let Some(lead_in) = &args.lead_in {
        config = config.with_lead_in(lead_in);
    }
    if let Some(lead_out) = &args.lead_out {
        config = config.with_lead_out(lead_out);
    }
    if let Some(escape) = &args.escape {
        config = config.with_escape(escape);
    }
    if let Some(separator) = &args.separator {
        config = config.with_separator(separator);
    }
    if let Some(operator) = &args.assignment_operator {
        config = config.with_assignment_operator(operator);
    }
    if let Some(letters) = &args.flags {
        config = config.with_flags(Flags::from_letters(letters)?);
    }
    Ok(config)
}

fn load_definitions(args: &Args) -> Result<Vec<Definition>> {
    let mut definitions = Vec::new();
    for path in &args.definitions {
        let text = fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
        definitions.extend(definition::parse_file(&text).with_context(|| format!("In {path}"))?);
    }
    for source in &args.define {
        definitions.push(definition::parse(source).with_context(|| format!("In -D '{source}'"))?);
    }
    Ok(definitions)
}

fn produce(macros: &[(Definition, Rc<Processor>)], request: &[String]) -> Result<String> {
    let Some((name, values)) = request.split_first() else {
        bail!("--produce needs a macro name.");
    };
    let Some((definition, processor)) = macros.iter().rev().find(|(d, _)| d.name() == name) else {
        bail!("No macro named '{name}'.");
    };

    let mut positional = Vec::new();
    let mut named = Vec::new();
    for value in values {
        match value.split_once('=') {
            Some((key, v)) if definition.signature().optional_names().any(|n| n == key) => {
                named.push((key, v));
            }
            _ => positional.push(value.as_str()),
        }
    }
    Ok(processor.produce(&positional, &named)?)
}

fn read_input(file: Option<&str>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path).with_context(|| format!("Failed to read {path}")),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut scope = Scope::new(config(&args)?)?;
    let mut macros = Vec::new();
    for definition in load_definitions(&args)? {
        let processor = scope.signature(&definition, definition.handler())?;
        info!("defined {definition}");
        macros.push((definition, processor));
    }

    if !args.produce.is_empty() {
        println!("{}", produce(&macros, &args.produce)?);
        return Ok(());
    }

    let input = read_input(args.file.as_deref())?;
    let passthrough = args
        .pass
        .iter()
        .fold(Passthrough::new(), |pt, (k, v)| pt.with(k, v));
    let output = scope.collective_sub(&input, !args.skip_leftover_check, &passthrough)?;
    print!("{output}");
    Ok(())
}
