//! Text macros for the command line: `name(a, b, kw=default)=body`.
//!
//! A definition becomes a signature processor whose handler fills the body.
//! The body refers to parameters as `$name` or `${name}`; `$$` is a literal
//! dollar sign. Defaults may be double-quoted to include commas or
//! parentheses.

use std::fmt;
use std::iter::Peekable;
use std::rc::Rc;
use std::str::Chars;

use anyhow::{Context, Result, bail};
use itertools::Itertools;

use crate::call::{Call, Handler, handler};
use crate::signature::{Describe, ParamKind, Signature};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Value(String),
}

/// A parsed macro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    signature: Signature,
    body: Vec<Piece>,
}

/// Parse a single definition.
pub fn parse(input: &str) -> Result<Definition> {
    let mut parser = Parser {
        chars: input.chars().peekable(),
    };
    let definition = parser.parse_definition()?;
    definition.check_references()?;
    Ok(definition)
}

/// Parse one definition per line, skipping blank lines and `#` comments.
pub fn parse_file(text: &str) -> Result<Vec<Definition>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim_start();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| parse(line).with_context(|| format!("definition on line {}", i + 1)))
        .collect()
}

impl Definition {
    pub fn name(&self) -> &str {
        self.signature.name()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    fn check_references(&self) -> Result<()> {
        for piece in &self.body {
            if let Piece::Value(name) = piece
                && !self.signature.params().iter().any(|p| p.name == *name)
            {
                bail!("Syntax error: '{}' has no parameter '{name}'.", self.name());
            }
        }
        Ok(())
    }

    /// Fill the body from one call.
    pub fn render(&self, call: &Call<'_>) -> Result<String> {
        let mut output = String::new();
        for piece in &self.body {
            match piece {
                Piece::Text(text) => output.push_str(text),
                Piece::Value(name) => output.push_str(self.value(call, name)),
            }
        }
        Ok(output)
    }

    fn value<'a>(&self, call: &Call<'a>, name: &str) -> &'a str {
        let value = match self.signature.required_names().position(|n| n == name) {
            Some(index) => call.arg(index),
            None => call.get(name),
        };
        value.unwrap_or_default()
    }

    /// A handler that renders this definition.
    pub fn handler(&self) -> Handler {
        let definition = Rc::new(self.clone());
        handler(move |call| definition.render(call))
    }
}

impl Describe for Definition {
    fn describe(&self) -> Signature {
        self.signature.clone()
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .signature
            .params()
            .iter()
            .map(|p| match &p.kind {
                ParamKind::Optional(Some(default)) => format!("{}={default:?}", p.name),
                ParamKind::Optional(None) => format!("{}=", p.name),
                _ => p.name.clone(),
            })
            .join(", ");
        write!(f, "{}({params})=", self.name())?;
        for piece in &self.body {
            match piece {
                Piece::Text(text) => f.write_str(&text.replace('$', "$$"))?,
                Piece::Value(name) => write!(f, "${{{name}}}")?,
            }
        }
        Ok(())
    }
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Parser<'_> {
    fn parse_definition(&mut self) -> Result<Definition> {
        self.skip_whitespace();
        let name = self.parse_identifier();
        if name.is_empty() {
            bail!("Syntax error: expected a macro name.");
        }
        let mut signature = Signature::new(name);

        self.skip_whitespace();
        if self.chars.peek() == Some(&'(') {
            self.chars.next();
            signature = self.parse_params(signature)?;
        }

        self.skip_whitespace();
        match self.chars.next() {
            Some('=') => {}
            _ => bail!("Syntax error: expected '=' before the body of '{}'.", signature.name()),
        }

        let body = self.parse_body()?;
        Ok(Definition { signature, body })
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn parse_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.chars.next_if(|c| c.is_alphanumeric() || *c == '_') {
            ident.push(c);
        }
        ident
    }

    /// Parameters after `(`, up to and including `)`.
    fn parse_params(&mut self, mut signature: Signature) -> Result<Signature> {
        loop {
            self.skip_whitespace();
            if self.chars.next_if_eq(&')').is_some() {
                return Ok(signature);
            }
            let name = self.parse_identifier();
            if name.is_empty() {
                bail!("Syntax error: expected a parameter name in '{}'.", signature.name());
            }

            self.skip_whitespace();
            signature = if self.chars.next_if_eq(&'=').is_some() {
                self.skip_whitespace();
                match self.parse_default()? {
                    Some(default) => signature.optional(name, default),
                    None => signature.keyword(name),
                }
            } else {
                signature.required(name)
            };

            self.skip_whitespace();
            match self.chars.next() {
                Some(',') => {}
                Some(')') => return Ok(signature),
                _ => bail!("Syntax error: unclosed parameter list in '{}'.", signature.name()),
            }
        }
    }

    /// A default value; an empty unquoted default means none at all.
    fn parse_default(&mut self) -> Result<Option<String>> {
        if self.chars.next_if_eq(&'"').is_some() {
            let mut value = String::new();
            loop {
                match self.chars.next() {
                    Some('"') => return Ok(Some(value)),
                    Some('\\') => match self.chars.next() {
                        Some(c) => value.push(c),
                        None => bail!("Syntax error: unterminated string."),
                    },
                    Some(c) => value.push(c),
                    None => bail!("Syntax error: unterminated string."),
                }
            }
        }

        let mut value = String::new();
        while let Some(c) = self.chars.next_if(|c| *c != ',' && *c != ')') {
            value.push(c);
        }
        let value = value.trim_end();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }

    fn parse_body(&mut self) -> Result<Vec<Piece>> {
        let mut pieces = Vec::new();
        let mut text = String::new();
        while let Some(c) = self.chars.next() {
            if c != '$' {
                text.push(c);
                continue;
            }
            let name = match self.chars.peek() {
                Some('$') => {
                    self.chars.next();
                    text.push('$');
                    continue;
                }
                Some('{') => {
                    self.chars.next();
                    let name = self.parse_identifier();
                    if self.chars.next() != Some('}') {
                        bail!("Syntax error: unclosed '${{' in body.");
                    }
                    name
                }
                _ => self.parse_identifier(),
            };
            if name.is_empty() {
                bail!("Syntax error: '$' must be followed by a parameter name or '$'.");
            }
            if !text.is_empty() {
                pieces.push(Piece::Text(std::mem::take(&mut text)));
            }
            pieces.push(Piece::Value(name));
        }
        if !text.is_empty() {
            pieces.push(Piece::Text(text));
        }
        Ok(pieces)
    }
}
