//! Production templates: turning a pattern back into matching text.
//!
//! A pattern is everted by walking its source once. Capture groups become
//! placeholders, each remembering its own sub-pattern so that a proposed
//! value can be checked before it is substituted. Everything else is copied
//! as literal text, with escaped punctuation unescaped (`\{` becomes `{`).
//!
//! Nested capture groups are not supported.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use fancy_regex::Regex;

use crate::config::Flags;
use crate::error::{Error, Result};

use super::compile_full;

/// A placeholder's sub-pattern, compiled for whole-value matching.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    source: String,
    regex: Regex,
}

impl Slot {
    pub(crate) fn new(source: &str, flags: Flags) -> Result<Self> {
        Ok(Self {
            source: source.to_string(),
            regex: compile_full(source, flags)?,
        })
    }

    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    /// Fail unless `value` would be captured whole by this slot.
    pub(crate) fn check(&self, group: impl fmt::Display, value: &str) -> Result<()> {
        if self.regex.is_match(value)? {
            Ok(())
        } else {
            Err(Error::production(
                group,
                format!("proposed content '{value}' does not match '{}'", self.source),
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Unnamed(usize),
    Named(String),
}

/// Text with placeholders for the capture groups of a pattern.
#[derive(Debug, Clone)]
pub struct Template {
    pieces: Vec<Piece>,
    unnamed: Vec<Slot>,
    named: Vec<(String, Slot)>,
}

impl Template {
    /// Evert the pattern `source`.
    pub fn evert(source: &str, flags: Flags) -> Result<Self> {
        Everter {
            source,
            chars: source.chars().peekable(),
            flags,
            literal: String::new(),
            template: Template {
                pieces: Vec::new(),
                unnamed: Vec::new(),
                named: Vec::new(),
            },
        }
        .run()
    }

    /// Sub-patterns of the unnamed groups, in order.
    pub fn unnamed_patterns(&self) -> impl Iterator<Item = &str> {
        self.unnamed.iter().map(Slot::source)
    }

    /// Names and sub-patterns of the named groups, in order.
    pub fn named_patterns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.named.iter().map(|(name, slot)| (name.as_str(), slot.source()))
    }

    /// Fill every placeholder.
    ///
    /// Each unnamed group takes one positional value and each named group
    /// exactly one named value; every value must fully match its group.
    pub fn produce(&self, positional: &[&str], named: &[(&str, &str)]) -> Result<String> {
        if positional.len() != self.unnamed.len() {
            return Err(Error::production(
                "positional",
                format!("expected {} values, got {}", self.unnamed.len(), positional.len()),
            ));
        }
        for (i, (value, slot)) in positional.iter().zip(&self.unnamed).enumerate() {
            slot.check(i, value)?;
        }

        for (name, value) in named {
            let Some((_, slot)) = self.named.iter().find(|(n, _)| n == *name) else {
                return Err(Error::production(name, "no such group"));
            };
            slot.check(name, value)?;
        }

        let mut output = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => output.push_str(text),
                Piece::Unnamed(i) => output.push_str(positional[*i]),
                Piece::Named(name) => {
                    let value = named
                        .iter()
                        .rev()
                        .find(|(n, _)| *n == name.as_str())
                        .map(|(_, v)| *v)
                        .ok_or_else(|| Error::production(name, "no value supplied"))?;
                    output.push_str(value);
                }
            }
        }
        Ok(output)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => f.write_str(text)?,
                Piece::Unnamed(_) => f.write_str("{}")?,
                Piece::Named(name) => write!(f, "{{{name}}}")?,
            }
        }
        Ok(())
    }
}

struct Everter<'a> {
    source: &'a str,
    chars: Peekable<Chars<'a>>,
    flags: Flags,
    literal: String,
    template: Template,
}

impl Everter<'_> {
    fn run(mut self) -> Result<Template> {
        while let Some(ch) = self.chars.next() {
            match ch {
                '\\' => match self.chars.next() {
                    Some(c) if c.is_ascii_punctuation() => self.literal.push(c),
                    Some(c) => {
                        self.literal.push('\\');
                        self.literal.push(c);
                    }
                    None => self.literal.push('\\'),
                },
                '[' => {
                    let mut class = String::new();
                    self.copy_class(&mut class)?;
                    self.literal.push_str(&class);
                }
                '(' => self.open_group()?,
                _ => self.literal.push(ch),
            }
        }
        self.flush();
        Ok(self.template)
    }

    fn flush(&mut self) {
        if !self.literal.is_empty() {
            let text = std::mem::take(&mut self.literal);
            self.template.pieces.push(Piece::Literal(text));
        }
    }

    /// Handle the text after an opening parenthesis at top level.
    fn open_group(&mut self) -> Result<()> {
        if self.chars.peek() != Some(&'?') {
            let content = self.group_content()?;
            self.flush();
            let index = self.template.unnamed.len();
            self.template.unnamed.push(Slot::new(&content, self.flags)?);
            self.template.pieces.push(Piece::Unnamed(index));
            return Ok(());
        }

        self.chars.next(); // consume '?'
        match self.group_name()? {
            Some(name) => {
                let content = self.group_content()?;
                self.flush();
                let slot = Slot::new(&content, self.flags)?;
                self.template.named.push((name.clone(), slot));
                self.template.pieces.push(Piece::Named(name));
            }
            // Outside a capture only literal text can be reproduced.
            None => {
                return Err(Error::invalid_pattern(
                    self.source,
                    "only capture groups can be reversed",
                ));
            }
        }
        Ok(())
    }

    /// After `(?`, consume `P<name>` or `<name>` and return the name.
    fn group_name(&mut self) -> Result<Option<String>> {
        let mut lookahead = self.chars.clone();
        match lookahead.next() {
            Some('P') if lookahead.next() == Some('<') => {
                self.chars.next();
                self.chars.next();
            }
            Some('<') if !matches!(lookahead.next(), Some('=') | Some('!')) => {
                self.chars.next();
            }
            _ => return Ok(None),
        }

        let mut name = String::new();
        loop {
            match self.chars.next() {
                Some('>') => return Ok(Some(name)),
                Some(c) => name.push(c),
                None => return Err(Error::invalid_pattern(self.source, "unclosed group name")),
            }
        }
    }

    /// Collect a capture group's content up to its closing parenthesis.
    fn group_content(&mut self) -> Result<String> {
        let mut content = String::new();
        let mut depth = 1usize;
        loop {
            let Some(ch) = self.chars.next() else {
                return Err(Error::invalid_pattern(self.source, "unclosed group"));
            };
            match ch {
                '\\' => {
                    content.push('\\');
                    if let Some(c) = self.chars.next() {
                        content.push(c);
                    }
                }
                '[' => self.copy_class(&mut content)?,
                '(' => {
                    if self.chars.peek() != Some(&'?') || self.starts_named_group() {
                        return Err(Error::invalid_pattern(
                            self.source,
                            "nested capture groups cannot be reversed",
                        ));
                    }
                    depth += 1;
                    content.push('(');
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(content);
                    }
                    content.push(')');
                }
                _ => content.push(ch),
            }
        }
    }

    /// With `?` peeked after `(`, does a named group start here?
    fn starts_named_group(&self) -> bool {
        let mut lookahead = self.chars.clone();
        lookahead.next();
        match lookahead.next() {
            Some('P') => lookahead.next() == Some('<'),
            Some('<') => !matches!(lookahead.next(), Some('=') | Some('!')),
            _ => false,
        }
    }

    /// Copy a bracketed character class verbatim; `[` is already consumed.
    fn copy_class(&mut self, out: &mut String) -> Result<()> {
        out.push('[');
        if self.chars.peek() == Some(&'^') {
            out.push('^');
            self.chars.next();
        }
        if self.chars.peek() == Some(&']') {
            out.push(']');
            self.chars.next();
        }
        loop {
            match self.chars.next() {
                Some('\\') => {
                    out.push('\\');
                    if let Some(c) = self.chars.next() {
                        out.push(c);
                    }
                }
                Some(']') => {
                    out.push(']');
                    return Ok(());
                }
                Some(c) => out.push(c),
                None => return Err(Error::invalid_pattern(self.source, "unclosed character class")),
            }
        }
    }
}
