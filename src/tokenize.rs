//! Flattened argument strings such as `name|a|b|k=v`.

use fancy_regex::Regex;

use crate::config::Config;
use crate::error::Result;
use crate::grammar::Grammar;
use crate::pattern::compile;

/// Positional and keyword values split out of one span's content.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Tokens<'a> {
    pub positional: Vec<&'a str>,
    pub named: Vec<(&'a str, &'a str)>,
}

/// Splits on active separators, then each element at its first active
/// assignment operator.
#[derive(Debug)]
pub(crate) struct Tokenizer {
    separator: Regex,
    operator: Regex,
}

impl Tokenizer {
    pub(crate) fn new(config: &Config, grammar: &Grammar) -> Result<Self> {
        Ok(Self {
            separator: compile(&grammar.active(&config.separator), config.flags)?,
            operator: compile(&grammar.active(&config.assignment_operator), config.flags)?,
        })
    }

    pub(crate) fn split<'a>(&self, content: &'a str) -> Result<Tokens<'a>> {
        let mut tokens = Tokens::default();
        let mut start = 0;
        for m in self.separator.find_iter(content) {
            let m = m?;
            self.push(&mut tokens, &content[start..m.start()])?;
            start = m.end();
        }
        self.push(&mut tokens, &content[start..])?;
        Ok(tokens)
    }

    fn push<'a>(&self, tokens: &mut Tokens<'a>, element: &'a str) -> Result<()> {
        match self.operator.find(element)? {
            Some(m) => tokens.named.push((&element[..m.start()], &element[m.end()..])),
            None => tokens.positional.push(element),
        }
        Ok(())
    }
}
