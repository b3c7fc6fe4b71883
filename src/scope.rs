//! Scopes own a configuration, its memoized grammar and a registry of
//! processors, and resolve delimited shorthand collectively.
//!
//! Resolution is depth first: the innermost span is rewritten by the first
//! registered processor that changes it, spliced back into the text, and
//! the whole text is searched again. Output containing more shorthand is
//! therefore resolved before the spans that follow it.
//!
//! Termination is the caller's responsibility. A handler that re-emits the
//! span it was asked to resolve loops forever; one that returns its input
//! unchanged is reported as [`Error::UnknownShorthand`].

use std::ops::Range;
use std::rc::Rc;

use log::{error, trace, warn};

use crate::call::{Handler, Passthrough};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::grammar::Grammar;
use crate::processor::Processor;
use crate::signature::Describe;


/// Configuration, grammar and registry of one shorthand dialect.
#[derive(Debug)]
pub struct Scope {
    config: Config,
    grammar: Grammar,
    registry: Vec<Rc<Processor>>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::with_checked(Config::default())
    }
}

impl Scope {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_checked(config))
    }

    fn with_checked(config: Config) -> Self {
        Self {
            grammar: Grammar::new(&config),
            config,
            registry: Vec::new(),
        }
    }

    /// An independent scope whose configuration is this one's, adjusted.
    ///
    /// The variant starts with an empty registry and an empty cache.
    pub fn variant(&self, adjust: impl FnOnce(Config) -> Config) -> Result<Self> {
        Self::new(adjust(self.config.clone()))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Registered processors in precedence order.
    pub fn processors(&self) -> &[Rc<Processor>] {
        &self.registry
    }

    /// Append `processor` to the registry.
    pub fn register(&mut self, processor: Processor) -> Rc<Processor> {
        let processor = Rc::new(processor);
        self.registry.push(Rc::clone(&processor));
        processor
    }

    /// Register `sub_pattern` between this scope's delimiters.
    pub fn shorthand(&mut self, sub_pattern: &str, handler: Handler) -> Result<Rc<Processor>> {
        let processor = Processor::delimited(sub_pattern, &self.config, handler)?;
        Ok(self.register(processor))
    }

    /// Register a two-way processor shaped like a call to `describe`.
    pub fn signature(&mut self, describe: &impl Describe, handler: Handler) -> Result<Rc<Processor>> {
        let processor = Processor::signature(&describe.describe(), &self.config, &self.grammar, handler)?;
        Ok(self.register(processor))
    }

    /// Like [`Scope::signature`], but hands the handler back for direct use.
    pub fn decorate(&mut self, describe: &impl Describe, handler: Handler) -> Result<Handler> {
        self.signature(describe, Rc::clone(&handler))?;
        Ok(handler)
    }

    /// Register a switchboard handler for any delimited content.
    ///
    /// The handler gets the tokenized content; its first positional value
    /// is the shorthand name.
    pub fn catch_all(&mut self, handler: Handler) -> Result<Rc<Processor>> {
        let processor = Processor::catch_all(&self.config, &self.grammar, handler)?;
        Ok(self.register(processor))
    }

    /// Forget every registered processor.
    pub fn clear(&mut self) {
        self.registry.clear();
    }

    /// Forget memoized grammar derivations.
    pub fn clear_cache(&mut self) {
        self.grammar.clear();
    }

    /// Apply registered processors to `subject` until none changes it.
    ///
    /// After each productive processor the scan restarts from the top of
    /// the registry.
    pub fn apply_registry(&self, subject: &str, passthrough: &Passthrough) -> Result<String> {
        let mut text = subject.to_string();
        'scan: loop {
            for processor in &self.registry {
                let (rewritten, hits) = processor.subn(&text, passthrough)?;
                if is_productive(&text, &rewritten, hits) {
                    text = rewritten;
                    continue 'scan;
                }
            }
            return Ok(text);
        }
    }

    /// Resolve `text` with default options.
    pub fn resolve(&self, text: &str) -> Result<String> {
        self.collective_sub(text, true, &Passthrough::new())
    }

    /// Resolve every delimited span in `text`, innermost first.
    ///
    /// With `safe`, an active delimiter left over afterwards is reported as
    /// [`Error::OpenShorthand`].
    pub fn collective_sub(&self, text: &str, safe: bool, passthrough: &Passthrough) -> Result<String> {
        let cooked = self.resolve_innermost(text.to_string(), passthrough)?;
        if safe && let Some(leftover) = self.grammar.leftover(&cooked)? {
            error!("open (unbalanced) shorthand expression resulting from \"{text}\"");
            error!("open (unbalanced) shorthand expression in \"{cooked}\"");
            return Err(Error::OpenShorthand {
                found: leftover.found,
                missing: leftover.missing,
            });
        }
        Ok(cooked)
    }

    fn resolve_innermost(&self, mut text: String, passthrough: &Passthrough) -> Result<String> {
        while let Some(range) = self.grammar.find_target(&text)? {
            let span = &text[range.clone()];
            let output = self.apply_registry(span, passthrough)?;
            if output == span {
                warn!("giving up after applying the following patterns:");
                for processor in &self.registry {
                    warn!("{}", processor.pattern().as_str());
                }
                return Err(Error::UnknownShorthand(span.to_string()));
            }
            trace!("rewrote '{span}' as '{output}'");
            text = splice(&text, range, &output);
        }
        Ok(text)
    }
}

/// Whether a replacement pass that made `hits` replacements changed anything.
pub(crate) fn is_productive(before: &str, after: &str, hits: usize) -> bool {
    hits > 0 && before != after
}

/// `text` with `range` replaced by `replacement`.
pub(crate) fn splice(text: &str, range: Range<usize>, replacement: &str) -> String {
    let mut spliced = String::with_capacity(text.len() - range.len() + replacement.len());
    spliced.push_str(&text[..range.start]);
    spliced.push_str(replacement);
    spliced.push_str(&text[range.end..]);
    spliced
}
