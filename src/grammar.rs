//! Delimiter grammar: active and escaped delimiters, the target finder and
//! the leftover check.
//!
//! Everything here is a pure function of a scope's literal configuration,
//! but building it means compiling backtracking regexes, so results are
//! memoized per grammar. Fragments are keyed by operation name and argument.
//!
//! An *active* single-character delimiter is one not immediately preceded
//! by the escape token. Multi-character delimiters are always active; only
//! their fully escaped form (escape before every character) is skipped
//! inside a span.

use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::ops::Range;

use fancy_regex::Regex;

use crate::config::{Config, Flags};
use crate::error::Result;
use crate::pattern::{compile, literal};

/// Delimiter found without its partner after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leftover {
    pub found: String,
    pub missing: String,
}

/// Memoized regex derivations for one configuration.
#[derive(Debug)]
pub struct Grammar {
    lead_in: String,
    lead_out: String,
    escape: String,
    flags: Flags,
    fragments: RefCell<HashMap<(&'static str, String), String>>,
    target_finder: OnceCell<Regex>,
    active_delimiters: OnceCell<(Regex, Regex)>,
}

impl Grammar {
    pub fn new(config: &Config) -> Self {
        Self {
            lead_in: config.lead_in.clone(),
            lead_out: config.lead_out.clone(),
            escape: config.escape.clone(),
            flags: config.flags,
            fragments: RefCell::new(HashMap::new()),
            target_finder: OnceCell::new(),
            active_delimiters: OnceCell::new(),
        }
    }

    fn memoize(&self, operation: &'static str, token: &str, derive: impl FnOnce() -> String) -> String {
        let key = (operation, token.to_string());
        if let Some(cached) = self.fragments.borrow().get(&key) {
            return cached.clone();
        }
        let fragment = derive();
        self.fragments.borrow_mut().insert(key, fragment.clone());
        fragment
    }

    /// Pattern for `token` in its escaped form: the escape before every character.
    pub fn escaped(&self, token: &str) -> String {
        self.memoize("escaped", token, || {
            if self.escape.is_empty() || token.is_empty() {
                return literal(token).into_owned();
            }
            let escape = literal(&self.escape);
            token
                .chars()
                .map(|c| format!("{escape}{}", literal(c.encode_utf8(&mut [0; 4]))))
                .collect()
        })
    }

    /// Pattern for `token` where it is not suppressed by an escape.
    pub fn active(&self, token: &str) -> String {
        self.memoize("active", token, || {
            if !self.escape.is_empty() && token.chars().count() == 1 {
                format!("(?<!{}){}", literal(&self.escape), literal(token))
            } else {
                literal(token).into_owned()
            }
        })
    }

    /// The innermost-span finder.
    ///
    /// Matches the shortest `lead_in CONTENT lead_out` where CONTENT never
    /// contains an active lead-in, so nested markup is found from the inside
    /// out. CONTENT may be empty, and escaped delimiters inside it are
    /// skipped whole.
    pub fn target_finder(&self) -> Result<&Regex> {
        if let Some(regex) = self.target_finder.get() {
            return Ok(regex);
        }
        let active_in = self.active(&self.lead_in);
        let source = format!(
            "{active_in}((?:{}|{}|(?!{active_in}).)*?){}",
            self.escaped(&self.lead_in),
            self.escaped(&self.lead_out),
            self.active(&self.lead_out),
        );
        let regex = compile(&source, self.flags)?;
        Ok(self.target_finder.get_or_init(|| regex))
    }

    fn active_delimiters(&self) -> Result<&(Regex, Regex)> {
        if let Some(pair) = self.active_delimiters.get() {
            return Ok(pair);
        }
        let pair = (
            compile(&self.active(&self.lead_in), self.flags)?,
            compile(&self.active(&self.lead_out), self.flags)?,
        );
        Ok(self.active_delimiters.get_or_init(|| pair))
    }

    /// Byte range of the leftmost innermost span in `text`, delimiters included.
    pub fn find_target(&self, text: &str) -> Result<Option<Range<usize>>> {
        Ok(self.target_finder()?.find(text)?.map(|m| m.start()..m.end()))
    }

    /// The first active delimiter left in `text`, if any.
    pub fn leftover(&self, text: &str) -> Result<Option<Leftover>> {
        let (lead_in, lead_out) = self.active_delimiters()?;
        if lead_in.is_match(text)? {
            return Ok(Some(Leftover {
                found: self.lead_in.clone(),
                missing: self.lead_out.clone(),
            }));
        }
        if lead_out.is_match(text)? {
            return Ok(Some(Leftover {
                found: self.lead_out.clone(),
                missing: self.lead_in.clone(),
            }));
        }
        Ok(None)
    }

    /// Whether any active lead-in or lead-out remains in `text`.
    pub fn has_leftover(&self, text: &str) -> Result<bool> {
        Ok(self.leftover(text)?.is_some())
    }

    /// Number of memoized derivations.
    pub fn cached(&self) -> usize {
        self.fragments.borrow().len()
            + usize::from(self.target_finder.get().is_some())
            + usize::from(self.active_delimiters.get().is_some())
    }

    pub fn clear(&mut self) {
        self.fragments.get_mut().clear();
        self.target_finder.take();
        self.active_delimiters.take();
    }
}
