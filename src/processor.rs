//! Processors: a compiled pattern plus the handler that rewrites its matches.

use std::fmt;

use log::debug;

use crate::call::{Call, Handler, Passthrough};
use crate::config::{Config, Flags};
use crate::error::{Error, Result};
use crate::grammar::Grammar;
use crate::pattern::{Groups, Mode, Pattern, Template};
use crate::signature::{self, Signature, SignatureTemplate};
use crate::tokenize::Tokenizer;

/// How a match becomes handler arguments.
#[derive(Debug)]
enum Extraction {
    /// Capture groups map straight onto positional and named values.
    Groups,
    /// The single group holds a flattened argument string.
    Tokenized(Tokenizer),
}

#[derive(Debug)]
enum Production {
    Template(Template),
    Signature(SignatureTemplate),
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Production::Template(template) => template.fmt(f),
            Production::Signature(template) => template.fmt(f),
        }
    }
}

/// The atomic unit of rewriting. Immutable once built.
pub struct Processor {
    pattern: Pattern,
    handler: Handler,
    defaults: Vec<(String, String)>,
    extraction: Extraction,
    production: Option<Production>,
}

impl Processor {
    fn build(pattern: Pattern, handler: Handler) -> Self {
        Self {
            pattern,
            handler,
            defaults: Vec::new(),
            extraction: Extraction::Groups,
            production: None,
        }
    }

    /// A one-way processor over an arbitrary pattern.
    pub fn new(source: &str, flags: Flags, handler: Handler) -> Result<Self> {
        Ok(Self::build(Pattern::new(source, flags)?, handler))
    }

    /// A processor that can also produce text matching its own pattern.
    ///
    /// Outside its capture groups the pattern may hold only literal text
    /// and escaped punctuation, which are copied into produced text as is.
    /// Fails with [`Error::InvalidPattern`] on nested capture groups and on
    /// any other group (`(?:...)`, look-arounds, inline flags) at top level.
    pub fn two_way(source: &str, flags: Flags, handler: Handler) -> Result<Self> {
        let template = Template::evert(source, flags)?;
        let mut processor = Self::new(source, flags, handler)?;
        processor.production = Some(Production::Template(template));
        processor.log_production();
        Ok(processor)
    }

    /// `sub_pattern` wrapped in the literal delimiters of `config`.
    pub(crate) fn delimited(sub_pattern: &str, config: &Config, handler: Handler) -> Result<Self> {
        Self::new(&config.delimit(sub_pattern), config.flags, handler)
    }

    /// Two-way processor for markup shaped like a call to `signature`.
    pub(crate) fn signature(
        signature: &Signature,
        config: &Config,
        grammar: &Grammar,
        handler: Handler,
    ) -> Result<Self> {
        let derived = signature::derive(signature, config, grammar)?;
        let mut processor = Self::delimited(&derived.source, config, handler)?;
        processor.defaults = derived.defaults;
        processor.production = Some(Production::Signature(derived.template));
        processor.log_production();
        Ok(processor)
    }

    /// Accepts any delimited content and tokenizes it.
    pub(crate) fn catch_all(config: &Config, grammar: &Grammar, handler: Handler) -> Result<Self> {
        let mut processor = Self::delimited("(.*?)", config, handler)?;
        processor.extraction = Extraction::Tokenized(Tokenizer::new(config, grammar)?);
        Ok(processor)
    }

    fn log_production(&self) {
        if let Some(production) = &self.production {
            debug!(
                "two-way processor consumes '{}' and produces '{production}'",
                self.pattern.as_str()
            );
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn is_two_way(&self) -> bool {
        self.production.is_some()
    }

    fn invoke(&self, groups: Groups<'_>, passthrough: &Passthrough) -> Result<String> {
        let call = match &self.extraction {
            Extraction::Groups => Call {
                positional: groups.positional,
                named: groups.named,
                defaults: &self.defaults,
                passthrough,
            },
            Extraction::Tokenized(tokenizer) => {
                let content = groups.positional.first().copied().flatten().unwrap_or_default();
                let tokens = tokenizer.split(content)?;
                Call {
                    positional: tokens.positional.into_iter().map(Some).collect(),
                    named: tokens.named,
                    defaults: &self.defaults,
                    passthrough,
                }
            }
        };
        (self.handler)(&call).map_err(Error::Handler)
    }

    /// Rewrite matches in `subject`, returning the text and the number of
    /// replacements.
    pub fn replace(&self, subject: &str, mode: Mode, passthrough: &Passthrough) -> Result<(String, usize)> {
        self.pattern
            .replace(subject, mode, |groups| self.invoke(groups, passthrough))
    }

    /// Rewrite every match.
    pub fn sub(&self, subject: &str, passthrough: &Passthrough) -> Result<String> {
        Ok(self.subn(subject, passthrough)?.0)
    }

    /// Rewrite every match and count them.
    pub fn subn(&self, subject: &str, passthrough: &Passthrough) -> Result<(String, usize)> {
        self.replace(subject, Mode::All, passthrough)
    }

    /// Text that this processor would match, built from the given values.
    pub fn produce(&self, positional: &[&str], named: &[(&str, &str)]) -> Result<String> {
        match &self.production {
            Some(Production::Template(template)) => template.produce(positional, named),
            Some(Production::Signature(template)) => template.produce(positional, named),
            None => Err(Error::production(
                self.pattern.as_str(),
                "processor is one-way",
            )),
        }
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("pattern", &self.pattern.as_str())
            .field("flags", &self.pattern.flags())
            .field("two_way", &self.is_two_way())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::call::handler;

    fn constant(value: &'static str) -> Handler {
        handler(move |_| Ok(value.to_string()))
    }

    fn join_args() -> Handler {
        handler(|call| Ok(call.args().iter().map(|a| a.unwrap_or("None")).collect::<Vec<_>>().join(",")))
    }

    #[test]
    fn basic_sub() {
        let p = Processor::new("(a)", Flags::empty(), handler(|c| Ok(c.arg(0).unwrap_or("").repeat(2)))).unwrap();
        let pt = Passthrough::new();
        assert_eq!(p.sub("xax", &pt).unwrap(), "xaax");
        assert_eq!(p.subn("aa", &pt).unwrap(), ("aaaa".to_string(), 2));
        let (out, n) = p.replace("aa", Mode::First, &pt).unwrap();
        assert_eq!((out.as_str(), n), ("aaa", 1));
    }

    #[test]
    fn named_captures_and_defaults() {
        let p = Processor::new(
            "(.)(?P<n>.)?",
            Flags::empty(),
            handler(|c| Ok(format!("{}{}", c.arg(0).unwrap_or(""), c.named("n").unwrap_or("-")))),
        )
        .unwrap();
        assert_eq!(p.sub("ab", &Passthrough::new()).unwrap(), "ab");
        assert_eq!(p.sub("a", &Passthrough::new()).unwrap(), "a-");
    }

    #[test]
    fn passthrough_reaches_handler() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let recorder = seen.clone();
        let p = Processor::new(
            "(.+)",
            Flags::empty(),
            handler(move |c| {
                recorder
                    .borrow_mut()
                    .push((c.arg(0).map(str::to_string), c.get("k").map(str::to_string)));
                Ok(String::new())
            }),
        )
        .unwrap();
        p.sub("a", &Passthrough::new().with("k", "v")).unwrap();
        assert_eq!(*seen.borrow(), vec![(Some("a".to_string()), Some("v".to_string()))]);
    }

    #[test]
    fn handler_error_propagates() {
        let p = Processor::new("a", Flags::empty(), handler(|_| anyhow::bail!("nope"))).unwrap();
        let err = p.sub("a", &Passthrough::new()).unwrap_err();
        assert!(matches!(err, Error::Handler(_)));
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn invalid_pattern() {
        assert!(matches!(
            Processor::new("(", Flags::empty(), constant("")),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn one_way_cannot_produce() {
        let p = Processor::new("a", Flags::empty(), constant("")).unwrap();
        assert!(!p.is_two_way());
        assert!(matches!(p.produce(&[], &[]), Err(Error::Production { .. })));
    }

    #[test]
    fn two_way_production() {
        let cases: [(&str, &[&str], &[(&str, &str)], &str); 5] = [
            ("$", &[], &[], "$"),
            ("(ab)", &["ab"], &[], "ab"),
            ("(a)(b)", &["a", "b"], &[], "ab"),
            ("(?P<n>a)", &[], &[("n", "a")], "a"),
            ("(a)(?P<n>b)(c)", &["a", "c"], &[("n", "b")], "abc"),
        ];
        for (source, positional, named, expected) in cases {
            let p = Processor::two_way(source, Flags::empty(), constant("")).unwrap();
            assert!(p.is_two_way());
            assert_eq!(p.produce(positional, named).unwrap(), expected, "pattern {source}");
        }
    }

    #[test]
    fn two_way_round_trip() {
        let p = Processor::two_way(r"<(\w+)>", Flags::empty(), join_args()).unwrap();
        let markup = p.produce(&["word"], &[]).unwrap();
        assert_eq!(markup, "<word>");
        assert_eq!(p.sub(&markup, &Passthrough::new()).unwrap(), "word");
    }

    #[test]
    fn two_way_rejects_nested_groups() {
        assert!(matches!(
            Processor::two_way("((a))", Flags::empty(), constant("")),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn two_way_rejects_top_level_syntax_groups() {
        assert!(matches!(
            Processor::two_way("a(?:b)?", Flags::empty(), constant("")),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn catch_all_tokenizes() {
        let config = Config::default();
        let grammar = Grammar::new(&config);
        let p = Processor::catch_all(
            &config,
            &grammar,
            handler(|c| Ok(format!("{}:{}", c.args().len(), c.get("kw").unwrap_or("-")))),
        )
        .unwrap();
        assert_eq!(p.sub("{{c|2|kw=3}}", &Passthrough::new()).unwrap(), "2:3");
        assert_eq!(p.sub("{{x}}", &Passthrough::new()).unwrap(), "1:-");
    }

    #[test]
    fn signature_defaults_apply() {
        let config = Config::default();
        let grammar = Grammar::new(&config);
        let sig = Signature::new("f").required("arg").optional("kw0", "1").keyword("kw1");
        let p = Processor::signature(
            &sig,
            &config,
            &grammar,
            handler(|c| {
                Ok(format!(
                    "{} {} {}",
                    c.arg(0).unwrap_or(""),
                    c.get("kw0").unwrap_or("None"),
                    c.get("kw1").unwrap_or("None")
                ))
            }),
        )
        .unwrap();
        assert_eq!(p.sub("{{f|1|kw1=2}}", &Passthrough::new()).unwrap(), "1 1 2");
        assert_eq!(p.produce(&["1"], &[("kw1", "2")]).unwrap(), "{{f|1|kw1=2}}");
    }

    #[test]
    fn debug_shows_pattern() {
        let p = Processor::new("a+", Flags::DOT_ALL, constant("")).unwrap();
        let shown = format!("{p:?}");
        assert!(shown.contains("a+"), "got: {shown}");
        assert!(shown.contains("two_way: false"), "got: {shown}");
    }
}
