//! Patterns derived from a handler's declared parameters.
//!
//! A signature `f(arg, kw=1)` yields markup of the form `{{f|ARG|kw=KW}}`:
//! the literal name, one separator-prefixed group per required parameter,
//! then one optional `name=value` group per optional parameter, in
//! declaration order.
//!
//! A required value may not begin with `identifier=`, otherwise `{{f|kw=1}}`
//! would be ambiguous. No value may contain an active separator.

use std::collections::HashSet;
use std::fmt;

use fancy_regex::Regex;
use itertools::Itertools;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::grammar::Grammar;
use crate::pattern::{compile_full, literal};
use crate::pattern::template::Slot;

/// Pattern for an identifier at the start of a would-be keyword value.
const IDENTIFIER: &str = r"[^\d\W]\w*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// Filled positionally from the markup.
    Required,
    /// Filled by `name=value`; the default applies when absent.
    Optional(Option<String>),
    /// Any number of extra positional values.
    Variadic,
    /// Any number of extra keyword values.
    VariadicKeyword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

/// A handler's name and parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    name: String,
    params: Vec<Param>,
}

/// Anything that can describe the parameters of the handler it stands for.
pub trait Describe {
    fn describe(&self) -> Signature;
}

impl Describe for Signature {
    fn describe(&self) -> Signature {
        self.clone()
    }
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    fn param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn required(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::Required)
    }

    /// Optional parameter with a default value.
    pub fn optional(self, name: impl Into<String>, default: impl Into<String>) -> Self {
        self.param(name, ParamKind::Optional(Some(default.into())))
    }

    /// Optional parameter whose absence the handler deals with itself.
    pub fn keyword(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::Optional(None))
    }

    pub fn variadic(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::Variadic)
    }

    pub fn variadic_keyword(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::VariadicKeyword)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn required_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.kind == ParamKind::Required)
            .map(|p| p.name.as_str())
    }

    pub fn optional_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| matches!(p.kind, ParamKind::Optional(_)))
            .map(|p| p.name.as_str())
    }

    /// Declared defaults, for optional parameters that have one.
    pub fn defaults(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .filter_map(|p| match &p.kind {
                ParamKind::Optional(Some(default)) => Some((p.name.clone(), default.clone())),
                _ => None,
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if !is_identifier(&self.name) {
            return Err(Error::unsupported(&self.name, "name is not an identifier"));
        }
        let mut seen = HashSet::new();
        let mut optional_seen = false;
        for param in &self.params {
            if !is_group_name(&param.name) {
                return Err(Error::unsupported(
                    &self.name,
                    format!("parameter '{}' is not an ASCII identifier", param.name),
                ));
            }
            if !seen.insert(param.name.as_str()) {
                return Err(Error::unsupported(
                    &self.name,
                    format!("duplicate parameter '{}'", param.name),
                ));
            }
            match param.kind {
                ParamKind::Variadic | ParamKind::VariadicKeyword => {
                    return Err(Error::unsupported(
                        &self.name,
                        format!("variable arity parameter '{}'", param.name),
                    ));
                }
                ParamKind::Required if optional_seen => {
                    return Err(Error::unsupported(
                        &self.name,
                        format!("required parameter '{}' follows an optional one", param.name),
                    ));
                }
                ParamKind::Required => {}
                ParamKind::Optional(_) => optional_seen = true,
            }
        }
        Ok(())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// Capture group names are restricted to ASCII.
fn is_group_name(s: &str) -> bool {
    is_identifier(s) && s.is_ascii()
}

/// Consumption pattern (without delimiters) and its production counterpart.
#[derive(Debug)]
pub(crate) struct Derived {
    pub(crate) source: String,
    pub(crate) template: SignatureTemplate,
    pub(crate) defaults: Vec<(String, String)>,
}

/// Build the consumption pattern and production template for `signature`.
pub(crate) fn derive(signature: &Signature, config: &Config, grammar: &Grammar) -> Result<Derived> {
    signature.validate()?;

    let separator = grammar.active(&config.separator);
    let operator = grammar.active(&config.assignment_operator);

    let named_content = format!("(?:(?!{separator}).)*");
    let unnamed_content = format!("(?!{IDENTIFIER}{operator}){named_content}");

    let mut source = literal(&signature.name).into_owned();
    for _ in signature.required_names() {
        source.push_str(&format!("{separator}({unnamed_content})"));
    }
    for name in signature.optional_names() {
        source.push_str(&format!(
            "(?:{separator}{}{operator}(?P<{name}>{named_content}))?",
            literal(name)
        ));
    }

    let template = SignatureTemplate {
        lead_in: config.lead_in.clone(),
        lead_out: config.lead_out.clone(),
        separator: config.separator.clone(),
        assignment_operator: config.assignment_operator.clone(),
        name: signature.name.clone(),
        required: signature.required_names().map(str::to_string).collect(),
        optional: signature.optional_names().map(str::to_string).collect(),
        unnamed: Slot::new(&unnamed_content, config.flags)?,
        named: Slot::new(&named_content, config.flags)?,
        markup: compile_full(&config.delimit(&source), config.flags)?,
        target_finder: grammar.target_finder()?.clone(),
    };

    Ok(Derived {
        source,
        template,
        defaults: signature.defaults(),
    })
}

/// Regenerates `{{name|v1|v2|k=v}}` markup.
#[derive(Debug, Clone)]
pub struct SignatureTemplate {
    lead_in: String,
    lead_out: String,
    separator: String,
    assignment_operator: String,
    name: String,
    required: Vec<String>,
    optional: Vec<String>,
    unnamed: Slot,
    named: Slot,
    /// The whole consumption pattern, delimiters included.
    markup: Regex,
    target_finder: Regex,
}

impl SignatureTemplate {
    /// Markup that resolves back to a call with these values.
    ///
    /// Named values are rendered in declaration order regardless of the
    /// order they are given in. Values are checked one by one and then the
    /// assembled markup as a whole, since a value can change how its
    /// neighbours are read (a trailing escape token disarms the separator
    /// after it).
    pub fn produce(&self, positional: &[&str], named: &[(&str, &str)]) -> Result<String> {
        if positional.len() != self.required.len() {
            return Err(Error::production(
                "positional",
                format!(
                    "'{}' takes {} positional values, got {}",
                    self.name,
                    self.required.len(),
                    positional.len()
                ),
            ));
        }
        for (param, value) in self.required.iter().zip(positional) {
            self.unnamed.check(param, value)?;
        }

        let mut seen = HashSet::new();
        for (key, value) in named {
            if !self.optional.iter().any(|o| o == key) {
                return Err(Error::production(key, format!("'{}' has no such optional parameter", self.name)));
            }
            if !seen.insert(*key) {
                return Err(Error::production(key, "given more than once"));
            }
            self.named.check(key, value)?;
        }

        let assignments = self
            .optional
            .iter()
            .filter_map(|o| named.iter().find(|(key, _)| key == o))
            .map(|(key, value)| format!("{key}{}{value}", self.assignment_operator))
            .collect::<Vec<_>>();

        let mut markup = self.lead_in.clone();
        markup.push_str(
            &std::iter::once(self.name.as_str())
                .chain(positional.iter().copied())
                .join(&self.separator),
        );
        if !assignments.is_empty() {
            markup.push_str(&self.separator);
            markup.push_str(&assignments.join(&self.separator));
        }
        markup.push_str(&self.lead_out);
        self.check_markup(&markup, positional, named)?;
        Ok(markup)
    }

    /// Fail unless `markup` is found as one span and its captures read back
    /// as exactly the given values.
    fn check_markup(&self, markup: &str, positional: &[&str], named: &[(&str, &str)]) -> Result<()> {
        let one_span = self
            .target_finder
            .find(markup)?
            .is_some_and(|m| m.start() == 0 && m.end() == markup.len());
        if !one_span {
            return Err(Error::production(
                &self.name,
                format!("'{markup}' does not resolve as a single span"),
            ));
        }
        let reads_back = self.markup.captures(markup)?.is_some_and(|caps| {
            let group = |i: usize| caps.get(i).map(|m| m.as_str());
            positional.iter().enumerate().all(|(i, value)| group(i + 1) == Some(*value))
                && self.optional.iter().all(|o| {
                    let given = named.iter().find(|(key, _)| key == o).map(|(_, value)| *value);
                    caps.name(o).map(|m| m.as_str()) == given
                })
        });
        if reads_back {
            Ok(())
        } else {
            Err(Error::production(
                &self.name,
                format!("'{markup}' does not read back as the given values"),
            ))
        }
    }
}

impl fmt::Display for SignatureTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = std::iter::once(self.name.clone())
            .chain(self.required.iter().map(|_| "{}".to_string()))
            .chain(self.optional.iter().map(|o| format!("[{o}{}{{}}]", self.assignment_operator)))
            .join(&self.separator);
        write!(f, "{}{slots}{}", self.lead_in, self.lead_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Flags;

    fn derived(signature: &Signature) -> Derived {
        let config = Config::default();
        derive(signature, &config, &Grammar::new(&config)).unwrap()
    }

    fn unsupported(signature: Signature) -> String {
        let config = Config::default();
        match derive(&signature, &config, &Grammar::new(&config)) {
            Err(err @ Error::UnsupportedSignature { .. }) => err.to_string(),
            other => panic!("expected UnsupportedSignature, got {other:?}"),
        }
    }

    fn f() -> Signature {
        Signature::new("f").required("arg").optional("kw0", "1").keyword("kw1")
    }

    #[test]
    fn builder_partitions_params() {
        let sig = f();
        assert_eq!(sig.required_names().collect::<Vec<_>>(), vec!["arg"]);
        assert_eq!(sig.optional_names().collect::<Vec<_>>(), vec!["kw0", "kw1"]);
        assert_eq!(sig.defaults(), vec![("kw0".to_string(), "1".to_string())]);
        assert_eq!(sig.describe(), sig);
    }

    #[test]
    fn derived_source_shape() {
        let d = derived(&Signature::new("a").required("v0").keyword("v1"));
        assert!(d.source.starts_with("a(?<!\\\\)\\|((?!"), "got: {}", d.source);
        assert!(d.source.contains("(?P<v1>"), "got: {}", d.source);
        assert_eq!(d.template.to_string(), "{{a|{}|[v1={}]}}");
    }

    #[test]
    fn produce_variants() {
        let t = derived(&Signature::new("h")).template;
        assert_eq!(t.produce(&[], &[]).unwrap(), "{{h}}");

        let t = derived(&Signature::new("a").required("v")).template;
        assert_eq!(t.produce(&["1"], &[]).unwrap(), "{{a|1}}");

        let t = derived(&Signature::new("a").keyword("v")).template;
        assert_eq!(t.produce(&[], &[("v", "1")]).unwrap(), "{{a|v=1}}");

        let t = derived(&Signature::new("a").required("v0").keyword("v1")).template;
        assert_eq!(t.produce(&["1"], &[("v1", "2")]).unwrap(), "{{a|1|v1=2}}");
        assert_eq!(t.produce(&["1"], &[]).unwrap(), "{{a|1}}");
    }

    #[test]
    fn named_values_follow_declaration_order() {
        let t = derived(&f()).template;
        assert_eq!(
            t.produce(&["x"], &[("kw1", "b"), ("kw0", "a")]).unwrap(),
            "{{f|x|kw0=a|kw1=b}}"
        );
    }

    #[test]
    fn empty_positional_value() {
        let t = derived(&f()).template;
        assert_eq!(t.produce(&[""], &[]).unwrap(), "{{f|}}");
    }

    #[test]
    fn production_rejects_bad_values() {
        let t = derived(&f()).template;
        let err = t.produce(&["a|b"], &[]).unwrap_err();
        assert!(matches!(err, Error::Production { .. }));
        assert!(t.produce(&["kw0=1"], &[]).is_err());
        assert!(t.produce(&["1=1"], &[]).is_ok());
        assert!(t.produce(&["x"], &[("kw0", "a|b")]).is_err());
        assert!(t.produce(&["x"], &[("kw0", "a=b")]).is_ok());
        assert!(t.produce(&["multi\nline"], &[]).is_err());
    }

    #[test]
    fn escaped_separator_is_a_valid_value() {
        let t = derived(&f()).template;
        assert_eq!(t.produce(&[r"a\|b"], &[]).unwrap(), r"{{f|a\|b}}");
    }

    #[test]
    fn trailing_escape_cannot_disarm_a_separator() {
        let t = derived(&Signature::new("f").required("a").required("b")).template;
        let err = t.produce(&["a\\", "b"], &[]).unwrap_err();
        assert!(matches!(err, Error::Production { .. }), "got: {err:?}");
        assert_eq!(t.produce(&["a\\x", "b"], &[]).unwrap(), r"{{f|a\x|b}}");

        let t = derived(&f()).template;
        assert!(t.produce(&["x"], &[("kw0", "v\\"), ("kw1", "w")]).is_err());
    }

    #[test]
    fn value_opening_a_nested_span_is_rejected() {
        let t = derived(&f()).template;
        let err = t.produce(&["{{x"], &[]).unwrap_err();
        assert!(err.to_string().contains("single span"), "got: {err}");
    }

    #[test]
    fn multi_line_flag_does_not_loosen_value_checks() {
        let config = Config::default().with_flags(Flags::MULTI_LINE);
        let d = derive(&Signature::new("f").required("a"), &config, &Grammar::new(&config)).unwrap();
        let err = d.template.produce(&["x\ny|z"], &[]).unwrap_err();
        assert!(matches!(err, Error::Production { .. }), "got: {err:?}");
        assert_eq!(d.template.produce(&["x"], &[]).unwrap(), "{{f|x}}");
    }

    #[test]
    fn production_rejects_bad_arity_and_names() {
        let t = derived(&f()).template;
        assert!(t.produce(&[], &[]).is_err());
        assert!(t.produce(&["a", "b"], &[]).is_err());
        let err = t.produce(&["a"], &[("kw2", "1")]).unwrap_err();
        assert!(err.to_string().contains("no such optional parameter"), "got: {err}");
        assert!(t.produce(&["a"], &[("kw0", "1"), ("kw0", "2")]).is_err());
    }

    #[test]
    fn variable_arity_is_unsupported() {
        let msg = unsupported(Signature::new("g").required("a").variadic("rest"));
        assert!(msg.contains("variable arity"), "got: {msg}");
        assert!(unsupported(Signature::new("g").variadic_keyword("kwargs")).contains("variable arity"));
    }

    #[test]
    fn malformed_signatures_are_unsupported() {
        assert!(unsupported(Signature::new("1g")).contains("not an identifier"));
        assert!(unsupported(Signature::new("g").required("a").required("a")).contains("duplicate"));
        assert!(unsupported(Signature::new("g").keyword("k").required("a")).contains("follows"));
        assert!(unsupported(Signature::new("g").required("ä")).contains("ASCII"));
    }
}
