//! Compiled patterns and match-and-replace.
//!
//! A [`Pattern`] wraps a backtracking regex (look-around is needed for
//! escape handling) and knows which of its capture groups are unnamed, so
//! that every match can be broken down into positional and named values.
//!
//! Named groups are never duplicated as positional values. A match on
//! `(a)(?P<n>b)(c)` yields positional `["a", "c"]` and named `n = "b"`.

pub mod template;

use std::borrow::Cow;

use fancy_regex::{Captures, Regex, RegexBuilder};

use crate::config::Flags;
use crate::error::{Error, Result};

pub use template::Template;

/// How many matches a replacement pass rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Only the leftmost match.
    First,
    /// Every non-overlapping match, left to right.
    All,
}

/// Values extracted from one match.
#[derive(Debug)]
pub struct Groups<'a> {
    /// Unnamed groups in order; `None` when a group did not participate.
    pub positional: Vec<Option<&'a str>>,
    /// Named groups that participated, in group order.
    pub named: Vec<(&'a str, &'a str)>,
}

/// An immutable compiled pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    flags: Flags,
    regex: Regex,
    unnamed: Vec<usize>,
    named: Vec<(usize, String)>,
}

/// Escape `text` so that it matches literally.
pub fn literal(text: &str) -> Cow<'_, str> {
    fancy_regex::escape(text)
}

/// Compile `source` with `flags` switched on.
///
/// Backtracking is unbounded: a lazy span over a long unclosed document
/// must run to its end rather than fail part way.
pub(crate) fn compile(source: &str, flags: Flags) -> Result<Regex> {
    let full = format!("{}{}", flags.inline_prefix(), source);
    RegexBuilder::new(&full)
        .backtrack_limit(usize::MAX)
        .build()
        .map_err(|e| Error::invalid_pattern(source, e))
}

/// Compile `source` so that it only accepts a whole string.
///
/// Anchored at text boundaries, which `MULTI_LINE` does not move.
pub(crate) fn compile_full(source: &str, flags: Flags) -> Result<Regex> {
    compile(&format!(r"\A(?:{source})\z"), flags)
}

impl Pattern {
    pub fn new(source: &str, flags: Flags) -> Result<Self> {
        let regex = compile(source, flags)?;

        let named: Vec<(usize, String)> = regex
            .capture_names()
            .enumerate()
            .filter_map(|(i, name)| name.map(|n| (i, n.to_string())))
            .collect();
        let unnamed = (1..regex.captures_len())
            .filter(|i| !named.iter().any(|(j, _)| j == i))
            .collect();

        Ok(Self {
            source: source.to_string(),
            flags,
            regex,
            unnamed,
            named,
        })
    }

    /// The pattern as written, without the inline flag prefix.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Number of unnamed capture groups.
    pub fn unnamed_count(&self) -> usize {
        self.unnamed.len()
    }

    /// Names of the named capture groups, in group order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.named.iter().map(|(_, name)| name.as_str())
    }

    pub fn is_match(&self, subject: &str) -> Result<bool> {
        Ok(self.regex.is_match(subject)?)
    }

    fn groups<'a>(&'a self, captures: &Captures<'a>) -> Groups<'a> {
        let positional = self
            .unnamed
            .iter()
            .map(|&i| captures.get(i).map(|m| m.as_str()))
            .collect();
        let named = self
            .named
            .iter()
            .filter_map(|(i, name)| captures.get(*i).map(|m| (name.as_str(), m.as_str())))
            .collect();
        Groups { positional, named }
    }

    /// Replace matches in `subject` with whatever `replacement` returns.
    ///
    /// Returns the rewritten text and the number of replacements made. The
    /// first error from `replacement` aborts the pass.
    pub fn replace<'a, F>(&'a self, subject: &'a str, mode: Mode, mut replacement: F) -> Result<(String, usize)>
    where
        F: FnMut(Groups<'a>) -> Result<String>,
    {
        let mut output = String::with_capacity(subject.len());
        let mut last = 0;
        let mut count = 0;

        for captures in self.regex.captures_iter(subject) {
            let captures = captures?;
            let Some(whole) = captures.get(0) else {
                continue;
            };
            output.push_str(&subject[last..whole.start()]);
            output.push_str(&replacement(self.groups(&captures))?);
            last = whole.end();
            count += 1;
            if mode == Mode::First {
                break;
            }
        }
        output.push_str(&subject[last..]);
        Ok((output, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(source: &str) -> Pattern {
        Pattern::new(source, Flags::empty()).unwrap()
    }

    fn describe(source: &str, subject: &str) -> Vec<(Vec<Option<String>>, Vec<(String, String)>)> {
        let p = pattern(source);
        let mut seen = Vec::new();
        p.replace(subject, Mode::All, |g| {
            seen.push((
                g.positional.iter().map(|v| v.map(str::to_string)).collect(),
                g.named
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ));
            Ok(String::new())
        })
        .unwrap();
        seen
    }

    #[test]
    fn named_groups_are_not_positional() {
        let seen = describe("(a)(?P<n>b)(c)", "abc");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, vec![Some("a".into()), Some("c".into())]);
        assert_eq!(seen[0].1, vec![("n".into(), "b".into())]);
    }

    #[test]
    fn absent_named_group_is_omitted() {
        let seen = describe("x(?:-(?P<opt>\\w+))?", "x");
        assert_eq!(seen[0].1, vec![]);
        let seen = describe("x(?:-(?P<opt>\\w+))?", "x-yz");
        assert_eq!(seen[0].1, vec![("opt".into(), "yz".into())]);
    }

    #[test]
    fn absent_unnamed_group_is_none() {
        let seen = describe("a(b)?", "a");
        assert_eq!(seen[0].0, vec![None]);
    }

    #[test]
    fn replace_all_counts() {
        let p = pattern("(.)");
        let (out, n) = p
            .replace("ab", Mode::All, |g| Ok(g.positional[0].unwrap().repeat(2)))
            .unwrap();
        assert_eq!(out, "aabb");
        assert_eq!(n, 2);
    }

    #[test]
    fn replace_first_only() {
        let p = pattern("b");
        let (out, n) = p.replace("abcb", Mode::First, |_| Ok("X".into())).unwrap();
        assert_eq!(out, "aXcb");
        assert_eq!(n, 1);
    }

    #[test]
    fn no_match_leaves_subject() {
        let p = pattern("z");
        let (out, n) = p.replace("abc", Mode::All, |_| Ok("X".into())).unwrap();
        assert_eq!(out, "abc");
        assert_eq!(n, 0);
    }

    #[test]
    fn empty_match_at_end() {
        let p = pattern("$");
        let (out, n) = p.replace("abc", Mode::All, |_| Ok("!".into())).unwrap();
        assert_eq!(out, "abc!");
        assert_eq!(n, 1);
    }

    #[test]
    fn replacement_error_aborts() {
        let p = pattern("a");
        let err = p
            .replace("aa", Mode::All, |_| Err(Error::UnknownShorthand("a".into())))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownShorthand(_)));
    }

    #[test]
    fn invalid_pattern_reported() {
        let err = Pattern::new("(unclosed", Flags::empty()).unwrap_err();
        match err {
            Error::InvalidPattern { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("expected InvalidPattern, got {other:?}"),
        }
    }

    #[test]
    fn flags_apply() {
        let plain = pattern("a.b");
        assert!(!plain.is_match("a\nb").unwrap());
        let dotall = Pattern::new("a.b", Flags::DOT_ALL).unwrap();
        assert!(dotall.is_match("a\nb").unwrap());
        assert_eq!(dotall.as_str(), "a.b");
    }

    #[test]
    fn multiline_literal_pattern() {
        let p = pattern("a\n\n    a");
        let (out, _) = p.replace("Aa\n\n    aA", Mode::All, |_| Ok("b".into())).unwrap();
        assert_eq!(out, "AbA");
    }

    #[test]
    fn full_match_ignores_line_boundaries() {
        let full = compile_full("a", Flags::MULTI_LINE).unwrap();
        assert!(full.is_match("a").unwrap());
        assert!(!full.is_match("a\nb").unwrap());
        assert!(!full.is_match("b\na").unwrap());
    }

    #[test]
    fn long_lazy_scan_is_not_cut_short() {
        let p = pattern("<((?:(?!<).)*?)>");
        let subject = format!("<{}", "a".repeat(400_000));
        assert!(!p.is_match(&subject).unwrap());
    }

    #[test]
    fn literal_escapes_metacharacters() {
        let p = pattern(&literal("{{a|b}}"));
        assert!(p.is_match("x{{a|b}}y").unwrap());
        assert!(!p.is_match("{{a}}").unwrap());
    }

    #[test]
    fn group_bookkeeping() {
        let p = pattern("(?P<n0>a)(b)(?P<n1>c)");
        assert_eq!(p.unnamed_count(), 1);
        assert_eq!(p.names().collect::<Vec<_>>(), vec!["n0", "n1"]);
    }
}
