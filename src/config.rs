//! Literal constants that define a shorthand dialect.

use bitflags::bitflags;
use phf::{Map, phf_map};

use crate::error::{Error, Result};
use crate::pattern::literal;

bitflags! {
    /// Matching flags applied to every pattern compiled for a scope.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        /// `i`: letters match regardless of case.
        const CASE_INSENSITIVE = 0b0000_0001;
        /// `m`: `^` and `$` match at line boundaries.
        const MULTI_LINE       = 0b0000_0010;
        /// `s`: `.` also matches a newline, so markup may span lines.
        const DOT_ALL          = 0b0000_0100;
        /// `x`: whitespace and `#` comments in patterns are ignored.
        const VERBOSE          = 0b0000_1000;
    }
}

impl Default for Flags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Conventional regex flag letters.
const LETTER_TO_FLAG_MAP: Map<char, Flags> = phf_map! {
    'i' => Flags::CASE_INSENSITIVE,
    'm' => Flags::MULTI_LINE,
    's' => Flags::DOT_ALL,
    'x' => Flags::VERBOSE,
};

/// Rendering order for inline flag groups.
const LETTER_ORDER: [char; 4] = ['i', 'm', 's', 'x'];

impl Flags {
    /// Parse flag letters such as `"sm"`.
    pub fn from_letters(letters: &str) -> Result<Self> {
        letters.chars().try_fold(Self::empty(), |flags, ch| {
            LETTER_TO_FLAG_MAP
                .get(&ch)
                .map(|flag| flags | *flag)
                .ok_or_else(|| Error::invalid_pattern(letters, format!("unknown flag {ch:?}")))
        })
    }

    /// The letters of the set flags, in `imsx` order.
    pub fn letters(self) -> String {
        LETTER_ORDER
            .iter()
            .filter(|ch| LETTER_TO_FLAG_MAP.get(*ch).is_some_and(|flag| self.contains(*flag)))
            .collect()
    }

    /// Inline group that switches these flags on, e.g. `(?s)`.
    pub fn inline_prefix(self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!("(?{})", self.letters())
        }
    }
}

/// The configuration surface of a scope.
///
/// Every field is a literal string: delimiters are escaped before they are
/// spliced into patterns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Config {
    pub lead_in: String,
    pub lead_out: String,
    /// Escape token; may be empty to disable escaping.
    pub escape: String,
    pub separator: String,
    pub assignment_operator: String,
    pub flags: Flags,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lead_in: "{{".into(),
            lead_out: "}}".into(),
            escape: "\\".into(),
            separator: "|".into(),
            assignment_operator: "=".into(),
            flags: Flags::empty(),
        }
    }
}

impl Config {
    pub fn with_lead_in(mut self, lead_in: impl Into<String>) -> Self {
        self.lead_in = lead_in.into();
        self
    }

    pub fn with_lead_out(mut self, lead_out: impl Into<String>) -> Self {
        self.lead_out = lead_out.into();
        self
    }

    /// Set both delimiters at once.
    pub fn with_delimiters(self, lead_in: impl Into<String>, lead_out: impl Into<String>) -> Self {
        self.with_lead_in(lead_in).with_lead_out(lead_out)
    }

    pub fn with_escape(mut self, escape: impl Into<String>) -> Self {
        self.escape = escape.into();
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_assignment_operator(mut self, operator: impl Into<String>) -> Self {
        self.assignment_operator = operator.into();
        self
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// `sub_pattern` between the literal lead-in and lead-out.
    pub(crate) fn delimit(&self, sub_pattern: &str) -> String {
        format!("{}{sub_pattern}{}", literal(&self.lead_in), literal(&self.lead_out))
    }

    /// Reject configurations that cannot delimit anything.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("lead-in", &self.lead_in),
            ("lead-out", &self.lead_out),
            ("separator", &self.separator),
            ("assignment operator", &self.assignment_operator),
        ];
        for (what, value) in required {
            if value.is_empty() {
                return Err(Error::invalid_pattern(value, format!("empty {what}")));
            }
        }
        Ok(())
    }
}
