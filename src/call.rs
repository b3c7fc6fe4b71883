//! What a handler sees when its pattern matches.

use std::collections::BTreeMap;
use std::rc::Rc;

/// A shorthand handler: turns one match into replacement text.
///
/// Handlers are shared (`Rc`) so a caller keeps a usable reference after
/// registering one.
pub type Handler = Rc<dyn Fn(&Call<'_>) -> anyhow::Result<String>>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Call<'_>) -> anyhow::Result<String> + 'static,
{
    Rc::new(f)
}

/// Keyword values forwarded to every handler invocation.
///
/// They are never drawn from the matched text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Passthrough {
    values: BTreeMap<String, String>,
}

impl Passthrough {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Arguments extracted from a single match.
///
/// Positional values correspond to unnamed capture groups, in order. Named
/// values only include groups that took part in the match, so that absent
/// optional groups fall back to defaults.
#[derive(Debug)]
pub struct Call<'a> {
    pub(crate) positional: Vec<Option<&'a str>>,
    pub(crate) named: Vec<(&'a str, &'a str)>,
    pub(crate) defaults: &'a [(String, String)],
    pub(crate) passthrough: &'a Passthrough,
}

impl<'a> Call<'a> {
    /// Positional value `index`, if its group participated.
    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.positional.get(index).copied().flatten()
    }

    /// All positional slots, including groups that did not participate.
    pub fn args(&self) -> &[Option<&'a str>] {
        &self.positional
    }

    /// Captured named value. Later captures under the same name win.
    pub fn named(&self, name: &str) -> Option<&'a str> {
        self.named
            .iter()
            .rev()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }

    /// Every captured named value in match order.
    pub fn named_values(&self) -> &[(&'a str, &'a str)] {
        &self.named
    }

    pub fn passthrough(&self, name: &str) -> Option<&'a str> {
        self.passthrough.get(name)
    }

    /// Keyword lookup: captured value, then passthrough, then declared default.
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.named(name)
            .or_else(|| self.passthrough(name))
            .or_else(|| {
                self.defaults
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.as_str())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call<'a>(
        positional: Vec<Option<&'a str>>,
        named: Vec<(&'a str, &'a str)>,
        defaults: &'a [(String, String)],
        passthrough: &'a Passthrough,
    ) -> Call<'a> {
        Call {
            positional,
            named,
            defaults,
            passthrough,
        }
    }

    #[test]
    fn positional_slots() {
        let pt = Passthrough::new();
        let c = call(vec![Some("a"), None], vec![], &[], &pt);
        assert_eq!(c.arg(0), Some("a"));
        assert_eq!(c.arg(1), None);
        assert_eq!(c.arg(2), None);
        assert_eq!(c.args().len(), 2);
    }

    #[test]
    fn keyword_precedence() {
        let defaults = vec![
            ("kw".to_string(), "default".to_string()),
            ("other".to_string(), "fallback".to_string()),
        ];
        let pt = Passthrough::new().with("kw", "forwarded").with("extra", "X");
        let c = call(vec![], vec![("kw", "captured")], &defaults, &pt);
        assert_eq!(c.get("kw"), Some("captured"));
        assert_eq!(c.get("extra"), Some("X"));
        assert_eq!(c.get("other"), Some("fallback"));
        assert_eq!(c.get("missing"), None);

        let c = call(vec![], vec![], &defaults, &pt);
        assert_eq!(c.get("kw"), Some("forwarded"));
    }

    #[test]
    fn last_named_capture_wins() {
        let pt = Passthrough::new();
        let c = call(vec![], vec![("k", "1"), ("k", "2")], &[], &pt);
        assert_eq!(c.named("k"), Some("2"));
        assert_eq!(c.named_values().len(), 2);
    }

    #[test]
    fn passthrough_builder() {
        let pt = Passthrough::new().with("a", "1");
        assert!(!pt.is_empty());
        assert_eq!(pt.iter().collect::<Vec<_>>(), vec![("a", "1")]);
        assert!(Passthrough::default().is_empty());
    }
}
