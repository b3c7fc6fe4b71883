//! Errors raised while building processors or resolving shorthand.

use thiserror::Error;

/// Everything that can go wrong inside the engine.
///
/// Handler failures are carried through untouched in [`Error::Handler`].
#[derive(Debug, Error)]
pub enum Error {
    /// A pattern (user supplied or derived) could not be compiled.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// An active delimiter survived resolution without its partner.
    #[error("open (unbalanced) shorthand expression: found '{found}' without a corresponding '{missing}'")]
    OpenShorthand { found: String, missing: String },

    /// A delimited span that no registered processor could rewrite.
    #[error("unable to substitute for '{0}'")]
    UnknownShorthand(String),

    /// A value handed to `produce` cannot be captured back.
    #[error("cannot produce group {group}: {reason}")]
    Production { group: String, reason: String },

    /// A handler description that cannot become a pattern.
    #[error("unsupported signature for '{name}': {reason}")]
    UnsupportedSignature { name: String, reason: String },

    /// The regex engine gave up while matching (e.g. backtrack limit).
    #[error("pattern matching failed: {0}")]
    Regex(#[from] fancy_regex::Error),

    /// Whatever a handler returned as its error.
    #[error(transparent)]
    Handler(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_pattern(pattern: &str, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn production(group: impl ToString, reason: impl ToString) -> Self {
        Self::Production {
            group: group.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unsupported(name: &str, reason: impl ToString) -> Self {
        Self::UnsupportedSignature {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}
