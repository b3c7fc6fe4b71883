//! Recursive, delimiter-aware resolution of shorthand markup.
//!
//! Text such as `a{{d}}a` is rewritten by registered processors until no
//! delimited span remains. Spans are resolved innermost first, and output
//! that itself contains markup is resolved before the spans that follow.
//! Processors derived from a [`Signature`] can also run in reverse and
//! produce markup from values.
//!
//! # Example
//!
//! ```rust
//! use shorthand::{Passthrough, Scope, Signature, handler};
//!
//! let mut scope = Scope::default();
//! scope.shorthand("b", handler(|_| Ok("y".to_string()))).unwrap();
//! scope.shorthand("d", handler(|_| Ok("{{b}}{{b}}".to_string()))).unwrap();
//!
//! assert_eq!(scope.resolve("a{{d}}a").unwrap(), "ayya");
//!
//! // Markup shaped like a call: {{em|TEXT|level=N}}
//! let em = scope
//!     .signature(
//!         &Signature::new("em").required("text").optional("level", "1"),
//!         handler(|call| {
//!             let level = call.get("level").unwrap_or("1");
//!             Ok(format!("<em{level}>{}</em{level}>", call.arg(0).unwrap_or("")))
//!         }),
//!     )
//!     .unwrap();
//!
//! let markup = em.produce(&["hi"], &[("level", "2")]).unwrap();
//! assert_eq!(markup, "{{em|hi|level=2}}");
//! assert_eq!(scope.resolve(&markup).unwrap(), "<em2>hi</em2>");
//!
//! // Escaped delimiters are left alone.
//! assert_eq!(scope.resolve(r"\{\{b\}\}").unwrap(), r"\{\{b\}\}");
//!
//! // Passthrough values reach every handler without appearing in the text.
//! let pt = Passthrough::new().with("level", "3");
//! assert_eq!(scope.collective_sub("{{em|x}}", true, &pt).unwrap(), "<em3>x</em3>");
//! ```

mod call;
mod config;
pub mod definition;
mod error;
mod grammar;
pub mod pattern;
mod processor;
mod scope;
mod signature;
mod tokenize;

pub use call::{Call, Handler, Passthrough, handler};
pub use config::{Config, Flags};
pub use definition::Definition;
pub use error::{Error, Result};
pub use grammar::{Grammar, Leftover};
pub use pattern::{Mode, Pattern, Template};
pub use processor::Processor;
pub use scope::Scope;
pub use signature::{Describe, Param, ParamKind, Signature, SignatureTemplate};
