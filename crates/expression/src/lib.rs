#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Tawi Expression
//!
//! Pure template rendering and predicate evaluation. No I/O.
//!
//! Templates are strings with `{{dotted.path}}` placeholders resolved
//! against a [`Scope`]. A placeholder whose path does not resolve to a
//! non-null value is left in the output verbatim — never replaced by
//! `"null"` or the empty string. This makes [`render`] idempotent: a
//! second render over the same scope changes nothing.
//!
//! [`evaluate_predicate`] renders an expression, then tokenizes the result
//! looking for one comparison operator. Multi-character operators (`>=`,
//! `<=`, `==`, `!=`) are matched before single-character `>` and `<`, so
//! `{{a}} >= 100` parses as one comparison rather than `>` followed by a
//! stray `=`.

pub mod predicate;
pub mod scope;
pub mod template;

pub use predicate::evaluate_predicate;
pub use scope::Scope;
pub use template::{Template, render, render_map, render_value};
