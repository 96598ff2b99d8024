//! Boolean predicate evaluation over rendered expressions.

use crate::scope::Scope;
use crate::template::render;

/// A comparison operator recognised inside predicate expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparator {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl Comparator {
    fn is_ordering(self) -> bool {
        matches!(self, Self::Ge | Self::Le | Self::Gt | Self::Lt)
    }
}

/// Evaluate a predicate expression against a scope.
///
/// The expression is rendered first, then scanned for a single comparison
/// operator. Ordering comparisons (`>`, `<`, `>=`, `<=`) compare
/// numerically and are false when either operand is not a number.
/// Equality comparisons (`==`, `!=`) compare numerically when both
/// operands parse as numbers, textually otherwise. An expression without
/// an operator evaluates to the truthiness of the rendered string.
#[must_use]
pub fn evaluate_predicate(expression: &str, scope: &Scope) -> bool {
    let rendered = render(expression, scope);

    match split_comparison(&rendered) {
        Some((lhs, op, rhs)) => compare(lhs.trim(), op, rhs.trim()),
        None => is_truthy(rendered.trim()),
    }
}

/// Find the first comparison operator, longest match first.
///
/// At every position the two-character operators are tried before `>` and
/// `<`, so `>=` is never misread as `>` followed by `=`.
fn split_comparison(input: &str) -> Option<(&str, Comparator, &str)> {
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let rest = &bytes[i..];
        let (op, width) = if rest.starts_with(b"==") {
            (Some(Comparator::Eq), 2)
        } else if rest.starts_with(b"!=") {
            (Some(Comparator::Ne), 2)
        } else if rest.starts_with(b">=") {
            (Some(Comparator::Ge), 2)
        } else if rest.starts_with(b"<=") {
            (Some(Comparator::Le), 2)
        } else if bytes[i] == b'>' {
            (Some(Comparator::Gt), 1)
        } else if bytes[i] == b'<' {
            (Some(Comparator::Lt), 1)
        } else {
            (None, 1)
        };

        if let Some(op) = op {
            // Operator bytes are ASCII, so both split points sit on
            // character boundaries.
            return Some((&input[..i], op, &input[i + width..]));
        }
        i += width;
    }
    None
}

fn compare(lhs: &str, op: Comparator, rhs: &str) -> bool {
    let lhs = strip_quotes(lhs);
    let rhs = strip_quotes(rhs);
    let numbers = (lhs.parse::<f64>().ok(), rhs.parse::<f64>().ok());

    if op.is_ordering() {
        let (Some(l), Some(r)) = numbers else {
            return false;
        };
        return match op {
            Comparator::Gt => l > r,
            Comparator::Lt => l < r,
            Comparator::Ge => l >= r,
            Comparator::Le => l <= r,
            _ => unreachable!(),
        };
    }

    let equal = match numbers {
        (Some(l), Some(r)) => l == r,
        _ => lhs == rhs,
    };
    match op {
        Comparator::Eq => equal,
        Comparator::Ne => !equal,
        _ => unreachable!(),
    }
}

/// Strip one pair of matching surrounding quotes, if present.
fn strip_quotes(s: &str) -> &str {
    let b = s.as_bytes();
    if b.len() >= 2 && (b[0] == b'"' || b[0] == b'\'') && b[b.len() - 1] == b[0] {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn is_truthy(s: &str) -> bool {
    !matches!(s, "" | "false" | "0" | "null")
}
