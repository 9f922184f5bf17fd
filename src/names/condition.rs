//! # Condition predicates for conditional handlers.
//!
//! A handler registered as `name{expr}` only fires when `expr`
//! evaluates to true against the merged parameter map for that
//! invocation. The expression language itself is a collaborator, not
//! part of the dispatch core: [`ConditionCompiler`] is the seam, and a
//! compiled [`Condition`] is an opaque predicate over [`EventParams`].
//!
//! The built-in [`ComparisonCompiler`] covers the common machine-config
//! shapes:
//!
//! ```text
//! {tilted}           parameter is truthy
//! {!tilted}          parameter is falsy or absent
//! {balls > 1}        comparison: == != < <= > >=
//! {mode == "wizard"} string/bool/number literals
//! ```
//!
//! Richer expression languages plug in through
//! [`EventBusBuilder::with_condition_compiler`](crate::EventBusBuilder::with_condition_compiler).

use std::fmt;
use std::sync::Arc;

use crate::error::ParseError;
use crate::events::params::{EventParams, Value};

/// A compiled boolean predicate over a parameter map.
///
/// Compiled once per distinct event string and memoized for the
/// process lifetime.
#[derive(Clone)]
pub struct Condition {
    source: Arc<str>,
    eval: Arc<dyn Fn(&EventParams) -> bool + Send + Sync>,
}

impl Condition {
    /// Wraps a predicate function with its source text.
    pub fn new(
        source: impl Into<Arc<str>>,
        eval: impl Fn(&EventParams) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: source.into(),
            eval: Arc::new(eval),
        }
    }

    /// The expression text this condition was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the predicate against a merged parameter map.
    pub fn evaluate(&self, params: &EventParams) -> bool {
        (self.eval)(params)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Condition({:?})", self.source)
    }
}

impl PartialEq for Condition {
    /// Conditions compare by source text (used by tie diagnostics).
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Compiles the text between braces in an event string into a [`Condition`].
pub trait ConditionCompiler: Send + Sync + 'static {
    /// Compiles `expr`, or reports why it is malformed.
    fn compile(&self, expr: &str) -> Result<Condition, ParseError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Built-in compiler for bare-name truthiness and single comparisons.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComparisonCompiler;

impl ComparisonCompiler {
    fn bad(expr: &str, reason: &str) -> ParseError {
        ParseError::BadCondition {
            expr: expr.to_owned(),
            reason: reason.to_owned(),
        }
    }

    fn is_ident(s: &str) -> bool {
        let mut chars = s.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    fn parse_literal(expr: &str, text: &str) -> Result<Value, ParseError> {
        if text == "true" {
            return Ok(Value::Bool(true));
        }
        if text == "false" {
            return Ok(Value::Bool(false));
        }
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Int(i));
        }
        if let Ok(f) = text.parse::<f64>() {
            return Ok(Value::Float(f));
        }
        let quoted = (text.starts_with('"') && text.ends_with('"') && text.len() >= 2)
            || (text.starts_with('\'') && text.ends_with('\'') && text.len() >= 2);
        if quoted {
            return Ok(Value::Str(text[1..text.len() - 1].to_owned()));
        }
        if Self::is_ident(text) {
            return Ok(Value::Str(text.to_owned()));
        }
        Err(Self::bad(expr, "literal is neither number, bool nor string"))
    }

    fn find_op(expr: &str) -> Option<(usize, usize, CmpOp)> {
        for (needle, op) in [
            ("==", CmpOp::Eq),
            ("!=", CmpOp::Ne),
            ("<=", CmpOp::Le),
            (">=", CmpOp::Ge),
            ("<", CmpOp::Lt),
            (">", CmpOp::Gt),
        ] {
            if let Some(idx) = expr.find(needle) {
                return Some((idx, needle.len(), op));
            }
        }
        None
    }

    fn compare(lhs: &Value, op: CmpOp, rhs: &Value) -> bool {
        let ordering = match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        };
        let Some(ordering) = ordering else {
            // type mismatch: only inequality holds
            return op == CmpOp::Ne;
        };
        match op {
            CmpOp::Eq => ordering.is_eq(),
            CmpOp::Ne => ordering.is_ne(),
            CmpOp::Lt => ordering.is_lt(),
            CmpOp::Le => ordering.is_le(),
            CmpOp::Gt => ordering.is_gt(),
            CmpOp::Ge => ordering.is_ge(),
        }
    }
}

impl ConditionCompiler for ComparisonCompiler {
    fn compile(&self, expr: &str) -> Result<Condition, ParseError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(Self::bad(expr, "empty expression"));
        }

        if let Some((idx, len, op)) = Self::find_op(trimmed) {
            let lhs = trimmed[..idx].trim().to_owned();
            let rhs_text = trimmed[idx + len..].trim();
            if !Self::is_ident(&lhs) {
                return Err(Self::bad(expr, "left side is not a parameter name"));
            }
            let rhs = Self::parse_literal(expr, rhs_text)?;
            return Ok(Condition::new(trimmed, move |params: &EventParams| {
                match params.get(&lhs) {
                    Some(value) => Self::compare(value, op, &rhs),
                    None => false,
                }
            }));
        }

        if let Some(name) = trimmed.strip_prefix('!') {
            let name = name.trim().to_owned();
            if !Self::is_ident(&name) {
                return Err(Self::bad(expr, "expected a parameter name after '!'"));
            }
            return Ok(Condition::new(trimmed, move |params: &EventParams| {
                params.get(&name).map_or(true, |v| !v.truthy())
            }));
        }

        if !Self::is_ident(trimmed) {
            return Err(Self::bad(expr, "expected a parameter name"));
        }
        let name = trimmed.to_owned();
        Ok(Condition::new(trimmed, move |params: &EventParams| {
            params.get(&name).is_some_and(Value::truthy)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(expr: &str) -> Condition {
        ComparisonCompiler.compile(expr).unwrap()
    }

    #[test]
    fn bare_name_truthiness() {
        let cond = compile("tilted");
        assert!(cond.evaluate(&EventParams::new().with("tilted", true)));
        assert!(!cond.evaluate(&EventParams::new().with("tilted", false)));
        assert!(!cond.evaluate(&EventParams::new()));
    }

    #[test]
    fn negated_name() {
        let cond = compile("!tilted");
        assert!(cond.evaluate(&EventParams::new()));
        assert!(cond.evaluate(&EventParams::new().with("tilted", 0)));
        assert!(!cond.evaluate(&EventParams::new().with("tilted", true)));
    }

    #[test]
    fn numeric_comparison() {
        let cond = compile("x > 1");
        assert!(cond.evaluate(&EventParams::new().with("x", 2)));
        assert!(!cond.evaluate(&EventParams::new().with("x", 1)));
        assert!(!cond.evaluate(&EventParams::new()));
        // int/float coercion
        assert!(cond.evaluate(&EventParams::new().with("x", 1.5)));
    }

    #[test]
    fn string_equality() {
        let cond = compile("mode == \"wizard\"");
        assert!(cond.evaluate(&EventParams::new().with("mode", "wizard")));
        assert!(!cond.evaluate(&EventParams::new().with("mode", "base")));
    }

    #[test]
    fn type_mismatch_only_ne() {
        let eq = compile("x == 1");
        let ne = compile("x != 1");
        let params = EventParams::new().with("x", "one");
        assert!(!eq.evaluate(&params));
        assert!(ne.evaluate(&params));
    }

    #[test]
    fn malformed_expressions() {
        assert!(ComparisonCompiler.compile("").is_err());
        assert!(ComparisonCompiler.compile("1x > 2").is_err());
        assert!(ComparisonCompiler.compile("x >").is_err());
    }

    #[test]
    fn compares_by_source() {
        assert_eq!(compile("x > 1"), compile("x > 1"));
        assert_ne!(compile("x > 1"), compile("x > 2"));
    }
}
