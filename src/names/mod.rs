//! Event-name syntax: parsing, memoization, condition predicates.
//!
//! ## Contents
//! - [`NameParser`], [`ParsedName`] — memoized `name` / `name.N` /
//!   `name{expr}` splitting
//! - [`Condition`], [`ConditionCompiler`], [`ComparisonCompiler`] —
//!   the opaque predicate seam for conditional handlers

mod condition;
mod parser;

pub use condition::{ComparisonCompiler, Condition, ConditionCompiler};
pub use parser::{NameParser, ParsedName};
