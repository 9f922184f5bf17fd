//! # Event-name parser with process-lifetime memoization.
//!
//! Splits a raw event string into its canonical name, an optional
//! condition predicate, and an additional priority offset:
//!
//! ```text
//! "ball_drain"              name
//! "ball_drain.2"            name + priority offset 2
//! "ball_drain{balls > 1}"   name + condition
//! "ball_drain.2{balls > 1}" both (offset sits before the brace)
//! ```
//!
//! Canonical names are lowercased; whitespace anywhere in the name
//! portion is invalid. Parsing is pure, so results are memoized keyed
//! by the raw input string for the process lifetime — postable events
//! vastly outnumber distinct event strings in a live machine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::ParseError;
use crate::names::condition::{Condition, ConditionCompiler};

/// Parse result for one raw event string.
#[derive(Debug, Clone)]
pub struct ParsedName {
    /// Canonical (lowercased, suffix-stripped) event name; the registry key.
    pub name: Arc<str>,
    /// Compiled condition from a `{expr}` suffix.
    pub condition: Option<Condition>,
    /// Additional priority offset from a `.N` suffix.
    pub priority_offset: i32,
}

/// Memoizing parser; owns the condition compiler seam.
pub struct NameParser {
    cache: Mutex<HashMap<String, Arc<ParsedName>>>,
    compiler: Arc<dyn ConditionCompiler>,
}

impl NameParser {
    /// Creates a parser that compiles conditions with `compiler`.
    pub fn new(compiler: Arc<dyn ConditionCompiler>) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            compiler,
        }
    }

    /// Parses `raw`, consulting and populating the memo cache.
    pub fn parse(&self, raw: &str) -> Result<Arc<ParsedName>, ParseError> {
        if let Some(parsed) = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(raw)
        {
            return Ok(parsed.clone());
        }

        let parsed = Arc::new(self.parse_uncached(raw)?);
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(raw.to_owned(), parsed.clone());
        Ok(parsed)
    }

    fn parse_uncached(&self, raw: &str) -> Result<ParsedName, ParseError> {
        if raw.is_empty() {
            return Err(ParseError::EmptyName);
        }

        // 1. Condition suffix: "name{expr}".
        let (body, condition) = if raw.ends_with('}') {
            let Some(open) = raw.find('{') else {
                return Err(ParseError::UnmatchedBrace {
                    name: raw.to_owned(),
                });
            };
            if open == 0 {
                return Err(ParseError::UnmatchedBrace {
                    name: raw.to_owned(),
                });
            }
            let body = &raw[..open];
            if body.chars().any(char::is_whitespace) {
                return Err(ParseError::Whitespace {
                    name: raw.to_owned(),
                });
            }
            let expr = &raw[open + 1..raw.len() - 1];
            (body, Some(self.compiler.compile(expr)?))
        } else {
            // 2. No condition: braces and whitespace are both invalid.
            if raw.contains('{') || raw.contains('}') {
                return Err(ParseError::UnmatchedBrace {
                    name: raw.to_owned(),
                });
            }
            if raw.chars().any(char::is_whitespace) {
                return Err(ParseError::Whitespace {
                    name: raw.to_owned(),
                });
            }
            (raw, None)
        };

        // 3. Priority suffix: "name.N" (N may be negative).
        let (name, priority_offset) = match body.rfind('.') {
            Some(dot) => {
                let suffix = &body[dot + 1..];
                match suffix.parse::<i32>() {
                    Ok(offset) => (&body[..dot], offset),
                    Err(_) => {
                        return Err(ParseError::BadPrioritySuffix {
                            name: raw.to_owned(),
                            suffix: suffix.to_owned(),
                        })
                    }
                }
            }
            None => (body, 0),
        };

        if name.is_empty() {
            return Err(ParseError::EmptyName);
        }

        Ok(ParsedName {
            name: name.to_lowercase().into(),
            condition,
            priority_offset,
        })
    }

    /// Number of memoized entries (diagnostics).
    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::params::EventParams;
    use crate::names::condition::ComparisonCompiler;

    fn parser() -> NameParser {
        NameParser::new(Arc::new(ComparisonCompiler))
    }

    #[test]
    fn plain_name_is_lowercased() {
        let parsed = parser().parse("Ball_Drain").unwrap();
        assert_eq!(&*parsed.name, "ball_drain");
        assert!(parsed.condition.is_none());
        assert_eq!(parsed.priority_offset, 0);
    }

    #[test]
    fn priority_suffix() {
        let parsed = parser().parse("flipper.3").unwrap();
        assert_eq!(&*parsed.name, "flipper");
        assert_eq!(parsed.priority_offset, 3);

        let parsed = parser().parse("flipper.-2").unwrap();
        assert_eq!(parsed.priority_offset, -2);
    }

    #[test]
    fn condition_suffix() {
        let parsed = parser().parse("drain{balls > 1}").unwrap();
        assert_eq!(&*parsed.name, "drain");
        let cond = parsed.condition.as_ref().unwrap();
        assert!(cond.evaluate(&EventParams::new().with("balls", 2)));
        assert!(!cond.evaluate(&EventParams::new().with("balls", 1)));
    }

    #[test]
    fn offset_and_condition_combined() {
        let parsed = parser().parse("drain.3{balls > 1}").unwrap();
        assert_eq!(&*parsed.name, "drain");
        assert_eq!(parsed.priority_offset, 3);
        assert!(parsed.condition.is_some());
    }

    #[test]
    fn whitespace_is_invalid() {
        assert!(matches!(
            parser().parse("ball drain"),
            Err(ParseError::Whitespace { .. })
        ));
        assert!(matches!(
            parser().parse("ball {x}"),
            Err(ParseError::Whitespace { .. })
        ));
    }

    #[test]
    fn stray_braces_are_invalid() {
        assert!(matches!(
            parser().parse("drain{x"),
            Err(ParseError::UnmatchedBrace { .. })
        ));
        assert!(matches!(
            parser().parse("drain}"),
            Err(ParseError::UnmatchedBrace { .. })
        ));
        assert!(matches!(
            parser().parse("{x}"),
            Err(ParseError::UnmatchedBrace { .. })
        ));
    }

    #[test]
    fn non_integer_priority_suffix_is_invalid() {
        let err = parser().parse("drain.high").unwrap_err();
        assert!(matches!(err, ParseError::BadPrioritySuffix { ref suffix, .. } if suffix == "high"));
    }

    #[test]
    fn results_are_memoized() {
        let parser = parser();
        let first = parser.parse("drain.3{balls > 1}").unwrap();
        let second = parser.parse("drain.3{balls > 1}").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(parser.cached_len(), 1);
    }
}
