//! Success predicates applied to captured test output

use crate::error::{CiConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal every Arbor unit-test run prints on success
pub const PASSED: &str = "PASSED";

/// Where a predicate looks for its literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    /// Captured standard output
    #[default]
    Stdout,
    /// Captured standard error
    Stderr,
}

/// A case-sensitive substring that must appear in captured output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PredicateRepr")]
pub struct SuccessPredicate {
    literal: String,
    stream: OutputStream,
}

#[derive(Deserialize)]
struct PredicateRepr {
    literal: String,
    #[serde(default)]
    stream: OutputStream,
}

impl TryFrom<PredicateRepr> for SuccessPredicate {
    type Error = CiConfigError;

    fn try_from(repr: PredicateRepr) -> Result<Self> {
        Ok(Self::found(repr.literal)?.on(repr.stream))
    }
}

impl SuccessPredicate {
    /// Require `literal` on standard output
    pub fn found(literal: impl Into<String>) -> Result<Self> {
        let literal = literal.into();
        if literal.is_empty() {
            return Err(CiConfigError::EmptyPredicate);
        }
        Ok(Self {
            literal,
            stream: OutputStream::Stdout,
        })
    }

    /// The Arbor unit-test predicate
    pub fn passed() -> Self {
        Self {
            literal: PASSED.to_string(),
            stream: OutputStream::Stdout,
        }
    }

    /// Look in another stream
    pub fn on(mut self, stream: OutputStream) -> Self {
        self.stream = stream;
        self
    }

    /// The literal being searched for
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// The stream being searched
    pub fn stream(&self) -> OutputStream {
        self.stream
    }

    /// Evaluate against captured output of the configured stream
    pub fn evaluate(&self, captured: &str) -> SanityOutcome {
        let passed = captured.contains(self.literal.as_str());
        let message = if passed {
            format!("found '{}' in {}", self.literal, self.stream_name())
        } else {
            format!("'{}' not found in {}", self.literal, self.stream_name())
        };
        SanityOutcome { passed, message }
    }

    /// Evaluate against both captured streams, picking the configured one
    pub fn evaluate_streams(&self, stdout: &str, stderr: &str) -> SanityOutcome {
        match self.stream {
            OutputStream::Stdout => self.evaluate(stdout),
            OutputStream::Stderr => self.evaluate(stderr),
        }
    }

    fn stream_name(&self) -> &'static str {
        match self.stream {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for SuccessPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "assert_found('{}', {})", self.literal, self.stream_name())
    }
}

/// Result of checking a predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanityOutcome {
    /// Whether the literal was found
    pub passed: bool,
    /// Summary message
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passed_predicate() {
        let predicate = SuccessPredicate::passed();
        assert_eq!(predicate.literal(), "PASSED");

        let outcome = predicate.evaluate("[==========] 1204 tests ran.\n[  PASSED  ] 1204 tests.\n");
        assert!(outcome.passed);

        let outcome = predicate.evaluate("[  FAILED  ] 3 tests, listed below:\n");
        assert!(!outcome.passed);
        assert!(outcome.message.contains("not found"));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let predicate = SuccessPredicate::passed();
        assert!(!predicate.evaluate("all tests passed").passed);
    }

    #[test]
    fn test_empty_literal_rejected() {
        assert!(matches!(
            SuccessPredicate::found(""),
            Err(CiConfigError::EmptyPredicate)
        ));
        assert!(serde_json::from_str::<SuccessPredicate>(r#"{"literal": ""}"#).is_err());
    }

    #[test]
    fn test_stream_selection() {
        let predicate = SuccessPredicate::found("OK").unwrap().on(OutputStream::Stderr);
        assert!(!predicate.evaluate_streams("OK", "").passed);
        assert!(predicate.evaluate_streams("", "OK").passed);
    }

    #[test]
    fn test_serde_default_stream() {
        let predicate: SuccessPredicate = serde_json::from_str(r#"{"literal": "PASSED"}"#).unwrap();
        assert_eq!(predicate, SuccessPredicate::passed());
        assert_eq!(predicate.to_string(), "assert_found('PASSED', stdout)");
    }
}
