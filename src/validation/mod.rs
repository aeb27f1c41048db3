//! 响应校验模块：长度边界与必需/禁止模式规则。
//!
//! # Response Validation Module
//!
//! Decides whether a freshly generated response may be returned and cached.
//!
//! ## Rules
//!
//! Checks run in a fixed order and the first failure is the reported reason:
//!
//! 1. length below `min_length` → "too short"
//! 2. length above `max_length` → "too long"
//! 3. first required pattern without a match → "missing required pattern: P"
//! 4. first forbidden pattern with a match → "contains forbidden pattern: P"
//!
//! Length counts Unicode scalar values. Patterns are regular expressions
//! searched anywhere in the text; no case folding or trimming is applied, so
//! embed flags such as `(?i)` in the pattern itself.
//!
//! ## Example
//!
//! ```rust
//! use ai_lib_serve::validation::{ResponseValidator, ValidationRules};
//!
//! let rules = ValidationRules::builder()
//!     .min_length(10)
//!     .max_length(4000)
//!     .forbid_pattern(r"(?i)as an ai language model")
//!     .build()
//!     .unwrap();
//! let validator = ResponseValidator::new(rules);
//!
//! assert!(validator.validate("A brief valid summary.").is_accepted());
//! assert_eq!(validator.validate("short").reason().unwrap().to_string(), "too short");
//! ```

mod result;
mod rules;

pub use result::{RejectReason, Verdict};
pub use rules::{ValidationConfig, ValidationRules, ValidationRulesBuilder};

use std::sync::Arc;

/// Evaluate `response` against `rules`.
pub fn validate(response: &str, rules: &ValidationRules) -> Verdict {
    let length = response.chars().count();
    if length < rules.min_length() {
        return Verdict::Reject(RejectReason::TooShort {
            length,
            min: rules.min_length(),
        });
    }
    if length > rules.max_length() {
        return Verdict::Reject(RejectReason::TooLong {
            length,
            max: rules.max_length(),
        });
    }

    if let Some(missing) = rules
        .required_patterns()
        .find(|p| !p.is_match(response))
    {
        return Verdict::Reject(RejectReason::MissingRequiredPattern(
            missing.as_str().to_string(),
        ));
    }

    if let Some(found) = rules
        .forbidden_patterns()
        .find(|p| p.is_match(response))
    {
        return Verdict::Reject(RejectReason::ForbiddenPattern(found.as_str().to_string()));
    }

    Verdict::Accept
}

/// Validator holding an immutable rule set shared across requests.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    rules: Arc<ValidationRules>,
}

impl ResponseValidator {
    pub fn new(rules: ValidationRules) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    pub fn validate(&self, response: &str) -> Verdict {
        validate(response, &self.rules)
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::new(ValidationRules::default())
    }
}
