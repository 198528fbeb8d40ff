//! Configuration and input validation
//!
//! Provides a fluent validator used for:
//! - Configuration files (`larder.toml`)
//! - Collection and field names that end up in SQL statements
//! - Endpoint URLs
//!
//! # Example
//!
//! ```rust
//! use larder_core::validation::Validator;
//!
//! let result = Validator::new()
//!     .required("remote.base_url", "https://api.example.com")
//!     .identifier("store.collection.name", "properties")
//!     .range("remote.timeout_secs", 30, 1, 600)
//!     .validate();
//!
//! assert!(result.is_valid());
//! ```

use crate::error::{Error, ErrorCode, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Column names the SQLite store reserves for its own bookkeeping
pub const RESERVED_COLUMNS: &[&str] = &["id", "seq", "refreshed_at", "extra"];

/// Validation error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// Field that failed validation
    pub field: String,
    /// Error message
    pub message: String,
    /// Error code
    pub code: String,
    /// Expected value (if applicable)
    pub expected: Option<String>,
    /// Actual value (if applicable)
    pub actual: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create a new empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get all errors
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Get all warnings
    pub fn warnings(&self) -> &[ValidationError] {
        &self.warnings
    }

    /// Add an error
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Add a warning
    pub fn add_warning(&mut self, warning: ValidationError) {
        self.warnings.push(warning);
    }

    /// Merge another result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Convert to Result type
    pub fn to_result(self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
            Err(Error::new(
                ErrorCode::ConfigValidationError,
                format!("Validation failed: {}", messages.join("; ")),
            ))
        }
    }
}

/// Fluent validator builder
pub struct Validator {
    result: ValidationResult,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// Create a new validator
    pub fn new() -> Self {
        Self {
            result: ValidationResult::new(),
        }
    }

    /// Validate that a field is not empty
    pub fn required(mut self, field: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.result.add_error(ValidationError {
                field: field.to_string(),
                message: "Field is required".to_string(),
                code: "REQUIRED".to_string(),
                expected: Some("non-empty value".to_string()),
                actual: Some("empty".to_string()),
            });
        }
        self
    }

    /// Validate that a value starts with one of the allowed prefixes
    pub fn prefix(mut self, field: &str, value: &str, allowed: &[&str]) -> Self {
        if !allowed.iter().any(|p| value.starts_with(p)) {
            self.result.add_error(ValidationError {
                field: field.to_string(),
                message: format!("Must start with one of: {}", allowed.join(", ")),
                code: "PREFIX".to_string(),
                expected: Some(allowed.join(", ")),
                actual: Some(value.to_string()),
            });
        }
        self
    }

    /// Validate that a name is a plain identifier: ASCII letters, digits and `_`
    pub fn identifier(mut self, field: &str, value: &str) -> Self {
        if !is_identifier(value) {
            self.result.add_error(ValidationError {
                field: field.to_string(),
                message: "Must be letters, digits or underscores, not starting with a digit"
                    .to_string(),
                code: "IDENTIFIER".to_string(),
                expected: Some("[A-Za-z_][A-Za-z0-9_]*".to_string()),
                actual: Some(value.to_string()),
            });
        }
        self
    }

    /// Validate that a name is not one of the reserved values
    pub fn not_reserved(mut self, field: &str, value: &str, reserved: &[&str]) -> Self {
        if reserved.iter().any(|r| r.eq_ignore_ascii_case(value)) {
            self.result.add_error(ValidationError {
                field: field.to_string(),
                message: format!("{:?} is reserved", value),
                code: "RESERVED".to_string(),
                expected: Some(format!("none of: {}", reserved.join(", "))),
                actual: Some(value.to_string()),
            });
        }
        self
    }

    /// Validate that a value is in a list of allowed values
    pub fn one_of(mut self, field: &str, value: &str, allowed: &[&str]) -> Self {
        if !allowed.contains(&value) {
            self.result.add_error(ValidationError {
                field: field.to_string(),
                message: format!("Must be one of: {}", allowed.join(", ")),
                code: "ONE_OF".to_string(),
                expected: Some(allowed.join(", ")),
                actual: Some(value.to_string()),
            });
        }
        self
    }

    /// Validate a numeric range
    pub fn range<T: PartialOrd + std::fmt::Display>(
        mut self,
        field: &str,
        value: T,
        min: T,
        max: T,
    ) -> Self {
        if value < min || value > max {
            self.result.add_error(ValidationError {
                field: field.to_string(),
                message: format!("Must be between {} and {}", min, max),
                code: "RANGE".to_string(),
                expected: Some(format!("{} - {}", min, max)),
                actual: Some(value.to_string()),
            });
        }
        self
    }

    /// Add a custom validation
    pub fn custom<F>(mut self, field: &str, f: F) -> Self
    where
        F: FnOnce() -> Option<String>,
    {
        if let Some(message) = f() {
            self.result.add_error(ValidationError {
                field: field.to_string(),
                message,
                code: "CUSTOM".to_string(),
                expected: None,
                actual: None,
            });
        }
        self
    }

    /// Add a warning (non-blocking)
    pub fn warn_if(mut self, field: &str, condition: bool, message: &str) -> Self {
        if condition {
            self.result.add_warning(ValidationError {
                field: field.to_string(),
                message: message.to_string(),
                code: "WARNING".to_string(),
                expected: None,
                actual: None,
            });
        }
        self
    }

    /// Complete validation and return result
    pub fn validate(self) -> ValidationResult {
        self.result
    }
}

/// Check whether a name is a plain SQL identifier
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_validation() {
        let result = Validator::new().required("name", "").validate();
        assert!(!result.is_valid());

        let result = Validator::new().required("name", "value").validate();
        assert!(result.is_valid());
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_identifier("properties"));
        assert!(is_identifier("_img_src2"));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("name; DROP TABLE x"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_reserved_names_rejected() {
        let result = Validator::new()
            .not_reserved("field", "Refreshed_At", RESERVED_COLUMNS)
            .validate();
        assert!(!result.is_valid());
        assert_eq!(result.errors()[0].code, "RESERVED");
    }

    #[test]
    fn test_prefix_validation() {
        let result = Validator::new()
            .prefix("url", "ftp://example.com", &["http://", "https://"])
            .validate();
        assert!(!result.is_valid());
    }

    #[test]
    fn test_range_validation() {
        let result = Validator::new().range("timeout", 0u64, 1, 600).validate();
        assert!(!result.is_valid());

        let result = Validator::new().range("timeout", 30u64, 1, 600).validate();
        assert!(result.is_valid());
    }

    #[test]
    fn test_warnings_do_not_fail() {
        let result = Validator::new()
            .warn_if("period", true, "very short period")
            .validate();
        assert!(result.is_valid());
        assert_eq!(result.warnings().len(), 1);
    }

    #[test]
    fn test_to_result_joins_messages() {
        let err = Validator::new()
            .required("a", "")
            .identifier("b", "1x")
            .validate()
            .to_result()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigValidationError);
        assert!(err.message.contains("a: "));
        assert!(err.message.contains("b: "));
    }

    proptest::proptest! {
        #[test]
        fn prop_generated_identifiers_are_accepted(name in "[A-Za-z_][A-Za-z0-9_]{0,30}") {
            proptest::prop_assert!(is_identifier(&name));
        }

        #[test]
        fn prop_names_with_punctuation_are_rejected(
            head in "[a-z]{1,8}",
            sep in "[ ;'\"().-]",
            tail in "[a-z]{0,8}",
        ) {
            let name = format!("{head}{sep}{tail}");
            proptest::prop_assert!(!is_identifier(&name));
        }
    }
}
