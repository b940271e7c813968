//! Input validation for invoice requests.
//!
//! Collects every problem with a request before rejecting it, so a caller
//! sees all of them in one `400` response.

use std::fmt;

use reqwest::Url;

/// Trait for validating request objects.
pub trait Validator {
    /// Validate the state of the object.
    fn validate(&self) -> Result<(), String>;
}

/// Validation error with a user-facing message.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field that failed validation
    pub field: String,
    pub message: String,
    /// Suggestion for how to fix the error
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn empty_field(field: &str) -> Self {
        Self::new(field, "must not be empty")
    }

    pub fn invalid_url(field: &str, reason: impl fmt::Display) -> Self {
        Self::new(field, format!("is not a valid absolute URL ({reason})"))
            .with_suggestion("use a full http(s) URL, e.g. https://example.com/invoice_template.docx")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, "; {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors with formatted output.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn to_message(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Ok if no errors were collected, otherwise the joined message.
    pub fn into_result(self) -> Result<(), String> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.to_message())
        }
    }
}

/// Validate that `value` is an absolute http(s) URL with a host.
pub fn validate_http_url(value: &str, field: &str, errors: &mut ValidationErrors) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(ValidationError::empty_field(field));
        return;
    }

    match Url::parse(trimmed) {
        Ok(url) if !matches!(url.scheme(), "http" | "https") => {
            errors.add(ValidationError::invalid_url(
                field,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        Ok(url) if url.host_str().map_or(true, str::is_empty) => {
            errors.add(ValidationError::invalid_url(field, "missing host"));
        }
        Ok(_) => {}
        Err(e) => errors.add(ValidationError::invalid_url(field, e)),
    }
}
