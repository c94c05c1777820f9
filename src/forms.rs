//! Form field errors shared by the HTML forms

use std::fmt;

use validator::{Validate, ValidationErrors};

use crate::error::{AppError, Result};

/// One message attached to a form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Ordered list of field errors, rendered next to the offending inputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(Vec<FieldError>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// First message for a field, if any
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge another set of errors after this one
    pub fn extend(&mut self, other: FormErrors) {
        self.0.extend(other.0);
    }

    /// `Ok` when empty, otherwise a validation error carrying these messages
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FormErrors::default();
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.to_string().cmp(&b.0.to_string()));
        for (field, errs) in fields {
            for err in errs.iter() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                out.add(&field.to_string(), message);
            }
        }
        out
    }
}

/// Run the derived validators and collect their messages
pub fn validate_form<T: Validate>(form: &T) -> FormErrors {
    match form.validate() {
        Ok(()) => FormErrors::default(),
        Err(errors) => errors.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_first_message() {
        let mut errors = FormErrors::default();
        errors.add("email", "user already exists");
        errors.add("email", "second");
        assert_eq!(errors.get("email"), Some("user already exists"));
        assert_eq!(errors.get("password1"), None);
    }

    #[test]
    fn test_into_result() {
        assert!(FormErrors::default().into_result().is_ok());

        let mut errors = FormErrors::default();
        errors.add("dispute_text", "required");
        match errors.into_result() {
            Err(AppError::Validation(e)) => assert_eq!(e.to_string(), "dispute_text: required"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
