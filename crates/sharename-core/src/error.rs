//! Error types for `sharename-core`.
//!
//! The variants double as the error taxonomy every layer above reports in:
//! the engine returns them directly and the API maps them onto status codes.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The entity is absent, or the caller may not learn that it exists.
  #[error("not found: {0}")]
  NotFound(String),

  /// The entity exists but the action is disallowed.
  #[error("forbidden: {}", .0.message)]
  Forbidden(Denial),

  #[error("invalid state: {0}")]
  InvalidState(String),

  #[error("validation failed: {0}")]
  Validation(ValidationErrors),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn not_found(what: impl Into<String>) -> Self { Self::NotFound(what.into()) }

  pub fn forbidden(message: impl Into<String>) -> Self {
    Self::Forbidden(Denial { message: message.into(), consent: None })
  }

  pub fn invalid_state(message: impl Into<String>) -> Self {
    Self::InvalidState(message.into())
  }

  /// Wrap a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Denial ──────────────────────────────────────────────────────────────────

/// Why an action was refused, with an optional machine-readable payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denial {
  pub message: String,
  /// Present when the caller can fix the refusal by requesting consent.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub consent: Option<ConsentRequired>,
}

impl Denial {
  pub fn requires_consent(&self) -> bool { self.consent.is_some() }
}

/// Payload telling a client which context to file a consent request for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentRequired {
  /// Always `true`; kept as a field so clients can branch on it.
  pub requires_consent: bool,
  pub context_label:    String,
  /// Email of the context owner.
  pub owner:            String,
}

impl ConsentRequired {
  pub fn new(context_label: impl Into<String>, owner: impl Into<String>) -> Self {
    Self {
      requires_consent: true,
      context_label:    context_label.into(),
      owner:            owner.into(),
    }
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Field-level validation failures, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  /// A set holding exactly one message.
  pub fn single(field: &str, message: impl Into<String>) -> Self {
    let mut errors = Self::new();
    errors.add(field, message);
    errors
  }

  pub fn add(&mut self, field: &str, message: impl Into<String>) {
    self.0.entry(field.to_owned()).or_default().push(message.into());
  }

  /// Record the failure of `result` against `field`; pass the value through on
  /// success.
  pub fn check<T>(
    &mut self,
    field: &str,
    result: std::result::Result<T, crate::validate::FieldError>,
  ) -> Option<T> {
    match result {
      Ok(value) => Some(value),
      Err(e) => {
        self.0.entry(field.to_owned()).or_default().extend(e.into_messages());
        None
      }
    }
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn get(&self, field: &str) -> Option<&[String]> {
    self.0.get(field).map(Vec::as_slice)
  }

  pub fn fields(&self) -> impl Iterator<Item = &str> { self.0.keys().map(String::as_str) }

  /// `Ok(())` when nothing was recorded, otherwise [`Error::Validation`].
  pub fn into_result(self) -> Result<()> {
    if self.is_empty() { Ok(()) } else { Err(Error::Validation(self)) }
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (field, messages) in &self.0 {
      for message in messages {
        if !first {
          f.write_str("; ")?;
        }
        write!(f, "{field}: {message}")?;
        first = false;
      }
    }
    Ok(())
  }
}

impl From<ValidationErrors> for Error {
  fn from(e: ValidationErrors) -> Self { Self::Validation(e) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::validate::FieldError;

  #[test]
  fn collects_messages_per_field() {
    let mut errors = ValidationErrors::new();
    assert_eq!(errors.check("label", Ok::<_, FieldError>("ok")), Some("ok"));
    assert!(errors.check::<()>("label", Err(FieldError::new("too long"))).is_none());
    errors.add("label", "bad chars");
    errors.add("given", "required");

    assert_eq!(errors.get("label").unwrap(), ["too long", "bad chars"]);
    assert_eq!(errors.fields().collect::<Vec<_>>(), ["given", "label"]);
    assert_eq!(errors.to_string(), "given: required; label: too long; label: bad chars");
  }

  #[test]
  fn empty_set_is_ok() {
    assert!(ValidationErrors::new().into_result().is_ok());
    assert!(matches!(
      ValidationErrors::single("x", "y").into_result(),
      Err(Error::Validation(_))
    ));
  }

  #[test]
  fn consent_payload_serialises_flat() {
    let denial = Denial {
      message: "needs consent".into(),
      consent: Some(ConsentRequired::new("Work", "owner@example.com")),
    };
    let json = serde_json::to_value(&denial.consent).unwrap();
    assert_eq!(json["requires_consent"], true);
    assert_eq!(json["context_label"], "Work");
    assert_eq!(json["owner"], "owner@example.com");
  }
}
