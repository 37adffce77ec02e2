//! Normalisation and validation of user-supplied scalars.
//!
//! Every function takes the raw input and returns either the normalised value
//! or a [`FieldError`]. Callers collect failures per field in a
//! [`ValidationErrors`](crate::ValidationErrors).

use std::fmt;

/// Maximum length of a context label.
pub const LABEL_MAX_LEN: usize = 40;
/// Maximum length of a context's given/family name.
pub const CONTEXT_NAME_MAX_LEN: usize = 120;
/// Maximum length of a profile first/last name.
pub const PROFILE_NAME_MAX_LEN: usize = 50;
pub const COMPANY_NAME_MAX_LEN: usize = 100;
pub const COUNTRY_MAX_LEN: usize = 100;
pub const EARLIEST_FOUNDING_YEAR: i32 = 1800;

const PASSWORD_SPECIALS: &str = "!@#$%^&*(),.?\":{}|<>";

/// One or more messages describing why a single field was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError(Vec<String>);

impl FieldError {
  pub fn new(message: impl Into<String>) -> Self { Self(vec![message.into()]) }

  pub fn messages(&self) -> &[String] { &self.0 }

  pub fn into_messages(self) -> Vec<String> { self.0 }
}

impl fmt::Display for FieldError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.join(" "))
  }
}

pub type FieldResult<T> = Result<T, FieldError>;

// ─── Names ───────────────────────────────────────────────────────────────────

/// A person's name: letters, spaces, hyphens and apostrophes, title-cased.
pub fn person_name(value: &str, max_len: usize) -> FieldResult<String> {
  let value = value.trim();
  if value.is_empty() {
    return Err(FieldError::new("This field is required."));
  }
  if value.chars().count() > max_len {
    return Err(FieldError::new(format!("Must be {max_len} characters or less.")));
  }
  if !value.chars().all(|c| c.is_alphabetic() || " -'".contains(c)) {
    return Err(FieldError::new(
      "Can only contain letters, spaces, hyphens, and apostrophes.",
    ));
  }
  Ok(title_case(value))
}

/// Like [`person_name`], but blank input is accepted as the empty string.
pub fn optional_person_name(value: &str, max_len: usize) -> FieldResult<String> {
  if value.trim().is_empty() {
    return Ok(String::new());
  }
  person_name(value, max_len)
}

pub fn country(value: &str) -> FieldResult<String> {
  let value = value.trim();
  if value.is_empty() {
    return Ok(String::new());
  }
  if value.chars().count() > COUNTRY_MAX_LEN
    || !value.chars().all(|c| c.is_alphabetic() || " -".contains(c))
  {
    return Err(FieldError::new("Please enter a valid country name."));
  }
  Ok(title_case(value))
}

pub fn company_name(value: &str) -> FieldResult<String> {
  let value = value.trim();
  if value.is_empty() {
    return Ok(String::new());
  }
  if value.chars().count() > COMPANY_NAME_MAX_LEN {
    return Err(FieldError::new(format!(
      "Company name must be {COMPANY_NAME_MAX_LEN} characters or less."
    )));
  }
  if !value.chars().all(|c| c.is_alphanumeric() || " -&.',()".contains(c)) {
    return Err(FieldError::new("Company name contains invalid characters."));
  }
  Ok(value.to_owned())
}

/// Context labels: required, at most [`LABEL_MAX_LEN`] characters drawn from
/// letters, digits, spaces, hyphens and underscores.
pub fn context_label(value: &str) -> FieldResult<String> {
  let value = value.trim();
  if value.is_empty() {
    return Err(FieldError::new("Label is required."));
  }
  if value.chars().count() > LABEL_MAX_LEN {
    return Err(FieldError::new(format!(
      "Label must be {LABEL_MAX_LEN} characters or less."
    )));
  }
  if !value.chars().all(|c| c.is_alphanumeric() || " -_".contains(c)) {
    return Err(FieldError::new(
      "Label can only contain letters, numbers, spaces, hyphens, and underscores.",
    ));
  }
  Ok(value.to_owned())
}

/// Free text, trimmed and bounded.
pub fn text(value: &str, max_len: usize) -> FieldResult<String> {
  let value = value.trim();
  if value.chars().count() > max_len {
    return Err(FieldError::new(format!("Must be {max_len} characters or less.")));
  }
  Ok(value.to_owned())
}

// ─── Contact details ─────────────────────────────────────────────────────────

/// Phone numbers: digits and ` -()+`, 7 to 20 characters. An international
/// number (`+` followed by 7–15 digits once separators are removed) is
/// normalised to E.164.
pub fn phone(value: &str) -> FieldResult<String> {
  let value = value.trim();
  if value.is_empty() {
    return Ok(String::new());
  }
  let len = value.chars().count();
  if !(7..=20).contains(&len)
    || !value.chars().all(|c| c.is_ascii_digit() || " -()+".contains(c))
  {
    return Err(FieldError::new("Phone number format is invalid."));
  }

  let digits: String = value.chars().filter(char::is_ascii_digit).collect();
  if value.starts_with('+') && (7..=15).contains(&digits.len()) {
    return Ok(format!("+{digits}"));
  }
  Ok(value.to_owned())
}

/// Website URLs. A missing scheme defaults to `https://`.
pub fn website(value: &str) -> FieldResult<String> {
  let value = value.trim();
  if value.is_empty() {
    return Ok(String::new());
  }
  let url = if value.starts_with("http://") || value.starts_with("https://") {
    value.to_owned()
  } else {
    format!("https://{value}")
  };

  let invalid = || FieldError::new("Please enter a valid website URL.");
  if url.chars().any(char::is_whitespace) {
    return Err(invalid());
  }

  let rest = url.split_once("://").map(|(_, rest)| rest).ok_or_else(invalid)?;
  let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
  let host_port = authority.rsplit('@').next().unwrap_or_default();
  let host = match host_port.rsplit_once(':') {
    Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
    _ => host_port,
  };

  if host.eq_ignore_ascii_case("localhost") || is_domain(host) {
    Ok(url)
  } else {
    Err(invalid())
  }
}

/// Email addresses are validated structurally and lower-cased.
pub fn email(value: &str) -> FieldResult<String> {
  let value = value.trim();
  let invalid = || FieldError::new("Please enter a valid email address.");
  let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
  if local.is_empty()
    || domain.contains('@')
    || local.chars().any(|c| c.is_whitespace() || c.is_control())
    || !is_domain(domain)
  {
    return Err(invalid());
  }
  Ok(value.to_lowercase())
}

fn is_domain(host: &str) -> bool {
  let labels: Vec<&str> = host.split('.').collect();
  labels.len() >= 2
    && labels.iter().all(|label| {
      !label.is_empty()
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_alphanumeric() || c == '-')
    })
}

// ─── Credentials ─────────────────────────────────────────────────────────────

/// Password strength. Every unmet rule is reported, not only the first.
pub fn password_strength(value: &str) -> FieldResult<()> {
  if value.is_empty() {
    return Err(FieldError::new("Password is required."));
  }

  let mut problems = Vec::new();
  if value.chars().count() < 8 {
    problems.push("Password must be at least 8 characters long.".to_owned());
  }
  if !value.chars().any(char::is_uppercase) {
    problems.push("Password must contain at least one uppercase letter.".to_owned());
  }
  if !value.chars().any(char::is_lowercase) {
    problems.push("Password must contain at least one lowercase letter.".to_owned());
  }
  if !value.chars().any(|c| c.is_ascii_digit()) {
    problems.push("Password must contain at least one digit.".to_owned());
  }
  if !value.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
    problems.push(format!(
      "Password must contain at least one special character ({PASSWORD_SPECIALS})."
    ));
  }

  if problems.is_empty() { Ok(()) } else { Err(FieldError(problems)) }
}

// ─── Numbers ─────────────────────────────────────────────────────────────────

pub fn founding_year(year: i32, current_year: i32) -> FieldResult<i32> {
  if !(EARLIEST_FOUNDING_YEAR..=current_year).contains(&year) {
    return Err(FieldError::new(format!(
      "Company founded year must be between {EARLIEST_FOUNDING_YEAR} and {current_year}."
    )));
  }
  Ok(year)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Upper-case every letter that follows a non-letter, lower-case the rest.
fn title_case(value: &str) -> String {
  let mut out = String::with_capacity(value.len());
  let mut at_word_start = true;
  for c in value.chars() {
    if c.is_alphabetic() {
      if at_word_start {
        out.extend(c.to_uppercase());
      } else {
        out.extend(c.to_lowercase());
      }
      at_word_start = false;
    } else {
      out.push(c);
      at_word_start = true;
    }
  }
  out
}
