//! Contexts: named bundles of shareable fields with a visibility policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::{
  Result, ValidationErrors,
  share_code::ShareCode,
  user::UserId,
  validate::{self, CONTEXT_NAME_MAX_LEN},
};

row_id!(
  /// Primary key of a [`Context`].
  ContextId
);

/// Who may read a context.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
  /// Anyone holding any valid code.
  Public,
  /// Possession of a valid code is the authorisation.
  Code,
  /// An approved consent request is required on top of a valid code.
  Consent,
}

/// A context as stored.
///
/// Once `expiration_processed` is set the expiration sweep never looks at the
/// context again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
  pub id:                   ContextId,
  pub owner_id:             UserId,
  pub label:                String,
  pub visibility:           Visibility,
  pub given:                String,
  pub family:               String,
  pub created_at:           DateTime<Utc>,
  pub notify_on_redeem:     bool,
  pub auto_archive_expired: bool,
  pub archived:             bool,
  pub archived_at:          Option<DateTime<Utc>>,
  pub expiration_processed: bool,
}

impl Context {
  pub fn is_owned_by(&self, user: UserId) -> bool { self.owner_id == user }
}

/// Input to [`crate::store::ShareStore::create_context`].
#[derive(Debug, Clone)]
pub struct NewContext {
  pub owner_id:             UserId,
  pub label:                String,
  pub visibility:           Visibility,
  pub given:                String,
  pub family:               String,
  pub notify_on_redeem:     bool,
  pub auto_archive_expired: bool,
}

impl NewContext {
  /// Validate and normalise label and names.
  pub fn validated(self) -> Result<Self> {
    let mut errors = ValidationErrors::new();
    let label = errors.check("label", validate::context_label(&self.label));
    let given = errors.check(
      "given",
      validate::person_name(&self.given, CONTEXT_NAME_MAX_LEN),
    );
    let family = errors.check(
      "family",
      validate::optional_person_name(&self.family, CONTEXT_NAME_MAX_LEN),
    );
    errors.into_result()?;

    Ok(Self {
      label: label.unwrap_or_default(),
      given: given.unwrap_or_default(),
      family: family.unwrap_or_default(),
      ..self
    })
  }
}

/// Owner-supplied partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextUpdate {
  pub label:                Option<String>,
  pub visibility:           Option<Visibility>,
  pub given:                Option<String>,
  pub family:               Option<String>,
  pub notify_on_redeem:     Option<bool>,
  pub auto_archive_expired: Option<bool>,
}

impl ContextUpdate {
  pub fn validated(self) -> Result<Self> {
    let mut errors = ValidationErrors::new();
    let label = self
      .label
      .and_then(|v| errors.check("label", validate::context_label(&v)));
    let given = self.given.and_then(|v| {
      errors.check("given", validate::person_name(&v, CONTEXT_NAME_MAX_LEN))
    });
    let family = self.family.and_then(|v| {
      errors.check("family", validate::optional_person_name(&v, CONTEXT_NAME_MAX_LEN))
    });
    errors.into_result()?;

    Ok(Self { label, given, family, ..self })
  }

  pub fn apply(self, context: &mut Context) {
    if let Some(label) = self.label {
      context.label = label;
    }
    if let Some(visibility) = self.visibility {
      context.visibility = visibility;
    }
    if let Some(given) = self.given {
      context.given = given;
    }
    if let Some(family) = self.family {
      context.family = family;
    }
    if let Some(notify) = self.notify_on_redeem {
      context.notify_on_redeem = notify;
    }
    if let Some(auto_archive) = self.auto_archive_expired {
      context.auto_archive_expired = auto_archive;
    }
  }
}

/// The fields a successful redemption reveals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedContext {
  pub given:      String,
  pub family:     String,
  pub label:      String,
  pub visibility: Visibility,
  /// Expiry of the code that was redeemed, if any.
  pub expires_at: Option<DateTime<Utc>>,
}

impl SharedContext {
  pub fn new(context: &Context, expires_at: Option<DateTime<Utc>>) -> Self {
    Self {
      given: context.given.clone(),
      family: context.family.clone(),
      label: context.label.clone(),
      visibility: context.visibility,
      expires_at,
    }
  }
}

/// A public context as listed on its owner's public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicContext {
  pub id:     ContextId,
  pub label:  String,
  pub given:  String,
  pub family: String,
}

impl From<&Context> for PublicContext {
  fn from(context: &Context) -> Self {
    Self {
      id:     context.id,
      label:  context.label.clone(),
      given:  context.given.clone(),
      family: context.family.clone(),
    }
  }
}

/// An active context with its live (non-revoked) codes, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSummary {
  #[serde(flatten)]
  pub context:     Context,
  pub share_codes: Vec<ShareCode>,
}

/// Owner-facing entry of the expiry overview.
#[derive(Debug, Clone, Serialize)]
pub struct ExpiredContext {
  pub id:            ContextId,
  pub label:         String,
  /// Latest expiry among the context's expired codes, revoked ones included.
  pub expires_at:    Option<DateTime<Utc>>,
  /// Expired codes that were not revoked.
  pub expired_codes: Vec<ShareCode>,
}

impl ExpiredContext {
  /// Build the entry from all of a context's codes as seen at `now`.
  pub fn new(context: &Context, codes: &[ShareCode], now: DateTime<Utc>) -> Self {
    let expired = codes.iter().filter(|c| c.is_expired_at(now));
    Self {
      id:            context.id,
      label:         context.label.clone(),
      expires_at:    expired.clone().filter_map(|c| c.expires_at).max(),
      expired_codes: expired.filter(|c| !c.revoked).cloned().collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn new_context(label: &str, given: &str) -> NewContext {
    NewContext {
      owner_id:             UserId(1),
      label:                label.into(),
      visibility:           Visibility::Public,
      given:                given.into(),
      family:               String::new(),
      notify_on_redeem:     true,
      auto_archive_expired: false,
    }
  }

  #[test]
  fn new_context_normalises() {
    let ctx = new_context(" Work ", "alice").validated().unwrap();
    assert_eq!(ctx.label, "Work");
    assert_eq!(ctx.given, "Alice");
    assert_eq!(ctx.family, "");
  }

  #[test]
  fn new_context_reports_each_field() {
    let Err(crate::Error::Validation(errors)) = new_context("bad/label", "").validated() else {
      panic!("expected validation error");
    };
    assert!(errors.get("label").is_some());
    assert!(errors.get("given").is_some());
    assert!(errors.get("family").is_none());
  }

  #[test]
  fn expired_overview_keeps_revoked_codes_out_of_the_list() {
    use chrono::Duration;

    use crate::share_code::ShareCodeId;

    let now = Utc::now();
    let ctx = Context {
      id:                   ContextId(3),
      owner_id:             UserId(1),
      label:                "Work".into(),
      visibility:           Visibility::Code,
      given:                "Alice".into(),
      family:               String::new(),
      created_at:           now,
      notify_on_redeem:     true,
      auto_archive_expired: true,
      archived:             false,
      archived_at:          None,
      expiration_processed: false,
    };
    let code = |id, hours: i64, revoked| ShareCode {
      id: ShareCodeId(id),
      context_id: ctx.id,
      code: format!("CODE{id:04}"),
      created_at: now,
      expires_at: Some(now + Duration::hours(hours)),
      revoked,
    };
    let codes = [code(1, -5, false), code(2, -1, true), code(3, 4, false)];

    let entry = ExpiredContext::new(&ctx, &codes, now);
    assert_eq!(entry.expires_at, codes[1].expires_at);
    assert_eq!(entry.expired_codes, vec![codes[0].clone()]);
  }

  #[test]
  fn visibility_strings() {
    use std::str::FromStr;
    assert_eq!(Visibility::Consent.as_ref(), "consent");
    assert_eq!(Visibility::from_str("code").unwrap(), Visibility::Code);
    assert!(Visibility::from_str("secret").is_err());
  }
}
