//! Users, their profiles, and the identity a request is made under.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::{
  Result, ValidationErrors,
  audit::{ANONYMOUS_REQUESTER, REQUESTER_MAX_LEN},
  context::PublicContext,
  validate::{self, PROFILE_NAME_MAX_LEN},
};

row_id!(
  /// Primary key of a [`User`].
  UserId
);

/// Whether the account represents a person or an organisation.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  #[default]
  Individual,
  Company,
}

/// An account. Email is unique and always stored lower-cased.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub id:            UserId,
  pub email:         String,
  /// argon2 PHC string; never serialised out.
  #[serde(skip_serializing, default)]
  pub password_hash: String,
  pub role:          Role,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::ShareStore::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub email:         String,
  pub password_hash: String,
  pub role:          Role,
}

// ─── Requester ───────────────────────────────────────────────────────────────

/// The identity a redemption or request is made under, as supplied by the
/// identity provider.
#[derive(Debug, Clone)]
pub enum Requester {
  User(User),
  /// Unauthenticated caller, identified only by a client-supplied marker.
  Anonymous(String),
}

impl Requester {
  /// Build an anonymous requester from an optional client marker, falling back
  /// to [`ANONYMOUS_REQUESTER`].
  ///
  /// Named markers live under `anon:` and never contain `@`, so they cannot
  /// be mistaken for a user's email in the audit trail.
  pub fn anonymous(client: Option<&str>) -> Self {
    let name: String = client
      .unwrap_or_default()
      .chars()
      .filter(|c| *c != '@' && !c.is_control())
      .collect();
    let name = name.trim();
    if name.is_empty() {
      return Self::Anonymous(ANONYMOUS_REQUESTER.to_owned());
    }

    let room = REQUESTER_MAX_LEN - ANONYMOUS_REQUESTER.len() - 1;
    let name: String = name.chars().take(room).collect();
    Self::Anonymous(format!("{ANONYMOUS_REQUESTER}:{}", name.trim_end()))
  }

  /// The string recorded in the audit trail.
  pub fn identity(&self) -> &str {
    match self {
      Self::User(user) => &user.email,
      Self::Anonymous(marker) => marker,
    }
  }

  pub fn user(&self) -> Option<&User> {
    match self {
      Self::User(user) => Some(user),
      Self::Anonymous(_) => None,
    }
  }
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// Personal and company details attached to every user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub user_id:             Option<UserId>,
  pub first_name:          String,
  pub last_name:           String,
  pub phone:               String,
  pub country:             String,
  pub bio:                 String,
  pub company_name:        String,
  pub company_phone:       String,
  pub company_country:     String,
  pub company_website:     String,
  pub company_founded:     Option<i32>,
  pub company_description: String,
  pub is_public_profile:   bool,
}

impl Profile {
  pub fn empty(user_id: UserId) -> Self {
    Self { user_id: Some(user_id), ..Self::default() }
  }

  /// Name shown to other users: the person's or company's name, else the email.
  pub fn display_name(&self, user: &User) -> String {
    let name = match user.role {
      Role::Individual => format!("{} {}", self.first_name, self.last_name),
      Role::Company => self.company_name.clone(),
    };
    let name = name.trim();
    if name.is_empty() { user.email.clone() } else { name.to_owned() }
  }
}

// ─── Public profiles ─────────────────────────────────────────────────────────

/// A public profile as it appears in search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileCard {
  pub id:           UserId,
  pub email:        String,
  pub display_name: String,
  pub role:         Role,
}

impl ProfileCard {
  pub fn new(user: &User, profile: &Profile) -> Self {
    Self {
      id:           user.id,
      email:        user.email.clone(),
      display_name: profile.display_name(user),
      role:         user.role,
    }
  }
}

/// What other users see of someone who made their profile public.
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
  #[serde(flatten)]
  pub card:            ProfileCard,
  pub bio:             String,
  /// The user's active contexts with public visibility.
  pub public_contexts: Vec<PublicContext>,
}

pub const BIO_MAX_LEN: usize = 500;
pub const COMPANY_DESCRIPTION_MAX_LEN: usize = 1000;

/// Partial profile update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
  pub first_name:          Option<String>,
  pub last_name:           Option<String>,
  pub phone:               Option<String>,
  pub country:             Option<String>,
  pub bio:                 Option<String>,
  pub company_name:        Option<String>,
  pub company_phone:       Option<String>,
  pub company_country:     Option<String>,
  pub company_website:     Option<String>,
  pub company_founded:     Option<i32>,
  pub company_description: Option<String>,
  pub is_public_profile:   Option<bool>,
}

impl ProfileUpdate {
  /// Validate and normalise every supplied field. All failures are reported
  /// together.
  pub fn validated(self, current_year: i32) -> Result<Self> {
    let mut errors = ValidationErrors::new();

    let mut field = |name: &str, value: Option<String>, f: fn(&str) -> validate::FieldResult<String>| {
      value.and_then(|v| errors.check(name, f(&v)))
    };

    let first_name = field("first_name", self.first_name, |v| {
      validate::optional_person_name(v, PROFILE_NAME_MAX_LEN)
    });
    let last_name = field("last_name", self.last_name, |v| {
      validate::optional_person_name(v, PROFILE_NAME_MAX_LEN)
    });
    let phone = field("phone", self.phone, validate::phone);
    let country = field("country", self.country, validate::country);
    let bio = field("bio", self.bio, |v| validate::text(v, BIO_MAX_LEN));
    let company_name = field("company_name", self.company_name, validate::company_name);
    let company_phone = field("company_phone", self.company_phone, validate::phone);
    let company_country = field("company_country", self.company_country, validate::country);
    let company_website = field("company_website", self.company_website, validate::website);
    let company_description = field("company_description", self.company_description, |v| {
      validate::text(v, COMPANY_DESCRIPTION_MAX_LEN)
    });
    let company_founded = self
      .company_founded
      .and_then(|y| errors.check("company_founded", validate::founding_year(y, current_year)));

    errors.into_result()?;
    Ok(Self {
      first_name,
      last_name,
      phone,
      country,
      bio,
      company_name,
      company_phone,
      company_country,
      company_website,
      company_founded,
      company_description,
      is_public_profile: self.is_public_profile,
    })
  }

  pub fn apply(self, profile: &mut Profile) {
    let set = |slot: &mut String, value: Option<String>| {
      if let Some(v) = value {
        *slot = v;
      }
    };
    set(&mut profile.first_name, self.first_name);
    set(&mut profile.last_name, self.last_name);
    set(&mut profile.phone, self.phone);
    set(&mut profile.country, self.country);
    set(&mut profile.bio, self.bio);
    set(&mut profile.company_name, self.company_name);
    set(&mut profile.company_phone, self.company_phone);
    set(&mut profile.company_country, self.company_country);
    set(&mut profile.company_website, self.company_website);
    set(&mut profile.company_description, self.company_description);
    if let Some(year) = self.company_founded {
      profile.company_founded = Some(year);
    }
    if let Some(public) = self.is_public_profile {
      profile.is_public_profile = public;
    }
  }
}
