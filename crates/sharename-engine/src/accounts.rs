//! Registration, credential checks, profiles and public profile lookup.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use chrono::{Datelike as _, Utc};
use rand_core::OsRng;
use sharename_core::{
  Error, Result, ValidationErrors,
  context::{PublicContext, Visibility},
  store::ShareStore,
  user::{NewUser, Profile, ProfileCard, ProfileUpdate, PublicProfile, Role, User, UserId},
  validate,
};

use crate::Engine;

/// Hash `password` into an argon2 PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| Error::Store(e.to_string().into()))
}

/// Check `password` against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc)
    .is_ok_and(|hash| Argon2::default().verify_password(password.as_bytes(), &hash).is_ok())
}

impl<S: ShareStore> Engine<S> {
  /// Create an account and its empty profile.
  pub async fn register(&self, email: &str, password: &str, role: Role) -> Result<User> {
    let mut errors = ValidationErrors::new();
    let email = errors.check("email", validate::email(email));
    errors.check("password", validate::password_strength(password));
    errors.into_result()?;
    let email = email.unwrap_or_default();

    let user = self
      .store
      .create_user(NewUser { email, password_hash: hash_password(password)?, role })
      .await
      .map_err(Error::store)?
      .ok_or_else(|| {
        ValidationErrors::single("email", "A user with this email already exists.")
      })?;

    tracing::info!(user_id = %user.id, role = user.role.as_ref(), "registered user");
    Ok(user)
  }

  /// Resolve HTTP credentials to a user. Unknown emails and wrong passwords
  /// are indistinguishable.
  pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
    let user = self
      .store
      .find_user_by_email(email.trim().to_lowercase())
      .await
      .map_err(Error::store)?;
    Ok(user.filter(|u| verify_password(password, &u.password_hash)))
  }

  pub async fn profile(&self, user: &User) -> Result<Profile> {
    let profile = self.store.get_profile(user.id).await.map_err(Error::store)?;
    Ok(profile.unwrap_or_else(|| Profile::empty(user.id)))
  }

  /// Apply a partial update; every supplied field is validated first and all
  /// failures are reported together.
  pub async fn update_profile(&self, user: &User, update: ProfileUpdate) -> Result<Profile> {
    let update = update.validated(Utc::now().year())?;
    let mut profile = self.profile(user).await?;
    update.apply(&mut profile);
    self
      .store
      .save_profile(user.id, profile.clone())
      .await
      .map_err(Error::store)?;
    Ok(profile)
  }

  /// Public profiles matching `query`. A blank query matches nothing.
  pub async fn search_profiles(&self, query: &str) -> Result<Vec<ProfileCard>> {
    let query = query.trim();
    if query.is_empty() {
      return Ok(Vec::new());
    }
    let found = self
      .store
      .search_public_profiles(query.to_owned())
      .await
      .map_err(Error::store)?;
    Ok(found.iter().map(|(user, profile)| ProfileCard::new(user, profile)).collect())
  }

  /// The public face of `id`. Private and unknown profiles are both NotFound.
  pub async fn public_profile(&self, id: UserId) -> Result<PublicProfile> {
    let not_found = || Error::not_found("profile");
    let user = self.store.get_user(id).await.map_err(Error::store)?.ok_or_else(not_found)?;
    let profile = self
      .store
      .get_profile(id)
      .await
      .map_err(Error::store)?
      .filter(|p| p.is_public_profile)
      .ok_or_else(not_found)?;

    let contexts = self.store.list_contexts(id, false).await.map_err(Error::store)?;
    Ok(PublicProfile {
      card:            ProfileCard::new(&user, &profile),
      bio:             profile.bio,
      public_contexts: contexts
        .iter()
        .filter(|c| c.visibility == Visibility::Public)
        .map(PublicContext::from)
        .collect(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hashes_verify_only_their_password() {
    let phc = hash_password("Str0ng!pass").unwrap();
    assert!(phc.starts_with("$argon2"));
    assert!(verify_password("Str0ng!pass", &phc));
    assert!(!verify_password("wrong", &phc));
    assert!(!verify_password("Str0ng!pass", "not-a-hash"));
  }
}
