//! Per-redemption revocation and the redemption listings.

use sharename_core::{
  Error, Result,
  audit::{AuditId, Redemption},
  notification::NewNotification,
  store::{RedemptionFilter, RevokedAccess, ShareStore},
  user::User,
};

use crate::Engine;

impl<S: ShareStore + 'static> Engine<S> {
  /// Revoke one redemption on one of `owner`'s contexts.
  ///
  /// The requester's pending or approved consent request on that context is
  /// forced to denied in the same transaction. The share code itself stays
  /// valid for everyone else holding it.
  pub async fn revoke(&self, owner: &User, audit: AuditId) -> Result<RevokedAccess> {
    let revoked = self
      .store
      .revoke_access(audit, owner.id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::not_found("audit record"))?;

    tracing::info!(
      %audit,
      context_id = %revoked.context.id,
      requester = %revoked.audit.requester,
      consents_revoked = revoked.consents_revoked,
      "access revoked"
    );

    // Anonymous or unknown requesters have nobody to tell.
    match self.store.find_user_by_email(revoked.audit.requester.clone()).await {
      Ok(Some(requester)) => {
        self
          .notify(NewNotification::access_revoked(&revoked.context, requester.id))
          .await;
      }
      Ok(None) => {}
      Err(e) => tracing::warn!(%audit, error = %e, "could not resolve requester to notify"),
    }

    Ok(revoked)
  }

  /// Redemptions of the owner's contexts, newest first.
  pub async fn owner_redemptions(&self, owner: &User) -> Result<Vec<Redemption>> {
    self
      .store
      .list_owner_redemptions(owner.id, RedemptionFilter::default())
      .await
      .map_err(Error::store)
  }

  /// Redemptions the user made, newest first.
  pub async fn requester_redemptions(&self, requester: &User) -> Result<Vec<Redemption>> {
    self
      .store
      .list_requester_redemptions(requester.email.clone(), RedemptionFilter::default())
      .await
      .map_err(Error::store)
  }
}
