//! Redemption: deciding whether a requester may read a context, and recording
//! the grant.
//!
//! The decision is finalised before anything is written, so an audit row
//! exists exactly when access was granted.

use chrono::Utc;
use sharename_core::{
  ConsentRequired, Denial, Error, Result,
  context::{Context, ContextId, SharedContext, Visibility},
  notification::NewNotification,
  share_code::{ShareCode, is_well_formed},
  store::ShareStore,
  user::{Requester, User},
};

use crate::Engine;

impl<S: ShareStore + 'static> Engine<S> {
  /// Redeem a code. Anyone may try; consent-gated contexts additionally need
  /// an authenticated requester with an approved request.
  pub async fn redeem_by_code(&self, code: &str, requester: &Requester) -> Result<SharedContext> {
    if !is_well_formed(code) {
      return Err(Error::not_found("share code"));
    }
    let share_code = self
      .store
      .find_share_code(code.to_owned())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::not_found("share code"))?;

    if !share_code.is_valid_at(Utc::now()) {
      return Err(Error::forbidden("Code expired or revoked"));
    }

    let context = self.context_of(&share_code).await?;
    self.authorize(&context, requester.user()).await?;
    self.record(&share_code, &context, requester).await?;

    Ok(SharedContext::new(&context, share_code.expires_at))
  }

  /// Redeem by context id, for authenticated users.
  ///
  /// No code is presented, so code validity is never checked: any context
  /// that is not consent-gated opens to anyone who knows its id. The audit is
  /// filed against the context's current code, created if needed.
  pub async fn redeem_by_context(&self, id: ContextId, user: &User) -> Result<SharedContext> {
    let context = self
      .store
      .get_context(id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::not_found("context"))?;

    self.authorize(&context, Some(user)).await?;

    let share_code = self
      .store
      .get_or_create_share_code(context.id, None)
      .await
      .map_err(Error::store)?;
    self.record(&share_code, &context, &Requester::User(user.clone())).await?;

    Ok(SharedContext::new(&context, share_code.expires_at))
  }

  async fn context_of(&self, share_code: &ShareCode) -> Result<Context> {
    self
      .store
      .get_context(share_code.context_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::not_found("context"))
  }

  /// Apply the visibility policy. Public and code contexts need nothing
  /// beyond reaching this point.
  async fn authorize(&self, context: &Context, user: Option<&User>) -> Result<()> {
    if context.visibility != Visibility::Consent {
      return Ok(());
    }
    let Some(user) = user else {
      return Err(Error::forbidden("Authentication required for consent-gated contexts"));
    };

    let approved = self
      .store
      .find_consent_request(context.id, user.id)
      .await
      .map_err(Error::store)?
      .is_some_and(|r| r.status.grants_access());
    if approved {
      return Ok(());
    }

    let owner = self
      .store
      .get_user(context.owner_id)
      .await
      .map_err(Error::store)?
      .map(|u| u.email)
      .unwrap_or_default();
    Err(Error::Forbidden(Denial {
      message: "This context requires consent. You need to request access first.".to_owned(),
      consent: Some(ConsentRequired::new(&context.label, owner)),
    }))
  }

  async fn record(
    &self,
    share_code: &ShareCode,
    context: &Context,
    requester: &Requester,
  ) -> Result<()> {
    let identity = requester.identity();
    let notification = context
      .notify_on_redeem
      .then(|| NewNotification::redemption(context, identity));

    let recorded = self
      .store
      .record_redemption(share_code.id, identity.to_owned(), notification)
      .await
      .map_err(Error::store)?;

    tracing::info!(
      audit_id = %recorded.audit.id,
      context_id = %context.id,
      requester = identity,
      notified = recorded.notification.is_some(),
      "context redeemed"
    );
    Ok(())
  }
}
