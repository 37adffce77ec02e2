//! Owner-side management of contexts and their share codes.
//!
//! Every operation here is scoped to the calling owner. Contexts belonging to
//! someone else are reported as missing, never as forbidden.

use chrono::{DateTime, Utc};
use sharename_core::{
  Error, Result,
  context::{Context, ContextId, ContextSummary, ContextUpdate, ExpiredContext, NewContext},
  share_code::{ShareCode, ShareCodeId},
  store::ShareStore,
  user::User,
};

use crate::Engine;

impl<S: ShareStore + 'static> Engine<S> {
  /// Load a context owned by `owner`, archived or not.
  pub(crate) async fn owned_context(&self, owner: &User, id: ContextId) -> Result<Context> {
    self
      .store
      .get_context(id)
      .await
      .map_err(Error::store)?
      .filter(|c| c.is_owned_by(owner.id))
      .ok_or_else(|| Error::not_found("context"))
  }

  async fn owned_active_context(&self, owner: &User, id: ContextId) -> Result<Context> {
    let context = self.owned_context(owner, id).await?;
    if context.archived {
      return Err(Error::not_found("context"));
    }
    Ok(context)
  }

  async fn summarise(&self, context: Context) -> Result<ContextSummary> {
    let share_codes = self
      .store
      .list_share_codes(context.id, false)
      .await
      .map_err(Error::store)?;
    Ok(ContextSummary { context, share_codes })
  }

  // ── Contexts ────────────────────────────────────────────────────────────

  /// Create a context. An initial share code is issued only when
  /// `initial_expiry` is given.
  pub async fn create_context(
    &self,
    owner: &User,
    input: NewContext,
    initial_expiry: Option<DateTime<Utc>>,
  ) -> Result<ContextSummary> {
    let input = NewContext { owner_id: owner.id, ..input }.validated()?;
    let context = self.store.create_context(input).await.map_err(Error::store)?;
    tracing::info!(context_id = %context.id, owner = %owner.id, "created context");

    if let Some(expires_at) = initial_expiry {
      self.issue_code(&context, Some(expires_at)).await?;
    }
    self.summarise(context).await
  }

  /// The owner's active contexts, newest first, each with its live codes.
  pub async fn list_contexts(&self, owner: &User) -> Result<Vec<ContextSummary>> {
    let contexts = self
      .store
      .list_contexts(owner.id, false)
      .await
      .map_err(Error::store)?;

    let mut summaries = Vec::with_capacity(contexts.len());
    for context in contexts {
      summaries.push(self.summarise(context).await?);
    }
    Ok(summaries)
  }

  pub async fn get_context(&self, owner: &User, id: ContextId) -> Result<ContextSummary> {
    let context = self.owned_active_context(owner, id).await?;
    self.summarise(context).await
  }

  pub async fn update_context(
    &self,
    owner: &User,
    id: ContextId,
    update: ContextUpdate,
  ) -> Result<ContextSummary> {
    let update = update.validated()?;
    let mut context = self.owned_active_context(owner, id).await?;
    update.apply(&mut context);

    let found = self
      .store
      .update_context(context.clone())
      .await
      .map_err(Error::store)?;
    if !found {
      return Err(Error::not_found("context"));
    }
    self.summarise(context).await
  }

  pub async fn delete_context(&self, owner: &User, id: ContextId) -> Result<()> {
    let context = self.owned_active_context(owner, id).await?;
    self.remove_context(&context).await
  }

  /// Archived contexts, most recently archived first.
  pub async fn list_archived_contexts(&self, owner: &User) -> Result<Vec<Context>> {
    self
      .store
      .list_contexts(owner.id, true)
      .await
      .map_err(Error::store)
  }

  pub async fn delete_archived_context(&self, owner: &User, id: ContextId) -> Result<()> {
    let context = self.owned_context(owner, id).await?;
    if !context.archived {
      return Err(Error::not_found("archived context"));
    }
    self.remove_context(&context).await
  }

  async fn remove_context(&self, context: &Context) -> Result<()> {
    let deleted = self
      .store
      .delete_context(context.id)
      .await
      .map_err(Error::store)?;
    if !deleted {
      return Err(Error::not_found("context"));
    }
    tracing::info!(context_id = %context.id, "deleted context");
    Ok(())
  }

  /// The owner's contexts the next sweep would process, with the expired codes
  /// that are not revoked.
  pub async fn expired_contexts(&self, owner: &User) -> Result<Vec<ExpiredContext>> {
    let now = Utc::now();
    let contexts = self
      .store
      .list_expired_contexts(Some(owner.id), now)
      .await
      .map_err(Error::store)?;

    let mut overview = Vec::with_capacity(contexts.len());
    for context in contexts {
      let codes = self
        .store
        .list_share_codes(context.id, true)
        .await
        .map_err(Error::store)?;
      overview.push(ExpiredContext::new(&context, &codes, now));
    }
    Ok(overview)
  }

  // ── Share codes ─────────────────────────────────────────────────────────

  /// Issue a fresh code for one of the owner's active contexts.
  pub async fn create_share_code(
    &self,
    owner: &User,
    context: ContextId,
    expires_at: Option<DateTime<Utc>>,
  ) -> Result<ShareCode> {
    let context = self.owned_active_context(owner, context).await?;
    self.issue_code(&context, expires_at).await
  }

  /// Change a code's expiry. Clearing it makes the code non-expiring.
  pub async fn set_share_code_expiry(
    &self,
    owner: &User,
    id: ShareCodeId,
    expires_at: Option<DateTime<Utc>>,
  ) -> Result<ShareCode> {
    self.owned_share_code(owner, id).await?;
    let code = self
      .store
      .set_share_code_expiry(id, expires_at)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::not_found("share code"))?;

    self.trigger_if_lapsed(&code);
    Ok(code)
  }

  pub async fn revoke_share_code(&self, owner: &User, id: ShareCodeId) -> Result<ShareCode> {
    self.owned_share_code(owner, id).await?;
    let code = self
      .store
      .revoke_share_code(id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::not_found("share code"))?;
    tracing::info!(share_code_id = %code.id, context_id = %code.context_id, "revoked share code");
    Ok(code)
  }

  async fn owned_share_code(&self, owner: &User, id: ShareCodeId) -> Result<ShareCode> {
    let code = self
      .store
      .get_share_code(id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::not_found("share code"))?;
    self.owned_context(owner, code.context_id).await?;
    Ok(code)
  }

  async fn issue_code(
    &self,
    context: &Context,
    expires_at: Option<DateTime<Utc>>,
  ) -> Result<ShareCode> {
    let code = self
      .store
      .create_share_code(context.id, expires_at)
      .await
      .map_err(Error::store)?;
    tracing::info!(share_code_id = %code.id, context_id = %context.id, "issued share code");

    self.trigger_if_lapsed(&code);
    Ok(code)
  }

  /// A code saved with an expiry that has already passed fires the sweep.
  fn trigger_if_lapsed(&self, code: &ShareCode) {
    if code.expires_at.is_some_and(|at| at <= Utc::now()) {
      tracing::debug!(share_code_id = %code.id, "share code saved already expired");
      self.trigger_sweep();
    }
  }
}
