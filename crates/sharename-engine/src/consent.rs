//! The consent workflow: filing, renewing and resolving requests.

use sharename_core::{
  Error, Result, ValidationErrors,
  consent::{
    ConsentRequest, ConsentRequestId, ConsentRequestView, ConsentStatus, MESSAGE_MAX_LEN,
    Resolution,
  },
  context::{Context, ContextId, Visibility},
  notification::NewNotification,
  store::{ConsentFiling, ShareStore},
  user::User,
  validate,
};

use crate::Engine;

impl<S: ShareStore + 'static> Engine<S> {
  /// Ask for access to a consent-gated context, or ask again after a denial.
  pub async fn create_consent_request(
    &self,
    requester: &User,
    context: ContextId,
    message: &str,
  ) -> Result<ConsentRequest> {
    let message = consent_message(message)?;
    let context = self
      .store
      .get_context(context)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::not_found("context"))?;
    self.file(requester, &context, message).await
  }

  /// Same as [`Self::create_consent_request`], with the context resolved
  /// through one of its codes. The code's own validity does not matter.
  pub async fn create_consent_request_by_code(
    &self,
    requester: &User,
    code: &str,
    message: &str,
  ) -> Result<ConsentRequest> {
    let message = consent_message(message)?;
    let share_code = self
      .store
      .find_share_code(code.trim().to_owned())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::not_found("share code"))?;
    let context = self
      .store
      .get_context(share_code.context_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::not_found("context"))?;
    self.file(requester, &context, message).await
  }

  async fn file(
    &self,
    requester: &User,
    context: &Context,
    message: String,
  ) -> Result<ConsentRequest> {
    if context.visibility != Visibility::Consent {
      return Err(Error::forbidden("This context does not require consent"));
    }

    let request = match self
      .store
      .file_consent_request(context.id, requester.id, message)
      .await
      .map_err(Error::store)?
    {
      ConsentFiling::Created(r) | ConsentFiling::Renewed(r) => r,
      ConsentFiling::AlreadyRequested(_) => {
        return Err(Error::forbidden("You have already requested access to this context"));
      }
    };

    tracing::info!(
      consent_request_id = %request.id,
      context_id = %context.id,
      requester = %requester.email,
      "consent requested"
    );
    self.notify(NewNotification::consent_request(context, &requester.email)).await;
    Ok(request)
  }

  /// Approve or deny a pending request on one of `owner`'s contexts.
  ///
  /// Approval issues (or reuses) a code and pre-authorises the requester with
  /// an audit row, atomically.
  pub async fn resolve_consent_request(
    &self,
    owner: &User,
    id: ConsentRequestId,
    status: &str,
  ) -> Result<ConsentRequest> {
    let request = self
      .store
      .get_consent_request(id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::not_found("consent request"))?;
    let context = self
      .owned_context(owner, request.context_id)
      .await
      .map_err(|e| match e {
        Error::NotFound(_) => Error::not_found("consent request"),
        other => other,
      })?;

    let resolution: Resolution = status.trim().parse()?;
    if request.status.resolve(resolution).is_none() {
      return Err(already_resolved(request.status));
    }

    match resolution {
      Resolution::Approved => {
        let approval = self
          .store
          .approve_consent_request(id)
          .await
          .map_err(Error::store)?
          .ok_or_else(no_longer_pending)?;
        tracing::info!(
          consent_request_id = %id,
          audit_id = %approval.audit.id,
          share_code_id = %approval.share_code.id,
          "consent approved"
        );
        self
          .notify(NewNotification::consent_approved(&context, approval.request.requester_id))
          .await;
        Ok(approval.request)
      }
      Resolution::Denied => {
        let denied = self
          .store
          .deny_consent_request(id)
          .await
          .map_err(Error::store)?
          .ok_or_else(no_longer_pending)?;
        tracing::info!(consent_request_id = %id, "consent denied");
        self
          .notify(NewNotification::consent_denied(&context, denied.requester_id))
          .await;
        Ok(denied)
      }
    }
  }

  /// Requests on the owner's contexts, newest first.
  pub async fn list_consent_requests(&self, owner: &User) -> Result<Vec<ConsentRequestView>> {
    self
      .store
      .list_owner_consent_requests(owner.id)
      .await
      .map_err(Error::store)
  }

  /// The requester's own requests still awaiting a decision.
  pub async fn list_pending_requests(&self, requester: &User) -> Result<Vec<ConsentRequestView>> {
    self
      .store
      .list_requester_consent_requests(requester.id, Some(ConsentStatus::Pending))
      .await
      .map_err(Error::store)
  }
}

fn consent_message(message: &str) -> Result<String> {
  let mut errors = ValidationErrors::new();
  let message = errors.check("message", validate::text(message, MESSAGE_MAX_LEN));
  errors.into_result()?;
  Ok(message.unwrap_or_default())
}

fn already_resolved(status: ConsentStatus) -> Error {
  Error::invalid_state(format!("Consent request is already {}", status.as_ref()))
}

/// Another caller resolved the request between our read and our write.
fn no_longer_pending() -> Error { Error::invalid_state("Consent request is no longer pending") }
