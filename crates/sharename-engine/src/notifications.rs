//! Notification storage and the poll endpoint's view of the mailbox.

use sharename_core::{
  Error, Result,
  notification::{NewNotification, Notification, NotificationId},
  store::ShareStore,
  user::User,
};

use crate::{Engine, Poll};

impl<S: ShareStore + 'static> Engine<S> {
  /// Persist a notification. Failures are logged and swallowed; the operation
  /// that caused the notification has already happened.
  pub(crate) async fn notify(&self, input: NewNotification) -> Option<Notification> {
    let user_id = input.user_id;
    let kind = input.kind;
    match self.store.create_notification(input).await {
      Ok(n) => Some(n),
      Err(e) => {
        tracing::warn!(%user_id, kind = kind.as_ref(), error = %e, "failed to store notification");
        None
      }
    }
  }

  /// The user's notifications, newest first.
  pub async fn list_notifications(&self, user: &User) -> Result<Vec<Notification>> {
    self.store.list_notifications(user.id).await.map_err(Error::store)
  }

  pub async fn mark_notification(
    &self,
    user: &User,
    id: NotificationId,
    read: bool,
  ) -> Result<Notification> {
    self
      .store
      .set_notification_read(id, user.id, read)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::not_found("notification"))
  }

  /// Hand out the user's pending mailbox flag, if any, with their previous poll time.
  pub fn poll(&self, user: &User) -> Poll { self.mailbox.take(user.id) }
}
