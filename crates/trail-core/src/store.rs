//! Collaborator traits: where snapshots come from and where changes go.
//!
//! The traits are implemented by backends (`trail-store-sqlite`,
//! `trail-remote`). The reconciler depends on these abstractions, not on any
//! concrete backend.
//!
//! All methods return `Send` futures so a run can be spawned onto a
//! multi-threaded tokio runtime.

use std::{convert::Infallible, future::Future};

use crate::{announce::Message, entity::Entity};

// ─── Persistence ─────────────────────────────────────────────────────────────

/// The persisted ("known") collection of one entity variant.
pub trait EntityStore<E: Entity>: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Every persisted record, tombstoned ones included.
  fn load_all(&self) -> impl Future<Output = Result<Vec<E>, Self::Error>> + Send + '_;

  /// Insert the record if its id is unseen, otherwise overwrite every stored
  /// field except `created_at`.
  fn persist<'a>(
    &'a self,
    entity: &'a E,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Remove the record outright. Only reached for hard-delete variants.
  fn delete<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Remote source ───────────────────────────────────────────────────────────

/// The remote ("observed") collection of one entity variant.
pub trait Source<E: Entity>: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn observe(&self) -> impl Future<Output = Result<Vec<E>, Self::Error>> + Send + '_;
}

// ─── Notification ────────────────────────────────────────────────────────────

/// Delivers rendered messages.
pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn notify<'a>(
    &'a self,
    message: &'a Message,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  type Error = Infallible;

  async fn notify(&self, message: &Message) -> Result<(), Infallible> {
    tracing::info!(
      icon = %message.icon,
      attachments = message.attachments.len(),
      "{}",
      message.text
    );
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::announce::Attachment;

  #[tokio::test]
  async fn log_notifier_accepts_every_message() {
    let message = Message::new("Eve joined, reporting to Alice", ":baby:")
      .with_attachment(Attachment::image("https://example.com/eve.png"));
    assert_eq!(LogNotifier.notify(&message).await, Ok(()));
  }
}
