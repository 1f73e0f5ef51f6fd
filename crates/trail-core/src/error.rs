//! Error types for `trail-core`.
//!
//! Collaborator failures are boxed and paired with a [`Context`] naming the
//! operation and the entity it concerned, so callers can match on
//! [`ErrorKind`] instead of message text.

use std::fmt;

use thiserror::Error;

use crate::{change::ChangeKind, entity::EntityKind};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What the reconciler was doing when a collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  LoadKnown(EntityKind),
  FetchObserved(EntityKind),
  FetchOrgChart,
  Announce(ChangeKind),
  Persist(ChangeKind),
  Delete,
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::LoadKnown(kind) => write!(f, "loading known {}", kind.plural()),
      Self::FetchObserved(kind) => write!(f, "fetching observed {}", kind.plural()),
      Self::FetchOrgChart => f.write_str("fetching org chart"),
      Self::Announce(change) => write!(f, "announcing {change}"),
      Self::Persist(change) => write!(f, "persisting {change}"),
      Self::Delete => f.write_str("deleting record"),
    }
  }
}

/// Operation plus the identifier of the entity involved, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
  pub operation: Operation,
  pub entity:    Option<String>,
}

impl Context {
  pub fn new(operation: Operation, entity: Option<&str>) -> Self {
    Self { operation, entity: entity.map(str::to_owned) }
  }
}

impl fmt::Display for Context {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.entity {
      Some(id) => write!(f, "{} for {id}", self.operation),
      None => write!(f, "{}", self.operation),
    }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// The remote source was unreachable or answered with garbage.
  #[error("transport error while {context}: {source}")]
  Transport {
    context: Context,
    #[source]
    source:  BoxError,
  },

  #[error("store error while {context}: {source}")]
  Store {
    context: Context,
    #[source]
    source:  BoxError,
  },

  #[error("notify error while {context}: {source}")]
  Notify {
    context: Context,
    #[source]
    source:  BoxError,
  },

  #[error("expected the {} table to be empty but it holds {count} rows", kind.plural())]
  AlreadyInitialized { kind: EntityKind, count: usize },

  /// The org chart changed shape while it was being walked.
  #[error(
    "expected {expected} at org chart path {path:?} but found {}",
    found.as_deref().unwrap_or("nothing")
  )]
  TreeConsistency {
    expected: String,
    found:    Option<String>,
    path:     Vec<usize>,
  },
}

/// Discriminant of [`Error`], for matching without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Transport,
  Store,
  Notify,
  AlreadyInitialized,
  TreeConsistency,
}

impl Error {
  pub fn transport(
    operation: Operation,
    entity: Option<&str>,
    source: impl Into<BoxError>,
  ) -> Self {
    Self::Transport { context: Context::new(operation, entity), source: source.into() }
  }

  pub fn store(
    operation: Operation,
    entity: Option<&str>,
    source: impl Into<BoxError>,
  ) -> Self {
    Self::Store { context: Context::new(operation, entity), source: source.into() }
  }

  pub fn notify(
    operation: Operation,
    entity: Option<&str>,
    source: impl Into<BoxError>,
  ) -> Self {
    Self::Notify { context: Context::new(operation, entity), source: source.into() }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Transport { .. } => ErrorKind::Transport,
      Self::Store { .. } => ErrorKind::Store,
      Self::Notify { .. } => ErrorKind::Notify,
      Self::AlreadyInitialized { .. } => ErrorKind::AlreadyInitialized,
      Self::TreeConsistency { .. } => ErrorKind::TreeConsistency,
    }
  }

  pub fn context(&self) -> Option<&Context> {
    match self {
      Self::Transport { context, .. }
      | Self::Store { context, .. }
      | Self::Notify { context, .. } => Some(context),
      Self::AlreadyInitialized { .. } | Self::TreeConsistency { .. } => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
