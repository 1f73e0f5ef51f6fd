//! Core types and the reconciliation engine for `trail`.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! store, the remote sources and the chat transport are reached through the
//! traits in [`store`] and [`hierarchy`]; the binary wires concrete
//! backends in.

pub mod announce;
pub mod change;
pub mod diff;
pub mod entity;
pub mod error;
pub mod hierarchy;
pub mod policy;
pub mod reconcile;
pub mod store;

pub use error::{Error, ErrorKind, Result};
pub use reconcile::{Reconciler, RunReport};
