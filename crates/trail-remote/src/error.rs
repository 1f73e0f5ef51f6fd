//! Error type for `trail-remote`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// The chat platform answered `ok: false`.
  #[error("{method} failed: {error}")]
  Api { method: &'static str, error: String },

  #[error("login failed: {0}")]
  Login(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
