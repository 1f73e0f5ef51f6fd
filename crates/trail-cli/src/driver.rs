//! One guarded iteration: the work runs on its own task so a panic surfaces
//! as a reported failure instead of tearing the process down silently.

use std::{any::Any, fmt, future::Future};

use anyhow::{Result, anyhow};
use tokio::task::JoinError;
use tracing::{error, info};

/// Logs `finished iteration` however the iteration ends.
struct Finished<'a> {
  label: &'a str,
}

impl Drop for Finished<'_> {
  fn drop(&mut self) {
    info!(label = self.label, "finished iteration");
  }
}

// ─── Reporting ────────────────────────────────────────────────────────────────

/// How an iteration went wrong.
#[derive(Debug)]
pub enum Failure<'a> {
  Error(&'a anyhow::Error),
  Panic(&'a str),
  Cancelled(&'a JoinError),
}

impl fmt::Display for Failure<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Error(e) => write!(f, "{e:#}"),
      Self::Panic(message) => write!(f, "panicked: {message}"),
      Self::Cancelled(join) => write!(f, "cancelled: {join}"),
    }
  }
}

/// Receives every failed iteration.
pub trait Reporter: Send + Sync {
  fn report(&self, label: &str, failure: &Failure<'_>);
}

/// Reports failures as `error`-level tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
  fn report(&self, label: &str, failure: &Failure<'_>) {
    match failure {
      Failure::Error(e) => error!(label, error = %format!("{e:#}"), "iteration failed"),
      Failure::Panic(message) => error!(label, panic = %message, "iteration panicked"),
      Failure::Cancelled(join) => error!(label, error = %join, "iteration cancelled"),
    }
  }
}

// ─── Driver ───────────────────────────────────────────────────────────────────

/// Run `work` as a single iteration labelled `label`, handing any failure to
/// `reporter` before returning it.
pub async fn iteration<F, R>(label: &str, reporter: &R, work: F) -> Result<()>
where
  F: Future<Output = Result<()>> + Send + 'static,
  R: Reporter,
{
  let _finished = Finished { label };
  info!(label, "starting iteration");

  match tokio::spawn(work).await {
    Ok(Ok(())) => Ok(()),
    Ok(Err(e)) => {
      reporter.report(label, &Failure::Error(&e));
      Err(e)
    }
    Err(join) if join.is_panic() => {
      let message = panic_message(join.into_panic());
      reporter.report(label, &Failure::Panic(&message));
      Err(anyhow!("{label} panicked: {message}"))
    }
    Err(join) => {
      reporter.report(label, &Failure::Cancelled(&join));
      Err(anyhow!(join).context(format!("{label} was cancelled")))
    }
  }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    return (*s).to_owned();
  }
  match payload.downcast::<String>() {
    Ok(s) => *s,
    Err(_) => "non-string panic payload".to_owned(),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;

  #[derive(Default)]
  struct Recorded(Mutex<Vec<String>>);

  impl Reporter for Recorded {
    fn report(&self, label: &str, failure: &Failure<'_>) {
      self.0.lock().unwrap().push(format!("{label}: {failure}"));
    }
  }

  impl Recorded {
    fn reports(&self) -> Vec<String> { self.0.lock().unwrap().clone() }
  }

  async fn boom() -> Result<()> { panic!("index out of range") }

  async fn lose(id: &'static str) -> Result<()> { panic!("lost {id}") }

  #[tokio::test]
  async fn success_passes_through() {
    let reporter = Recorded::default();
    iteration("ok", &reporter, async { Ok(()) }).await.unwrap();
    assert!(reporter.reports().is_empty());
  }

  #[tokio::test]
  async fn errors_are_returned_and_reported() {
    let reporter = Recorded::default();
    let err = iteration("users", &reporter, async { Err(anyhow!("slack is down")) })
      .await
      .unwrap_err();

    assert_eq!(err.to_string(), "slack is down");
    assert_eq!(reporter.reports(), vec!["users: slack is down"]);
  }

  #[tokio::test]
  async fn panics_become_errors() {
    let reporter = Recorded::default();
    let err = iteration("emojis", &reporter, boom()).await.unwrap_err();

    assert_eq!(err.to_string(), "emojis panicked: index out of range");
    assert_eq!(reporter.reports(), vec!["emojis: panicked: index out of range"]);
  }

  #[tokio::test]
  async fn formatted_panics_keep_their_message() {
    let err = iteration("employees", &TracingReporter, lose("e42"))
      .await
      .unwrap_err();

    assert_eq!(err.to_string(), "employees panicked: lost e42");
  }
}
