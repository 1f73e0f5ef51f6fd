//! Runtime settings, layered from an optional TOML file and `TRAIL_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::Deserialize;
use trail_core::policy::{NoisePolicy, Policy, TrackingPolicy};
use trail_remote::{images::ImageSearchConfig, slack::SlackConfig, ultipro::UltiproConfig};

/// Everything read at startup. Sections are optional so that a command only
/// needs the credentials it actually uses.
#[derive(Debug, Deserialize)]
pub struct Settings {
  #[serde(default = "default_database_path")]
  pub database_path: PathBuf,
  pub slack:         Option<SlackConfig>,
  pub ultipro:       Option<UltiproConfig>,
  pub google:        Option<ImageSearchConfig>,
  #[serde(default)]
  pub policy:        PolicySettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct PolicySettings {
  #[serde(flatten)]
  pub tracking:       TrackingPolicy,
  /// Added to the built-in quiet statuses.
  #[serde(default)]
  pub quiet_statuses: Vec<String>,
}

fn default_database_path() -> PathBuf { PathBuf::from("trail.db") }

impl Settings {
  /// Read `path` (if it exists) and overlay the environment.
  ///
  /// `TRAIL_SLACK__TOKEN` sets `slack.token`;
  /// `TRAIL_POLICY__QUIET_STATUSES` takes a comma-separated list.
  pub fn load(path: &Path) -> Result<Self> {
    let raw = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("TRAIL")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("policy.quiet_statuses"),
      )
      .build()
      .with_context(|| format!("failed to read config from {}", path.display()))?;

    let mut settings: Settings = raw
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.database_path = expand_tilde(&settings.database_path);
    Ok(settings)
  }

  pub fn policy(&self) -> Policy {
    Policy {
      tracking: self.policy.tracking,
      noise:    NoisePolicy::with_extra(self.policy.quiet_statuses.iter().cloned()),
    }
  }

  pub fn slack(&self) -> Result<&SlackConfig> {
    self.slack.as_ref().context("missing [slack] settings")
  }

  pub fn ultipro(&self) -> Result<&UltiproConfig> {
    self.ultipro.as_ref().context("missing [ultipro] settings")
  }

  pub fn google(&self) -> Result<&ImageSearchConfig> {
    self.google.as_ref().context("missing [google] settings")
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn file_settings_are_read() {
    let dir = std::env::temp_dir().join(format!("trail-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("trail.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
      file,
      r#"
database_path = "/var/lib/trail/trail.db"

[slack]
token = "xoxb-1"
channel_id = "C1"

[policy]
track_user_status = true
quiet_statuses = [":coffee: Brb"]
"#
    )
    .unwrap();

    let settings = Settings::load(&path).unwrap();
    std::fs::remove_dir_all(&dir).ok();

    assert_eq!(settings.database_path, PathBuf::from("/var/lib/trail/trail.db"));
    let slack = settings.slack().unwrap();
    assert_eq!(slack.username, "trail");
    assert_eq!(slack.api_url, trail_remote::slack::DEFAULT_API_URL);
    assert!(settings.ultipro().is_err());

    let policy = settings.policy();
    assert!(policy.tracking.track_user_status);
    assert!(policy.tracking.track_supervisor);
    assert!(policy.noise.is_noisy(":coffee: Brb", ""));
    assert!(policy.noise.is_noisy(":slack_call: On a call", ""));
  }

  #[test]
  fn missing_file_uses_defaults() {
    let settings = Settings::load(Path::new("/nonexistent/trail.toml")).unwrap();
    assert_eq!(settings.database_path, PathBuf::from("trail.db"));
    assert!(settings.slack.is_none());
    assert!(!settings.policy().tracking.track_user_status);
  }

  #[test]
  fn tilde_is_expanded() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/trail.db")), PathBuf::from(home).join("trail.db"));
    assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
  }
}
