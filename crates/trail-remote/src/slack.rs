//! Async client for the chat platform's Web API.
//!
//! Supplies the observed user and emoji collections and delivers rendered
//! messages to the announcement channel.

use std::{collections::BTreeMap, time::Duration};

use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use trail_core::{
  announce::Message,
  entity::{Emoji, User},
  store::{Notifier, Source},
};

use crate::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://slack.com/api";

/// Connection settings for the chat platform.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
  /// Bot token, sent as a bearer token.
  pub token:      String,
  /// Channel that receives announcements.
  pub channel_id: String,
  /// Name the announcements are posted under.
  #[serde(default = "default_username")]
  pub username:   String,
  #[serde(default = "default_api_url")]
  pub api_url:    String,
}

fn default_username() -> String { "trail".to_owned() }

fn default_api_url() -> String { DEFAULT_API_URL.to_owned() }

/// Async HTTP client for the chat platform.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct SlackClient {
  client: Client,
  config: SlackConfig,
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Envelope<T> {
  ok:    bool,
  #[serde(default)]
  error: Option<String>,
  #[serde(flatten)]
  body:  T,
}

#[derive(Deserialize)]
struct UsersPage {
  #[serde(default)]
  members:           Vec<Member>,
  #[serde(default)]
  response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize)]
struct ResponseMetadata {
  #[serde(default)]
  next_cursor: String,
}

#[derive(Deserialize)]
struct Member {
  id:        String,
  #[serde(default)]
  name:      String,
  #[serde(default)]
  real_name: String,
  #[serde(default)]
  deleted:   bool,
  #[serde(default)]
  is_admin:  bool,
  #[serde(default)]
  is_bot:    bool,
  #[serde(default)]
  profile:   Profile,
}

#[derive(Deserialize, Default)]
struct Profile {
  #[serde(default)]
  display_name:   String,
  #[serde(default)]
  image_original: String,
  #[serde(default)]
  status_emoji:   String,
  #[serde(default)]
  status_text:    String,
  #[serde(default)]
  title:          String,
}

impl Member {
  fn into_user(self) -> User {
    let status = format!("{} {}", self.profile.status_emoji, self.profile.status_text);
    User {
      id:           self.id,
      name:         self.name,
      real_name:    self.real_name,
      display_name: self.profile.display_name,
      avatar:       self.profile.image_original,
      status:       status.trim().to_owned(),
      title:        self.profile.title,
      admin:        self.is_admin,
      bot:          self.is_bot,
      deleted:      self.deleted,
      created_at:   None,
      deleted_at:   None,
    }
  }
}

#[derive(Deserialize)]
struct EmojiList {
  #[serde(default)]
  emoji: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct PostMessage<'a> {
  channel:     &'a str,
  text:        &'a str,
  username:    &'a str,
  icon_emoji:  &'a str,
  attachments: Vec<PostAttachment<'a>>,
}

#[derive(Serialize)]
struct PostAttachment<'a> {
  image_url: &'a str,
  title:     &'a str,
}

#[derive(Deserialize)]
struct Empty {}

// ─── Client ──────────────────────────────────────────────────────────────────

impl SlackClient {
  pub fn new(config: SlackConfig) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, config })
  }

  fn url(&self, method: &str) -> String {
    format!("{}/{}", self.config.api_url.trim_end_matches('/'), method)
  }

  /// Unwrap the `{ ok, error, ... }` envelope every method answers with.
  async fn decode<T: DeserializeOwned>(
    method: &'static str,
    resp: reqwest::Response,
  ) -> Result<T> {
    let envelope: Envelope<T> = resp.error_for_status()?.json().await?;
    if !envelope.ok {
      return Err(Error::Api {
        method,
        error: envelope.error.unwrap_or_else(|| "unknown_error".to_owned()),
      });
    }
    Ok(envelope.body)
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  /// `GET users.list`, following cursors until exhausted.
  pub async fn list_users(&self) -> Result<Vec<User>> {
    let mut users: Vec<User> = vec![];
    let mut cursor = String::new();

    loop {
      let resp = self
        .client
        .get(self.url("users.list"))
        .bearer_auth(&self.config.token)
        .query(&[("limit", "200"), ("cursor", cursor.as_str())])
        .send()
        .await?;
      let page: UsersPage = Self::decode("users.list", resp).await?;

      users.extend(page.members.into_iter().map(Member::into_user));

      cursor = page
        .response_metadata
        .map(|m| m.next_cursor)
        .unwrap_or_default();
      if cursor.is_empty() {
        break;
      }
    }

    tracing::debug!(count = users.len(), "fetched users");
    Ok(users)
  }

  // ── Emojis ────────────────────────────────────────────────────────────────

  /// `GET emoji.list`: custom emojis only, sorted by name.
  pub async fn list_emojis(&self) -> Result<Vec<Emoji>> {
    let resp = self
      .client
      .get(self.url("emoji.list"))
      .bearer_auth(&self.config.token)
      .send()
      .await?;
    let list: EmojiList = Self::decode("emoji.list", resp).await?;

    Ok(list.emoji.into_keys().map(Emoji::new).collect())
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  /// `POST chat.postMessage` to the announcement channel.
  pub async fn post_message(&self, message: &Message) -> Result<()> {
    let body = PostMessage {
      channel:     &self.config.channel_id,
      text:        &message.text,
      username:    &self.config.username,
      icon_emoji:  &message.icon,
      attachments: message
        .attachments
        .iter()
        .map(|a| PostAttachment { image_url: &a.image_url, title: &a.title })
        .collect(),
    };

    let resp = self
      .client
      .post(self.url("chat.postMessage"))
      .bearer_auth(&self.config.token)
      .json(&body)
      .send()
      .await?;
    Self::decode::<Empty>("chat.postMessage", resp).await?;
    Ok(())
  }
}

// ─── Collaborator impls ──────────────────────────────────────────────────────

impl Source<User> for SlackClient {
  type Error = Error;

  async fn observe(&self) -> Result<Vec<User>> { self.list_users().await }
}

impl Source<Emoji> for SlackClient {
  type Error = Error;

  async fn observe(&self) -> Result<Vec<Emoji>> { self.list_emojis().await }
}

impl Notifier for SlackClient {
  type Error = Error;

  async fn notify(&self, message: &Message) -> Result<()> { self.post_message(message).await }
}
