//! Custom image search, used by `trail test images`.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::Result;

pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/customsearch/v1";

#[derive(Debug, Clone, Deserialize)]
pub struct ImageSearchConfig {
  /// Search engine id.
  pub cx:      String,
  pub key:     String,
  #[serde(default = "default_api_url")]
  pub api_url: String,
}

fn default_api_url() -> String { DEFAULT_API_URL.to_owned() }

#[derive(Clone)]
pub struct ImageSearch {
  client: Client,
  config: ImageSearchConfig,
}

#[derive(Deserialize)]
struct SearchResult {
  #[serde(default)]
  items: Vec<Item>,
}

#[derive(Deserialize)]
struct Item {
  image: Image,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Image {
  thumbnail_link: String,
}

impl ImageSearch {
  pub fn new(config: ImageSearchConfig) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, config })
  }

  /// Thumbnail links for `query`, in ranking order.
  pub async fn search(&self, query: &str) -> Result<Vec<String>> {
    let result: SearchResult = self
      .client
      .get(&self.config.api_url)
      .query(&[
        ("q", query),
        ("searchType", "image"),
        ("cx", self.config.cx.as_str()),
        ("key", self.config.key.as_str()),
      ])
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    Ok(result.items.into_iter().map(|i| i.image.thumbnail_link).collect())
  }
}
