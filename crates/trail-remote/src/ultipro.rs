//! Logged-in session against the HR system's org chart service.

use std::time::Duration;

use reqwest::{Client, header::ACCEPT};
use scraper::{Html, Selector};
use serde::Deserialize;
use trail_core::hierarchy::{OrgChart, OrgNode};

use crate::{Error, Result};

const LOGIN_PATH: &str = "/Login.aspx";
const ORG_HIERARCHY_PATH: &str = "/services/OrganizationWebService.svc/OrgHierarchy";

#[derive(Debug, Clone, Deserialize)]
pub struct UltiproConfig {
  /// e.g. `https://nw11.ultipro.com`
  pub base_url:   String,
  pub username:   String,
  pub password:   String,
  /// Company code passed as `coid`.
  pub company_id: String,
  /// Employee the walk starts from.
  pub root_id:    String,
}

/// A cookie-carrying session. Construct with [`UltiproClient::connect`].
#[derive(Clone)]
pub struct UltiproClient {
  client: Client,
  config: UltiproConfig,
}

#[derive(Deserialize)]
struct OrgHierarchy {
  #[serde(rename = "orgChart")]
  org_chart: RawOrgNode,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrgNode {
  employee_id:         String,
  #[serde(default)]
  employee_name:       String,
  #[serde(default)]
  supervisor_id:       Option<String>,
  #[serde(default)]
  direct_report_count: u32,
  #[serde(default)]
  children:            Option<Vec<RawOrgNode>>,
}

impl RawOrgNode {
  fn into_node(self) -> OrgNode {
    OrgNode {
      id:                  self.employee_id,
      name:                self.employee_name,
      supervisor_id:       self.supervisor_id.unwrap_or_default(),
      direct_report_count: self.direct_report_count,
      reports:             self
        .children
        .unwrap_or_default()
        .into_iter()
        .map(RawOrgNode::into_node)
        .collect(),
    }
  }
}

/// Collect the ASP.NET hidden state fields (`__VIEWSTATE` and friends) from
/// the login page.
fn hidden_fields(page: &str) -> Result<Vec<(String, String)>> {
  let selector = Selector::parse(r#"input[id^="__"]"#)
    .map_err(|e| Error::Login(format!("bad selector: {e}")))?;
  let document = Html::parse_document(page);

  Ok(
    document
      .select(&selector)
      .filter_map(|input| {
        let id = input.value().attr("id")?;
        let value = input.value().attr("value").unwrap_or_default();
        Some((id.to_owned(), value.to_owned()))
      })
      .collect(),
  )
}

impl UltiproClient {
  /// Log in and return a client holding the session cookies.
  pub async fn connect(config: UltiproConfig) -> Result<Self> {
    let client = Client::builder()
      .cookie_store(true)
      .timeout(Duration::from_secs(60))
      .build()?;
    let this = Self { client, config };
    this.login().await?;
    Ok(this)
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  async fn login(&self) -> Result<()> {
    let page = self
      .client
      .get(self.url(LOGIN_PATH))
      .send()
      .await?
      .error_for_status()?
      .text()
      .await?;

    let mut form = hidden_fields(&page)?;
    tracing::debug!(fields = form.len(), "scraped login form");

    form.extend([
      ("ctl00$Content$Login1$UserName".to_owned(), self.config.username.clone()),
      ("ctl00$Content$Login1$Password".to_owned(), self.config.password.clone()),
      ("ctl00$Content$Login1$LoginButton".to_owned(), "Log in".to_owned()),
      ("ctl00$Content$languageSelection".to_owned(), "0".to_owned()),
    ]);

    let resp = self
      .client
      .post(self.url(LOGIN_PATH))
      .form(&form)
      .send()
      .await?
      .error_for_status()?;

    // A successful login redirects away from the form.
    if resp.url().path().eq_ignore_ascii_case(LOGIN_PATH) {
      return Err(Error::Login(format!(
        "still on the login page after signing in as {}",
        self.config.username
      )));
    }

    tracing::info!(username = %self.config.username, "logged in to org chart");
    Ok(())
  }

  pub fn root_id(&self) -> &str { &self.config.root_id }

  /// `GET OrgHierarchy` for one employee.
  pub async fn org_hierarchy(&self, employee_id: &str) -> Result<OrgNode> {
    let body: OrgHierarchy = self
      .client
      .get(self.url(ORG_HIERARCHY_PATH))
      .query(&[("coid", self.config.company_id.as_str()), ("eeid", employee_id)])
      .header(ACCEPT, "application/json, text/javascript, */*")
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    Ok(body.org_chart.into_node())
  }
}

impl OrgChart for UltiproClient {
  type Error = Error;

  async fn fetch(&self, id: &str) -> Result<OrgNode> { self.org_hierarchy(id).await }
}
