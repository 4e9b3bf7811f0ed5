use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use std::time::Duration;
use url::Url;

use crate::config::{GeminiConfig, Workspace};
use crate::error::{Error, Result};
use crate::gemini::api_types::{format_card_ids, parse_card_ids, ApiItem, ApiItemsFilter};
use crate::gemini::types::Ticket;
use crate::gemini::TicketService;

/// Gemini REST client authenticated as one user and scoped to one workspace
pub struct GeminiClient {
  http: reqwest::Client,
  base: Url,
  username: String,
  password: String,
  workspace: Workspace,
  link_field: String,
}

impl GeminiClient {
  pub fn new(
    config: &GeminiConfig,
    workspace: Workspace,
    username: &str,
    password: &str,
  ) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;

    Ok(Self {
      http,
      base: base_url(&config.url)?,
      username: username.to_string(),
      password: password.to_string(),
      workspace,
      link_field: config.link_field.clone(),
    })
  }

  fn url(&self, path: &str) -> Result<Url> {
    Ok(self.base.join(path.trim_start_matches('/'))?)
  }

  fn get(&self, url: Url) -> reqwest::RequestBuilder {
    self
      .http
      .get(url)
      .basic_auth(&self.username, Some(&self.password))
  }

  /// Map auth failures and other non-success statuses to errors
  fn check(&self, response: Response, what: &str) -> Result<Response> {
    match response.status() {
      s if s.is_success() => Ok(response),
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
        Err(Error::Authentication(self.username.clone()))
      }
      s => Err(Error::Upstream(format!("Gemini {} returned {}", what, s))),
    }
  }

  async fn fetch_item(&self, id: u64) -> Result<Option<ApiItem>> {
    let url = self.url(&format!("api/items/{}", id))?;
    let response = self.get(url).send().await?;
    if response.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }

    let response = self.check(response, &format!("item {}", id))?;
    let item: Option<ApiItem> = response
      .json()
      .await
      .map_err(|e| Error::Upstream(format!("Failed to parse item {}: {}", id, e)))?;
    Ok(item)
  }
}

#[async_trait]
impl TicketService for GeminiClient {
  async fn authenticate(&self) -> Result<()> {
    // One segment, so LDAP names like `CORP\ada` survive
    let mut url = self.url("api/users/username/")?;
    url
      .path_segments_mut()
      .map_err(|_| Error::Upstream(format!("Gemini URL {} cannot take a path", self.base)))?
      .pop_if_empty()
      .push(&self.username);

    let response = self.get(url).send().await?;
    if response.status() == StatusCode::NOT_FOUND {
      // Unknown user, same as a wrong password to the caller
      return Err(Error::Authentication(self.username.clone()));
    }
    self.check(response, "authentication")?;
    tracing::debug!(user = %self.username, "Gemini accepted credentials");
    Ok(())
  }

  async fn tickets(&self) -> Result<Vec<Ticket>> {
    let url = self.url("api/items/filtered")?;
    let filter = ApiItemsFilter {
      projects: self.workspace.project_id.to_string(),
      saved_card_id: self.workspace.workspace_id,
      include_closed: true,
    };

    let response = self
      .http
      .post(url)
      .basic_auth(&self.username, Some(&self.password))
      .json(&filter)
      .send()
      .await?;
    let response = self.check(response, "item search")?;

    let items: Vec<ApiItem> = response
      .json()
      .await
      .map_err(|e| Error::Upstream(format!("Failed to parse items: {}", e)))?;

    Ok(
      items
        .into_iter()
        .map(|item| item.into_ticket(&self.link_field))
        .collect(),
    )
  }

  async fn ticket(&self, id: u64) -> Result<Option<Ticket>> {
    Ok(
      self
        .fetch_item(id)
        .await?
        .map(|item| item.into_ticket(&self.link_field)),
    )
  }

  async fn add_card_link(&self, id: u64, card: u64) -> Result<Ticket> {
    let item = self
      .fetch_item(id)
      .await?
      .ok_or_else(|| Error::NotFound(format!("ticket {}", id)))?;

    let field = item.custom_field(&self.link_field).ok_or_else(|| {
      Error::Upstream(format!(
        "Ticket {} has no '{}' custom field",
        id, self.link_field
      ))
    })?;

    let mut ids = parse_card_ids(field.stored_data());
    if !ids.contains(&card) {
      ids.push(card);

      let mut entity = field.entity.clone();
      entity.issue_id = id;
      entity.project_id = item.base_entity.project_id;
      entity.data = Some(format_card_ids(&ids));

      let url = self.url("api/items/customfield")?;
      let response = self
        .http
        .put(url)
        .basic_auth(&self.username, Some(&self.password))
        .json(&entity)
        .send()
        .await?;
      self.check(response, &format!("custom field update on {}", id))?;
      tracing::info!(ticket = id, card, "Linked Zube card");
    }

    self
      .ticket(id)
      .await?
      .ok_or_else(|| Error::Upstream(format!("Ticket {} vanished after update", id)))
  }

  fn project_page(&self) -> String {
    format!(
      "{}project/{}",
      self.base, self.workspace.project_id
    )
  }

  fn workspace_page(&self) -> String {
    format!("{}workspace/{}/items", self.base, self.workspace.workspace_id)
  }

  fn ticket_page(&self, id: u64) -> String {
    format!(
      "{}workspace/{}/item/{}",
      self.base, self.workspace.workspace_id, id
    )
  }
}

/// `Url::join` drops the last segment unless the base ends with a slash.
pub(crate) fn base_url(raw: &str) -> Result<Url> {
  let mut url = Url::parse(raw)?;
  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }
  Ok(url)
}
