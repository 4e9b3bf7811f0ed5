use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::ZubeConfig;
use crate::error::{Error, Result};
use crate::gemini::client::base_url;
use crate::zube::auth::ZubeAuth;
use crate::zube::types::{ApiNewCard, ApiPage, Card};
use crate::zube::CardService;

/// Zube REST client using the application's own credentials
pub struct ZubeClient {
  http: reqwest::Client,
  auth: Arc<ZubeAuth>,
  base: Url,
  project_id: u64,
}

impl ZubeClient {
  pub fn new(config: &ZubeConfig, auth: Arc<ZubeAuth>) -> Result<Self> {
    let mut headers = HeaderMap::new();
    headers.insert(
      "x-client-id",
      HeaderValue::from_str(&config.client_id)
        .map_err(|e| Error::Upstream(format!("Invalid Zube client id: {}", e)))?,
    );

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;

    Ok(Self {
      http,
      auth,
      base: base_url(&config.url)?,
      project_id: config.project_id,
    })
  }

  fn url(&self, path: &str) -> Result<Url> {
    Ok(self.base.join(path.trim_start_matches('/'))?)
  }

  /// Send with the current access token. A 401 means the token went stale
  /// early, so it is exchanged once more and the request retried.
  async fn send(&self, what: &str, build: impl Fn() -> RequestBuilder + Send) -> Result<Response> {
    let token = self.auth.access_token().await?;
    let response = build().bearer_auth(&token).send().await?;
    if response.status() != StatusCode::UNAUTHORIZED {
      return Self::check(response, what);
    }

    tracing::debug!(what, "Zube rejected access token, renewing");
    self.auth.forget().await;
    let token = self.auth.access_token().await?;
    let response = build().bearer_auth(&token).send().await?;
    Self::check(response, what)
  }

  fn check(response: Response, what: &str) -> Result<Response> {
    if response.status().is_success() {
      Ok(response)
    } else {
      Err(Error::Upstream(format!(
        "Zube {} returned {}",
        what,
        response.status()
      )))
    }
  }
}

#[async_trait]
impl CardService for ZubeClient {
  async fn card(&self, number: u64) -> Result<Option<Card>> {
    let url = self.url("api/cards")?;
    let query = [
      ("where[project_id]", self.project_id.to_string()),
      ("where[number]", number.to_string()),
    ];
    let response = self
      .send(&format!("card {}", number), || {
        self.http.get(url.clone()).query(&query)
      })
      .await?;

    let page: ApiPage<Card> = response
      .json()
      .await
      .map_err(|e| Error::Upstream(format!("Failed to parse card {}: {}", number, e)))?;

    Ok(page.data.into_iter().find(|c| c.number == number))
  }

  async fn create_card(&self, project_id: u64, title: &str, body: &str) -> Result<Card> {
    let url = self.url("api/cards")?;
    let new_card = ApiNewCard {
      project_id,
      title,
      body,
    };
    let response = self
      .send("card creation", || self.http.post(url.clone()).json(&new_card))
      .await?;

    let card: Card = response
      .json()
      .await
      .map_err(|e| Error::Upstream(format!("Failed to parse created card: {}", e)))?;
    tracing::info!(number = card.number, project_id, "Created Zube card");
    Ok(card)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::zube::auth::tests::{mount_token_endpoint, zube_config, TEST_KEY};
  use wiremock::matchers::{body_json, header, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn client(server: &MockServer) -> ZubeClient {
    mount_token_endpoint(server, "tok").await;
    let config = zube_config(server, 3600);
    let auth = Arc::new(ZubeAuth::new(&config, TEST_KEY).unwrap());
    ZubeClient::new(&config, auth).unwrap()
  }

  fn card_json(number: u64) -> serde_json::Value {
    serde_json::json!({ "id": 1000 + number, "number": number, "title": "Broken export", "project_id": 15973 })
  }

  #[tokio::test]
  async fn test_card_lookup_by_number() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/cards"))
      .and(query_param("where[number]", "5"))
      .and(header("authorization", "Bearer tok"))
      .and(header("x-client-id", "client-1"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [card_json(5)] })),
      )
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/cards"))
      .and(query_param("where[number]", "6"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })))
      .mount(&server)
      .await;

    let zube = client(&server).await;
    assert_eq!(zube.card(5).await.unwrap().unwrap().id, 1005);
    assert!(zube.card(6).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_create_card_failure_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/cards"))
      .respond_with(ResponseTemplate::new(422))
      .mount(&server)
      .await;

    let err = client(&server)
      .await
      .create_card(15973, "t", "b")
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Upstream(_)));
  }

  #[tokio::test]
  async fn test_create_card_posts_title_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/cards"))
      .and(body_json(serde_json::json!({
        "project_id": 15973,
        "title": "Broken export",
        "body": "CSV\n\nESUP-42"
      })))
      .respond_with(ResponseTemplate::new(201).set_body_json(card_json(99)))
      .expect(1)
      .mount(&server)
      .await;

    let card = client(&server)
      .await
      .create_card(15973, "Broken export", "CSV\n\nESUP-42")
      .await
      .unwrap();
    assert_eq!(card.number, 99);
  }

  #[tokio::test]
  async fn test_card_lookup_without_data_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/cards"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
      .mount(&server)
      .await;

    assert!(client(&server).await.card(5).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_rejected_token_is_renewed_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/cards"))
      .respond_with(ResponseTemplate::new(401))
      .up_to_n_times(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/cards"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [card_json(5)] })),
      )
      .mount(&server)
      .await;

    let zube = client(&server).await;
    assert_eq!(zube.card(5).await.unwrap().unwrap().number, 5);

    let exchanges = server
      .received_requests()
      .await
      .unwrap()
      .iter()
      .filter(|r| r.url.path() == "/api/users/tokens")
      .count();
    assert_eq!(exchanges, 2);
  }
}
