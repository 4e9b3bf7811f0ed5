//! Zube application credentials.
//!
//! Zube authenticates API clients with a short-lived refresh JWT, signed
//! RS256 with the client's private key, which is exchanged for an access
//! token. The access token is kept until `token_lifetime_secs` runs out or
//! Zube rejects it.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

use crate::config::ZubeConfig;
use crate::error::{Error, Result};
use crate::gemini::client::base_url;
use crate::zube::types::ApiAccessToken;

/// Zube refuses refresh tokens valid for longer than a minute.
const REFRESH_TTL_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct RefreshClaims<'a> {
  iat: i64,
  exp: i64,
  iss: &'a str,
}

struct AccessToken {
  value: String,
  expires_at: Instant,
}

pub struct ZubeAuth {
  http: reqwest::Client,
  token_url: Url,
  client_id: String,
  key: EncodingKey,
  lifetime: Duration,
  token: Mutex<Option<AccessToken>>,
}

impl ZubeAuth {
  /// `pem` is the client's RSA private key, PKCS#1 or PKCS#8.
  pub fn new(config: &ZubeConfig, pem: &[u8]) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;

    Ok(Self {
      http,
      token_url: base_url(&config.url)?.join("api/users/tokens")?,
      client_id: config.client_id.clone(),
      key: EncodingKey::from_rsa_pem(pem)?,
      lifetime: Duration::from_secs(config.token_lifetime_secs),
      token: Mutex::new(None),
    })
  }

  fn refresh_jwt(&self) -> Result<String> {
    let now = Utc::now().timestamp();
    let claims = RefreshClaims {
      iat: now,
      exp: now + REFRESH_TTL_SECS,
      iss: &self.client_id,
    };
    Ok(jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)?)
  }

  /// Current access token, exchanging a fresh one when none is held or the
  /// held one is too old. Concurrent callers share one exchange.
  pub async fn access_token(&self) -> Result<String> {
    let mut token = self.token.lock().await;
    if let Some(held) = token.as_ref() {
      if Instant::now() < held.expires_at {
        return Ok(held.value.clone());
      }
    }

    let response = self
      .http
      .post(self.token_url.clone())
      .bearer_auth(self.refresh_jwt()?)
      .header("x-client-id", &self.client_id)
      .send()
      .await?;
    if !response.status().is_success() {
      return Err(Error::Upstream(format!(
        "Zube token exchange returned {}",
        response.status()
      )));
    }

    let issued: ApiAccessToken = response
      .json()
      .await
      .map_err(|e| Error::Upstream(format!("Failed to parse Zube access token: {}", e)))?;
    tracing::info!(client_id = %self.client_id, "Obtained Zube access token");

    *token = Some(AccessToken {
      value: issued.access_token.clone(),
      expires_at: Instant::now() + self.lifetime,
    });
    Ok(issued.access_token)
  }

  /// Drop the held access token so the next call exchanges a new one.
  pub async fn forget(&self) {
    self.token.lock().await.take();
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use jsonwebtoken::{DecodingKey, Validation};
  use wiremock::matchers::{header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  pub(crate) const TEST_KEY: &[u8] = include_bytes!("../../testdata/zube_key.pem");
  const TEST_PUBLIC_KEY: &[u8] = include_bytes!("../../testdata/zube_key.pub.pem");

  pub(crate) fn zube_config(server: &MockServer, token_lifetime_secs: u64) -> ZubeConfig {
    ZubeConfig {
      url: server.uri(),
      client_id: "client-1".to_string(),
      private_key: "testdata/zube_key.pem".into(),
      project_id: 15973,
      timeout_secs: 5,
      token_lifetime_secs,
    }
  }

  pub(crate) async fn mount_token_endpoint(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
      .and(path("/api/users/tokens"))
      .and(header("x-client-id", "client-1"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "access_token": token })),
      )
      .mount(server)
      .await;
  }

  #[test]
  fn test_rejects_malformed_key() {
    let config = ZubeConfig {
      url: "https://zube.io".to_string(),
      client_id: "client-1".to_string(),
      private_key: "unused".into(),
      project_id: 1,
      timeout_secs: 5,
      token_lifetime_secs: 60,
    };
    assert!(matches!(
      ZubeAuth::new(&config, b"not a key"),
      Err(Error::Token(_))
    ));
  }

  #[tokio::test]
  async fn test_refresh_jwt_is_signed_for_client() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok").await;

    let auth = ZubeAuth::new(&zube_config(&server, 3600), TEST_KEY).unwrap();
    assert_eq!(auth.access_token().await.unwrap(), "tok");

    let requests = server.received_requests().await.unwrap();
    let bearer = requests[0].headers["authorization"].to_str().unwrap();
    let jwt = bearer.strip_prefix("Bearer ").unwrap();

    let decoded = jsonwebtoken::decode::<serde_json::Value>(
      jwt,
      &DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY).unwrap(),
      &Validation::new(Algorithm::RS256),
    )
    .unwrap();
    assert_eq!(decoded.claims["iss"], "client-1");
    let iat = decoded.claims["iat"].as_i64().unwrap();
    assert_eq!(decoded.claims["exp"].as_i64().unwrap() - iat, REFRESH_TTL_SECS);
  }

  #[tokio::test]
  async fn test_token_reused_until_lifetime_ends() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok").await;

    let auth = ZubeAuth::new(&zube_config(&server, 3600), TEST_KEY).unwrap();
    auth.access_token().await.unwrap();
    auth.access_token().await.unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    let expiring = ZubeAuth::new(&zube_config(&server, 0), TEST_KEY).unwrap();
    expiring.access_token().await.unwrap();
    expiring.access_token().await.unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
  }

  #[tokio::test]
  async fn test_forget_forces_new_exchange() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok").await;

    let auth = ZubeAuth::new(&zube_config(&server, 3600), TEST_KEY).unwrap();
    auth.access_token().await.unwrap();
    auth.forget().await;
    auth.access_token().await.unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn test_failed_exchange_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/users/tokens"))
      .respond_with(ResponseTemplate::new(401))
      .mount(&server)
      .await;

    let auth = ZubeAuth::new(&zube_config(&server, 3600), TEST_KEY).unwrap();
    assert!(matches!(
      auth.access_token().await,
      Err(Error::Upstream(_))
    ));
  }
}
