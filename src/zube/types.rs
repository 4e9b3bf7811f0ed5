use serde::{Deserialize, Serialize};

/// Zube card, passed through to callers as JSON
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Card {
  pub id: u64,
  pub number: u64,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub body: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub priority: Option<u8>,
  #[serde(default)]
  pub points: Option<f64>,
  pub project_id: Option<u64>,
}

/// Paginated list envelope used by every Zube collection endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct ApiPage<T> {
  #[serde(default = "Vec::new")]
  pub data: Vec<T>,
}

/// Body of `POST api/users/tokens`
#[derive(Debug, Deserialize)]
pub(crate) struct ApiAccessToken {
  pub access_token: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiNewCard<'a> {
  pub project_id: u64,
  pub title: &'a str,
  pub body: &'a str,
}

#[cfg(test)]
pub(crate) fn card(number: u64) -> Card {
  Card {
    id: 1000 + number,
    number,
    title: format!("Card {}", number),
    body: None,
    status: Some("backlog".to_string()),
    priority: None,
    points: None,
    project_id: Some(15973),
  }
}
