//! Request-path error type and its HTTP mapping.

use axum::{
  http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use thiserror::Error;

/// Challenge sent with every 401.
pub const BASIC_CHALLENGE: &str = r#"Basic realm="Login Required""#;

#[derive(Debug, Error)]
pub enum Error {
  /// No usable Basic credentials on the request.
  #[error("Required auth")]
  Unauthenticated,

  /// Gemini rejected the credentials.
  #[error("Invalid LDAP auth for {0}")]
  Authentication(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Unknown selector: {0}")]
  UnknownSelector(String),

  #[error("Bad request: {0}")]
  BadRequest(String),

  /// An upstream call failed or returned something unusable.
  #[error("Upstream error: {0}")]
  Upstream(String),

  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("Invalid URL: {0}")]
  InvalidUrl(#[from] url::ParseError),

  /// Signing the Zube refresh token failed.
  #[error("Token error: {0}")]
  Token(#[from] jsonwebtoken::errors::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
  pub fn status(&self) -> StatusCode {
    match self {
      Error::Unauthenticated | Error::Authentication(_) => StatusCode::UNAUTHORIZED,
      Error::NotFound(_) | Error::UnknownSelector(_) => StatusCode::NOT_FOUND,
      Error::BadRequest(_) => StatusCode::BAD_REQUEST,
      Error::Upstream(_) | Error::Http(_) | Error::InvalidUrl(_) | Error::Token(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  fn code(&self) -> &'static str {
    match self {
      Error::Unauthenticated => "unauthenticated",
      Error::Authentication(_) => "authentication_failed",
      Error::NotFound(_) => "not_found",
      Error::UnknownSelector(_) => "unknown_selector",
      Error::BadRequest(_) => "bad_request",
      Error::Upstream(_) | Error::Http(_) | Error::InvalidUrl(_) | Error::Token(_) => {
        "upstream_error"
      }
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    let code = self.code();
    let message = self.to_string();

    if status.is_server_error() {
      tracing::error!(status = %status, code, error = %message, "Upstream failure");
    } else {
      tracing::warn!(status = %status, code, error = %message, "Request rejected");
    }

    let body = serde_json::json!({
      "error": message,
      "code": code,
    });

    let mut response = (status, Json(body)).into_response();
    if status == StatusCode::UNAUTHORIZED {
      response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_CHALLENGE));
    }
    response
  }
}
