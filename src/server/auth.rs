//! Request extractors for HTTP Basic credentials and the cache bypass hint.

use axum::{
  extract::FromRequestParts,
  http::{
    header::{AUTHORIZATION, CACHE_CONTROL},
    request::Parts,
  },
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::convert::Infallible;

use crate::error::Error;
use crate::session::Credentials;

/// Credentials from an `Authorization: Basic ...` header.
///
/// Missing or malformed headers reject with `Error::Unauthenticated`, which
/// renders as a 401 carrying the Basic challenge.
#[derive(Debug, Clone)]
pub struct BasicAuth(pub Credentials);

impl<S: Send + Sync> FromRequestParts<S> for BasicAuth {
  type Rejection = Error;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let header = parts
      .headers
      .get(AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .ok_or(Error::Unauthenticated)?;

    parse_basic(header)
      .map(BasicAuth)
      .ok_or(Error::Unauthenticated)
  }
}

fn parse_basic(header: &str) -> Option<Credentials> {
  let (scheme, encoded) = header.trim().split_once(' ')?;
  if !scheme.eq_ignore_ascii_case("basic") {
    return None;
  }

  let decoded = STANDARD.decode(encoded.trim()).ok()?;
  let decoded = String::from_utf8(decoded).ok()?;
  let (username, password) = decoded.split_once(':')?;
  if username.is_empty() {
    return None;
  }
  Some(Credentials::new(username, password))
}

/// Whether the client asked to bypass cached sessions (`Cache-Control: max-age=0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheBypass(pub bool);

impl<S: Send + Sync> FromRequestParts<S> for CacheBypass {
  type Rejection = Infallible;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let bypass = parts
      .headers
      .get(CACHE_CONTROL)
      .and_then(|v| v.to_str().ok())
      .is_some_and(|v| v.trim().eq_ignore_ascii_case("max-age=0"));
    Ok(CacheBypass(bypass))
  }
}
