use sha2::{Digest, Sha256};
use std::fmt;

use crate::selector::Selector;
use crate::session::Credentials;

/// Identity of a cached session: who, with which password, on which selector.
///
/// The password is part of the key, so a changed password gets its own entry
/// while the old one lives on until it expires.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey {
  pub credentials: Credentials,
  pub selector: Selector,
}

impl SessionKey {
  pub fn new(credentials: Credentials, selector: Selector) -> Self {
    Self {
      credentials,
      selector,
    }
  }

  /// SHA256 hex digest used as the map key, so no password is held in the
  /// cache index.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    // Length prefixes keep ("ab", "c") and ("a", "bc") apart
    for part in [
      self.credentials.username.as_str(),
      self.credentials.password.as_str(),
      self.selector.code(),
    ] {
      hasher.update((part.len() as u64).to_be_bytes());
      hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
  }
}

impl fmt::Debug for SessionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SessionKey")
      .field("username", &self.credentials.username)
      .field("selector", &self.selector)
      .finish_non_exhaustive()
  }
}
