use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::selector::Selector;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub server: ServerConfig,
  pub gemini: GeminiConfig,
  pub zube: ZubeConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Directory for the rolling JSON log file (console only if unset)
  pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_bind")]
  pub bind: SocketAddr,
  /// Prefix used when building links in rendered pages
  #[serde(default = "default_context_root")]
  pub context_root: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind: default_bind(),
      context_root: default_context_root(),
    }
  }
}

fn default_bind() -> SocketAddr {
  SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_context_root() -> String {
  "/".to_string()
}

/// Gemini project and workspace scoping one selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct Workspace {
  pub project_id: u64,
  pub workspace_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
  pub url: String,
  /// Custom field holding the comma separated Zube card numbers
  #[serde(default = "default_link_field")]
  pub link_field: String,
  /// Statuses that put an open ticket in the "waiting" view (case-insensitive)
  #[serde(default = "default_waiting_statuses", deserialize_with = "deserialize_lowercase_vec")]
  pub waiting_statuses: Vec<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  pub workspaces: BTreeMap<Selector, Workspace>,
}

fn default_link_field() -> String {
  "Zube".to_string()
}

fn default_waiting_statuses() -> Vec<String> {
  vec!["responded".to_string(), "waiting".to_string()]
}

fn default_timeout_secs() -> u64 {
  30
}

fn deserialize_lowercase_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  Ok(v.into_iter().map(|s| s.to_lowercase()).collect())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZubeConfig {
  #[serde(default = "default_zube_url")]
  pub url: String,
  pub client_id: String,
  /// PEM file holding the client's RSA private key
  pub private_key: PathBuf,
  /// Project new cards are created in
  pub project_id: u64,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// How long an exchanged access token is reused. Zube issues them for a
  /// day, so the default renews an hour early.
  #[serde(default = "default_token_lifetime_secs")]
  pub token_lifetime_secs: u64,
}

fn default_token_lifetime_secs() -> u64 {
  23 * 60 * 60
}

impl ZubeConfig {
  pub fn read_private_key(&self) -> Result<Vec<u8>> {
    std::fs::read(&self.private_key).map_err(|e| {
      eyre!(
        "Failed to read Zube private key {}: {}",
        self.private_key.display(),
        e
      )
    })
  }
}

fn default_zube_url() -> String {
  "https://zube.io".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_lifespan_secs")]
  pub lifespan_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      lifespan_secs: default_lifespan_secs(),
    }
  }
}

fn default_lifespan_secs() -> u64 {
  30
}

impl CacheConfig {
  pub fn lifespan(&self) -> Duration {
    Duration::from_secs(self.lifespan_secs)
  }
}

impl GeminiConfig {
  /// Workspace for a selector. Presence of every selector is checked at load time.
  pub fn workspace(&self, selector: Selector) -> Option<Workspace> {
    self.workspaces.get(&selector).copied()
  }
}

impl Config {
  /// Load configuration from `explicit_path`, or from the first of
  /// `search_paths` that exists.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = match explicit_path {
      Some(p) => p.to_path_buf(),
      None => Self::search_paths()
        .into_iter()
        .find(|p| p.exists())
        .ok_or_else(|| {
          eyre!("No configuration file found. Create ./geminhack.yaml or ~/.config/geminhack/config.yaml")
        })?,
    };

    let contents = std::fs::read_to_string(&path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
    Self::parse(&contents).map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  /// ./geminhack.yaml, then $XDG_CONFIG_HOME/geminhack/config.yaml
  fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("geminhack.yaml")];
    if let Some(dir) = dirs::config_dir() {
      paths.push(dir.join("geminhack").join("config.yaml"));
    }
    paths
  }

  /// Parse and validate a YAML document.
  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    let missing: Vec<&str> = Selector::ALL
      .into_iter()
      .filter(|sel| !self.gemini.workspaces.contains_key(sel))
      .map(Selector::code)
      .collect();
    if !missing.is_empty() {
      return Err(eyre!(
        "gemini.workspaces is missing selectors: {}",
        missing.join(", ")
      ));
    }

    let mut seen: HashMap<Workspace, Selector> = HashMap::new();
    for (&selector, &workspace) in &self.gemini.workspaces {
      if let Some(other) = seen.insert(workspace, selector) {
        return Err(eyre!(
          "gemini.workspaces: {} and {} share project {} workspace {}",
          other,
          selector,
          workspace.project_id,
          workspace.workspace_id
        ));
      }
    }

    url::Url::parse(&self.gemini.url).map_err(|e| eyre!("Invalid gemini.url: {}", e))?;
    url::Url::parse(&self.zube.url).map_err(|e| eyre!("Invalid zube.url: {}", e))?;

    if self.cache.lifespan_secs == 0 {
      return Err(eyre!("cache.lifespan_secs must be greater than zero"));
    }
    Ok(())
  }
}
