//! Zube card service.

pub mod auth;
pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use auth::ZubeAuth;
pub use client::ZubeClient;
pub use types::Card;

#[async_trait]
pub trait CardService: Send + Sync {
  /// Look a card up by its project-local number. `None` when absent.
  async fn card(&self, number: u64) -> Result<Option<Card>>;

  /// Create a card in `project_id`. Any failure is an upstream error.
  async fn create_card(&self, project_id: u64, title: &str, body: &str) -> Result<Card>;
}
