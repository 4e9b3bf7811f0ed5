//! Gemini ticket service.

pub mod api_types;
pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use client::GeminiClient;
pub use types::{Ticket, TicketView};

/// Operations the facade needs from the ticket service, scoped to one
/// project and workspace.
#[async_trait]
pub trait TicketService: Send + Sync {
  /// Check the credentials the client was built with.
  async fn authenticate(&self) -> Result<()>;

  /// Every ticket in the workspace, closed ones included.
  async fn tickets(&self) -> Result<Vec<Ticket>>;

  /// `None` when the ticket does not exist.
  async fn ticket(&self, id: u64) -> Result<Option<Ticket>>;

  /// Record `card` in the ticket's link field and return the updated ticket.
  async fn add_card_link(&self, id: u64, card: u64) -> Result<Ticket>;

  fn project_page(&self) -> String;

  fn workspace_page(&self) -> String;

  fn ticket_page(&self, id: u64) -> String;
}
