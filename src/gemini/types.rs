use chrono::{DateTime, Utc};
use serde::Serialize;

/// A Gemini item as the facade sees it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticket {
  pub id: u64,
  pub title: String,
  pub description: String,
  pub status: String,
  pub closed: bool,
  pub priority: Option<String>,
  pub ticket_type: Option<String>,
  pub assignees: Vec<String>,
  pub revised: Option<DateTime<Utc>>,
  /// Linked Zube card numbers
  #[serde(rename = "zubeids")]
  pub card_ids: Vec<u64>,
}

impl Ticket {
  pub fn is_linked_to(&self, card: u64) -> bool {
    self.card_ids.contains(&card)
  }
}

/// The four ticket tables the facade serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketView {
  /// Open tickets already tracked on the kanban board
  Wip,
  All,
  /// Open tickets
  Active,
  /// Open tickets whose status says the ball is in someone else's court
  Waiting,
}

impl TicketView {
  pub fn title(self) -> &'static str {
    match self {
      TicketView::Wip => "WiP",
      TicketView::All => "All",
      TicketView::Active => "Active",
      TicketView::Waiting => "Waiting",
    }
  }

  /// `waiting_statuses` must be lowercase.
  pub fn matches(self, ticket: &Ticket, waiting_statuses: &[String]) -> bool {
    match self {
      TicketView::All => true,
      TicketView::Active => !ticket.closed,
      TicketView::Wip => !ticket.closed && !ticket.card_ids.is_empty(),
      TicketView::Waiting => {
        !ticket.closed && waiting_statuses.contains(&ticket.status.to_lowercase())
      }
    }
  }
}

#[cfg(test)]
pub(crate) fn ticket(id: u64, status: &str, closed: bool, card_ids: &[u64]) -> Ticket {
  Ticket {
    id,
    title: format!("Ticket {}", id),
    description: format!("Description of {}", id),
    status: status.to_string(),
    closed,
    priority: None,
    ticket_type: None,
    assignees: Vec::new(),
    revised: None,
    card_ids: card_ids.to_vec(),
  }
}
