//! Authenticated pairing of a Gemini and a Zube client, and the ticket/card
//! operations built on top of it.

use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::{GeminiConfig, ZubeConfig};
use crate::error::{Error, Result};
use crate::gemini::{GeminiClient, Ticket, TicketService, TicketView};
use crate::selector::Selector;
use crate::zube::{Card, CardService, ZubeAuth, ZubeClient};

/// HTTP Basic credentials, passed through to Gemini and never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
  pub username: String,
  pub password: String,
}

impl Credentials {
  pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
    Self {
      username: username.into(),
      password: password.into(),
    }
  }
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("username", &self.username)
      .field("password", &"<redacted>")
      .finish()
  }
}

/// Result of a link request.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
  /// Nothing to do, the ticket already had the link(s)
  AlreadyLinked,
  /// The link was recorded; carries the updated ticket
  Linked(Ticket),
}

/// One user's view of one selector: a Gemini client checked against the
/// user's credentials plus a Zube client using the application's own.
pub struct Session {
  selector: Selector,
  tickets: Arc<dyn TicketService>,
  cards: Arc<dyn CardService>,
  card_project: u64,
  waiting_statuses: Arc<[String]>,
}

impl Session {
  pub fn new(
    selector: Selector,
    tickets: Arc<dyn TicketService>,
    cards: Arc<dyn CardService>,
    card_project: u64,
    waiting_statuses: Arc<[String]>,
  ) -> Self {
    Self {
      selector,
      tickets,
      cards,
      card_project,
      waiting_statuses,
    }
  }

  pub fn selector(&self) -> Selector {
    self.selector
  }

  pub fn project_page(&self) -> String {
    self.tickets.project_page()
  }

  pub fn workspace_page(&self) -> String {
    self.tickets.workspace_page()
  }

  pub fn ticket_page(&self, id: u64) -> String {
    self.tickets.ticket_page(id)
  }

  /// Tickets of the workspace that belong in `view`, in Gemini's order.
  pub async fn list(&self, view: TicketView) -> Result<Vec<Ticket>> {
    let tickets = self.tickets.tickets().await?;
    Ok(
      tickets
        .into_iter()
        .filter(|t| view.matches(t, &self.waiting_statuses))
        .collect(),
    )
  }

  async fn require_ticket(&self, id: u64) -> Result<Ticket> {
    self
      .tickets
      .ticket(id)
      .await?
      .ok_or_else(|| Error::NotFound(format!("ticket {}", id)))
  }

  /// Cards linked to a ticket keyed by card number. Cards deleted on the Zube
  /// side map to `None`.
  pub async fn linked_cards(&self, id: u64) -> Result<BTreeMap<u64, Option<Card>>> {
    let ticket = self.require_ticket(id).await?;
    let cards = try_join_all(ticket.card_ids.iter().map(|n| self.cards.card(*n))).await?;
    Ok(ticket.card_ids.into_iter().zip(cards).collect())
  }

  /// Create a Zube card mirroring the ticket unless it is already linked.
  pub async fn create_linked_card(&self, id: u64) -> Result<LinkOutcome> {
    let ticket = self.require_ticket(id).await?;
    if !ticket.card_ids.is_empty() {
      tracing::debug!(ticket = id, cards = ?ticket.card_ids, "Ticket already linked");
      return Ok(LinkOutcome::AlreadyLinked);
    }

    let body = format!("{}\n\n{}-{}", ticket.description, self.selector, id);
    let card = self
      .cards
      .create_card(self.card_project, &ticket.title, &body)
      .await
      .map_err(|e| match e {
        e @ Error::Upstream(_) => e,
        other => Error::Upstream(format!("Card creation failed: {}", other)),
      })?;

    let updated = self.tickets.add_card_link(id, card.number).await?;
    Ok(LinkOutcome::Linked(updated))
  }

  /// Link an existing Zube card to the ticket.
  pub async fn attach_card(&self, id: u64, card: u64) -> Result<LinkOutcome> {
    let ticket = self.require_ticket(id).await?;
    if ticket.is_linked_to(card) {
      return Ok(LinkOutcome::AlreadyLinked);
    }

    if self.cards.card(card).await?.is_none() {
      return Err(Error::NotFound(format!("card {}", card)));
    }

    let updated = self.tickets.add_card_link(id, card).await?;
    Ok(LinkOutcome::Linked(updated))
  }
}

/// Builds authenticated sessions on cache misses.
#[async_trait]
pub trait SessionFactory: Send + Sync {
  /// Fails with `Error::Authentication` when Gemini rejects the credentials.
  async fn connect(&self, credentials: &Credentials, selector: Selector) -> Result<Session>;
}

/// Factory wiring the real Gemini and Zube clients. Every session shares
/// the one Zube client, which acts as the application rather than the user.
pub struct UpstreamFactory {
  gemini: GeminiConfig,
  cards: Arc<ZubeClient>,
  card_project: u64,
  waiting_statuses: Arc<[String]>,
}

impl UpstreamFactory {
  /// `zube_key` is the PEM encoded private key Zube knows the client by.
  pub fn new(gemini: GeminiConfig, zube: &ZubeConfig, zube_key: &[u8]) -> Result<Self> {
    let auth = Arc::new(ZubeAuth::new(zube, zube_key)?);
    let waiting_statuses = gemini.waiting_statuses.clone().into();
    Ok(Self {
      gemini,
      cards: Arc::new(ZubeClient::new(zube, auth)?),
      card_project: zube.project_id,
      waiting_statuses,
    })
  }
}

#[async_trait]
impl SessionFactory for UpstreamFactory {
  async fn connect(&self, credentials: &Credentials, selector: Selector) -> Result<Session> {
    let workspace = self
      .gemini
      .workspace(selector)
      .ok_or_else(|| Error::UnknownSelector(selector.to_string()))?;

    let gemini = GeminiClient::new(
      &self.gemini,
      workspace,
      &credentials.username,
      &credentials.password,
    )?;
    gemini.authenticate().await?;

    Ok(Session::new(
      selector,
      Arc::new(gemini),
      self.cards.clone(),
      self.card_project,
      Arc::clone(&self.waiting_statuses),
    ))
  }
}
