//! In-memory Gemini and Zube stand-ins shared by the unit tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::gemini::{Ticket, TicketService};
use crate::selector::Selector;
use crate::session::{Credentials, Session, SessionFactory};
use crate::zube::types::card;
use crate::zube::{Card, CardService};

#[derive(Default)]
pub struct FakeTickets {
  tickets: Mutex<BTreeMap<u64, Ticket>>,
  pub link_calls: AtomicUsize,
}

impl FakeTickets {
  pub fn with(tickets: Vec<Ticket>) -> Arc<Self> {
    Arc::new(Self {
      tickets: Mutex::new(tickets.into_iter().map(|t| (t.id, t)).collect()),
      link_calls: AtomicUsize::new(0),
    })
  }

  pub fn get(&self, id: u64) -> Option<Ticket> {
    self.tickets.lock().unwrap().get(&id).cloned()
  }
}

#[async_trait]
impl TicketService for FakeTickets {
  async fn authenticate(&self) -> Result<()> {
    Ok(())
  }

  async fn tickets(&self) -> Result<Vec<Ticket>> {
    Ok(self.tickets.lock().unwrap().values().cloned().collect())
  }

  async fn ticket(&self, id: u64) -> Result<Option<Ticket>> {
    Ok(self.get(id))
  }

  async fn add_card_link(&self, id: u64, card: u64) -> Result<Ticket> {
    self.link_calls.fetch_add(1, Ordering::SeqCst);
    let mut tickets = self.tickets.lock().unwrap();
    let ticket = tickets
      .get_mut(&id)
      .ok_or_else(|| Error::NotFound(format!("ticket {}", id)))?;
    if !ticket.card_ids.contains(&card) {
      ticket.card_ids.push(card);
    }
    Ok(ticket.clone())
  }

  fn project_page(&self) -> String {
    "https://gemini.test/project/46".to_string()
  }

  fn workspace_page(&self) -> String {
    "https://gemini.test/workspace/4236/items".to_string()
  }

  fn ticket_page(&self, id: u64) -> String {
    format!("https://gemini.test/workspace/4236/item/{}", id)
  }
}

#[derive(Default)]
pub struct FakeCards {
  cards: Mutex<BTreeMap<u64, Card>>,
  /// Number handed to the next created card; creation fails when unset
  next_number: Option<u64>,
  pub create_calls: AtomicUsize,
  pub created: Mutex<Vec<(u64, String, String)>>,
}

impl FakeCards {
  pub fn with(cards: Vec<Card>) -> Arc<Self> {
    Arc::new(Self {
      cards: Mutex::new(cards.into_iter().map(|c| (c.number, c)).collect()),
      ..Default::default()
    })
  }

  pub fn creating(cards: Vec<Card>, next_number: u64) -> Arc<Self> {
    Arc::new(Self {
      cards: Mutex::new(cards.into_iter().map(|c| (c.number, c)).collect()),
      next_number: Some(next_number),
      ..Default::default()
    })
  }
}

#[async_trait]
impl CardService for FakeCards {
  async fn card(&self, number: u64) -> Result<Option<Card>> {
    Ok(self.cards.lock().unwrap().get(&number).cloned())
  }

  async fn create_card(&self, project_id: u64, title: &str, body: &str) -> Result<Card> {
    self.create_calls.fetch_add(1, Ordering::SeqCst);
    self
      .created
      .lock()
      .unwrap()
      .push((project_id, title.to_string(), body.to_string()));

    let number = self
      .next_number
      .ok_or_else(|| Error::Upstream("Zube card creation returned 500".to_string()))?;
    let created = Card {
      title: title.to_string(),
      body: Some(body.to_string()),
      ..card(number)
    };
    self.cards.lock().unwrap().insert(number, created.clone());
    Ok(created)
  }
}

/// Session factory accepting a single password and counting connections.
pub struct FakeFactory {
  pub tickets: Arc<FakeTickets>,
  pub cards: Arc<FakeCards>,
  password: String,
  delay: Duration,
  /// Connections for the user named "slow" park here until notified
  pub gate: Arc<Notify>,
  pub connects: AtomicUsize,
}

impl FakeFactory {
  pub fn new(tickets: Arc<FakeTickets>, cards: Arc<FakeCards>) -> Self {
    Self {
      tickets,
      cards,
      password: "secret".to_string(),
      delay: Duration::ZERO,
      gate: Arc::new(Notify::new()),
      connects: AtomicUsize::new(0),
    }
  }

  pub fn empty() -> Self {
    Self::new(FakeTickets::with(Vec::new()), FakeCards::with(Vec::new()))
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn connects(&self) -> usize {
    self.connects.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl SessionFactory for FakeFactory {
  async fn connect(&self, credentials: &Credentials, selector: Selector) -> Result<Session> {
    self.connects.fetch_add(1, Ordering::SeqCst);
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    if credentials.username == "slow" {
      self.gate.notified().await;
    }
    if credentials.password != self.password {
      return Err(Error::Authentication(credentials.username.clone()));
    }

    Ok(Session::new(
      selector,
      self.tickets.clone(),
      self.cards.clone(),
      15973,
      vec!["responded".to_string()].into(),
    ))
  }
}
