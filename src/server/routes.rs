use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{Html, IntoResponse, Response},
  Json,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::SessionKey;
use crate::error::{Error, Result};
use crate::gemini::TicketView;
use crate::selector::Selector;
use crate::session::{LinkOutcome, Session};
use crate::zube::Card;

use super::auth::{BasicAuth, CacheBypass};
use super::render;
use super::AppState;

fn parse_id(raw: &str, what: &str) -> Result<u64> {
  raw
    .trim()
    .parse()
    .map_err(|_| Error::BadRequest(format!("{} id '{}' is not a number", what, raw)))
}

async fn session(
  state: &AppState,
  BasicAuth(credentials): BasicAuth,
  CacheBypass(bypass): CacheBypass,
  selector: Selector,
) -> Result<Arc<Session>> {
  let key = SessionKey::new(credentials, selector);
  state.cache.get_or_create(&key, bypass).await
}

fn link_response(outcome: LinkOutcome, created: StatusCode) -> Response {
  match outcome {
    LinkOutcome::AlreadyLinked => (StatusCode::OK, Json(serde_json::json!({}))).into_response(),
    LinkOutcome::Linked(ticket) => (created, Json(ticket)).into_response(),
  }
}

pub async fn home(State(state): State<AppState>) -> Html<String> {
  Html(render::landing(&state.context_root, &state.gemini_url))
}

async fn ticket_table(
  state: AppState,
  auth: BasicAuth,
  bypass: CacheBypass,
  selector: &str,
  view: TicketView,
) -> Result<Html<String>> {
  let selector: Selector = selector.parse()?;
  let session = session(&state, auth, bypass, selector).await?;
  let rows = session.list(view).await?;
  Ok(Html(render::ticket_table(
    &state.context_root,
    &session,
    view,
    &rows,
  )))
}

pub async fn wip(
  State(state): State<AppState>,
  auth: BasicAuth,
  bypass: CacheBypass,
  Path(selector): Path<String>,
) -> Result<Html<String>> {
  ticket_table(state, auth, bypass, &selector, TicketView::Wip).await
}

pub async fn all(
  State(state): State<AppState>,
  auth: BasicAuth,
  bypass: CacheBypass,
  Path(selector): Path<String>,
) -> Result<Html<String>> {
  ticket_table(state, auth, bypass, &selector, TicketView::All).await
}

pub async fn active(
  State(state): State<AppState>,
  auth: BasicAuth,
  bypass: CacheBypass,
  Path(selector): Path<String>,
) -> Result<Html<String>> {
  ticket_table(state, auth, bypass, &selector, TicketView::Active).await
}

pub async fn waiting(
  State(state): State<AppState>,
  auth: BasicAuth,
  bypass: CacheBypass,
  Path(selector): Path<String>,
) -> Result<Html<String>> {
  ticket_table(state, auth, bypass, &selector, TicketView::Waiting).await
}

/// `GET /items/{selector}/{ticket}`
pub async fn linked_cards(
  State(state): State<AppState>,
  auth: BasicAuth,
  bypass: CacheBypass,
  Path((selector, ticket)): Path<(String, String)>,
) -> Result<Json<BTreeMap<u64, Option<Card>>>> {
  let selector: Selector = selector.parse()?;
  let ticket = parse_id(&ticket, "ticket")?;
  let session = session(&state, auth, bypass, selector).await?;
  Ok(Json(session.linked_cards(ticket).await?))
}

/// `POST /items/{selector}/{ticket}`
pub async fn create_card(
  State(state): State<AppState>,
  auth: BasicAuth,
  bypass: CacheBypass,
  Path((selector, ticket)): Path<(String, String)>,
) -> Result<Response> {
  let selector: Selector = selector.parse()?;
  let ticket = parse_id(&ticket, "ticket")?;
  let session = session(&state, auth, bypass, selector).await?;
  let outcome = session.create_linked_card(ticket).await?;
  Ok(link_response(outcome, StatusCode::OK))
}

/// `PUT /items/{selector}/{ticket}/{card}`
pub async fn attach_card(
  State(state): State<AppState>,
  auth: BasicAuth,
  bypass: CacheBypass,
  Path((selector, ticket, card)): Path<(String, String, String)>,
) -> Result<Response> {
  let selector: Selector = selector.parse()?;
  let ticket = parse_id(&ticket, "ticket")?;
  let card = parse_id(&card, "card")?;
  let session = session(&state, auth, bypass, selector).await?;
  let outcome = session.attach_card(ticket, card).await?;
  Ok(link_response(outcome, StatusCode::CREATED))
}
