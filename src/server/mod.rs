//! HTTP dispatcher: routes, extractors and page rendering.

mod auth;
mod render;
mod routes;

use axum::{
  routing::{get, put},
  Router,
};
use color_eyre::{eyre::eyre, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::SessionCache;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
  pub cache: Arc<SessionCache>,
  /// Prefix for links in rendered pages
  pub context_root: String,
  pub gemini_url: String,
}

impl AppState {
  pub fn new(cache: Arc<SessionCache>, context_root: String, gemini_url: String) -> Self {
    Self {
      cache,
      context_root,
      gemini_url,
    }
  }
}

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/", get(routes::home))
    .route("/wip/{selector}", get(routes::wip))
    .route("/all/{selector}", get(routes::all))
    .route("/active/{selector}", get(routes::active))
    .route("/waiting/{selector}", get(routes::waiting))
    .route(
      "/items/{selector}/{ticket}",
      get(routes::linked_cards).post(routes::create_card),
    )
    .route("/items/{selector}/{ticket}/{card}", put(routes::attach_card))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Serve until ctrl-c.
pub async fn serve(state: AppState, bind: SocketAddr) -> Result<()> {
  let listener = TcpListener::bind(bind)
    .await
    .map_err(|e| eyre!("Failed to bind {}: {}", bind, e))?;
  info!(addr = %bind, "Listening");

  axum::serve(listener, router(state))
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!("Shutting down");
    })
    .await
    .map_err(|e| eyre!("Server error: {}", e))?;
  Ok(())
}
