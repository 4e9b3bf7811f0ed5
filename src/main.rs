mod cache;
mod config;
mod error;
mod gemini;
mod selector;
mod server;
mod session;
mod zube;

#[cfg(test)]
mod testing;

use clap::Parser;
use color_eyre::Result;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::cache::SessionCache;
use crate::config::Config;
use crate::server::AppState;
use crate::session::UpstreamFactory;

#[derive(Parser, Debug)]
#[command(name = "geminhack")]
#[command(about = "Cross-link Gemini tickets with Zube cards over HTTP")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/geminhack/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Address to listen on, overriding server.bind
  #[arg(short, long)]
  bind: Option<SocketAddr>,

  /// Debug logging for this crate
  #[arg(short, long)]
  verbose: bool,
}

/// Console logging, plus a daily rolling JSON file when `log_dir` is set.
/// The returned guard must outlive the server to flush the file writer.
fn init_logging(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
  let default = if verbose {
    "geminhack=debug,tower_http=debug,info"
  } else {
    "geminhack=info,warn"
  };
  let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  let (file_layer, guard) = match log_dir {
    Some(dir) => {
      let appender = tracing_appender::rolling::daily(dir, "geminhack.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(writer)
        .with_filter(EnvFilter::new("geminhack=debug,info"));
      (Some(layer), Some(guard))
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(
      tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(console_filter),
    )
    .with(file_layer)
    .init();

  guard
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = Config::load(args.config.as_deref())?;
  let _guard = init_logging(args.verbose, config.log_dir.as_deref());

  let bind = args.bind.unwrap_or(config.server.bind);
  let zube_key = config.zube.read_private_key()?;

  let factory = UpstreamFactory::new(config.gemini.clone(), &config.zube, &zube_key)?;
  let cache = Arc::new(SessionCache::new(Arc::new(factory), config.cache.lifespan()));
  tracing::info!(
    lifespan_secs = config.cache.lifespan_secs,
    gemini = %config.gemini.url,
    "Session cache ready"
  );

  let state = AppState::new(cache, config.server.context_root, config.gemini.url);
  server::serve(state, bind).await
}
