//! Lookout: camera feeds in, access-controlled HLS out.
//!
//! Ties the pieces together: loads config, builds the session registry and
//! the HTTP router, serves until ctrl-c, then stops every session so no
//! transcoder process or session directory outlives the server.

mod config;

use anyhow::Result;
use clap::Parser;
use hls_server::ServerState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use stream_session::SessionRegistry;

use crate::config::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "lookout")]
#[command(about = "Convert camera feeds to segmented HLS and serve them over HTTP")]
#[command(version)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides config)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Root directory for session output (overrides config)
    #[arg(long)]
    media_root: Option<PathBuf>,

    /// Shared secret for manifest requests (overrides config)
    #[arg(long, env = "CLIENT_ACCESS_KEY")]
    access_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::read_from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(media_root) = args.media_root {
        config.media_root = media_root;
    }
    if let Some(access_key) = args.access_key {
        config.access_key = access_key;
    }

    if config.access_key.is_empty() {
        tracing::warn!("No access key configured; manifest requests will be rejected");
    }
    if !stream_session::transcoder_available(&config.session.ffmpeg_path) {
        tracing::warn!(
            path = %config.session.ffmpeg_path,
            "Transcoder not found; session starts will fail"
        );
    }

    let registry = Arc::new(SessionRegistry::new(config.media_root.clone()));
    let state = Arc::new(
        ServerState::new(registry.clone(), config.access_key.clone())
            .with_tuning(config.session.clone()),
    );
    let app = hls_server::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!("Listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    // Every session stopped, every transcoder killed, every directory gone.
    registry.shutdown().await;
    Ok(())
}
