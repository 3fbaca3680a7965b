mod error;
mod handlers;
mod routes;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use gallery_core::ProjectPaths;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "gallery-admin")]
#[command(about = "Local admin server for editing the photo gallery", long_about = None)]
struct Args {
    /// Project root containing src/_data/gallery.json
    #[arg(short, long, env = "GALLERY_ROOT", default_value = ".")]
    root: PathBuf,

    /// Port to listen on
    #[arg(short, long, env = "KANRI_PORT", default_value_t = 8686)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "KANRI_HOST", default_value = "127.0.0.1")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gallery_admin=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let paths = ProjectPaths::new(&args.root);
    paths
        .ensure_directories()
        .await
        .context("Failed to create image directories")?;

    let state = AppState::new(paths);
    let app = routes::router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("Admin server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
