// src/main.rs

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// --- Module Declarations ---
mod config;
mod content;
mod error;
mod game_logic;
mod ranks;
mod sessions;
mod state;
mod web;

// --- Imports ---
use crate::config::load_settings;
use crate::content::QuizLoader;
use crate::error::Result as AppResult;
use crate::ranks::build_rank_store;
use crate::sessions::SessionManagerHandle;
use crate::state::AppState;
use crate::web::run_server;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Setup tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=info,tower_http=debug", env!("CARGO_PKG_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load Configuration
    let app_settings = load_settings()?;
    tracing::info!("Configuration loaded: {:?}", app_settings);

    let loader = Arc::new(QuizLoader::new(&app_settings.content)?);
    let rank_store = build_rank_store(&app_settings.ranks);
    tracing::info!(
        ranks.storage = ?app_settings.ranks.storage,
        ranks.file_path = %app_settings.ranks.file_path,
        "Rank store initialized"
    );

    let session_manager =
        SessionManagerHandle::spawn(64, loader, Arc::clone(&rank_store), app_settings.quiz);

    let app_state = AppState {
        session_manager,
        rank_store,
    };

    // Run the web server
    run_server(app_state, app_settings.server).await?;

    Ok(())
}
