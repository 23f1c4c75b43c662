use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod dataset;
mod dispatch;
mod llm;
mod upload;
mod util;
mod web;
mod wizard;

use crate::config::{AppConfig, CliArgs};
use crate::dispatch::QueryDispatcher;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if config.llm.api_key.is_none() {
        // The UI must still come up; only LLM-backed requests will fail.
        error!("OPENAI_API_KEY is not set - chart and answer requests will fail");
    }

    // Build the query dispatcher with its two collaborators
    info!("Initializing query dispatcher with model: {}", config.llm.model);
    let dispatcher = QueryDispatcher::from_config(&config.llm)?;

    // Create application state
    let app_state = Arc::new(AppState::new(config.clone(), dispatcher));

    // Start the web server
    info!(
        "Starting Chart Pilot server on {}:{}",
        config.web.host, config.web.port
    );
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(std::io::Error::other(e.to_string()).into());
        }
    }

    Ok(())
}
