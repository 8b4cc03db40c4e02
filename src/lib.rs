pub mod models;
pub mod server;
pub mod llm;
pub mod cli;
pub mod relay;
pub mod renderer;
pub mod slo;
pub mod sse;

use cli::Args;
use log::{ info, warn };
use relay::Relay;
use server::Server;
use slo::SloClient;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_config = args.chat_llm_config()?;

    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr());
    info!("Static Directory: {}", args.static_dir);
    info!("Chat LLM Type: {}", chat_config.llm_type);
    info!("Chat Model: {}", chat_config.completion_model.as_deref().unwrap_or("(provider default)"));
    info!("Chat Base URL: {}", chat_config.base_url.as_deref().unwrap_or("(provider default)"));
    info!("Chat API Key Set: {}", chat_config.api_key.is_some());
    info!("SLO Base URL: {}", args.slo_base_url.as_deref().unwrap_or(slo::DEFAULT_BASE_URL));
    info!("SLO API Key Set: {}", args.slo_key().is_some());
    info!("-------------------------");

    let relay = Arc::new(Relay::from_config(&chat_config)?);
    let slo = Arc::new(SloClient::new(args.slo_key(), args.slo_base_url.clone())?);
    if !relay.is_configured() || !slo.is_configured() {
        warn!("Server starting with missing credentials; affected endpoints return errors");
    }

    let addr = args.server_addr();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, relay, slo, args.clone());
    server.run().await?;

    Ok(())
}
