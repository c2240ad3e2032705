pub mod agent;
pub mod models;
pub mod server;
pub mod config;
pub mod llm;
pub mod cli;
pub mod history;
pub mod evidence;
pub mod tier;
pub mod tribunal;
pub mod quiz;
pub mod payments;

use agent::ChatAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("Gemini Models: {:?}", args.gemini_models);
    info!("OpenAI Model: {}", args.openai_model);
    info!("OpenAI Base URL: {}", args.openai_base_url);
    info!("Search Base URL: {}", args.search_base_url);
    info!("Engine Timeout: {}s", args.adapter_timeout_secs);
    info!("History Store Type: {}", args.history_type);
    if args.history_type.eq_ignore_ascii_case("redis") {
        info!("History Store Host: {}", args.history_host);
    }
    info!("Personas Path: {}", args.personas_path.as_deref().unwrap_or("built-in"));
    info!("Chat Rate Limit: {}/s", args.chat_rate_limit);
    info!("-------------------------");

    let agent = Arc::new(ChatAgent::new(&args).await?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args.clone());
    server.run().await?;

    Ok(())
}
