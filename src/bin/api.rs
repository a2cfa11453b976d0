use finance_coach_orchestrator::{
    agent::CoachOrchestrator,
    api::start_server,
    config::OrchestratorConfig,
    context::InMemoryContextStore,
    enrichment::{StaticKnowledgeSearch, StubDeepResearch},
    providers, tools,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing; RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    if std::env::var("GEMINI_API_KEY").is_err() && std::env::var("OPENAI_API_KEY").is_err() {
        eprintln!("⚠️  No provider API key set (GEMINI_API_KEY / OPENAI_API_KEY)");
        eprintln!("📌 Queries will fail until one is configured; see .env.example");
    }

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("🚀 Finance Coach Orchestrator - API Server");
    info!("📍 Port: {}", api_port);

    // Create the orchestrator with real provider adapters
    let config = OrchestratorConfig::from_env()?;
    let orchestrator = Arc::new(CoachOrchestrator::new(
        config,
        providers::create_default_registry(),
        tools::create_default_registry(),
        Arc::new(InMemoryContextStore::new()),
        Arc::new(StaticKnowledgeSearch),
        Arc::new(StubDeepResearch),
    ));

    info!("✅ Orchestrator initialized");
    info!("📡 Starting API server...");

    // Start API server
    start_server(orchestrator, api_port).await?;

    Ok(())
}
