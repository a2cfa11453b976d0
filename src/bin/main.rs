use finance_coach_orchestrator::{
    agent::CoachOrchestrator,
    config::OrchestratorConfig,
    context::InMemoryContextStore,
    enrichment::{StaticKnowledgeSearch, StubDeepResearch},
    models::{FinancialContext, GoalType, ModelSelector, QueryRequest, Region},
    providers::{MockProvider, ProviderRegistry},
    tools::create_default_registry,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Finance Coach Orchestrator starting");

    // Create components: mock provider, so the demo runs without a key
    let mut providers = ProviderRegistry::new();
    providers.register(Arc::new(MockProvider));

    let contexts = Arc::new(InMemoryContextStore::new());
    contexts
        .insert(
            "demo-user",
            FinancialContext {
                total_debt: 3200.0,
                monthly_bills: 1900.0,
                net_worth: 12500.0,
                has_active_goal: true,
            },
        )
        .await;

    let orchestrator = CoachOrchestrator::new(
        OrchestratorConfig::default(),
        providers,
        create_default_registry(),
        contexts,
        Arc::new(StaticKnowledgeSearch),
        Arc::new(StubDeepResearch),
    );

    // Run a sample query end to end
    let request = QueryRequest {
        message: "How much will I have in 3 years if I keep saving $400 a month?".to_string(),
        user_id: Some("demo-user".to_string()),
        goal_type: GoalType::EmergencyFund,
        region: Region::Us,
        deep_research_requested: false,
        model_selector: ModelSelector::default(),
        conversation_history: vec![],
    };

    info!(message = %request.message, "Running coach pipeline");

    match orchestrator.handle_query(request).await {
        Ok(response) => {
            info!("Query successful");
            println!("\n=== COACH RESPONSE ===");
            println!("Agent: {}", response.metadata.agent_used);
            println!("Trace: {}", response.metadata.trace_id);
            println!("Duration: {}ms", response.metadata.duration_ms);
            println!("\n{}", response.response);
            if !response.metadata.warnings.is_empty() {
                println!("\nWarnings:");
                for warning in &response.metadata.warnings {
                    println!("  - {}", warning);
                }
            }
            if let Some(evaluation) = &response.metadata.evaluation {
                println!("\nEvaluation: {}/100", evaluation.score);
                for dimension in &evaluation.dimensions {
                    println!(
                        "  {}: {} ({})",
                        dimension.name, dimension.score, dimension.detail
                    );
                }
            }
            Ok(())
        }
        Err(failure) => {
            eprintln!("Query failed (trace {}): {}", failure.trace_id, failure.error);
            Err(Box::new(failure.error) as Box<dyn std::error::Error>)
        }
    }
}
