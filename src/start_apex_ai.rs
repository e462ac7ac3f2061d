//! Startup helpers for the Apex AI web app.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{info, warn};

use crate::chat::ChatPipeline;
use crate::config::AppConfig;
use crate::llm::{ChatClient, ChatModel};
use crate::mcp;
use crate::rag::{ChromaClient, Embedder, RecipeService, ZhipuEmbedder};
use crate::server::{self, AppState};
use crate::tools::{McpToolset, RecipeSearchTool, ToolRegistry, WeatherTool};

/// Install the `fmt` subscriber with `RUST_LOG` plus an `info` default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
}

/// Run the server (used by the `apex-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing();
    info!("Starting Apex AI v{}", env!("CARGO_PKG_VERSION"));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let result = rt.block_on(async {
        let state = Arc::new(build_state(&config).await);
        server::run_server_with_shutdown(state, config.server.port, shutdown_signal()).await
    });

    if let Err(e) = result {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    info!("Apex AI stopped");
    ExitCode::SUCCESS
}

/// Resolve when Ctrl-C is pressed.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Build the shared state from config. Missing credentials disable the
/// features that need them instead of failing startup.
pub async fn build_state(config: &AppConfig) -> AppState {
    let mut state = AppState::new(config.server.static_dir.clone());

    let model: Option<Arc<dyn ChatModel>> = match ChatClient::new(&config.llm) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("Chat disabled: {e}");
            None
        }
    };

    let embedder: Option<Arc<dyn Embedder>> = match ZhipuEmbedder::new(&config.embedding) {
        Ok(embedder) => Some(Arc::new(embedder)),
        Err(e) => {
            warn!("Embeddings disabled: {e}");
            None
        }
    };

    let chroma = match config.chroma.as_ref().map(ChromaClient::new) {
        Some(Ok(client)) => {
            match client.heartbeat().await {
                Ok(_) => info!(url = %client.base_url(), "Vector store reachable"),
                Err(e) => warn!(url = %client.base_url(), "Vector store not reachable yet: {e}"),
            }
            Some(client)
        }
        Some(Err(e)) => {
            warn!("Vector store disabled: {e}");
            None
        }
        None => {
            info!("CHROMA_DB_URL not set, vector store routes disabled");
            None
        }
    };

    let recipes = match (&model, &embedder, &chroma) {
        (Some(model), Some(embedder), Some(chroma)) => Some(Arc::new(RecipeService::new(
            Arc::clone(model),
            config.llm.reasoner_model.clone(),
            Arc::clone(embedder),
            chroma.clone(),
        ))),
        _ => None,
    };

    let tools = build_tools(config, recipes.as_ref()).await;
    info!(count = tools.len(), "Tools registered");

    if let Some(model) = model {
        let pipeline = ChatPipeline::new(
            Arc::clone(&model),
            Arc::new(tools),
            config.llm.chat_model.clone(),
            config.llm.system_prompt.clone(),
        );
        state = state
            .with_pipeline(pipeline)
            .with_reasoner(model, config.llm.reasoner_model.clone());
    }
    if let Some(chroma) = chroma {
        state = state.with_chroma(chroma);
    }
    if let Some(embedder) = embedder {
        state = state.with_embedder(embedder);
    }
    if let Some(recipes) = recipes {
        state = state.with_recipes(recipes);
    }
    state
}

async fn build_tools(config: &AppConfig, recipes: Option<&Arc<RecipeService>>) -> ToolRegistry {
    let mut tools = ToolRegistry::new();

    match WeatherTool::new(&config.weather) {
        Ok(weather) => tools.register(Arc::new(weather)),
        Err(e) => warn!("Weather tool unavailable: {e}"),
    }

    if let Some(recipes) = recipes {
        tools.register(Arc::new(RecipeSearchTool::new(Arc::clone(recipes))));
    }

    for entry in &config.mcp.servers {
        let client = match mcp::connect(entry).await {
            Ok(client) => client,
            Err(e) => {
                warn!(server = %entry.name, "Skipping MCP server: {e}");
                continue;
            }
        };
        match McpToolset::discover(client).await {
            Ok(toolset) => {
                let discovered = toolset.tools();
                info!(server = %entry.name, tools = discovered.len(), "MCP tools discovered");
                for tool in discovered {
                    tools.register(tool);
                }
            }
            Err(e) => warn!(server = %entry.name, "Failed to list MCP tools: {e}"),
        }
    }

    tools
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_without_credentials() {
        let config = AppConfig::default();
        let state = build_state(&config).await;
        assert!(state.pipeline.is_none());
        assert!(state.reasoner.is_none());
        assert!(state.chroma.is_none());
        assert!(state.recipes.is_none());
    }

    #[tokio::test]
    async fn test_state_checks_vector_store_heartbeat() {
        let mut server = mockito::Server::new_async().await;
        let beat = server
            .mock("GET", "/api/v2/heartbeat")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{\"nanosecond heartbeat\": 1}")
            .create_async()
            .await;
        let mut config = AppConfig::default();
        config.chroma = crate::config::ChromaConfig::from_url(&server.url()).ok();
        let state = build_state(&config).await;
        beat.assert_async().await;
        assert!(state.chroma.is_some());
        assert!(state.recipes.is_none());
    }

    #[tokio::test]
    async fn test_state_with_chat_key_registers_weather() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-test".to_string());
        let state = build_state(&config).await;
        let Some(pipeline) = state.pipeline.as_ref() else {
            panic!("pipeline missing")
        };
        assert!(pipeline.tools().contains("get_weather"));
        assert!(!pipeline.tools().contains("search_recipe"));
        assert_eq!(state.reasoner_model, "deepseek-reasoner");
    }
}
