//! `search_recipe` tool backed by [`RecipeService`].

use std::sync::Arc;

use serde_json::{Value, json};

use crate::llm::ToolDefinition;
use crate::rag::RecipeService;
use crate::tools::error::ToolResult;
use crate::tools::{Tool, ToolFuture, required_str};

const TOOL_NAME: &str = "search_recipe";

/// Looks up a recipe in the ingested corpus.
pub struct RecipeSearchTool {
    service: Arc<RecipeService>,
}

impl RecipeSearchTool {
    /// Wrap a recipe service.
    #[must_use]
    pub const fn new(service: Arc<RecipeService>) -> Self {
        Self { service }
    }
}

impl Tool for RecipeSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            TOOL_NAME,
            "Search the recipe library for how to cook a dish. Returns the recipe text.",
            json!({
                "type": "object",
                "properties": {
                    "dish_name": {
                        "type": "string",
                        "description": "Name of the dish, e.g. 番茄炒蛋"
                    }
                },
                "required": ["dish_name"]
            }),
        )
    }

    fn invoke(&self, arguments: Value) -> ToolFuture<'_, ToolResult<String>> {
        Box::pin(async move {
            let dish = required_str(TOOL_NAME, &arguments, "dish_name")?;
            let recipe = self.service.search_recipe(&dish).await?;
            Ok(recipe.unwrap_or_else(|| format!("No recipe found for '{dish}'.")))
        })
    }
}
