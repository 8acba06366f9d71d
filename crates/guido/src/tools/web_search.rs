use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::registry::{parse_arguments, ToolHandler};
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;
use crate::web_search::WebSearch;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchArgs {
    query: String,
}

pub struct SearchWebTool {
    tool: Tool,
    search: Arc<dyn WebSearch>,
}

impl SearchWebTool {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        let tool = Tool::new(
            "search_web",
            "Search the web for current information, such as news, weather, opening hours or \
             facts you are not sure about. Returns a short summary of what was found.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to look up, phrased as a search query."
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        );
        Self { tool, search }
    }
}

#[async_trait]
impl ToolHandler for SearchWebTool {
    fn declaration(&self) -> &Tool {
        &self.tool
    }

    async fn call(&self, arguments: Value) -> AgentResult<Value> {
        let args: SearchArgs = parse_arguments(arguments)?;
        if args.query.trim().is_empty() {
            return Err(AgentError::InvalidParameters("query must not be empty".into()));
        }

        let results = self
            .search
            .search(&args.query)
            .await
            .map_err(|e| AgentError::ExecutionError(e.to_string()))?;
        Ok(json!({ "results": results }))
    }
}
