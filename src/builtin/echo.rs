//! Returns its input arguments unchanged — used to check that a deployment
//! is actually dispatching calls end to end.

use crate::tool::{RunOptions, Tool, ToolConfig};
use async_trait::async_trait;
use serde_json::Value;

pub struct EchoTool {
    config: ToolConfig,
}

impl EchoTool {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn config(&self) -> &ToolConfig {
        &self.config
    }

    async fn run(&self, arguments: Value, _opts: &RunOptions) -> anyhow::Result<Value> {
        Ok(arguments)
    }
}
