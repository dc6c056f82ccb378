// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;
use std::error::Error;

/// Trait for tools that can be called by agents.
///
/// Tool failures are data: the agent loop reports them back to the model
/// as `{"error": ...}` results instead of aborting the run.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool name (must be unique within a node's tool set)
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's input parameters
    fn schema(&self) -> &Value;

    /// Execute the tool with the given input and return the result
    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>>;
}
