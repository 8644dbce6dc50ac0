//! Adaptation wrapper applied to every tool an agent exposes.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::Instrument;

use super::{Tool, ToolRef};

/// Traces each invocation of the wrapped tool. Name, description, schema and
/// output pass through unchanged.
pub struct TrackedTool {
    inner: ToolRef,
}

impl TrackedTool {
    pub fn inner(&self) -> &ToolRef {
        &self.inner
    }
}

/// Wrap a tool for exposure to the assistant runtime.
pub fn adapt_tool(tool: ToolRef) -> ToolRef {
    Arc::new(TrackedTool { inner: tool })
}

#[async_trait]
impl Tool for TrackedTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters_schema(&self) -> Value {
        self.inner.parameters_schema()
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let span = tracing::info_span!("tool", name = %self.inner.name());
        let started = Instant::now();

        let result = self.inner.execute(args).instrument(span.clone()).await;

        let _entered = span.enter();
        match &result {
            Ok(_) => tracing::debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Tool call succeeded"
            ),
            Err(e) => tracing::warn!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Tool call failed: {}",
                e
            ),
        }
        result
    }
}
