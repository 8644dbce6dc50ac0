//! Human interaction: the `talk_to_human` tool and its input channel.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::Tool;

/// Channel used to ask a human for input.
#[async_trait]
pub trait HumanInput: Send + Sync {
    /// Show `message` to the human and wait for their reply.
    async fn ask(&self, message: &str) -> anyhow::Result<String>;
}

pub type HumanRef = Arc<dyn HumanInput>;

/// Prompts on stdout and reads one line from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleHuman;

#[async_trait]
impl HumanInput for ConsoleHuman {
    async fn ask(&self, message: &str) -> anyhow::Result<String> {
        let message = message.to_string();
        let reply = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut stdout = io::stdout();
            writeln!(stdout, "\nAgent: {}", message)?;
            write!(stdout, "Type your response: ")?;
            stdout.flush()?;

            let mut input = String::new();
            io::stdin().lock().read_line(&mut input)?;
            Ok(input.trim_end_matches(['\r', '\n']).to_string())
        })
        .await??;

        tracing::debug!("Human replied ({} chars)", reply.len());
        Ok(reply)
    }
}

/// Tool that lets an agent send a message to the human and read the reply.
pub struct TalkToHuman {
    human: HumanRef,
}

impl TalkToHuman {
    pub fn new(human: HumanRef) -> Self {
        Self { human }
    }
}

#[derive(Debug, Deserialize)]
struct TalkToHumanArgs {
    message: String,
}

#[async_trait]
impl Tool for TalkToHuman {
    fn name(&self) -> &str {
        "talk_to_human"
    }

    fn description(&self) -> &str {
        "Send a message to a human user and wait for their response. Use this to ask questions or gather information you cannot obtain otherwise."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message or question to show the human."
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let args: TalkToHumanArgs = serde_json::from_value(args)
            .map_err(|e| anyhow::anyhow!("Invalid arguments: {}", e))?;

        tracing::info!("Agent is asking the human: {}", args.message);
        self.human.ask(&args.message).await
    }
}
