//! MCP tool handlers for agents-coop-mcp.

use crate::config::wait_from_secs;
use crate::error::MailboxError;
use crate::messages::Delivery;
use crate::registry::Registry;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, ErrorData as McpError, Implementation, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    schemars, tool, tool_handler, tool_router, ServerHandler,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const TIMEOUT_HINT: &str = "No message received within timeout. You should call get() again to keep listening for messages. And set timeout more longer. eg. 120s.";

// =============================================================================
// Parameter types
// =============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SendParams {
    /// The sender agent name.
    pub from: String,
    /// The target agent name to receive the message.
    pub to: String,
    /// The message content.
    pub content: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetParams {
    /// The agent name waiting for messages.
    pub agent_name: String,
    /// Seconds to wait for a message. Omit to use the server default.
    #[serde(default, alias = "timeout")]
    pub timeout_seconds: Option<f64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AckParams {
    /// The message ID to acknowledge and remove.
    pub message_id: String,
}

// =============================================================================
// Server implementation
// =============================================================================

/// MCP server exposing the `send`, `get` and `ack` mailbox tools.
#[derive(Clone)]
pub struct MailboxServer {
    registry: Arc<Registry>,
    default_wait: Option<Duration>,
    tool_router: ToolRouter<Self>,
}

impl MailboxServer {
    /// Creates a new server over a shared registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>, default_wait: Option<Duration>) -> Self {
        Self {
            registry,
            default_wait,
            tool_router: Self::tool_router(),
        }
    }

    fn wait_for(&self, timeout_seconds: Option<f64>) -> Option<Duration> {
        timeout_seconds
            .and_then(wait_from_secs)
            .or(self.default_wait)
    }
}

fn json_response(value: &Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(value.to_string())])
}

fn error_body(err: &MailboxError) -> Value {
    json!({ "success": false, "error": err.to_string() })
}

fn delivery_body(delivery: &Delivery) -> Value {
    match delivery {
        Delivery::Message(msg) => json!({
            "success": true,
            "message_id": msg.id,
            "message": msg,
        }),
        Delivery::TimedOut => json!({
            "success": true,
            "message": null,
            "hint": TIMEOUT_HINT,
        }),
    }
}

/// Caller-facing failures become tool errors; a broken lock is a server error.
fn respond(result: Result<Value, MailboxError>) -> Result<CallToolResult, McpError> {
    match result {
        Ok(body) => Ok(json_response(&body)),
        Err(MailboxError::Lock) => Err(McpError::internal_error(
            MailboxError::Lock.to_string(),
            None,
        )),
        Err(e) => Ok(CallToolResult::error(vec![Content::text(
            error_body(&e).to_string(),
        )])),
    }
}

#[tool_router]
impl MailboxServer {
    /// Send a message to another agent.
    #[tool(
        description = "Send a message to another agent. The message will be queued until the target agent retrieves it. Returns {\"success\": true, \"message_id\": \"...\"}. Fails if from/to/content is empty or the target mailbox is full."
    )]
    async fn send(
        &self,
        Parameters(params): Parameters<SendParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .registry
            .send(&params.from, &params.to, &params.content)
            .map(|id| json!({ "success": true, "message_id": id }));
        respond(result)
    }

    /// Wait for and retrieve a message.
    #[tool(
        description = "Wait for and retrieve a message sent to this agent. Blocks until a message is available, the optional timeout_seconds elapses, or the server shuts down. On timeout returns {\"success\": true, \"message\": null, \"hint\": \"...\"}. Call ack with the message id once the message is handled."
    )]
    async fn get(
        &self,
        Parameters(params): Parameters<GetParams>,
    ) -> Result<CallToolResult, McpError> {
        let wait = self.wait_for(params.timeout_seconds);
        let result = self
            .registry
            .get(&params.agent_name, wait)
            .await
            .map(|delivery| delivery_body(&delivery));
        respond(result)
    }

    /// Acknowledge a message.
    #[tool(
        description = "Acknowledge a message and remove it from storage. Returns {\"success\": true, \"message_id\": \"...\"}. Fails with \"message not found\" for unknown or already acknowledged ids."
    )]
    async fn ack(
        &self,
        Parameters(params): Parameters<AckParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .registry
            .ack(&params.message_id)
            .map(|()| json!({ "success": true, "message_id": params.message_id }));
        respond(result)
    }
}

#[tool_handler]
impl ServerHandler for MailboxServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Agent mailboxes: send a message with send, wait for one with get, then ack it by id"
                    .to_string(),
            ),
        }
    }
}
