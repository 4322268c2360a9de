//! ToolRegistry: the built-in tools Tollgate serves.
//!
//! Owns the tool descriptors advertised by `tools/list` and routes
//! `tools/call` by name. Arguments are bound by deserializing the JSON
//! argument object into a typed struct per tool; a mismatch is reported as
//! `TollgateError::InvalidArguments` naming the tool.

use std::sync::Arc;

use rmcp::model::{CallToolResult, Content, Tool};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::TollgateError;

/// Name reported by `get_server_info` and the MCP handshake.
pub const SERVER_NAME: &str = "tollgate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Echo,
    GetCurrentTime,
    AddNumbers,
    GetServerInfo,
}

impl Builtin {
    const ALL: [Builtin; 4] = [
        Builtin::Echo,
        Builtin::GetCurrentTime,
        Builtin::AddNumbers,
        Builtin::GetServerInfo,
    ];

    fn name(self) -> &'static str {
        match self {
            Builtin::Echo => "echo",
            Builtin::GetCurrentTime => "get_current_time",
            Builtin::AddNumbers => "add_numbers",
            Builtin::GetServerInfo => "get_server_info",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    fn description(self) -> &'static str {
        match self {
            Builtin::Echo => "Echo back a message - useful for testing connectivity.",
            Builtin::GetCurrentTime => "Get the current server time.",
            Builtin::AddNumbers => "Add two numbers together.",
            Builtin::GetServerInfo => "Get information about this MCP server.",
        }
    }

    fn input_schema(self) -> Value {
        match self {
            Builtin::Echo => json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            }),
            Builtin::AddNumbers => json!({
                "type": "object",
                "properties": {
                    "a": {"type": "number"},
                    "b": {"type": "number"}
                },
                "required": ["a", "b"]
            }),
            Builtin::GetCurrentTime | Builtin::GetServerInfo => {
                json!({"type": "object", "properties": {}})
            }
        }
    }

    fn descriptor(self) -> Tool {
        Tool {
            name: self.name().into(),
            title: None,
            description: Some(self.description().into()),
            input_schema: Arc::new(self.input_schema().as_object().cloned().unwrap_or_default()),
            output_schema: None,
            annotations: None,
            icons: None,
            meta: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EchoArgs {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AddNumbersArgs {
    a: f64,
    b: f64,
}

/// Payload of `get_server_info`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInfoPayload {
    pub name: String,
    pub version: String,
    pub tools: Vec<String>,
}

/// Registry of the four built-in tools.
pub struct ToolRegistry {
    tools: Vec<Tool>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ToolRegistry {
    /// Registry exposing `echo`, `get_current_time`, `add_numbers` and `get_server_info`.
    pub fn builtin() -> Self {
        Self {
            tools: Builtin::ALL.into_iter().map(Builtin::descriptor).collect(),
        }
    }

    /// Snapshot of the tool descriptors, in registration order.
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.clone()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.to_string()).collect()
    }

    /// Call a tool by name with the raw JSON argument object.
    pub fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> crate::Result<CallToolResult> {
        let builtin =
            Builtin::from_name(name).ok_or_else(|| TollgateError::UnknownTool(name.to_string()))?;
        let arguments = Value::Object(arguments.unwrap_or_default());

        tracing::debug!(tool = name, "calling tool");

        match builtin {
            Builtin::Echo => {
                let args: EchoArgs = bind_arguments(name, arguments)?;
                Ok(text_result(format!("Echo: {}", args.message)))
            }
            Builtin::GetCurrentTime => {
                let now = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false);
                Ok(text_result(now))
            }
            Builtin::AddNumbers => {
                let args: AddNumbersArgs = bind_arguments(name, arguments)?;
                let sum = args.a + args.b;
                if !sum.is_finite() {
                    return Err(TollgateError::ToolFailed(
                        name.to_string(),
                        "result is not a finite number".to_string(),
                    ));
                }
                let value = Value::from(sum);
                Ok(CallToolResult {
                    content: vec![Content::text(value.to_string())],
                    is_error: Some(false),
                    structured_content: Some(json!({ "result": value })),
                    meta: None,
                })
            }
            Builtin::GetServerInfo => {
                let payload = ServerInfoPayload {
                    name: SERVER_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    tools: self.tool_names(),
                };
                let value = serde_json::to_value(&payload)
                    .map_err(|e| TollgateError::ToolFailed(name.to_string(), e.to_string()))?;
                let content = Content::json(value.clone()).map_err(|e| {
                    TollgateError::ToolFailed(name.to_string(), format!("JSON content error: {}", e))
                })?;
                Ok(CallToolResult {
                    content: vec![content],
                    is_error: Some(false),
                    structured_content: Some(value),
                    meta: None,
                })
            }
        }
    }
}

fn bind_arguments<T: serde::de::DeserializeOwned>(tool: &str, arguments: Value) -> crate::Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| TollgateError::InvalidArguments(tool.to_string(), e.to_string()))
}

fn text_result(text: String) -> CallToolResult {
    CallToolResult {
        structured_content: Some(json!({ "result": text })),
        content: vec![Content::text(text)],
        is_error: Some(false),
        meta: None,
    }
}
