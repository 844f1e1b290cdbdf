//! Model Context Protocol server over stdio.
//!
//! Publishes the four chain stages as tools. Messages are newline-delimited
//! JSON-RPC 2.0 objects; requests get exactly one response line and
//! notifications get none.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::core::chain::{SimpleChain, Stage};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "BuildPilot";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Absent for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(json!({ "code": code, "message": message.into() })),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct McpTool {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl McpTool {
    fn for_stage(stage: Stage) -> Self {
        let arg = stage.input_name();
        Self {
            name: stage.tool_name().to_string(),
            description: Some(stage.description().to_string()),
            input_schema: json!({
                "type": "object",
                "properties": { arg: { "type": "string" } },
                "required": [arg],
            }),
        }
    }
}

pub struct McpServer {
    chain: SimpleChain,
}

impl McpServer {
    pub fn new(chain: SimpleChain) -> Self {
        Self { chain }
    }

    pub fn tools() -> Vec<McpTool> {
        Stage::ALL.into_iter().map(McpTool::for_stage).collect()
    }

    /// Read requests from `reader` until EOF, writing one response line per request.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("MCP server ready on stdio");
        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            debug!("MCP RX: {}", line);
            if let Some(resp) = self.handle_line(&line).await {
                let out = serde_json::to_string(&resp)?;
                debug!("MCP TX: {}", out);
                writer.write_all(format!("{}\n", out).as_bytes()).await?;
                writer.flush().await?;
            }
        }
        info!("MCP client closed stdin");
        Ok(())
    }

    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Unparsed MCP RX: {}", line);
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };
        let id = raw.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(raw) {
            Ok(req) => self.handle(req).await,
            Err(e) => Some(JsonRpcResponse::failure(
                id,
                INVALID_REQUEST,
                format!("Invalid request: {}", e),
            )),
        }
    }

    pub async fn handle(&self, req: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = req.id else {
            debug!("MCP notification: {}", req.method);
            return None;
        };

        let resp = match req.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": Self::tools() })),
            "tools/call" => self.call_tool(id, req.params.unwrap_or(Value::Null)).await,
            other => {
                JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("Method not found: {}", other))
            }
        };
        Some(resp)
    }

    async fn call_tool(&self, id: Value, params: Value) -> JsonRpcResponse {
        let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
        let Some(stage) = Stage::from_tool_name(name) else {
            return JsonRpcResponse::failure(id, INVALID_PARAMS, format!("Unknown tool: {}", name));
        };
        let arg = stage.input_name();
        let Some(input) = params
            .get("arguments")
            .and_then(|a| a.get(arg))
            .and_then(Value::as_str)
        else {
            return JsonRpcResponse::failure(
                id,
                INVALID_PARAMS,
                format!("Tool {} requires a string argument '{}'", name, arg),
            );
        };

        info!("MCP tool call: {}", name);
        // Backend failures are tool results, not protocol errors.
        let (text, is_error) = match self.chain.invoke(stage, input).await {
            Ok(output) => (output, false),
            Err(e) => {
                warn!("MCP tool {} failed: {}", name, e);
                (e.to_string(), true)
            }
        };
        JsonRpcResponse::success(
            id,
            json!({
                "content": [{ "type": "text", "text": text }],
                "isError": is_error,
            }),
        )
    }
}
