//! Type conversions between this workspace's tool types and rmcp's MCP
//! model types.
//!
//! Pure, stateless functions — the bridge sits at the seam between
//! [`eda_tools`] and the MCP wire protocol so neither side needs to know
//! about the other.

use std::borrow::Cow;
use std::sync::Arc;

use eda_domain::tool::ToolDefinition;
use eda_tools::ToolResult;
use rmcp::model::{CallToolResult, Content, JsonObject, Tool as McpTool};

/// Convert a [`ToolDefinition`] into an rmcp [`Tool`] descriptor. The
/// JSON Schema stored in `parameters` is already valid JSON Schema (it
/// is the same literal the registry validates arguments against), so it
/// passes through as the `input_schema` unmodified.
pub fn definition_to_mcp_tool(def: ToolDefinition) -> McpTool {
    let input_schema: JsonObject = value_to_object(def.parameters);
    McpTool::new(
        Cow::Owned(def.name),
        Cow::Owned(def.description),
        Arc::new(input_schema),
    )
}

fn value_to_object(v: serde_json::Value) -> JsonObject {
    use serde_json::{Map, Value};
    match v {
        Value::Object(m) => m,
        other => {
            let mut m = Map::new();
            m.insert("type".to_string(), Value::String("object".to_string()));
            m.insert("value".to_string(), other);
            m
        }
    }
}

/// Convert a [`ToolResult`] into an rmcp [`CallToolResult`]. Every tool
/// handler in this workspace renders text, so there is exactly one
/// content part; `is_error` mirrors `ToolResult::is_error`.
pub fn result_to_call_result(result: ToolResult) -> CallToolResult {
    let content = vec![Content::text(result.content)];
    if result.is_error {
        CallToolResult {
            content,
            is_error: Some(true),
            structured_content: None,
            meta: None,
        }
    } else {
        CallToolResult::success(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eda_domain::tool::ToolCategory;
    use serde_json::json;

    #[test]
    fn definition_to_mcp_tool_preserves_name_and_description() {
        let def = ToolDefinition {
            name: "read_file".into(),
            description: "Reads a file".into(),
            parameters: json!({"type": "object"}),
            category: ToolCategory::Essential,
        };
        let tool = definition_to_mcp_tool(def);
        assert_eq!(tool.name.as_ref(), "read_file");
        assert_eq!(tool.description.as_deref(), Some("Reads a file"));
    }

    #[test]
    fn non_object_schema_gets_wrapped() {
        let def = ToolDefinition {
            name: "echo".into(),
            description: "Echoes".into(),
            parameters: json!("not an object"),
            category: ToolCategory::Other,
        };
        let tool = definition_to_mcp_tool(def);
        assert_eq!(
            tool.input_schema.get("type"),
            Some(&serde_json::Value::String("object".to_string()))
        );
    }

    #[test]
    fn success_result_is_not_flagged_error() {
        let result = ToolResult {
            call_id: "c1".into(),
            tool_name: "read_file".into(),
            is_error: false,
            content: "hello".into(),
            duration_ms: 5,
            bytes: 5,
        };
        let call_result = result_to_call_result(result);
        assert_eq!(call_result.is_error, Some(false));
        assert_eq!(call_result.content.len(), 1);
    }

    #[test]
    fn error_result_is_flagged() {
        let result = ToolResult {
            call_id: "c2".into(),
            tool_name: "read_file".into(),
            is_error: true,
            content: "not found".into(),
            duration_ms: 1,
            bytes: 9,
        };
        let call_result = result_to_call_result(result);
        assert_eq!(call_result.is_error, Some(true));
    }
}
