//! Helpers shared by tool definitions.

use rmcp::{
    handler::server::tool::cached_schema_for_type,
    model::{CallToolResult, Content, Tool},
};
use schemars::JsonSchema;
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::domains::tools::ToolError;

/// Parameters for tools that take no arguments.
#[derive(Debug, Clone, Default, serde::Deserialize, JsonSchema)]
pub struct EmptyParams {}

/// Build the `Tool` metadata model for a parameter type.
pub fn tool_model<P>(name: &'static str, description: &'static str) -> Tool
where
    P: JsonSchema + 'static,
{
    Tool {
        name: name.into(),
        description: Some(description.into()),
        input_schema: cached_schema_for_type::<P>(),
        annotations: None,
        output_schema: None,
        icons: None,
        meta: None,
        title: None,
    }
}

/// Deserialize tool arguments; a missing argument object counts as `{}`.
pub fn parse_params<P>(arguments: serde_json::Value) -> Result<P, ToolError>
where
    P: DeserializeOwned,
{
    let arguments = if arguments.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        arguments
    };

    serde_json::from_value(arguments).map_err(|e| ToolError::invalid_arguments(e.to_string()))
}

/// Success result carrying both a text rendering and structured content.
pub fn structured_result<T: Serialize>(summary: String, data: &T) -> CallToolResult {
    match serde_json::to_value(data) {
        Ok(structured) => CallToolResult {
            content: vec![Content::text(summary)],
            structured_content: Some(structured),
            is_error: Some(false),
            meta: None,
        },
        Err(e) => {
            warn!("Failed to serialize structured content: {}", e);
            CallToolResult::success(vec![Content::text(summary)])
        }
    }
}

/// Create an error result with a formatted message.
pub fn error_result(message: &str) -> CallToolResult {
    warn!("{}", message);
    CallToolResult::error(vec![Content::text(message.to_string())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Sample {
        #[serde(default)]
        count: u32,
    }

    #[test]
    fn test_parse_params_null_is_empty_object() {
        let params: Sample = parse_params(serde_json::Value::Null).unwrap();
        assert_eq!(params.count, 0);
    }

    #[test]
    fn test_parse_params_rejects_wrong_type() {
        let err = parse_params::<Sample>(serde_json::json!({ "count": "many" })).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn test_structured_result_sets_content() {
        let result = structured_result("ok".to_string(), &serde_json::json!({ "a": 1 }));
        assert_eq!(result.is_error, Some(false));
        assert_eq!(result.structured_content, Some(serde_json::json!({ "a": 1 })));
    }

    #[test]
    fn test_tool_model_fields() {
        let tool = tool_model::<Sample>("sample", "A sample tool");
        assert_eq!(tool.name, "sample");
        assert_eq!(tool.description.as_deref(), Some("A sample tool"));
    }

    #[test]
    fn test_tool_model_input_schema() {
        let tool = tool_model::<Sample>("sample", "A sample tool");
        assert_eq!(tool.input_schema["type"], "object");
        assert!(tool.input_schema["properties"]["count"].is_object());

        let again = tool_model::<Sample>("sample", "A sample tool");
        assert!(std::sync::Arc::ptr_eq(&tool.input_schema, &again.input_schema));
    }
}
