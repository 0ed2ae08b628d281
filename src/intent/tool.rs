//! The `classify_request` tool and parsing of its arguments.

use crate::capability::{ToolInvocation, ToolSpec};
use crate::request::{Category, MediaFormat, MediaRequest};
use serde::Deserialize;

pub const TOOL_NAME: &str = "classify_request";

/// Tool definition with enumerated `format` and `category` values.
pub fn classify_tool(description: &str) -> ToolSpec {
    let formats: Vec<&str> = MediaFormat::ALL.iter().map(|f| f.as_str()).collect();
    let categories: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();

    ToolSpec {
        name: TOOL_NAME.to_string(),
        description: description.to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "format": {
                    "type": "string",
                    "enum": formats,
                    "description": "Output medium requested by the user"
                },
                "category": {
                    "type": "string",
                    "enum": categories,
                    "description": "market for the overall market, ticker for one stock, news for a news topic"
                },
                "subject": {
                    "type": "string",
                    "description": "What the brief is about, e.g. AAPL"
                }
            },
            "required": ["format", "category", "subject"],
            "additionalProperties": false
        }),
    }
}

#[derive(Deserialize)]
struct ClassifyArgs {
    format: String,
    category: String,
    subject: String,
}

/// Turn a tool invocation into a request. The error string explains what
/// was wrong and is shown to the operator.
pub fn parse_invocation(invocation: Option<&ToolInvocation>) -> std::result::Result<MediaRequest, String> {
    let invocation = invocation.ok_or_else(|| "the model did not call the classification tool".to_string())?;

    if invocation.name != TOOL_NAME {
        return Err(format!("unexpected tool '{}'", invocation.name));
    }

    let args: ClassifyArgs = serde_json::from_str(&invocation.arguments)
        .map_err(|e| format!("invalid tool arguments: {}", e))?;

    let format: MediaFormat = args.format.parse()?;
    let category: Category = args.category.parse()?;

    MediaRequest::new(format, category, &args.subject).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(arguments: &str) -> ToolInvocation {
        ToolInvocation {
            name: TOOL_NAME.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn test_schema_lists_every_enum_value() {
        let tool = classify_tool("classify");
        let props = &tool.parameters["properties"];
        assert_eq!(props["format"]["enum"], serde_json::json!(["text", "audio", "video"]));
        assert_eq!(props["category"]["enum"], serde_json::json!(["market", "ticker", "news"]));
    }

    #[test]
    fn test_parse_valid_invocation() {
        let req = parse_invocation(Some(&call(
            r#"{"format": "video", "category": "ticker", "subject": "aapl"}"#,
        )))
        .unwrap();
        assert_eq!(req.format(), MediaFormat::Video);
        assert_eq!(req.category(), Category::Ticker);
        assert_eq!(req.subject(), "AAPL");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_invocation(None).is_err());
        assert!(parse_invocation(Some(&call("{not json"))).is_err());
        assert!(parse_invocation(Some(&call(
            r#"{"format": "podcast", "category": "ticker", "subject": "AAPL"}"#
        )))
        .is_err());
        assert!(parse_invocation(Some(&call(
            r#"{"format": "text", "category": "ticker", "subject": " "}"#
        )))
        .is_err());

        let wrong_tool = ToolInvocation {
            name: "search".to_string(),
            arguments: r#"{"format": "text", "category": "news", "subject": "rates"}"#.to_string(),
        };
        assert!(parse_invocation(Some(&wrong_tool)).unwrap_err().contains("unexpected tool"));
    }
}
