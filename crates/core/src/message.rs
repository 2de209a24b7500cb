//! Message and content-part domain types.
//!
//! These are the core value objects that flow through the entire system:
//! a flow builds messages, a provider generates a model message, tools
//! answer tool requests, and the gateway serializes the result.
//!
//! The JSON shape matches what browser clients expect:
//! `{"role": "user", "content": [{"text": "hi"}, {"media": {"url": "..."}}]}`.

use serde::{Deserialize, Serialize};

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The model (assistant)
    Model,
    /// Tool execution results
    Tool,
}

/// A media reference: either an `https://` URL or a `data:` URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Correlates the request with its response.
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub input: serde_json::Value,
}

/// The result of executing a tool request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub output: serde_json::Value,
}

/// One piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    Media(Media),
    ToolRequest(ToolRequest),
    ToolResponse(ToolResponse),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn media(url: impl Into<String>, content_type: Option<String>) -> Self {
        Part::Media(Media {
            url: url.into(),
            content_type,
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_media(&self) -> Option<&Media> {
        match self {
            Part::Media(m) => Some(m),
            _ => None,
        }
    }

    /// True for tool requests and tool responses.
    pub fn is_tool_part(&self) -> bool {
        matches!(self, Part::ToolRequest(_) | Part::ToolResponse(_))
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// Ordered content parts
    pub content: Vec<Part>,

    /// Optional metadata (provider info, interrupt data, etc.)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    pub fn new(role: Role, content: Vec<Part>) -> Self {
        Self {
            role,
            content,
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a system message with a single text part.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![Part::text(text)])
    }

    /// Create a user message with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    /// Create a model message with a single text part.
    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![Part::text(text)])
    }

    /// Create a tool message carrying tool responses.
    pub fn tool_responses(responses: Vec<ToolResponse>) -> Self {
        Self::new(
            Role::Tool,
            responses.into_iter().map(Part::ToolResponse).collect(),
        )
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// The first media part, if any.
    pub fn media(&self) -> Option<&Media> {
        self.content.iter().find_map(Part::as_media)
    }

    /// All tool requests in this message.
    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.content
            .iter()
            .filter_map(|p| match p {
                Part::ToolRequest(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn has_tool_parts(&self) -> bool {
        self.content.iter().any(Part::is_tool_part)
    }
}
