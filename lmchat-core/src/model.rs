use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// What the chat UI submits for one turn.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub selected_model: String,
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub enable_thinking: bool,
}

/// One entry of `GET /v1/models`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub owned_by: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelInfo>,
    #[serde(default)]
    pub object: String,
}

impl ModelList {
    /// The server lists the loaded model first.
    pub fn active(&self) -> Option<&ModelInfo> {
        self.data.first()
    }
}
