//! Role-tagged chat messages
//!
//! An ordered `Vec<Message>` is the conversation sent verbatim to the
//! scoring endpoint.

use serde::{Deserialize, Serialize};

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Content of the first user message, if the conversation has one
pub fn first_user_content(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .find(|message| message.role == Role::User)
        .map(|message| message.content.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hi"}));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result: Result<Message, _> =
            serde_json::from_str(r#"{"role": "tool", "content": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_content_rejected() {
        let result: Result<Message, _> = serde_json::from_str(r#"{"role": "user"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_first_user_content_skips_system() {
        let messages = vec![
            Message::system("be helpful"),
            Message::user("first question"),
            Message::assistant("answer"),
            Message::user("second question"),
        ];
        assert_eq!(first_user_content(&messages), Some("first question"));
    }

    #[test]
    fn test_first_user_content_none_without_user() {
        let messages = vec![Message::system("only system")];
        assert_eq!(first_user_content(&messages), None);
        assert_eq!(first_user_content(&[]), None);
    }
}
