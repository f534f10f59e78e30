// ABOUTME: The notify / request-response contract with whoever drives the engine.
// ABOUTME: Messages carry a level and, for stack events, the activity they describe.

use crate::events::StackActivity;
use async_trait::async_trait;
use serde::Serialize;

/// Severity of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IoLevel {
    Debug,
    Info,
    Warn,
    Error,
    /// The final outcome of a command.
    Result,
}

/// A one-way message to the host.
#[derive(Debug, Clone)]
pub struct IoMessage {
    pub level: IoLevel,
    pub message: String,
    pub activity: Option<StackActivity>,
}

impl IoMessage {
    pub fn new(level: IoLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            activity: None,
        }
    }

    pub fn activity(message: impl Into<String>, activity: StackActivity) -> Self {
        Self {
            level: IoLevel::Info,
            message: message.into(),
            activity: Some(activity),
        }
    }
}

/// A question for the host. Non-interactive hosts answer with the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoRequest {
    pub message: String,
    pub default_response: String,
}

/// Receives progress and answers questions.
#[async_trait]
pub trait IoHost: Send + Sync {
    async fn notify(&self, message: IoMessage);

    async fn request_response(&self, request: IoRequest) -> String;
}

/// Leveled helpers over [`IoHost`] that also emit tracing events.
#[async_trait]
pub trait IoHostExt {
    async fn debug(&self, message: String);
    async fn info(&self, message: String);
    async fn warn(&self, message: String);
    async fn error(&self, message: String);
    async fn result(&self, message: String);

    /// Ask a yes/no question.
    async fn confirm(&self, question: String, default: bool) -> bool;

    /// Ask for a free-form value.
    async fn ask(&self, question: String, default: String) -> String;
}

#[async_trait]
impl<T> IoHostExt for T
where
    T: IoHost + ?Sized,
{
    async fn debug(&self, message: String) {
        tracing::debug!("{message}");
        self.notify(IoMessage::new(IoLevel::Debug, message)).await;
    }

    async fn info(&self, message: String) {
        tracing::info!("{message}");
        self.notify(IoMessage::new(IoLevel::Info, message)).await;
    }

    async fn warn(&self, message: String) {
        tracing::warn!("{message}");
        self.notify(IoMessage::new(IoLevel::Warn, message)).await;
    }

    async fn error(&self, message: String) {
        tracing::error!("{message}");
        self.notify(IoMessage::new(IoLevel::Error, message)).await;
    }

    async fn result(&self, message: String) {
        tracing::info!("{message}");
        self.notify(IoMessage::new(IoLevel::Result, message)).await;
    }

    async fn confirm(&self, question: String, default: bool) -> bool {
        let request = IoRequest {
            message: question,
            default_response: if default { "y" } else { "n" }.to_string(),
        };
        let answer = self.request_response(request).await;
        parse_confirmation(&answer).unwrap_or(default)
    }

    async fn ask(&self, question: String, default: String) -> String {
        let answer = self
            .request_response(IoRequest {
                message: question,
                default_response: default.clone(),
            })
            .await;
        if answer.trim().is_empty() {
            default
        } else {
            answer.trim().to_string()
        }
    }
}

/// `Some(true)` for yes, `Some(false)` for no, `None` for anything else.
pub fn parse_confirmation(answer: &str) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" => Some(true),
        "n" | "no" | "false" => Some(false),
        _ => None,
    }
}

/// Discards messages and answers every question with its default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

#[async_trait]
impl IoHost for NonInteractive {
    async fn notify(&self, _message: IoMessage) {}

    async fn request_response(&self, request: IoRequest) -> String {
        request.default_response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_parsing() {
        assert_eq!(parse_confirmation("Y"), Some(true));
        assert_eq!(parse_confirmation(" yes "), Some(true));
        assert_eq!(parse_confirmation("n"), Some(false));
        assert_eq!(parse_confirmation(""), None);
        assert_eq!(parse_confirmation("maybe"), None);
    }

    #[tokio::test]
    async fn non_interactive_host_takes_defaults() {
        let host = NonInteractive;
        assert!(host.confirm("Proceed?".to_string(), true).await);
        assert!(!host.confirm("Proceed?".to_string(), false).await);
        assert_eq!(host.ask("Name?".to_string(), "bucket".to_string()).await, "bucket");
    }
}
