// ABOUTME: Io host that records every message and answers questions from a script.
// ABOUTME: Unscripted questions take their default answer.

use async_trait::async_trait;
use parking_lot::Mutex;
use stackpilot::io::{IoHost, IoLevel, IoMessage, IoRequest};
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct RecordingIo {
    answers: Mutex<VecDeque<String>>,
    questions: Mutex<Vec<String>>,
    messages: Mutex<Vec<(IoLevel, String)>>,
}

impl RecordingIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next questions with `answers`, in order.
    pub fn with_answers(answers: &[&str]) -> Self {
        let io = Self::default();
        io.answers
            .lock()
            .extend(answers.iter().map(|a| a.to_string()));
        io
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().clone()
    }

    pub fn messages(&self) -> Vec<(IoLevel, String)> {
        self.messages.lock().clone()
    }

    /// Messages at `level`, in order.
    pub fn at(&self, level: IoLevel) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Whether any message at `level` contains `needle`.
    pub fn saw(&self, level: IoLevel, needle: &str) -> bool {
        self.at(level).iter().any(|m| m.contains(needle))
    }
}

#[async_trait]
impl IoHost for RecordingIo {
    async fn notify(&self, message: IoMessage) {
        self.messages.lock().push((message.level, message.message));
    }

    async fn request_response(&self, request: IoRequest) -> String {
        self.questions.lock().push(request.message);
        self.answers
            .lock()
            .pop_front()
            .unwrap_or(request.default_response)
    }
}
