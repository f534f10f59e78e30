// ABOUTME: Terminal host for engine messages in normal, quiet (CI) and JSON-lines modes.
// ABOUTME: Implements IoHost so library progress reaches the user the same way as CLI results.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Instant;

use crate::io::{IoHost, IoLevel, IoMessage, IoRequest};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only results and errors)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
#[derive(Debug)]
pub struct Output {
    mode: OutputMode,
    verbose: bool,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            verbose: false,
            start_time: None,
        }
    }

    /// Also show debug messages in normal mode.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Whether a message at `level` is printed in this mode.
    pub fn shows(&self, level: IoLevel) -> bool {
        match self.mode {
            OutputMode::Json => true,
            OutputMode::Quiet => matches!(level, IoLevel::Result | IoLevel::Error),
            OutputMode::Normal => level != IoLevel::Debug || self.verbose,
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({elapsed:.1}s)");
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.emit_json("success", message, None, false),
        }
    }

    /// Print a warning (suppressed in quiet mode).
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => eprintln!("Warning: {message}"),
            OutputMode::Quiet => {}
            OutputMode::Json => self.emit_json("warning", message, None, true),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => self.emit_json("error", message, None, true),
        }
    }

    /// Print a JSON document as the command's result.
    pub fn data(&self, message: &str, data: &serde_json::Value) {
        match self.mode {
            OutputMode::Json => self.emit_json("result", message, Some(data), false),
            OutputMode::Normal | OutputMode::Quiet => {
                match serde_json::to_string_pretty(data) {
                    Ok(pretty) => println!("{pretty}"),
                    Err(_) => println!("{data}"),
                }
            }
        }
    }

    fn emit_json(
        &self,
        event: &str,
        message: &str,
        data: Option<&serde_json::Value>,
        stderr: bool,
    ) {
        let event = JsonEvent {
            event,
            message,
            data,
            duration_secs: self.start_time.map(|_| self.elapsed_secs()),
        };
        if let Ok(json) = serde_json::to_string(&event) {
            if stderr {
                eprintln!("{json}");
            } else {
                println!("{json}");
            }
        }
    }
}

#[async_trait]
impl IoHost for Output {
    async fn notify(&self, message: IoMessage) {
        if !self.shows(message.level) {
            return;
        }
        match (self.mode, message.level) {
            (OutputMode::Json, level) => {
                let event = level_name(level);
                self.emit_json(event, &message.message, None, level == IoLevel::Error)
            }
            (_, IoLevel::Error) => eprintln!("Error: {}", message.message),
            (_, IoLevel::Warn) => eprintln!("Warning: {}", message.message),
            _ => println!("{}", message.message),
        }
    }

    /// The CLI runs unattended, so every question takes its default.
    async fn request_response(&self, request: IoRequest) -> String {
        tracing::debug!(question = %request.message, answer = %request.default_response, "answering with default");
        request.default_response
    }
}

fn level_name(level: IoLevel) -> &'static str {
    match level {
        IoLevel::Debug => "debug",
        IoLevel::Info => "info",
        IoLevel::Warn => "warning",
        IoLevel::Error => "error",
        IoLevel::Result => "result",
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
