//! Printing engine events

use colored::Colorize;
use glint_agent::{EngineEvent, StructuredReply};
use std::io::Write;

pub struct Printer {
    json: bool,
    /// A streamed line is open and needs a newline before anything else
    streaming: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            streaming: false,
        }
    }

    pub fn print(&mut self, event: &EngineEvent) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
            }
            return;
        }

        if !matches!(event, EngineEvent::ResponseChunk { .. }) {
            self.end_stream();
        }

        match event {
            EngineEvent::ThinkingStarted => eprintln!("{}", "Thinking...".dimmed()),
            EngineEvent::ResponseChunk { text } => {
                self.streaming = true;
                print!("{}", text);
                let _ = std::io::stdout().flush();
            }
            EngineEvent::FunctionCalled {
                name,
                arguments,
                result,
            } => {
                let args = serde_json::Value::Object(arguments.clone());
                let marker = if result.is_success() {
                    "✓".green()
                } else {
                    "✗".red()
                };
                eprintln!("{} {} {}", marker, name.cyan().bold(), args.to_string().dimmed());
                if let Some(error) = result.error_message() {
                    eprintln!("  {}", error.red());
                }
            }
            EngineEvent::AmbiguityDetected { suggestions, .. } => {
                if !suggestions.is_empty() {
                    eprintln!("{}", "Possible meanings:".yellow().bold());
                    for (i, suggestion) in suggestions.iter().enumerate() {
                        eprintln!("  {}. {}", i + 1, suggestion);
                    }
                }
            }
            EngineEvent::UsageUpdated { tokens, cost } => eprintln!(
                "{}",
                format!("{} tokens, ${:.4}", tokens, cost).dimmed()
            ),
            EngineEvent::ResponseReceived { text, structured } => {
                self.print_reply(text, structured)
            }
            EngineEvent::Error { message } => {
                eprintln!("{}: {}", "Error".red().bold(), message)
            }
            EngineEvent::Interrupted => eprintln!("{}", "Interrupted".yellow()),
        }
    }

    fn print_reply(&self, text: &str, structured: &StructuredReply) {
        match structured {
            StructuredReply::FunctionCall {
                result,
                model_text,
                ..
            } => {
                if let Some(model_text) = model_text {
                    println!("{}", model_text);
                }
                if result.is_success() {
                    println!("{}", text.green());
                } else {
                    println!("{}", text.red());
                }
            }
            StructuredReply::Text { interpretation } => {
                println!("{}", text);
                for action in &interpretation.actions {
                    eprintln!(
                        "{} {}",
                        "Action:".cyan().bold(),
                        action.action_type.yellow()
                    );
                }
                if let Some(steps) = &interpretation.color_sequence {
                    eprintln!(
                        "{}",
                        format!("Color sequence with {} steps", steps.len()).dimmed()
                    );
                }
            }
        }
    }

    fn end_stream(&mut self) {
        if self.streaming {
            println!();
            self.streaming = false;
        }
    }
}
