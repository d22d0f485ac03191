//! CLI arguments

use clap::Parser;
use std::path::PathBuf;

/// Glint - choreograph juggling ball light shows with a language model
#[derive(Parser, Debug)]
#[command(name = "glint")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// What to do with the show
    #[arg(trailing_var_arg = true, required = true)]
    pub prompt: Vec<String>,

    /// Config file (defaults to glint.* in the current directory, then ~/.config/glint)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Provider to use (openai, anthropic, ollama, openrouter)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model to use (e.g., gpt-4o, claude-sonnet-4-20250514, llama3.1)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Print reply text as it streams
    #[arg(long)]
    pub stream: bool,

    /// Do not advertise tools to the model
    #[arg(long)]
    pub no_tools: bool,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Number of balls in the show
    #[arg(long, default_value_t = 4)]
    pub balls: usize,

    /// Audio analysis JSON for the song (beats, sections, words, features)
    #[arg(long)]
    pub analysis: Option<PathBuf>,

    /// Song id used to look up stored preferences
    #[arg(long)]
    pub song: Option<String>,
}

impl Cli {
    pub fn prompt_text(&self) -> String {
        self.prompt.join(" ")
    }
}
