//! Command line and environment configuration.
//!
//! A `.env` file in the working directory is loaded before parsing, so every
//! `env` name below can also live there.

use crate::client::{MODEL, OPENAI_ENDPOINT};
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "maxchat")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Chat with a language model from a Max patch, passing MIDI clips as note tables",
    long_about = None
)]
pub struct Config {
    /// API key for the chat completion service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chat completions endpoint
    #[arg(long, env = "OPENAI_ENDPOINT", default_value = OPENAI_ENDPOINT)]
    pub endpoint: String,

    /// Model identifier sent with every request
    #[arg(long, env = "MAXCHAT_MODEL", default_value = MODEL)]
    pub model: String,

    /// Reject replies whose note table has malformed rows
    #[arg(long)]
    pub strict_notes: bool,
}
