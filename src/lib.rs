//! Bridge between a Max patch and a hosted chat-completion model.
//!
//! MIDI clips are sent to the model as a compact note table and the model's
//! reply is decoded back into notes. The conversation (role, sampling
//! settings and message history) lives in a [`state::ConversationState`]
//! owned by the [`bridge::Bridge`].

pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod notes;
pub mod orchestrator;
pub mod prompt;
pub mod state;

pub use bridge::{Bridge, Command, Event, Status};
pub use client::{ChatBackend, ChatMessage, ChatRequest, OpenAiClient};
pub use config::Config;
pub use notes::Note;
pub use orchestrator::{Completion, Orchestrator};
pub use prompt::PromptPayload;
pub use state::{ConversationState, Role};
