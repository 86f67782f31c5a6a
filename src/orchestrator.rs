//! Runs one prompt against the remote model and folds the result into the
//! conversation.

use crate::client::{ChatBackend, ChatMessage, ChatRequest, MODEL};
use crate::error::PromptError;
use crate::notes::{decode, decode_strict, table_in_reply, Note};
use crate::prompt::PromptPayload;
use crate::state::ConversationState;
use log::{debug, warn};

/// Result of a successful prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub reply: ChatMessage,
    pub notes: Vec<Note>,
}

pub struct Orchestrator<B> {
    backend: B,
    model: String,
    strict_notes: bool,
}

impl<B: ChatBackend> Orchestrator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            model: MODEL.to_string(),
            strict_notes: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Refuse replies whose note table has malformed rows instead of passing
    /// NaN values on.
    pub fn with_strict_notes(mut self, strict: bool) -> Self {
        self.strict_notes = strict;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Appends the prompt to the history, asks the model, appends its reply
    /// and decodes the note table in it.
    ///
    /// The prompt stays in the history when the remote call fails. With
    /// strict notes the reply also stays when its table is rejected.
    pub async fn submit(
        &self,
        state: &mut ConversationState,
        payload: PromptPayload,
    ) -> Result<Completion, PromptError> {
        let role = state.role();
        state.push(ChatMessage::new(role, payload.into_content()));

        let request = ChatRequest {
            model: self.model.clone(),
            messages: state.history().to_vec(),
            temperature: state.temperature(),
            max_tokens: state.max_tokens(),
        };

        let reply = match self.backend.complete(&request).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!("completion failed: {err}");
                return Err(err.into());
            }
        };
        state.push(reply.clone());

        let table = table_in_reply(reply.content_text());
        let notes = if self.strict_notes {
            decode_strict(table)?
        } else {
            decode(table)
        };
        debug!("decoded {} notes from reply", notes.len());

        Ok(Completion { reply, notes })
    }
}
