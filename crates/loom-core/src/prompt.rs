//! Prompt assembly from workspace state.

use serde::{Deserialize, Serialize};

use crate::completion::ChatMessage;
use crate::document::DocumentStore;
use crate::task::GenerationTask;

/// System prompt and user message for one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledPrompt {
    pub system_prompt: String,
    pub user_message: String,
}

impl AssembledPrompt {
    /// Ordered chat messages; the system message is omitted when empty.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.is_empty() {
            messages.push(ChatMessage::system(self.system_prompt.clone()));
        }
        messages.push(ChatMessage::user(self.user_message.clone()));
        messages
    }
}

/// Builds prompts from a task and the store's context selection.
///
/// Assembly only reads the store; it never mutates it.
pub struct PromptAssembler;

impl PromptAssembler {
    pub fn assemble(task: &GenerationTask, store: &DocumentStore) -> AssembledPrompt {
        let locale = store.locale();

        let mut system_prompt = locale.system_preamble().to_string();
        if !task.task_description.is_empty() {
            system_prompt.push_str("\n\n");
            system_prompt.push_str(locale.task_label());
            system_prompt.push_str(&task.task_description);
        }

        let mut user_message = String::new();
        if !task.requirements.is_empty() {
            user_message.push_str(locale.requirements_label());
            user_message.push_str(&task.requirements);
            user_message.push_str("\n\n");
        }

        let context = store.context_documents();
        if !context.is_empty() {
            user_message.push_str(locale.context_heading());
            user_message.push_str("\n\n");
            for document in context {
                user_message.push_str(&format!(
                    "--- {} ---\n{}\n\n",
                    document.name, document.content
                ));
            }
        }

        user_message.push_str(&locale.output_instruction(task.output_format));

        AssembledPrompt {
            system_prompt,
            user_message,
        }
    }
}
