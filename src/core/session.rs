/// Conversation state carried across turns.
#[derive(Debug, Clone)]
pub struct Session {
    model: String,
    system_preamble: String,
    continuation_token: Option<Vec<i64>>,
}

impl Session {
    /// Start a session with the default preamble for `model`.
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        let system_preamble = default_system_preamble(&model);
        Self::with_preamble(model, system_preamble)
    }

    pub fn with_preamble(model: impl Into<String>, system_preamble: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_preamble: system_preamble.into(),
            continuation_token: None,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_preamble(&self) -> &str {
        &self.system_preamble
    }

    pub fn continuation_token(&self) -> Option<&[i64]> {
        self.continuation_token.as_deref()
    }

    pub fn has_context(&self) -> bool {
        self.continuation_token.is_some()
    }

    /// Forget accumulated model state; the next turn starts fresh.
    pub fn reset(&mut self) {
        self.continuation_token = None;
    }

    /// Replace the token wholesale with the one from a completed turn.
    pub(crate) fn replace_token(&mut self, token: Option<Vec<i64>>) {
        self.continuation_token = token;
    }
}

const FILE_DIRECTIVE_INSTRUCTIONS: &str = "When the user asks you to create a file, format that part of your reply with this special tag:\n\
<file:name.ext>\n\
[FILE CONTENTS HERE]\n\
</file>\n\
ONLY use this format to create files.";

/// The instruction string sent with every turn.
pub fn default_system_preamble(model: &str) -> String {
    format!(
        "You are a helpful assistant. The model you are running as is {model}. You are NOT ChatGPT.\n\
You are talking to a user in a terminal.\n\
{FILE_DIRECTIVE_INSTRUCTIONS}"
    )
}

/// Combine a user-configured prompt with the file directive instructions.
pub fn custom_system_preamble(prompt: &str) -> String {
    format!("{}\n{FILE_DIRECTIVE_INSTRUCTIONS}", prompt.trim_end())
}
