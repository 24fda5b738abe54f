// crates/llm_connector/src/prompt_builder.rs

use crate::{CompletionRequest, Message};

const UTTERANCE_PLACEHOLDER: &str = "{utterance}";

/// Fixed system instruction plus a user template with an `{utterance}` slot.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
    user_template: String,
}

impl PromptBuilder {
    pub fn new(system_prompt: impl Into<String>, user_template: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_template: user_template.into(),
        }
    }

    pub fn build_user_prompt(&self, utterance: &str) -> String {
        let utterance = utterance.trim().replace('"', "\\\"");
        if self.user_template.contains(UTTERANCE_PLACEHOLDER) {
            self.user_template.replace(UTTERANCE_PLACEHOLDER, &utterance)
        } else {
            format!("{}\n{}", self.user_template, utterance)
        }
    }

    pub fn build_request(&self, utterance: &str) -> CompletionRequest {
        CompletionRequest::new(vec![
            Message::system(self.system_prompt.clone()),
            Message::user(self.build_user_prompt(utterance)),
        ])
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    #[test]
    fn fills_placeholder_and_escapes_quotes() {
        let builder = PromptBuilder::new("sys", "発話: \"{utterance}\"");
        assert_eq!(builder.build_user_prompt(" 「a\"b」 "), "発話: \"「a\\\"b」\"");

        let request = builder.build_request("x");
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[1].content, "発話: \"x\"");
    }

    #[test]
    fn appends_when_template_has_no_placeholder() {
        let builder = PromptBuilder::new("sys", "classify:");
        assert_eq!(builder.build_user_prompt("abc"), "classify:\nabc");
    }
}
