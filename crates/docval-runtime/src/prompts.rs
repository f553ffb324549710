//! Prompt construction.

use docval_core::ValidationSpec;

use crate::providers::ChatMessage;

/// Instructions sent as the system message with every query.
pub const SYSTEM_PROMPT: &str = "You are a meticulous document compliance reviewer. \
You will be given a validation rule and the text of a document. \
Decide whether the document satisfies the rule. \
Respond with a single JSON object and nothing else, in the form \
{\"passed\": true or false, \"confidence\": a number between 0.0 and 1.0, \
\"reasoning\": \"a short explanation citing the document\"}.";

/// Render the rule portion of a query.
pub fn build_prompt(spec: &ValidationSpec) -> String {
    format!(
        "Validation rule: {}\nCategory: {}\nRequirement: {}\n\n\
         Does the document below satisfy this requirement?",
        spec.name, spec.category, spec.description
    )
}

/// Combine a rule prompt with the document text.
pub fn user_message(prompt: &str, document_text: &str) -> String {
    format!("{}\n\n--- DOCUMENT START ---\n{}\n--- DOCUMENT END ---", prompt, document_text)
}

/// System and user messages for chat-style APIs.
pub fn chat_messages(prompt: &str, document_text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(user_message(prompt, document_text)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_carries_rule_fields() {
        let spec = ValidationSpec::new("Has Title", "Document must have a title", "structure");
        let prompt = build_prompt(&spec);
        assert!(prompt.contains("Has Title"));
        assert!(prompt.contains("Document must have a title"));
        assert!(prompt.contains("structure"));
    }

    #[test]
    fn test_chat_messages() {
        let messages = chat_messages("rule", "# Report");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("\"passed\""));
        assert!(messages[1].content.starts_with("rule"));
        assert!(messages[1].content.contains("# Report"));
    }
}
