//! System-prompt construction and language utilities.

use std::sync::Arc;

use super::provider::CompletionProvider;
use super::types::{ChatMessage, CompletionRequest};
use crate::config::AppConfig;
use crate::errors::ApiError;

const BASE_PROMPT: &str = "You are a helpful AI assistant for a business. You should provide accurate, helpful, and professional responses based on the company's documentation and knowledge base.";

const CONDUCT: &str = "If you have relevant context from the company's documents, use it to provide accurate answers. If you don't have specific information, politely say so and offer to help in other ways.\n\nKeep responses concise but informative. Be friendly and professional.";

/// Compose the system prompt: role preamble, language directive, and the
/// retrieved context block when one exists.
pub fn build_system_prompt(config: &AppConfig, context: &str, language: &str) -> String {
    let directive = config.language_directive(language);
    let mut prompt = format!("{BASE_PROMPT}\n\n{directive}\n\n{CONDUCT}");

    if !context.is_empty() {
        prompt.push_str(&format!(
            "\n\nRelevant company information:\n{context}\n\nUse this information to answer the user's question accurately."
        ));
    }

    prompt
}

/// Best-effort translation and language detection, delegated to a text
/// model at low temperature for determinism.
#[derive(Clone)]
pub struct LanguageTools {
    provider: Arc<dyn CompletionProvider>,
    model_id: String,
}

impl LanguageTools {
    pub fn new(provider: Arc<dyn CompletionProvider>, model_id: String) -> Self {
        Self { provider, model_id }
    }

    pub async fn translate(&self, text: &str, target_language: &str) -> Result<String, ApiError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(format!(
                "Translate the following text to {target_language}. Only return the translation, no additional text."
            )),
            ChatMessage::user(text),
        ])
        .with_temperature(0.3)
        .with_max_tokens(500);

        let completion = self.provider.generate(request, &self.model_id).await?;
        Ok(completion.content)
    }

    /// Detect the language of `text`, returning a short code.
    ///
    /// Detection is a convenience, not load-bearing: any provider failure
    /// falls back to "en" instead of propagating. No other operation in
    /// the system is allowed this swallow-on-failure behavior.
    pub async fn detect_language(&self, text: &str) -> String {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "Detect the language of the following text. Return only the language code (e.g. en, es, fr, de, hi, ne, zh, ja).",
            ),
            ChatMessage::user(text),
        ])
        .with_temperature(0.1)
        .with_max_tokens(10);

        match self.provider.generate(request, &self.model_id).await {
            Ok(completion) => completion.content.trim().to_lowercase(),
            Err(err) => {
                tracing::warn!("language detection failed, defaulting to en: {}", err);
                "en".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_without_context_omits_context_block() {
        let config = AppConfig::default();
        let prompt = build_system_prompt(&config, "", "en");
        assert!(prompt.contains("Respond in English."));
        assert!(!prompt.contains("Relevant company information"));
    }

    #[test]
    fn prompt_with_context_includes_it() {
        let config = AppConfig::default();
        let prompt = build_system_prompt(&config, "Our refund window is 30 days.", "es");
        assert!(prompt.contains("Responde en español."));
        assert!(prompt.contains("Our refund window is 30 days."));
        assert!(prompt.contains("Use this information"));
    }

    #[test]
    fn unsupported_language_uses_english_directive() {
        let config = AppConfig::default();
        let prompt = build_system_prompt(&config, "", "tlh");
        assert!(prompt.contains("Respond in English."));
    }
}
