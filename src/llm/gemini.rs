use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::provider::CompletionProvider;
use super::types::{Completion, CompletionRequest, Usage};
use crate::errors::ApiError;

/// Adapter for Gemini-style generation endpoints.
///
/// The wire format takes a single prompt, so the message list is
/// flattened into role-labelled lines. The API does not report token
/// usage; accounting stays zeroed rather than guessed.
#[derive(Clone)]
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    fn flatten_messages(request: &CompletionRequest) -> String {
        request
            .messages
            .iter()
            .map(|msg| match msg.role.as_str() {
                "system" => format!("System: {}", msg.content),
                "user" => format!("User: {}", msg.content),
                "assistant" => format!("Assistant: {}", msg.content),
                _ => msg.content.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        request: CompletionRequest,
        model_id: &str,
    ) -> Result<Completion, ApiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model_id, self.api_key
        );

        let prompt = Self::flatten_messages(&request);
        let mut body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        if request.temperature.is_some() || request.max_tokens.is_some() {
            let mut gen_config = serde_json::Map::new();
            if let Some(t) = request.temperature {
                gen_config.insert("temperature".to_string(), json!(t));
            }
            if let Some(m) = request.max_tokens {
                gen_config.insert("maxOutputTokens".to_string(), json!(m));
            }
            body["generationConfig"] = Value::Object(gen_config);
        }

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Completion(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Completion(format!(
                "generateContent failed ({status}): {text}"
            )));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ApiError::Completion(e.to_string()))?;

        let content = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(Completion {
            content,
            usage: Usage::default(),
        })
    }

    async fn generate_stream(
        &self,
        request: CompletionRequest,
        model_id: &str,
    ) -> Result<mpsc::Receiver<Result<String, ApiError>>, ApiError> {
        // No incremental output here: deliver the full response as one fragment.
        let completion = self.generate(request, model_id).await?;

        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(Ok(completion.content)).await;
        Ok(rx)
    }
}
