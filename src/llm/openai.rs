use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::provider::{CompletionProvider, EmbeddingProvider};
use super::types::{Completion, CompletionRequest, Usage};
use crate::errors::ApiError;

/// Adapter for OpenAI-compatible chat/embeddings endpoints.
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    embedding_model: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(base_url: String, api_key: String, embedding_model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            embedding_model,
            client: Client::new(),
        }
    }

    fn chat_body(request: &CompletionRequest, model_id: &str, stream: bool) -> Value {
        let mut body = json!({
            "model": model_id,
            "messages": request.messages,
            "stream": stream,
        });
        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(m) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(m));
            }
        }
        body
    }

    fn parse_usage(payload: &Value) -> Usage {
        let usage = &payload["usage"];
        Usage {
            prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0),
            total_tokens: usage["total_tokens"].as_u64().unwrap_or(0),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(
        &self,
        request: CompletionRequest,
        model_id: &str,
    ) -> Result<Completion, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = Self::chat_body(&request, model_id, false);

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Completion(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Completion(format!(
                "chat completion failed ({status}): {text}"
            )));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ApiError::Completion(e.to_string()))?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(Completion {
            content,
            usage: Self::parse_usage(&payload),
        })
    }

    async fn generate_stream(
        &self,
        request: CompletionRequest,
        model_id: &str,
    ) -> Result<mpsc::Receiver<Result<String, ApiError>>, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = Self::chat_body(&request, model_id, true);

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Completion(e.to_string()))?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Completion(format!("stream failed: {text}")));
        }

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        let chunk_str = String::from_utf8_lossy(&bytes);
                        for line in chunk_str.lines() {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            if line == "data: [DONE]" {
                                return;
                            }
                            if let Some(data) = line.strip_prefix("data: ") {
                                if let Ok(json) = serde_json::from_str::<Value>(data) {
                                    if let Some(content) =
                                        json["choices"][0]["delta"]["content"].as_str()
                                    {
                                        if !content.is_empty()
                                            && tx.send(Ok(content.to_string())).await.is_err()
                                        {
                                            return;
                                        }
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(ApiError::Completion(e.to_string()))).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.embedding_model,
            "input": text,
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Embedding(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Embedding(format!(
                "embedding request failed ({status}): {text}"
            )));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ApiError::Embedding(e.to_string()))?;

        let embedding = payload["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| ApiError::Embedding("response missing embedding vector".to_string()))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Vec<f32>>();

        if embedding.is_empty() {
            return Err(ApiError::Embedding("empty embedding vector".to_string()));
        }

        Ok(embedding)
    }
}
