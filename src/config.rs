use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Known provider families a model id can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

/// Runtime configuration for the ingestion and retrieval pipeline.
///
/// Defaults mirror the production values; every numeric knob can be
/// overridden through `DOCUCHAT_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Maximum accepted upload size in bytes.
    pub max_file_size: usize,
    /// Allowed file extensions (lowercase, no dot).
    pub allowed_types: Vec<String>,
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,
    /// Minimum similarity score for a chunk to enter the context.
    pub similarity_threshold: f32,
    /// Default number of chunks retrieved per query.
    pub search_limit: usize,
    /// Vector-store insert batch size (bounds payload size, not atomicity).
    pub embed_batch_size: usize,
    /// Embedding model identifier passed to the embedding provider.
    pub embedding_model: String,
    /// Model used for the translate/detect-language helpers.
    pub utility_model: String,
    /// model_id -> provider family routing table.
    pub models: HashMap<String, ProviderKind>,
    /// language code -> response-language directive.
    pub language_directives: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let models = HashMap::from([
            ("gpt-4".to_string(), ProviderKind::OpenAi),
            ("gpt-3.5-turbo".to_string(), ProviderKind::OpenAi),
            ("gemini-pro".to_string(), ProviderKind::Gemini),
        ]);

        let language_directives = HashMap::from([
            ("en".to_string(), "Respond in English.".to_string()),
            ("es".to_string(), "Responde en español.".to_string()),
            ("fr".to_string(), "Répondez en français.".to_string()),
            ("de".to_string(), "Antworten Sie auf Deutsch.".to_string()),
            ("hi".to_string(), "हिंदी में उत्तर दें।".to_string()),
            ("ne".to_string(), "नेपालीमा जवाफ दिनुहोस्।".to_string()),
            ("zh".to_string(), "用中文回答。".to_string()),
            ("ja".to_string(), "日本語で答えてください。".to_string()),
        ]);

        Self {
            max_file_size: 10 * 1024 * 1024,
            allowed_types: vec!["pdf".to_string(), "docx".to_string(), "txt".to_string()],
            chunk_size: 1000,
            chunk_overlap: 200,
            similarity_threshold: 0.7,
            search_limit: 5,
            embed_batch_size: 20,
            embedding_model: "text-embedding-3-small".to_string(),
            utility_model: "gpt-3.5-turbo".to_string(),
            models,
            language_directives,
        }
    }
}

impl AppConfig {
    /// Build the config from defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_usize("DOCUCHAT_MAX_FILE_SIZE") {
            config.max_file_size = v;
        }
        if let Some(v) = env_usize("DOCUCHAT_CHUNK_SIZE") {
            config.chunk_size = v;
        }
        if let Some(v) = env_usize("DOCUCHAT_CHUNK_OVERLAP") {
            config.chunk_overlap = v;
        }
        if let Some(v) = env_usize("DOCUCHAT_SEARCH_LIMIT") {
            config.search_limit = v;
        }
        if let Some(v) = env_usize("DOCUCHAT_EMBED_BATCH_SIZE") {
            config.embed_batch_size = v;
        }
        if let Ok(v) = env::var("DOCUCHAT_SIMILARITY_THRESHOLD") {
            if let Ok(parsed) = v.parse::<f32>() {
                config.similarity_threshold = parsed;
            }
        }
        if let Ok(v) = env::var("DOCUCHAT_EMBEDDING_MODEL") {
            config.embedding_model = v;
        }

        config
    }

    /// Directive for `language`, falling back to the English directive.
    pub fn language_directive(&self, language: &str) -> &str {
        self.language_directives
            .get(language)
            .or_else(|| self.language_directives.get("en"))
            .map(String::as_str)
            .unwrap_or("Respond in English.")
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Filesystem layout for runtime data.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub registry_db_path: PathBuf,
    pub vector_db_path: PathBuf,
    pub blob_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = env::var("DOCUCHAT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join("data")
            });
        Self::with_data_dir(data_dir)
    }

    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let log_dir = data_dir.join("logs");
        let registry_db_path = data_dir.join("documents.db");
        let vector_db_path = data_dir.join("vectors.db");
        let blob_dir = data_dir.join("blobs");

        for dir in [&data_dir, &log_dir, &blob_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            log_dir,
            registry_db_path,
            vector_db_path,
            blob_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
