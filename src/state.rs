use std::env;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{AppConfig, AppPaths, ProviderKind};
use crate::documents::{DocumentPipeline, FsBlobStore, SqliteDocumentRegistry};
use crate::extract::PlainTextExtractor;
use crate::llm::{GeminiProvider, LanguageTools, ModelRegistry, OpenAiProvider};
use crate::rag::{RagEngine, SqliteVectorStore};

/// Process-wide wiring. Providers and stores are constructed once here
/// and handed down explicitly; nothing reaches for global clients.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: Arc<AppConfig>,
    pub rag: RagEngine,
    pub pipeline: DocumentPipeline,
    pub language_tools: LanguageTools,
    pub models: ModelRegistry,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub async fn initialize() -> anyhow::Result<Arc<Self>> {
        let paths = Arc::new(AppPaths::new());
        let config = Arc::new(AppConfig::from_env());

        let openai = Arc::new(OpenAiProvider::new(
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com".to_string()),
            env::var("OPENAI_API_KEY").unwrap_or_default(),
            config.embedding_model.clone(),
        ));
        let gemini = Arc::new(GeminiProvider::new(
            env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            env::var("GOOGLE_AI_API_KEY").unwrap_or_default(),
        ));

        let mut models = ModelRegistry::new();
        for (model_id, kind) in &config.models {
            match kind {
                ProviderKind::OpenAi => models.register(model_id.clone(), openai.clone()),
                ProviderKind::Gemini => models.register(model_id.clone(), gemini.clone()),
            }
        }

        let vector_store = Arc::new(SqliteVectorStore::new(paths.vector_db_path.clone()).await?);
        let registry = Arc::new(SqliteDocumentRegistry::new(paths.registry_db_path.clone()).await?);
        let blobs = Arc::new(FsBlobStore::new(paths.blob_dir.clone()));

        let rag = RagEngine::new(
            openai.clone(),
            vector_store,
            models.clone(),
            config.clone(),
        );

        let pipeline = DocumentPipeline::new(
            registry,
            blobs,
            Arc::new(PlainTextExtractor),
            rag.clone(),
            config.clone(),
        )?;

        let language_tools = LanguageTools::new(openai, config.utility_model.clone());

        Ok(Arc::new(AppState {
            paths,
            config,
            rag,
            pipeline,
            language_tools,
            models,
            started_at: Utc::now(),
        }))
    }
}
