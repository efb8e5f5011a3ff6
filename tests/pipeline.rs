//! End-to-end pipeline tests over mock AI providers.
//!
//! Everything runs against real SQLite stores and a real filesystem
//! blob store in a temp directory; only the embedding and completion
//! providers are mocked.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use docuchat_backend::config::AppConfig;
use docuchat_backend::documents::{
    DocumentPipeline, DocumentStatus, FsBlobStore, SqliteDocumentRegistry, UploadedFile,
};
use docuchat_backend::errors::ApiError;
use docuchat_backend::extract::PlainTextExtractor;
use docuchat_backend::llm::{
    ChatMessage, Completion, CompletionProvider, CompletionRequest, EmbeddingProvider,
    ModelRegistry, Usage,
};
use docuchat_backend::rag::{RagEngine, SqliteVectorStore};

/// Deterministic embedder: texts mentioning "zebra" land on an axis
/// orthogonal to everything else, so they fall below the similarity
/// threshold for ordinary queries.
struct MockEmbedder {
    calls: AtomicUsize,
}

impl MockEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.contains("zebra") {
            Ok(vec![0.0, 1.0])
        } else {
            Ok(vec![1.0, 0.0])
        }
    }
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ApiError> {
        Err(ApiError::Embedding("provider timeout".to_string()))
    }
}

struct MockCompletion;

#[async_trait]
impl CompletionProvider for MockCompletion {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        _request: CompletionRequest,
        _model_id: &str,
    ) -> Result<Completion, ApiError> {
        Ok(Completion {
            content: "The document covers refund policy.".to_string(),
            usage: Usage {
                prompt_tokens: 10,
                completion_tokens: 8,
                total_tokens: 18,
            },
        })
    }

    async fn generate_stream(
        &self,
        request: CompletionRequest,
        model_id: &str,
    ) -> Result<mpsc::Receiver<Result<String, ApiError>>, ApiError> {
        let completion = self.generate(request, model_id).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(Ok(completion.content)).await;
        Ok(rx)
    }
}

struct Harness {
    _dir: TempDir,
    embedder: Arc<MockEmbedder>,
    rag: RagEngine,
    pipeline: DocumentPipeline,
}

async fn harness() -> Harness {
    harness_with_embedder(Arc::new(MockEmbedder::new())).await
}

async fn harness_with_embedder(embedder: Arc<MockEmbedder>) -> Harness {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(AppConfig::default());

    let vector_store = Arc::new(
        SqliteVectorStore::new(dir.path().join("vectors.db"))
            .await
            .unwrap(),
    );
    let registry = Arc::new(
        SqliteDocumentRegistry::new(dir.path().join("documents.db"))
            .await
            .unwrap(),
    );
    let blobs = Arc::new(FsBlobStore::new(dir.path().join("blobs")));

    let mut models = ModelRegistry::new();
    models.register("test-model", Arc::new(MockCompletion));

    let rag = RagEngine::new(
        embedder.clone(),
        vector_store,
        models,
        config.clone(),
    );
    let pipeline = DocumentPipeline::new(
        registry,
        blobs,
        Arc::new(PlainTextExtractor),
        rag.clone(),
        config,
    )
    .unwrap();

    Harness {
        _dir: dir,
        embedder,
        rag,
        pipeline,
    }
}

fn text_file(filename: &str, content: &str) -> UploadedFile {
    UploadedFile {
        filename: filename.to_string(),
        bytes: content.as_bytes().to_vec(),
    }
}

#[tokio::test]
async fn ingest_then_answer_end_to_end() {
    let h = harness().await;

    // 2,500 chars with chunk_size 1000 / overlap 200 -> 3 chunks.
    let content = "a".repeat(2500);
    let document = h
        .pipeline
        .ingest(text_file("policy.txt", &content), "acme", "u1")
        .await
        .unwrap();

    assert_eq!(document.status, DocumentStatus::Processed);
    assert_eq!(document.chunk_count, 3);
    assert!(document.storage_url.is_some());
    assert_eq!(h.rag.chunk_count("acme", Some(&document.id)).await.unwrap(), 3);

    let answer = h
        .rag
        .answer("acme", "What does this document say?", "test-model", "en", vec![])
        .await
        .unwrap();

    assert!(!answer.context_used.is_empty());
    assert_eq!(answer.model_used, "test-model");
    assert_eq!(answer.language, "en");
    assert_eq!(answer.usage.total_tokens, 18);
    assert!(answer
        .context_used
        .iter()
        .all(|hit| hit.document_id == document.id && hit.similarity >= 0.7));
}

#[tokio::test]
async fn answer_respects_conversation_history() {
    let h = harness().await;
    h.pipeline
        .ingest(text_file("doc.txt", &"b".repeat(1200)), "acme", "u1")
        .await
        .unwrap();

    let history = vec![
        ChatMessage::user("Hi"),
        ChatMessage::assistant("Hello, how can I help?"),
    ];
    let answer = h
        .rag
        .answer("acme", "Tell me more", "test-model", "es", history)
        .await
        .unwrap();
    assert_eq!(answer.language, "es");
}

#[tokio::test]
async fn unsupported_model_fails_before_any_embedding() {
    let h = harness().await;
    let calls_before = h.embedder.call_count();

    let err = h
        .rag
        .answer("acme", "anything", "foo-bar", "en", vec![])
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::UnsupportedModel(m) if m == "foo-bar"));
    assert_eq!(h.embedder.call_count(), calls_before);
}

#[tokio::test]
async fn oversized_upload_is_rejected_without_side_effects() {
    let h = harness().await;

    let file = UploadedFile {
        filename: "big.txt".to_string(),
        bytes: vec![b'x'; 11 * 1024 * 1024],
    };
    let err = h.pipeline.ingest(file, "acme", "u1").await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    let stats = h.pipeline.stats("acme").await.unwrap();
    assert_eq!(stats.total_documents, 0);
    assert_eq!(h.embedder.call_count(), 0);
}

#[tokio::test]
async fn disallowed_extension_is_rejected() {
    let h = harness().await;
    let err = h
        .pipeline
        .ingest(text_file("malware.exe", "boom"), "acme", "u1")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(msg) if msg.contains("pdf, docx, txt")));
}

#[tokio::test]
async fn embedding_failure_marks_document_failed() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(AppConfig::default());

    let vector_store = Arc::new(
        SqliteVectorStore::new(dir.path().join("vectors.db"))
            .await
            .unwrap(),
    );
    let registry = Arc::new(
        SqliteDocumentRegistry::new(dir.path().join("documents.db"))
            .await
            .unwrap(),
    );
    let blobs = Arc::new(FsBlobStore::new(dir.path().join("blobs")));
    let rag = RagEngine::new(
        Arc::new(FailingEmbedder),
        vector_store,
        ModelRegistry::new(),
        config.clone(),
    );
    let pipeline = DocumentPipeline::new(
        registry,
        blobs,
        Arc::new(PlainTextExtractor),
        rag,
        config,
    )
    .unwrap();

    let err = pipeline
        .ingest(text_file("doc.txt", "some content"), "acme", "u1")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Embedding(_)));

    let docs = pipeline.list("acme", 10, 0).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].status, DocumentStatus::Failed);
}

#[tokio::test]
async fn reprocess_fully_replaces_the_chunk_set() {
    let h = harness().await;

    let document = h
        .pipeline
        .ingest(text_file("doc.txt", &"c".repeat(2500)), "acme", "u1")
        .await
        .unwrap();
    assert_eq!(document.chunk_count, 3);

    let reprocessed = h.pipeline.reprocess(&document.id, "acme").await.unwrap();
    assert_eq!(reprocessed.status, DocumentStatus::Processed);
    assert_eq!(reprocessed.chunk_count, 3);

    // No duplicates from the old set.
    assert_eq!(
        h.rag.chunk_count("acme", Some(&document.id)).await.unwrap(),
        3
    );
}

#[tokio::test]
async fn update_shrinks_chunk_set_without_leftovers() {
    let h = harness().await;

    let five: Vec<String> = (0..5).map(|i| format!("old chunk {i}")).collect();
    h.rag
        .store_chunks("acme", "doc-1", &five, serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(h.rag.chunk_count("acme", Some("doc-1")).await.unwrap(), 5);

    let three: Vec<String> = (0..3).map(|i| format!("new chunk {i}")).collect();
    let stored = h
        .rag
        .update_for_document("acme", "doc-1", &three, serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(stored, 3);
    assert_eq!(h.rag.chunk_count("acme", Some("doc-1")).await.unwrap(), 3);

    let hits = h.rag.search("acme", "new chunk", 10).await.unwrap();
    assert!(hits.iter().all(|hit| hit.content.starts_with("new chunk")));
}

#[tokio::test]
async fn reprocess_unknown_document_is_not_found() {
    let h = harness().await;
    let err = h.pipeline.reprocess("missing-id", "acme").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn delete_is_idempotent_and_complete() {
    let h = harness().await;

    let document = h
        .pipeline
        .ingest(text_file("doc.txt", &"d".repeat(1500)), "acme", "u1")
        .await
        .unwrap();

    h.pipeline.delete(&document.id, "acme").await.unwrap();
    // Second delete of the same id is a no-op success.
    h.pipeline.delete(&document.id, "acme").await.unwrap();

    let stats = h.pipeline.stats("acme").await.unwrap();
    assert_eq!(stats.total_documents, 0);

    let hits = h.rag.search("acme", "anything", 10).await.unwrap();
    assert!(hits.iter().all(|hit| hit.document_id != document.id));
    assert_eq!(h.rag.chunk_count("acme", None).await.unwrap(), 0);
}

#[tokio::test]
async fn tenants_never_see_each_other() {
    let h = harness().await;

    let doc_a = h
        .pipeline
        .ingest(text_file("a.txt", &"e".repeat(1200)), "tenant-a", "u1")
        .await
        .unwrap();
    h.pipeline
        .ingest(text_file("b.txt", &"f".repeat(1200)), "tenant-b", "u2")
        .await
        .unwrap();

    let hits = h.rag.search("tenant-b", "query", 10).await.unwrap();
    assert!(hits.iter().all(|hit| hit.tenant_id == "tenant-b"));

    // Cross-tenant delete attempts are no-ops against foreign documents.
    h.pipeline.delete(&doc_a.id, "tenant-b").await.unwrap();
    assert_eq!(
        h.rag.chunk_count("tenant-a", Some(&doc_a.id)).await.unwrap(),
        2
    );

    // The privileged analytics path sees both tenants.
    let all = h.rag.cross_tenant_search("query", 10).await.unwrap();
    let tenants: Vec<&str> = all.iter().map(|hit| hit.tenant_id.as_str()).collect();
    assert!(tenants.contains(&"tenant-a"));
    assert!(tenants.contains(&"tenant-b"));
}

#[tokio::test]
async fn search_drops_results_below_threshold() {
    let h = harness().await;

    h.rag
        .store_chunks(
            "acme",
            "doc-z",
            &["all about the zebra exhibit".to_string()],
            serde_json::json!({}),
        )
        .await
        .unwrap();
    h.rag
        .store_chunks(
            "acme",
            "doc-r",
            &["refund policy details".to_string()],
            serde_json::json!({}),
        )
        .await
        .unwrap();

    // "zebra" chunks embed orthogonally and score 0 against this query.
    let hits = h.rag.search("acme", "refunds", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document_id, "doc-r");
    assert!(hits[0].similarity >= 0.7);
}

#[tokio::test]
async fn search_honors_the_result_limit() {
    let h = harness().await;

    let chunks: Vec<String> = (0..10).map(|i| format!("chunk number {i}")).collect();
    h.rag
        .store_chunks("acme", "doc-many", &chunks, serde_json::json!({}))
        .await
        .unwrap();

    let hits = h.rag.search("acme", "chunk", 5).await.unwrap();
    assert!(hits.len() <= 5);
    for pair in hits.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[tokio::test]
async fn extraction_failure_leaves_no_registry_row() {
    let h = harness().await;

    // PlainTextExtractor has no pdf support, so extraction fails before
    // any registry or storage work.
    let err = h
        .pipeline
        .ingest(
            UploadedFile {
                filename: "report.pdf".to_string(),
                bytes: vec![0x25, 0x50, 0x44, 0x46],
            },
            "acme",
            "u1",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Extraction(_)));

    let stats = h.pipeline.stats("acme").await.unwrap();
    assert_eq!(stats.total_documents, 0);
}

#[tokio::test]
async fn streaming_answer_returns_context_and_fragments() {
    let h = harness().await;
    h.pipeline
        .ingest(text_file("doc.txt", &"g".repeat(1200)), "acme", "u1")
        .await
        .unwrap();

    let (context, mut rx) = h
        .rag
        .answer_stream("acme", "What is covered?", "test-model", "en", vec![])
        .await
        .unwrap();

    assert!(!context.is_empty());
    let mut full = String::new();
    while let Some(fragment) = rx.recv().await {
        full.push_str(&fragment.unwrap());
    }
    assert_eq!(full, "The document covers refund policy.");
}
