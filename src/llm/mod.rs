pub mod gemini;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod registry;
pub mod types;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use prompt::{build_system_prompt, LanguageTools};
pub use provider::{CompletionProvider, EmbeddingProvider};
pub use registry::ModelRegistry;
pub use types::{ChatMessage, Completion, CompletionRequest, Usage};
