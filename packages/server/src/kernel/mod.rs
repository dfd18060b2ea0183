// Request-orchestration kernel: retrieval, generation, and RAG assembly.

pub mod generation;
pub mod prompts;
pub mod rag;
pub mod retrieval;

pub use generation::{
    Confidence, ConversationTurn, GenerationError, GenerationService, MockGenerationService,
    ModelOutput, OpenAIGenerationService, RagResponse,
};
pub use rag::{RagAnswer, RagService};
pub use retrieval::{
    KnowledgeDocument, KnowledgeRetriever, MockRetriever, PgVectorRetriever, RetrievalError,
    RetrievedPassage,
};
