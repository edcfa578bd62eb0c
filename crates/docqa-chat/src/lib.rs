//! docqa chat crate - conversation memory, the generation seam and the
//! streaming answer orchestrator.

pub mod error;
pub mod generation;
pub mod memory;
pub mod orchestrator;

pub use error::ChatError;
pub use generation::{ExtractiveGeneration, GenerationEngine, GenerationRequest, TokenSink};
pub use memory::ConversationMemory;
pub use orchestrator::{
    AnswerStream, GenerationOutcome, OrchestratorConfig, QuestionRequest, StreamingOrchestrator,
};
