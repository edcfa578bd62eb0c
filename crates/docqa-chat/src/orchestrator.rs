//! Streaming answer orchestration.
//!
//! Each question gets two tasks: a generation task (retrieve, then generate
//! into a bounded token queue) and a consumer loop that turns the queue into
//! an ordered `StreamEvent` stream.
//!
//! Consumer states:
//! - Running: `select!` over client disconnect, shutdown, the next token and
//!   task completion, under an idle deadline that restarts with each token.
//! - Draining: the task has finished; every token still buffered is
//!   forwarded before anything else.
//! - Terminated: persist the turn once, emit `Sources` if anything was cited,
//!   then exactly one terminal event.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use docqa_core::config::ChatConfig;
use docqa_core::error::{DocqaError, Result};
use docqa_core::events::StreamEvent;
use docqa_core::types::{CitedSnippet, ConversationTurn, HistoryPair};
use docqa_vector::ChunkIndex;

use crate::error::ChatError;
use crate::generation::{GenerationEngine, GenerationRequest, TokenSink};
use crate::memory::ConversationMemory;

/// Stream of events for one answer.
pub type AnswerStream = ReceiverStream<StreamEvent>;

/// One incoming question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRequest {
    pub question: String,
    pub session_id: String,
    pub user_id: String,
}

/// What a successful generation task hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub answer: String,
    pub sources: Vec<CitedSnippet>,
}

/// Tuning for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub top_k: usize,
    pub token_queue_capacity: usize,
    /// Longest wait for the next token (or completion) before giving up.
    pub token_idle_timeout: Duration,
    pub max_question_length: usize,
}

impl OrchestratorConfig {
    pub fn from_chat_config(chat: &ChatConfig, top_k: usize) -> Self {
        Self {
            top_k: top_k.max(1),
            token_queue_capacity: chat.token_queue_capacity.max(1),
            token_idle_timeout: Duration::from_secs(chat.token_idle_timeout_secs),
            max_question_length: chat.max_question_length,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_chat_config(&ChatConfig::default(), 3)
    }
}

/// Turns questions into answer streams.
pub struct StreamingOrchestrator {
    index: Arc<ChunkIndex>,
    engine: Arc<dyn GenerationEngine>,
    memory: ConversationMemory,
    config: OrchestratorConfig,
    shutdown_tx: watch::Sender<bool>,
}

impl StreamingOrchestrator {
    pub fn new(
        index: Arc<ChunkIndex>,
        engine: Arc<dyn GenerationEngine>,
        memory: ConversationMemory,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            index,
            engine,
            memory,
            config,
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Cancel every in-flight answer and refuse new ones.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        info!("Streaming orchestrator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    fn validate(&self, question: &str) -> std::result::Result<(), ChatError> {
        if question.trim().is_empty() {
            return Err(ChatError::EmptyQuestion);
        }
        if question.chars().count() > self.config.max_question_length {
            return Err(ChatError::QuestionTooLong(self.config.max_question_length));
        }
        Ok(())
    }

    /// Start answering a question.
    ///
    /// Fails up front when the question is invalid, no index exists, or the
    /// session history cannot be read. Later failures arrive in-band as a
    /// terminal `StreamEvent::Error`.
    pub async fn start(&self, request: QuestionRequest) -> std::result::Result<AnswerStream, ChatError> {
        if self.is_shut_down() {
            return Err(ChatError::ShuttingDown);
        }
        self.validate(&request.question)?;
        if !self.index.is_available().await? {
            return Err(ChatError::IndexUnavailable(
                "no documents have been indexed".to_string(),
            ));
        }

        let memory = self.memory.clone();
        let (session_id, user_id) = (request.session_id.clone(), request.user_id.clone());
        let history = tokio::task::spawn_blocking(move || memory.assemble(&session_id, &user_id))
            .await
            .map_err(|e| ChatError::StorageError(format!("history task failed: {}", e)))??;

        let (token_tx, token_rx) = mpsc::channel(self.config.token_queue_capacity);
        let (event_tx, event_rx) = mpsc::channel(self.config.token_queue_capacity);

        let task = tokio::spawn(generate_answer(
            Arc::clone(&self.index),
            Arc::clone(&self.engine),
            request.question.clone(),
            history,
            self.config.top_k,
            TokenSink::new(token_tx),
        ));

        info!(
            session_id = %request.session_id,
            user_id = %request.user_id,
            "Answer stream started"
        );

        tokio::spawn(run_consumer(
            task,
            token_rx,
            event_tx,
            self.shutdown_tx.subscribe(),
            self.memory.clone(),
            request,
            self.config.token_idle_timeout,
        ));

        Ok(ReceiverStream::new(event_rx))
    }
}

/// Retrieve context and generate.
async fn generate_answer(
    index: Arc<ChunkIndex>,
    engine: Arc<dyn GenerationEngine>,
    question: String,
    history: Vec<HistoryPair>,
    top_k: usize,
    sink: TokenSink,
) -> Result<GenerationOutcome> {
    let hits = index.query_text(&question, top_k).await?;
    let request = GenerationRequest {
        question,
        context: hits.iter().map(|hit| CitedSnippet::from(&hit.chunk)).collect(),
        history,
    };
    let answer = engine.generate(&request, &sink).await?;
    Ok(GenerationOutcome {
        answer,
        sources: request.context,
    })
}

async fn run_consumer(
    mut task: JoinHandle<Result<GenerationOutcome>>,
    mut tokens: mpsc::Receiver<String>,
    events: mpsc::Sender<StreamEvent>,
    mut shutdown: watch::Receiver<bool>,
    memory: ConversationMemory,
    request: QuestionRequest,
    idle_timeout: Duration,
) {
    const SHUTDOWN_MESSAGE: &str = "service is shutting down";

    if *shutdown.borrow_and_update() {
        task.abort();
        let _ = events.send(StreamEvent::Error(SHUTDOWN_MESSAGE.to_string())).await;
        return;
    }

    // Running. The idle deadline restarts with every forwarded token.
    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);
    let mut watching_shutdown = true;
    let joined = loop {
        tokio::select! {
            biased;

            _ = events.closed() => {
                task.abort();
                debug!(session_id = %request.session_id, "Client disconnected, generation aborted");
                return;
            }
            changed = shutdown.changed(), if watching_shutdown => match changed {
                Ok(()) if *shutdown.borrow_and_update() => {
                    task.abort();
                    let _ = events.send(StreamEvent::Error(SHUTDOWN_MESSAGE.to_string())).await;
                    return;
                }
                Ok(()) => {}
                Err(_) => watching_shutdown = false,
            },
            Some(token) = tokens.recv() => {
                if events.send(StreamEvent::Token(token)).await.is_err() {
                    task.abort();
                    return;
                }
                idle.as_mut().reset(Instant::now() + idle_timeout);
            }
            result = &mut task => break result,
            () = &mut idle => {
                task.abort();
                warn!(
                    session_id = %request.session_id,
                    idle_timeout = ?idle_timeout,
                    "Generation went idle, aborted"
                );
                let _ = events
                    .send(StreamEvent::Error(format!(
                        "generation produced no output for {:?}",
                        idle_timeout
                    )))
                    .await;
                return;
            }
        }
    };

    // Draining.
    while let Ok(token) = tokens.try_recv() {
        if events.send(StreamEvent::Token(token)).await.is_err() {
            return;
        }
    }

    // Terminated.
    let outcome = match joined {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            warn!(session_id = %request.session_id, error = %e, "Generation failed");
            let _ = events.send(StreamEvent::Error(e.to_string())).await;
            return;
        }
        Err(e) => {
            error!(session_id = %request.session_id, error = %e, "Generation task panicked");
            let _ = events
                .send(StreamEvent::Error("generation task failed".to_string()))
                .await;
            return;
        }
    };

    let turn = ConversationTurn {
        session_id: request.session_id.clone(),
        user_id: request.user_id.clone(),
        question: request.question,
        answer: outcome.answer,
        sources: outcome.sources.clone(),
        created_at: Utc::now(),
    };
    let saved = tokio::task::spawn_blocking(move || memory.record(&turn)).await;
    let saved = match saved {
        Ok(result) => result,
        Err(e) => Err(DocqaError::Storage(format!("history task failed: {}", e))),
    };
    if let Err(e) = saved {
        error!(session_id = %request.session_id, error = %e, "Failed to save conversation turn");
        let _ = events
            .send(StreamEvent::Error(format!("failed to save conversation history: {}", e)))
            .await;
        return;
    }

    if !outcome.sources.is_empty() {
        let _ = events.send(StreamEvent::Sources(outcome.sources)).await;
    }
    let _ = events.send(StreamEvent::Done).await;
    info!(session_id = %request.session_id, "Answer stream finished");
}
