use std::rc::Rc;

use pqa_core::config::AppConfig;
use pqa_core::domain::{ConversationTurn, Role};
use pqa_core::error::AppError;
use pqa_core::prompt::NO_INDEX_GUIDANCE;
use pqa_core::session::{transition, ConversationHistory, PipelineEvent, PipelineState};
use pqa_core::splitter::RecursiveSplitter;
use tracing::{info, warn};

use crate::embeddings::ollama_embed::OllamaEmbedder;
use crate::embeddings::Embedder;
use crate::extract::{LopdfExtractor, TextExtractor};
use crate::index::{build_index, IndexHandle, JsonVectorStore, VectorStore};
use crate::llm::ollama_llm::OllamaLlm;
use crate::llm::Llm;
use crate::ollama::OllamaClient;
use crate::pipeline::AnswerPipeline;
use crate::retrieve::Retriever;
use crate::upload::{stage_and_extract, UploadedFile};

/// External services a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Rc<dyn TextExtractor>,
    pub embedder: Rc<dyn Embedder>,
    pub llm: Rc<dyn Llm>,
    pub store: Rc<dyn VectorStore>,
}

impl Collaborators {
    /// Local Ollama for embeddings and completions, lopdf for text, JSON files for vectors.
    pub fn local(cfg: &AppConfig) -> Result<Self, AppError> {
        let client = OllamaClient::new(&cfg.ollama_base_url)?;
        Ok(Self {
            extractor: Rc::new(LopdfExtractor::new()),
            embedder: Rc::new(OllamaEmbedder::new(client.clone())),
            llm: Rc::new(OllamaLlm::new(client, cfg.temperature)),
            store: Rc::new(JsonVectorStore::open(cfg.index_dir.clone())),
        })
    }
}

/// One user's conversation: history, the current index and the pipeline bound to it.
pub struct QaSession {
    cfg: AppConfig,
    collab: Collaborators,
    splitter: RecursiveSplitter,
    history: ConversationHistory,
    index: Option<IndexHandle>,
    pipeline: Option<AnswerPipeline>,
    state: PipelineState,
}

impl QaSession {
    pub fn new(cfg: AppConfig, collab: Collaborators) -> Result<Self, AppError> {
        cfg.validate()?;
        let splitter = RecursiveSplitter::new(cfg.splitter())?;
        Ok(Self {
            cfg,
            collab,
            splitter,
            history: ConversationHistory::new(),
            index: None,
            pipeline: None,
            state: PipelineState::Uninitialized,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn index(&self) -> Option<&IndexHandle> {
        self.index.as_ref()
    }

    pub fn append_turn(&mut self, role: Role, content: impl Into<String>) {
        self.history.append_turn(role, content);
    }

    pub fn history(&self) -> &[ConversationTurn] {
        self.history.turns()
    }

    /// Adopt `handle` as the current index. Any bound pipeline is dropped.
    pub fn set_index(&mut self, handle: IndexHandle) {
        self.index = Some(handle);
        self.pipeline = None;
        self.state = transition(self.state, PipelineEvent::IndexBuilt);
    }

    /// Pick up an index persisted by an earlier run, if the store has one.
    pub fn resume_existing_index(&mut self) -> Result<Option<IndexHandle>, AppError> {
        let current = self.collab.store.current()?;
        if let Some(handle) = current.clone() {
            info!(generation = handle.generation, "resuming persisted index");
            self.set_index(handle);
        }
        Ok(current)
    }

    /// The pipeline for the current index, built on first use after every index change.
    pub fn get_or_build_pipeline(&mut self) -> Option<&AnswerPipeline> {
        if self.state == PipelineState::NeedsRebuild {
            let handle = self.index.clone()?;
            let retriever = Retriever::new(
                self.collab.store.clone(),
                self.collab.embedder.clone(),
                self.cfg.retrieval(),
            );
            self.pipeline = Some(AnswerPipeline::new(
                retriever,
                self.collab.llm.clone(),
                self.cfg.chat_model.clone(),
                handle,
            ));
            self.state = transition(self.state, PipelineEvent::PipelineBuilt);
        }
        match self.state {
            PipelineState::Ready => self.pipeline.as_ref(),
            _ => None,
        }
    }

    /// Extract, chunk, embed and persist `files`, replacing the previous index entirely.
    ///
    /// On failure the session keeps its previous state and stays usable.
    pub fn process_documents(&mut self, files: &[UploadedFile]) -> Result<IndexHandle, AppError> {
        if files.is_empty() {
            return Err(AppError::new("UPLOAD_MISSING", "Please upload at least one PDF file"));
        }
        info!(files = files.len(), "processing documents");

        let docs = stage_and_extract(files, self.collab.extractor.as_ref())?;
        let chunks = self.splitter.split_documents(&docs);
        let handle = build_index(
            &chunks,
            self.collab.embedder.as_ref(),
            self.collab.store.as_ref(),
            &self.cfg.embed_model,
        )?;
        self.set_index(handle.clone());
        Ok(handle)
    }

    /// Answer `question` and record both turns. Never fails: backend errors become the answer.
    pub fn ask(&mut self, question: &str) -> String {
        self.history.append_turn(Role::User, question);

        let answer = match self.get_or_build_pipeline() {
            None => NO_INDEX_GUIDANCE.to_string(),
            Some(pipeline) => match pipeline.answer(question) {
                Ok(text) => text,
                Err(e) => {
                    warn!(err = %e, details = ?e.details, "answer failed");
                    format!("Error: {}", e.to_user_string())
                }
            },
        };

        self.history.append_turn(Role::Assistant, answer.clone());
        answer
    }
}
