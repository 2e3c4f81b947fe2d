use std::rc::Rc;

use pqa_core::error::AppError;
use pqa_core::prompt::build_prompt;
use tracing::debug;

use crate::index::IndexHandle;
use crate::llm::Llm;
use crate::retrieve::{retrieve_or_empty, Retriever};

/// Question to answer over one index build: retrieve, render the prompt, complete.
///
/// The completion is returned verbatim.
#[derive(Clone)]
pub struct AnswerPipeline {
    retriever: Retriever,
    llm: Rc<dyn Llm>,
    chat_model: String,
    handle: IndexHandle,
}

impl AnswerPipeline {
    pub fn new(
        retriever: Retriever,
        llm: Rc<dyn Llm>,
        chat_model: impl Into<String>,
        handle: IndexHandle,
    ) -> Self {
        Self {
            retriever: retriever.bind(handle.clone()),
            llm,
            chat_model: chat_model.into(),
            handle,
        }
    }

    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    pub fn answer(&self, question: &str) -> Result<String, AppError> {
        let context = retrieve_or_empty(&self.retriever, question, self.retriever.top_k())?;
        let prompt = build_prompt(&context, question);
        debug!(
            generation = self.handle.generation,
            context_chunks = context.len(),
            "sending prompt"
        );
        self.llm.generate(&self.chat_model, &prompt)
    }
}
