use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

use pqa_ai::embeddings::Embedder;
use pqa_ai::extract::TextExtractor;
use pqa_ai::index::{IndexEntry, IndexHandle, JsonVectorStore, ScoredEntry, VectorStore};
use pqa_ai::llm::Llm;
use pqa_ai::session::{Collaborators, QaSession};
use pqa_ai::upload::UploadedFile;
use pqa_core::config::AppConfig;
use pqa_core::domain::Role;
use pqa_core::error::AppError;
use pqa_core::prompt::{NO_INDEX_GUIDANCE, REFUSAL_SENTENCE};
use pqa_core::session::PipelineState;
use pretty_assertions::assert_eq;

const LEAVE_POLICY: &str = "Quy trình nghỉ phép yêu cầu đơn xin nghỉ trước 3 ngày.";

/// Treats everything after the `%PDF` marker as text; form feeds separate pages.
struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, AppError> {
        let body = String::from_utf8_lossy(&pdf_bytes[4..]).to_string();
        Ok(body.split('\u{c}').map(|p| p.trim().to_string()).collect())
    }
}

/// Letter-frequency embedding with a constant component so no vector is all zeros.
#[derive(Default)]
struct LetterEmbedder {
    calls: Cell<usize>,
}

impl Embedder for LetterEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        self.calls.set(self.calls.get() + 1);
        let mut v = vec![0.0f32; 27];
        v[26] = 1.0;
        for ch in input.to_lowercase().chars() {
            if ch.is_ascii_lowercase() {
                v[(ch as u8 - b'a') as usize] += 1.0;
            }
        }
        Ok(v)
    }
}

struct RecordingLlm {
    reply: Result<String, AppError>,
    prompts: RefCell<Vec<String>>,
}

impl RecordingLlm {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            reply: Err(AppError::new("AI_COMPLETION_FAILED", "Failed to call completion endpoint")
                .with_details("connection refused")),
            prompts: RefCell::new(Vec::new()),
        }
    }

    fn last_prompt(&self) -> String {
        self.prompts.borrow().last().cloned().unwrap_or_default()
    }
}

impl Llm for RecordingLlm {
    fn generate(&self, _model: &str, prompt: &str) -> Result<String, AppError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.reply.clone()
    }
}

fn pdf(name: &str, pages: &[&str]) -> UploadedFile {
    UploadedFile::new(name, format!("%PDF{}", pages.join("\u{c}")).into_bytes())
}

/// JSON store whose entry writes fail while `fail_upsert` is set.
struct FlakyStore {
    inner: JsonVectorStore,
    fail_upsert: Cell<bool>,
}

impl VectorStore for FlakyStore {
    fn location(&self) -> String {
        self.inner.location()
    }

    fn next_generation(&self) -> Result<u64, AppError> {
        self.inner.next_generation()
    }

    fn count(&self) -> Result<usize, AppError> {
        self.inner.count()
    }

    fn current(&self) -> Result<Option<IndexHandle>, AppError> {
        self.inner.current()
    }

    fn reset(&self) -> Result<(), AppError> {
        self.inner.reset()
    }

    fn upsert(&self, entries: &[IndexEntry]) -> Result<(), AppError> {
        if self.fail_upsert.get() {
            return Err(AppError::new("AI_INDEX_PERSIST_FAILED", "Failed to write index entries")
                .with_details("disk full"));
        }
        self.inner.upsert(entries)
    }

    fn commit(&self, handle: &IndexHandle) -> Result<(), AppError> {
        self.inner.commit(handle)
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>, AppError> {
        self.inner.query(vector, k)
    }
}

fn session_with_store(
    dir: &Path,
    store: Rc<dyn VectorStore>,
    embedder: Rc<LetterEmbedder>,
    llm: Rc<RecordingLlm>,
) -> QaSession {
    let cfg = AppConfig {
        index_dir: dir.to_path_buf(),
        ..AppConfig::default()
    };
    let collab = Collaborators {
        extractor: Rc::new(PlainTextExtractor),
        embedder,
        llm,
        store,
    };
    QaSession::new(cfg, collab).expect("session")
}

fn session_at(dir: &Path, embedder: Rc<LetterEmbedder>, llm: Rc<RecordingLlm>) -> QaSession {
    let store = Rc::new(JsonVectorStore::open(dir.to_path_buf()));
    session_with_store(dir, store, embedder, llm)
}

#[test]
fn asking_before_processing_returns_guidance_without_backend_calls() {
    let dir = tempfile::tempdir().expect("tempdir");
    let embedder = Rc::new(LetterEmbedder::default());
    let llm = Rc::new(RecordingLlm::replying("unused"));
    let mut session = session_at(dir.path(), embedder.clone(), llm.clone());

    let answer = session.ask("Quy trình nghỉ phép là gì?");
    assert_eq!(answer, NO_INDEX_GUIDANCE);
    assert_eq!(session.state(), PipelineState::Uninitialized);
    assert_eq!(embedder.calls.get(), 0);
    assert!(llm.prompts.borrow().is_empty());

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "Quy trình nghỉ phép là gì?");
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, NO_INDEX_GUIDANCE);
}

#[test]
fn processing_nothing_is_upload_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let embedder = Rc::new(LetterEmbedder::default());
    let llm = Rc::new(RecordingLlm::replying("x"));
    let mut session = session_at(dir.path(), embedder.clone(), llm);

    let err = session.process_documents(&[]).expect_err("no files");
    assert_eq!(err.code, "UPLOAD_MISSING");
    assert_eq!(session.state(), PipelineState::Uninitialized);
    assert_eq!(embedder.calls.get(), 0);
}

#[test]
fn answers_from_processed_documents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let llm = Rc::new(RecordingLlm::replying("Bạn cần nộp đơn xin nghỉ trước 3 ngày."));
    let mut session = session_at(dir.path(), Rc::new(LetterEmbedder::default()), llm.clone());

    let handle = session
        .process_documents(&[pdf("policy.pdf", &[LEAVE_POLICY])])
        .expect("process");
    assert_eq!(handle.generation, 1);
    assert_eq!(handle.chunk_count, 1);
    assert_eq!(session.state(), PipelineState::NeedsRebuild);

    let answer = session.ask("Quy trình nghỉ phép là gì?");
    assert_eq!(answer, "Bạn cần nộp đơn xin nghỉ trước 3 ngày.");
    assert_eq!(session.state(), PipelineState::Ready);

    let prompt = llm.last_prompt();
    assert!(prompt.starts_with("System: "));
    assert!(prompt.contains(LEAVE_POLICY));
    assert!(prompt.contains("Question: Quy trình nghỉ phép là gì?"));
    assert_eq!(session.history().len(), 2);
}

#[test]
fn unrelated_question_passes_refusal_through_verbatim() {
    let dir = tempfile::tempdir().expect("tempdir");
    let llm = Rc::new(RecordingLlm::replying(REFUSAL_SENTENCE));
    let mut session = session_at(dir.path(), Rc::new(LetterEmbedder::default()), llm.clone());

    session
        .process_documents(&[pdf("policy.pdf", &[LEAVE_POLICY])])
        .expect("process");
    assert_eq!(session.ask("Giá cổ phiếu hôm nay?"), REFUSAL_SENTENCE);

    // The model sees the refusal rule next to whatever was retrieved.
    let prompt = llm.last_prompt();
    let rule = prompt.find(REFUSAL_SENTENCE).expect("refusal rule");
    let context = prompt.find(LEAVE_POLICY).expect("retrieved context");
    assert!(rule < context);
    assert!(prompt.contains("Question: Giá cổ phiếu hôm nay?"));
}

#[test]
fn backend_failure_becomes_error_answer_and_is_recorded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = session_at(
        dir.path(),
        Rc::new(LetterEmbedder::default()),
        Rc::new(RecordingLlm::failing()),
    );
    session
        .process_documents(&[pdf("policy.pdf", &[LEAVE_POLICY])])
        .expect("process");

    let answer = session.ask("Quy trình nghỉ phép là gì?");
    assert_eq!(
        answer,
        "Error: [AI_COMPLETION_FAILED] Failed to call completion endpoint (connection refused)"
    );
    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, answer);
    assert_eq!(session.state(), PipelineState::Ready);
}

#[test]
fn reprocessing_rebinds_to_the_new_documents_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let llm = Rc::new(RecordingLlm::replying("ok"));
    let mut session = session_at(dir.path(), Rc::new(LetterEmbedder::default()), llm.clone());

    session
        .process_documents(&[pdf("old.pdf", &["Old handbook: parking is free."])])
        .expect("first");
    session.ask("Is parking free?");
    assert!(llm.last_prompt().contains("Old handbook"));

    let second = session
        .process_documents(&[pdf("new.pdf", &["New handbook: parking costs 5 dollars."])])
        .expect("second");
    assert_eq!(second.generation, 2);
    assert_eq!(session.state(), PipelineState::NeedsRebuild);

    session.ask("Is parking free?");
    let prompt = llm.last_prompt();
    assert!(prompt.contains("New handbook"));
    assert!(!prompt.contains("Old handbook"));
    assert_eq!(session.history().len(), 4);
}

#[test]
fn failed_reprocess_keeps_the_previous_index_usable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let llm = Rc::new(RecordingLlm::replying("ok"));
    let mut session = session_at(dir.path(), Rc::new(LetterEmbedder::default()), llm.clone());

    session
        .process_documents(&[pdf("policy.pdf", &[LEAVE_POLICY])])
        .expect("process");
    session.ask("Quy trình nghỉ phép là gì?");

    let err = session
        .process_documents(&[UploadedFile::new("notes.txt", b"plain text".to_vec())])
        .expect_err("not a pdf");
    assert_eq!(err.code, "UPLOAD_INVALID");
    assert_eq!(session.state(), PipelineState::Ready);
    assert_eq!(session.index().map(|h| h.generation), Some(1));

    assert_eq!(session.ask("Quy trình nghỉ phép là gì?"), "ok");
    assert!(llm.last_prompt().contains(LEAVE_POLICY));
}

#[test]
fn new_session_starts_uninitialized_until_resumed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let llm = Rc::new(RecordingLlm::replying("ok"));
    {
        let mut first = session_at(dir.path(), Rc::new(LetterEmbedder::default()), llm.clone());
        first
            .process_documents(&[pdf("policy.pdf", &["Page one text.", "Page two text."])])
            .expect("process");
    }

    let mut second = session_at(dir.path(), Rc::new(LetterEmbedder::default()), llm.clone());
    assert_eq!(second.state(), PipelineState::Uninitialized);
    assert_eq!(second.ask("What is on page two?"), NO_INDEX_GUIDANCE);

    let resumed = second.resume_existing_index().expect("resume");
    assert_eq!(resumed.map(|h| h.chunk_count), Some(2));
    assert_eq!(second.ask("What is on page two?"), "ok");
    assert!(llm.last_prompt().contains("Page two text."));
}

#[test]
fn index_removed_behind_the_session_answers_without_context() {
    let dir = tempfile::tempdir().expect("tempdir");
    let llm = Rc::new(RecordingLlm::replying(REFUSAL_SENTENCE));
    let mut session = session_at(dir.path(), Rc::new(LetterEmbedder::default()), llm.clone());
    session
        .process_documents(&[pdf("policy.pdf", &[LEAVE_POLICY])])
        .expect("process");

    std::fs::remove_file(dir.path().join("index").join("index_status.json")).expect("remove");

    assert_eq!(session.ask("Quy trình nghỉ phép là gì?"), REFUSAL_SENTENCE);
    let prompt = llm.last_prompt();
    assert!(prompt.contains("Context:\n\n\nQuestion: Quy trình nghỉ phép là gì?"));
    assert!(!prompt.contains(LEAVE_POLICY));
}

#[test]
fn store_write_failure_is_reported_and_session_recovers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Rc::new(FlakyStore {
        inner: JsonVectorStore::open(dir.path().to_path_buf()),
        fail_upsert: Cell::new(false),
    });
    let llm = Rc::new(RecordingLlm::replying("ok"));
    let mut session = session_with_store(
        dir.path(),
        store.clone(),
        Rc::new(LetterEmbedder::default()),
        llm.clone(),
    );

    let first = session
        .process_documents(&[pdf("old.pdf", &["Old handbook: parking is free."])])
        .expect("first");
    session.ask("Is parking free?");
    assert_eq!(session.state(), PipelineState::Ready);

    store.fail_upsert.set(true);
    let err = session
        .process_documents(&[pdf("new.pdf", &["New handbook: parking costs 5 dollars."])])
        .expect_err("write fails");
    assert_eq!(err.code, "AI_INDEX_PERSIST_FAILED");
    assert_eq!(session.state(), PipelineState::Ready);
    assert_eq!(session.index(), Some(&first));

    // The store now reads as empty; the session still answers, without context.
    assert_eq!(session.ask("Is parking free?"), "ok");
    assert!(!llm.last_prompt().contains("Old handbook"));

    store.fail_upsert.set(false);
    let third = session
        .process_documents(&[pdf("new.pdf", &["New handbook: parking costs 5 dollars."])])
        .expect("retry");
    assert_eq!(first.generation, 1);
    assert_eq!(third.generation, 3);
    assert_eq!(session.state(), PipelineState::NeedsRebuild);

    assert_eq!(session.ask("Is parking free?"), "ok");
    assert!(llm.last_prompt().contains("New handbook"));
    assert_eq!(session.history().len(), 6);
}
