use std::path::PathBuf;

use pqa_ai::ollama::OllamaClient;
use pqa_ai::session::QaSession;
use pqa_ai::upload::UploadedFile;
use pqa_core::config::AppConfig;
use pqa_core::domain::ConversationTurn;
use pqa_core::error::AppError;
use tracing::{info, warn};

pub const STATUS_PROCESSED: &str = "Văn bản đã xử lý";
pub const STATUS_NO_FILES: &str = "Vui lòng tải file PDF";

#[derive(Debug, serde::Serialize)]
pub struct AiHealthStatus {
    pub ok: bool,
    pub message: String,
}

/// One REPL line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Process(Vec<PathBuf>),
    History,
    Health,
    Status,
    Quit,
    Ask(String),
    Empty,
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let mut words = line.split_whitespace();
    match words.next() {
        Some("/process") => Command::Process(words.map(PathBuf::from).collect()),
        Some("/history") => Command::History,
        Some("/health") => Command::Health,
        Some("/status") => Command::Status,
        Some("/quit") | Some("/exit") => Command::Quit,
        _ => Command::Ask(line.to_string()),
    }
}

pub fn ai_health_check(cfg: &AppConfig) -> Result<AiHealthStatus, AppError> {
    let client = OllamaClient::new(&cfg.ollama_base_url)?;
    client.health_check()?;
    Ok(AiHealthStatus {
        ok: true,
        message: format!("Ollama reachable at {}", client.base_url()),
    })
}

/// Read `paths`, rebuild the index and return the status line shown to the user.
pub fn process_paths(session: &mut QaSession, paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return STATUS_NO_FILES.to_string();
    }
    let files: Result<Vec<UploadedFile>, AppError> =
        paths.iter().map(|p| UploadedFile::from_path(p)).collect();
    let result = files.and_then(|files| session.process_documents(&files));
    match result {
        Ok(handle) => {
            info!(
                generation = handle.generation,
                chunks = handle.chunk_count,
                "documents processed"
            );
            STATUS_PROCESSED.to_string()
        }
        Err(e) if e.is("UPLOAD_MISSING") => STATUS_NO_FILES.to_string(),
        Err(e) => {
            warn!(err = %e, details = ?e.details, "document processing failed");
            format!("Lỗi xử lý văn bản: {}", e.to_user_string())
        }
    }
}

pub fn render_history(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("[{}] {}: {}", t.at, t.role.as_str(), t.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The committed index as pretty JSON, or `null` when nothing has been processed.
pub fn index_status_json(session: &QaSession) -> Result<String, AppError> {
    serde_json::to_string_pretty(&session.index()).map_err(|e| {
        AppError::new("INDEX_STATUS_ENCODE_FAILED", "Failed to encode index status")
            .with_details(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pqa_core::domain::Role;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_repl_lines() {
        assert_eq!(
            parse_command("/process a.pdf  docs/b.pdf"),
            Command::Process(vec![PathBuf::from("a.pdf"), PathBuf::from("docs/b.pdf")])
        );
        assert_eq!(parse_command("/process"), Command::Process(Vec::new()));
        assert_eq!(parse_command(" /history "), Command::History);
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command("   "), Command::Empty);
        assert_eq!(
            parse_command("Quy trình nghỉ phép là gì?"),
            Command::Ask("Quy trình nghỉ phép là gì?".to_string())
        );
    }

    #[test]
    fn renders_history_one_turn_per_line() {
        let turns = vec![
            ConversationTurn {
                role: Role::User,
                content: "hi".to_string(),
                at: "2026-02-10T00:00:00Z".to_string(),
            },
            ConversationTurn {
                role: Role::Assistant,
                content: "hello".to_string(),
                at: "2026-02-10T00:00:01Z".to_string(),
            },
        ];
        assert_eq!(
            render_history(&turns),
            "[2026-02-10T00:00:00Z] user: hi\n[2026-02-10T00:00:01Z] assistant: hello"
        );
    }
}
