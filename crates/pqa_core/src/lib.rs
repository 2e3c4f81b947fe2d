pub mod config;
pub mod domain;
pub mod error;
pub mod prompt;
pub mod session;
pub mod splitter;

#[cfg(test)]
mod tests {
    use super::error::AppError;

    #[test]
    fn app_error_is_structured() {
        let err = AppError::new("AI_INDEX_NOT_READY", "no index")
            .with_details("index_dir=./vector_db")
            .with_retryable(false);
        assert_eq!(err.code, "AI_INDEX_NOT_READY");
        assert!(err.is("AI_INDEX_NOT_READY"));
        assert_eq!(err.to_string(), "[AI_INDEX_NOT_READY] no index");
        assert_eq!(
            err.to_user_string(),
            "[AI_INDEX_NOT_READY] no index (index_dir=./vector_db)"
        );
        assert!(!err.retryable);
    }
}
