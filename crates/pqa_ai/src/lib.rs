pub mod embeddings;
pub mod extract;
pub mod index;
pub mod llm;
pub mod ollama;
pub mod pipeline;
pub mod retrieve;
pub mod session;
pub mod upload;
