pub mod ollama_service;
pub mod open_ai_service;
pub(crate) mod stream_decode;
