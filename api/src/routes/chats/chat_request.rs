use serde::Deserialize;

/// Body of POST /chats.
#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub name: String,
}

/// Body of POST /chats/{name}/questions.
#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}
