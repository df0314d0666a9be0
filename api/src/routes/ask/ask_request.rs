use contextor::ChatHistory;
use serde::Deserialize;

/// Request payload for /ask.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    /// Natural language question.
    pub question: String,
    /// Prior exchanges, oldest first. Omit for a first question.
    #[serde(default)]
    pub history: Vec<Exchange>,
}

/// One earlier question and the answer it got.
#[derive(Debug, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

impl AskRequest {
    pub fn chat_history(&self) -> ChatHistory {
        ChatHistory::from_exchanges(
            self.history
                .iter()
                .map(|e| (e.question.clone(), e.answer.clone())),
        )
    }
}
