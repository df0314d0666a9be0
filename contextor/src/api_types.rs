use serde::{Deserialize, Serialize};

/// Final answer plus the context that was fed to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaAnswer {
    pub answer: String,
    /// The question after history-aware reformulation.
    pub standalone_question: String,
    pub context: Vec<UsedChunk>,
}

/// One retrieved chunk used to ground an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsedChunk {
    pub score: f32,
    pub source: Option<String>,
    pub text: String,
}
