//! The RAG chain: reformulate → retrieve → answer.

use std::sync::Arc;

use ai_llm_service::ChatStream;
use rag_store::{RagHit, RagStore};
use tracing::info;

use crate::answer::AnswerGenerator;
use crate::api_types::QaAnswer;
use crate::cfg::ContextorConfig;
use crate::error::ContextorError;
use crate::history::ChatHistory;
use crate::llm::ChatModel;
use crate::progress::{NoopProgress, Progress, Stage};
use crate::prompt::plain_messages;
use crate::reformulate::QueryReformulator;
use crate::retrieve::{Retriever, used_chunks};

/// History-aware retrieval chain. Cheap to clone.
#[derive(Clone)]
pub struct RagChain {
    model: Arc<dyn ChatModel>,
    pub(crate) reformulator: QueryReformulator,
    pub(crate) retriever: Retriever,
    pub(crate) generator: AnswerGenerator,
}

/// A streamed answer together with what grounded it.
pub struct StreamingAnswer {
    pub standalone_question: String,
    pub context: Vec<RagHit>,
    pub stream: ChatStream,
}

impl RagChain {
    pub fn new(model: Arc<dyn ChatModel>, store: RagStore, cfg: ContextorConfig) -> Self {
        Self {
            reformulator: QueryReformulator::new(model.clone(), cfg.reformulate_empty_history),
            retriever: Retriever::new(store, cfg.search),
            generator: AnswerGenerator::new(model.clone()),
            model,
        }
    }

    /// Batch answer for `question` given the prior `history`.
    ///
    /// # Errors
    /// [`ContextorError::EmptyQuestion`] for blank input, otherwise the first
    /// failing stage's error.
    pub async fn ask(&self, history: &ChatHistory, question: &str) -> Result<QaAnswer, ContextorError> {
        self.ask_with_progress(history, question, &NoopProgress).await
    }

    pub async fn ask_with_progress(
        &self,
        history: &ChatHistory,
        question: &str,
        progress: &dyn Progress,
    ) -> Result<QaAnswer, ContextorError> {
        let question = non_blank(question)?;

        progress.stage(Stage::Reformulating);
        let standalone = self.reformulator.reformulate(history, question).await?;
        progress.stage(Stage::Retrieving);
        let hits = self.retriever.retrieve(&standalone).await?;
        progress.stage(Stage::Generating);
        let answer = self.generator.answer(question, &hits, history).await?;
        progress.answered(hits.len());

        info!(context = hits.len(), chars = answer.len(), "question answered");
        Ok(QaAnswer {
            answer,
            standalone_question: standalone,
            context: used_chunks(&hits),
        })
    }

    /// Reformulates and retrieves, then opens the answer stream.
    ///
    /// # Errors
    /// Failures before the first token.
    pub async fn ask_streaming(
        &self,
        history: &ChatHistory,
        question: &str,
    ) -> Result<StreamingAnswer, ContextorError> {
        let question = non_blank(question)?;
        let standalone = self.reformulator.reformulate(history, question).await?;
        let context = self.retriever.retrieve(&standalone).await?;
        let stream = self.generator.answer_stream(question, &context, history).await?;
        Ok(StreamingAnswer {
            standalone_question: standalone,
            context,
            stream,
        })
    }

    /// One-shot question: no history, no reformulation, "I'm not sure" policy.
    pub async fn ask_once(&self, question: &str) -> Result<QaAnswer, ContextorError> {
        self.ask_once_with_progress(question, &NoopProgress).await
    }

    pub async fn ask_once_with_progress(
        &self,
        question: &str,
        progress: &dyn Progress,
    ) -> Result<QaAnswer, ContextorError> {
        let question = non_blank(question)?;
        progress.stage(Stage::Retrieving);
        let hits = self.retriever.retrieve(question).await?;
        progress.stage(Stage::Generating);
        let answer = self.generator.answer_once(question, &hits).await?;
        progress.answered(hits.len());
        Ok(QaAnswer {
            answer,
            standalone_question: question.to_string(),
            context: used_chunks(&hits),
        })
    }

    /// Persona chat without retrieval.
    pub async fn chat_plain(
        &self,
        history: &ChatHistory,
        question: &str,
    ) -> Result<ChatStream, ContextorError> {
        let question = non_blank(question)?;
        Ok(self.model.stream(&plain_messages(history, question)).await?)
    }
}

fn non_blank(question: &str) -> Result<&str, ContextorError> {
    let q = question.trim();
    if q.is_empty() {
        Err(ContextorError::EmptyQuestion)
    } else {
        Ok(q)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::prompt::{CONTEXTUALIZE_SYSTEM, PLAIN_PERSONA};
    use crate::testing::{Script, ScriptedChatModel};
    use rag_store::{
        ChunkStrategy, ChunkingConfig, Document, HashingEmbedder, IngestOptions, MemoryIndex,
    };

    pub(crate) async fn soil_store() -> RagStore {
        let store = RagStore::new(
            Arc::new(MemoryIndex::new("langchain_vector")),
            Arc::new(HashingEmbedder::new(256)),
            ChunkingConfig {
                strategy: ChunkStrategy::Recursive,
                size: 60,
                overlap: 0,
            },
            IngestOptions::default(),
        );
        let doc = Document::new(
            "History.txt",
            "the soil types are sand clay silt loam and peat\n\nclay soil holds water\n\nthe castle on the hill was built from grey stone blocks",
        );
        store.ingest_document(&doc).await.unwrap();
        store
    }

    fn chain(model: Arc<ScriptedChatModel>, store: RagStore) -> RagChain {
        let mut cfg = ContextorConfig::default();
        // Bag-of-words scores are lower than those of a real embedding model.
        cfg.search.score_threshold = 0.2;
        RagChain::new(model, store, cfg)
    }

    #[tokio::test]
    async fn first_question_is_answered_from_context() {
        let model = Arc::new(ScriptedChatModel::new([Script::reply("Sand, clay, silt, loam and peat.")]));
        let c = chain(model.clone(), soil_store().await);

        let qa = c.ask(&ChatHistory::new(), "what soil types are there").await.unwrap();
        assert_eq!(qa.answer, "Sand, clay, silt, loam and peat.");
        assert_eq!(qa.standalone_question, "what soil types are there");
        assert!(!qa.context.is_empty() && qa.context.len() <= 3);

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0][0].content.contains("the soil types are sand clay silt loam and peat"));
    }

    #[tokio::test]
    async fn follow_up_reformulates_then_answers() {
        let model = Arc::new(ScriptedChatModel::new([
            Script::reply("which clay soil holds water"),
            Script::reply("Clay soil holds water."),
        ]));
        let c = chain(model.clone(), soil_store().await);
        let history = ChatHistory::from_exchanges([("what soil types are there", "Sand, clay and loam.")]);

        let qa = c.ask(&history, "which of them holds water?").await.unwrap();
        assert_eq!(qa.standalone_question, "which clay soil holds water");
        assert_eq!(qa.context[0].text, "clay soil holds water");

        let calls = model.calls();
        assert_eq!(calls[0][0].content, CONTEXTUALIZE_SYSTEM);
        // The answer call sees the raw question and the prior exchange, never its own answer.
        assert_eq!(calls[1].len(), 4);
        assert_eq!(calls[1][3].content, "which of them holds water?");
    }

    #[tokio::test]
    async fn blank_question_is_rejected_without_calls() {
        let model = Arc::new(ScriptedChatModel::new([]));
        let c = chain(model.clone(), soil_store().await);
        assert!(matches!(
            c.ask(&ChatHistory::new(), "   ").await,
            Err(ContextorError::EmptyQuestion)
        ));
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn streaming_and_plain_modes() {
        let model = Arc::new(ScriptedChatModel::new([
            Script::tokens(["Clay ", "holds ", "water."]),
            Script::tokens(["Hi!"]),
        ]));
        let c = chain(model.clone(), soil_store().await);

        let s = c.ask_streaming(&ChatHistory::new(), "clay soil water").await.unwrap();
        assert_eq!(s.context[0].text, "clay soil holds water");
        assert_eq!(s.stream.collect_text().await.unwrap(), "Clay holds water.");

        let plain = c.chat_plain(&ChatHistory::new(), "hello").await.unwrap();
        assert_eq!(plain.collect_text().await.unwrap(), "Hi!");
        assert_eq!(model.calls()[1][0].content, PLAIN_PERSONA);
    }

    #[tokio::test]
    async fn one_shot_uses_not_sure_prompt() {
        let model = Arc::new(ScriptedChatModel::new([Script::reply("I'm not sure")]));
        let c = chain(model.clone(), soil_store().await);
        let qa = c.ask_once("who was the first king").await.unwrap();
        assert_eq!(qa.answer, "I'm not sure");
        assert!(model.calls()[0][1].content.contains("respond with 'I'm not sure'"));
    }

    #[derive(Default)]
    struct Recorder(std::sync::Mutex<Vec<Stage>>);

    impl Progress for Recorder {
        fn stage(&self, stage: Stage) {
            self.0.lock().unwrap().push(stage);
        }
    }

    #[tokio::test]
    async fn stages_are_reported_in_order() {
        let model = Arc::new(ScriptedChatModel::new([Script::reply("Loam."), Script::reply("Peat.")]));
        let c = chain(model, soil_store().await);

        let full = Recorder::default();
        c.ask_with_progress(&ChatHistory::new(), "what is loam", &full).await.unwrap();
        assert_eq!(
            *full.0.lock().unwrap(),
            [Stage::Reformulating, Stage::Retrieving, Stage::Generating]
        );

        let once = Recorder::default();
        c.ask_once_with_progress("what is peat", &once).await.unwrap();
        assert_eq!(*once.0.lock().unwrap(), [Stage::Retrieving, Stage::Generating]);
    }
}
