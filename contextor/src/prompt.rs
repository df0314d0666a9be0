//! Prompt builders: question contextualization, grounded QA and one-shot QA.

use ai_llm_service::ChatMessage;
use rag_store::RagHit;

use crate::history::ChatHistory;

/// System instruction for turning a follow-up into a standalone question.
pub const CONTEXTUALIZE_SYSTEM: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, \
formulate a standalone question which can be understood \
without the chat history. Do NOT answer the question, just \
reformulate it if needed and otherwise return it as is.";

/// Grounded QA instruction; `{context}` is replaced by the retrieved texts.
pub const QA_SYSTEM: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer \
the question. If you don't know the answer, say that you \
don't know. Use three sentences maximum and keep the \
answer concise.\n\n{context}";

/// Substituted for `{context}` when retrieval found nothing.
pub const NO_CONTEXT: &str = "(No relevant context was retrieved for this question.)";

/// System message of the one-shot query.
pub const ONE_SHOT_SYSTEM: &str = "You are a helpful assistant.";

/// Persona used by the plain (non-retrieval) chat mode.
pub const PLAIN_PERSONA: &str = "You are a friendly chatbot named Reflex. Respond in markdown.";

/// Retrieved texts separated by blank lines, or [`NO_CONTEXT`].
pub fn format_context(hits: &[RagHit]) -> String {
    if hits.is_empty() {
        return NO_CONTEXT.to_string();
    }
    hits.iter()
        .map(|h| h.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `[system, ...history, user(question)]` for the reformulation call.
pub fn contextualize_messages(history: &ChatHistory, question: &str) -> Vec<ChatMessage> {
    with_history(CONTEXTUALIZE_SYSTEM.to_string(), history, question)
}

/// `[system(QA + context), ...history, user(question)]` for answer generation.
pub fn qa_messages(hits: &[RagHit], history: &ChatHistory, question: &str) -> Vec<ChatMessage> {
    let system = QA_SYSTEM.replace("{context}", &format_context(hits));
    with_history(system, history, question)
}

/// Single-turn prompt that embeds the documents in the user message and asks
/// for "I'm not sure" when they do not contain the answer.
pub fn one_shot_messages(hits: &[RagHit], question: &str) -> Vec<ChatMessage> {
    let docs = hits
        .iter()
        .map(|h| h.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");
    let user = format!(
        "Here are some documents that might help answer the question:{question}\
         \n\n Relevant Documents:\n{docs}\
         \n\nPlease provide an answer based only on the provided documents. \
         If the answer is not found in the documents, respond with 'I'm not sure'."
    );
    vec![ChatMessage::system(ONE_SHOT_SYSTEM), ChatMessage::user(user)]
}

/// Persona chat without retrieval: `[system(persona), ...history, user]`.
pub fn plain_messages(history: &ChatHistory, question: &str) -> Vec<ChatMessage> {
    with_history(PLAIN_PERSONA.to_string(), history, question)
}

fn with_history(system: String, history: &ChatHistory, question: &str) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(history.len() + 2);
    out.push(ChatMessage::system(system));
    out.extend(history.to_messages());
    out.push(ChatMessage::user(question));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_llm_service::ChatRole;

    fn hit(text: &str) -> RagHit {
        RagHit {
            score: 0.8,
            text: text.into(),
            source: Some("History.txt".into()),
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn qa_prompt_orders_system_history_question() {
        let history = ChatHistory::from_exchanges([("What is loam?", "A balanced soil.")]);
        let msgs = qa_messages(&[hit("Loam mixes sand."), hit("Clay holds water.")], &history, "And clay?");

        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0].role, ChatRole::System);
        assert!(msgs[0].content.ends_with("Loam mixes sand.\n\nClay holds water."));
        assert!(msgs[0].content.contains("three sentences maximum"));
        assert!(!msgs[0].content.contains("{context}"));
        assert_eq!(msgs[1].content, "What is loam?");
        assert_eq!(msgs[3].role, ChatRole::User);
        assert_eq!(msgs[3].content, "And clay?");
    }

    #[test]
    fn empty_retrieval_uses_marker() {
        let msgs = qa_messages(&[], &ChatHistory::new(), "Who won in 1066?");
        assert!(msgs[0].content.ends_with(NO_CONTEXT));
        assert_eq!(msgs.len(), 2);
    }

    #[test]
    fn contextualize_never_answers() {
        let msgs = contextualize_messages(&ChatHistory::new(), "What soil types exist?");
        assert!(msgs[0].content.contains("Do NOT answer the question"));
        assert_eq!(msgs[1].content, "What soil types exist?");
    }

    #[test]
    fn one_shot_mentions_fallback() {
        let msgs = one_shot_messages(&[hit("Sandy soil drains.")], "What are the different types of soil?");
        assert_eq!(msgs[0].content, ONE_SHOT_SYSTEM);
        assert!(msgs[1].content.contains("Sandy soil drains."));
        assert!(msgs[1].content.contains("I'm not sure"));
    }
}
