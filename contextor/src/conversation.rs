//! Interactive conversation loop over a line-based input.
//!
//! Each non-blank line other than `exit` runs one turn:
//! `Reformulating → Retrieving → Generating → AnsweredAppended → AwaitingInput`.
//! A failing turn is reported on the output and leaves the history untouched.

use ai_llm_service::StreamEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::chain::RagChain;
use crate::error::ContextorError;
use crate::history::ChatHistory;

pub const PROMPT: &str = "you: ";
pub const ANSWER_PREFIX: &str = "RAG response: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingInput,
    Reformulating,
    Retrieving,
    Generating,
    AnsweredAppended,
    Terminated,
}

/// Result of feeding one line to the loop.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Blank line, nothing happened.
    Ignored,
    Answered(String),
    /// The turn failed; the session continues.
    Failed(ContextorError),
    Exit,
}

/// `true` for the exit signal (`exit`, any case, surrounding whitespace ignored).
pub fn is_exit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("exit")
}

/// One interactive session. Owns its history for its whole lifetime.
pub struct ConversationLoop {
    chain: RagChain,
    history: ChatHistory,
    state: LoopState,
    /// States visited by the latest turn, in order.
    trail: Vec<LoopState>,
    streaming: bool,
}

impl ConversationLoop {
    pub fn new(chain: RagChain) -> Self {
        Self {
            chain,
            history: ChatHistory::new(),
            state: LoopState::AwaitingInput,
            trail: Vec::new(),
            streaming: true,
        }
    }

    /// Print answers token by token (default) or all at once.
    pub fn streaming(mut self, on: bool) -> Self {
        self.streaming = on;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn last_trail(&self) -> &[LoopState] {
        &self.trail
    }

    fn enter(&mut self, next: LoopState) {
        debug!(from = ?self.state, to = ?next, "conversation state");
        self.state = next;
        self.trail.push(next);
    }

    /// Runs until `exit` or end of input.
    ///
    /// # Errors
    /// Only I/O errors on `input`/`output` end the session with an error.
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> Result<(), ContextorError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("starting continual chat");
        output
            .write_all(b"Starting continual chat...\nType 'exit' to end the chat.\n")
            .await?;

        let mut lines = input.lines();
        loop {
            output.write_all(PROMPT.as_bytes()).await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                output.write_all(b"\n").await?;
                self.enter(LoopState::Terminated);
                break;
            };

            match self.turn(&line, &mut output).await? {
                TurnOutcome::Exit => break,
                TurnOutcome::Failed(e) => {
                    warn!(error = %e, kind = ?e.kind(), "turn failed");
                    output.write_all(format!("error: {e}\n").as_bytes()).await?;
                }
                TurnOutcome::Ignored | TurnOutcome::Answered(_) => {}
            }
        }
        output.flush().await?;
        info!(turns = self.history.len(), "chat ended");
        Ok(())
    }

    /// Handles one line without console output.
    pub async fn handle_line(&mut self, line: &str) -> TurnOutcome {
        match self.turn(line, &mut tokio::io::sink()).await {
            Ok(outcome) => outcome,
            Err(e) => TurnOutcome::Failed(e),
        }
    }

    /// Outer `Err` is reserved for output I/O failures.
    async fn turn<W>(&mut self, line: &str, out: &mut W) -> Result<TurnOutcome, ContextorError>
    where
        W: AsyncWrite + Unpin,
    {
        self.trail.clear();
        if self.state == LoopState::Terminated {
            return Ok(TurnOutcome::Exit);
        }
        if is_exit(line) {
            self.enter(LoopState::Terminated);
            return Ok(TurnOutcome::Exit);
        }
        let question = line.trim();
        if question.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }

        match self.answer(question, out).await {
            Ok(answer) => {
                self.history.push_exchange(question, answer.clone());
                self.enter(LoopState::AnsweredAppended);
                self.enter(LoopState::AwaitingInput);
                Ok(TurnOutcome::Answered(answer))
            }
            Err(ContextorError::Io(e)) => {
                self.enter(LoopState::AwaitingInput);
                Err(ContextorError::Io(e))
            }
            Err(e) => {
                if e.partial_answer().is_some() {
                    out.write_all(b"\n").await?;
                }
                self.enter(LoopState::AwaitingInput);
                Ok(TurnOutcome::Failed(e))
            }
        }
    }

    async fn answer<W>(&mut self, question: &str, out: &mut W) -> Result<String, ContextorError>
    where
        W: AsyncWrite + Unpin,
    {
        self.enter(LoopState::Reformulating);
        let standalone = self.chain.reformulator.reformulate(&self.history, question).await?;

        self.enter(LoopState::Retrieving);
        let hits = self.chain.retriever.retrieve(&standalone).await?;

        self.enter(LoopState::Generating);
        if !self.streaming {
            let answer = self.chain.generator.answer(question, &hits, &self.history).await?;
            out.write_all(format!("{ANSWER_PREFIX}{answer}\n").as_bytes()).await?;
            return Ok(answer);
        }

        let mut stream = self
            .chain
            .generator
            .answer_stream(question, &hits, &self.history)
            .await?;
        out.write_all(ANSWER_PREFIX.as_bytes()).await?;
        let mut answer = String::new();
        while let Some(event) = stream.next_event().await {
            match event {
                StreamEvent::Delta(text) => {
                    if text.is_empty() {
                        continue;
                    }
                    out.write_all(text.as_bytes()).await?;
                    out.flush().await?;
                    answer.push_str(&text);
                }
                StreamEvent::Done => break,
                StreamEvent::Failed(source) => {
                    return Err(ContextorError::StreamInterrupted {
                        partial: answer,
                        source,
                    });
                }
            }
        }
        out.write_all(b"\n").await?;
        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cfg::ContextorConfig;
    use crate::chain::tests::soil_store;
    use crate::error::FailureKind;
    use crate::testing::{Script, ScriptedChatModel};

    async fn session(scripts: Vec<Script>) -> (ConversationLoop, Arc<ScriptedChatModel>) {
        let model = Arc::new(ScriptedChatModel::new(scripts));
        let chain = RagChain::new(model.clone(), soil_store().await, ContextorConfig::default());
        (ConversationLoop::new(chain), model)
    }

    #[test]
    fn exit_signal_is_case_insensitive() {
        assert!(is_exit("exit"));
        assert!(is_exit("  EXIT \n"));
        assert!(is_exit("Exit"));
        assert!(!is_exit("exit now"));
        assert!(!is_exit("quit"));
    }

    #[tokio::test]
    async fn one_question_then_exit() {
        let (mut chat, model) = session(vec![Script::tokens(["Sand, ", "clay ", "and loam."])]).await;
        let input: &[u8] = b"What soil types exist?\nexit\nnever read\n";
        let mut output = Vec::new();

        chat.run(input, &mut output).await.unwrap();

        assert_eq!(chat.state(), LoopState::Terminated);
        assert_eq!(model.calls().len(), 1);
        let turns = chat.history().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "What soil types exist?");
        assert_eq!(turns[1].content, "Sand, clay and loam.");

        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("you: "));
        assert!(printed.contains("RAG response: Sand, clay and loam.\n"));
    }

    #[tokio::test]
    async fn turn_walks_every_state() {
        let (mut chat, _) = session(vec![Script::reply("Clay.")]).await;
        let outcome = chat.handle_line("Which soil holds water?").await;
        assert!(matches!(outcome, TurnOutcome::Answered(ref a) if a == "Clay."));
        assert_eq!(
            chat.last_trail(),
            &[
                LoopState::Reformulating,
                LoopState::Retrieving,
                LoopState::Generating,
                LoopState::AnsweredAppended,
                LoopState::AwaitingInput,
            ]
        );
        assert!(matches!(chat.handle_line("EXIT").await, TurnOutcome::Exit));
        assert_eq!(chat.state(), LoopState::Terminated);
    }

    #[tokio::test]
    async fn blank_lines_are_ignored() {
        let (mut chat, model) = session(vec![]).await;
        assert!(matches!(chat.handle_line("   ").await, TurnOutcome::Ignored));
        assert_eq!(chat.state(), LoopState::AwaitingInput);
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn failure_is_reported_and_session_continues() {
        let (mut chat, _) = session(vec![
            Script::Fail("503 Service Unavailable".into()),
            Script::reply("Loam."),
        ])
        .await;
        let input: &[u8] = b"What is loam?\nWhat is loam?\nexit\n";
        let mut output = Vec::new();
        chat.run(input, &mut output).await.unwrap();

        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("error: "));
        assert!(printed.contains("RAG response: Loam."));
        assert_eq!(chat.history().len(), 2);
    }

    #[tokio::test]
    async fn interrupted_stream_keeps_history_clean() {
        let (mut chat, _) = session(vec![Script::BreakAfter(vec!["Clay ".into(), "holds".into()])]).await;
        match chat.handle_line("Which soil holds water?").await {
            TurnOutcome::Failed(e) => {
                assert_eq!(e.kind(), FailureKind::StreamInterrupted);
                assert_eq!(e.partial_answer(), Some("Clay holds"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(chat.history().is_empty());
        assert_eq!(chat.state(), LoopState::AwaitingInput);
    }

    #[tokio::test]
    async fn second_turn_reformulates_with_history() {
        let (mut chat, model) = session(vec![
            Script::reply("Sand, clay and loam."),
            Script::reply("Which soil type holds water?"),
            Script::reply("Clay."),
        ])
        .await;
        chat.handle_line("What soil types exist?").await;
        chat.handle_line("Which holds water?").await;

        let calls = model.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].len(), 4);
        assert_eq!(chat.history().len(), 4);
    }
}
