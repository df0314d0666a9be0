//! Named chat threads shared by all HTTP handlers.
//!
//! The store is an ordered mapping `name → thread` plus the current
//! selection. It is never empty: deleting the last thread reseeds
//! [`DEFAULT_CHAT`]. Each thread publishes a fresh [`ThreadSnapshot`] on a
//! `watch` channel after every change, which is what `/events` subscribers see.
//!
//! The inner mutex is only held for short, synchronous sections.

use std::sync::{Arc, Mutex, MutexGuard};

use contextor::ChatHistory;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info};

/// Thread present at start-up and after the last one is deleted.
pub const DEFAULT_CHAT: &str = "Intros";

/// One question and its (possibly still growing) answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaTurn {
    pub question: String,
    pub answer: String,
    /// Set when generation failed; `answer` keeps what arrived before.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read-only view of a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub name: String,
    pub turns: Vec<QaTurn>,
    pub processing: bool,
}

/// Thread titles and the current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatsView {
    pub current: String,
    pub titles: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("chat name must not be empty")]
    EmptyName,
    #[error("chat '{0}' already exists")]
    Duplicate(String),
    #[error("chat '{0}' not found")]
    NotFound(String),
    #[error("chat '{0}' is already answering a question")]
    Busy(String),
}

/// Handle to an accepted question; identifies the thread instance even if
/// a thread with the same name is deleted and recreated meanwhile.
#[derive(Debug, Clone)]
pub struct TurnTicket {
    pub thread: String,
    pub thread_id: u64,
    /// Position of the pending turn in the thread.
    pub turn: usize,
    pub question: String,
    /// Exchanges before this question.
    pub history: ChatHistory,
}

struct Thread {
    id: u64,
    name: String,
    turns: Vec<QaTurn>,
    processing: bool,
    task: Option<AbortHandle>,
    updates: watch::Sender<ThreadSnapshot>,
}

impl Thread {
    fn new(id: u64, name: String) -> Self {
        let (updates, _) = watch::channel(ThreadSnapshot {
            name: name.clone(),
            turns: Vec::new(),
            processing: false,
        });
        Self {
            id,
            name,
            turns: Vec::new(),
            processing: false,
            task: None,
            updates,
        }
    }

    fn snapshot(&self) -> ThreadSnapshot {
        ThreadSnapshot {
            name: self.name.clone(),
            turns: self.turns.clone(),
            processing: self.processing,
        }
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }
}

struct Inner {
    threads: Vec<Thread>,
    current: String,
    next_id: u64,
}

impl Inner {
    fn seed(&mut self, name: &str) {
        let id = self.next_id;
        self.next_id += 1;
        self.threads.push(Thread::new(id, name.to_string()));
    }

    fn get(&self, name: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Thread, StoreError> {
        self.threads
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn by_id(&mut self, id: u64) -> Option<&mut Thread> {
        self.threads.iter_mut().find(|t| t.id == id)
    }

    fn view(&self) -> ChatsView {
        ChatsView {
            current: self.current.clone(),
            titles: self.threads.iter().map(|t| t.name.clone()).collect(),
        }
    }
}

/// Shared chat store. Cloning shares the same threads.
#[derive(Clone)]
pub struct ChatStore {
    inner: Arc<Mutex<Inner>>,
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatStore {
    /// A store holding only the empty default thread.
    pub fn new() -> Self {
        let mut inner = Inner {
            threads: Vec::new(),
            current: DEFAULT_CHAT.to_string(),
            next_id: 0,
        };
        inner.seed(DEFAULT_CHAT);
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Critical sections never panic midway, so a poisoned lock is still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn view(&self) -> ChatsView {
        self.lock().view()
    }

    /// Creates an empty thread and selects it.
    pub fn create(&self, name: &str) -> Result<ChatsView, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        let mut inner = self.lock();
        if inner.get(name).is_some() {
            return Err(StoreError::Duplicate(name.to_string()));
        }
        inner.seed(name);
        inner.current = name.to_string();
        info!(chat = name, "chat created");
        Ok(inner.view())
    }

    /// Removes a thread, cancelling its in-flight generation.
    ///
    /// The current selection moves to the first remaining thread.
    pub fn delete(&self, name: &str) -> Result<ChatsView, StoreError> {
        let mut inner = self.lock();
        let pos = inner
            .threads
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        let mut removed = inner.threads.remove(pos);

        if inner.threads.is_empty() {
            inner.seed(DEFAULT_CHAT);
        }
        inner.current = inner.threads[0].name.clone();
        let view = inner.view();
        drop(inner);

        if let Some(task) = removed.task.take() {
            task.abort();
            debug!(chat = name, "in-flight generation cancelled");
        }
        info!(chat = name, current = %view.current, "chat deleted");
        Ok(view)
    }

    pub fn select(&self, name: &str) -> Result<ChatsView, StoreError> {
        let mut inner = self.lock();
        if inner.get(name).is_none() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        inner.current = name.to_string();
        Ok(inner.view())
    }

    pub fn snapshot(&self, name: &str) -> Result<ThreadSnapshot, StoreError> {
        self.lock()
            .get(name)
            .map(Thread::snapshot)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    /// Receiver that always holds the latest snapshot of `name`. It closes
    /// when the thread is deleted.
    pub fn subscribe(&self, name: &str) -> Result<watch::Receiver<ThreadSnapshot>, StoreError> {
        self.lock()
            .get(name)
            .map(|t| t.updates.subscribe())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    /// Accepts a question: appends a pending turn and raises `processing`.
    ///
    /// # Errors
    /// [`StoreError::Busy`] while a previous question is still being answered.
    pub fn begin_turn(&self, name: &str, question: &str) -> Result<TurnTicket, StoreError> {
        let mut inner = self.lock();
        let thread = inner.get_mut(name)?;
        if thread.processing {
            return Err(StoreError::Busy(name.to_string()));
        }
        let history = ChatHistory::from_exchanges(
            thread
                .turns
                .iter()
                .filter(|t| t.error.is_none())
                .map(|t| (t.question.clone(), t.answer.clone())),
        );
        thread.turns.push(QaTurn {
            question: question.to_string(),
            answer: String::new(),
            error: None,
        });
        thread.processing = true;
        thread.publish();
        Ok(TurnTicket {
            thread: thread.name.clone(),
            thread_id: thread.id,
            turn: thread.turns.len() - 1,
            question: question.to_string(),
            history,
        })
    }

    /// Remembers the generation task so deletion can cancel it.
    ///
    /// A thread deleted since [`ChatStore::begin_turn`] had no handle to
    /// cancel, so the task is aborted here instead. Returns whether it was
    /// attached.
    pub fn attach_task(&self, ticket: &TurnTicket, task: AbortHandle) -> bool {
        let mut task = Some(task);
        {
            let mut inner = self.lock();
            match inner.by_id(ticket.thread_id) {
                Some(thread) if thread.processing && thread.turns.len() == ticket.turn + 1 => {
                    thread.task = task.take();
                }
                // Thread gone or turn already finished.
                _ => {}
            }
        }
        match task {
            None => true,
            Some(task) => {
                task.abort();
                debug!(chat = %ticket.thread, "turn no longer pending, generation aborted");
                false
            }
        }
    }

    /// Appends an answer increment to the pending turn.
    pub fn append(&self, ticket: &TurnTicket, delta: &str) {
        self.update_pending(ticket, |turn| turn.answer.push_str(delta));
    }

    /// Records a failure on the pending turn; its partial answer is kept.
    pub fn fail(&self, ticket: &TurnTicket, error: &str) {
        self.update_pending(ticket, |turn| turn.error = Some(error.to_string()));
    }

    /// Lowers `processing`. Idempotent; a deleted thread is ignored.
    pub fn finish(&self, thread_id: u64) {
        let mut inner = self.lock();
        if let Some(thread) = inner.by_id(thread_id) {
            if thread.processing {
                thread.processing = false;
                thread.task = None;
                thread.publish();
            }
        }
    }

    fn update_pending(&self, ticket: &TurnTicket, f: impl FnOnce(&mut QaTurn)) {
        let mut inner = self.lock();
        let Some(thread) = inner.by_id(ticket.thread_id) else {
            return;
        };
        if let Some(turn) = thread.turns.get_mut(ticket.turn) {
            f(turn);
            thread.publish();
        }
    }
}

/// Clears `processing` when dropped, whether the generation finished,
/// failed or was aborted.
pub struct ProcessingGuard {
    store: ChatStore,
    thread_id: u64,
}

impl ProcessingGuard {
    pub fn new(store: ChatStore, ticket: &TurnTicket) -> Self {
        Self {
            store,
            thread_id: ticket.thread_id,
        }
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.store.finish(self.thread_id);
    }
}
