//! Stage reporting for a chain turn: `NoopProgress` for servers,
//! `IndicatifProgress` for a console.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Steps of a single question, in order. One-shot questions skip
/// [`Stage::Reformulating`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Reformulating,
    Retrieving,
    Generating,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Reformulating => "rephrasing the question",
            Stage::Retrieving => "searching the document",
            Stage::Generating => "writing the answer",
        }
    }
}

/// Observer of chain stages.
pub trait Progress: Send + Sync {
    fn stage(&self, _stage: Stage) {}
    /// Called once after a successful answer with the number of chunks used.
    fn answered(&self, _context: usize) {}
}

#[derive(Default, Clone, Copy)]
pub struct NoopProgress;
impl Progress for NoopProgress {}

/// Console spinner with elapsed time; cleared on drop.
pub struct IndicatifProgress {
    pb: ProgressBar,
}

impl IndicatifProgress {
    pub fn spinner() -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} ({elapsed})") {
            pb.set_style(style.tick_chars("-\\|/ "));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        Self { pb }
    }
}

impl Progress for IndicatifProgress {
    fn stage(&self, stage: Stage) {
        self.pb.set_message(stage.label());
    }

    fn answered(&self, context: usize) {
        self.pb
            .finish_with_message(format!("answered from {context} chunk(s)"));
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        if !self.pb.is_finished() {
            self.pb.finish_and_clear();
        }
    }
}
