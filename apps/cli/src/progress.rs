//! Terminal progress for curation runs.

use std::time::Duration;

use curator_shared::PipelineState;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio::task::JoinHandle;

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Spinner whose message tracks a topic's pipeline state.
pub(crate) struct RunSpinner {
    bar: ProgressBar,
    follower: Option<JoinHandle<()>>,
}

impl RunSpinner {
    pub(crate) fn follow(mut rx: watch::Receiver<PipelineState>) -> Self {
        let bar = spinner();
        let follower = {
            let bar = bar.clone();
            tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let message = rx.borrow_and_update().message.clone();
                    if !message.is_empty() {
                        bar.set_message(message);
                    }
                }
            })
        };
        Self {
            bar,
            follower: Some(follower),
        }
    }

    /// Spinner with a fixed message (multi-topic runs).
    pub(crate) fn fixed(message: impl Into<String>) -> Self {
        let bar = spinner();
        bar.set_message(message.into());
        Self {
            bar,
            follower: None,
        }
    }

    pub(crate) fn finish(self) {
        if let Some(follower) = self.follower {
            follower.abort();
        }
        self.bar.finish_and_clear();
    }
}
