//! Terminal progress bars.

use std::collections::HashMap;

use cryo_core::runner::{ProgressSink, TaskId, WorkerId};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;

const BAR_TEMPLATE: &str = "{msg:<28} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})";
const WORKER_TEMPLATE: &str = "  {spinner:.green} {msg}";

/// One bar per task plus one spinner per busy worker.
pub struct TerminalProgress {
    multi: MultiProgress,
    bars: Mutex<Vec<ProgressBar>>,
    workers: Mutex<HashMap<(TaskId, WorkerId), ProgressBar>>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::stderr()),
            bars: Mutex::new(Vec::new()),
            workers: Mutex::new(HashMap::new()),
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏ ")
    }

    fn worker_style() -> ProgressStyle {
        ProgressStyle::with_template(WORKER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bar(&self, task: TaskId) -> Option<ProgressBar> {
        self.bars.lock().get(task).cloned()
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn register(&self, label: &str, total: usize) -> TaskId {
        let bar = self.multi.add(ProgressBar::new(total as u64));
        bar.set_style(Self::bar_style());
        bar.set_message(label.to_string());

        let mut bars = self.bars.lock();
        bars.push(bar);
        bars.len() - 1
    }

    fn advance(&self, task: TaskId) {
        if let Some(bar) = self.bar(task) {
            bar.inc(1);
        }
    }

    fn worker_started(&self, task: TaskId, worker: WorkerId, item: &str) {
        let spinner = self.multi.add(ProgressBar::new_spinner());
        spinner.set_style(Self::worker_style());
        spinner.set_message(format!("{worker}: {item}"));
        spinner.enable_steady_tick(std::time::Duration::from_millis(120));
        self.workers.lock().insert((task, worker), spinner);
    }

    fn worker_finished(&self, task: TaskId, worker: WorkerId) {
        if let Some(spinner) = self.workers.lock().remove(&(task, worker)) {
            spinner.finish_and_clear();
            self.multi.remove(&spinner);
        }
    }

    fn finish(&self, task: TaskId) {
        if let Some(bar) = self.bar(task) {
            bar.finish();
        }
    }
}
