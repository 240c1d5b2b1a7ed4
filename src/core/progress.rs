//! Terminal renderers for transfer progress

use super::output;
use crate::transfer::{PhaseInfo, ProgressEvent, ProgressSink};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";
const TICK_INTERVAL_MS: u64 = 80;

const BAR_TEMPLATE: &str =
    "     {spinner:.cyan} {prefix} [{bar:30.cyan/dim}] {bytes}/{total_bytes} ({eta}) {msg}";
const SPINNER_TEMPLATE: &str = "     {spinner:.cyan} {prefix} {bytes} {msg}";
const FINISHED_TEMPLATE: &str = "     {prefix} {msg}";

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸━")
        .tick_chars(SPINNER_CHARS)
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_CHARS)
}

fn finished_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(FINISHED_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

struct BarState {
    bar: ProgressBar,
    phases: Vec<PhaseInfo>,
}

impl BarState {
    /// Bar position once every phase up to `phase` is done.
    fn offset_after(&self, phase: usize) -> u64 {
        self.phases.iter().take(phase + 1).map(|p| p.weight).sum()
    }

    fn next_label(&self, phase: usize) -> Option<&str> {
        self.phases
            .iter()
            .skip(phase + 1)
            .map(|p| p.label.as_str())
            .find(|label| !label.is_empty())
    }
}

/// One indicatif bar per transfer, all drawn to stderr.
pub struct BarProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, BarState>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    pub fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn declare(&self, subject: &str, phases: Vec<PhaseInfo>) -> BarState {
        let total: u64 = phases.iter().map(|p| p.weight).sum();
        let size_known = phases.get(1).is_some_and(|download| download.weight > 0);

        let bar = if size_known {
            let bar = ProgressBar::new(total);
            bar.set_style(bar_style());
            bar
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(spinner_style());
            bar
        };

        let bar = self.multi.add(bar);
        bar.set_prefix(subject.to_string());
        if let Some(first) = phases.first() {
            bar.set_message(first.label.clone());
        }
        bar.enable_steady_tick(Duration::from_millis(TICK_INTERVAL_MS));

        BarState { bar, phases }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn event(&self, subject: &str, event: ProgressEvent) {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);

        match event {
            ProgressEvent::Declared { phases } => {
                let state = self.declare(subject, phases);
                bars.insert(subject.to_string(), state);
            }
            ProgressEvent::Advanced { amount, .. } => {
                if let Some(state) = bars.get(subject) {
                    state.bar.inc(amount);
                }
            }
            ProgressEvent::PhaseCompleted { phase } => {
                if let Some(state) = bars.get(subject) {
                    if state.bar.length().is_some() {
                        state.bar.set_position(state.offset_after(phase));
                    }
                    if let Some(label) = state.next_label(phase) {
                        state.bar.set_message(label.to_string());
                    }
                }
            }
            ProgressEvent::Finished { status, summary } => {
                // Skipped transfers never declared a bar.
                let bar = match bars.remove(subject) {
                    Some(state) => state.bar,
                    None => {
                        let bar = self.multi.add(ProgressBar::new_spinner());
                        bar.set_prefix(subject.to_string());
                        bar
                    }
                };
                bar.set_style(finished_style());
                bar.set_prefix(format!("{} {}", status.marker(), subject));
                bar.finish_with_message(summary);
            }
        }
    }
}

/// Prints one status line per finished transfer; used with `--no-progress`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusLines;

impl ProgressSink for StatusLines {
    fn event(&self, subject: &str, event: ProgressEvent) {
        if let ProgressEvent::Finished { status, summary } = event {
            output::transfer_status(status, subject, &summary);
        }
    }
}
