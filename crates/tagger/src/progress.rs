use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use library::ProgressObserver;

pub struct SpinnerObserver {
    bar: ProgressBar,
}

impl SpinnerObserver {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl ProgressObserver for SpinnerObserver {
    fn advanced(&self, completed: usize) {
        self.bar.set_position(completed as u64);
    }
}

pub fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {pos} files processed")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
