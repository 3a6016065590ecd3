use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use zstack_core::progress::{FusionStage, ProgressReporter};

/// Drives one terminal progress bar from fusion stage events.
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub fn new() -> Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:24} [{bar:40}] {pos}/{len}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("Done");
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: FusionStage, total_items: Option<usize>) {
        self.bar.set_message(stage.to_string());
        self.bar.set_length(total_items.unwrap_or(0) as u64);
        self.bar.set_position(0);
    }

    fn advance(&self, items_done: usize) {
        if items_done as u64 > self.bar.length().unwrap_or(0) {
            self.bar.set_length(items_done as u64);
        }
        self.bar.set_position(items_done as u64);
    }

    fn warning(&self, message: &str) {
        self.bar.println(format!("warning: {message}"));
    }
}
