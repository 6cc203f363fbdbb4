//! Terminal output — spinner and colored run summary.
//!
//! Uses `indicatif` for the progress spinner and `console` for color
//! styling. [`StepProgress`] visually tracks a step run in the terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::engine::{StepExecution, StepStatus};

/// Visual progress indicator for a step run in the terminal.
///
/// Shows an animated spinner while the step runs and colored messages for
/// success (green), failure (red) and skips/retries (yellow).
pub struct StepProgress {
    // indicatif spinner.
    pb: ProgressBar,
    // Green style for success messages.
    green: Style,
    // Red style for failure messages.
    red: Style,
    // Yellow style for skip and retry messages.
    yellow: Style,
}

impl StepProgress {
    /// Starts the spinner with the step description.
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("READING: {description}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finishes the spinner and prints the terminal outcome with counters.
    pub fn complete<I>(&self, execution: &StepExecution<I>) {
        self.pb.finish_and_clear();
        match execution.status {
            StepStatus::Completed => {
                println!(
                    "  {} Step completed: {} committed, {} skipped ({} ms)",
                    self.green.apply_to("✓"),
                    execution.committed.len(),
                    execution.skip_count,
                    execution.duration_ms,
                );
            }
            StepStatus::Failed => {
                let reason = execution
                    .last_fault
                    .as_ref()
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "unknown failure".to_string());
                println!(
                    "  {} Step failed: {reason} ({} committed before failure)",
                    self.red.apply_to("✗"),
                    execution.committed.len(),
                );
            }
        }
        if execution.skip_count > 0 {
            println!(
                "  {} {} item(s) excluded from commit",
                self.yellow.apply_to("↷"),
                execution.skip_count,
            );
        }
    }

    /// Prints the full execution record as pretty JSON with a colored header.
    pub fn print_execution<I: serde::Serialize>(&self, execution: &StepExecution<I>) {
        let status_style = match execution.status {
            StepStatus::Completed => &self.green,
            StepStatus::Failed => &self.red,
        };
        println!();
        println!("{}", status_style.apply_to("─── Step Execution ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(execution).unwrap_or_default()
        );
    }
}
