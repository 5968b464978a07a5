//! Progress bars for the build and merge phases.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Create a styled progress bar counting `unit`s, e.g. shards or queries.
///
/// The bar is hidden when `visible` is false, so callers can pass the
/// result straight into the pipeline without branching.
pub fn create_progress_bar(total: u64, message: &str, unit: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
    let style = ProgressStyle::default_bar()
        .template(&bar_template(unit))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn bar_template(unit: &str) -> String {
    format!(
        "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit} {{msg}}"
    )
}

/// Create a spinner for indeterminate work such as loading a model.
pub fn create_spinner(message: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Runs `operation` behind a temporary spinner.
pub fn with_spinner<F, T>(message: &str, visible: bool, operation: F) -> T
where
    F: FnOnce() -> T,
{
    let spinner = create_spinner(message, visible);
    let result = operation();
    spinner.finish_and_clear();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bars() {
        let pb = create_progress_bar(10, "building", "shards", false);
        assert!(pb.is_hidden());
        pb.inc(3);
        assert_eq!(pb.position(), 3);

        let value = with_spinner("loading", false, || 42);
        assert_eq!(value, 42);
    }

    #[test]
    fn test_bar_template_names_unit() {
        let template = bar_template("queries");
        assert!(template.contains("{pos}/{len} queries {msg}"));
        assert!(!template.contains("shards"));
        assert!(ProgressStyle::default_bar().template(&template).is_ok());
    }
}
