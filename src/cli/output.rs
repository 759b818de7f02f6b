//! CLI output formatting utilities.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print one progress line relayed from a pipeline run.
    pub fn relay_line(line: &str) {
        let line = line.trim_end();
        let trimmed = line.trim_start();
        if trimmed.starts_with("[QUOTA_ALERT]") {
            eprintln!("{}", style(line).yellow());
        } else if trimmed.starts_with("[QUOTA_SAFETY]") || trimmed.starts_with("[TOOL]") {
            println!("{}", style(line).dim());
        } else if trimmed.starts_with("[AGENT]") || trimmed.starts_with("[SESSION]") {
            println!("{}", style(line).cyan());
        } else if trimmed.starts_with("Error during mission:") {
            eprintln!("{}", style(line).red().bold());
        } else {
            println!("{}", line);
        }
    }

    /// Print an agent output heading with a preview of the text.
    pub fn record(agent: &str, task: &str, timestamp: &str, content: &str) {
        println!(
            "\n{} {} / {} {}",
            style(">>").green(),
            style(agent).bold(),
            task,
            style(timestamp).dim()
        );
        println!("   {}", content_preview(content, 200));
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Truncate content with ellipsis.
pub fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        format!("{}...", content.chars().take(max_chars).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_preview() {
        assert_eq!(content_preview("short\ntext", 20), "short text");
        assert_eq!(content_preview("ééééé", 3), "ééé...");
    }
}
