//! Progress display module
//!
//! Console helpers, the row spinner, and the end-of-run counters.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// Rows between progress updates
pub const PROGRESS_INTERVAL: u64 = 10_000;

/// Print the application banner
pub fn print_banner() {
    let banner = r#"
╔══════════════════════════════════════════════════════════╗
║   ___ _____   __  ___ ___ _  _____ ___ ___               ║
║  / __/ __\ \ / / | __|_ _| ||_   _| __| _ \              ║
║ | (__\__ \\ V /  | _| | || |__| | | _||   /              ║
║  \___|___/ \_/   |_| |___|____|_| |___|_|_\              ║
║                                                          ║
║        Row & column filtering for delimited text         ║
╚══════════════════════════════════════════════════════════╝
"#;

    println!("{}", banner.green());
}

/// Print a section header
pub fn print_header(text: &str) {
    println!("\n{} {}", "▶".green(), text.green().bold());
}

/// Print an info message
pub fn print_info(text: &str) {
    println!("  {} {}", "ℹ".cyan(), text);
}

/// Print a success message
pub fn print_success(text: &str) {
    println!("  {} {}", "✔".green(), text.green());
}

/// Print a warning message
pub fn print_warning(text: &str) {
    println!("  {} {}", "⚠".yellow(), text.yellow());
}

/// Print an error message
pub fn print_error(text: &str) {
    eprintln!("  {} {}", "✖".red(), text.red());
}

/// Create a styled spinner counting rows
pub fn create_row_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();

    if let Ok(style) = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] Read {pos} lines {msg}")
    {
        pb.set_style(style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
    }

    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));

    pb
}

/// Counters for one filtering run
#[derive(Debug, Clone)]
pub struct RunCounters {
    /// Data rows read (header excluded)
    pub rows_total: u64,
    /// Data rows written
    pub rows_matched: u64,
    /// Width of the input header
    pub columns_total: u64,
    /// Width of the output header
    pub columns_matched: u64,
    /// Cells skipped because a row was too short
    pub short_cells: u64,
    pub start_time: Instant,
}

impl RunCounters {
    pub fn new(columns_total: usize, columns_matched: usize) -> Self {
        Self {
            rows_total: 0,
            rows_matched: 0,
            columns_total: columns_total as u64,
            columns_matched: columns_matched as u64,
            short_cells: 0,
            start_time: Instant::now(),
        }
    }

    pub fn add_row(&mut self) {
        self.rows_total += 1;
    }

    pub fn add_match(&mut self) {
        self.rows_matched += 1;
    }

    pub fn rows_unmatched(&self) -> u64 {
        self.rows_total - self.rows_matched
    }

    pub fn columns_unmatched(&self) -> u64 {
        self.columns_total - self.columns_matched
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn lines_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.rows_total as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Summary lines; columns for a column cut, rows otherwise
    pub fn summary_lines(&self, column_only: bool) -> Vec<(&'static str, u64)> {
        if column_only {
            vec![
                ("total columns", self.columns_total),
                ("unmatching columns", self.columns_unmatched()),
                ("columns after filtering", self.columns_matched),
            ]
        } else {
            vec![
                ("total lines", self.rows_total),
                ("unmatching lines", self.rows_unmatched()),
                ("lines after filtering", self.rows_matched),
            ]
        }
    }

    /// Print final statistics
    pub fn print_summary(&self, column_only: bool) {
        println!();
        println!("{}", "═".repeat(60).green());
        println!("{}", "                    FILTERING COMPLETE".green().bold());
        println!("{}", "═".repeat(60).green());
        println!();

        for (label, value) in self.summary_lines(column_only) {
            println!(
                "  {} {}",
                format!("{:<24}", format!("{}:", capitalize(label))).green(),
                format_number(value)
            );
        }

        println!();
        println!("  {} {}", format!("{:<24}", "Duration:").green(), format_duration(self.elapsed()));
        println!(
            "  {} {:.2} lines/sec",
            format!("{:<24}", "Throughput:").green(),
            self.lines_per_second()
        );
        println!();
        println!("{}", "═".repeat(60).green());
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Format a number with thousand separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let chars: Vec<char> = s.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }

    result
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    }
}
