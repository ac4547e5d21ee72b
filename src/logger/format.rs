//! Log formatting and output with ANSI colors and text wrapping
//!
//! Console lines look like `HH:MM:SS [TAG] [LEVEL] message`; file lines carry
//! the full date and no color codes.

use super::config::get_logger_config;
use super::file::write_to_file;
use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

const TAG_WIDTH: usize = 9;
const LEVEL_WIDTH: usize = 7;

/// Maximum line length before wrapping
const MAX_LINE_LENGTH: usize = 145;

pub fn format_and_log(tag: LogTag, level: LogLevel, message: &str) {
    let config = get_logger_config();
    let now = Local::now();

    let prefix = now.format("%H:%M:%S").to_string();
    let base_line = format!(
        "{} [{}] [{}] ",
        prefix.dimmed(),
        format_tag(&tag),
        format_level(level)
    );
    let prefix_width = prefix.len() + TAG_WIDTH + LEVEL_WIDTH + 7;
    let available = MAX_LINE_LENGTH.saturating_sub(prefix_width).max(50);
    let chunks = wrap_text(message, available);

    if config.console_output {
        print_stdout_safe(&format!("{}{}", base_line, chunks[0]));
        let continuation = " ".repeat(prefix_width);
        for chunk in &chunks[1..] {
            print_stdout_safe(&format!("{}{}", continuation, chunk));
        }
    }

    if config.file_output {
        let timestamp = now.format("%Y-%m-%d %H:%M:%S");
        for chunk in &chunks {
            write_to_file(&format!(
                "{} [{}] [{}] {}",
                timestamp,
                tag.to_plain_string(),
                level.as_str(),
                chunk
            ));
        }
    }
}

fn format_tag(tag: &LogTag) -> ColoredString {
    let label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Config => label.bright_white().bold(),
        LogTag::Api => label.bright_purple().bold(),
        LogTag::Ohlcv => label.bright_green().bold(),
        LogTag::Planner => label.bright_blue().bold(),
        LogTag::Accumulator => label.bright_cyan().bold(),
        LogTag::Backfill => label.bright_magenta().bold(),
        LogTag::Refresh => label.bright_cyan().bold(),
        LogTag::Validator => label.bright_red().bold(),
        LogTag::Database => label.bright_blue().bold(),
        LogTag::Prices => label.bright_green().bold(),
    }
}

fn format_level(level: LogLevel) -> ColoredString {
    let label = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => label.bright_red().bold(),
        LogLevel::Warning => label.bright_yellow().bold(),
        LogLevel::Info => label.white().bold(),
        LogLevel::Debug => label.dimmed(),
        LogLevel::Verbose => label.dimmed(),
    }
}

/// Print to stdout but ignore broken pipe errors
fn print_stdout_safe(message: &str) {
    let mut out = stdout().lock();
    if let Err(e) = writeln!(out, "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        let _ = writeln!(std::io::stderr(), "Logger stdout error: {}", e);
    }
    let _ = out.flush();
}

/// Wrap text at word boundaries, respecting existing newlines.
/// Words longer than the width are split by characters.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();

    for line in text.split('\n') {
        if line.chars().count() <= max_width {
            result.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        for word in line.split_whitespace() {
            let word_len = word.chars().count();
            let current_len = current.chars().count();

            if word_len > max_width {
                if !current.is_empty() {
                    result.push(std::mem::take(&mut current));
                }
                let chars: Vec<char> = word.chars().collect();
                for chunk in chars.chunks(max_width) {
                    result.push(chunk.iter().collect());
                }
            } else if current.is_empty() {
                current = word.to_string();
            } else if current_len + word_len + 1 <= max_width {
                current.push(' ');
                current.push_str(word);
            } else {
                result.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }

    if result.is_empty() {
        result.push(String::new());
    }
    result
}
