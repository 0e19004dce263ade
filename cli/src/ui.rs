//! Shared UI utilities for consistent terminal output.

use colored::Colorize;

/// Standard symbols used throughout the CLI for consistent visual language.
pub mod symbols {
    /// Arrow for action/progress indicators
    pub const ARROW: &str = "→";
    /// Checkmark for success
    pub const SUCCESS: &str = "✓";
    /// X mark for failure
    pub const FAILURE: &str = "✗";
    /// Warning/attention indicator
    pub const WARNING: &str = "!";
    /// Active/running indicator
    pub const ACTIVE: &str = "●";
    /// Inactive/stopped indicator
    pub const INACTIVE: &str = "○";
}

/// Print a step header with the action arrow.
pub fn print_step(message: &str) {
    println!("{} {}", symbols::ARROW.blue().bold(), message);
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", symbols::SUCCESS.green().bold(), message);
}

/// Print a failure message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", symbols::FAILURE.red().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    eprintln!("{} {}", symbols::WARNING.yellow().bold(), message);
}

/// Print a dimmed info line (indented).
pub fn print_info(message: &str) {
    println!("  {}", message.dimmed());
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(50).dimmed());
}

/// Left-aligned columns sized to the widest cell, header in bold.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header_line = format_row(headers.iter().map(|h| h.to_string()), &widths);
    println!("{}", header_line.bold());
    for row in rows {
        println!("{}", format_row(row.iter().cloned(), &widths));
    }
}

fn format_row(cells: impl Iterator<Item = String>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// `page 2 of 4 (37 total)`, 1-based for display.
pub fn page_footer(page: u32, page_count: u64, total: u64) -> String {
    format!("page {} of {} ({} total)", page + 1, page_count.max(1), total)
}

/// Status dot for the realtime connection.
pub fn connection_indicator(connected: bool) -> String {
    if connected {
        format!("{} connected", symbols::ACTIVE.green())
    } else {
        format!("{} offline", symbols::INACTIVE.dimmed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_row_pads_to_width() {
        let row = format_row(
            vec!["1".to_string(), "Acme".to_string(), "x".to_string()].into_iter(),
            &[3, 6, 1],
        );
        assert_eq!(row, "1    Acme    x");
    }

    #[test]
    fn test_page_footer_is_one_based() {
        assert_eq!(page_footer(0, 4, 37), "page 1 of 4 (37 total)");
        assert_eq!(page_footer(0, 0, 0), "page 1 of 1 (0 total)");
    }
}
