//! Terminal user interface components.
//!
//! Themed status lines, progress bars, prompt themes, and the end-of-run
//! summary. The organizing engine never calls into this module directly; the
//! command handlers translate engine events into what is drawn here.

use console::{Style, Term, style};
use dialoguer::theme::ColorfulTheme;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal};

use crate::executor::OrganizeSummary;
use crate::scan::ScanStats;

pub const BANNER: &str = r#"
     _          _
 ___| |__   ___| |_   _____
/ __| '_ \ / _ \ \ \ / / _ \
\__ \ | | |  __/ |\ V /  __/
|___/_| |_|\___|_| \_/ \___|
"#;

pub enum Mode {
    Scan,
    Organize,
}

impl Mode {
    pub fn as_str(&self) -> &str {
        match self {
            Mode::Scan => "SCAN",
            Mode::Organize => "ORGANIZE",
        }
    }
}

pub struct UI {
    pub term: Term,
    pub color_theme: String,
}

impl UI {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
            color_theme: "default".to_string(),
        }
    }

    pub fn with_color_theme(mut self, theme: String) -> Self {
        self.color_theme = theme;
        self
    }

    /// True when both stdin and stdout are attached to a terminal, so a
    /// prompt can be shown and answered.
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal() && io::stdout().is_terminal()
    }

    fn base_style(theme: &str) -> Style {
        match theme {
            "cyan" => Style::new().cyan(),
            "magenta" => Style::new().magenta(),
            "yellow" => Style::new().yellow(),
            "green" => Style::new().green(),
            "red" => Style::new().red(),
            "blue" => Style::new().blue(),
            _ => Style::new().white(),
        }
    }

    /// Returns (info_style, warning_style, error_style, success_style)
    pub fn get_static_status_styles(theme: &str) -> (Style, Style, Style, Style) {
        match theme {
            "cyan" => (
                Style::new().cyan(),
                Style::new().color256(51),
                Style::new().color256(87),
                Style::new().color256(123),
            ),
            "magenta" => (
                Style::new().magenta(),
                Style::new().color256(201),
                Style::new().color256(126),
                Style::new().color256(213),
            ),
            "yellow" => (
                Style::new().yellow(),
                Style::new().color256(226),
                Style::new().color256(178),
                Style::new().color256(227),
            ),
            "green" => (
                Style::new().green(),
                Style::new().color256(46),
                Style::new().color256(28),
                Style::new().color256(120),
            ),
            "red" => (
                Style::new().red(),
                Style::new().color256(196),
                Style::new().color256(124),
                Style::new().color256(210),
            ),
            "blue" => (
                Style::new().blue(),
                Style::new().color256(39),
                Style::new().color256(25),
                Style::new().color256(117),
            ),
            _ => (
                Style::new().white(),
                Style::new().color256(255),
                Style::new().color256(250),
                Style::new().color256(255),
            ),
        }
    }

    /// Get a ColorfulTheme for dialoguer prompts
    pub fn get_colorful_theme(theme: &str) -> ColorfulTheme {
        let base = Self::base_style(theme);
        match theme {
            "cyan" | "magenta" | "yellow" | "green" | "red" | "blue" | "white" => ColorfulTheme {
                values_style: base.clone(),
                active_item_style: base.clone().bold(),
                active_item_prefix: style("❯".to_string()).fg(color_of(theme)).bold(),
                ..ColorfulTheme::default()
            },
            _ => ColorfulTheme::default(),
        }
    }

    fn bar_colors(&self) -> (&str, &str) {
        match self.color_theme.as_str() {
            "cyan" => (".cyan", "bright_cyan/bright_cyan"),
            "magenta" => (".magenta", "bright_magenta/bright_magenta"),
            "yellow" => (".yellow", "bright_yellow/bright_yellow"),
            "green" => (".green", "bright_green/bright_green"),
            "red" => (".red", "bright_red/bright_red"),
            "blue" => (".blue", "bright_blue/bright_blue"),
            _ => (".white", "bright_white/bright_white"),
        }
    }

    pub fn print_banner_with_mode(&self, mode: &Mode) -> io::Result<()> {
        let style = Self::base_style(&self.color_theme);
        self.term.write_line(&style.apply_to(BANNER).to_string())?;
        self.term
            .write_line(&format!("  {}", style.apply_to(mode.as_str()).bold()))?;
        self.term.write_line("")?;
        Ok(())
    }

    pub fn create_spinner(&self, message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        let (spinner_color, _) = self.bar_colors();
        if let Ok(style) = ProgressStyle::default_spinner()
            .template(&format!("{{spinner:{}}} {{msg}}", spinner_color))
        {
            pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    /// create a progress bar with known total
    pub fn create_progress_bar(&self, total: u64, message: &str) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let (spinner_color, bar_color) = self.bar_colors();
        if let Ok(style) = ProgressStyle::default_bar().template(&format!(
            "{{spinner:{}}} {{bar:40.{}/{}}} {{pos}}/{{len}} ({{percent}}%) {{msg}}",
            spinner_color, bar_color, bar_color
        )) {
            pb.set_style(
                style
                    .progress_chars("█ ")
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
            );
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    fn status_line(&self, tag: &str, tag_style: &Style, message: &str) -> io::Result<()> {
        let white_bold = Style::new().white().bold();
        self.term.write_line(&format!(
            "{} {}",
            tag_style.apply_to(tag).bold(),
            white_bold.apply_to(message)
        ))
    }

    pub fn print_info(&self, message: &str) -> io::Result<()> {
        let (info, _, _, _) = Self::get_static_status_styles(&self.color_theme);
        self.status_line("[*]", &info, message)
    }

    pub fn print_warning(&self, message: &str) -> io::Result<()> {
        let (_, warning, _, _) = Self::get_static_status_styles(&self.color_theme);
        self.status_line("[!] WARNING:", &warning, message)
    }

    pub fn print_error(&self, message: &str) -> io::Result<()> {
        let (_, _, error, _) = Self::get_static_status_styles(&self.color_theme);
        self.status_line("[!] ERROR:", &error, message)
    }

    pub fn print_success(&self, message: &str) -> io::Result<()> {
        let (_, _, _, success) = Self::get_static_status_styles(&self.color_theme);
        self.status_line("[✓]", &success, message)
    }

    pub fn print_scan_summary(&self, stats: &ScanStats) -> io::Result<()> {
        self.print_success(&format!(
            "Recorded {} files ({}), {} hashed",
            stats.recorded,
            format_size(stats.total_size),
            stats.hashed
        ))?;
        if !stats.errors.is_empty() {
            self.print_warning(&format!(
                "{} entries skipped due to permission errors or I/O failures",
                stats.errors.len()
            ))?;
        }
        Ok(())
    }

    pub fn print_organize_summary(&self, summary: &OrganizeSummary) -> io::Result<()> {
        let rows = summary_rows(summary);
        let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        self.term.write_line("")?;
        for (label, value) in rows {
            self.term
                .write_line(&format!("  {:<width$}  {}", label, value, width = width))?;
        }
        self.term.write_line("")?;
        Ok(())
    }

    /// Cleanup the terminal (show cursor, etc.)
    pub fn cleanup(&self) -> io::Result<()> {
        self.term.show_cursor()
    }
}

impl Default for UI {
    fn default() -> Self {
        Self::new()
    }
}

fn color_of(theme: &str) -> console::Color {
    match theme {
        "cyan" => console::Color::Cyan,
        "magenta" => console::Color::Magenta,
        "yellow" => console::Color::Yellow,
        "green" => console::Color::Green,
        "red" => console::Color::Red,
        "blue" => console::Color::Blue,
        _ => console::Color::White,
    }
}

/// Label/value pairs shown after an organize run.
pub fn summary_rows(summary: &OrganizeSummary) -> Vec<(&'static str, String)> {
    vec![
        ("Eligible files", summary.total.to_string()),
        ("Organized", summary.processed.to_string()),
        ("Skipped", summary.skipped.to_string()),
        ("Duplicates", summary.duplicates.to_string()),
        ("Space saved", format_size(summary.bytes_saved)),
        ("No metadata", summary.missing_metadata.to_string()),
        ("Failed", summary.failed.to_string()),
    ]
}

// Helper function to format file sizes
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_summary_rows() {
        let summary = OrganizeSummary {
            total: 5,
            processed: 2,
            skipped: 1,
            duplicates: 1,
            bytes_saved: 2048,
            missing_metadata: 1,
            ..OrganizeSummary::default()
        };
        let rows = summary_rows(&summary);
        assert!(rows.contains(&("Organized", "2".to_string())));
        assert!(rows.contains(&("Space saved", "2.00 KB".to_string())));
        assert!(rows.contains(&("No metadata", "1".to_string())));
    }

    #[test]
    fn test_mode_as_str() {
        assert_eq!(Mode::Scan.as_str(), "SCAN");
        assert_eq!(Mode::Organize.as_str(), "ORGANIZE");
    }
}
