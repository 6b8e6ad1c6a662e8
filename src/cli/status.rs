use std::io::{self, Write};

use crate::audio::sink::SinkProvider;
use crate::error::{ErrorSeverity, NarrationError, OutputSinkError, StoryError};
use crate::models::NarrationSnapshot;
use crate::reader::StoryReader;
use crate::story::StoryPage;

const BOX_WIDTH: usize = 55;

/// Status display formatter for the reader
pub struct StatusDisplay;

impl StatusDisplay {
    /// Show a page the way the book lays it out
    pub fn display_page<P: SinkProvider>(reader: &StoryReader<P>) {
        let story = reader.story();
        let Some(page) = reader.page() else {
            return;
        };

        println!("┌─ {} ", Self::truncate(&story.story_title, BOX_WIDTH - 4));
        println!(
            "│ Page {} of {}  ·  narrated by {}",
            reader.current_page() + 1,
            reader.page_count(),
            page.voice().voice_name()
        );
        println!("│");
        for line in Self::page_lines(page) {
            println!("│ {}", line);
        }

        if reader.is_first_page() && !story.tricky_words.is_empty() {
            println!("│");
            println!("│ New Adventure Words: {}", story.tricky_words.join(", "));
        }

        println!("│");
        println!("│ {}", Self::status_line(&reader.snapshot(), reader.is_narration_available()));
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display the reader's page and narration state in detail
    pub fn display_full_status<P: SinkProvider>(reader: &StoryReader<P>) {
        let snapshot = reader.snapshot();
        let available = reader.is_narration_available();

        println!("┌─ Narration Status ──────────────────────────────────────┐");
        println!(
            "│ Story: {}",
            Self::truncate(&reader.story().story_title, BOX_WIDTH - 7)
        );
        println!(
            "│ Page: {} of {} ({} narrated)",
            reader.current_page() + 1,
            reader.page_count(),
            reader.story().narrated_pages()
        );
        println!("│ State: {}", snapshot.state);
        if let Some(page) = snapshot.narrated_page {
            println!("│ Buffered: page {}", page + 1);
        }
        println!("│");
        println!(
            "│ {} / {}",
            Self::format_time(snapshot.playhead),
            Self::format_time(snapshot.duration)
        );
        println!(
            "│ [{}] {:.1}%",
            Self::progress_bar(snapshot.progress(), 40),
            snapshot.progress() * 100.0
        );
        println!("│ {}", Self::narration_label(&snapshot, available));
        println!("│");

        let device = reader
            .engine()
            .sink_description()
            .unwrap_or_else(|| "not opened yet".to_string());
        println!("│ Output: {}", Self::truncate(&device, BOX_WIDTH - 8));
        if let Some(decode_time) = reader.engine().logger().last_decode_time() {
            println!("│ Last decode: {:.1} ms", decode_time.as_secs_f64() * 1000.0);
        }
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display real-time position update (single line)
    pub fn display_position_update(snapshot: &NarrationSnapshot, available: bool) {
        print!("\r{}   ", Self::status_line(snapshot, available));

        // Flush stdout to ensure immediate display
        let _ = io::stdout().flush();
    }

    /// `m:ss / m:ss [bar] label` as shown under the page
    pub fn status_line(snapshot: &NarrationSnapshot, available: bool) -> String {
        format!(
            "{} / {} [{}] {}",
            Self::format_time(snapshot.playhead),
            Self::format_time(snapshot.duration),
            Self::progress_bar(snapshot.progress(), 30),
            Self::narration_label(snapshot, available)
        )
    }

    pub fn narration_label(snapshot: &NarrationSnapshot, available: bool) -> &'static str {
        if snapshot.is_loading() {
            "Deciphering magic..."
        } else if available {
            "Narration Ready"
        } else {
            "Audio Unavailable"
        }
    }

    /// Filled/empty bar for a progress fraction
    pub fn progress_bar(progress: f64, width: usize) -> String {
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let filled = ((progress * width as f64) as usize).min(width);
        format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
    }

    /// Format seconds as m:ss; anything non-finite or negative reads 0:00
    pub fn format_time(seconds: f64) -> String {
        if !seconds.is_finite() || seconds < 0.0 {
            return "0:00".to_string();
        }
        let whole = seconds.floor() as u64;
        format!("{}:{:02}", whole / 60, whole % 60)
    }

    /// Display error message with formatting and recovery suggestions
    pub fn display_error(error: &NarrationError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
        };

        eprintln!(
            "┌─ {} {} ─────────────────────────────────────────────────┐",
            severity_icon,
            severity.as_str()
        );

        for line in Self::wrap_text(&error.user_message(), BOX_WIDTH) {
            eprintln!("│ {}", line);
        }

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("│");
            eprintln!("│ Suggestions:");
            for suggestion in suggestions.iter().take(3) {
                for line in Self::wrap_text(&format!("• {}", suggestion), BOX_WIDTH - 2) {
                    eprintln!("│   {}", line);
                }
            }
        }

        Self::display_error_context(error);

        eprintln!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display additional context for specific error types
    fn display_error_context(error: &NarrationError) {
        match error {
            NarrationError::Output(OutputSinkError::DeviceNotFound { .. }) => {
                eprintln!("│");
                eprintln!("│ Run 'narrate devices' to see available devices");
            }
            NarrationError::Output(OutputSinkError::NoDefaultDevice) => {
                eprintln!("│");
                eprintln!("│ Start with --silent to read without sound");
            }
            NarrationError::Story(StoryError::Parse(_)) => {
                eprintln!("│");
                eprintln!("│ Expected story_title and a list of pages");
            }
            NarrationError::Config(_) => {
                eprintln!("│");
                eprintln!("│ Configuration will use default values");
            }
            _ => {}
        }
    }

    /// Display a simple error message for non-interactive contexts
    pub fn display_simple_error(error: &NarrationError) {
        eprintln!("[{}] {}", error.severity().as_str(), error.user_message());

        if let Some(suggestion) = error.recovery_suggestions().first() {
            eprintln!("Suggestion: {}", suggestion);
        }
    }

    /// Page text wrapped for the terminal, cues removed
    fn page_lines(page: &StoryPage) -> Vec<String> {
        page.display_text()
            .lines()
            .flat_map(|paragraph| {
                if paragraph.trim().is_empty() {
                    vec![String::new()]
                } else {
                    Self::wrap_text(paragraph, BOX_WIDTH)
                }
            })
            .collect()
    }

    /// Wrap text to fit within specified width
    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.chars().count() + word.chars().count() < width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current_line));
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }
        lines
    }

    /// Truncate string to fit display width
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len || max_len <= 3 {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len - 3).collect();
            format!("{}...", kept)
        }
    }
}
