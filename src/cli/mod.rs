use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod status;
pub use status::StatusDisplay;

/// StorySpark narration reader
#[derive(Parser, Debug)]
#[command(name = "narrate")]
#[command(about = "Read a generated story page by page with its narration")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct CliApp {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Story JSON file with per-page narration
    pub story: Option<PathBuf>,

    /// Configuration file (defaults to ~/.config/storyspark/narrator.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run without an audio device; narration advances on the system clock
    #[arg(long)]
    pub silent: bool,

    /// Output device name, overriding the configured one
    #[arg(long, value_name = "NAME")]
    pub device: Option<String>,

    /// Page to open the story on (starting at 1)
    #[arg(long, value_name = "N", default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,
}

/// One-shot subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List available audio output devices
    Devices,
}

/// Commands accepted at the interactive reader prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderCommand {
    /// Narrate the current page, resuming if paused
    Play,
    Pause,
    Stop,
    Next,
    Prev,
    /// Jump to a page, numbered from 1
    Page { number: usize },
    Status,
    /// Follow the playhead until narration stops or Enter is pressed
    Watch,
    Quit,
}

impl CliApp {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Zero-based page to open on
    pub fn start_page(&self) -> usize {
        self.page.saturating_sub(1) as usize
    }

    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home_dir) => home_dir.join(rest),
                None => PathBuf::from(path),
            }
        } else if path == "~" {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
        } else {
            PathBuf::from(path)
        }
    }

    /// Parse command from string (for interactive mode)
    pub fn parse_command(input: &str) -> Result<ReaderCommand, ParseError> {
        let args: Vec<&str> = input.split_whitespace().collect();
        if args.is_empty() {
            return Err(ParseError::EmptyCommand);
        }

        match args[0].to_ascii_lowercase().as_str() {
            "play" | "resume" => Ok(ReaderCommand::Play),
            "pause" => Ok(ReaderCommand::Pause),
            "stop" => Ok(ReaderCommand::Stop),
            "next" | "n" => Ok(ReaderCommand::Next),
            "prev" | "previous" | "p" => Ok(ReaderCommand::Prev),
            "page" | "goto" => {
                let Some(value) = args.get(1) else {
                    return Err(ParseError::MissingArgument {
                        command: "page".to_string(),
                        argument: "number".to_string(),
                    });
                };
                match value.parse::<usize>() {
                    Ok(number) if number >= 1 => Ok(ReaderCommand::Page { number }),
                    _ => Err(ParseError::InvalidArgument {
                        argument: "page number".to_string(),
                        value: value.to_string(),
                        expected: "a page number starting at 1".to_string(),
                    }),
                }
            }
            "status" => Ok(ReaderCommand::Status),
            "watch" => Ok(ReaderCommand::Watch),
            "quit" | "exit" | "q" => Ok(ReaderCommand::Quit),
            "help" | "?" => Err(ParseError::HelpRequested),
            _ => Err(ParseError::UnknownCommand {
                command: args[0].to_string(),
            }),
        }
    }

    /// Display help information
    pub fn display_help() {
        println!("StorySpark Narrator - Available Commands:");
        println!();
        println!("Narration:");
        println!("  play            - Narrate the current page (resumes if paused)");
        println!("  pause           - Pause narration, keeping the position");
        println!("  stop            - Stop narration and rewind");
        println!();
        println!("Pages:");
        println!("  next            - Turn to the next page");
        println!("  prev            - Turn back a page");
        println!("  page <n>        - Jump to page n");
        println!();
        println!("Information:");
        println!("  status          - Show the current page and narration status");
        println!("  watch           - Follow narration progress (Enter to stop watching)");
        println!();
        println!("General:");
        println!("  help            - Show this help message");
        println!("  exit, quit      - Stop narration and close the book");
    }
}

/// Command parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("Missing argument for {command}: {argument}")]
    MissingArgument { command: String, argument: String },

    #[error("Invalid argument {argument}: got '{value}', expected {expected}")]
    InvalidArgument {
        argument: String,
        value: String,
        expected: String,
    },

    #[error("Help requested")]
    HelpRequested,
}

#[cfg(test)]
mod tests;
