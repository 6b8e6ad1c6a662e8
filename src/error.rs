use thiserror::Error;

/// Top-level error type for the narrator
#[derive(Debug, Error)]
pub enum NarrationError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Output error: {0}")]
    Output(#[from] OutputSinkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Story error: {0}")]
    Story(#[from] StoryError),
}

impl NarrationError {
    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            NarrationError::Decode(err) => err.user_message(),
            NarrationError::Output(err) => err.user_message(),
            NarrationError::Config(err) => err.user_message(),
            NarrationError::Story(err) => err.user_message(),
        }
    }

    /// Get suggested recovery actions for the error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            NarrationError::Decode(err) => err.recovery_suggestions(),
            NarrationError::Output(err) => err.recovery_suggestions(),
            NarrationError::Config(err) => err.recovery_suggestions(),
            NarrationError::Story(err) => err.recovery_suggestions(),
        }
    }

    /// Check if the transport stays usable after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            NarrationError::Decode(err) => err.is_recoverable(),
            NarrationError::Output(err) => err.is_recoverable(),
            NarrationError::Config(err) => err.is_recoverable(),
            NarrationError::Story(err) => err.is_recoverable(),
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            NarrationError::Decode(_) => ErrorSeverity::Warning,
            NarrationError::Output(OutputSinkError::SourceBusy) => ErrorSeverity::Warning,
            NarrationError::Output(OutputSinkError::StartDenied(_)) => ErrorSeverity::Warning,
            NarrationError::Output(_) => ErrorSeverity::Error,
            NarrationError::Config(_) => ErrorSeverity::Warning,
            NarrationError::Story(StoryError::PageOutOfRange { .. } | StoryError::NoPreviousPage) => {
                ErrorSeverity::Info
            }
            NarrationError::Story(_) => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
        }
    }
}

/// Errors raised while turning a narration payload into samples
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Invalid PCM layout: {sample_rate} Hz, {channels} channel(s)")]
    InvalidLayout { sample_rate: u32, channels: u16 },

    #[error("Decode interrupted: {0}")]
    Interrupted(String),
}

impl DecodeError {
    pub fn user_message(&self) -> String {
        match self {
            DecodeError::InvalidBase64(_) => {
                "The narration for this page is damaged and cannot be played".to_string()
            }
            DecodeError::InvalidLayout { sample_rate, channels } => {
                format!(
                    "Narration format {} Hz with {} channel(s) is not playable",
                    sample_rate, channels
                )
            }
            DecodeError::Interrupted(_) => "Preparing the narration was interrupted".to_string(),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            DecodeError::InvalidBase64(_) => vec![
                "Regenerate the story to fetch fresh narration".to_string(),
                "Read the page without narration".to_string(),
            ],
            DecodeError::InvalidLayout { .. } => vec![
                "Check sample_rate and channels in the narrator configuration".to_string(),
            ],
            DecodeError::Interrupted(_) => vec!["Press play again".to_string()],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        true
    }
}

/// Errors raised by the audio output sink
#[derive(Debug, Error)]
pub enum OutputSinkError {
    #[error("Device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("No default output device available")]
    NoDefaultDevice,

    #[error("Audio initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("A narration source is already active")]
    SourceBusy,

    #[error("Host refused to start audio: {0}")]
    StartDenied(String),
}

impl OutputSinkError {
    pub fn user_message(&self) -> String {
        match self {
            OutputSinkError::DeviceNotFound { device } => {
                format!("Audio device '{}' is not available or has been disconnected", device)
            }
            OutputSinkError::NoDefaultDevice => "No speakers or headphones were found".to_string(),
            OutputSinkError::InitializationFailed(msg) => {
                format!("Failed to initialize audio output: {}", msg)
            }
            OutputSinkError::UnsupportedFormat { format } => {
                format!("The audio device does not support {}", format)
            }
            OutputSinkError::StreamError(msg) => format!("Audio playback interrupted: {}", msg),
            OutputSinkError::SourceBusy => "Narration is already playing".to_string(),
            OutputSinkError::StartDenied(msg) => format!("Audio playback was blocked: {}", msg),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            OutputSinkError::DeviceNotFound { .. } => vec![
                "Check that your audio device is connected".to_string(),
                "Run 'narrate devices' to list available devices".to_string(),
                "Remove preferred_device from the configuration to use the default".to_string(),
            ],
            OutputSinkError::NoDefaultDevice => vec![
                "Connect speakers or headphones".to_string(),
                "Use --silent to read without sound".to_string(),
            ],
            OutputSinkError::InitializationFailed(_)
            | OutputSinkError::UnsupportedFormat { .. }
            | OutputSinkError::StreamError(_) => vec![
                "Try a different output device".to_string(),
                "Close other applications using the audio device".to_string(),
            ],
            OutputSinkError::SourceBusy => vec!["Stop the current narration first".to_string()],
            OutputSinkError::StartDenied(_) => vec![
                "Allow audio playback for this application".to_string(),
                "Press play again".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self, OutputSinkError::NoDefaultDevice)
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot locate a home directory for the narrator configuration".to_string()
            }
            ConfigError::IoError(err) => format!("Cannot read or write configuration: {}", err),
            ConfigError::SerializationError(_) => "Failed to save configuration".to_string(),
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted - using defaults".to_string()
            }
            ConfigError::InvalidValue { field, reason } => {
                format!("Configuration value '{}' is invalid: {}", field, reason)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ConfigDirNotFound => vec![
                "Pass --config with an explicit path".to_string(),
            ],
            ConfigError::IoError(_) | ConfigError::SerializationError(_) => vec![
                "Check permissions on ~/.config/storyspark".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Delete ~/.config/storyspark/narrator.toml to restore defaults".to_string(),
            ],
            ConfigError::InvalidValue { field, .. } => vec![
                format!("Edit '{}' in the narrator configuration", field),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        true
    }
}

/// Errors loading or navigating a narrated story
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("Failed to read story file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid story file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Story has no pages")]
    Empty,

    #[error("Page {page} is out of range (story has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("Already on the first page")]
    NoPreviousPage,
}

impl StoryError {
    pub fn user_message(&self) -> String {
        match self {
            StoryError::Io(err) => format!("Could not open the story: {}", err),
            StoryError::Parse(err) => format!("The story file is not valid: {}", err),
            StoryError::Empty => "This story has no pages to read".to_string(),
            StoryError::PageOutOfRange { page, count } => {
                format!("There is no page {} - this story has {} pages", page + 1, count)
            }
            StoryError::NoPreviousPage => "This is the first page of the story".to_string(),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            StoryError::Io(_) => vec!["Check the story file path".to_string()],
            StoryError::Parse(_) | StoryError::Empty => {
                vec!["Export the story again from the generator".to_string()]
            }
            StoryError::PageOutOfRange { .. } | StoryError::NoPreviousPage => {
                vec!["Use 'next' and 'prev' to move between pages".to_string()]
            }
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoryError::PageOutOfRange { .. } | StoryError::NoPreviousPage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn base64_error() -> base64::DecodeError {
        base64::engine::general_purpose::STANDARD
            .decode("@@@@")
            .unwrap_err()
    }

    #[test]
    fn test_narration_error_from_decode_error() {
        let err: NarrationError = DecodeError::from(base64_error()).into();
        assert!(matches!(err, NarrationError::Decode(DecodeError::InvalidBase64(_))));
        assert!(err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_narration_error_from_sink_error() {
        let err: NarrationError = OutputSinkError::NoDefaultDevice.into();
        assert!(!err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Error);
        assert_eq!(err.severity().log_level(), log::Level::Error);
    }

    #[test]
    fn test_start_denied_is_warning() {
        let err: NarrationError = OutputSinkError::StartDenied("autoplay policy".to_string()).into();
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert!(err.user_message().contains("autoplay policy"));
    }

    #[test]
    fn test_page_out_of_range_message_is_one_based() {
        let err = StoryError::PageOutOfRange { page: 5, count: 5 };
        assert_eq!(err.user_message(), "There is no page 6 - this story has 5 pages");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = DecodeError::InvalidLayout { sample_rate: 0, channels: 1 };
        assert_eq!(err.to_string(), "Invalid PCM layout: 0 Hz, 1 channel(s)");

        let err = OutputSinkError::DeviceNotFound { device: "USB DAC".to_string() };
        assert_eq!(err.to_string(), "Device not found: USB DAC");
    }

    #[test]
    fn test_recovery_suggestions_not_empty() {
        let errors: Vec<NarrationError> = vec![
            DecodeError::Interrupted("cancelled".to_string()).into(),
            OutputSinkError::SourceBusy.into(),
            ConfigError::ConfigDirNotFound.into(),
            StoryError::Empty.into(),
        ];
        for err in errors {
            assert!(!err.recovery_suggestions().is_empty(), "no suggestions for {}", err);
        }
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "story.json");
        let err: NarrationError = StoryError::from(io).into();
        assert!(err.source().is_some());
    }
}
