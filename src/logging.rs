use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Decodes slower than this are reported as warnings
pub const SLOW_DECODE_THRESHOLD: Duration = Duration::from_millis(100);

const DEFAULT_MAX_EVENTS: usize = 500;

/// Narration event for logging and debugging
#[derive(Debug, Clone)]
pub struct NarrationEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: NarrationEventType,
    pub page: Option<usize>,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationEventType {
    PlaybackStarted,
    PlaybackResumed,
    PlaybackPaused,
    PlaybackStopped,
    PlaybackCompleted,
    NarrationUnavailable,
    DecodeFailed,
    SinkFailed,
    StaleLoadDiscarded,
    PageChanged,
}

impl NarrationEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrationEventType::PlaybackStarted => "PLAYBACK_STARTED",
            NarrationEventType::PlaybackResumed => "PLAYBACK_RESUMED",
            NarrationEventType::PlaybackPaused => "PLAYBACK_PAUSED",
            NarrationEventType::PlaybackStopped => "PLAYBACK_STOPPED",
            NarrationEventType::PlaybackCompleted => "PLAYBACK_COMPLETED",
            NarrationEventType::NarrationUnavailable => "NARRATION_UNAVAILABLE",
            NarrationEventType::DecodeFailed => "DECODE_FAILED",
            NarrationEventType::SinkFailed => "SINK_FAILED",
            NarrationEventType::StaleLoadDiscarded => "STALE_LOAD_DISCARDED",
            NarrationEventType::PageChanged => "PAGE_CHANGED",
        }
    }
}

/// Logger for narration transport activity
#[derive(Clone)]
pub struct NarrationLogger {
    events: Arc<Mutex<VecDeque<NarrationEvent>>>,
    max_events: usize,
    last_decode_time: Arc<Mutex<Option<Duration>>>,
}

impl NarrationLogger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_EVENTS)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events,
            last_decode_time: Arc::new(Mutex::new(None)),
        }
    }

    /// Initialize logging system with appropriate log level
    pub fn init() -> Result<(), Box<dyn std::error::Error>> {
        // Set log level based on environment variable or default to Info
        let log_level = std::env::var("STORYSPARK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let mut builder = env_logger::Builder::new();

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        });

        builder.filter_level(parse_level(&log_level));
        builder.try_init()?;

        info!("Narrator logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Record an event and mirror it to the standard logger
    pub fn log_event(&self, event_type: NarrationEventType, page: Option<usize>, details: String) {
        match event_type {
            NarrationEventType::PlaybackStarted
            | NarrationEventType::PlaybackResumed
            | NarrationEventType::PlaybackPaused
            | NarrationEventType::PlaybackStopped
            | NarrationEventType::PlaybackCompleted
            | NarrationEventType::PageChanged => {
                info!("[{}] {}", event_type.as_str(), details);
            }
            NarrationEventType::NarrationUnavailable | NarrationEventType::StaleLoadDiscarded => {
                debug!("[{}] {}", event_type.as_str(), details);
            }
            NarrationEventType::DecodeFailed | NarrationEventType::SinkFailed => {
                warn!("[{}] {}", event_type.as_str(), details);
            }
        }

        if let Ok(mut events) = self.events.lock() {
            events.push_back(NarrationEvent {
                timestamp: Utc::now(),
                event_type,
                page,
                details,
            });
            while events.len() > self.max_events {
                events.pop_front();
            }
        }
    }

    pub fn log_playback_started(&self, page: usize, duration: f64) {
        self.log_event(
            NarrationEventType::PlaybackStarted,
            Some(page),
            format!("Narrating page {} ({:.2}s)", page + 1, duration),
        );
    }

    pub fn log_playback_resumed(&self, page: usize, offset: f64) {
        self.log_event(
            NarrationEventType::PlaybackResumed,
            Some(page),
            format!("Resumed page {} at {:.2}s", page + 1, offset),
        );
    }

    pub fn log_playback_paused(&self, page: Option<usize>, offset: f64) {
        self.log_event(
            NarrationEventType::PlaybackPaused,
            page,
            format!("Paused at {:.2}s", offset),
        );
    }

    pub fn log_playback_stopped(&self, page: Option<usize>, reason: &str) {
        self.log_event(
            NarrationEventType::PlaybackStopped,
            page,
            format!("Narration stopped: {}", reason),
        );
    }

    pub fn log_playback_completed(&self, page: Option<usize>) {
        self.log_event(
            NarrationEventType::PlaybackCompleted,
            page,
            "Narration reached the end of the page".to_string(),
        );
    }

    pub fn log_unavailable(&self, page: usize) {
        self.log_event(
            NarrationEventType::NarrationUnavailable,
            Some(page),
            format!("No narration for page {}", page + 1),
        );
    }

    pub fn log_decode_failed(&self, page: usize, error: &str) {
        self.log_event(
            NarrationEventType::DecodeFailed,
            Some(page),
            format!("Could not decode narration for page {}: {}", page + 1, error),
        );
    }

    pub fn log_sink_failed(&self, page: Option<usize>, error: &str) {
        self.log_event(
            NarrationEventType::SinkFailed,
            page,
            format!("Audio output failed: {}", error),
        );
    }

    pub fn log_stale_load(&self, page: usize) {
        self.log_event(
            NarrationEventType::StaleLoadDiscarded,
            Some(page),
            format!("Discarded late narration for page {}", page + 1),
        );
    }

    pub fn log_page_changed(&self, from: usize, to: usize) {
        self.log_event(
            NarrationEventType::PageChanged,
            Some(to),
            format!("Page {} -> {}", from + 1, to + 1),
        );
    }

    /// Record how long a decode took; warns above [`SLOW_DECODE_THRESHOLD`]
    pub fn update_decode_metrics(&self, decode_time: Duration) {
        if let Ok(mut last) = self.last_decode_time.lock() {
            *last = Some(decode_time);
        }
        if decode_time > SLOW_DECODE_THRESHOLD {
            warn!(
                "Narration decode took {}ms (threshold: {}ms)",
                decode_time.as_millis(),
                SLOW_DECODE_THRESHOLD.as_millis()
            );
        }
    }

    pub fn last_decode_time(&self) -> Option<Duration> {
        self.last_decode_time.lock().ok().and_then(|last| *last)
    }

    /// Get recent events for debugging, oldest first
    pub fn get_recent_events(&self, count: usize) -> Vec<NarrationEvent> {
        match self.events.lock() {
            Ok(events) => {
                let skip = events.len().saturating_sub(count);
                events.iter().skip(skip).cloned().collect()
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn clear_events(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    /// Summarise the journal
    pub fn event_statistics(&self) -> EventStatistics {
        let mut stats = EventStatistics::default();
        let Ok(events) = self.events.lock() else {
            return stats;
        };

        for event in events.iter() {
            match event.event_type {
                NarrationEventType::PlaybackStarted => stats.playbacks_started += 1,
                NarrationEventType::PlaybackResumed => stats.resumes += 1,
                NarrationEventType::PlaybackPaused => stats.pauses += 1,
                NarrationEventType::PlaybackCompleted => stats.completions += 1,
                NarrationEventType::NarrationUnavailable => stats.unavailable += 1,
                NarrationEventType::DecodeFailed | NarrationEventType::SinkFailed => {
                    stats.failures += 1
                }
                NarrationEventType::StaleLoadDiscarded => stats.stale_loads += 1,
                NarrationEventType::PageChanged => stats.page_changes += 1,
                NarrationEventType::PlaybackStopped => {}
            }
        }

        stats.total_events = events.len();
        stats
    }
}

impl Default for NarrationLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

/// Statistics about logged events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStatistics {
    pub total_events: usize,
    pub playbacks_started: usize,
    pub resumes: usize,
    pub pauses: usize,
    pub completions: usize,
    pub unavailable: usize,
    pub failures: usize,
    pub stale_loads: usize,
    pub page_changes: usize,
}

/// Timer utility for measuring operation durations
pub struct OperationTimer {
    start_time: Instant,
    operation_name: String,
}

impl OperationTimer {
    pub fn new(operation_name: String) -> Self {
        trace!("Starting operation: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish(self) -> Duration {
        let duration = self.elapsed();
        trace!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        duration
    }
}

/// Time `$code`, returning `(result, elapsed)`
#[macro_export]
macro_rules! time_operation {
    ($name:expr, $code:block) => {{
        let timer = $crate::logging::OperationTimer::new($name.to_string());
        let result = $code;
        let duration = timer.finish();
        (result, duration)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_logger_creation() {
        let logger = NarrationLogger::new();
        assert_eq!(logger.max_events, 500);
        assert!(logger.get_recent_events(10).is_empty());
    }

    #[test]
    fn test_log_event() {
        let logger = NarrationLogger::new();
        logger.log_playback_started(2, 4.5);

        let events = logger.get_recent_events(1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, NarrationEventType::PlaybackStarted);
        assert_eq!(events[0].page, Some(2));
        assert_eq!(events[0].details, "Narrating page 3 (4.50s)");
    }

    #[test]
    fn test_event_history_limit() {
        let logger = NarrationLogger::with_capacity(3);
        for page in 0..5 {
            logger.log_unavailable(page);
        }

        let events = logger.get_recent_events(10);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].page, Some(2));
        assert_eq!(events[2].page, Some(4));
    }

    #[test]
    fn test_recent_events_returns_newest_in_order() {
        let logger = NarrationLogger::new();
        logger.log_page_changed(0, 1);
        logger.log_page_changed(1, 2);
        logger.log_page_changed(2, 3);

        let events = logger.get_recent_events(2);
        assert_eq!(events[0].details, "Page 2 -> 3");
        assert_eq!(events[1].details, "Page 3 -> 4");
    }

    #[test]
    fn test_event_statistics() {
        let logger = NarrationLogger::new();
        logger.log_playback_started(0, 1.0);
        logger.log_playback_paused(Some(0), 0.5);
        logger.log_playback_resumed(0, 0.5);
        logger.log_playback_completed(Some(0));
        logger.log_decode_failed(1, "bad base64");
        logger.log_sink_failed(None, "device lost");
        logger.log_stale_load(1);
        logger.log_playback_stopped(None, "page change");

        let stats = logger.event_statistics();
        assert_eq!(stats.total_events, 8);
        assert_eq!(stats.playbacks_started, 1);
        assert_eq!(stats.pauses, 1);
        assert_eq!(stats.resumes, 1);
        assert_eq!(stats.completions, 1);
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.stale_loads, 1);
    }

    #[test]
    fn test_decode_metrics() {
        let logger = NarrationLogger::new();
        assert_eq!(logger.last_decode_time(), None);

        logger.update_decode_metrics(Duration::from_millis(150));
        assert_eq!(logger.last_decode_time(), Some(Duration::from_millis(150)));
    }

    #[test]
    fn test_clones_share_journal() {
        let logger = NarrationLogger::new();
        let other = logger.clone();
        other.log_unavailable(0);
        assert_eq!(logger.get_recent_events(5).len(), 1);

        logger.clear_events();
        assert!(other.get_recent_events(5).is_empty());
    }

    #[test]
    fn test_operation_timer_macro() {
        let (value, elapsed) = crate::time_operation!("sleepy", {
            thread::sleep(Duration::from_millis(10));
            42
        });
        assert_eq!(value, 42);
        assert!(elapsed >= Duration::from_millis(10));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), log::LevelFilter::Debug);
        assert_eq!(parse_level("nonsense"), log::LevelFilter::Info);
    }

    #[test]
    fn test_event_type_as_str() {
        assert_eq!(NarrationEventType::StaleLoadDiscarded.as_str(), "STALE_LOAD_DISCARDED");
        assert_eq!(NarrationEventType::PageChanged.as_str(), "PAGE_CHANGED");
    }
}
