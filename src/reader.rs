//! Paginated story reader.
//!
//! Every page change stops narration before the page index moves, so the
//! engine never holds audio for a page the reader is not showing.

use crate::audio::session::{NarrationEngine, PlayOutcome};
use crate::audio::sink::SinkProvider;
use crate::error::StoryError;
use crate::models::NarrationSnapshot;
use crate::story::{PayloadLookup, StoryNarration, StoryPage};

pub struct StoryReader<P: SinkProvider> {
    story: StoryNarration,
    engine: NarrationEngine<P>,
    current_page: usize,
}

impl<P: SinkProvider> StoryReader<P> {
    pub fn new(story: StoryNarration, engine: NarrationEngine<P>) -> Self {
        Self {
            story,
            engine,
            current_page: 0,
        }
    }

    pub fn story(&self) -> &StoryNarration {
        &self.story
    }

    pub fn engine(&self) -> &NarrationEngine<P> {
        &self.engine
    }

    /// Zero-based index of the page being shown
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page(&self) -> Option<&StoryPage> {
        self.story.page(self.current_page)
    }

    pub fn page_count(&self) -> usize {
        self.story.page_count()
    }

    pub fn is_first_page(&self) -> bool {
        self.current_page == 0
    }

    pub fn is_last_page(&self) -> bool {
        self.current_page + 1 >= self.story.page_count()
    }

    /// Whether the current page has narration to play
    pub fn is_narration_available(&self) -> bool {
        self.story.is_narration_available(self.current_page)
    }

    pub fn snapshot(&self) -> NarrationSnapshot {
        self.engine.snapshot()
    }

    /// Narrate the current page
    pub async fn play(&self) -> PlayOutcome {
        self.engine.play(self.current_page, &self.story).await
    }

    pub fn pause(&self) -> bool {
        self.engine.pause()
    }

    pub fn stop(&self) {
        self.engine.stop();
    }

    /// Stop narration, then show `page`.
    ///
    /// Narration is stopped even when `page` is out of range.
    pub fn go_to_page(&mut self, page: usize) -> Result<(), StoryError> {
        self.engine.stop();

        let count = self.story.page_count();
        if page >= count {
            return Err(StoryError::PageOutOfRange { page, count });
        }

        if page != self.current_page {
            self.engine.logger().log_page_changed(self.current_page, page);
        }
        self.current_page = page;
        Ok(())
    }

    pub fn next_page(&mut self) -> Result<(), StoryError> {
        self.go_to_page(self.current_page + 1)
    }

    pub fn previous_page(&mut self) -> Result<(), StoryError> {
        match self.current_page.checked_sub(1) {
            Some(page) => self.go_to_page(page),
            None => {
                self.engine.stop();
                Err(StoryError::NoPreviousPage)
            }
        }
    }

    /// Adventure complete: stop narration and rewind to the cover
    pub fn finish(&mut self) {
        self.engine.stop();
        self.current_page = 0;
    }
}

impl<P: SinkProvider> Drop for StoryReader<P> {
    fn drop(&mut self) {
        self.engine.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::clock::ManualClock;
    use crate::audio::sink::{SilentProvider, SinkProbe};
    use crate::audio::transport::TransportState;
    use crate::config::NarratorConfig;
    use crate::logging::NarrationLogger;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use std::sync::Arc;

    fn story() -> StoryNarration {
        let one_second = STANDARD.encode(vec![0u8; 48_000]);
        let json = serde_json::json!({
            "story_title": "Pip the Brave Pebble",
            "consistency_id": "pip-1",
            "pages": [
                {"page": 1, "text": "Pip rolled.", "voice_id": "adventure", "audio_base64": one_second},
                {"page": 2, "text": "Pip splashed.", "voice_id": "nature", "audio_base64": one_second},
                {"page": 3, "text": "Pip slept.", "voice_id": "whimsical", "audio_base64": null}
            ]
        });
        StoryNarration::from_json(&json.to_string()).unwrap()
    }

    fn reader() -> (StoryReader<SilentProvider>, SinkProbe, ManualClock) {
        let clock = ManualClock::new();
        let provider = SilentProvider::new(Arc::new(clock.clone()));
        let probe = provider.probe();
        let config = NarratorConfig {
            tick_interval_ms: 0,
            ..NarratorConfig::default()
        };
        let engine = NarrationEngine::with_config(provider, &config, NarrationLogger::new()).unwrap();
        (StoryReader::new(story(), engine), probe, clock)
    }

    #[tokio::test]
    async fn test_navigation_stops_playing_narration() {
        let (mut reader, probe, _clock) = reader();
        assert!(reader.play().await.is_playing());

        reader.next_page().unwrap();
        assert_eq!(reader.current_page(), 1);
        assert_eq!(reader.snapshot().state, TransportState::Stopped);
        assert_eq!(reader.snapshot().narrated_page, None);
        assert_eq!(probe.active_sources(), 0);
    }

    #[tokio::test]
    async fn test_navigation_from_paused_discards_buffer() {
        let (mut reader, probe, clock) = reader();
        reader.play().await;
        clock.advance(0.5);
        reader.pause();

        reader.next_page().unwrap();
        reader.previous_page().unwrap();
        assert_eq!(reader.snapshot().state, TransportState::Stopped);

        // Coming back to the page starts over instead of resuming
        assert!(matches!(reader.play().await, PlayOutcome::Started));
        assert_eq!(probe.last_offset(), Some(0.0));
    }

    #[tokio::test]
    async fn test_out_of_range_still_stops() {
        let (mut reader, _probe, _clock) = reader();
        reader.go_to_page(2).unwrap();
        reader.go_to_page(1).unwrap();
        reader.play().await;

        let err = reader.go_to_page(7).unwrap_err();
        assert!(matches!(err, StoryError::PageOutOfRange { page: 7, count: 3 }));
        assert_eq!(reader.current_page(), 1);
        assert_eq!(reader.snapshot().state, TransportState::Stopped);
    }

    #[test]
    fn test_previous_from_first_page() {
        let (mut reader, _probe, _clock) = reader();
        assert!(reader.is_first_page());
        assert!(matches!(reader.previous_page(), Err(StoryError::NoPreviousPage)));
        assert_eq!(reader.current_page(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_page() {
        let (mut reader, probe, _clock) = reader();
        reader.go_to_page(2).unwrap();
        assert!(reader.is_last_page());
        assert!(!reader.is_narration_available());

        assert!(matches!(reader.play().await, PlayOutcome::Unavailable));
        assert_eq!(probe.starts(), 0);
    }

    #[tokio::test]
    async fn test_finish_and_drop_stop_narration() {
        let (mut reader, probe, _clock) = reader();
        reader.play().await;
        reader.finish();
        assert_eq!(reader.current_page(), 0);
        assert_eq!(probe.active_sources(), 0);

        reader.play().await;
        assert_eq!(probe.active_sources(), 1);
        let engine = reader.engine().clone();
        drop(reader);
        assert_eq!(probe.active_sources(), 0);
        assert_eq!(engine.state(), TransportState::Stopped);
    }

    #[test]
    fn test_page_changes_are_journaled() {
        let (mut reader, _probe, _clock) = reader();
        reader.next_page().unwrap();
        reader.next_page().unwrap();
        reader.go_to_page(2).unwrap();
        assert_eq!(reader.engine().logger().event_statistics().page_changes, 2);
    }
}
