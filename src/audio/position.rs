/// Playhead tracker for narration playback.
///
/// Position is derived from the sink clock: `offset + (now - started_at)`,
/// clamped to the buffer duration. `offset` carries elapsed time across
/// pause/resume cycles.
#[derive(Debug, Clone, Default)]
pub struct PlayheadTracker {
    /// Seconds already played before the current run
    offset: f64,
    /// Sink clock reading when the current run began
    started_at: Option<f64>,
    /// Buffer duration for bounds checking
    duration: f64,
    /// Last published playhead
    playhead: f64,
}

impl PlayheadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration of a freshly decoded buffer
    pub fn load(&mut self, duration: f64) {
        self.duration = duration.max(0.0);
        self.offset = 0.0;
        self.playhead = 0.0;
        self.started_at = None;
    }

    /// Begin a run at sink time `now`, continuing from the stored offset
    pub fn start(&mut self, now: f64) {
        self.started_at = Some(now);
        self.playhead = self.offset;
    }

    /// Elapsed position at `now`, clamped to `[0, duration]`
    pub fn elapsed(&self, now: f64) -> f64 {
        let played = match self.started_at {
            Some(started_at) => self.offset + (now - started_at),
            None => self.offset,
        };
        played.clamp(0.0, self.duration)
    }

    /// Recompute and store the playhead
    pub fn sample(&mut self, now: f64) -> f64 {
        self.playhead = self.elapsed(now);
        self.playhead
    }

    /// Freeze the elapsed position into the offset (pause)
    pub fn freeze(&mut self, now: f64) -> f64 {
        self.offset = self.elapsed(now);
        self.started_at = None;
        self.playhead = self.offset;
        self.offset
    }

    /// Reset offset and playhead; duration is kept (natural end)
    pub fn rewind(&mut self) {
        self.offset = 0.0;
        self.started_at = None;
        self.playhead = 0.0;
    }

    /// Reset everything including duration (stop)
    pub fn clear(&mut self) {
        self.rewind();
        self.duration = 0.0;
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn playhead(&self) -> f64 {
        self.playhead
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Progress as a fraction (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            self.playhead / self.duration
        } else {
            0.0
        }
    }

    /// Seconds left after the playhead
    pub fn remaining(&self) -> f64 {
        (self.duration - self.playhead).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_tracker_creation() {
        let tracker = PlayheadTracker::new();
        assert_eq!(tracker.playhead(), 0.0);
        assert_eq!(tracker.duration(), 0.0);
        assert!(!tracker.is_running());
    }

    #[test]
    fn test_elapsed_follows_clock() {
        let mut tracker = PlayheadTracker::new();
        tracker.load(10.0);
        tracker.start(100.0);

        assert!((tracker.sample(100.0) - 0.0).abs() < EPS);
        assert!((tracker.sample(102.5) - 2.5).abs() < EPS);
        assert!((tracker.progress() - 0.25).abs() < EPS);
        assert!((tracker.remaining() - 7.5).abs() < EPS);
    }

    #[test]
    fn test_elapsed_is_clamped() {
        let mut tracker = PlayheadTracker::new();
        tracker.load(3.0);
        tracker.start(50.0);

        assert_eq!(tracker.elapsed(49.0), 0.0);
        assert_eq!(tracker.elapsed(60.0), 3.0);
    }

    #[test]
    fn test_pause_and_resume_carry_offset() {
        let mut tracker = PlayheadTracker::new();
        tracker.load(10.0);
        tracker.start(0.0);

        let frozen = tracker.freeze(1.75);
        assert!((frozen - 1.75).abs() < EPS);
        assert!(!tracker.is_running());

        // Time passing while paused does not move the playhead
        assert!((tracker.elapsed(30.0) - 1.75).abs() < EPS);

        tracker.start(30.0);
        assert!((tracker.playhead() - 1.75).abs() < EPS);
        assert!((tracker.sample(31.0) - 2.75).abs() < EPS);
    }

    #[test]
    fn test_freeze_never_exceeds_duration() {
        let mut tracker = PlayheadTracker::new();
        tracker.load(2.0);
        tracker.start(0.0);
        assert_eq!(tracker.freeze(9.0), 2.0);
    }

    #[test]
    fn test_rewind_keeps_duration_clear_drops_it() {
        let mut tracker = PlayheadTracker::new();
        tracker.load(4.0);
        tracker.start(0.0);
        tracker.sample(1.0);

        tracker.rewind();
        assert_eq!(tracker.playhead(), 0.0);
        assert_eq!(tracker.offset(), 0.0);
        assert_eq!(tracker.duration(), 4.0);

        tracker.clear();
        assert_eq!(tracker.duration(), 0.0);
    }

    #[test]
    fn test_zero_duration_handling() {
        let mut tracker = PlayheadTracker::new();
        tracker.load(0.0);
        tracker.start(0.0);
        assert_eq!(tracker.sample(5.0), 0.0);
        assert_eq!(tracker.progress(), 0.0);
        assert_eq!(tracker.remaining(), 0.0);
    }
}
