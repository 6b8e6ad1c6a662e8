//! Device-less sink driven by a [`Clock`].
//!
//! Nothing is rendered; a source simply "plays" until the clock passes its
//! end time. Used by `narrate --silent` and throughout the test suite.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::debug;

use super::{CompletionHook, OutputSink, SinkProvider};
use crate::audio::clock::Clock;
use crate::error::OutputSinkError;
use crate::models::DecodedAudioBuffer;

#[derive(Debug, Default)]
struct ProbeState {
    opens: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    resumes: AtomicUsize,
    completions: AtomicUsize,
    deny_starts: AtomicBool,
    deny_open: AtomicBool,
    last_offset: Mutex<Option<f64>>,
}

/// Shared view of what a [`SilentSink`] has been asked to do
#[derive(Debug, Clone, Default)]
pub struct SinkProbe {
    state: Arc<ProbeState>,
}

impl SinkProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the provider opened a sink
    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    /// Sources currently rendering (0 or 1)
    pub fn active_sources(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously active sources ever observed
    pub fn peak_active_sources(&self) -> usize {
        self.state.peak_active.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.state.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.state.stops.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.state.resumes.load(Ordering::SeqCst)
    }

    /// Sources that ran to the end on their own
    pub fn completions(&self) -> usize {
        self.state.completions.load(Ordering::SeqCst)
    }

    /// Offset passed to the most recent start
    pub fn last_offset(&self) -> Option<f64> {
        self.state.last_offset.lock().ok().and_then(|offset| *offset)
    }

    /// Simulate the host refusing to start audio
    pub fn deny_starts(&self, deny: bool) {
        self.state.deny_starts.store(deny, Ordering::SeqCst);
    }

    /// Simulate the output failing to initialize
    pub fn deny_open(&self, deny: bool) {
        self.state.deny_open.store(deny, Ordering::SeqCst);
    }

    fn record_start(&self, offset: f64) {
        self.state.starts.fetch_add(1, Ordering::SeqCst);
        let active = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak_active.fetch_max(active, Ordering::SeqCst);
        if let Ok(mut last) = self.state.last_offset.lock() {
            *last = Some(offset);
        }
    }

    fn record_release(&self, completed: bool) {
        self.state.active.fetch_sub(1, Ordering::SeqCst);
        if completed {
            self.state.completions.fetch_add(1, Ordering::SeqCst);
        } else {
            self.state.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct SilentSource {
    end_at: f64,
    hook: CompletionHook,
}

/// Sink that renders nothing and follows an external clock
pub struct SilentSink {
    clock: Arc<dyn Clock>,
    probe: SinkProbe,
    source: Option<SilentSource>,
}

impl SilentSink {
    pub fn new(clock: Arc<dyn Clock>, probe: SinkProbe) -> Self {
        Self {
            clock,
            probe,
            source: None,
        }
    }
}

impl OutputSink for SilentSink {
    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn resume(&mut self) -> Result<(), OutputSinkError> {
        self.probe.state.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn start_source(
        &mut self,
        buffer: Arc<DecodedAudioBuffer>,
        offset: f64,
        hook: CompletionHook,
    ) -> Result<(), OutputSinkError> {
        if self.source.is_some() {
            return Err(OutputSinkError::SourceBusy);
        }
        if self.probe.state.deny_starts.load(Ordering::SeqCst) {
            return Err(OutputSinkError::StartDenied(
                "Audio output was not allowed to start".to_string(),
            ));
        }

        let remaining = (buffer.duration_secs() - offset).max(0.0);
        let end_at = self.clock.now() + remaining;
        debug!("Silent source {:?} runs until t={:.3}s", hook.source(), end_at);

        self.probe.record_start(offset);
        self.source = Some(SilentSource { end_at, hook });
        Ok(())
    }

    fn stop_source(&mut self) {
        if self.source.take().is_some() {
            self.probe.record_release(false);
        }
    }

    fn has_active_source(&self) -> bool {
        self.source.is_some()
    }

    fn service(&mut self) {
        let finished = self
            .source
            .as_ref()
            .map_or(false, |source| self.clock.now() >= source.end_at);

        if finished {
            if let Some(source) = self.source.take() {
                self.probe.record_release(true);
                source.hook.fire();
            }
        }
    }

    fn describe(&self) -> String {
        "silent output".to_string()
    }
}

/// Opens [`SilentSink`]s sharing one clock and probe
#[derive(Clone)]
pub struct SilentProvider {
    clock: Arc<dyn Clock>,
    probe: SinkProbe,
}

impl SilentProvider {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            probe: SinkProbe::new(),
        }
    }

    pub fn probe(&self) -> SinkProbe {
        self.probe.clone()
    }
}

impl SinkProvider for SilentProvider {
    type Sink = SilentSink;

    fn open(&mut self) -> Result<SilentSink, OutputSinkError> {
        if self.probe.state.deny_open.load(Ordering::SeqCst) {
            return Err(OutputSinkError::InitializationFailed(
                "Silent output refused to open".to_string(),
            ));
        }
        self.probe.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(SilentSink::new(Arc::clone(&self.clock), self.probe.clone()))
    }
}
