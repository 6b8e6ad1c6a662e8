//! Playback session manager.
//!
//! [`NarrationEngine`] is the sole owner of the transport, the playhead
//! tracker, the output sink and the one live playback session. Every
//! mutation goes through it; the UI layer reads [`NarrationSnapshot`]s.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, trace, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::audio::pcm::PcmDecoder;
use crate::audio::position::PlayheadTracker;
use crate::audio::sink::{
    completion_pair, CompletionHandle, OutputSink, SinkEvent, SinkProvider, SourceId,
};
use crate::audio::transport::{Transport, TransportEvent, TransportState};
use crate::config::NarratorConfig;
use crate::error::{ConfigError, DecodeError, NarrationError, OutputSinkError};
use crate::logging::NarrationLogger;
use crate::models::{DecodedAudioBuffer, NarrationSnapshot, PcmLayout};
use crate::story::PayloadLookup;

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Result of a play request
#[derive(Debug)]
pub enum PlayOutcome {
    /// Decoded and started from the beginning
    Started,
    /// Continued the paused buffer from its stored offset
    Resumed,
    /// A load is already in flight
    Ignored,
    /// Narration is already playing; nothing was restarted
    AlreadyPlaying,
    /// No narration exists for the page
    Unavailable,
    /// A stop or navigation overtook this load; its result was discarded
    Superseded,
    /// Decode or output failed; the engine is back in `stopped`
    Failed(NarrationError),
}

impl PlayOutcome {
    /// Whether audio is now playing because of this request
    pub fn is_playing(&self) -> bool {
        matches!(self, PlayOutcome::Started | PlayOutcome::Resumed)
    }
}

/// Whether a periodic ticker should keep running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still playing; keep ticking
    Continue,
    /// Nothing is playing; the ticker can exit
    Halt,
}

/// Pending decode issued by [`NarrationEngine::begin_play`]
#[derive(Debug, Clone)]
pub struct LoadTicket {
    generation: u64,
    page: usize,
    payload: Arc<str>,
    decoder: PcmDecoder,
}

impl LoadTicket {
    pub fn page(&self) -> usize {
        self.page
    }

    /// Decode the payload; runs without touching engine state
    pub fn decode(&self) -> Result<(DecodedAudioBuffer, Duration), DecodeError> {
        let (result, elapsed) = crate::time_operation!("narration decode", {
            self.decoder.decode(&self.payload)
        });
        result.map(|buffer| (buffer, elapsed))
    }
}

/// First half of a play request
#[derive(Debug)]
pub enum PlayStep {
    /// Nothing to decode; the request is already resolved
    Done(PlayOutcome),
    /// Decode the ticket, then hand the result to `finish_play`
    Load(LoadTicket),
}

/// Armed while an async load awaits its decode
struct PendingLoad<'a, P: SinkProvider> {
    engine: &'a NarrationEngine<P>,
    generation: u64,
    page: usize,
    armed: bool,
}

impl<'a, P: SinkProvider> PendingLoad<'a, P> {
    fn new(engine: &'a NarrationEngine<P>, ticket: &LoadTicket) -> Self {
        Self {
            engine,
            generation: ticket.generation,
            page: ticket.page,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<P: SinkProvider> Drop for PendingLoad<'_, P> {
    fn drop(&mut self) {
        if self.armed {
            self.engine.abandon_load(self.generation, self.page);
        }
    }
}

/// Live binding of a decoded buffer to the sink
struct PlaybackSession {
    buffer: Arc<DecodedAudioBuffer>,
    page: usize,
    /// Completion handle of the source currently rendering, if any
    active: Option<CompletionHandle>,
}

struct EngineInner<P: SinkProvider> {
    transport: Transport,
    tracker: PlayheadTracker,
    provider: P,
    sink: Option<P::Sink>,
    session: Option<PlaybackSession>,
    events_tx: mpsc::UnboundedSender<SinkEvent>,
    events_rx: mpsc::UnboundedReceiver<SinkEvent>,
    /// Bumped by every stop and every load; tickets from older generations are stale
    generation: u64,
    next_source: u64,
    ticker: Option<JoinHandle<()>>,
}

/// Narration playback engine
pub struct NarrationEngine<P: SinkProvider> {
    inner: Arc<Mutex<EngineInner<P>>>,
    snapshot_tx: Arc<watch::Sender<NarrationSnapshot>>,
    decoder: PcmDecoder,
    tick_interval: Option<Duration>,
    logger: NarrationLogger,
}

impl<P: SinkProvider> Clone for NarrationEngine<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            snapshot_tx: Arc::clone(&self.snapshot_tx),
            decoder: self.decoder,
            tick_interval: self.tick_interval,
            logger: self.logger.clone(),
        }
    }
}

impl<P: SinkProvider> NarrationEngine<P> {
    /// Engine for 24 kHz mono payloads with the default tick interval
    pub fn new(provider: P, logger: NarrationLogger) -> Self {
        Self::build(provider, PcmLayout::NARRATION, Some(DEFAULT_TICK_INTERVAL), logger)
    }

    pub fn with_config(
        provider: P,
        config: &NarratorConfig,
        logger: NarrationLogger,
    ) -> Result<Self, ConfigError> {
        let layout = config.pcm_layout()?;
        Ok(Self::build(provider, layout, config.tick_interval(), logger))
    }

    fn build(
        provider: P,
        layout: PcmLayout,
        tick_interval: Option<Duration>,
        logger: NarrationLogger,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(NarrationSnapshot::stopped());

        let inner = EngineInner {
            transport: Transport::new(),
            tracker: PlayheadTracker::new(),
            provider,
            sink: None,
            session: None,
            events_tx,
            events_rx,
            generation: 0,
            next_source: 0,
            ticker: None,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
            snapshot_tx: Arc::new(snapshot_tx),
            decoder: PcmDecoder::new(layout),
            tick_interval,
            logger,
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineInner<P>> {
        // State is kept consistent at every step, so a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn logger(&self) -> &NarrationLogger {
        &self.logger
    }

    /// Current published state
    pub fn snapshot(&self) -> NarrationSnapshot {
        let inner = self.lock();
        Self::snapshot_of(&inner)
    }

    /// Watch published state changes
    pub fn subscribe(&self) -> watch::Receiver<NarrationSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn state(&self) -> TransportState {
        self.lock().transport.state()
    }

    /// Description of the opened sink, if playback has started once
    pub fn sink_description(&self) -> Option<String> {
        self.lock().sink.as_ref().map(|sink| sink.describe())
    }

    /// Play narration for `page`, decoding on the blocking pool.
    ///
    /// Requires a tokio runtime. See [`play_now`](Self::play_now) otherwise.
    pub async fn play<L>(&self, page: usize, lookup: &L) -> PlayOutcome
    where
        L: PayloadLookup + ?Sized,
    {
        let ticket = match self.begin_play(page, lookup) {
            PlayStep::Done(outcome) => return outcome,
            PlayStep::Load(ticket) => ticket,
        };

        // Dropping this future mid-decode must not strand the engine in `loading`
        let mut guard = PendingLoad::new(self, &ticket);
        let job = ticket.clone();
        let result = match tokio::task::spawn_blocking(move || job.decode()).await {
            Ok(result) => result,
            Err(e) => Err(DecodeError::Interrupted(e.to_string())),
        };
        guard.disarm();
        self.finish_play(ticket, result)
    }

    /// Play narration for `page`, decoding on the calling thread
    pub fn play_now<L>(&self, page: usize, lookup: &L) -> PlayOutcome
    where
        L: PayloadLookup + ?Sized,
    {
        match self.begin_play(page, lookup) {
            PlayStep::Done(outcome) => outcome,
            PlayStep::Load(ticket) => {
                let result = ticket.decode();
                self.finish_play(ticket, result)
            }
        }
    }

    /// Resolve a play request as far as possible without decoding
    pub fn begin_play<L>(&self, page: usize, lookup: &L) -> PlayStep
    where
        L: PayloadLookup + ?Sized,
    {
        let mut inner = self.lock();
        self.refresh_locked(&mut inner);

        let outcome = match inner.transport.state() {
            TransportState::Loading => Some(PlayOutcome::Ignored),
            TransportState::Playing => Some(PlayOutcome::AlreadyPlaying),
            TransportState::Paused
                if inner.session.as_ref().map(|session| session.page) == Some(page) =>
            {
                Some(self.resume_locked(&mut inner))
            }
            _ => None,
        };
        if let Some(outcome) = outcome {
            self.publish_locked(&inner);
            return PlayStep::Done(outcome);
        }

        let Some(payload) = lookup.lookup_encoded_audio(page) else {
            self.stop_locked(&mut inner, "narration unavailable");
            self.logger.log_unavailable(page);
            self.publish_locked(&inner);
            return PlayStep::Done(PlayOutcome::Unavailable);
        };

        // A paused buffer for another page is never resumed; drop it
        Self::release_session(&mut inner);
        inner.tracker.clear();

        Self::transition(&mut inner, TransportEvent::BeginLoad);
        inner.generation += 1;
        debug!("Loading narration for page {} ({} chars)", page + 1, payload.len());

        let ticket = LoadTicket {
            generation: inner.generation,
            page,
            payload: Arc::from(payload),
            decoder: self.decoder,
        };
        self.publish_locked(&inner);
        PlayStep::Load(ticket)
    }

    /// Apply a decode result if its load is still the live one
    pub fn finish_play(
        &self,
        ticket: LoadTicket,
        result: Result<(DecodedAudioBuffer, Duration), DecodeError>,
    ) -> PlayOutcome {
        let mut inner = self.lock();

        if inner.generation != ticket.generation || !inner.transport.is_loading() {
            self.logger.log_stale_load(ticket.page);
            return PlayOutcome::Superseded;
        }

        let (buffer, decode_time) = match result {
            Ok(decoded) => decoded,
            Err(e) => {
                self.logger.log_decode_failed(ticket.page, &e.to_string());
                return self.fail_load_locked(&mut inner, e.into());
            }
        };
        self.logger.update_decode_metrics(decode_time);

        let duration = buffer.duration_secs();
        inner.tracker.load(duration);
        inner.session = Some(PlaybackSession {
            buffer: Arc::new(buffer),
            page: ticket.page,
            active: None,
        });

        match Self::start_source_locked(&mut inner, 0.0) {
            Ok(()) => {
                Self::transition(&mut inner, TransportEvent::LoadSucceeded);
                self.logger.log_playback_started(ticket.page, duration);
                self.spawn_ticker_locked(&mut inner);
                self.publish_locked(&inner);
                PlayOutcome::Started
            }
            Err(e) => {
                self.logger.log_sink_failed(Some(ticket.page), &e.to_string());
                self.fail_load_locked(&mut inner, e.into())
            }
        }
    }

    /// Roll back a load whose `finish_play` will never run
    fn abandon_load(&self, generation: u64, page: usize) {
        let mut inner = self.lock();
        if inner.generation != generation || !inner.transport.is_loading() {
            return;
        }

        debug!("Narration load for page {} was abandoned", page + 1);
        self.logger.log_stale_load(page);
        Self::release_session(&mut inner);
        inner.tracker.clear();
        Self::transition(&mut inner, TransportEvent::LoadFailed);
        self.publish_locked(&inner);
    }

    /// Freeze the playhead and release the source; no-op unless playing
    pub fn pause(&self) -> bool {
        let mut inner = self.lock();
        self.refresh_locked(&mut inner);

        if !inner.transport.is_playing() {
            self.publish_locked(&inner);
            return false;
        }

        let now = inner.sink.as_ref().map_or(0.0, |sink| sink.now());
        let offset = inner.tracker.freeze(now);
        Self::release_source(&mut inner);
        Self::abort_ticker(&mut inner);
        Self::transition(&mut inner, TransportEvent::Pause);

        let page = inner.session.as_ref().map(|session| session.page);
        self.logger.log_playback_paused(page, offset);
        self.publish_locked(&inner);
        true
    }

    /// Tear everything down. Idempotent and safe from any state.
    pub fn stop(&self) {
        let mut inner = self.lock();
        self.stop_locked(&mut inner, "stopped");
        self.publish_locked(&inner);
    }

    /// Service the sink, apply completions and republish the playhead
    pub fn tick(&self) -> TickOutcome {
        let mut inner = self.lock();
        self.refresh_locked(&mut inner);

        let outcome = if inner.transport.is_playing() {
            let now = inner.sink.as_ref().map_or(0.0, |sink| sink.now());
            inner.tracker.sample(now);
            TickOutcome::Continue
        } else {
            TickOutcome::Halt
        };

        self.publish_locked(&inner);
        outcome
    }

    fn resume_locked(&self, inner: &mut EngineInner<P>) -> PlayOutcome {
        let offset = inner.tracker.offset();
        let page = inner.session.as_ref().map_or(0, |session| session.page);

        match Self::start_source_locked(inner, offset) {
            Ok(()) => {
                Self::transition(inner, TransportEvent::Resume);
                self.logger.log_playback_resumed(page, offset);
                self.spawn_ticker_locked(inner);
                PlayOutcome::Resumed
            }
            Err(e) => {
                self.logger.log_sink_failed(Some(page), &e.to_string());
                self.stop_locked(inner, "resume failed");
                PlayOutcome::Failed(e.into())
            }
        }
    }

    fn fail_load_locked(&self, inner: &mut EngineInner<P>, error: NarrationError) -> PlayOutcome {
        Self::release_session(inner);
        inner.tracker.clear();
        Self::transition(inner, TransportEvent::LoadFailed);
        self.publish_locked(inner);
        PlayOutcome::Failed(error)
    }

    /// Open the sink if needed and start the session buffer at `offset`
    fn start_source_locked(inner: &mut EngineInner<P>, offset: f64) -> Result<(), OutputSinkError> {
        let EngineInner {
            provider,
            sink,
            session,
            tracker,
            events_tx,
            next_source,
            ..
        } = inner;

        let session = session
            .as_mut()
            .ok_or_else(|| OutputSinkError::StreamError("No narration buffer loaded".to_string()))?;

        if sink.is_none() {
            *sink = Some(provider.open()?);
        }
        let sink = sink
            .as_mut()
            .ok_or_else(|| OutputSinkError::InitializationFailed("Output sink unavailable".to_string()))?;
        sink.resume()?;

        *next_source += 1;
        let (hook, handle) = completion_pair(SourceId(*next_source), events_tx.clone());
        sink.start_source(Arc::clone(&session.buffer), offset, hook)?;

        tracker.start(sink.now());
        session.active = Some(handle);
        Ok(())
    }

    fn stop_locked(&self, inner: &mut EngineInner<P>, reason: &str) {
        let was = inner.transport.state();
        let page = inner.session.as_ref().map(|session| session.page);

        inner.generation += 1;
        Self::abort_ticker(inner);
        Self::release_session(inner);
        Self::transition(inner, TransportEvent::Stop);
        inner.tracker.clear();

        // Completions queued before the stop belong to torn-down sources
        while inner.events_rx.try_recv().is_ok() {}

        if was != TransportState::Stopped {
            self.logger.log_playback_stopped(page, reason);
        }
    }

    /// Detach the live source's hook, then stop it
    fn release_source(inner: &mut EngineInner<P>) {
        if let Some(handle) = inner.session.as_mut().and_then(|session| session.active.take()) {
            handle.detach();
        }
        if let Some(sink) = inner.sink.as_mut() {
            if sink.has_active_source() {
                sink.stop_source();
            }
        }
    }

    fn release_session(inner: &mut EngineInner<P>) {
        Self::release_source(inner);
        inner.session = None;
    }

    fn abort_ticker(inner: &mut EngineInner<P>) {
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
    }

    /// Service the sink and apply any completion of the live source
    fn refresh_locked(&self, inner: &mut EngineInner<P>) {
        if let Some(sink) = inner.sink.as_mut() {
            sink.service();
        }

        while let Ok(event) = inner.events_rx.try_recv() {
            let SinkEvent::Ended { source } = event;
            let live = inner
                .session
                .as_ref()
                .and_then(|session| session.active.as_ref())
                .map_or(false, |handle| handle.source() == source);

            if live && inner.transport.is_playing() {
                self.complete_locked(inner);
            } else {
                trace!("Ignoring end of stale source {:?}", source);
            }
        }
    }

    /// Natural end: the source already finished, so nothing is stopped
    fn complete_locked(&self, inner: &mut EngineInner<P>) {
        let page = inner.session.take().map(|session| session.page);
        Self::transition(inner, TransportEvent::NaturalEnd);
        inner.tracker.rewind();
        Self::abort_ticker(inner);
        self.logger.log_playback_completed(page);
    }

    fn spawn_ticker_locked(&self, inner: &mut EngineInner<P>) {
        Self::abort_ticker(inner);

        let Some(period) = self.tick_interval else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            trace!("No tokio runtime; playhead advances on manual ticks only");
            return;
        };

        let engine = self.clone();
        inner.ticker = Some(runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if engine.tick() == TickOutcome::Halt {
                    break;
                }
            }
        }));
    }

    fn transition(inner: &mut EngineInner<P>, event: TransportEvent) {
        if let Err(e) = inner.transport.apply(event) {
            warn!("Ignoring transport event: {}", e);
        }
    }

    fn snapshot_of(inner: &EngineInner<P>) -> NarrationSnapshot {
        NarrationSnapshot {
            state: inner.transport.state(),
            playhead: inner.tracker.playhead(),
            duration: inner.tracker.duration(),
            narrated_page: inner.session.as_ref().map(|session| session.page),
        }
    }

    fn publish_locked(&self, inner: &EngineInner<P>) {
        let snapshot = Self::snapshot_of(inner);
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}
