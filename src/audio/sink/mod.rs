//! Output sinks: where decoded narration is rendered.
//!
//! A sink plays at most one source at a time. Completion is reported through
//! a [`CompletionHook`] that delivers [`SinkEvent::Ended`] on a channel; the
//! owner keeps the paired [`CompletionHandle`] and detaches it before any
//! explicit stop so a finished source can never race an interruption.

pub mod cpal_output;
pub mod silent;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::error::OutputSinkError;
use crate::models::DecodedAudioBuffer;

pub use cpal_output::{CpalProvider, CpalSink};
pub use silent::{SilentProvider, SilentSink, SinkProbe};

/// Identifies one started source; every start or resume gets a fresh id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u64);

/// Notifications from a sink to its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkEvent {
    /// The source played through to the end of its buffer
    Ended { source: SourceId },
}

/// One-shot end-of-audio callback handed to the sink with each source
#[derive(Debug)]
pub struct CompletionHook {
    source: SourceId,
    attached: Arc<AtomicBool>,
    sender: UnboundedSender<SinkEvent>,
}

/// Owner's side of a [`CompletionHook`]
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    source: SourceId,
    attached: Arc<AtomicBool>,
}

/// Create a connected hook/handle pair for `source`
pub fn completion_pair(
    source: SourceId,
    sender: UnboundedSender<SinkEvent>,
) -> (CompletionHook, CompletionHandle) {
    let attached = Arc::new(AtomicBool::new(true));
    let hook = CompletionHook {
        source,
        attached: Arc::clone(&attached),
        sender,
    };
    (hook, CompletionHandle { source, attached })
}

impl CompletionHook {
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Deliver `Ended`; returns false if detached or already fired
    pub fn fire(&self) -> bool {
        if !self.attached.swap(false, Ordering::AcqRel) {
            return false;
        }
        // Receiver gone means the owner was dropped; nothing to notify
        self.sender.send(SinkEvent::Ended { source: self.source }).is_ok()
    }
}

impl CompletionHandle {
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Prevent the hook from firing. Idempotent.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}

/// Host audio output
pub trait OutputSink: Send {
    /// Monotonic sink clock in seconds
    fn now(&self) -> f64;

    /// Lift a host-imposed suspension; no-op when already running
    fn resume(&mut self) -> Result<(), OutputSinkError>;

    /// Start rendering `buffer` from `offset` seconds.
    ///
    /// Fails with `SourceBusy` if a source is still active.
    fn start_source(
        &mut self,
        buffer: Arc<DecodedAudioBuffer>,
        offset: f64,
        hook: CompletionHook,
    ) -> Result<(), OutputSinkError>;

    /// Stop the active source, if any. Never fires its hook.
    fn stop_source(&mut self);

    /// Whether a source is currently rendering
    fn has_active_source(&self) -> bool;

    /// Periodic housekeeping, called from every engine tick
    fn service(&mut self) {}

    /// Human-readable sink description for status output
    fn describe(&self) -> String;
}

/// Lazily creates the sink on first playback
pub trait SinkProvider: Send + 'static {
    type Sink: OutputSink + 'static;

    fn open(&mut self) -> Result<Self::Sink, OutputSinkError>;
}
