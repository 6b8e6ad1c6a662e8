pub mod clock;
pub mod device;
pub mod pcm;
pub mod position;
pub mod resampler;
pub mod session;
pub mod sink;
pub mod transport;

// Re-export the decode path
pub use pcm::{decode_base64, to_audio_buffer, PcmDecoder};

// Re-export transport and timing
pub use clock::{Clock, ManualClock, SystemClock};
pub use position::PlayheadTracker;
pub use transport::{Transport, TransportEvent, TransportState};

// Re-export the session manager
pub use session::{LoadTicket, NarrationEngine, PlayOutcome, PlayStep, TickOutcome};

// Re-export output sinks and device management
pub use device::{DeviceManager, OutputFormat};
pub use resampler::DeviceLayout;
pub use sink::{
    CpalProvider, CpalSink, OutputSink, SilentProvider, SilentSink, SinkEvent, SinkProbe,
    SinkProvider, SourceId,
};
