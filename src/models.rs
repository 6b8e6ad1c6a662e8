use crate::audio::transport::TransportState;
use crate::error::DecodeError;

/// Sample layout of a raw PCM narration payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmLayout {
    sample_rate: u32,
    channels: u16,
}

impl PcmLayout {
    /// 24 kHz mono, the format the narration generator produces
    pub const NARRATION: PcmLayout = PcmLayout {
        sample_rate: 24_000,
        channels: 1,
    };

    pub fn new(sample_rate: u32, channels: u16) -> Result<Self, DecodeError> {
        if sample_rate == 0 || channels == 0 {
            return Err(DecodeError::InvalidLayout { sample_rate, channels });
        }
        Ok(Self { sample_rate, channels })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Get a human-readable format description
    pub fn format_description(&self) -> String {
        format!(
            "16-bit PCM/{} Hz - {} channel{}",
            self.sample_rate,
            self.channels,
            if self.channels == 1 { "" } else { "s" }
        )
    }
}

impl Default for PcmLayout {
    fn default() -> Self {
        Self::NARRATION
    }
}

/// Decoded narration audio: interleaved samples normalized to [-1.0, 1.0).
///
/// Immutable once built; the session shares it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudioBuffer {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
    frames: usize,
}

impl DecodedAudioBuffer {
    pub(crate) fn from_interleaved(mut samples: Vec<f32>, layout: PcmLayout) -> Self {
        let channels = layout.channels();
        let frames = samples.len() / channels as usize;
        // Partial trailing frame is dropped
        samples.truncate(frames * channels as usize);
        Self {
            samples,
            channels,
            sample_rate: layout.sample_rate(),
            frames,
        }
    }

    /// Create an empty buffer
    pub fn empty(layout: PcmLayout) -> Self {
        Self::from_interleaved(Vec::new(), layout)
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Samples of a single channel
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = f32> + '_ {
        let stride = self.channels as usize;
        self.samples
            .iter()
            .skip(channel)
            .step_by(stride)
            .copied()
            .take(if channel < stride { self.frames } else { 0 })
    }

    /// Total duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Frame index for a position in seconds, clamped to the buffer
    pub fn frame_at(&self, seconds: f64) -> usize {
        if !seconds.is_finite() || seconds <= 0.0 {
            return 0;
        }
        ((seconds * self.sample_rate as f64) as usize).min(self.frames)
    }
}

/// State published by the narration engine for the UI layer
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationSnapshot {
    pub state: TransportState,
    /// Seconds
    pub playhead: f64,
    /// Seconds; valid once a buffer is ready
    pub duration: f64,
    /// Page the buffered audio belongs to
    pub narrated_page: Option<usize>,
}

impl NarrationSnapshot {
    pub fn stopped() -> Self {
        Self {
            state: TransportState::Stopped,
            playhead: 0.0,
            duration: 0.0,
            narrated_page: None,
        }
    }

    /// Get progress as a fraction (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.playhead / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn is_loading(&self) -> bool {
        self.state == TransportState::Loading
    }
}

impl Default for NarrationSnapshot {
    fn default() -> Self {
        Self::stopped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_rejects_zero_values() {
        assert!(PcmLayout::new(0, 1).is_err());
        assert!(PcmLayout::new(24_000, 0).is_err());
        assert_eq!(PcmLayout::new(24_000, 1).unwrap(), PcmLayout::NARRATION);
    }

    #[test]
    fn test_layout_description() {
        assert_eq!(PcmLayout::NARRATION.format_description(), "16-bit PCM/24000 Hz - 1 channel");
        let stereo = PcmLayout::new(48_000, 2).unwrap();
        assert_eq!(stereo.format_description(), "16-bit PCM/48000 Hz - 2 channels");
    }

    #[test]
    fn test_channel_iteration() {
        let layout = PcmLayout::new(10, 2).unwrap();
        let buffer = DecodedAudioBuffer::from_interleaved(vec![0.1, -0.1, 0.2, -0.2], layout);

        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.channel(0).collect::<Vec<_>>(), vec![0.1, 0.2]);
        assert_eq!(buffer.channel(1).collect::<Vec<_>>(), vec![-0.1, -0.2]);
        assert_eq!(buffer.channel(2).count(), 0);
        assert!((buffer.duration_secs() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_frame_at_clamps() {
        let buffer = DecodedAudioBuffer::from_interleaved(vec![0.0; 100], PcmLayout::new(100, 1).unwrap());
        assert_eq!(buffer.frame_at(-1.0), 0);
        assert_eq!(buffer.frame_at(0.5), 50);
        assert_eq!(buffer.frame_at(5.0), 100);
        assert_eq!(buffer.frame_at(f64::NAN), 0);
    }

    #[test]
    fn test_snapshot_progress() {
        let mut snapshot = NarrationSnapshot::stopped();
        assert_eq!(snapshot.progress(), 0.0);

        snapshot.duration = 4.0;
        snapshot.playhead = 1.0;
        assert!((snapshot.progress() - 0.25).abs() < 1e-12);
    }
}
