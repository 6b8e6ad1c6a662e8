//! Raw PCM narration payloads: base64 text carrying signed 16-bit
//! little-endian samples, interleaved by channel.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use log::{debug, trace};

use crate::error::DecodeError;
use crate::models::{DecodedAudioBuffer, PcmLayout};

/// Scale applied to i16 samples; -32768 maps to exactly -1.0
const I16_SCALE: f32 = 1.0 / 32768.0;

/// Standard alphabet, padding optional, like a browser's `atob`
const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode base64 narration text into raw bytes.
///
/// ASCII whitespace anywhere in the payload is ignored.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = FORGIVING.decode(compact.as_bytes())?;
    trace!("Decoded {} base64 chars into {} bytes", compact.len(), bytes.len());
    Ok(bytes)
}

/// Interpret bytes as 16-bit PCM and build a playable buffer.
///
/// A trailing odd byte is discarded, as is any partial frame at the end.
pub fn to_audio_buffer(bytes: &[u8], layout: PcmLayout) -> DecodedAudioBuffer {
    let usable = bytes.len() & !1;
    if usable != bytes.len() {
        debug!("Discarding trailing odd byte of PCM payload ({} bytes)", bytes.len());
    }

    let samples: Vec<f32> = bytes[..usable]
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 * I16_SCALE)
        .collect();

    DecodedAudioBuffer::from_interleaved(samples, layout)
}

/// Decoder for one payload layout
#[derive(Debug, Clone, Copy)]
pub struct PcmDecoder {
    layout: PcmLayout,
}

impl PcmDecoder {
    pub fn new(layout: PcmLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> PcmLayout {
        self.layout
    }

    /// base64 text -> decoded buffer
    pub fn decode(&self, payload: &str) -> Result<DecodedAudioBuffer, DecodeError> {
        let bytes = decode_base64(payload)?;
        Ok(to_audio_buffer(&bytes, self.layout))
    }
}

impl Default for PcmDecoder {
    fn default() -> Self {
        Self::new(PcmLayout::NARRATION)
    }
}
