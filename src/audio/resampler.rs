/*!
One-shot linear resampling and channel remixing for narration buffers.

Narration clips are short and fully decoded up front, so the whole tail of a
buffer (from the resume frame to the end) is rendered to the device layout in
a single pass before the source starts.

```ignore
use crate::audio::resampler::DeviceLayout;

let layout = DeviceLayout::new(48_000, 2);
let rendered = layout.render(&buffer, start_frame);
// 'rendered' is interleaved at 48kHz stereo.
```

Remix rules:
- mono source: copied to every device channel
- device mono: average of all source channels
- otherwise: source channel `i` feeds device channel `i`; extra device
  channels are silent
*/

use crate::models::DecodedAudioBuffer;

/// Sample rate and channel count of an output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLayout {
    pub sample_rate: u32,
    pub channels: u16,
}

impl DeviceLayout {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self { sample_rate, channels }
    }

    /// Number of device frames needed for `source_frames` at `source_rate`
    pub fn frames_for(&self, source_frames: usize, source_rate: u32) -> usize {
        if source_rate == 0 {
            return 0;
        }
        ((source_frames as u128 * self.sample_rate as u128) / source_rate as u128) as usize
    }

    /// Render `buffer` from `start_frame` to the end, interleaved in this layout
    pub fn render(&self, buffer: &DecodedAudioBuffer, start_frame: usize) -> Vec<f32> {
        let out_channels = self.channels as usize;
        if out_channels == 0 || self.sample_rate == 0 {
            return Vec::new();
        }

        let remixed = remix(buffer, start_frame, out_channels);
        resample(&remixed, buffer.sample_rate(), self.sample_rate, out_channels)
    }
}

/// Map source frames (from `start_frame`) onto `out_channels` channels
fn remix(buffer: &DecodedAudioBuffer, start_frame: usize, out_channels: usize) -> Vec<f32> {
    let in_channels = buffer.channels() as usize;
    let start = start_frame.min(buffer.frames()) * in_channels;
    let frames = &buffer.samples()[start..];

    if in_channels == out_channels {
        return frames.to_vec();
    }

    let mut out = Vec::with_capacity(frames.len() / in_channels * out_channels);
    for frame in frames.chunks_exact(in_channels) {
        if in_channels == 1 {
            out.extend(std::iter::repeat(frame[0]).take(out_channels));
        } else if out_channels == 1 {
            out.push(frame.iter().sum::<f32>() / in_channels as f32);
        } else {
            for ch in 0..out_channels {
                out.push(frame.get(ch).copied().unwrap_or(0.0));
            }
        }
    }
    out
}

/// Linear interpolation between rates for interleaved samples
fn resample(input: &[f32], src_rate: u32, dst_rate: u32, channels: usize) -> Vec<f32> {
    if src_rate == dst_rate || input.is_empty() {
        return input.to_vec();
    }

    let in_frames = input.len() / channels;
    let out_frames = ((in_frames as u128 * dst_rate as u128) / src_rate as u128) as usize;
    let step = src_rate as f64 / dst_rate as f64;
    let last = in_frames - 1;

    let mut out = Vec::with_capacity(out_frames * channels);
    for n in 0..out_frames {
        let pos = n as f64 * step;
        let i0 = (pos.floor() as usize).min(last);
        let i1 = (i0 + 1).min(last);
        let t = (pos - i0 as f64) as f32;

        for ch in 0..channels {
            let a = input[i0 * channels + ch];
            let b = input[i1 * channels + ch];
            out.push(a + (b - a) * t);
        }
    }
    out
}
