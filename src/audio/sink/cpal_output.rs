//! Real audio output through cpal.
//!
//! The cpal stream is not `Send`, so it lives on a dedicated
//! `narration-output` thread for the sink's whole lifetime. The sink talks to
//! it through a command channel and a small block of shared state that the
//! audio callback reads: the active voice, the rendered-frame counter that
//! backs the sink clock, and the volume.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use log::{debug, error, info, warn};

use super::{CompletionHook, OutputSink, SinkProvider};
use crate::audio::device::DeviceManager;
use crate::audio::resampler::DeviceLayout;
use crate::error::OutputSinkError;
use crate::models::DecodedAudioBuffer;

enum OutputCommand {
    Resume,
    Shutdown,
}

/// Pre-rendered source being played by the audio callback
struct Voice {
    samples: Vec<f32>,
    cursor: usize,
    hook: CompletionHook,
}

struct OutputShared {
    voice: Mutex<Option<Voice>>,
    frames_rendered: AtomicU64,
    volume: AtomicU32,
}

impl OutputShared {
    fn new(volume: f32) -> Self {
        Self {
            voice: Mutex::new(None),
            frames_rendered: AtomicU64::new(0),
            volume: AtomicU32::new(volume.clamp(0.0, 1.0).to_bits()),
        }
    }

    /// Fill one callback buffer. Fires the voice's hook once it runs dry.
    fn render<T>(&self, data: &mut [T], channels: usize)
    where
        T: cpal::Sample + cpal::FromSample<f32>,
    {
        let volume = f32::from_bits(self.volume.load(Ordering::Relaxed));
        let mut written = 0;

        if let Ok(mut slot) = self.voice.lock() {
            let finished = match slot.as_mut() {
                Some(voice) => {
                    let available = voice.samples.len() - voice.cursor;
                    written = available.min(data.len());
                    let chunk = &voice.samples[voice.cursor..voice.cursor + written];
                    for (out, &sample) in data.iter_mut().zip(chunk) {
                        *out = T::from_sample(sample * volume);
                    }
                    voice.cursor += written;
                    voice.cursor >= voice.samples.len()
                }
                None => false,
            };

            if finished {
                if let Some(voice) = slot.take() {
                    voice.hook.fire();
                }
            }
        }

        for out in &mut data[written..] {
            *out = T::from_sample(0.0f32);
        }

        if channels > 0 {
            self.frames_rendered
                .fetch_add((data.len() / channels) as u64, Ordering::Relaxed);
        }
    }
}

/// Sink rendering narration to a cpal output device
pub struct CpalSink {
    layout: DeviceLayout,
    device_name: String,
    shared: Arc<OutputShared>,
    commands: Sender<OutputCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl CpalSink {
    /// Open `device_name` (or the default device) and start its stream
    pub fn open(device_name: Option<&str>, volume: f32) -> Result<Self, OutputSinkError> {
        let mut manager = DeviceManager::new()?;
        manager.select_device(device_name)?;
        let device_name = manager
            .current_device_name()?
            .unwrap_or_else(|| "default".to_string());
        let format = manager.output_format()?;
        let device = manager
            .current_device()
            .cloned()
            .ok_or(OutputSinkError::NoDefaultDevice)?;

        let shared = Arc::new(OutputShared::new(volume));
        let (command_sender, command_receiver) = mpsc::channel();
        let (ready_sender, ready_receiver) = mpsc::sync_channel(1);

        let stream_config: StreamConfig = format.config.config();
        let sample_format = format.sample_format;
        let thread_shared = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name("narration-output".to_string())
            .spawn(move || {
                run_output_thread(
                    device,
                    stream_config,
                    sample_format,
                    thread_shared,
                    command_receiver,
                    ready_sender,
                )
            })
            .map_err(|e| {
                OutputSinkError::InitializationFailed(format!("Failed to create output thread: {}", e))
            })?;

        let ready = ready_receiver.recv().map_err(|_| {
            OutputSinkError::InitializationFailed("Output thread exited during startup".to_string())
        });

        match ready.and_then(|result| result) {
            Ok(()) => {
                info!(
                    "Narration output ready on '{}' ({} Hz, {} ch)",
                    device_name, format.layout.sample_rate, format.layout.channels
                );
                Ok(Self {
                    layout: format.layout,
                    device_name,
                    shared,
                    commands: command_sender,
                    thread: Some(handle),
                })
            }
            Err(e) => {
                let _ = handle.join();
                Err(e)
            }
        }
    }

    pub fn layout(&self) -> DeviceLayout {
        self.layout
    }

    pub fn set_volume(&self, volume: f32) {
        self.shared
            .volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn send(&self, command: OutputCommand) -> Result<(), OutputSinkError> {
        self.commands
            .send(command)
            .map_err(|_| OutputSinkError::StreamError("Output thread is not running".to_string()))
    }
}

impl OutputSink for CpalSink {
    fn now(&self) -> f64 {
        self.shared.frames_rendered.load(Ordering::Relaxed) as f64 / self.layout.sample_rate as f64
    }

    fn resume(&mut self) -> Result<(), OutputSinkError> {
        self.send(OutputCommand::Resume)
    }

    fn start_source(
        &mut self,
        buffer: Arc<DecodedAudioBuffer>,
        offset: f64,
        hook: CompletionHook,
    ) -> Result<(), OutputSinkError> {
        let samples = self.layout.render(&buffer, buffer.frame_at(offset));

        let mut slot = self
            .shared
            .voice
            .lock()
            .map_err(|_| OutputSinkError::StreamError("Output state poisoned".to_string()))?;
        if slot.is_some() {
            return Err(OutputSinkError::SourceBusy);
        }

        debug!(
            "Starting source {:?}: {} samples from {:.3}s",
            hook.source(),
            samples.len(),
            offset
        );
        *slot = Some(Voice {
            samples,
            cursor: 0,
            hook,
        });
        Ok(())
    }

    fn stop_source(&mut self) {
        if let Ok(mut slot) = self.shared.voice.lock() {
            if let Some(voice) = slot.take() {
                debug!("Stopped source {:?}", voice.hook.source());
            }
        }
    }

    fn has_active_source(&self) -> bool {
        self.shared
            .voice
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    fn describe(&self) -> String {
        format!(
            "{} ({} Hz, {} ch)",
            self.device_name, self.layout.sample_rate, self.layout.channels
        )
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        let _ = self.commands.send(OutputCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Narration output thread panicked during shutdown");
            }
        }
    }
}

fn run_output_thread(
    device: cpal::Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    shared: Arc<OutputShared>,
    commands: Receiver<OutputCommand>,
    ready: SyncSender<Result<(), OutputSinkError>>,
) {
    // Set high priority for the output thread (platform-specific)
    #[cfg(target_os = "macos")]
    {
        unsafe {
            let thread = libc::pthread_self();
            let mut policy: libc::c_int = 0;
            let mut param: libc::sched_param = std::mem::zeroed();

            if libc::pthread_getschedparam(thread, &mut policy, &mut param) == 0 {
                param.sched_priority = 63;
                let _ = libc::pthread_setschedparam(thread, libc::SCHED_FIFO, &param);
            }
        }
    }

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, &shared),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, &shared),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, &shared),
        other => Err(OutputSinkError::UnsupportedFormat {
            format: format!("{:?}", other),
        }),
    };

    let stream = match stream.and_then(|stream| {
        stream
            .play()
            .map_err(|e| OutputSinkError::StreamError(format!("Failed to start stream: {}", e)))?;
        Ok(stream)
    }) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Blocks until a command arrives; a dropped sender also ends the thread
    while let Ok(command) = commands.recv() {
        match command {
            OutputCommand::Resume => {
                if let Err(e) = stream.play() {
                    error!("Failed to resume narration output: {}", e);
                }
            }
            OutputCommand::Shutdown => break,
        }
    }

    let _ = stream.pause();
    debug!("Narration output thread exiting");
}

/// Create a typed output stream
fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    shared: &Arc<OutputShared>,
) -> Result<Stream, OutputSinkError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    T: cpal::FromSample<f32>,
{
    let shared = Arc::clone(shared);
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                shared.render(data, channels);
            },
            move |err| {
                error!("Narration stream error: {}", err);
            },
            None,
        )
        .map_err(|e| OutputSinkError::StreamError(format!("Failed to build output stream: {}", e)))
}

/// Opens a [`CpalSink`] on first playback
#[derive(Debug, Clone)]
pub struct CpalProvider {
    device_name: Option<String>,
    volume: f32,
}

impl CpalProvider {
    pub fn new(device_name: Option<String>, volume: f32) -> Self {
        Self { device_name, volume }
    }
}

impl SinkProvider for CpalProvider {
    type Sink = CpalSink;

    fn open(&mut self) -> Result<CpalSink, OutputSinkError> {
        CpalSink::open(self.device_name.as_deref(), self.volume)
    }
}
