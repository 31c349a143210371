use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender, bounded};

use crate::config::AudioConfig;
use crate::error::{Result, TerpError};

/// List input device names for the `devices` subcommand.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| TerpError::Audio(format!("failed to enumerate input devices: {e}")))?;

    let mut names = Vec::new();
    for device in devices {
        if let Ok(desc) = device.description() {
            names.push(desc.name().to_string());
        }
    }
    Ok(names)
}

#[must_use]
pub fn default_input_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_input_device()
        .and_then(|d| d.description().ok())
        .map(|desc| desc.name().to_string())
}

/// Manages microphone capture via cpal.
///
/// The input callback runs on cpal's realtime thread. Each invocation takes
/// channel 0 of the interleaved buffer, converts it to normalized f32, and
/// hands the block to the control loop with a non-blocking `try_send`.
/// Ownership of the block moves with the send; the callback never holds on
/// to delivered audio, and a full channel drops the block rather than wait.
pub struct AudioCapture {
    stream: Stream,
    receiver: Receiver<Vec<f32>>,
    sample_rate: u32,
    dropped: Arc<AtomicUsize>,
}

impl AudioCapture {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(ref name) = config.device {
            host.input_devices()
                .map_err(|e| TerpError::Audio(format!("failed to enumerate input devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name().to_string())
                        .as_deref()
                        == Some(name.as_str())
                })
                .ok_or(TerpError::DeviceNotFound)?
        } else {
            host.default_input_device().ok_or(TerpError::DeviceNotFound)?
        };

        let supported = device
            .default_input_config()
            .map_err(|e| classify_device_error(&e.to_string()))?;

        let format = supported.sample_format();
        let sample_rate = supported.sample_rate();
        let channels = supported.channels();

        let stream_config = StreamConfig {
            channels,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        // Bounded channel; try_send in the audio callback to avoid blocking.
        let (tx, rx) = bounded::<Vec<f32>>(config.channel_capacity.max(1));
        let dropped = Arc::new(AtomicUsize::new(0));

        let err_fn = |err: cpal::StreamError| {
            tracing::error!("audio stream error: {err}");
        };

        let chans = usize::from(channels.max(1));
        let stream = match format {
            SampleFormat::F32 => {
                let producer = BlockProducer::new(tx, dropped.clone());
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        producer.deliver(data, chans, |sample| sample);
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::I16 => {
                let producer = BlockProducer::new(tx, dropped.clone());
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        producer.deliver(data, chans, |sample| f32::from(sample) / 32_768.0);
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::U16 => {
                let producer = BlockProducer::new(tx, dropped.clone());
                device.build_input_stream(
                    &stream_config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        producer.deliver(data, chans, |sample| {
                            (f32::from(sample) - 32_768.0) / 32_768.0
                        });
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(TerpError::Setup(format!(
                    "unsupported sample format: {other:?}"
                )));
            }
        }
        .map_err(|e| classify_device_error(&e.to_string()))?;

        Ok(Self {
            stream,
            receiver: rx,
            sample_rate,
            dropped,
        })
    }

    /// Start the audio stream.
    pub fn start(&self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| TerpError::Setup(format!("failed to start audio stream: {e}")))
    }

    /// Stop the audio stream. Dropping `self` afterwards releases the device
    /// and disconnects the block channel, which is the quiescence signal the
    /// session waits for before converting.
    pub fn pause(&self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| TerpError::Audio(format!("failed to pause audio stream: {e}")))
    }

    #[must_use]
    pub fn receiver(&self) -> Receiver<Vec<f32>> {
        self.receiver.clone()
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Blocks dropped because the channel was full.
    #[must_use]
    pub fn dropped_blocks(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Sender half used inside the realtime callback.
struct BlockProducer {
    tx: Sender<Vec<f32>>,
    dropped: Arc<AtomicUsize>,
}

impl BlockProducer {
    const fn new(tx: Sender<Vec<f32>>, dropped: Arc<AtomicUsize>) -> Self {
        Self { tx, dropped }
    }

    /// Extract channel 0, convert to f32, and hand the block off without
    /// blocking. An empty callback buffer sends nothing; gaps are simply
    /// absent from the accumulator rather than recorded as silence.
    fn deliver<T, F>(&self, data: &[T], channels: usize, convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        if data.is_empty() {
            return;
        }
        let block: Vec<f32> = data
            .iter()
            .step_by(channels.max(1))
            .copied()
            .map(convert)
            .collect();

        if let Err(crossbeam_channel::TrySendError::Full(_)) = self.tx.try_send(block) {
            // Disconnected means the session is tearing down; only count
            // drops caused by a full channel.
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Map backend error text onto the session error kinds. cpal reports
/// permission problems as backend-specific strings, so this is a best-effort
/// match; anything unrecognized is a setup failure.
fn classify_device_error(message: &str) -> TerpError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("access") {
        TerpError::PermissionDenied
    } else if lower.contains("no longer available") || lower.contains("not found") {
        TerpError::DeviceNotFound
    } else {
        TerpError::Setup(message.to_string())
    }
}
