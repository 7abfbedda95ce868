//! Microphone Capture Source
//!
//! The middle tier of the audio activation chain: when no host playback
//! element is reachable, capture the default input device with cpal and
//! feed mono samples into the analysis graph through a lock-free ring
//! buffer. The cpal callback runs on a real audio thread; the graph pulls
//! from the consumer side on the control thread.
//!
//! The callback path does no allocation and no logging; stream errors are
//! forwarded over a channel and reported when the graph next pulls.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use crossbeam_channel::{unbounded, Receiver};
use rtrb::{Consumer, RingBuffer};
use tracing::{info, warn};

use kaleido_dsp::SampleSource;

use crate::error::{HostError, HostResult};

/// Ring capacity in mono samples (~1 second at 48 kHz)
const RING_CAPACITY: usize = 48_000;

enum CaptureEvent {
    StreamError(String),
}

/// cpal-backed microphone source. Holding the value keeps the input
/// stream alive; dropping it stops capture.
pub struct MicrophoneSource {
    _stream: Stream,
    consumer: Consumer<f32>,
    events: Receiver<CaptureEvent>,
}

impl MicrophoneSource {
    /// Open the default input device and start capturing
    pub fn open() -> HostResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| HostError::DeviceNotFound("no default input device".into()))?;
        let config = device
            .default_input_config()
            .map_err(|e| HostError::StreamBuild(e.to_string()))?;

        if config.sample_format() != SampleFormat::F32 {
            return Err(HostError::StreamBuild(format!(
                "unsupported input sample format {:?}",
                config.sample_format()
            )));
        }

        let channels = config.channels() as usize;
        let (mut producer, consumer) = RingBuffer::<f32>::new(RING_CAPACITY);
        let (event_tx, event_rx) = unbounded();
        let error_tx = event_tx.clone();

        let stream = device
            .build_input_stream(
                &config.into(),
                move |data: &[f32], _| {
                    // Mix to mono; if the ring is full, drop the rest of the
                    // callback rather than block the audio thread
                    for frame in data.chunks(channels) {
                        let mono = frame.iter().sum::<f32>() / channels as f32;
                        if producer.push(mono).is_err() {
                            break;
                        }
                    }
                },
                move |e| {
                    let _ = error_tx.send(CaptureEvent::StreamError(e.to_string()));
                },
                None,
            )
            .map_err(|e| HostError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| HostError::StreamBuild(e.to_string()))?;

        info!(
            "Microphone capture started ({} channel(s))",
            channels
        );
        Ok(Self {
            _stream: stream,
            consumer,
            events: event_rx,
        })
    }
}

impl SampleSource for MicrophoneSource {
    fn name(&self) -> &'static str {
        "microphone"
    }

    fn fill(&mut self, block: &mut [f32]) -> usize {
        for CaptureEvent::StreamError(message) in self.events.try_iter() {
            warn!("Microphone stream error: {message}");
        }

        let mut written = 0;
        while written < block.len() {
            match self.consumer.pop() {
                Ok(sample) => {
                    block[written] = sample;
                    written += 1;
                }
                Err(_) => break,
            }
        }
        written
    }
}
