//! Sample sources, the in-memory recording buffer and audio file playback.
//!
//! Recordings are always mono, unsigned 8-bit PCM at the configured sample
//! rate. A [`SampleSource`] hands out fixed-size chunks of those bytes; the
//! [`SourceProvider`] decides once per recording which source backs the
//! capture loop.

#[cfg(feature = "device")]
mod device;
mod player;

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::{AudioConfig, MicrophoneSelection, Result};

pub use player::{AudioInfo, AudioPlayer};

/// Bit depth of every recording.
pub const BITS_PER_SAMPLE: u16 = 8;
/// Channel count of every recording.
pub const CHANNELS: u16 = 1;
/// Unsigned 8-bit midpoint.
pub const SILENCE: u8 = 128;

/// Input device as reported by the host, addressed by its enumeration index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDevice {
    pub index: usize,
    pub name: String,
}

/// Lists input devices. Empty when device capture is not compiled in.
pub fn input_devices() -> Result<Vec<InputDevice>> {
    #[cfg(feature = "device")]
    {
        device::list()
    }
    #[cfg(not(feature = "device"))]
    {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Device,
    Synthetic,
}

/// Produces chunks of 8-bit samples on demand.
///
/// `read_chunk` blocks until `chunk_size` samples are available, which paces
/// the capture loop at the source's sample rate.
pub trait SampleSource {
    fn read_chunk(&mut self, chunk_size: usize) -> Result<Vec<u8>>;

    /// Hands out samples captured but not yet returned by `read_chunk`.
    /// Called once before a failed source is replaced.
    fn drain(&mut self) -> Vec<u8> {
        Vec::new()
    }

    fn kind(&self) -> SourceKind;

    fn describe(&self) -> String;
}

/// Opens sample sources for the capture thread.
///
/// Sources are opened on the capture thread itself, so they need not be
/// `Send`; only the provider crosses threads.
pub trait SourceProvider: Send + Sync {
    fn open(
        &self,
        selection: MicrophoneSelection,
        audio: &AudioConfig,
    ) -> Result<Box<dyn SampleSource>>;

    /// Source used when the selected one cannot deliver.
    fn synthetic(&self, audio: &AudioConfig) -> Box<dyn SampleSource> {
        Box::new(SyntheticSource::new(audio.sample_rate))
    }
}

/// Real devices when compiled with the `device` feature, the synthetic
/// microphone otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSourceProvider;

impl SourceProvider for DefaultSourceProvider {
    fn open(
        &self,
        selection: MicrophoneSelection,
        audio: &AudioConfig,
    ) -> Result<Box<dyn SampleSource>> {
        match selection {
            MicrophoneSelection::Synthetic => Ok(self.synthetic(audio)),
            #[cfg(feature = "device")]
            MicrophoneSelection::Device { index } => {
                Ok(Box::new(device::DeviceSource::open(index, audio)?))
            }
            #[cfg(not(feature = "device"))]
            MicrophoneSelection::Device { index } => Err(crate::SlipnoteError::Device(format!(
                "device {index} requested but device capture is not available in this build"
            ))),
        }
    }
}

/// Holds a loop to the wall clock: sample `n` is not handed out before
/// `n / sample_rate` seconds have passed since the pacer started.
#[derive(Debug)]
pub(crate) struct Pacer {
    started: Instant,
    sample_rate: u32,
    emitted: u64,
}

impl Pacer {
    pub(crate) fn new(sample_rate: u32) -> Self {
        Self {
            started: Instant::now(),
            sample_rate: sample_rate.max(1),
            emitted: 0,
        }
    }

    /// Sleeps until `samples` more samples are due.
    pub(crate) fn wait_for(&mut self, samples: usize) {
        self.emitted += samples as u64;
        let due = self.started
            + Duration::from_secs_f64(self.emitted as f64 / self.sample_rate as f64);
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
    }
}

/// Stand-in microphone producing random 8-bit noise in real time.
#[derive(Debug)]
pub struct SyntheticSource {
    rng: fastrand::Rng,
    pacer: Pacer,
}

impl SyntheticSource {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            rng: fastrand::Rng::new(),
            pacer: Pacer::new(sample_rate),
        }
    }

    /// Deterministic variant for tests and reproducible captures.
    pub fn with_seed(sample_rate: u32, seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            pacer: Pacer::new(sample_rate),
        }
    }
}

impl SampleSource for SyntheticSource {
    fn read_chunk(&mut self, chunk_size: usize) -> Result<Vec<u8>> {
        self.pacer.wait_for(chunk_size);
        let mut chunk = vec![0u8; chunk_size];
        self.rng.fill(&mut chunk);
        Ok(chunk)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    fn describe(&self) -> String {
        "synthetic microphone".to_string()
    }
}

/// Samples accumulated by one recording, in capture order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioBuffer {
    sample_rate: u32,
    chunks: Vec<Vec<u8>>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            chunks: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    /// Appends `samples` of silence.
    pub fn push_silence(&mut self, samples: usize) {
        self.push_chunk(vec![SILENCE; samples]);
    }

    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    pub fn len_samples(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.len_samples() as f64 / self.sample_rate.max(1) as f64)
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Writes the samples as a mono 8-bit WAV file.
    pub fn write_wav(&self, path: impl AsRef<Path>) -> Result<()> {
        let spec = hound::WavSpec {
            channels: CHANNELS,
            sample_rate: self.sample_rate,
            bits_per_sample: BITS_PER_SAMPLE,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path.as_ref(), spec)?;
        for &sample in self.chunks.iter().flatten() {
            // hound stores 8-bit samples unsigned and expects them signed.
            writer.write_sample((sample as i16 - 128) as i8)?;
        }
        writer.finalize()?;
        Ok(())
    }
}
