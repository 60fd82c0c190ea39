//! Input devices through cpal.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig};
use tracing::{debug, info};

use super::{InputDevice, SampleSource, SourceKind};
use crate::{AudioConfig, Result, SlipnoteError};

pub(crate) fn list() -> Result<Vec<InputDevice>> {
    let host = cpal::default_host();
    let devices: Vec<InputDevice> = host
        .input_devices()
        .map_err(|e| SlipnoteError::Device(format!("failed to enumerate input devices: {e}")))?
        .enumerate()
        .map(|(index, device)| InputDevice {
            index,
            name: device.name().unwrap_or_else(|_| "Unknown".to_string()),
        })
        .collect();

    debug!("Found {} input devices", devices.len());
    Ok(devices)
}

/// Live microphone stream converted to unsigned 8-bit mono.
pub(crate) struct DeviceSource {
    name: String,
    _stream: Stream,
    samples: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    failure: Arc<Mutex<Option<String>>>,
    stall_timeout: Duration,
}

impl DeviceSource {
    pub(crate) fn open(index: usize, audio: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .input_devices()
            .map_err(|e| SlipnoteError::Device(format!("failed to enumerate input devices: {e}")))?
            .nth(index)
            .ok_or_else(|| SlipnoteError::Device(format!("no input device at index {index}")))?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = device
            .default_input_config()
            .map_err(|e| SlipnoteError::Device(format!("{name}: no input configuration: {e}")))?;
        let config = StreamConfig {
            channels: super::CHANNELS,
            sample_rate: cpal::SampleRate(audio.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = mpsc::channel();
        let failure = Arc::new(Mutex::new(None));
        let stream = match supported.sample_format() {
            SampleFormat::U8 => build::<u8, _>(&device, &config, tx, failure.clone(), |s| s),
            SampleFormat::I8 => {
                build::<i8, _>(&device, &config, tx, failure.clone(), |s| (s as i16 + 128) as u8)
            }
            SampleFormat::I16 => build::<i16, _>(&device, &config, tx, failure.clone(), |s| {
                ((s >> 8) + 128) as u8
            }),
            SampleFormat::U16 => {
                build::<u16, _>(&device, &config, tx, failure.clone(), |s| (s >> 8) as u8)
            }
            SampleFormat::F32 => build::<f32, _>(&device, &config, tx, failure.clone(), |s| {
                ((s.clamp(-1.0, 1.0) * 127.0).round() as i16 + 128) as u8
            }),
            other => {
                return Err(SlipnoteError::Device(format!(
                    "{name}: unsupported sample format {other:?}"
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| SlipnoteError::Device(format!("{name}: failed to start stream: {e}")))?;
        info!(device = %name, index, "input stream opened");

        Ok(Self {
            name,
            _stream: stream,
            samples: rx,
            pending: VecDeque::new(),
            failure,
            stall_timeout: audio.stall_timeout(),
        })
    }

    fn take_failure(&self) -> Option<String> {
        match self.failure.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => Some("stream error state poisoned".to_string()),
        }
    }
}

impl SampleSource for DeviceSource {
    fn read_chunk(&mut self, chunk_size: usize) -> Result<Vec<u8>> {
        while self.pending.len() < chunk_size {
            if let Some(failure) = self.take_failure() {
                return Err(SlipnoteError::Device(format!("{}: {failure}", self.name)));
            }
            match self.samples.recv_timeout(self.stall_timeout) {
                Ok(data) => self.pending.extend(data),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(SlipnoteError::Device(format!(
                        "{}: stopped delivering samples",
                        self.name
                    )))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SlipnoteError::Device(format!("{}: stream closed", self.name)))
                }
            }
        }
        Ok(self.pending.drain(..chunk_size).collect())
    }

    fn drain(&mut self) -> Vec<u8> {
        while let Ok(data) = self.samples.try_recv() {
            self.pending.extend(data);
        }
        self.pending.drain(..).collect()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Device
    }

    fn describe(&self) -> String {
        format!("input device `{}`", self.name)
    }
}

fn build<T, F>(
    device: &Device,
    config: &StreamConfig,
    tx: Sender<Vec<u8>>,
    failure: Arc<Mutex<Option<String>>>,
    convert: F,
) -> Result<Stream>
where
    T: SizedSample,
    F: Fn(T) -> u8 + Send + 'static,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(data.iter().map(|&s| convert(s)).collect());
            },
            move |err| {
                if let Ok(mut slot) = failure.lock() {
                    *slot = Some(err.to_string());
                }
            },
            None,
        )
        .map_err(|e| SlipnoteError::Device(format!("failed to open input stream: {e}")))
}
