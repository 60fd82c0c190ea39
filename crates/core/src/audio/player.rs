use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::{Result, SlipnoteError};

/// What a probe learned about a playable audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub duration: Option<Duration>,
}

/// Checks that `path` can be decoded. WAV files are read with `hound`;
/// anything else needs the `playback` decoders.
pub fn probe(path: &Path) -> Result<AudioInfo> {
    match hound::WavReader::open(path) {
        Ok(reader) => {
            let spec = reader.spec();
            let seconds = reader.duration() as f64 / spec.sample_rate.max(1) as f64;
            Ok(AudioInfo {
                sample_rate: spec.sample_rate,
                channels: spec.channels,
                duration: Some(Duration::from_secs_f64(seconds)),
            })
        }
        Err(wav_err) => probe_with_decoder(path).map_err(|err| {
            SlipnoteError::Playback(format!("{}: {wav_err}; {err}", path.display()))
        }),
    }
}

#[cfg(feature = "playback")]
fn probe_with_decoder(path: &Path) -> Result<AudioInfo> {
    use rodio::Source;

    let decoder = output::open_decoder(path)?;
    Ok(AudioInfo {
        sample_rate: decoder.sample_rate(),
        channels: decoder.channels(),
        duration: decoder.total_duration(),
    })
}

#[cfg(not(feature = "playback"))]
fn probe_with_decoder(_path: &Path) -> Result<AudioInfo> {
    Err(SlipnoteError::Playback(
        "only WAV files can be decoded without playback support".into(),
    ))
}

/// Plays audio files on the default output device. The device is opened on
/// first use and kept for the rest of the session.
#[derive(Default)]
pub struct AudioPlayer {
    #[cfg(feature = "playback")]
    output: Option<output::Output>,
}

impl AudioPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a file without playing it.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<AudioInfo> {
        probe(path.as_ref())
    }

    /// Starts playing `path`, replacing whatever was playing.
    pub fn play(&mut self, path: impl AsRef<Path>) -> Result<AudioInfo> {
        let path = path.as_ref();
        let info = probe(path)?;
        self.start(path)?;
        tracing::debug!(path = %path.display(), ?info, "playback started");
        Ok(info)
    }

    #[cfg(feature = "playback")]
    fn start(&mut self, path: &Path) -> Result<()> {
        if self.output.is_none() {
            self.output = Some(output::Output::open()?);
        }
        match &self.output {
            Some(output) => output.play(path),
            None => Err(SlipnoteError::Playback("no output device".into())),
        }
    }

    #[cfg(not(feature = "playback"))]
    fn start(&mut self, _path: &Path) -> Result<()> {
        Err(SlipnoteError::Playback(
            "audio output is not available in this build".into(),
        ))
    }

    pub fn stop(&self) {
        #[cfg(feature = "playback")]
        if let Some(output) = &self.output {
            output.sink.stop();
        }
    }

    /// True when nothing is queued for playback.
    pub fn is_idle(&self) -> bool {
        #[cfg(feature = "playback")]
        if let Some(output) = &self.output {
            return output.sink.empty();
        }
        true
    }
}

impl fmt::Debug for AudioPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioPlayer")
            .field("idle", &self.is_idle())
            .finish()
    }
}

#[cfg(feature = "playback")]
mod output {
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;

    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

    use crate::{Result, SlipnoteError};

    pub(super) struct Output {
        _stream: OutputStream,
        _handle: OutputStreamHandle,
        pub(super) sink: Sink,
    }

    impl Output {
        pub(super) fn open() -> Result<Self> {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| SlipnoteError::Playback(format!("no output device: {e}")))?;
            let sink = Sink::try_new(&handle)
                .map_err(|e| SlipnoteError::Playback(format!("cannot create sink: {e}")))?;
            Ok(Self {
                _stream: stream,
                _handle: handle,
                sink,
            })
        }

        pub(super) fn play(&self, path: &Path) -> Result<()> {
            let decoder = open_decoder(path)?;
            self.sink.stop();
            self.sink.append(decoder);
            self.sink.play();
            Ok(())
        }
    }

    pub(super) fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
        let file = File::open(path)
            .map_err(|e| SlipnoteError::Playback(format!("{}: {e}", path.display())))?;
        Decoder::new(BufReader::new(file))
            .map_err(|e| SlipnoteError::Playback(format!("{}: {e}", path.display())))
    }
}
