use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::{
    AudioBuffer, AudioConfig, AudioInfo, AudioPlayer, DefaultSourceProvider, MicrophoneSelection,
    Notifier, Result, SlipnoteError, SourceKind, SourceProvider,
};

/// Summary of a finished recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingOutcome {
    pub path: PathBuf,
    pub samples: usize,
    /// Length of the written audio.
    pub duration: Duration,
    /// Wall-clock time between `start` and `stop`.
    pub elapsed: Duration,
    /// Source that produced the final chunks.
    pub source: SourceKind,
    pub fell_back: bool,
}

/// What the capture thread hands back when it exits.
struct CaptureReport {
    buffer: AudioBuffer,
    source: SourceKind,
    fell_back: bool,
}

struct Capture {
    active: Arc<AtomicBool>,
    thread: JoinHandle<CaptureReport>,
    started: Instant,
}

/// Narration recorder: `Idle -> Recording -> Idle`.
///
/// While recording, one background thread pulls chunks from the selected
/// source into a buffer it owns exclusively. `stop` clears the shared flag,
/// joins the thread and writes the buffer as WAV before returning, so no
/// capture happens after it returns.
pub struct AudioRecorder {
    audio: AudioConfig,
    provider: Arc<dyn SourceProvider>,
    notifier: Notifier,
    player: AudioPlayer,
    capture: Option<Capture>,
}

impl AudioRecorder {
    pub fn new(audio: AudioConfig, notifier: Notifier) -> Self {
        Self::with_provider(audio, Arc::new(DefaultSourceProvider), notifier)
    }

    pub fn with_provider(
        audio: AudioConfig,
        provider: Arc<dyn SourceProvider>,
        notifier: Notifier,
    ) -> Self {
        Self {
            audio,
            provider,
            notifier,
            player: AudioPlayer::new(),
            capture: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_some()
    }

    pub fn microphone(&self) -> MicrophoneSelection {
        self.audio.microphone
    }

    /// Takes effect on the next `start`.
    pub fn select_microphone(&mut self, selection: MicrophoneSelection) {
        self.audio.microphone = selection;
    }

    pub fn output_path(&self) -> &Path {
        &self.audio.output_path
    }

    pub fn start(&mut self) -> Result<()> {
        if self.capture.is_some() {
            return Err(SlipnoteError::AlreadyRecording);
        }

        let active = Arc::new(AtomicBool::new(true));
        let audio = self.audio.clone();
        let provider = self.provider.clone();
        let notifier = self.notifier.clone();
        let flag = active.clone();
        let started = Instant::now();
        let thread = thread::Builder::new()
            .name("slipnote-capture".into())
            .spawn(move || capture_loop(audio, provider.as_ref(), &flag, &notifier))?;

        tracing::debug!(microphone = ?self.audio.microphone, "capture thread started");
        self.capture = Some(Capture {
            active,
            thread,
            started,
        });
        Ok(())
    }

    /// Ends the recording and writes it to the configured output path.
    pub fn stop(&mut self) -> Result<RecordingOutcome> {
        let capture = self.capture.take().ok_or(SlipnoteError::NotRecording)?;
        capture.active.store(false, Ordering::Release);
        let elapsed = capture.started.elapsed();
        let report = capture
            .thread
            .join()
            .map_err(|_| SlipnoteError::msg("capture thread panicked"))?;

        if report.fell_back {
            self.audio.microphone = MicrophoneSelection::Synthetic;
        }

        report.buffer.write_wav(&self.audio.output_path)?;
        Ok(RecordingOutcome {
            path: self.audio.output_path.clone(),
            samples: report.buffer.len_samples(),
            duration: report.buffer.duration(),
            elapsed,
            source: report.source,
            fell_back: report.fell_back,
        })
    }

    /// Plays an audio file, typically the last recording or a loaded track.
    pub fn play(&mut self, path: impl AsRef<Path>) -> Result<AudioInfo> {
        self.player.play(path)
    }

    /// Silences whatever `play` started.
    pub fn stop_playback(&self) {
        self.player.stop();
    }

    pub fn is_playing_audio(&self) -> bool {
        !self.player.is_idle()
    }

    /// Validates that a file can be played later.
    pub fn probe(&self, path: impl AsRef<Path>) -> Result<AudioInfo> {
        self.player.load(path)
    }
}

impl Drop for AudioRecorder {
    fn drop(&mut self) {
        if let Some(capture) = self.capture.take() {
            capture.active.store(false, Ordering::Release);
            let _ = capture.thread.join();
        }
    }
}

impl std::fmt::Debug for AudioRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioRecorder")
            .field("audio", &self.audio)
            .field("recording", &self.is_recording())
            .finish()
    }
}

fn capture_loop(
    audio: AudioConfig,
    provider: &dyn SourceProvider,
    active: &AtomicBool,
    notifier: &Notifier,
) -> CaptureReport {
    let mut buffer = AudioBuffer::new(audio.sample_rate);
    let mut fell_back = false;
    // End of the audio already accounted for in `buffer`.
    let mut covered_until = Instant::now();
    let mut source = match provider.open(audio.microphone, &audio) {
        Ok(source) => source,
        Err(err) => {
            notifier.warn(format!("{err}. Falling back to the synthetic microphone."));
            fell_back = true;
            fill_gap(&mut buffer, Vec::new(), covered_until);
            provider.synthetic(&audio)
        }
    };
    notifier.info(format!(
        "Recording started (8-bit, mono) from {}.",
        source.describe()
    ));

    while active.load(Ordering::Acquire) {
        match source.read_chunk(audio.chunk_size) {
            Ok(chunk) => {
                buffer.push_chunk(chunk);
                covered_until = Instant::now();
            }
            Err(err) if source.kind() == SourceKind::Synthetic => {
                notifier.error(format!("synthetic microphone failed: {err}"));
                break;
            }
            Err(err) => {
                notifier.warn(format!("{err}. Falling back to the synthetic microphone."));
                fell_back = true;
                let leftover = source.drain();
                let padded = fill_gap(&mut buffer, leftover, covered_until);
                tracing::debug!(padded, "silence inserted for the stalled input");
                source = provider.synthetic(&audio);
            }
        }
    }

    CaptureReport {
        buffer,
        source: source.kind(),
        fell_back,
    }
}

/// Keeps the recording aligned with wall-clock time across a source switch:
/// samples the failed source still held are kept, and whatever time they do
/// not cover since `covered_until` is filled with silence. Returns the number
/// of silent samples added.
fn fill_gap(buffer: &mut AudioBuffer, leftover: Vec<u8>, covered_until: Instant) -> usize {
    let missing = (covered_until.elapsed().as_secs_f64() * buffer.sample_rate() as f64) as usize;
    let silence = missing.saturating_sub(leftover.len());
    buffer.push_chunk(leftover);
    buffer.push_silence(silence);
    silence
}
