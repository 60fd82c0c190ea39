//! Editing session: routes shell intents to the frame store, the recorder
//! and the preview sequencer, and reports every outcome as a notice.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    AudioRecorder, DefaultSourceProvider, FrameBuffer, FrameStore, HeaderStyle, InputDevice,
    MicrophoneSelection, NoticeLog, Notifier, PlaybackSequencer, Point, ProjectCodec,
    RecordingOutcome, Result, SequencerTick, SessionConfig, SourceProvider,
};

/// User intent delivered by the shell. Optional payloads carry the answer of
/// a dialog; `None` means the user cancelled it.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    NewProject,
    AddFrame,
    PreviousFrame,
    NextFrame,
    ClearFrame,
    ToggleOnionSkin,
    /// Brush stroke through consecutive pointer positions.
    Stroke(Vec<Point>),
    /// Line tool commit.
    Line { from: Point, to: Point },
    PlayAnimation,
    ToggleRecording,
    PlayRecording,
    LoadAudio(Option<PathBuf>),
    PlayLoadedAudio,
    StopAudio,
    SaveProject(Option<PathBuf>),
    OpenProject(Option<PathBuf>),
    SetFps(Option<i64>),
    SelectMicrophone {
        devices: Vec<InputDevice>,
        choice: Option<usize>,
    },
    Quit,
}

/// Whether the shell should keep running after an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Studio {
    config: SessionConfig,
    store: FrameStore,
    recorder: AudioRecorder,
    sequencer: PlaybackSequencer,
    codec: ProjectCodec,
    notifier: Notifier,
    loaded_audio: Option<PathBuf>,
    last_recording: Option<RecordingOutcome>,
}

impl Studio {
    pub fn new(config: SessionConfig, notifier: Notifier) -> Result<Self> {
        Self::with_provider(config, Arc::new(DefaultSourceProvider), notifier)
    }

    /// Session reporting into a fresh [`NoticeLog`] sized by
    /// `config.notices`; the log is returned for the shell to display.
    pub fn with_notice_log(config: SessionConfig) -> Result<(Self, Arc<NoticeLog>)> {
        let log = Arc::new(NoticeLog::new(config.notices.capacity));
        let studio = Self::new(config, Notifier::new(log.clone()))?;
        Ok((studio, log))
    }

    pub fn with_provider(
        config: SessionConfig,
        provider: Arc<dyn SourceProvider>,
        notifier: Notifier,
    ) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.project.directory)?;

        let header = if config.project.tagged_header {
            HeaderStyle::Tagged
        } else {
            HeaderStyle::Plain
        };
        let codec = ProjectCodec::new()
            .with_header(header)
            .with_background(config.canvas.background);

        let studio = Self {
            store: blank_store(&config),
            recorder: AudioRecorder::with_provider(config.audio.clone(), provider, notifier.clone()),
            sequencer: PlaybackSequencer::new(config.playback.fps),
            codec,
            notifier,
            loaded_audio: None,
            last_recording: None,
            config,
        };
        studio.notifier.info(format!(
            "Slipnote Studio started ({}x{} canvas, {} fps).",
            studio.config.canvas.width, studio.config.canvas.height, studio.config.playback.fps
        ));
        Ok(studio)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn is_previewing(&self) -> bool {
        self.sequencer.is_playing()
    }

    pub fn microphone(&self) -> MicrophoneSelection {
        self.recorder.microphone()
    }

    pub fn is_playing_audio(&self) -> bool {
        self.recorder.is_playing_audio()
    }

    pub fn loaded_audio(&self) -> Option<&Path> {
        self.loaded_audio.as_deref()
    }

    pub fn last_recording(&self) -> Option<&RecordingOutcome> {
        self.last_recording.as_ref()
    }

    /// Project files in the session's project directory.
    pub fn projects(&self) -> Result<Vec<PathBuf>> {
        crate::project::list_projects(&self.config.project.directory, &self.config.project.extension)
    }

    /// Applies one intent. Recoverable failures become error notices; only
    /// resource exhaustion is returned to the caller.
    pub fn dispatch(&mut self, intent: Intent) -> Result<Flow> {
        if self.sequencer.is_playing() && !matches!(intent, Intent::PlayAnimation) {
            self.sequencer.cancel();
            tracing::debug!("preview cancelled by input");
        }

        match intent {
            Intent::NewProject => {
                self.store.replace_with(blank_store(&self.config));
                self.notifier.info("New project created.");
            }
            Intent::AddFrame => {
                let index = self.store.add_frame();
                self.notifier
                    .info(format!("Added frame {} of {}.", index + 1, self.store.len()));
            }
            Intent::PreviousFrame => {
                self.store.goto_previous();
            }
            Intent::NextFrame => {
                self.store.goto_next();
            }
            Intent::ClearFrame => self.store.clear_current(),
            Intent::ToggleOnionSkin => {
                let enabled = self.store.toggle_onion_skin();
                self.notifier.info(format!(
                    "Onion skin {}.",
                    if enabled { "enabled" } else { "disabled" }
                ));
            }
            Intent::Stroke(points) => {
                let canvas = &self.config.canvas;
                self.store.stroke(&points, canvas.pen_color, canvas.pen_thickness);
            }
            Intent::Line { from, to } => {
                let canvas = &self.config.canvas;
                self.store.line(from, to, canvas.pen_color, canvas.pen_thickness);
            }
            Intent::PlayAnimation => {
                self.sequencer.start(self.store.len());
                self.notifier.info(format!(
                    "Playing {} frames at {} fps.",
                    self.store.len(),
                    self.sequencer.fps()
                ));
            }
            Intent::ToggleRecording => self.toggle_recording()?,
            Intent::PlayRecording => {
                let path = self.recorder.output_path().to_path_buf();
                let played = self.recorder.play(&path);
                if self.report(played, "Could not play recorded audio")?.is_some() {
                    self.notifier
                        .info(format!("Playing recorded audio from {}.", path.display()));
                }
            }
            Intent::LoadAudio(None) => self.notifier.info("No file selected."),
            Intent::LoadAudio(Some(path)) => {
                if let Some(info) = self.report(self.recorder.probe(&path), "Could not load the audio file")? {
                    self.notifier.info(format!(
                        "Audio file loaded: {} ({} Hz, {} ch).",
                        path.display(),
                        info.sample_rate,
                        info.channels
                    ));
                    self.loaded_audio = Some(path);
                }
            }
            Intent::PlayLoadedAudio => match self.loaded_audio.clone() {
                Some(path) => {
                    let played = self.recorder.play(&path);
                    if self.report(played, "Could not play loaded audio")?.is_some() {
                        self.notifier.info(format!("Playing loaded audio: {}.", path.display()));
                    }
                }
                None => self.notifier.info("No audio file loaded."),
            },
            Intent::StopAudio => {
                self.recorder.stop_playback();
                self.notifier.info("Audio playback stopped.");
            }
            Intent::SaveProject(None) => self.notifier.info("Save cancelled."),
            Intent::SaveProject(Some(path)) => {
                if self.report(self.codec.save(&self.store, &path), "Failed to save slipnote")?.is_some() {
                    self.notifier.info(format!("Slipnote saved to {}.", path.display()));
                }
            }
            Intent::OpenProject(None) => self.notifier.info("Open cancelled."),
            Intent::OpenProject(Some(path)) => {
                if let Some(loaded) = self.report(self.codec.load(&path), "Failed to load slipnote")? {
                    self.store.replace_with(loaded);
                    self.notifier.info(format!(
                        "Loaded slipnote from {} ({} frames).",
                        path.display(),
                        self.store.len()
                    ));
                }
            }
            Intent::SetFps(requested) => self.set_fps(requested),
            Intent::SelectMicrophone { devices, choice } => self.select_microphone(&devices, choice),
            Intent::Quit => {
                self.shutdown()?;
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    /// Advances an active preview by `delta` seconds.
    pub fn tick(&mut self, delta: f32) -> SequencerTick {
        let tick = self.sequencer.tick(delta);
        if tick == SequencerTick::Finished {
            self.notifier.info("Playback finished.");
        }
        tick
    }

    /// What the canvas should show right now.
    pub fn display(&self) -> Cow<'_, FrameBuffer> {
        match self.sequencer.frame(&self.store) {
            Some(frame) => Cow::Borrowed(frame),
            None => self.store.render_current(self.store.onion_skin()),
        }
    }

    /// Rubber-band preview for the line tool while it is dragged.
    pub fn preview_line(&self, from: Point, to: Point) -> FrameBuffer {
        let canvas = &self.config.canvas;
        self.store
            .preview_line(from, to, canvas.pen_color, canvas.pen_thickness)
    }

    /// Stops any in-flight recording so its file is complete before exit.
    pub fn shutdown(&mut self) -> Result<()> {
        self.sequencer.cancel();
        if self.recorder.is_recording() {
            self.finish_recording()?;
        }
        Ok(())
    }

    fn toggle_recording(&mut self) -> Result<()> {
        if self.recorder.is_recording() {
            self.finish_recording()
        } else {
            let started = self.recorder.start();
            self.report(started, "Could not start recording")?;
            Ok(())
        }
    }

    fn finish_recording(&mut self) -> Result<()> {
        let stopped = self.recorder.stop();
        if let Some(outcome) = self.report(stopped, "Recording failed")? {
            self.notifier.info(format!(
                "Recording stopped. Audio saved to {} ({:.1}s).",
                outcome.path.display(),
                outcome.duration.as_secs_f32()
            ));
            if outcome.fell_back {
                self.config.audio.microphone = MicrophoneSelection::Synthetic;
                self.notifier
                    .warn("The selected microphone failed; the synthetic microphone stays selected.");
            }
            self.last_recording = Some(outcome);
        }
        Ok(())
    }

    fn set_fps(&mut self, requested: Option<i64>) {
        let fps = self.config.playback.clamp_fps(requested);
        match requested {
            Some(_) => {
                self.config.playback.fps = fps;
                self.sequencer.set_fps(fps);
                self.notifier.info(format!("FPS set to {fps}."));
            }
            None => self
                .notifier
                .info(format!("FPS selection cancelled; current FPS remains {fps}.")),
        }
    }

    fn select_microphone(&mut self, devices: &[InputDevice], choice: Option<usize>) {
        if devices.is_empty() {
            self.notifier.error("No input devices found.");
            return;
        }

        let selection = match choice {
            None => {
                self.notifier
                    .info("No microphone selected; using the synthetic microphone.");
                MicrophoneSelection::Synthetic
            }
            Some(index) => match devices.iter().find(|d| d.index == index) {
                Some(device) => {
                    self.notifier
                        .info(format!("Selected microphone device {index}: {}.", device.name));
                    MicrophoneSelection::Device { index }
                }
                None => {
                    self.notifier
                        .error(format!("No input device with index {index}."));
                    return;
                }
            },
        };

        self.config.audio.microphone = selection;
        self.recorder.select_microphone(selection);
        if self.recorder.is_recording() {
            self.notifier
                .info("The new microphone is used from the next recording.");
        }
    }

    fn report<T>(&self, result: Result<T>, context: &str) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_recoverable() => {
                self.notifier.error(format!("{context}: {err}"));
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("frames", &self.store.len())
            .field("current", &self.store.current_index())
            .field("recorder", &self.recorder)
            .field("sequencer", &self.sequencer)
            .finish()
    }
}

fn blank_store(config: &SessionConfig) -> FrameStore {
    FrameStore::with_background(
        config.canvas.width,
        config.canvas.height,
        config.canvas.background,
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{Color, NoticeLevel, NoticeLog};

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        log: Arc<NoticeLog>,
        studio: Studio,
    }

    fn session_config(root: &Path) -> SessionConfig {
        let mut config = SessionConfig::default();
        config.canvas.width = 40;
        config.canvas.height = 24;
        config.audio.sample_rate = 8_000;
        config.audio.chunk_size = 80;
        config.audio.output_path = root.join("recorded.wav");
        config.project.directory = root.join("slipnotes");
        config
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(DefaultSourceProvider))
    }

    fn fixture_with(provider: Arc<dyn SourceProvider>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let log = Arc::new(NoticeLog::new(32));
        let studio =
            Studio::with_provider(session_config(&root), provider, Notifier::new(log.clone()))
                .unwrap();
        Fixture {
            _dir: dir,
            root,
            log,
            studio,
        }
    }

    fn last_notice(fixture: &Fixture) -> crate::Notice {
        fixture.log.recent().pop().unwrap()
    }

    fn send(fixture: &mut Fixture, intent: Intent) -> Flow {
        fixture.studio.dispatch(intent).unwrap()
    }

    #[test]
    fn creates_project_directory_on_start() {
        let fixture = fixture();
        assert!(fixture.root.join("slipnotes").is_dir());
        assert!(fixture.studio.projects().unwrap().is_empty());
    }

    #[test]
    fn drawing_uses_the_configured_pen() {
        let mut fixture = fixture();
        send(
            &mut fixture,
            Intent::Stroke(vec![Point::new(1, 1), Point::new(10, 1)]),
        );
        send(
            &mut fixture,
            Intent::Line {
                from: Point::new(0, 20),
                to: Point::new(39, 20),
            },
        );
        let frame = fixture.studio.store().current();
        assert_eq!(frame.pixel(5, 1), Some(Color::BLACK));
        assert_eq!(frame.pixel(5, 2), Some(Color::BLACK));
        assert_eq!(frame.pixel(39, 21), Some(Color::BLACK));
    }

    #[test]
    fn add_frame_then_navigate() {
        let mut fixture = fixture();
        send(&mut fixture, Intent::AddFrame);
        assert_eq!(fixture.studio.store().len(), 2);
        assert_eq!(fixture.studio.store().current_index(), 1);
        send(&mut fixture, Intent::NextFrame);
        assert_eq!(fixture.studio.store().current_index(), 1);
        send(&mut fixture, Intent::PreviousFrame);
        send(&mut fixture, Intent::PreviousFrame);
        assert_eq!(fixture.studio.store().current_index(), 0);
    }

    #[test]
    fn save_and_reopen_round_trips() {
        let mut fixture = fixture();
        let path = fixture.root.join("slipnotes").join("walk.slip");
        send(
            &mut fixture,
            Intent::Line {
                from: Point::new(0, 0),
                to: Point::new(20, 20),
            },
        );
        send(&mut fixture, Intent::AddFrame);
        send(&mut fixture, Intent::ClearFrame);
        let saved = fixture.studio.store().frames().to_vec();

        send(&mut fixture, Intent::SaveProject(Some(path.clone())));
        send(&mut fixture, Intent::NewProject);
        assert_eq!(fixture.studio.store().len(), 1);

        send(&mut fixture, Intent::OpenProject(Some(path.clone())));
        assert_eq!(fixture.studio.store().frames(), saved.as_slice());
        assert_eq!(fixture.studio.store().current_index(), 0);
        assert_eq!(fixture.studio.projects().unwrap(), vec![path]);
    }

    #[test]
    fn corrupt_project_leaves_store_untouched() {
        let mut fixture = fixture();
        let path = fixture.root.join("broken.slip");
        std::fs::write(&path, b"\x02\x00\x00\x00garbage").unwrap();
        send(&mut fixture, Intent::AddFrame);

        assert_eq!(send(&mut fixture, Intent::OpenProject(Some(path))), Flow::Continue);
        assert_eq!(fixture.studio.store().len(), 2);
        assert_eq!(fixture.studio.store().current_index(), 1);
        let notice = last_notice(&fixture);
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.contains("Failed to load slipnote"));
    }

    #[test]
    fn cancelled_dialogs_are_no_ops() {
        let mut fixture = fixture();
        send(&mut fixture, Intent::SaveProject(None));
        assert_eq!(last_notice(&fixture).message, "Save cancelled.");
        send(&mut fixture, Intent::SetFps(None));
        assert_eq!(fixture.studio.config().playback.fps, 30);
        send(&mut fixture, Intent::LoadAudio(None));
        assert!(fixture.studio.loaded_audio().is_none());
        send(&mut fixture, Intent::PlayLoadedAudio);
        assert_eq!(last_notice(&fixture).message, "No audio file loaded.");
    }

    #[test]
    fn fps_prompt_is_clamped() {
        let mut fixture = fixture();
        send(&mut fixture, Intent::SetFps(Some(90)));
        assert_eq!(fixture.studio.config().playback.fps, 30);
        send(&mut fixture, Intent::SetFps(Some(8)));
        assert_eq!(fixture.studio.config().playback.fps, 8);
        assert_eq!(last_notice(&fixture).message, "FPS set to 8.");
    }

    #[test]
    fn preview_plays_once_and_is_cancelled_by_input() {
        let mut fixture = fixture();
        send(&mut fixture, Intent::SetFps(Some(10)));
        send(&mut fixture, Intent::AddFrame);
        send(&mut fixture, Intent::ClearFrame);

        send(&mut fixture, Intent::PlayAnimation);
        assert!(fixture.studio.is_previewing());
        assert_eq!(fixture.studio.tick(0.15), SequencerTick::Show(1));
        assert!(std::ptr::eq(
            fixture.studio.display().as_ref(),
            &fixture.studio.store().frames()[1]
        ));
        assert_eq!(fixture.studio.tick(0.1), SequencerTick::Finished);
        assert!(!fixture.studio.is_previewing());

        send(&mut fixture, Intent::PlayAnimation);
        send(&mut fixture, Intent::ToggleOnionSkin);
        assert!(!fixture.studio.is_previewing());
        assert_eq!(fixture.studio.tick(0.1), SequencerTick::Idle);
    }

    #[test]
    fn microphone_selection_follows_prompt_contract() {
        let mut fixture = fixture();
        let devices = vec![InputDevice {
            index: 3,
            name: "USB mic".into(),
        }];

        send(
            &mut fixture,
            Intent::SelectMicrophone {
                devices: Vec::new(),
                choice: Some(0),
            },
        );
        assert_eq!(fixture.studio.microphone(), MicrophoneSelection::Synthetic);
        assert_eq!(last_notice(&fixture).level, NoticeLevel::Error);

        send(
            &mut fixture,
            Intent::SelectMicrophone {
                devices: devices.clone(),
                choice: Some(3),
            },
        );
        assert_eq!(fixture.studio.microphone(), MicrophoneSelection::Device { index: 3 });

        send(
            &mut fixture,
            Intent::SelectMicrophone {
                devices: devices.clone(),
                choice: Some(9),
            },
        );
        assert_eq!(fixture.studio.microphone(), MicrophoneSelection::Device { index: 3 });

        send(&mut fixture, Intent::SelectMicrophone { devices, choice: None });
        assert_eq!(fixture.studio.microphone(), MicrophoneSelection::Synthetic);
    }

    #[test]
    fn recording_toggle_writes_audio_and_loads_it() {
        let mut fixture = fixture();
        send(&mut fixture, Intent::ToggleRecording);
        assert!(fixture.studio.is_recording());
        std::thread::sleep(Duration::from_millis(60));
        send(&mut fixture, Intent::ToggleRecording);
        assert!(!fixture.studio.is_recording());

        let recorded = fixture.root.join("recorded.wav");
        assert!(recorded.is_file());
        assert!(fixture.studio.last_recording().unwrap().samples > 0);

        send(&mut fixture, Intent::LoadAudio(Some(recorded.clone())));
        assert_eq!(fixture.studio.loaded_audio(), Some(recorded.as_path()));
    }

    #[test]
    fn bad_audio_file_is_reported_not_loaded() {
        let mut fixture = fixture();
        let path = fixture.root.join("noise.mp3");
        std::fs::write(&path, b"not audio").unwrap();
        send(&mut fixture, Intent::LoadAudio(Some(path)));
        assert!(fixture.studio.loaded_audio().is_none());
        assert!(last_notice(&fixture).message.starts_with("Could not load the audio file"));
    }

    /// Provider whose input devices never open.
    struct NoDevices;

    impl SourceProvider for NoDevices {
        fn open(
            &self,
            selection: MicrophoneSelection,
            audio: &crate::AudioConfig,
        ) -> Result<Box<dyn crate::SampleSource>> {
            match selection {
                MicrophoneSelection::Synthetic => Ok(self.synthetic(audio)),
                MicrophoneSelection::Device { index } => Err(crate::SlipnoteError::Device(
                    format!("device {index} is busy"),
                )),
            }
        }
    }

    #[test]
    fn fallback_resets_the_session_microphone() {
        let mut fixture = fixture_with(Arc::new(NoDevices));
        send(
            &mut fixture,
            Intent::SelectMicrophone {
                devices: vec![InputDevice {
                    index: 2,
                    name: "Headset".into(),
                }],
                choice: Some(2),
            },
        );
        assert_eq!(
            fixture.studio.config().audio.microphone,
            MicrophoneSelection::Device { index: 2 }
        );

        send(&mut fixture, Intent::ToggleRecording);
        std::thread::sleep(Duration::from_millis(30));
        send(&mut fixture, Intent::ToggleRecording);

        assert!(fixture.studio.last_recording().unwrap().fell_back);
        assert_eq!(fixture.studio.microphone(), MicrophoneSelection::Synthetic);
        assert_eq!(
            fixture.studio.config().audio.microphone,
            MicrophoneSelection::Synthetic
        );
    }

    #[test]
    fn notice_log_is_sized_by_the_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = session_config(dir.path());
        config.notices.capacity = 3;
        let (mut studio, log) = Studio::with_notice_log(config).unwrap();

        for _ in 0..4 {
            studio.dispatch(Intent::AddFrame).unwrap();
        }
        let recent = log.recent();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[2].message, "Added frame 5 of 5.");
        assert_eq!(recent[0].message, "Added frame 3 of 5.");
    }

    #[test]
    fn stop_audio_silences_playback() {
        let mut fixture = fixture();
        send(&mut fixture, Intent::StopAudio);
        assert!(!fixture.studio.is_playing_audio());
        assert_eq!(last_notice(&fixture).message, "Audio playback stopped.");
    }

    #[test]
    fn quit_flushes_in_flight_recording() {
        let mut fixture = fixture();
        send(&mut fixture, Intent::ToggleRecording);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(send(&mut fixture, Intent::Quit), Flow::Quit);
        assert!(!fixture.studio.is_recording());
        assert!(fixture.root.join("recorded.wav").is_file());
    }
}
