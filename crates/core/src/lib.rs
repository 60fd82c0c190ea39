//! Core library for Slipnote, a flipbook animation editor with narration
//! capture.
//!
//! Each module owns one subsystem: raster frames and the frame store, the
//! binary project format, audio capture and playback, preview timing, and the
//! studio session that ties them together for a shell.

pub mod audio;
pub mod config;
pub mod error;
pub mod frame;
pub mod notify;
pub mod project;
pub mod record;
pub mod store;
pub mod studio;
pub mod timeline;

pub use audio::{
    input_devices, AudioBuffer, AudioInfo, AudioPlayer, DefaultSourceProvider, InputDevice,
    SampleSource, SourceKind, SourceProvider, SyntheticSource,
};
pub use config::{AudioConfig, MicrophoneSelection, SessionConfig};
pub use error::{Result, SlipnoteError};
pub use frame::{Color, FrameBuffer, Point};
pub use notify::{EventSink, Notice, NoticeLevel, NoticeLog, Notifier};
pub use project::{HeaderStyle, ProjectCodec, ProjectHeader};
pub use record::{AudioRecorder, RecordingOutcome};
pub use store::FrameStore;
pub use studio::{Flow, Intent, Studio};
pub use timeline::{PlaybackClock, PlaybackSequencer, SequencerTick};
