use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Color, Result, SlipnoteError};

pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 30;

/// Everything that stays fixed for one editing session: canvas geometry,
/// audio format, microphone choice and playback rate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub canvas: CanvasConfig,
    pub audio: AudioConfig,
    pub playback: PlaybackConfig,
    pub project: ProjectConfig,
    pub notices: NoticeConfig,
}

impl SessionConfig {
    /// Reads a JSON configuration file. Missing sections fall back to their
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(SlipnoteError::Config(format!(
                "canvas must be non-empty, got {}x{}",
                self.canvas.width, self.canvas.height
            )));
        }
        if self.canvas.pen_thickness == 0 {
            return Err(SlipnoteError::Config("pen thickness must be at least 1".into()));
        }
        if self.audio.sample_rate == 0 {
            return Err(SlipnoteError::Config("sample rate must be positive".into()));
        }
        if self.audio.chunk_size == 0 {
            return Err(SlipnoteError::Config("chunk size must be positive".into()));
        }
        if self.notices.capacity == 0 {
            return Err(SlipnoteError::Config("notice log must keep at least one entry".into()));
        }
        if !(MIN_FPS..=MAX_FPS).contains(&self.playback.fps) {
            return Err(SlipnoteError::Config(format!(
                "fps must be within {MIN_FPS}..={MAX_FPS}, got {}",
                self.playback.fps
            )));
        }
        Ok(())
    }
}

/// Fixed drawing surface shared by every frame of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub background: Color,
    pub pen_color: Color,
    pub pen_thickness: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 400,
            height: 240,
            background: Color::WHITE,
            pen_color: Color::BLACK,
            pen_thickness: 2,
        }
    }
}

/// Which input the recorder pulls samples from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MicrophoneSelection {
    #[default]
    Synthetic,
    Device {
        index: usize,
    },
}

/// Configuration specific to the audio subsystem. Recordings are always
/// mono, 8-bit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub chunk_size: usize,
    pub output_path: PathBuf,
    pub microphone: MicrophoneSelection,
}

impl AudioConfig {
    /// Wall-clock time covered by one chunk.
    pub fn chunk_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.chunk_size as f64 / self.sample_rate.max(1) as f64)
    }

    /// How long a live input may stay silent before it counts as lost.
    pub fn stall_timeout(&self) -> std::time::Duration {
        self.chunk_period() * 3 / 2
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            chunk_size: 1024,
            output_path: PathBuf::from("recorded.wav"),
            microphone: MicrophoneSelection::Synthetic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub fps: u32,
}

impl PlaybackConfig {
    /// Applies an answer from the FPS prompt. `None` keeps the current rate;
    /// anything else is clamped into the supported range.
    pub fn clamp_fps(&self, requested: Option<i64>) -> u32 {
        match requested {
            Some(fps) => fps.clamp(MIN_FPS as i64, MAX_FPS as i64) as u32,
            None => self.fps,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { fps: MAX_FPS }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub directory: PathBuf,
    pub extension: String,
    /// Write the magic/version header on save. Files without it still load.
    pub tagged_header: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("slipnotes"),
            extension: "slip".to_string(),
            tagged_header: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticeConfig {
    pub capacity: usize,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self { capacity: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_flipnote_canvas() {
        let config = SessionConfig::default();
        assert_eq!((config.canvas.width, config.canvas.height), (400, 240));
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.microphone, MicrophoneSelection::Synthetic);
        assert_eq!(config.playback.fps, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn fps_prompt_is_clamped_and_none_keeps_value() {
        let playback = PlaybackConfig { fps: 12 };
        assert_eq!(playback.clamp_fps(None), 12);
        assert_eq!(playback.clamp_fps(Some(0)), 1);
        assert_eq!(playback.clamp_fps(Some(99)), 30);
        assert_eq!(playback.clamp_fps(Some(24)), 24);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(
            &path,
            r#"{ "audio": { "sample_rate": 8000, "microphone": { "mode": "device", "index": 2 } } }"#,
        )
        .unwrap();

        let config = SessionConfig::from_json_file(&path).unwrap();
        assert_eq!(config.audio.sample_rate, 8000);
        assert_eq!(config.audio.chunk_size, 1024);
        assert_eq!(config.audio.microphone, MicrophoneSelection::Device { index: 2 });
        assert_eq!(config.canvas, CanvasConfig::default());
    }

    #[test]
    fn rejects_out_of_range_fps() {
        let mut config = SessionConfig::default();
        config.playback.fps = 60;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SlipnoteError::Config(_)));
    }

    #[test]
    fn chunk_period_follows_sample_rate() {
        let audio = AudioConfig {
            sample_rate: 1000,
            chunk_size: 250,
            ..Default::default()
        };
        assert_eq!(audio.chunk_period(), std::time::Duration::from_millis(250));
        assert_eq!(audio.stall_timeout(), std::time::Duration::from_millis(375));
    }

    #[test]
    fn rejects_empty_notice_log() {
        let mut config = SessionConfig::default();
        config.notices.capacity = 0;
        assert!(matches!(config.validate(), Err(SlipnoteError::Config(_))));
    }
}
