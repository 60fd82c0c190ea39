//! Binary project files.
//!
//! Layout, all integers little-endian `u32`:
//!
//! ```text
//! [ "SLIP" | version ]            optional tag, present on tagged saves
//! frame_count | width | height
//! frame_count * (width * height * 4) raw RGBA bytes, in display order
//! ```
//!
//! Untagged files are accepted on load. A tagged file cannot be mistaken
//! for an untagged one because "SLIP" read as a frame count would require
//! far more pixel data than any file carries.

use std::path::{Path, PathBuf};

use crate::frame::frame_len;
use crate::{Color, FrameBuffer, FrameStore, Result, SlipnoteError};

pub const MAGIC: [u8; 4] = *b"SLIP";
pub const FORMAT_VERSION: u32 = 1;
pub const PLAIN_HEADER_LEN: usize = 12;
pub const TAGGED_HEADER_LEN: usize = MAGIC.len() + 4 + PLAIN_HEADER_LEN;

/// Which header a project file starts with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaderStyle {
    /// Frame count, width and height only.
    #[default]
    Plain,
    /// Magic and format version in front of the plain header.
    Tagged,
}

/// Decoded header of a project file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectHeader {
    pub style: HeaderStyle,
    pub frame_count: u32,
    pub width: u32,
    pub height: u32,
}

impl ProjectHeader {
    fn header_len(&self) -> usize {
        match self.style {
            HeaderStyle::Plain => PLAIN_HEADER_LEN,
            HeaderStyle::Tagged => TAGGED_HEADER_LEN,
        }
    }
}

/// Encoder/decoder between a [`FrameStore`] and project file bytes.
#[derive(Debug, Clone, Copy)]
pub struct ProjectCodec {
    header: HeaderStyle,
    background: Color,
}

impl Default for ProjectCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectCodec {
    /// Codec writing the plain header.
    pub fn new() -> Self {
        Self {
            header: HeaderStyle::Plain,
            background: Color::WHITE,
        }
    }

    /// Codec writing the magic/version header.
    pub fn tagged() -> Self {
        Self::new().with_header(HeaderStyle::Tagged)
    }

    pub fn with_header(mut self, header: HeaderStyle) -> Self {
        self.header = header;
        self
    }

    /// Background colour given to stores produced by [`decode`](Self::decode);
    /// it is what `clear_current` paints with.
    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    pub fn header_style(&self) -> HeaderStyle {
        self.header
    }

    pub fn encode(&self, store: &FrameStore) -> Vec<u8> {
        let frame_bytes = store.current().as_raw().len();
        let header_len = match self.header {
            HeaderStyle::Plain => PLAIN_HEADER_LEN,
            HeaderStyle::Tagged => TAGGED_HEADER_LEN,
        };
        let mut out = Vec::with_capacity(header_len + frame_bytes * store.len());

        if self.header == HeaderStyle::Tagged {
            out.extend_from_slice(&MAGIC);
            out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        }
        out.extend_from_slice(&(store.len() as u32).to_le_bytes());
        out.extend_from_slice(&store.width().to_le_bytes());
        out.extend_from_slice(&store.height().to_le_bytes());
        for frame in store.playback_sequence() {
            out.extend_from_slice(frame.as_raw());
        }
        out
    }

    /// Parses project bytes into a fresh store with its cursor on frame 0.
    pub fn decode(&self, bytes: &[u8]) -> Result<FrameStore> {
        let header = inspect(bytes)?;
        let frame_bytes = frame_len(header.width, header.height)
            .ok_or_else(|| corrupt(format!("frame size {}x{} overflows", header.width, header.height)))?;
        let expected = frame_bytes
            .checked_mul(header.frame_count as usize)
            .ok_or_else(|| corrupt(format!("{} frames overflow", header.frame_count)))?;

        let body = &bytes[header.header_len()..];
        if body.len() != expected {
            return Err(corrupt(format!(
                "{} frames of {}x{} need {expected} bytes of pixels, found {}",
                header.frame_count,
                header.width,
                header.height,
                body.len()
            )));
        }

        let frames = body
            .chunks_exact(frame_bytes)
            .map(|raw| FrameBuffer::from_raw_rgba(raw.to_vec(), header.width, header.height))
            .collect::<Result<Vec<_>>>()
            .map_err(|err| corrupt(err.to_string()))?;

        FrameStore::from_frames(frames, self.background).map_err(|err| corrupt(err.to_string()))
    }

    /// Writes the encoded store to `path`, replacing any existing file.
    pub fn save(&self, store: &FrameStore, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.encode(store))?;
        tracing::debug!(path = %path.display(), frames = store.len(), "project written");
        Ok(())
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<FrameStore> {
        let bytes = std::fs::read(path)?;
        self.decode(&bytes)
    }
}

/// Reads and validates the header without touching pixel data.
pub fn inspect(bytes: &[u8]) -> Result<ProjectHeader> {
    let (style, fields) = if bytes.starts_with(&MAGIC) {
        if bytes.len() < TAGGED_HEADER_LEN {
            return Err(corrupt(format!("tagged header truncated at {} bytes", bytes.len())));
        }
        let version = read_u32(bytes, MAGIC.len());
        if version != FORMAT_VERSION {
            return Err(corrupt(format!("unsupported format version {version}")));
        }
        (HeaderStyle::Tagged, &bytes[MAGIC.len() + 4..])
    } else {
        if bytes.len() < PLAIN_HEADER_LEN {
            return Err(corrupt(format!("header truncated at {} bytes", bytes.len())));
        }
        (HeaderStyle::Plain, bytes)
    };

    let header = ProjectHeader {
        style,
        frame_count: read_u32(fields, 0),
        width: read_u32(fields, 4),
        height: read_u32(fields, 8),
    };
    if header.frame_count == 0 {
        return Err(corrupt("project declares no frames"));
    }
    if header.width == 0 || header.height == 0 {
        return Err(corrupt(format!(
            "invalid canvas {}x{}",
            header.width, header.height
        )));
    }
    Ok(header)
}

/// Project files in `dir` with the given extension, sorted by file name.
pub fn list_projects(dir: impl AsRef<Path>, extension: &str) -> Result<Vec<PathBuf>> {
    let mut projects = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches && path.is_file() {
            projects.push(path);
        }
    }
    projects.sort();
    Ok(projects)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(word)
}

fn corrupt(message: impl Into<String>) -> SlipnoteError {
    SlipnoteError::CorruptProject(message.into())
}
