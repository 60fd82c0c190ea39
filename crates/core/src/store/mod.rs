use std::borrow::Cow;

use crate::{Color, FrameBuffer, Point, Result, SlipnoteError};

/// Opacity of the previous frame when onion skinning is enabled.
pub const ONION_SKIN_ALPHA: u8 = 100;

/// Ordered frames of one animation plus the editing cursor.
///
/// The store is never empty, the current index always points at an existing
/// frame and every frame shares the same geometry. It is only touched from
/// the editor thread.
#[derive(Debug, Clone)]
pub struct FrameStore {
    width: u32,
    height: u32,
    background: Color,
    frames: Vec<FrameBuffer>,
    current: usize,
    onion_skin: bool,
}

impl FrameStore {
    /// Starts a project with a single blank frame.
    pub fn new_project(width: u32, height: u32) -> Self {
        Self::with_background(width, height, Color::WHITE)
    }

    pub fn with_background(width: u32, height: u32, background: Color) -> Self {
        Self {
            width,
            height,
            background,
            frames: vec![FrameBuffer::new(width, height, background)],
            current: 0,
            onion_skin: false,
        }
    }

    /// Builds a store from already decoded frames. The cursor starts at the
    /// first frame.
    pub fn from_frames(frames: Vec<FrameBuffer>, background: Color) -> Result<Self> {
        let first = frames
            .first()
            .ok_or_else(|| SlipnoteError::Format("a project needs at least one frame".into()))?;
        let (width, height) = first.dimensions();
        if let Some(index) = frames.iter().position(|f| f.dimensions() != (width, height)) {
            return Err(SlipnoteError::Format(format!(
                "frame {index} is {:?}, expected {width}x{height}",
                frames[index].dimensions()
            )));
        }

        Ok(Self {
            width,
            height,
            background,
            frames,
            current: 0,
            onion_skin: false,
        })
    }

    /// Swaps in the contents of another store, e.g. after loading a project.
    /// The onion-skin preference survives the swap.
    pub fn replace_with(&mut self, other: FrameStore) {
        let onion_skin = self.onion_skin;
        *self = other;
        self.onion_skin = onion_skin;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn frames(&self) -> &[FrameBuffer] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&FrameBuffer> {
        self.frames.get(index)
    }

    pub fn current(&self) -> &FrameBuffer {
        &self.frames[self.current]
    }

    pub fn current_mut(&mut self) -> &mut FrameBuffer {
        &mut self.frames[self.current]
    }

    /// Appends a copy of the current frame and moves the cursor onto it, so
    /// drawing carries forward from where the user left off.
    pub fn add_frame(&mut self) -> usize {
        let copy = self.current().clone();
        self.frames.push(copy);
        self.current = self.frames.len() - 1;
        self.current
    }

    /// Moves one frame back; stays put on the first frame.
    pub fn goto_previous(&mut self) -> usize {
        self.current = self.current.saturating_sub(1);
        self.current
    }

    /// Moves one frame forward; stays put on the last frame.
    pub fn goto_next(&mut self) -> usize {
        if self.current + 1 < self.frames.len() {
            self.current += 1;
        }
        self.current
    }

    /// Resets the current frame to the background colour.
    pub fn clear_current(&mut self) {
        let background = self.background;
        self.current_mut().fill(background);
    }

    pub fn onion_skin(&self) -> bool {
        self.onion_skin
    }

    pub fn set_onion_skin(&mut self, enabled: bool) {
        self.onion_skin = enabled;
    }

    pub fn toggle_onion_skin(&mut self) -> bool {
        self.onion_skin = !self.onion_skin;
        self.onion_skin
    }

    /// Pixels to display for the current frame. With onion skinning on and a
    /// previous frame available, the previous frame is blended over the
    /// current one; otherwise the current frame is borrowed unchanged.
    pub fn render_current(&self, onion_skin: bool) -> Cow<'_, FrameBuffer> {
        if onion_skin && self.current > 0 {
            let previous = &self.frames[self.current - 1];
            // All frames share geometry, so blending cannot fail here.
            if let Ok(blended) = self.current().composite_with_alpha(previous, ONION_SKIN_ALPHA) {
                return Cow::Owned(blended);
            }
        }
        Cow::Borrowed(self.current())
    }

    /// Draws a brush stroke on the current frame.
    pub fn stroke(&mut self, points: &[Point], color: Color, thickness: u32) -> bool {
        self.current_mut().draw_stroke(points, color, thickness)
    }

    /// Commits a straight line to the current frame.
    pub fn line(&mut self, from: Point, to: Point, color: Color, thickness: u32) -> bool {
        self.current_mut().draw_line(from, to, color, thickness)
    }

    /// Current frame with a candidate line on top, for rubber-band feedback
    /// while the line tool is dragged. The frame itself is left untouched.
    pub fn preview_line(&self, from: Point, to: Point, color: Color, thickness: u32) -> FrameBuffer {
        let mut preview = self.current().clone();
        preview.draw_line(from, to, color, thickness);
        preview
    }

    /// Frames in display order. The iterator is finite and cloning it
    /// restarts the sequence.
    pub fn playback_sequence(&self) -> impl ExactSizeIterator<Item = &FrameBuffer> + Clone + '_ {
        self.frames.iter()
    }
}
