use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::{Result, SlipnoteError};

/// Bytes per pixel in every frame buffer.
pub const BYTES_PER_PIXEL: usize = 4;

/// Straight RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    pub const BLACK: Color = Color([0, 0, 0, 255]);

    /// Opaque colour from its three channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }
}

impl From<Color> for Rgba<u8> {
    fn from(value: Color) -> Self {
        Rgba(value.0)
    }
}

impl From<Rgba<u8>> for Color {
    fn from(value: Rgba<u8>) -> Self {
        Color(value.0)
    }
}

/// Pointer position in canvas coordinates. May lie outside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Byte length of a `width` x `height` RGBA frame, or `None` on overflow.
pub fn frame_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(BYTES_PER_PIXEL)
}

/// One still canvas of the animation. The pixel store always holds exactly
/// `width * height * 4` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    image: RgbaImage,
}

impl FrameBuffer {
    /// Creates a buffer filled with a solid colour.
    pub fn new(width: u32, height: u32, fill: Color) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, fill.into()),
        }
    }

    /// Rebuilds a frame from raw RGBA bytes in row-major order.
    pub fn from_raw_rgba(bytes: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = frame_len(width, height).ok_or_else(|| {
            SlipnoteError::Format(format!("frame size {width}x{height} overflows"))
        })?;
        if bytes.len() != expected {
            return Err(SlipnoteError::Format(format!(
                "expected {expected} bytes for a {width}x{height} frame, got {}",
                bytes.len()
            )));
        }

        RgbaImage::from_raw(width, height, bytes)
            .map(|image| Self { image })
            .ok_or_else(|| SlipnoteError::Format("pixel buffer rejected".into()))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Borrowed view over the raw RGBA bytes.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn to_raw_rgba(&self) -> Vec<u8> {
        self.image.as_raw().clone()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.image.get_pixel_checked(x, y).map(|p| Color::from(*p))
    }

    /// Paints every pixel with `color`.
    pub fn fill(&mut self, color: Color) {
        let rgba: Rgba<u8> = color.into();
        for pixel in self.image.pixels_mut() {
            *pixel = rgba;
        }
    }

    /// Draws a segment `thickness` pixels wide.
    ///
    /// Pointer positions above or below the drawing surface belong to other
    /// parts of the window, so a segment with either endpoint outside
    /// `0..height` is ignored entirely. Horizontal overflow is clipped, and a
    /// segment lying wholly beside the canvas draws nothing. Returns whether
    /// anything was drawn.
    pub fn draw_line(&mut self, from: Point, to: Point, color: Color, thickness: u32) -> bool {
        if !self.accepts(from) || !self.accepts(to) {
            return false;
        }

        // A pen wider than the canvas diagonal already covers every pixel.
        let size = i64::from(thickness.clamp(1, self.width().saturating_add(self.height())));
        let offset = (size - 1) / 2;
        let Some(((mut x0, mut y0), (x1, y1))) =
            clip_columns(from, to, -size, i64::from(self.width()) + size)
        else {
            return false;
        };

        let rgba: Rgba<u8> = color.into();
        // Bresenham
        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.stamp(x0 - offset, y0 - offset, size, rgba);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
        true
    }

    /// Draws a freehand brush stroke through consecutive pointer samples.
    /// Segments touching positions off the drawing surface are skipped.
    pub fn draw_stroke(&mut self, points: &[Point], color: Color, thickness: u32) -> bool {
        match points {
            [] => false,
            [single] => self.draw_line(*single, *single, color, thickness),
            _ => points
                .windows(2)
                .fold(false, |drawn, pair| {
                    self.draw_line(pair[0], pair[1], color, thickness) || drawn
                }),
        }
    }

    /// Blends `overlay` on top of `self` with the given opacity and returns
    /// the result. Neither input is modified; the base alpha channel is kept.
    pub fn composite_with_alpha(&self, overlay: &FrameBuffer, alpha: u8) -> Result<FrameBuffer> {
        if self.dimensions() != overlay.dimensions() {
            return Err(SlipnoteError::Format(format!(
                "cannot blend a {:?} frame over a {:?} frame",
                overlay.dimensions(),
                self.dimensions()
            )));
        }

        let a = alpha as u32;
        let mut blended = Vec::with_capacity(self.as_raw().len());
        for (base, over) in self
            .as_raw()
            .chunks_exact(BYTES_PER_PIXEL)
            .zip(overlay.as_raw().chunks_exact(BYTES_PER_PIXEL))
        {
            for channel in 0..3 {
                let mixed = (over[channel] as u32 * a + base[channel] as u32 * (255 - a) + 127) / 255;
                blended.push(mixed as u8);
            }
            blended.push(base[3]);
        }

        Self::from_raw_rgba(blended, self.width(), self.height())
    }

    fn accepts(&self, point: Point) -> bool {
        point.y >= 0 && (point.y as u32) < self.height()
    }

    fn stamp(&mut self, left: i64, top: i64, size: i64, rgba: Rgba<u8>) {
        let (width, height) = (i64::from(self.width()), i64::from(self.height()));
        for y in top.max(0)..(top + size).min(height) {
            for x in left.max(0)..(left + size).min(width) {
                self.image.put_pixel(x as u32, y as u32, rgba);
            }
        }
    }
}

/// Clips a segment to the columns `lo..=hi`, keeping its slope. `None` when
/// the segment lies entirely outside them.
fn clip_columns(from: Point, to: Point, lo: i64, hi: i64) -> Option<((i64, i64), (i64, i64))> {
    let (mut a, mut b) = (
        (i64::from(from.x), i64::from(from.y)),
        (i64::from(to.x), i64::from(to.y)),
    );
    if a.0 > b.0 {
        std::mem::swap(&mut a, &mut b);
    }
    if b.0 < lo || a.0 > hi {
        return None;
    }

    let (left, right) = (a, b);
    let row_at = |x: i64| -> i64 {
        let rise = i128::from(right.1 - left.1) * i128::from(x - left.0);
        (i128::from(left.1) + rise / i128::from(right.0 - left.0)) as i64
    };
    if a.0 < lo {
        a = (lo, row_at(lo));
    }
    if b.0 > hi {
        b = (hi, row_at(hi));
    }
    Some((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> FrameBuffer {
        FrameBuffer::new(16, 8, Color::WHITE)
    }

    #[test]
    fn new_frame_is_solid_fill() {
        let frame = blank();
        assert_eq!(frame.as_raw().len(), 16 * 8 * 4);
        assert!(frame.as_raw().iter().all(|&b| b == 255));
    }

    #[test]
    fn raw_rgba_round_trip_is_lossless() {
        let mut frame = blank();
        frame.draw_line(Point::new(0, 0), Point::new(15, 7), Color::rgb(10, 20, 30), 1);
        let restored = FrameBuffer::from_raw_rgba(frame.to_raw_rgba(), 16, 8).unwrap();
        assert_eq!(restored, frame);
    }

    #[test]
    fn from_raw_rejects_wrong_length() {
        let err = FrameBuffer::from_raw_rgba(vec![0; 10], 16, 8).unwrap_err();
        assert!(matches!(err, SlipnoteError::Format(_)));
    }

    #[test]
    fn line_touches_both_endpoints() {
        let mut frame = blank();
        assert!(frame.draw_line(Point::new(1, 1), Point::new(10, 5), Color::BLACK, 1));
        assert_eq!(frame.pixel(1, 1), Some(Color::BLACK));
        assert_eq!(frame.pixel(10, 5), Some(Color::BLACK));
        assert_eq!(frame.pixel(15, 0), Some(Color::WHITE));
    }

    #[test]
    fn thickness_widens_the_line() {
        let mut frame = blank();
        frame.draw_line(Point::new(2, 4), Point::new(8, 4), Color::BLACK, 2);
        assert_eq!(frame.pixel(5, 4), Some(Color::BLACK));
        assert_eq!(frame.pixel(5, 5), Some(Color::BLACK));
        assert_eq!(frame.pixel(5, 6), Some(Color::WHITE));
    }

    #[test]
    fn lines_leaving_the_drawing_surface_are_ignored() {
        let mut frame = blank();
        assert!(!frame.draw_line(Point::new(0, 0), Point::new(4, 8), Color::BLACK, 1));
        assert!(!frame.draw_line(Point::new(0, -1), Point::new(4, 2), Color::BLACK, 1));
        assert_eq!(frame, blank());
    }

    #[test]
    fn horizontal_overflow_is_clipped() {
        let mut frame = blank();
        assert!(frame.draw_line(Point::new(-5, 3), Point::new(40, 3), Color::BLACK, 1));
        assert_eq!(frame.pixel(0, 3), Some(Color::BLACK));
        assert_eq!(frame.pixel(15, 3), Some(Color::BLACK));
    }

    #[test]
    fn extreme_pointer_columns_are_clipped_to_the_canvas() {
        let mut frame = blank();
        assert!(frame.draw_line(
            Point::new(i32::MIN, 2),
            Point::new(i32::MAX, 2),
            Color::BLACK,
            1
        ));
        assert!((0..16).all(|x| frame.pixel(x, 2) == Some(Color::BLACK)));
        assert_eq!(frame.pixel(0, 3), Some(Color::WHITE));

        assert!(frame.draw_line(
            Point::new(i32::MAX, 0),
            Point::new(i32::MIN, 7),
            Color::BLACK,
            3
        ));
        assert!(!frame.draw_line(
            Point::new(i32::MIN, 1),
            Point::new(-100, 1),
            Color::BLACK,
            1
        ));
    }

    #[test]
    fn oversized_pen_covers_the_canvas() {
        let mut frame = blank();
        assert!(frame.draw_line(Point::new(5, 4), Point::new(5, 4), Color::BLACK, u32::MAX));
        assert_eq!(frame.pixel(0, 0), Some(Color::BLACK));
        assert_eq!(frame.pixel(15, 7), Some(Color::BLACK));
    }

    #[test]
    fn stroke_skips_only_offscreen_segments() {
        let mut frame = blank();
        let points = [Point::new(1, 1), Point::new(5, 1), Point::new(5, 20), Point::new(9, 1)];
        assert!(frame.draw_stroke(&points, Color::BLACK, 1));
        assert_eq!(frame.pixel(3, 1), Some(Color::BLACK));
        assert_eq!(frame.pixel(5, 7), Some(Color::WHITE));
        assert!(!frame.draw_stroke(&[], Color::BLACK, 1));
    }

    #[test]
    fn composite_blends_without_mutating_inputs() {
        let base = blank();
        let overlay = FrameBuffer::new(16, 8, Color::BLACK);
        let blended = base.composite_with_alpha(&overlay, 100).unwrap();

        // 255 * 155 / 255 rounds to 155
        assert_eq!(blended.pixel(0, 0), Some(Color([155, 155, 155, 255])));
        assert_eq!(base, blank());
        assert_eq!(overlay.pixel(3, 3), Some(Color::BLACK));
    }

    #[test]
    fn composite_extremes() {
        let base = blank();
        let overlay = FrameBuffer::new(16, 8, Color::rgb(1, 2, 3));
        assert_eq!(base.composite_with_alpha(&overlay, 0).unwrap(), base);
        assert_eq!(base.composite_with_alpha(&overlay, 255).unwrap(), overlay);
    }

    #[test]
    fn composite_requires_matching_geometry() {
        let base = blank();
        let other = FrameBuffer::new(8, 8, Color::WHITE);
        assert!(base.composite_with_alpha(&other, 100).is_err());
    }
}
