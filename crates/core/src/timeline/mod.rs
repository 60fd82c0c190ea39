use crate::config::{MAX_FPS, MIN_FPS};
use crate::{FrameBuffer, FrameStore};

/// Fraction of a frame forgiven when converting time to a frame index, so
/// ticks of exactly one period never land just short of the next frame.
const FRAME_TOLERANCE: f64 = 1e-3;

/// Accumulated preview time, advanced by the editor's frame clock.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    pub time_seconds: f64,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f32) {
        self.time_seconds = (self.time_seconds + f64::from(delta)).max(0.0);
    }
}

/// Result of one sequencer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerTick {
    /// Display this frame index.
    Show(usize),
    /// The last frame has had its time; the preview is over.
    Finished,
    /// No preview is running.
    Idle,
}

/// Plays the frame sequence once at a fixed rate.
///
/// It owns no thread: the editor calls [`tick`](Self::tick) from its own
/// loop, and stopping the preview is just not ticking it any further.
#[derive(Debug, Clone)]
pub struct PlaybackSequencer {
    fps: u32,
    frame_count: usize,
    clock: PlaybackClock,
    playing: bool,
}

impl PlaybackSequencer {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.clamp(MIN_FPS, MAX_FPS),
            frame_count: 0,
            clock: PlaybackClock::default(),
            playing: false,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Changes the rate; an active preview keeps its elapsed time.
    pub fn set_fps(&mut self, fps: u32) {
        self.fps = fps.clamp(MIN_FPS, MAX_FPS);
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Seconds each frame stays on screen.
    pub fn frame_duration(&self) -> f32 {
        1.0 / self.fps as f32
    }

    /// Begins a preview of `frame_count` frames from the first frame.
    pub fn start(&mut self, frame_count: usize) -> SequencerTick {
        self.frame_count = frame_count;
        self.clock.reset();
        self.playing = frame_count > 0;
        if self.playing {
            SequencerTick::Show(0)
        } else {
            SequencerTick::Finished
        }
    }

    pub fn cancel(&mut self) {
        self.playing = false;
    }

    /// Current frame index without advancing.
    pub fn position(&self) -> Option<usize> {
        if !self.playing {
            return None;
        }
        Some(self.elapsed_frames().min(self.frame_count - 1))
    }

    /// Advances the preview by `delta` seconds.
    pub fn tick(&mut self, delta: f32) -> SequencerTick {
        if !self.playing {
            return SequencerTick::Idle;
        }

        self.clock.advance(delta);
        let index = self.elapsed_frames();
        if index >= self.frame_count {
            self.playing = false;
            tracing::debug!(frames = self.frame_count, "preview finished");
            SequencerTick::Finished
        } else {
            SequencerTick::Show(index)
        }
    }

    fn elapsed_frames(&self) -> usize {
        (self.clock.time_seconds * f64::from(self.fps) + FRAME_TOLERANCE).floor() as usize
    }

    /// Frame to display right now, taken from `store`.
    pub fn frame<'a>(&self, store: &'a FrameStore) -> Option<&'a FrameBuffer> {
        self.position().and_then(|index| store.frame(index))
    }
}

impl Default for PlaybackSequencer {
    fn default() -> Self {
        Self::new(MAX_FPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plays_each_frame_for_one_period_then_stops() {
        let mut sequencer = PlaybackSequencer::new(10);
        assert_eq!(sequencer.start(3), SequencerTick::Show(0));
        assert_eq!(sequencer.tick(0.05), SequencerTick::Show(0));
        assert_eq!(sequencer.tick(0.06), SequencerTick::Show(1));
        assert_eq!(sequencer.tick(0.1), SequencerTick::Show(2));
        assert_eq!(sequencer.tick(0.1), SequencerTick::Finished);
        assert!(!sequencer.is_playing());
        assert_eq!(sequencer.tick(0.1), SequencerTick::Idle);
    }

    #[test]
    fn ticking_once_per_period_shows_every_frame_in_order() {
        for fps in [30, 24, 12, 7] {
            let mut sequencer = PlaybackSequencer::new(fps);
            let period = 1.0 / fps as f32;
            assert_eq!(sequencer.start(300), SequencerTick::Show(0));
            for expected in 1..300 {
                assert_eq!(sequencer.tick(period), SequencerTick::Show(expected), "{fps} fps");
            }
            assert_eq!(sequencer.tick(period), SequencerTick::Finished);
        }
    }

    #[test]
    fn does_not_loop() {
        let mut sequencer = PlaybackSequencer::new(30);
        sequencer.start(2);
        assert_eq!(sequencer.tick(5.0), SequencerTick::Finished);
        assert_eq!(sequencer.position(), None);
    }

    #[test]
    fn cancel_stops_advancing() {
        let mut sequencer = PlaybackSequencer::new(12);
        sequencer.start(5);
        sequencer.tick(0.1);
        sequencer.cancel();
        assert_eq!(sequencer.tick(0.1), SequencerTick::Idle);
    }

    #[test]
    fn fps_is_clamped() {
        assert_eq!(PlaybackSequencer::new(0).fps(), 1);
        assert_eq!(PlaybackSequencer::new(120).fps(), 30);
    }

    #[test]
    fn restart_begins_from_first_frame() {
        let mut sequencer = PlaybackSequencer::new(1);
        sequencer.start(4);
        sequencer.tick(2.5);
        assert_eq!(sequencer.position(), Some(2));
        assert_eq!(sequencer.start(4), SequencerTick::Show(0));
        assert_eq!(sequencer.position(), Some(0));
    }

    #[test]
    fn frame_is_read_from_the_store() {
        let mut store = FrameStore::new_project(4, 4);
        store.add_frame();
        store.clear_current();
        let mut sequencer = PlaybackSequencer::new(2);
        sequencer.start(store.len());
        sequencer.tick(0.6);
        assert!(std::ptr::eq(sequencer.frame(&store).unwrap(), &store.frames()[1]));
    }

    #[test]
    fn clock_never_goes_negative() {
        let mut clock = PlaybackClock::default();
        clock.advance(-1.0);
        assert_eq!(clock.time_seconds, 0.0);
    }
}
