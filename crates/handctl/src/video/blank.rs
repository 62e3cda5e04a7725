use std::{
    thread,
    time::{Duration, Instant},
};

use anyhow::bail;

use crate::image::{Color, Image, Resolution};

use super::FrameSource;

const BACKGROUND: Color = Color::from_rgb8(32, 32, 32);

/// Produces uniformly gray frames at a fixed rate, for running without a camera.
pub struct BlankFrames {
    resolution: Resolution,
    interval: Duration,
    next: Option<Instant>,
    released: bool,
}

impl BlankFrames {
    /// Creates a source of 1280x720 frames at `fps` frames per second.
    ///
    /// An `fps` of 0 delivers frames as fast as they are requested.
    pub fn new(fps: u32) -> Self {
        Self::with_resolution(Resolution::RES_720P, fps)
    }

    pub fn with_resolution(resolution: Resolution, fps: u32) -> Self {
        let interval = match fps {
            0 => Duration::ZERO,
            fps => Duration::from_secs(1) / fps,
        };
        Self {
            resolution,
            interval,
            next: None,
            released: false,
        }
    }
}

impl FrameSource for BlankFrames {
    fn capture_frame(&mut self) -> anyhow::Result<Image> {
        if self.released {
            bail!("frame source has been released");
        }

        let now = Instant::now();
        if let Some(next) = self.next {
            if next > now {
                thread::sleep(next - now);
            }
        }
        self.next = Some(self.next.map_or(now, |next| next.max(now)) + self.interval);

        Ok(Image::filled(self.resolution, BACKGROUND))
    }

    fn release(&mut self) {
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paces_frames() {
        let mut frames = BlankFrames::with_resolution(Resolution::new(4, 4), 100);
        let start = Instant::now();
        for _ in 0..3 {
            let frame = frames.capture_frame().unwrap();
            assert_eq!(frame.resolution(), Resolution::new(4, 4));
        }
        // The first frame is immediate, the next two wait 10ms each.
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn fails_after_release() {
        let mut frames = BlankFrames::with_resolution(Resolution::new(2, 2), 0);
        frames.capture_frame().unwrap();
        frames.release();
        assert!(frames.capture_frame().is_err());
    }
}
