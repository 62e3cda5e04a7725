//! V4L2 webcam access.
//!
//! Only `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.

use std::cmp::Reverse;

use anyhow::bail;
use itertools::Itertools;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, PixelFormat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::{
    image::{Image, Resolution},
    timer::Timer,
};

use super::FrameSource;

#[derive(Clone, Copy)]
struct FrameFormat {
    resolution: Resolution,
    interval: Fract,
}

impl FrameFormat {
    fn fps(&self) -> f32 {
        1.0 / self.interval.as_f32()
    }
}

fn supported_formats(device: &Device) -> anyhow::Result<(PixelFormat, Vec<FrameFormat>)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixel_format() == PixelFormat::JPEG || format.pixel_format() == PixelFormat::MJPG {
            pixel_format = Some(format.pixel_format());
            break;
        }
    }
    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let FrameSizes::Discrete(sizes) = device.frame_sizes(pixel_format)? else {
        bail!("stepwise or continuous resolutions are not supported");
    };
    let mut formats = Vec::new();
    for size in sizes {
        let FrameIntervals::Discrete(intervals) =
            device.frame_intervals(pixel_format, size.width(), size.height())?
        else {
            bail!("stepwise or continuous frame rates are not supported");
        };
        formats.extend(intervals.iter().map(|rate| FrameFormat {
            resolution: Resolution::new(size.width(), size.height()),
            interval: *rate.fract(),
        }));
    }
    Ok((pixel_format, formats))
}

/// Picks the largest format up to `max_res` that reaches `fps`.
///
/// If no format reaches `fps`, the fastest format up to `max_res` is used instead. If no format
/// fits into `max_res` either, the smallest one is used.
fn choose_format(formats: &[FrameFormat], max_res: Resolution, fps: u32) -> Option<FrameFormat> {
    let fits = |fmt: &&FrameFormat| {
        fmt.resolution.width() <= max_res.width() && fmt.resolution.height() <= max_res.height()
    };
    let fast_enough = |fmt: &&FrameFormat| fmt.fps().round() >= fps as f32;

    formats
        .iter()
        .filter(fits)
        .filter(fast_enough)
        .max_by_key(|fmt| (fmt.resolution.num_pixels(), Reverse(fmt.interval)))
        .or_else(|| {
            formats
                .iter()
                .filter(fits)
                .max_by_key(|fmt| (Reverse(fmt.interval), fmt.resolution.num_pixels()))
        })
        .or_else(|| formats.iter().min_by_key(|fmt| fmt.resolution.num_pixels()))
        .copied()
}

/// A webcam delivering camera frames.
pub struct Webcam {
    stream: Option<ReadStream>,
    name: String,
    resolution: Resolution,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the webcam called `name`, or the first supported one if `name` is `None`.
    ///
    /// Frames up to 1280x720 at `fps` are requested.
    ///
    /// This can block for a significant amount of time while the webcam initializes (on the order
    /// of hundreds of milliseconds).
    pub fn open(name: Option<&str>, fps: u32) -> anyhow::Result<Self> {
        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => match Self::open_device(dev, name, fps) {
                    Ok(Some(webcam)) => return Ok(webcam),
                    Ok(None) => {}
                    Err(e) => log::debug!("{e:#}"),
                },
                Err(e) => log::warn!("{e}"),
            }
        }

        match name {
            Some(name) => bail!("webcam '{name}' not found or not supported"),
            None => bail!("no supported webcam device found"),
        }
    }

    fn open_device(dev: Device, name: Option<&str>, fps: u32) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if let Some(name) = name {
            if caps.card() != name {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );
        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixel_format, formats) = supported_formats(&dev)?;
        log::trace!(
            "{} formats: {}",
            caps.card(),
            formats
                .iter()
                .map(|fmt| format!("{}@{:.0}", fmt.resolution, fmt.fps()))
                .join(", ")
        );
        let Some(format) = choose_format(&formats, Resolution::RES_720P, fps) else {
            bail!("device {} reports no frame formats", caps.card());
        };

        let capture = dev.video_capture(PixFormat::new(
            format.resolution.width(),
            format.resolution.height(),
            pixel_format,
        ))?;
        let actual_format = capture.format();
        let resolution = Resolution::new(actual_format.width(), actual_format.height());
        let actual_interval = capture.set_frame_interval(format.interval)?;

        log::info!(
            "opened {} ({}), {} @ {:.1}Hz",
            caps.card(),
            path.display(),
            resolution,
            1.0 / actual_interval.as_f32(),
        );

        Ok(Some(Self {
            stream: Some(capture.into_stream()?),
            name: caps.card().to_string(),
            resolution,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }
}

impl FrameSource for Webcam {
    fn capture_frame(&mut self) -> anyhow::Result<Image> {
        let Some(stream) = &mut self.stream else {
            bail!("webcam '{}' has been released", self.name);
        };
        let resolution = self.resolution;
        let t_decode = &self.t_decode;
        let dequeue_guard = self.t_dequeue.start();
        let image = stream.dequeue(|buf| {
            drop(dequeue_guard);
            let image = match t_decode.time(|| Image::decode_jpeg(&buf)) {
                Ok(image) => image,
                Err(e) => {
                    // Even good webcams produce the occasional corrupted MJPG frame. Skipping it
                    // would cause a latency spike, so hand back a blank image instead.
                    log::error!("webcam decode error: {e}");
                    Image::new(resolution.width(), resolution.height())
                }
            };
            Ok(image)
        })?;
        Ok(image)
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("released webcam '{}'", self.name);
        }
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_dequeue, &self.t_decode]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(width: u32, height: u32, fps: u32) -> FrameFormat {
        FrameFormat {
            resolution: Resolution::new(width, height),
            interval: Fract::new(1, fps),
        }
    }

    #[test]
    fn prefers_largest_fast_enough() {
        let formats = [
            fmt(640, 480, 30),
            fmt(1280, 720, 30),
            fmt(1280, 720, 10),
            fmt(1920, 1080, 30),
        ];
        let chosen = choose_format(&formats, Resolution::RES_720P, 30).unwrap();
        assert_eq!(chosen.resolution, Resolution::RES_720P);
        assert_eq!(chosen.fps().round(), 30.0);
    }

    #[test]
    fn falls_back_to_fastest() {
        let formats = [fmt(640, 480, 15), fmt(1280, 720, 10), fmt(1920, 1080, 60)];
        let chosen = choose_format(&formats, Resolution::RES_720P, 30).unwrap();
        assert_eq!(chosen.resolution, Resolution::new(640, 480));
    }

    #[test]
    fn falls_back_to_smallest() {
        let formats = [fmt(3840, 2160, 30), fmt(1920, 1080, 30)];
        let chosen = choose_format(&formats, Resolution::RES_720P, 30).unwrap();
        assert_eq!(chosen.resolution, Resolution::RES_1080P);
        assert!(choose_format(&[], Resolution::RES_720P, 30).is_none());
    }
}
