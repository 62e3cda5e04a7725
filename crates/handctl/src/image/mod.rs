//! Image manipulation.
//!
//! This module provides:
//!
//! - The [`Image`] type, an owned RGBA image used for camera frames and the preview window.
//! - [`Color`] and [`Resolution`].
//! - A handful of [`draw`] functions for overlays (hand skeletons, status text, the toggle panel).

mod color;
pub mod draw;
mod resolution;


use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{ImageBuffer, Rgba, RgbaImage};

pub use color::*;
pub use resolution::*;

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    // Internal representation is meant to be compatible with wgpu's texture formats for easy GPU
    // uploading.
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Creates an image of the given size where every pixel has the color `color`.
    pub fn filled(res: Resolution, color: Color) -> Self {
        Self {
            buf: ImageBuffer::from_pixel(res.width(), res.height(), Rgba(color.0)),
        }
    }

    /// Creates an image from raw RGBA8 pixel data.
    ///
    /// # Panics
    ///
    /// This will panic if the length of `buf` does not match `res`.
    pub fn from_rgba8(res: Resolution, buf: &[u8]) -> Self {
        let expected_size = res.width() as usize * res.height() as usize * 4;
        assert_eq!(
            expected_size,
            buf.len(),
            "incorrect buffer size {} for {} image (expected {} bytes)",
            buf.len(),
            res,
            expected_size,
        );

        Self {
            buf: ImageBuffer::from_vec(res.width(), res.height(), buf.to_vec())
                .expect("buffer size does not match image resolution"),
        }
    }

    /// Decodes a JFIF JPEG or Motion JPEG from a byte slice.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        let buf = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8();
        Ok(Self { buf })
    }

    /// Returns the width of this image, in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    /// Returns the height of this image, in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Returns the size of this image.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns the raw RGBA8 pixel data, row by row.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }

    /// Gets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Sets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf[(x, y)] = Rgba(color.0);
    }

    /// Returns a mirrored copy of this image (left and right swapped).
    pub fn flip_horizontal(&self) -> Image {
        Image {
            buf: image::imageops::flip_horizontal(&self.buf),
        }
    }

    /// Mirrors this image in place (left and right swapped).
    pub fn flip_horizontal_in_place(&mut self) {
        image::imageops::flip_horizontal_in_place(&mut self.buf);
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}
