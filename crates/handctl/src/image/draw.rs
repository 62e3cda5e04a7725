//! Overlay drawing.
//!
//! Every function returns a guard that performs the drawing when dropped, so that the style can
//! be customized with builder methods first:
//!
//! ```
//! # use handctl::image::{draw, Color, Image};
//! let mut image = Image::new(64, 32);
//! draw::text(&mut image, 2, 2, "hi").color(Color::GREEN).align_top().align_left();
//! ```

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii, MonoTextStyle},
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

use crate::image::{Color, Image};

/// Width and height of a single glyph of the overlay font, in pixels.
pub const GLYPH_SIZE: (u32, u32) = (6, 10);

/// Guard returned by [`rect`]; draws the rectangle when dropped and allows customization.
pub struct DrawRect<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    color: Color,
    stroke_width: u32,
    fill: Option<Color>,
}

impl DrawRect<'_> {
    /// Sets the color of the rectangle's outline.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the rectangle's stroke width.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }

    /// Fills the inside of the rectangle with `color`.
    pub fn fill(&mut self, color: Color) -> &mut Self {
        self.fill = Some(color);
        self
    }
}

impl Drop for DrawRect<'_> {
    fn drop(&mut self) {
        let mut style = PrimitiveStyle::with_stroke(self.color, self.stroke_width);
        style.fill_color = self.fill;
        match Rectangle::new(
            Point::new(self.x, self.y),
            Size::new(self.width, self.height),
        )
        .into_styled(style)
        .draw(&mut Target(self.image))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`marker`]; draws the marker when dropped and allows customization.
pub struct DrawMarker<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    color: Color,
    size: u32,
}

impl DrawMarker<'_> {
    /// Sets the marker's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the width and height of the marker.
    ///
    /// The default size is 5. The size must be *uneven* and *non-zero*. A size of 1 will result in
    /// a single pixel getting drawn.
    pub fn size(&mut self, size: u32) -> &mut Self {
        assert!(size != 0, "marker size must be greater than zero");
        assert!(size % 2 == 1, "marker size must be an uneven number");
        self.size = size;
        self
    }
}

impl Drop for DrawMarker<'_> {
    fn drop(&mut self) {
        let offset = ((self.size - 1) / 2) as i32;
        for (xoff, yoff) in (-offset..=offset)
            .zip(-offset..=offset)
            .chain((-offset..=offset).rev().zip(-offset..=offset))
        {
            match Pixel(
                Point {
                    x: self.x + xoff,
                    y: self.y + yoff,
                },
                self.color,
            )
            .draw(&mut Target(self.image))
            {
                Ok(_) => {}
                Err(infallible) => match infallible {},
            }
        }
    }
}

/// Guard returned by [`line`][line()]; draws the line when dropped and allows customization.
pub struct DrawLine<'a> {
    image: &'a mut Image,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
    color: Color,
    stroke_width: u32,
}

impl DrawLine<'_> {
    /// Sets the line's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the line's stroke width.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        match Line::new(
            Point::new(self.start_x, self.start_y),
            Point::new(self.end_x, self.end_y),
        )
        .into_styled(PrimitiveStyle::with_stroke(self.color, self.stroke_width))
        .draw(&mut Target(self.image))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`text`]; draws the text when dropped and allows customization.
pub struct DrawText<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    text: &'a str,
    color: Color,
    alignment: Alignment,
    baseline: Baseline,
}

impl DrawText<'_> {
    /// Sets the text color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Aligns the top of the text with the `y` coordinate.
    pub fn align_top(&mut self) -> &mut Self {
        self.baseline = Baseline::Top;
        self
    }

    /// Aligns the bottom of the text with the `y` coordinate.
    pub fn align_bottom(&mut self) -> &mut Self {
        self.baseline = Baseline::Bottom;
        self
    }

    /// Aligns the left side of the text with the `x` coordinate.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }

    /// Aligns the right side of the text with the `x` coordinate.
    pub fn align_right(&mut self) -> &mut Self {
        self.alignment = Alignment::Right;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let character_style = MonoTextStyle::new(&ascii::FONT_6X10, self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        match Text::with_text_style(
            self.text,
            Point::new(self.x, self.y),
            character_style,
            text_style,
        )
        .draw(&mut Target(self.image))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Draws a rectangle onto an image.
///
/// `x` and `y` are the coordinates of the top left corner.
pub fn rect(image: &mut Image, x: i32, y: i32, width: u32, height: u32) -> DrawRect<'_> {
    DrawRect {
        image,
        x,
        y,
        width,
        height,
        color: Color::RED,
        stroke_width: 1,
        fill: None,
    }
}

/// Draws a marker onto an image.
///
/// This can be used to visualize shape landmarks or points of interest.
pub fn marker(image: &mut Image, x: i32, y: i32) -> DrawMarker<'_> {
    DrawMarker {
        image,
        x,
        y,
        color: Color::from_rgb8(255, 0, 0),
        size: 5,
    }
}

/// Draws a line onto an image.
pub fn line(image: &mut Image, start_x: i32, start_y: i32, end_x: i32, end_y: i32) -> DrawLine<'_> {
    DrawLine {
        image,
        start_x,
        start_y,
        end_x,
        end_y,
        color: Color::from_rgb8(0, 0, 255),
        stroke_width: 1,
    }
}

/// Draws a text string onto an image.
///
/// By default, the text is drawn centered horizontally and vertically around `x` and `y`.
pub fn text<'a>(image: &'a mut Image, x: i32, y: i32, text: &'a str) -> DrawText<'a> {
    DrawText {
        image,
        x,
        y,
        text,
        color: Color::from_rgb8(255, 0, 0),
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

struct Target<'a>(&'a mut Image);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        let (width, height) = (self.0.width(), self.0.height());

        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size { width, height },
        }
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0
                && (point.x as u32) < self.0.width()
                && point.y >= 0
                && (point.y as u32) < self.0.height()
            {
                self.0.set(point.x as u32, point.y as u32, color);
            }
        }

        Ok(())
    }
}
