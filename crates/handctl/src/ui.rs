//! The toggle panel drawn over the preview.
//!
//! [`ToggleUi`] renders one row per [`Toggle`] (checkboxes for the feature switches, buttons for
//! maximize and lock) and turns raw [`InputEvent`]s into [`UiEvent`]s for the control loop.

use crate::{
    gui::{InputEvent, Key},
    image::{draw, Color, Image, Resolution},
    state::{ControlState, Toggle},
};

const MARGIN: i32 = 8;
const PADDING: i32 = 4;
const ROW_HEIGHT: u32 = 16;
const CHECKBOX_SIZE: u32 = 9;

const PANEL_BG: Color = Color::from_rgba8(0, 0, 0, 255);
const PANEL_FG: Color = Color::WHITE;
const ACTIVE: Color = Color::GREEN;
const LOCKED: Color = Color::RED;

/// A state change requested through the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    Toggle(Toggle),
    Quit,
}

/// An axis-aligned rectangle in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && y >= self.y
            && x < self.x + self.width as i32
            && y < self.y + self.height as i32
    }
}

/// Returns the key that flips `toggle`.
pub fn key_for(toggle: Toggle) -> char {
    match toggle {
        Toggle::Volume => 'v',
        Toggle::Brightness => 'b',
        Toggle::Mouse => 'm',
        Toggle::Landmarks => 'l',
        Toggle::Maximized => 'f',
        Toggle::Locked => 'g',
    }
}

fn toggle_for(c: char) -> Option<Toggle> {
    let c = c.to_ascii_lowercase();
    Toggle::ALL.into_iter().find(|t| key_for(*t) == c)
}

fn is_button(toggle: Toggle) -> bool {
    matches!(toggle, Toggle::Maximized | Toggle::Locked)
}

fn row_label(toggle: Toggle, state: &ControlState) -> &'static str {
    match toggle {
        Toggle::Volume => "Control Volume (Right Hand)",
        Toggle::Brightness => "Control Brightness (Left Hand)",
        Toggle::Mouse => "Control Mouse Pointer",
        Toggle::Landmarks => "Show Hand Landmarks",
        Toggle::Maximized => state.maximize_label(),
        Toggle::Locked => state.lock_label(),
    }
}

/// Widest label (in characters, including the `[k] ` key prefix) any row can have.
fn max_label_len() -> usize {
    let mut alt = ControlState::default();
    alt.set_locked(true);
    alt.set_maximized(true);
    Toggle::ALL
        .into_iter()
        .flat_map(|t| [row_label(t, &ControlState::default()), row_label(t, &alt)])
        .map(|label| label.len() + 4)
        .max()
        .unwrap_or(0)
}

/// Panel of toggles and the status readout.
pub struct ToggleUi {
    /// Resolution of the frame the panel was last drawn onto, used for hit-testing clicks.
    frame: Option<Resolution>,
    panel_width: u32,
}

impl Default for ToggleUi {
    fn default() -> Self {
        Self::new()
    }
}

impl ToggleUi {
    pub fn new() -> Self {
        let text_width = max_label_len() as u32 * draw::GLYPH_SIZE.0;
        Self {
            frame: None,
            panel_width: PADDING as u32 * 3 + CHECKBOX_SIZE + text_width,
        }
    }

    /// Returns the clickable area of the row for `toggle` in a frame of resolution `res`.
    ///
    /// The panel is anchored to the top right corner of the frame.
    pub fn hit_box(&self, toggle: Toggle, res: Resolution) -> Rect {
        let row = Toggle::ALL
            .iter()
            .position(|t| *t == toggle)
            .unwrap_or_default();
        let x = (res.width() as i32 - MARGIN - self.panel_width as i32).max(0);
        Rect {
            x,
            y: MARGIN + row as i32 * ROW_HEIGHT as i32,
            width: self.panel_width,
            height: ROW_HEIGHT,
        }
    }

    /// Translates a raw input event into a [`UiEvent`].
    ///
    /// Clicks are only recognized after the panel has been drawn at least once, since the layout
    /// depends on the frame size.
    pub fn translate(&self, event: &InputEvent) -> Option<UiEvent> {
        match *event {
            InputEvent::CloseRequested => Some(UiEvent::Quit),
            InputEvent::Key(Key::Space | Key::Escape) => Some(UiEvent::Quit),
            InputEvent::Key(Key::Char(c)) => toggle_for(c).map(UiEvent::Toggle),
            InputEvent::Click { x, y } => {
                let res = self.frame?;
                Toggle::ALL
                    .into_iter()
                    .find(|t| self.hit_box(*t, res).contains(x, y))
                    .map(UiEvent::Toggle)
            }
        }
    }

    /// Applies a toggle event to `state`.
    ///
    /// Returns `true` if the event requests the application to quit.
    pub fn apply(&self, state: &mut ControlState, event: UiEvent) -> bool {
        match event {
            UiEvent::Quit => {
                log::info!("quit requested");
                true
            }
            UiEvent::Toggle(toggle) => {
                let on = state.toggle(toggle);
                log::info!("{toggle}: {}", if on { "on" } else { "off" });
                false
            }
        }
    }

    /// Draws the panel, the status line and the key legend onto `image`.
    pub fn draw(&mut self, image: &mut Image, state: &ControlState) {
        let res = image.resolution();
        self.frame = Some(res);

        for toggle in Toggle::ALL {
            let hit = self.hit_box(toggle, res);
            draw::rect(image, hit.x, hit.y, hit.width, hit.height)
                .color(PANEL_BG)
                .fill(PANEL_BG);

            let on = state.get(toggle);
            let box_x = hit.x + PADDING;
            let box_y = hit.y + (ROW_HEIGHT - CHECKBOX_SIZE) as i32 / 2;
            let text_x = box_x + CHECKBOX_SIZE as i32 + PADDING;
            let text_y = hit.y + ROW_HEIGHT as i32 / 2;
            let label = format!("[{}] {}", key_for(toggle), row_label(toggle, state));

            if is_button(toggle) {
                let color = match toggle {
                    Toggle::Locked if on => LOCKED,
                    _ => PANEL_FG,
                };
                draw::rect(image, hit.x + 1, hit.y + 1, hit.width - 2, hit.height - 2)
                    .color(color);
                draw::text(image, text_x, text_y, &label)
                    .color(color)
                    .align_left();
            } else {
                let mut checkbox =
                    draw::rect(image, box_x, box_y, CHECKBOX_SIZE, CHECKBOX_SIZE);
                checkbox.color(PANEL_FG);
                if on {
                    checkbox.fill(ACTIVE);
                }
                drop(checkbox);
                draw::text(image, text_x, text_y, &label)
                    .color(PANEL_FG)
                    .align_left();
            }
        }

        let below = self.hit_box(Toggle::Locked, res);
        let status = state.status_text();
        draw::text(
            image,
            below.x + below.width as i32,
            below.y + below.height as i32 + PADDING,
            &status,
        )
        .color(PANEL_FG)
        .align_right()
        .align_top();

        draw::text(
            image,
            MARGIN,
            res.height() as i32 - MARGIN,
            "[Space/Esc] Quit",
        )
        .color(PANEL_FG)
        .align_left()
        .align_bottom();
    }
}
