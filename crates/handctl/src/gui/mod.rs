//! The preview window.
//!
//! Most platforms require the windowing event loop to run on the main thread, so
//! [`#[handctl::main]`][crate::main] hands the main thread to [`run`] and executes the application
//! on a separate thread. The application talks to the window through a [`GuiDisplay`], which
//! forwards frames to the GUI thread and receives input events from it over channels.

mod renderer;

use std::{
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    process,
    rc::Rc,
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Mutex, OnceLock,
    },
    time::Duration,
};

use thiserror::Error;
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, Event, KeyboardInput, MouseButton, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget},
    window::WindowId,
};

use crate::{
    image::{Image, Resolution},
    termination::Termination,
};

use self::renderer::{Gpu, Renderer, Window};

/// How the preview should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// A regular window with the given inner size.
    Windowed(Resolution),
    /// Borderless fullscreen on the current monitor.
    Fullscreen,
}

/// A key press relevant to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A printable character.
    Char(char),
    Space,
    Escape,
}

/// Raw user input received by a [`Display`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(Key),
    /// A left click, in the coordinate space of the most recently shown image.
    Click { x: i32, y: i32 },
    /// The user asked to close the window.
    CloseRequested,
}

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("GUI is not running (is `main` annotated with `#[handctl::main]`?)")]
    NotRunning,
    #[error("the GUI thread has shut down")]
    Closed,
}

/// A surface that presents frames to the user and reports their input.
pub trait Display {
    /// Presents `image` using the given window mode.
    fn show(&mut self, image: &Image, mode: WindowMode) -> Result<(), DisplayError>;

    /// Returns the input events received since the last call.
    ///
    /// Waits at most `timeout` for the first event.
    fn poll_input(&mut self, timeout: Duration) -> Vec<InputEvent>;

    /// Closes the display. Further calls to `show` may fail.
    fn close(&mut self);
}

enum Msg {
    Open {
        title: String,
        events: Sender<InputEvent>,
    },
    Image {
        res: Resolution,
        data: Vec<u8>,
        mode: WindowMode,
    },
    Close,
}

impl fmt::Debug for Msg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Msg::Open { title, .. } => write!(f, "Open({title:?})"),
            Msg::Image { res, mode, .. } => write!(f, "Image({res}, {mode:?})"),
            Msg::Close => f.write_str("Close"),
        }
    }
}

struct GuiWindow {
    renderer: Renderer,
    events: Sender<InputEvent>,
    cursor: PhysicalPosition<f64>,
}

impl GuiWindow {
    fn send(&self, event: InputEvent) {
        // The application may have stopped listening already.
        self.events.send(event).ok();
    }

    /// Maps the cursor position in the window to pixel coordinates of the displayed image.
    fn cursor_in_image(&self) -> Option<(i32, i32)> {
        let res = self.renderer.image_resolution()?;
        let size = self.renderer.window().inner_size();
        if size.width == 0 || size.height == 0 {
            return None;
        }
        let x = self.cursor.x * f64::from(res.width()) / f64::from(size.width);
        let y = self.cursor.y * f64::from(res.height()) / f64::from(size.height);
        Some((x as i32, y as i32))
    }
}

/// A window that was registered with [`Msg::Open`], but not shown yet.
struct Pending {
    title: String,
    events: Sender<InputEvent>,
}

/// GUI thread state. There is at most one preview window.
struct Gui {
    gpu: Option<Rc<Gpu>>,
    pending: Option<Pending>,
    window: Option<GuiWindow>,
}

impl Gui {
    fn new() -> Self {
        Self {
            gpu: None,
            pending: None,
            window: None,
        }
    }

    fn gpu(&mut self) -> anyhow::Result<Rc<Gpu>> {
        if let Some(gpu) = &self.gpu {
            return Ok(gpu.clone());
        }
        let gpu = Rc::new(pollster::block_on(Gpu::open())?);
        self.gpu = Some(gpu.clone());
        Ok(gpu)
    }

    fn window_mut(&mut self, id: WindowId) -> Option<&mut GuiWindow> {
        self.window
            .as_mut()
            .filter(|window| window.renderer.window().id() == id)
    }

    fn create_window(
        &mut self,
        target: &EventLoopWindowTarget<Msg>,
        pending: &Pending,
        mode: WindowMode,
    ) -> anyhow::Result<GuiWindow> {
        log::debug!("creating window '{}' ({mode:?})", pending.title);

        let win = Window::open(target, &pending.title, mode)?;
        let renderer = Renderer::new(win, self.gpu()?)?;
        Ok(GuiWindow {
            renderer,
            events: pending.events.clone(),
            cursor: PhysicalPosition::new(0.0, 0.0),
        })
    }

    fn handle_msg(&mut self, target: &EventLoopWindowTarget<Msg>, msg: Msg) {
        log::trace!("{msg:?}");
        match msg {
            Msg::Open { title, events } => {
                if self.window.take().is_some() {
                    log::debug!("replacing open window with '{title}'");
                }
                self.pending = Some(Pending { title, events });
            }
            Msg::Image { res, data, mode } => {
                if self.window.is_none() {
                    let Some(pending) = self.pending.take() else {
                        log::warn!("received image, but no window is open");
                        return;
                    };
                    match self.create_window(target, &pending, mode) {
                        Ok(window) => self.window = Some(window),
                        Err(e) => {
                            log::error!("failed to open window '{}': {e:#}", pending.title);
                            pending.events.send(InputEvent::CloseRequested).ok();
                            return;
                        }
                    }
                }

                if let Some(window) = &mut self.window {
                    window.renderer.set_mode(mode);
                    window.renderer.update_texture(res, &data);
                    window.renderer.window().request_redraw();
                }
            }
            Msg::Close => {
                self.pending = None;
                if self.window.take().is_some() {
                    log::debug!("closed preview window");
                }
            }
        }
    }

    fn handle_window_event(&mut self, id: WindowId, event: WindowEvent<'_>) {
        let Some(window) = self.window_mut(id) else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => window.send(InputEvent::CloseRequested),
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                window.renderer.resized();
                window.renderer.window().request_redraw();
            }
            WindowEvent::ReceivedCharacter(c) => {
                if c == ' ' {
                    window.send(InputEvent::Key(Key::Space));
                } else if c.is_ascii_alphanumeric() {
                    window.send(InputEvent::Key(Key::Char(c)));
                }
            }
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state: ElementState::Pressed,
                        virtual_keycode: Some(VirtualKeyCode::Escape),
                        ..
                    },
                ..
            } => window.send(InputEvent::Key(Key::Escape)),
            WindowEvent::CursorMoved { position, .. } => window.cursor = position,
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                if let Some((x, y)) = window.cursor_in_image() {
                    window.send(InputEvent::Click { x, y });
                }
            }
            _ => {}
        }
    }

    fn run(mut self, event_loop: EventLoop<Msg>) -> ! {
        event_loop.run(move |event, target, flow| {
            *flow = ControlFlow::Wait;
            match event {
                Event::UserEvent(msg) => self.handle_msg(target, msg),
                Event::WindowEvent { window_id, event } => {
                    self.handle_window_event(window_id, event)
                }
                Event::RedrawRequested(id) => {
                    if let Some(window) = self.window_mut(id) {
                        window.renderer.redraw();
                    }
                }
                _ => {}
            }
        });
    }
}

static PROXY: OnceLock<Mutex<EventLoopProxy<Msg>>> = OnceLock::new();

fn send(msg: Msg) -> Result<(), DisplayError> {
    let proxy = PROXY.get().ok_or(DisplayError::NotRunning)?;
    let proxy = proxy.lock().map_err(|_| DisplayError::Closed)?;
    proxy.send_event(msg).map_err(|_closed| DisplayError::Closed)
}

/// Takes over the main thread with the GUI event loop and runs `cb` on a new thread.
///
/// The process exits once `cb` returns, with a status code reflecting its [`Termination`] value.
pub(crate) fn run<F, R>(cb: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: Termination + Send,
{
    let event_loop = EventLoopBuilder::with_user_event().build();
    let proxy = event_loop.create_proxy();
    if PROXY.set(Mutex::new(proxy)).is_err() {
        panic!("GUI already initialized");
    }

    std::thread::spawn(move || {
        let result = catch_unwind(AssertUnwindSafe(cb));
        match result {
            Ok(r) => {
                if r.is_success() {
                    process::exit(0);
                } else {
                    r.report(); // may print the error message
                    process::exit(1);
                }
            }
            Err(_payload) => {
                // Panic handler has printed the panic message and backtrace already, exit with 101
                // to mimick libstd behavior.
                process::exit(101);
            }
        }
    });

    Gui::new().run(event_loop);
}

/// A [`Display`] backed by a window on the GUI thread.
///
/// The window is created lazily when the first image is shown, and closed when the
/// [`GuiDisplay`] is closed or dropped.
pub struct GuiDisplay {
    title: String,
    events: Receiver<InputEvent>,
    closed: bool,
}

impl GuiDisplay {
    /// Registers the preview window titled `title` with the GUI thread.
    ///
    /// Only one window exists at a time: opening another [`GuiDisplay`] replaces the current one.
    pub fn open(title: impl Into<String>) -> Result<Self, DisplayError> {
        let title = title.into();
        let (sender, events) = mpsc::channel();
        send(Msg::Open {
            title: title.clone(),
            events: sender,
        })?;
        Ok(Self {
            title,
            events,
            closed: false,
        })
    }
}

impl Display for GuiDisplay {
    fn show(&mut self, image: &Image, mode: WindowMode) -> Result<(), DisplayError> {
        if self.closed {
            return Err(DisplayError::Closed);
        }
        // Image data is RGBA8 internally so that no conversion before GPU upload is needed.
        send(Msg::Image {
            res: image.resolution(),
            data: image.data().to_vec(),
            mode,
        })
    }

    fn poll_input(&mut self, timeout: Duration) -> Vec<InputEvent> {
        let mut events = Vec::new();
        match self.events.recv_timeout(timeout) {
            Ok(event) => events.push(event),
            Err(RecvTimeoutError::Timeout) => return events,
            Err(RecvTimeoutError::Disconnected) => {
                // The GUI thread dropped the window.
                return vec![InputEvent::CloseRequested];
            }
        }
        events.extend(self.events.try_iter());
        events
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = send(Msg::Close) {
            log::debug!("failed to close window '{}': {e}", self.title);
        }
    }
}

impl Drop for GuiDisplay {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_requires_running_gui() {
        assert!(matches!(
            GuiDisplay::open("preview"),
            Err(DisplayError::NotRunning)
        ));
    }

    #[test]
    fn messages_omit_pixel_data() {
        let (events, _rx) = mpsc::channel();
        let open = Msg::Open {
            title: "preview".into(),
            events,
        };
        assert_eq!(format!("{open:?}"), r#"Open("preview")"#);
        let image = Msg::Image {
            res: Resolution::new(2, 1),
            data: vec![0; 8],
            mode: WindowMode::Fullscreen,
        };
        assert_eq!(format!("{image:?}"), "Image(2x1, Fullscreen)");
        assert_eq!(format!("{:?}", Msg::Close), "Close");
    }
}
