use std::{cell::Cell, collections::VecDeque, time::Duration};

use anyhow::bail;
use approx::assert_relative_eq;
use handctl::{
    control::{BrightnessControl, ControlError, CursorControl, VolumeControl},
    control_loop::{ControlLoop, Devices, LoopError, LoopOptions},
    detect::{DetectError, HandDetector},
    gesture::ControlRange,
    gui::{Display, DisplayError, InputEvent, Key, WindowMode},
    hand::{HandObservation, Handedness, Landmark, LandmarkIdx, NUM_LANDMARKS},
    image::{Color, Image, Resolution},
    timer::Timer,
    video::FrameSource,
};

const FRAME: Resolution = Resolution::new(640, 480);

struct FakeCamera {
    frame: Image,
    /// 1-based index of the capture that fails.
    fail_at: Option<usize>,
    captures: usize,
    releases: usize,
    timer: Timer,
    timer_queries: Cell<usize>,
}

impl FrameSource for FakeCamera {
    fn capture_frame(&mut self) -> anyhow::Result<Image> {
        self.captures += 1;
        if self.fail_at == Some(self.captures) {
            bail!("camera unplugged");
        }
        Ok(self.frame.clone())
    }

    fn release(&mut self) {
        self.releases += 1;
    }

    fn timers(&self) -> Vec<&Timer> {
        self.timer_queries.set(self.timer_queries.get() + 1);
        vec![&self.timer]
    }
}

#[derive(Default)]
struct FakeDetector {
    hands: Vec<HandObservation>,
    fail: bool,
    seen: Vec<Image>,
}

impl HandDetector for FakeDetector {
    fn detect(&mut self, image: &Image) -> Result<Vec<HandObservation>, DetectError> {
        self.seen.push(image.clone());
        if self.fail {
            return Err(DetectError::Exited);
        }
        Ok(self.hands.clone())
    }
}

struct FakeVolume {
    range: ControlRange,
    current: Option<f32>,
    fail: bool,
    calls: Vec<f32>,
}

impl VolumeControl for FakeVolume {
    fn volume_range(&self) -> ControlRange {
        self.range
    }

    fn current_level(&mut self) -> Result<f32, ControlError> {
        self.current
            .ok_or(ControlError::Unsupported("volume query unavailable"))
    }

    fn set_level(&mut self, level: f32) -> Result<(), ControlError> {
        self.calls.push(level);
        if self.fail {
            return Err(ControlError::Unsupported("volume unavailable"));
        }
        Ok(())
    }
}

struct FakeBrightness {
    current: Option<u8>,
    fail: bool,
    calls: Vec<u8>,
}

impl BrightnessControl for FakeBrightness {
    fn current_brightness(&mut self) -> Result<u8, ControlError> {
        self.current
            .ok_or(ControlError::Unsupported("brightness query unavailable"))
    }

    fn set_brightness(&mut self, percent: u8) -> Result<(), ControlError> {
        self.calls.push(percent);
        if self.fail {
            return Err(ControlError::Unsupported("brightness unavailable"));
        }
        Ok(())
    }
}

struct FakeCursor {
    screen: Resolution,
    calls: Vec<(i32, i32)>,
}

impl CursorControl for FakeCursor {
    fn screen_size(&self) -> Resolution {
        self.screen
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<(), ControlError> {
        self.calls.push((x, y));
        Ok(())
    }
}

#[derive(Default)]
struct FakeDisplay {
    input: VecDeque<Vec<InputEvent>>,
    fail_show: bool,
    modes: Vec<WindowMode>,
    last: Option<Image>,
    closes: usize,
}

impl Display for FakeDisplay {
    fn show(&mut self, image: &Image, mode: WindowMode) -> Result<(), DisplayError> {
        if self.fail_show {
            return Err(DisplayError::Closed);
        }
        self.modes.push(mode);
        self.last = Some(image.clone());
        Ok(())
    }

    fn poll_input(&mut self, _timeout: Duration) -> Vec<InputEvent> {
        self.input.pop_front().unwrap_or_default()
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

struct Rig {
    camera: FakeCamera,
    detector: FakeDetector,
    volume: FakeVolume,
    brightness: FakeBrightness,
    cursor: FakeCursor,
    display: FakeDisplay,
}

impl Rig {
    fn new() -> Self {
        Self {
            camera: FakeCamera {
                frame: Image::filled(FRAME, Color::BLACK),
                fail_at: None,
                captures: 0,
                releases: 0,
                timer: Timer::new("camera"),
                timer_queries: Cell::new(0),
            },
            detector: FakeDetector::default(),
            volume: FakeVolume {
                range: ControlRange::new(-65.25, 0.0),
                current: Some(-65.25),
                fail: false,
                calls: Vec::new(),
            },
            brightness: FakeBrightness {
                current: Some(40),
                fail: false,
                calls: Vec::new(),
            },
            cursor: FakeCursor {
                screen: Resolution::RES_1080P,
                calls: Vec::new(),
            },
            display: FakeDisplay::default(),
        }
    }

    fn with_hands(mut self, hands: impl IntoIterator<Item = HandObservation>) -> Self {
        self.detector.hands = hands.into_iter().collect();
        self
    }

    fn control_loop(&mut self) -> ControlLoop<'_> {
        self.control_loop_with(LoopOptions::default())
    }

    fn control_loop_with(&mut self, options: LoopOptions) -> ControlLoop<'_> {
        ControlLoop::new(
            Devices {
                camera: &mut self.camera,
                detector: &mut self.detector,
                volume: &mut self.volume,
                brightness: &mut self.brightness,
                cursor: &mut self.cursor,
                display: &mut self.display,
            },
            options,
        )
    }

    fn no_setters_called(&self) -> bool {
        self.volume.calls.is_empty()
            && self.brightness.calls.is_empty()
            && self.cursor.calls.is_empty()
    }
}

fn hand(handedness: Handedness, thumb: (f32, f32), index: (f32, f32)) -> HandObservation {
    HandObservation::new(handedness, [Landmark::new(0.1, 0.9); NUM_LANDMARKS])
        .with_landmark(LandmarkIdx::ThumbTip, Landmark::new(thumb.0, thumb.1))
        .with_landmark(LandmarkIdx::IndexFingerTip, Landmark::new(index.0, index.1))
}

fn mouse_options(cursor_hand: Handedness) -> LoopOptions {
    let mut options = LoopOptions {
        cursor_hand,
        ..LoopOptions::default()
    };
    options.toggles.mouse = true;
    options
}

#[test]
fn close_pinch_sets_minimum_volume() {
    let mut rig = Rig::new().with_hands([hand(Handedness::Right, (0.30, 0.50), (0.30, 0.54))]);
    rig.volume.current = Some(-20.0);

    let mut control_loop = rig.control_loop();
    assert!(control_loop.step().unwrap());
    assert_eq!(control_loop.state().volume_percent(), 0);
    drop(control_loop);

    assert_eq!(rig.volume.calls, [-65.25]);
    assert!(rig.brightness.calls.is_empty());
}

#[test]
fn wide_pinch_sets_brightness() {
    let mut rig = Rig::new().with_hands([hand(Handedness::Left, (0.20, 0.50), (0.20, 0.18))]);

    let mut control_loop = rig.control_loop();
    assert!(control_loop.step().unwrap());
    assert_eq!(control_loop.state().brightness_percent(), 55);
    assert_eq!(
        control_loop.state().status_text(),
        "Status: Volume: 0% Brightness: 55%"
    );
    drop(control_loop);

    assert_eq!(rig.brightness.calls, [55]);
    assert!(rig.volume.calls.is_empty());
}

#[test]
fn volume_percent_follows_level() {
    // Distance 0.3 is halfway through the pinch domain.
    let mut rig = Rig::new().with_hands([hand(Handedness::Right, (0.5, 0.2), (0.5, 0.5))]);

    let mut control_loop = rig.control_loop();
    control_loop.step().unwrap();
    assert_eq!(control_loop.state().volume_percent(), 50);
    drop(control_loop);

    assert_eq!(rig.volume.calls.len(), 1);
    assert_relative_eq!(rig.volume.calls[0], -32.625, epsilon = 1e-3);
}

#[test]
fn locked_never_calls_setters() {
    let mut rig = Rig::new().with_hands([
        hand(Handedness::Left, (0.2, 0.5), (0.2, 0.1)),
        hand(Handedness::Right, (0.6, 0.5), (0.6, 0.1)),
    ]);

    let mut options = mouse_options(Handedness::Right);
    options.toggles.locked = true;
    let mut control_loop = rig.control_loop_with(options);
    for _ in 0..3 {
        assert!(control_loop.step().unwrap());
    }
    assert_eq!(control_loop.state().volume_percent(), 0);
    assert_eq!(control_loop.state().brightness_percent(), 40);
    drop(control_loop);

    assert!(rig.no_setters_called());
    // Detection and rendering continue while locked.
    assert_eq!(rig.detector.seen.len(), 3);
    assert_eq!(rig.display.modes.len(), 3);
}

#[test]
fn disabled_volume_is_not_set() {
    let mut rig = Rig::new().with_hands([hand(Handedness::Right, (0.6, 0.5), (0.6, 0.1))]);

    let mut control_loop = rig.control_loop();
    control_loop.state_mut().set_volume_enabled(false);
    control_loop.step().unwrap();
    drop(control_loop);

    assert!(rig.volume.calls.is_empty());
}

#[test]
fn capture_failure_ends_loop() {
    let mut rig = Rig::new().with_hands([hand(Handedness::Right, (0.6, 0.5), (0.6, 0.1))]);
    rig.camera.fail_at = Some(1);

    let control_loop = rig.control_loop();
    let err = control_loop.run().unwrap_err();
    assert!(matches!(err, LoopError::Capture(_)));
    assert!(err.to_string().contains("camera unplugged"));

    assert_eq!(rig.camera.captures, 1);
    assert_eq!(rig.camera.releases, 1);
    assert_eq!(rig.display.closes, 1);
    assert!(rig.detector.seen.is_empty());
    assert!(rig.no_setters_called());
}

#[test]
fn capture_failure_releases_once() {
    let mut rig = Rig::new();
    rig.camera.fail_at = Some(2);

    let mut control_loop = rig.control_loop();
    assert!(control_loop.step().unwrap());
    assert!(control_loop.step().is_err());
    // No further frames are captured after a failure.
    assert!(!control_loop.step().unwrap());
    drop(control_loop);

    assert_eq!(rig.camera.captures, 2);
    assert_eq!(rig.camera.releases, 1);
    assert_eq!(rig.display.closes, 1);
}

#[test]
fn both_hands_move_cursor_with_right() {
    let mut rig = Rig::new().with_hands([
        hand(Handedness::Left, (0.1, 0.1), (0.1, 0.1)),
        hand(Handedness::Right, (0.75, 0.5), (0.75, 0.25)),
    ]);

    let mut control_loop = rig.control_loop_with(mouse_options(Handedness::Right));
    control_loop.step().unwrap();
    drop(control_loop);

    assert_eq!(rig.cursor.calls, [(1440, 270)]);
}

#[test]
fn cursor_hand_is_configurable() {
    let mut rig = Rig::new().with_hands([
        hand(Handedness::Right, (0.75, 0.5), (0.75, 0.25)),
        hand(Handedness::Left, (0.25, 0.5), (0.25, 0.5)),
    ]);

    let mut control_loop = rig.control_loop_with(mouse_options(Handedness::Left));
    control_loop.step().unwrap();
    drop(control_loop);

    assert_eq!(rig.cursor.calls, [(480, 540)]);
}

#[test]
fn single_hand_moves_cursor() {
    let mut rig = Rig::new().with_hands([hand(Handedness::Left, (0.0, 0.0), (0.5, 0.5))]);

    let mut control_loop = rig.control_loop_with(mouse_options(Handedness::Right));
    control_loop.step().unwrap();
    drop(control_loop);

    assert_eq!(rig.cursor.calls, [(960, 540)]);
}

#[test]
fn mouse_disabled_by_default() {
    let mut rig = Rig::new().with_hands([hand(Handedness::Right, (0.5, 0.5), (0.5, 0.5))]);

    let mut control_loop = rig.control_loop();
    control_loop.step().unwrap();
    drop(control_loop);

    assert!(rig.cursor.calls.is_empty());
    assert_eq!(rig.volume.calls, [-65.25]);
}

#[test]
fn duplicate_handedness_keeps_first() {
    let mut rig = Rig::new().with_hands([
        // Distance 0.5: maximum volume.
        hand(Handedness::Right, (0.5, 0.0), (0.5, 0.5)),
        // Distance 0: minimum volume.
        hand(Handedness::Right, (0.5, 0.5), (0.5, 0.5)),
    ]);

    let mut control_loop = rig.control_loop();
    control_loop.step().unwrap();
    assert_eq!(control_loop.state().volume_percent(), 100);
    drop(control_loop);

    assert_eq!(rig.volume.calls, [0.0]);
}

#[test]
fn frame_is_mirrored_before_detection() {
    let mut rig = Rig::new();
    rig.camera.frame.set(0, 5, Color::RED);

    let mut control_loop = rig.control_loop();
    control_loop.step().unwrap();
    drop(control_loop);

    let seen = &rig.detector.seen[0];
    assert_eq!(seen.get(FRAME.width() - 1, 5), Color::RED);
    assert_eq!(seen.get(0, 5), Color::BLACK);
}

#[test]
fn failed_set_leaves_percent_unchanged() {
    let mut rig = Rig::new().with_hands([
        hand(Handedness::Left, (0.2, 0.5), (0.2, 0.1)),
        hand(Handedness::Right, (0.6, 0.5), (0.6, 0.1)),
    ]);
    rig.volume.current = Some(-32.625);
    rig.brightness.fail = true;
    rig.volume.fail = true;

    let mut control_loop = rig.control_loop();
    assert_eq!(control_loop.state().volume_percent(), 50);
    assert!(control_loop.step().unwrap());
    assert!(control_loop.step().unwrap());
    assert_eq!(control_loop.state().volume_percent(), 50);
    assert_eq!(control_loop.state().brightness_percent(), 40);
    drop(control_loop);

    // Both controls are retried on every frame.
    assert_eq!(rig.volume.calls.len(), 2);
    assert_eq!(rig.brightness.calls, [75, 75]);
}

#[test]
fn failed_queries_start_at_zero() {
    let mut rig = Rig::new();
    rig.volume.current = None;
    rig.brightness.current = None;

    let control_loop = rig.control_loop();
    assert_eq!(control_loop.state().volume_percent(), 0);
    assert_eq!(control_loop.state().brightness_percent(), 0);
}

#[test]
fn detector_error_is_a_miss() {
    let mut rig = Rig::new().with_hands([hand(Handedness::Right, (0.6, 0.5), (0.6, 0.1))]);
    rig.detector.fail = true;

    let mut control_loop = rig.control_loop();
    assert!(control_loop.step().unwrap());
    assert!(control_loop.step().unwrap());
    drop(control_loop);

    assert!(rig.no_setters_called());
    assert_eq!(rig.display.modes.len(), 2);
}

#[test]
fn quit_key_stops_on_next_iteration() {
    let mut rig = Rig::new();
    rig.display.input = VecDeque::from([vec![InputEvent::Key(Key::Space)]]);

    let mut control_loop = rig.control_loop();
    assert!(!control_loop.step().unwrap());
    assert!(control_loop.quit_requested());
    assert!(!control_loop.step().unwrap());
    drop(control_loop);

    assert_eq!(rig.camera.captures, 1);
    assert_eq!(rig.camera.releases, 1);
    assert_eq!(rig.display.closes, 1);
}

#[test]
fn run_until_window_closed() {
    let mut rig = Rig::new();
    rig.display.input = VecDeque::from([
        vec![],
        vec![InputEvent::Key(Key::Char('x'))],
        vec![InputEvent::CloseRequested],
    ]);

    rig.control_loop().run().unwrap();

    assert_eq!(rig.camera.captures, 3);
    assert_eq!(rig.camera.releases, 1);
    assert_eq!(rig.display.closes, 1);
}

#[test]
fn lock_key_stops_control() {
    let mut rig = Rig::new().with_hands([hand(Handedness::Right, (0.6, 0.5), (0.6, 0.1))]);
    rig.display.input = VecDeque::from([vec![InputEvent::Key(Key::Char('g'))]]);

    let mut control_loop = rig.control_loop();
    control_loop.step().unwrap();
    assert!(control_loop.state().locked());
    assert_eq!(control_loop.state().lock_label(), "Unlock Control");
    control_loop.step().unwrap();
    drop(control_loop);

    // Only the frame before the lock took effect changed the volume.
    assert_eq!(rig.volume.calls.len(), 1);
}

#[test]
fn maximize_key_switches_window_mode() {
    let mut rig = Rig::new();
    rig.display.input = VecDeque::from([
        vec![InputEvent::Key(Key::Char('f'))],
        vec![InputEvent::Key(Key::Char('f'))],
    ]);

    let mut control_loop = rig.control_loop();
    for _ in 0..3 {
        control_loop.step().unwrap();
    }
    drop(control_loop);

    assert_eq!(
        rig.display.modes,
        [
            WindowMode::Windowed(Resolution::RES_720P),
            WindowMode::Fullscreen,
            WindowMode::Windowed(Resolution::RES_720P),
        ]
    );
}

#[test]
fn display_failure_quits() {
    let mut rig = Rig::new();
    rig.display.fail_show = true;

    let mut control_loop = rig.control_loop();
    assert!(!control_loop.step().unwrap());
    assert!(!control_loop.step().unwrap());
    drop(control_loop);

    assert_eq!(rig.camera.captures, 1);
    assert_eq!(rig.display.closes, 1);
}

#[test]
fn landmarks_can_be_hidden() {
    // All landmarks except the finger tips sit at (0.1, 0.9), which is (64, 432) in the frame.
    let hands = [hand(Handedness::Right, (0.6, 0.5), (0.6, 0.1))];

    let mut rig = Rig::new().with_hands(hands.clone());
    let mut control_loop = rig.control_loop();
    control_loop.step().unwrap();
    drop(control_loop);
    let shown = rig.display.last.take().unwrap();
    assert_eq!(shown.get(64, 432), Color::RED);

    let mut rig = Rig::new().with_hands(hands);
    let mut control_loop = rig.control_loop();
    control_loop.state_mut().set_show_landmarks(false);
    control_loop.step().unwrap();
    drop(control_loop);
    let shown = rig.display.last.take().unwrap();
    assert_eq!(shown.get(64, 432), Color::BLACK);
}

#[test]
fn frame_source_timers_are_reported() {
    let mut rig = Rig::new();

    let mut control_loop = rig.control_loop();
    assert!(control_loop.step().unwrap());
    assert!(control_loop.step().unwrap());
    drop(control_loop);

    assert_eq!(rig.camera.timer_queries.get(), 2);
}
