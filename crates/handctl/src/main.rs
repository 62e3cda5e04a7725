use clap::Parser;
use handctl::{
    config::{Args, Config},
    control::command::CommandBackend,
    control_loop::{ControlLoop, Devices, LoopOptions},
    detect::{HandDetector, NoHands, SubprocessDetector},
    gui::GuiDisplay,
    video,
};

#[handctl::main]
fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args)?;
    log::debug!("{config:?}");

    let mut camera = video::open(&config.camera)?;
    let mut detector: Box<dyn HandDetector> = match &config.detector.command {
        Some(command) => Box::new(SubprocessDetector::spawn(
            command,
            config.detector.min_score,
        )?),
        None => {
            log::warn!("no detector configured (see `--detector`), no hands will be found");
            Box::new(NoHands)
        }
    };
    let mut backend = CommandBackend::new(&config)?;
    let mut display = GuiDisplay::open("Hand Gesture Control")?;

    let control_loop = ControlLoop::new(
        Devices {
            camera: &mut *camera,
            detector: &mut *detector,
            volume: &mut backend.volume,
            brightness: &mut backend.brightness,
            cursor: &mut backend.cursor,
            display: &mut display,
        },
        LoopOptions::from(&config),
    );
    control_loop.run()?;

    Ok(())
}
