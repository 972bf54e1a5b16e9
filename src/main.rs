mod audio;
mod audio_api;
mod control;
mod error;
mod loader;
mod middle;
mod midi;
mod pipeline;
mod settings;
mod shared;
mod tui;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{info, warn, Level};
use tracing_subscriber::util::SubscriberInitExt;

use audio_api::AudioCommand;
use control::ControlSurface;
use loader::{MediaLibrary, MediaMode};
use middle::Middle;
use midi::MidiInputHandler;
use settings::Settings;
use shared::ControlEvent;

#[derive(Parser, Debug)]
#[command(name = "scansynth", about = "Play an image by scanning it with a row of oscillators")]
struct Args {
    /// Still image to scan
    image: Option<PathBuf>,

    /// Animated GIF played as a looping live feed
    #[arg(long)]
    video: Option<PathBuf>,

    /// JSON settings read at start-up
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Connect to the first MIDI input whose name contains this
    #[arg(long)]
    midi: Option<String>,

    /// Log file (default: scansynth.log in the temp dir)
    #[arg(long)]
    log: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Print MIDI inputs and exit
    #[arg(long)]
    list_midi: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    // the terminal belongs to the TUI, so logs go to a file
    let path = args
        .log
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("scansynth.log"));
    let file = File::create(&path).with_context(|| format!("cannot create log {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .compact()
        .finish()
        .init();
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.list_midi {
        for d in MidiInputHandler::list_devices()? {
            println!("{}: {}", d.index, d.name);
        }
        return Ok(());
    }

    init_logging(&args)?;

    let settings = match &args.settings {
        Some(path) => settings::load_settings(path)?,
        None => Settings::default(),
    };

    // command line wins over the settings file
    let image = args.image.clone().or(settings.image.clone());
    let video = args.video.clone().or(settings.video.clone());
    let mode = settings.source.unwrap_or(if image.is_none() && video.is_some() {
        MediaMode::Video
    } else {
        MediaMode::Image
    });

    let audio = audio::start_audio()?;
    let library = MediaLibrary::new(image, video);
    let mut middle = Middle::new(settings.config.clone(), Box::new(library), mode);

    let mut midi = MidiInputHandler::new();
    if let Some(name) = args.midi.as_deref().or(settings.midi_device.as_deref()) {
        match midi.connect(name) {
            Ok(()) => middle.set_midi_input(midi.current().map(str::to_string)),
            Err(e) => {
                warn!("{e}");
                middle.set_status(e.to_string());
            }
        }
    }
    let surface = ControlSurface::new(settings.midi.clone());

    terminal::enable_raw_mode()?;
    // focus-lost stands in for the display being hidden
    let _ = crossterm::execute!(std::io::stdout(), crossterm::event::EnableFocusChange);
    let _guard = RawModeGuard; // auto drops when out of scope

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;
    info!(mode = mode.label(), "started");

    let tick_rate = Duration::from_millis(16); // ~60fps
    let mut last_tick = Instant::now();
    let mut tui_state = tui::mode::TuiState::default();

    loop {
        let ds = middle.display_state().clone();
        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, &tui_state);
        })?;

        let mut events = tui::input::poll_input(tick_rate, &mut tui_state)?;
        for msg in midi.drain() {
            events.extend(surface.from_midi(msg));
        }

        for event in events {
            match event {
                ControlEvent::Quit => {
                    audio.send(AudioCommand::ReleaseAll);
                    drop(term);
                    info!("quit");
                    return Ok(());
                }
                ControlEvent::NextMidiInput => match midi.cycle() {
                    Ok(name) => {
                        middle.set_status(format!("midi: {name}"));
                        middle.set_midi_input(Some(name));
                    }
                    Err(e) => {
                        warn!("{e}");
                        middle.set_status(e.to_string());
                        // a failed switch may already have dropped the old port
                        middle.set_midi_input(midi.current().map(str::to_string));
                    }
                },
                event => {
                    for cmd in middle.handle_control(event) {
                        audio.send(cmd);
                    }
                }
            }
        }

        let elapsed = last_tick.elapsed().as_secs_f64();
        last_tick = Instant::now();
        for cmd in middle.tick(elapsed) {
            audio.send(cmd);
        }
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(std::io::stdout(), crossterm::event::DisableFocusChange);
        let _ = terminal::disable_raw_mode();
    }
}
