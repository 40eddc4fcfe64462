use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use midisync::audio::RenderFailurePolicy;
use midisync::{Layout, LoaderJob, Session, Settings, SyncApp, Timeline, spawn_loader};

#[derive(Parser)]
#[command(name = "midisync")]
#[command(about = "Visualise a MIDI file in sync with its rendered audio", long_about = None)]
struct Args {
    /// MIDI file to play. A file dialog opens when omitted.
    midi: Option<PathBuf>,

    /// RON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Screen layout, overriding the settings file
    #[arg(short, long, value_enum)]
    layout: Option<Layout>,

    /// Keep going without audio when rendering fails
    #[arg(long)]
    degraded: bool,

    /// Print the effective settings as RON and exit
    #[arg(long)]
    dump_config: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(layout) = args.layout {
        settings.layout = layout;
    }
    if args.degraded {
        settings.on_render_failure = RenderFailurePolicy::ZeroOffset;
    }

    if args.dump_config {
        println!("{}", settings.to_ron()?);
        return Ok(());
    }

    let midi_path = match args.midi {
        Some(path) => path,
        None => match rfd::FileDialog::new()
            .add_filter("MIDI", &["mid", "midi"])
            .pick_file()
        {
            Some(path) => path,
            None => {
                info!("No MIDI file selected");
                return Ok(());
            }
        },
    };

    let timeline = Timeline::load(&midi_path, settings.layout.partition()).inspect_err(|e| {
        error!("Cannot load {}: {}", midi_path.display(), e);
    })?;

    let loader = spawn_loader(LoaderJob {
        midi_path: midi_path.clone(),
        midi_onset: timeline.first_note_on().unwrap_or(0.0),
        policy: settings.on_render_failure,
        renderer: Box::new(settings.renderer.clone()),
        detector: Box::new(settings.onset.clone()),
    });
    let session = Session::new(timeline, settings.shape_style(), loader);

    let title = format!(
        "midisync - {}",
        midi_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([settings.width, settings.height])
            .with_title(title),
        ..Default::default()
    };

    eframe::run_native(
        "midisync",
        options,
        Box::new(move |_cc| Ok(Box::new(SyncApp::new(session, settings)))),
    )?;

    Ok(())
}
