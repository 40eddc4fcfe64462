mod canvas;

use std::time::Duration;

use eframe::egui;
use tracing::{info, warn};

use crate::audio::AudioOutput;
use crate::engine::{Phase, Session};
use crate::notes::ShapeStyle;
use crate::settings::Settings;
use crate::timing::MonotonicClock;

pub use canvas::{hue, place};

pub struct SyncApp {
    session: Session<ShapeStyle>,
    settings: Settings,
    clock: MonotonicClock,
    output: Option<AudioOutput>,
    frame_interval: Duration,
}

impl SyncApp {
    pub fn new(session: Session<ShapeStyle>, settings: Settings) -> Self {
        let frame_interval = Duration::from_secs_f64(1.0 / settings.frame_rate.max(1) as f64);
        Self {
            session,
            settings,
            clock: MonotonicClock::new(),
            output: None,
            frame_interval,
        }
    }

    fn handle_input(&mut self, ctx: &egui::Context) {
        let (quit, enter) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Escape) || i.key_pressed(egui::Key::Q),
                i.key_pressed(egui::Key::Enter),
            )
        });

        if quit {
            info!("Quit requested");
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
        if enter && self.session.phase() == Phase::Ready {
            self.start_playback();
        }
    }

    fn start_playback(&mut self) {
        if let Some(track) = self.session.take_audio() {
            match AudioOutput::start(&track) {
                Ok(output) => self.output = Some(output),
                Err(e) => warn!("Playing without audio: {}", e),
            }
        }
        self.session.start(self.clock.now());
    }

    fn message(ui: &mut egui::Ui, text: &str) {
        ui.centered_and_justified(|ui| {
            ui.label(
                egui::RichText::new(text)
                    .size(50.0)
                    .color(egui::Color32::WHITE),
            );
        });
    }
}

impl eframe::App for SyncApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_input(ctx);
        self.session.tick(self.clock.now());

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(egui::Color32::BLACK))
            .show(ctx, |ui| match self.session.phase() {
                Phase::Loading => Self::message(ui, "Loading..."),
                Phase::Ready => {
                    let length = self.session.duration();
                    Self::message(
                        ui,
                        &format!(
                            "Ready, press ENTER to play\n{}:{:04.1}",
                            (length / 60.0) as u64,
                            length % 60.0
                        ),
                    );
                }
                Phase::Failed => {
                    let reason = self.session.failure().unwrap_or("Loading failed");
                    Self::message(ui, &format!("{reason}\nPress ESC to quit"));
                }
                Phase::Playing => {
                    canvas::paint_notes(ui, &self.session, &self.settings);
                    canvas::paint_legend(ui, &self.session, &self.settings);
                    if self.session.degraded().is_some() {
                        ui.label(egui::RichText::new("no audio").color(egui::Color32::DARK_GRAY));
                    }
                }
            });

        ctx.request_repaint_after(self.frame_interval);
    }
}
