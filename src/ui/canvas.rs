use eframe::egui;

use crate::engine::Session;
use crate::gm;
use crate::notes::{ActiveNote, NoteShape, ShapeFactory, remap, sigmoid_remap};
use crate::settings::{Layout, Settings};

/// Shape magnitudes are expressed for a screen this many pixels tall.
const REFERENCE_HEIGHT: f32 = 1080.0;
const HUE_SHIFT: f32 = 140.0;

/// Where on the canvas a note sits, as fractions of width and height.
pub fn place<S>(
    note: &ActiveNote<S>,
    layout: Layout,
    settings: &Settings,
    channel_count: usize,
    track_count: usize,
) -> (f32, f32) {
    let (lo, hi) = (settings.min_note as f32, settings.max_note as f32);
    let pitch = note.pitch() as f32;

    match layout {
        Layout::Channels => {
            let x = if channel_count <= 1 {
                0.5
            } else {
                remap(
                    note.channel() as f32,
                    0.0,
                    (channel_count - 1) as f32,
                    0.1,
                    0.9,
                )
            };
            (x, remap(pitch, lo, hi, 1.0, 0.0))
        }
        Layout::Keyboard => (sigmoid_remap(pitch, lo, hi, 0.05, 0.95), 0.5),
        Layout::Tracks => {
            let rows = track_count.max(1) as f32;
            let y = note.track().map_or(0.5, |t| (t as f32 + 0.5) / rows);
            (remap(pitch, lo, hi, 0.0, 1.0), y)
        }
    }
}

/// Hue in degrees for a pitch.
pub fn hue(pitch: u8, layout: Layout, settings: &Settings) -> f32 {
    let (lo, hi) = (settings.min_note as f32, settings.max_note as f32);
    match layout {
        Layout::Keyboard => {
            (sigmoid_remap(pitch as f32, lo, hi, 0.0, 360.0) + HUE_SHIFT).rem_euclid(360.0)
        }
        Layout::Channels | Layout::Tracks => {
            remap(pitch as f32, lo, hi, 0.0, 360.0).rem_euclid(360.0)
        }
    }
}

fn color(hue: f32, opacity: f32) -> egui::Color32 {
    let opaque = egui::Color32::from(egui::ecolor::Hsva::new(hue / 360.0, 1.0, 1.0, 1.0));
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0) as u8;
    egui::Color32::from_rgba_unmultiplied(opaque.r(), opaque.g(), opaque.b(), alpha)
}

pub fn paint_notes<F>(ui: &egui::Ui, session: &Session<F>, settings: &Settings)
where
    F: ShapeFactory,
{
    let rect = ui.max_rect();
    let painter = ui.painter();
    let scale = rect.height() / REFERENCE_HEIGHT;

    for note in session.notes() {
        let shape = note.shape();
        if shape.magnitude() <= 0.0 || shape.opacity() <= 0.0 {
            continue;
        }

        let (x, y) = place(
            note,
            settings.layout,
            settings,
            session.channel_count(),
            session.track_count(),
        );
        let center = rect.min + egui::vec2(x * rect.width(), y * rect.height());
        painter.circle_filled(
            center,
            shape.magnitude() * scale,
            color(hue(note.pitch(), settings.layout, settings), shape.opacity()),
        );
    }
}

/// Instrument names above each channel column, or track names beside
/// each track row.
pub fn paint_legend<F>(ui: &egui::Ui, session: &Session<F>, settings: &Settings)
where
    F: ShapeFactory,
{
    match settings.layout {
        Layout::Channels => paint_instruments(ui, session),
        Layout::Tracks => paint_track_names(ui, session),
        Layout::Keyboard => {}
    }
}

fn paint_track_names<F>(ui: &egui::Ui, session: &Session<F>)
where
    F: ShapeFactory,
{
    let rect = ui.max_rect();
    let painter = ui.painter();
    let rows = session.track_count().max(1) as f32;

    for (track, name) in session.track_names().iter().enumerate() {
        let Some(name) = name else {
            continue;
        };
        painter.text(
            egui::pos2(rect.left() + 12.0, rect.top() + (track as f32 + 0.5) / rows * rect.height()),
            egui::Align2::LEFT_CENTER,
            name,
            egui::FontId::proportional(16.0),
            egui::Color32::GRAY,
        );
    }
}

fn paint_instruments<F>(ui: &egui::Ui, session: &Session<F>)
where
    F: ShapeFactory,
{
    let rect = ui.max_rect();
    let painter = ui.painter();
    let channels = session.channel_count();

    for (channel, program) in session.programs().iter().enumerate().take(channels) {
        let Some(program) = program else {
            continue;
        };
        let x = if channels <= 1 {
            0.5
        } else {
            remap(channel as f32, 0.0, (channels - 1) as f32, 0.1, 0.9)
        };
        painter.text(
            egui::pos2(rect.left() + x * rect.width(), rect.top() + 12.0),
            egui::Align2::CENTER_TOP,
            gm::instrument_name(channel as u8, *program),
            egui::FontId::proportional(16.0),
            egui::Color32::GRAY,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::{NoteRegistry, NoteStart, Pulse};

    fn note(pitch: u8, channel: u8, track: Option<usize>) -> ActiveNote<Pulse> {
        let mut registry = NoteRegistry::new();
        registry
            .begin(
                NoteStart {
                    pitch,
                    velocity: 100,
                    channel,
                    track,
                    at: 0.0,
                },
                Pulse::new(10.0),
            )
            .clone()
    }

    #[test]
    fn channels_spread_across_the_width() {
        let settings = Settings::default();
        let close = |a: (f32, f32), b: (f32, f32)| {
            (a.0 - b.0).abs() < 1e-5 && (a.1 - b.1).abs() < 1e-5
        };
        let first = place(&note(21, 0, None), Layout::Channels, &settings, 4, 1);
        let last = place(&note(108, 3, None), Layout::Channels, &settings, 4, 1);

        assert!(close(first, (0.1, 1.0)), "{first:?}");
        assert!(close(last, (0.9, 0.0)), "{last:?}");
        assert_eq!(
            place(&note(60, 0, None), Layout::Channels, &settings, 1, 1).0,
            0.5
        );
    }

    #[test]
    fn tracks_get_their_own_rows() {
        let settings = Settings::default();
        let (_, top) = place(&note(60, 0, Some(0)), Layout::Tracks, &settings, 1, 2);
        let (_, bottom) = place(&note(60, 0, Some(1)), Layout::Tracks, &settings, 1, 2);
        let (_, unknown) = place(&note(60, 0, None), Layout::Tracks, &settings, 1, 2);

        assert_eq!((top, bottom, unknown), (0.25, 0.75, 0.5));
    }

    #[test]
    fn hue_covers_the_pitch_range() {
        let settings = Settings::default();
        assert_eq!(hue(21, Layout::Channels, &settings), 0.0);
        assert!((hue(21, Layout::Keyboard, &settings) - 140.0).abs() < 5.0);
    }
}
