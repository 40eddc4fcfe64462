use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::{CommandRenderer, EnergyOnsetDetector, RenderFailurePolicy};
use crate::error::SettingsError;
use crate::notes::{ShapeKind, ShapeStyle};
use crate::timing::Partition;

/// How notes are placed on screen, and therefore how note-offs are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum Layout {
    /// One column per MIDI channel, pitch on the vertical axis.
    Channels,
    /// A single keyboard-like row, pitch on the horizontal axis.
    Keyboard,
    /// One row per file track, pitch on the horizontal axis.
    Tracks,
}

impl Layout {
    pub fn partition(self) -> Partition {
        match self {
            Layout::Channels | Layout::Keyboard => Partition::Channel,
            Layout::Tracks => Partition::Track,
        }
    }

    pub fn shape_kind(self) -> ShapeKind {
        match self {
            Layout::Channels => ShapeKind::PitchBloom,
            Layout::Keyboard => ShapeKind::SigmoidBloom,
            Layout::Tracks => ShapeKind::VelocityPulse,
        }
    }
}

/// Startup tunables. Every field has a default, so a settings file only
/// needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub width: f32,
    pub height: f32,
    pub frame_rate: u32,
    /// Pitch range mapped onto the screen (A0 to C8 by default).
    pub min_note: u8,
    pub max_note: u8,
    pub circle_scale: f32,
    pub layout: Layout,
    pub on_render_failure: RenderFailurePolicy,
    pub renderer: CommandRenderer,
    pub onset: EnergyOnsetDetector,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
            frame_rate: 60,
            min_note: 21,
            max_note: 108,
            circle_scale: 10.0,
            layout: Layout::Channels,
            on_render_failure: RenderFailurePolicy::Abort,
            renderer: CommandRenderer::default(),
            onset: EnergyOnsetDetector::default(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&text)
    }

    pub fn from_ron(text: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str(text)?)
    }

    pub fn to_ron(&self) -> Result<String, SettingsError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn shape_style(&self) -> ShapeStyle {
        ShapeStyle {
            kind: self.layout.shape_kind(),
            min_note: self.min_note,
            max_note: self.max_note,
            circle_scale: self.circle_scale,
        }
    }
}
