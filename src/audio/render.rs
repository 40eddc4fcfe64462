use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AudioRenderError;

/// Turns a MIDI file into a WAV file on disk.
pub trait AudioRenderer: Send {
    fn render(&self, midi: &Path) -> Result<PathBuf, AudioRenderError>;
}

/// Renders by running an external synthesizer. `{midi}` and `{wav}` in
/// `args` are replaced with the input and output paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandRenderer {
    pub program: String,
    pub args: Vec<String>,
    pub output_dir: PathBuf,
}

impl Default for CommandRenderer {
    fn default() -> Self {
        Self {
            program: "timidity".into(),
            args: vec!["{midi}".into(), "-Ow".into(), "-o".into(), "{wav}".into()],
            output_dir: std::env::temp_dir().join("midisync"),
        }
    }
}

impl CommandRenderer {
    fn output_path(&self, midi: &Path) -> PathBuf {
        let stem = midi
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "score".into());
        self.output_dir.join(format!("{stem}.wav"))
    }
}

impl AudioRenderer for CommandRenderer {
    fn render(&self, midi: &Path) -> Result<PathBuf, AudioRenderError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| AudioRenderError::OutputDir {
            path: self.output_dir.clone(),
            source,
        })?;

        let wav = self.output_path(midi);
        match fs::remove_file(&wav) {
            Ok(()) => debug!("Removed previous render {}", wav.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(AudioRenderError::StaleOutput { path: wav, source }),
        }

        let midi_arg = midi.to_string_lossy();
        let wav_arg = wav.to_string_lossy();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace("{midi}", &midi_arg).replace("{wav}", &wav_arg))
            .collect();

        debug!("Running {} {:?}", self.program, args);
        let status = Command::new(&self.program)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| AudioRenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(AudioRenderError::Failed {
                program: self.program.clone(),
                status,
            });
        }
        if !wav.is_file() {
            return Err(AudioRenderError::MissingOutput(wav));
        }

        Ok(wav)
    }
}
