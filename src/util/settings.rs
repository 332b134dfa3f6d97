// Copyright (c) 2024 Mike Tsao

//! Structs that hold configuration information about various parts of the
//! system. Intended to be serialized.

use crate::{traits::HasSettings, types::Tempo};
use anyhow::{anyhow, Context, Result};
use derivative::Derivative;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;

/// How the driver turns scheduled events into device output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Sub-tick offsets (swing, note length) are honored in wall-clock time.
    #[default]
    Realtime,
    /// Events are delivered in order as soon as their tick is processed.
    /// Suitable for tests and rendering.
    Offline,
}

/// Musical configuration of a session: meter, form, and tempo.
#[derive(Clone, Debug, Derivative, PartialEq, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct SessionSettings {
    #[derivative(Default(value = "24"))]
    pub ticks_per_beat: u32,
    #[derivative(Default(value = "4"))]
    pub beats_per_bar: u32,
    #[derivative(Default(value = "4"))]
    pub bars: u32,
    #[derivative(Default(value = "1"))]
    pub parts: u32,
    /// How many bars make up one part.
    #[derivative(Default(value = "4"))]
    pub part_length: u32,
    pub tempo: Tempo,
    /// Added to every note a ratchet or strike emits.
    pub note_offset: i32,
    /// Fixes the random streams of every player. `None` seeds from the OS.
    pub seed: Option<u64>,
}
impl SessionSettings {
    /// Rejects configurations that would stall or divide the clock by zero.
    pub fn validate(&self) -> Result<()> {
        if self.ticks_per_beat == 0 {
            return Err(anyhow!("ticks-per-beat must be positive"));
        }
        if self.beats_per_bar == 0 {
            return Err(anyhow!("beats-per-bar must be positive"));
        }
        if self.bars == 0 {
            return Err(anyhow!("bars must be positive"));
        }
        if self.parts == 0 {
            return Err(anyhow!("parts must be positive"));
        }
        if !Tempo::range().contains(&self.tempo.0) {
            return Err(anyhow!("tempo {} is out of range", self.tempo));
        }
        Ok(())
    }

    /// See [Tempo::beat_duration_ms()].
    pub fn beat_duration_ms(&self) -> f64 {
        self.tempo
            .beat_duration_ms(self.ticks_per_beat, self.beats_per_bar)
    }

    /// Ticks in one full pass over every bar.
    pub fn ticks_per_cycle(&self) -> u64 {
        self.ticks_per_beat as u64 * self.beats_per_bar as u64 * self.bars as u64
    }
}

/// Configuration of the engine that runs sessions.
#[derive(Debug, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct SequencerSettings {
    /// The most players that are evaluated in parallel; also the size of the
    /// worker pool.
    #[derivative(Default(value = "16"))]
    max_tracks: usize,

    /// How long the driver sleeps between looks at its clock source.
    #[derivative(Default(value = "1"))]
    poll_interval_ms: u64,

    /// How long a note sounds before its note-off.
    #[derivative(Default(value = "100"))]
    note_length_ms: u64,

    mode: RunMode,

    #[serde(skip)]
    has_been_saved: bool,
}
impl HasSettings for SequencerSettings {
    fn has_been_saved(&self) -> bool {
        self.has_been_saved
    }

    fn needs_save(&mut self) {
        self.has_been_saved = false;
    }

    fn mark_clean(&mut self) {
        self.has_been_saved = true;
    }
}
#[allow(missing_docs)]
impl SequencerSettings {
    pub fn max_tracks(&self) -> usize {
        self.max_tracks.max(1)
    }

    pub fn set_max_tracks(&mut self, max_tracks: usize) {
        if max_tracks != self.max_tracks {
            self.max_tracks = max_tracks;
            self.needs_save();
        }
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }

    pub fn set_poll_interval_ms(&mut self, poll_interval_ms: u64) {
        if poll_interval_ms != self.poll_interval_ms {
            self.poll_interval_ms = poll_interval_ms;
            self.needs_save();
        }
    }

    pub fn note_length_ms(&self) -> u64 {
        self.note_length_ms
    }

    pub fn set_note_length_ms(&mut self, note_length_ms: u64) {
        if note_length_ms != self.note_length_ms {
            self.note_length_ms = note_length_ms;
            self.needs_save();
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RunMode) {
        if mode != self.mode {
            self.mode = mode;
            self.needs_save();
        }
    }

    /// Reads settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings: Self = load_json(path)?;
        settings.mark_clean();
        Ok(settings)
    }

    /// Writes settings to a JSON file.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        save_json(path, self)?;
        self.mark_clean();
        Ok(())
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

impl SessionSettings {
    /// Reads settings from a JSON file and validates them.
    pub fn load(path: &Path) -> Result<Self> {
        let settings: Self = load_json(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Writes settings to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(path, self)
    }
}
