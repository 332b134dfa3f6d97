// Copyright (c) 2024 Mike Tsao

//! System utilities.

/// Commonly used imports.
pub mod prelude {
    pub use super::{
        rng::Rng,
        settings::{RunMode, SequencerSettings, SessionSettings},
    };
}

pub use midi::{MidiUtils, SoundingNotes};
pub use rng::Rng;
pub use settings::{RunMode, SequencerSettings, SessionSettings};

mod midi;
mod rng;
mod settings;
