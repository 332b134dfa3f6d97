// Copyright (c) 2024 Mike Tsao

//! Common data types used throughout the system.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        MidiChannel, MidiMessage, PlayerUid, RuleUid, SessionUid, Tempo, UidFactory,
    };
}

pub use {
    midi::{u4, u7, LiveEvent, MidiChannel, MidiMessage, MidiPortDescriptor},
    time::Tempo,
    uid::{IsUid, PlayerUid, RuleUid, SessionUid, UidFactory},
};

mod midi;
mod time;
mod uid;
