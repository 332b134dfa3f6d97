// Copyright (c) 2024 Mike Tsao

#![warn(missing_docs, unused_imports, unused_variables)]
#![allow(rustdoc::private_intra_doc_links)]

//! Rulebeat is a rule-gated step sequencer that drives MIDI instruments in
//! real time.
//!
//! A [Session](orchestration::Session) owns a clock that counts ticks, beats,
//! bars, and parts, and a population of [Player](players::Player)s. On every
//! tick each player evaluates its [Rule](players::Rule)s against a snapshot of
//! the clock and decides whether to emit a note. Players can echo themselves
//! with short-lived ratchets, be muted, soloed, or gathered into mute groups.
//!
//! There are a few ways in, depending on how much control you need.
//!
//! * *Easiest*: build a [Sequencer](orchestration::Sequencer), register an
//! [Instrument](instruments::Instrument), add players, and call `play()`.
//! * *For tests and rendering*: switch the
//! [SequencerSettings](util::SequencerSettings) to
//! [RunMode::Offline](util::RunMode::Offline) and advance tick by tick with
//! `step()`.
//! * *Maximum control*: drive a [Session](orchestration::Session) yourself
//! with `before_tick()`, `Player::call()`, `absorb()`, and `after_tick()`.

/// A collection of imports that are useful to users of this crate. `use
/// rulebeat::prelude::*;` for easier onboarding.
pub mod prelude {
    pub use super::{
        instruments::prelude::*, orchestration::prelude::*, players::prelude::*,
        runner::prelude::*, timing::prelude::*, traits::prelude::*, types::prelude::*,
        util::prelude::*,
    };
}

// Fundamental structures that are important enough to re-export at top level.
pub use version::app_version;
pub use {
    orchestration::{Sequencer, Session},
    players::Player,
    runner::SequenceRunner,
};

pub mod instruments;
pub mod orchestration;
pub mod players;
pub mod runner;
pub mod timing;
pub mod traits;
pub mod types;
pub mod util;

mod version;
