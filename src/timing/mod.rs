// Copyright (c) 2024 Mike Tsao

//! The timing hierarchy: bounded counters nested into a tick/beat/bar/part
//! clock, and the snapshots of it that players and reporting layers read.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{Clock, Cycler, SessionStatus, StatusBoard, TickContext};
}

pub use {
    clock::{Clock, Rollover},
    cycler::Cycler,
    snapshot::{SessionStatus, StatusBoard, TickContext},
};

mod clock;
mod cycler;
mod snapshot;
