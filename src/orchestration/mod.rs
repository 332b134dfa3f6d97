// Copyright (c) 2024 Mike Tsao

//! Sessions, their persistence, and the control surface that edits them.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        InMemoryRepository, Repository, Sequencer, Session, SessionRecord, SharedPlayer,
    };
}

pub use {
    repositories::{InMemoryRepository, Persistent, Repository},
    sequencer::Sequencer,
    session::{lock_player, Session, SessionRecord, SharedPlayer},
};

mod repositories;
mod sequencer;
mod session;
