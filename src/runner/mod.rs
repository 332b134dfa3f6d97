// Copyright (c) 2024 Mike Tsao

//! The real-time driver. It follows a [ClockSource], fans each tick out to a
//! [WorkerPool], waits for every player, and delivers the resulting notes
//! through an [EventQueue] and the [NoteTimer].

/// The most commonly used imports.
pub mod prelude {
    pub use super::{ClockSource, ManualClock, SequenceRunner, WallClock};
}

pub use {
    clock_source::{ClockSource, ManualClock, WallClock},
    events::{EventQueue, NoteEvent, ScheduledEvent},
    pool::{panic_message, WorkerPool},
    sequence_runner::SequenceRunner,
    timer::NoteTimer,
};

pub(crate) use driver::Driver;

mod clock_source;
mod driver;
mod events;
mod pool;
mod sequence_runner;
mod timer;
