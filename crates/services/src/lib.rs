// Copyright (c) 2024 Mike Tsao

//! Instruments backed by real hardware, kept out of the core crate so that it
//! builds and tests without any platform MIDI support.

#![deny(missing_docs)]

/// The most commonly used imports.
pub mod prelude {
    #[cfg(feature = "midi")]
    pub use super::{list_output_ports, MidirInstrument, PortSelector};
}

#[cfg(feature = "midi")]
pub use midi::{list_output_ports, MidirInstrument, PortSelector};

#[cfg(feature = "midi")]
mod midi;
