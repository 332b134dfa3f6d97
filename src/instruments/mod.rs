// Copyright (c) 2024 Mike Tsao

//! The instrument boundary. Players name an instrument; the registry finds it,
//! opens it when it's first needed, and sends it notes.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{DeviceError, Instrument, InstrumentRegistry, RecordingInstrument};
}

pub use {
    device::{DeviceError, Instrument},
    recording::{Recording, RecordingInstrument},
    registry::InstrumentRegistry,
};

mod device;
mod recording;
mod registry;
