// Copyright (c) 2024 Mike Tsao

use crate::{
    types::{MidiChannel, MidiMessage},
    util::MidiUtils,
};
use thiserror::Error;

/// Ways an instrument can fail to take a message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device couldn't be opened, or went away.
    #[error("device {0} is unavailable")]
    Unavailable(String),

    /// A note, velocity, or channel outside the MIDI range.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The device is open but refused the bytes.
    #[error("failed to send to device {0}: {1}")]
    Send(String, String),
}

/// The narrow boundary between the sequencer and anything that makes sound.
///
/// Implementors supply [Instrument::open()], [Instrument::is_open()], and
/// [Instrument::send()]; the note and program helpers validate their arguments
/// and build the messages.
pub trait Instrument: core::fmt::Debug + Send {
    /// The name players use to find this instrument.
    fn name(&self) -> &str;

    /// Acquires the underlying device. Calling it on an open instrument is
    /// harmless.
    fn open(&mut self) -> Result<(), DeviceError>;

    #[allow(missing_docs)]
    fn is_open(&self) -> bool;

    /// Releases the underlying device.
    fn close(&mut self) {}

    /// Writes one channel message to the device.
    fn send(&mut self, channel: MidiChannel, message: MidiMessage) -> Result<(), DeviceError>;

    #[allow(missing_docs)]
    fn note_on(&mut self, channel: MidiChannel, note: u8, velocity: u8) -> Result<(), DeviceError> {
        check_data(channel, &[note, velocity])?;
        self.send(channel, MidiUtils::new_note_on(note, velocity))
    }

    #[allow(missing_docs)]
    fn note_off(
        &mut self,
        channel: MidiChannel,
        note: u8,
        velocity: u8,
    ) -> Result<(), DeviceError> {
        check_data(channel, &[note, velocity])?;
        self.send(channel, MidiUtils::new_note_off(note, velocity))
    }

    /// Selects `bank`, then `program`.
    fn program_change(
        &mut self,
        channel: MidiChannel,
        program: u8,
        bank: u8,
    ) -> Result<(), DeviceError> {
        check_data(channel, &[program, bank])?;
        self.send(channel, MidiUtils::new_bank_select(bank))?;
        self.send(channel, MidiUtils::new_program_change(program))
    }
}

fn check_data(channel: MidiChannel, values: &[u8]) -> Result<(), DeviceError> {
    if !channel.is_valid() {
        return Err(DeviceError::InvalidData(format!("channel {}", channel.0)));
    }
    if let Some(bad) = values.iter().find(|v| **v > 127) {
        return Err(DeviceError::InvalidData(format!("value {bad}")));
    }
    Ok(())
}
