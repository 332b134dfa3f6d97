// Copyright (c) 2024 Mike Tsao

use super::{DeviceError, Instrument};
use crate::types::{MidiChannel, MidiMessage};
use std::sync::{Arc, Mutex};

/// What a [RecordingInstrument] has been sent, in order.
pub type Recording = Arc<Mutex<Vec<(MidiChannel, MidiMessage)>>>;

/// An instrument that keeps every message it receives. Useful for offline
/// rendering and tests, and as a stand-in when no hardware is attached.
#[derive(Debug)]
pub struct RecordingInstrument {
    name: String,
    is_open: bool,
    fails_to_open: bool,
    log_messages: bool,
    received: Recording,
}
impl RecordingInstrument {
    #[allow(missing_docs)]
    pub fn new_with(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_open: false,
            fails_to_open: false,
            log_messages: false,
            received: Default::default(),
        }
    }

    /// An instrument whose [Instrument::open()] always fails.
    pub fn new_broken(name: &str) -> Self {
        Self {
            fails_to_open: true,
            ..Self::new_with(name)
        }
    }

    /// Also reports each message at info level.
    pub fn with_logging(mut self) -> Self {
        self.log_messages = true;
        self
    }

    /// A handle to the messages received so far. Stays valid after the
    /// instrument has been handed to a registry.
    pub fn recording(&self) -> Recording {
        Arc::clone(&self.received)
    }
}
impl Instrument for RecordingInstrument {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), DeviceError> {
        if self.fails_to_open {
            return Err(DeviceError::Unavailable(self.name.clone()));
        }
        self.is_open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.is_open
    }

    fn close(&mut self) {
        self.is_open = false;
    }

    fn send(&mut self, channel: MidiChannel, message: MidiMessage) -> Result<(), DeviceError> {
        if !self.is_open {
            return Err(DeviceError::Unavailable(self.name.clone()));
        }
        if self.log_messages {
            log::info!("{}: ch {} {:?}", self.name, channel.0, message);
        }
        let mut received = self.received.lock().unwrap_or_else(|e| e.into_inner());
        received.push((channel, message));
        Ok(())
    }
}
