// Copyright (c) 2024 Mike Tsao

use super::{DeviceError, Instrument};
use crate::{
    types::{MidiChannel, MidiMessage},
    util::{MidiUtils, SoundingNotes},
};
use anyhow::{anyhow, Result};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

#[derive(Debug)]
struct Slot {
    device: Box<dyn Instrument>,
    sounding: SoundingNotes,
}

/// Instruments by name, shared between the driver and the note timer.
///
/// Devices are opened lazily, and every write is preceded by an is-open
/// check. Device faults are logged and the message is dropped; nothing here
/// stops the tick.
#[derive(Debug, Default)]
pub struct InstrumentRegistry {
    slots: RwLock<FxHashMap<String, Arc<Mutex<Slot>>>>,
}
impl InstrumentRegistry {
    /// Adds an instrument under its own name, replacing any previous one of
    /// that name.
    pub fn register(&self, device: Box<dyn Instrument>) {
        let name = device.name().to_string();
        let slot = Arc::new(Mutex::new(Slot {
            device,
            sounding: SoundingNotes::default(),
        }));
        self.write_slots().insert(name, slot);
    }

    #[allow(missing_docs)]
    pub fn contains(&self, name: &str) -> bool {
        self.read_slots().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_slots().keys().cloned().collect();
        names.sort();
        names
    }

    #[allow(missing_docs)]
    pub fn is_open(&self, name: &str) -> bool {
        self.slot(name)
            .map_or(false, |slot| lock(&slot).device.is_open())
    }

    /// Tries to open every named instrument. Succeeds if at least one opened
    /// (or if nothing was asked for); the rest are logged and will be retried
    /// when they're next played.
    pub fn open_all(&self, names: &[String]) -> Result<usize> {
        let mut opened = 0;
        for name in names {
            match self.ensure_open(name) {
                Ok(()) => opened += 1,
                Err(e) => log::warn!("Couldn't open instrument {name}: {e}"),
            }
        }
        if opened == 0 && !names.is_empty() {
            return Err(anyhow!(
                "None of the instruments {names:?} could be opened"
            ));
        }
        Ok(opened)
    }

    /// Closes every instrument.
    pub fn close_all(&self) {
        for slot in self.read_slots().values() {
            lock(slot).device.close();
        }
    }

    #[allow(missing_docs)]
    pub fn note_on(&self, name: &str, channel: MidiChannel, note: u8, velocity: u8) -> bool {
        self.deliver(name, channel, |device| {
            device.note_on(channel, note, velocity)?;
            Ok(vec![MidiUtils::new_note_on(note, velocity)])
        })
    }

    #[allow(missing_docs)]
    pub fn note_off(&self, name: &str, channel: MidiChannel, note: u8, velocity: u8) -> bool {
        self.deliver(name, channel, |device| {
            device.note_off(channel, note, velocity)?;
            Ok(vec![MidiUtils::new_note_off(note, velocity)])
        })
    }

    #[allow(missing_docs)]
    pub fn program_change(&self, name: &str, channel: MidiChannel, program: u8, bank: u8) -> bool {
        self.deliver(name, channel, |device| {
            device.program_change(channel, program, bank)?;
            Ok(Vec::default())
        })
    }

    /// Sends a note-off for every note still sounding on every instrument.
    pub fn release_all(&self) {
        for (name, slot) in self.read_slots().iter() {
            let mut slot = lock(slot);
            for (channel, message) in slot.sounding.release_all() {
                if let Err(e) = slot.device.send(channel, message) {
                    log::warn!("{name}: couldn't release a note: {e}");
                }
            }
        }
    }

    /// Whether any instrument has a note sounding.
    pub fn is_any_sounding(&self) -> bool {
        self.read_slots()
            .values()
            .any(|slot| lock(slot).sounding.is_any_sounding())
    }

    fn deliver(
        &self,
        name: &str,
        channel: MidiChannel,
        send: impl FnOnce(&mut dyn Instrument) -> Result<Vec<MidiMessage>, DeviceError>,
    ) -> bool {
        let Some(slot) = self.slot(name) else {
            log::warn!("No instrument named {name}; dropping message");
            return false;
        };
        let mut slot = lock(&slot);
        if !slot.device.is_open() {
            if let Err(e) = slot.device.open() {
                log::warn!("{name}: {e}; dropping message");
                return false;
            }
        }
        match send(slot.device.as_mut()) {
            Ok(sent) => {
                for message in sent.iter() {
                    slot.sounding.watch(channel, message);
                }
                true
            }
            Err(e) => {
                log::warn!("{name}: {e}; note dropped");
                false
            }
        }
    }

    fn ensure_open(&self, name: &str) -> Result<(), DeviceError> {
        let slot = self
            .slot(name)
            .ok_or_else(|| DeviceError::Unavailable(name.to_string()))?;
        let mut slot = lock(&slot);
        if !slot.device.is_open() {
            slot.device.open()?;
        }
        Ok(())
    }

    fn slot(&self, name: &str) -> Option<Arc<Mutex<Slot>>> {
        self.read_slots().get(name).cloned()
    }

    fn read_slots(&self) -> std::sync::RwLockReadGuard<'_, FxHashMap<String, Arc<Mutex<Slot>>>> {
        self.slots.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_slots(&self) -> std::sync::RwLockWriteGuard<'_, FxHashMap<String, Arc<Mutex<Slot>>>> {
        self.slots.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::RecordingInstrument;

    #[test]
    fn opens_lazily_and_tracks_sounding_notes() {
        let registry = InstrumentRegistry::default();
        let drums = RecordingInstrument::new_with("drums");
        let recording = drums.recording();
        registry.register(Box::new(drums));
        assert!(!registry.is_open("drums"));

        assert!(registry.note_on("drums", MidiChannel::DRUM, 36, 100));
        assert!(registry.is_open("drums"));
        assert!(registry.is_any_sounding());

        registry.release_all();
        assert!(!registry.is_any_sounding());
        let received = recording.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[1].1, MidiUtils::new_note_off(36, 0));
    }

    #[test]
    fn faults_drop_the_message() {
        let registry = InstrumentRegistry::default();
        registry.register(Box::new(RecordingInstrument::new_broken("ghost")));
        assert!(!registry.note_on("ghost", MidiChannel::DRUM, 36, 100));
        assert!(!registry.note_on("nobody", MidiChannel::DRUM, 36, 100));
        assert!(!registry.is_any_sounding());
    }

    #[test]
    fn open_all_needs_one_success() {
        let registry = InstrumentRegistry::default();
        registry.register(Box::new(RecordingInstrument::new_broken("ghost")));
        assert!(registry.open_all(&["ghost".to_string()]).is_err());
        assert!(registry.open_all(&[]).is_ok());

        registry.register(Box::new(RecordingInstrument::new_with("drums")));
        assert_eq!(
            registry
                .open_all(&["ghost".to_string(), "drums".to_string()])
                .unwrap(),
            1
        );
        assert_eq!(registry.names(), vec!["drums", "ghost"]);
    }
}
