// Copyright (c) 2024 Mike Tsao

use crate::types::{u7, LiveEvent, MidiChannel, MidiMessage};
use bit_vec::BitVec;
use core::fmt::Debug;

/// Provides MIDI-related utility functionality.
pub struct MidiUtils {}
impl MidiUtils {
    /// Convenience function to make a note-on [MidiMessage].
    pub fn new_note_on(note: u8, vel: u8) -> MidiMessage {
        MidiMessage::NoteOn {
            key: u7::from_int_lossy(note),
            vel: u7::from_int_lossy(vel),
        }
    }

    /// Convenience function to make a note-off [MidiMessage].
    pub fn new_note_off(note: u8, vel: u8) -> MidiMessage {
        MidiMessage::NoteOff {
            key: u7::from_int_lossy(note),
            vel: u7::from_int_lossy(vel),
        }
    }

    /// Convenience function to make a program-change [MidiMessage].
    pub fn new_program_change(program: u8) -> MidiMessage {
        MidiMessage::ProgramChange {
            program: u7::from_int_lossy(program),
        }
    }

    /// Bank select (MSB) is controller 0.
    pub fn new_bank_select(bank: u8) -> MidiMessage {
        MidiMessage::Controller {
            controller: u7::from(0),
            value: u7::from_int_lossy(bank),
        }
    }

    /// Encodes a channel message as wire bytes.
    pub fn to_bytes(channel: MidiChannel, message: MidiMessage) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(3);
        let event = LiveEvent::Midi {
            channel: channel.as_u4(),
            message,
        };
        // Writing into a Vec can't fail.
        let _ = event.write_std(&mut bytes);
        bytes
    }
}

/// [SoundingNotes] watches a stream of outgoing MIDI messages and remembers
/// which notes are currently active on each channel (we've sent a note-on
/// without a note-off). When asked, it produces the note-off messages that
/// silence all of them.
#[derive(Debug)]
pub struct SoundingNotes {
    active_notes: Vec<BitVec>,
}
impl Default for SoundingNotes {
    fn default() -> Self {
        Self {
            active_notes: vec![BitVec::from_elem(128, false); MidiChannel::COUNT],
        }
    }
}
impl SoundingNotes {
    /// Records a message that was just sent.
    pub fn watch(&mut self, channel: MidiChannel, message: &MidiMessage) {
        let Some(notes) = self.active_notes.get_mut(channel.0 as usize) else {
            return;
        };
        match message {
            MidiMessage::NoteOff { key, .. } => {
                notes.set(key.as_int() as usize, false);
            }
            MidiMessage::NoteOn { key, vel } => {
                notes.set(key.as_int() as usize, *vel != u7::from(0));
            }
            _ => {}
        }
    }

    /// Whether any note is currently sounding.
    pub fn is_any_sounding(&self) -> bool {
        self.active_notes.iter().any(|notes| notes.any())
    }

    /// Returns note-offs for every sounding note and forgets them.
    pub fn release_all(&mut self) -> Vec<(MidiChannel, MidiMessage)> {
        let mut v = Vec::default();
        for (channel, notes) in self.active_notes.iter_mut().enumerate() {
            for (key, is_active) in notes.iter().enumerate() {
                if is_active {
                    v.push((
                        MidiChannel(channel as u8),
                        MidiUtils::new_note_off(key as u8, 0),
                    ));
                }
            }
            notes.clear();
        }
        v
    }
}
