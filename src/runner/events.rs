// Copyright (c) 2024 Mike Tsao

use crate::{instruments::InstrumentRegistry, players::PlannedNote, types::MidiChannel};
use core::{cmp::Ordering, time::Duration};
use std::collections::BinaryHeap;

/// A note-on or note-off bound for a named instrument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteEvent {
    pub instrument: String,
    pub channel: MidiChannel,
    pub note: u8,
    pub velocity: u8,
    pub is_on: bool,
}
impl NoteEvent {
    /// Hands the event to its instrument. Returns whether it was sent.
    pub fn deliver(&self, registry: &InstrumentRegistry) -> bool {
        if self.is_on {
            registry.note_on(&self.instrument, self.channel, self.note, self.velocity)
        } else {
            registry.note_off(&self.instrument, self.channel, self.note, self.velocity)
        }
    }
}

/// A [NoteEvent] waiting for its moment: a tick, and an offset into it.
#[derive(Clone, Debug)]
pub struct ScheduledEvent {
    pub tick_count: u64,
    pub offset: Duration,
    seq: u64,
    pub event: NoteEvent,
}
impl ScheduledEvent {
    fn key(&self) -> (u64, Duration, u64) {
        (self.tick_count, self.offset, self.seq)
    }
}
impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for ScheduledEvent {}
impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScheduledEvent {
    // Reversed so that BinaryHeap pops the earliest first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// Future note events, ordered by tick, then offset, then insertion.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
}
impl EventQueue {
    #[allow(missing_docs)]
    pub fn schedule(&mut self, tick_count: u64, offset: Duration, event: NoteEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(ScheduledEvent {
            tick_count,
            offset,
            seq,
            event,
        });
    }

    /// Schedules the note-on at the note's delay and its note-off
    /// `note_length` later.
    pub fn schedule_note(&mut self, tick_count: u64, note: &PlannedNote, note_length: Duration) {
        let on = NoteEvent {
            instrument: note.instrument.clone(),
            channel: note.channel,
            note: note.note,
            velocity: note.velocity,
            is_on: true,
        };
        let off = NoteEvent {
            velocity: 0,
            is_on: false,
            ..on.clone()
        };
        self.schedule(tick_count, note.delay, on);
        self.schedule(tick_count, note.delay + note_length, off);
    }

    /// Removes and returns, in order, every event due at or before
    /// `tick_count`.
    pub fn drain_due(&mut self, tick_count: u64) -> Vec<ScheduledEvent> {
        let mut due = Vec::default();
        while self
            .heap
            .peek()
            .map_or(false, |e| e.tick_count <= tick_count)
        {
            if let Some(e) = self.heap.pop() {
                due.push(e);
            }
        }
        due
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[allow(missing_docs)]
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
