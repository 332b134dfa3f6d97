// Copyright (c) 2024 Mike Tsao

use super::NoteEvent;
use crate::instruments::InstrumentRegistry;
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::{
    cmp::Reverse,
    collections::BinaryHeap,
    sync::Arc,
    thread::JoinHandle,
    time::Instant,
};

enum NoteTimerInput {
    Schedule(Instant, NoteEvent),
    /// Drop everything still waiting.
    Cancel,
    Quit,
}

/// Delivers note events at wall-clock moments inside a tick (swing, note-off)
/// on its own thread, so the driver never sleeps for them.
#[derive(Debug)]
pub struct NoteTimer {
    sender: Sender<NoteTimerInput>,
    handle: Option<JoinHandle<()>>,
}
impl NoteTimer {
    #[allow(missing_docs)]
    pub fn new_with(registry: Arc<InstrumentRegistry>) -> Self {
        let (sender, receiver) = unbounded();
        let handle = std::thread::Builder::new()
            .name("rulebeat-note-timer".to_string())
            .spawn(move || NoteTimerDaemon::new_with(receiver, registry).execute())
            .map_err(|e| log::error!("Couldn't start the note timer: {e}"))
            .ok();
        Self { sender, handle }
    }

    /// Delivers `event` at `when`, or at once if that's already past.
    pub fn schedule(&self, when: Instant, event: NoteEvent) {
        if self.sender.send(NoteTimerInput::Schedule(when, event)).is_err() {
            log::warn!("The note timer has stopped; dropping an event");
        }
    }

    /// Forgets every event that hasn't been delivered yet.
    pub fn cancel_all(&self) {
        let _ = self.sender.send(NoteTimerInput::Cancel);
    }

    /// Stops the thread. Undelivered events are dropped.
    pub fn quit(&mut self) {
        let _ = self.sender.send(NoteTimerInput::Quit);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
impl Drop for NoteTimer {
    fn drop(&mut self) {
        self.quit();
    }
}

struct Pending {
    when: Instant,
    seq: u64,
    event: NoteEvent,
}
impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        (self.when, self.seq) == (other.when, other.seq)
    }
}
impl Eq for Pending {}
impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.when, self.seq).cmp(&(other.when, other.seq))
    }
}

struct NoteTimerDaemon {
    receiver: Receiver<NoteTimerInput>,
    registry: Arc<InstrumentRegistry>,
    pending: BinaryHeap<Reverse<Pending>>,
    next_seq: u64,
}
impl NoteTimerDaemon {
    fn new_with(receiver: Receiver<NoteTimerInput>, registry: Arc<InstrumentRegistry>) -> Self {
        Self {
            receiver,
            registry,
            pending: Default::default(),
            next_seq: 0,
        }
    }

    fn execute(&mut self) {
        loop {
            self.deliver_due();
            let input = match self.pending.peek() {
                Some(Reverse(next)) => match self.receiver.recv_deadline(next.when) {
                    Ok(input) => input,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.receiver.recv() {
                    Ok(input) => input,
                    Err(_) => break,
                },
            };
            match input {
                NoteTimerInput::Schedule(when, event) => {
                    let seq = self.next_seq;
                    self.next_seq += 1;
                    self.pending.push(Reverse(Pending { when, seq, event }));
                }
                NoteTimerInput::Cancel => self.pending.clear(),
                NoteTimerInput::Quit => break,
            }
        }
    }

    fn deliver_due(&mut self) {
        let now = Instant::now();
        while self
            .pending
            .peek()
            .map_or(false, |Reverse(p)| p.when <= now)
        {
            if let Some(Reverse(p)) = self.pending.pop() {
                p.event.deliver(&self.registry);
            }
        }
    }
}
