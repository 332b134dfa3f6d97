// Copyright (c) 2024 Mike Tsao

use super::{panic_message, EventQueue, NoteTimer, WorkerPool};
use crate::{
    instruments::InstrumentRegistry,
    orchestration::{lock_player, Session},
    players::TickOutcome,
    timing::StatusBoard,
    util::RunMode,
};
use anyhow::Result;
use core::time::Duration;
use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

/// Locks the session, recovering it from a poisoned lock.
pub(crate) fn lock_session(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(|e| e.into_inner())
}

/// Everything needed to process one tick: dispatch, barrier, bookkeeping,
/// delivery.
#[derive(Debug)]
pub(crate) struct Driver {
    session: Arc<Mutex<Session>>,
    registry: Arc<InstrumentRegistry>,
    board: StatusBoard,
    pool: WorkerPool,
    queue: EventQueue,
    timer: Option<NoteTimer>,
    note_length: Duration,
}
impl Driver {
    pub(crate) fn new_with(
        session: Arc<Mutex<Session>>,
        registry: Arc<InstrumentRegistry>,
        board: StatusBoard,
        max_tracks: usize,
        note_length: Duration,
        mode: RunMode,
    ) -> Self {
        let timer = match mode {
            RunMode::Realtime => Some(NoteTimer::new_with(Arc::clone(&registry))),
            RunMode::Offline => None,
        };
        Self {
            session,
            registry,
            board,
            pool: WorkerPool::new_with(max_tracks),
            queue: EventQueue::default(),
            timer,
            note_length,
        }
    }

    /// Opens instruments, prepares the session, and selects presets. Fails,
    /// leaving the session untouched, if no instrument can be opened.
    pub(crate) fn start(&mut self) -> Result<()> {
        let mut session = lock_session(&self.session);
        self.registry.open_all(&session.instrument_names())?;
        session.before_start()?;
        for (instrument, channel, program) in session.presets() {
            self.registry.program_change(&instrument, channel, program, 0);
        }
        log::info!(
            "Session {} starting with {} players at {}",
            session.uid(),
            session.player_uids().len(),
            session.settings().tempo
        );
        self.board.publish(session.status(true));
        Ok(())
    }

    /// Processes one tick.
    pub(crate) fn tick(&mut self) {
        let tick_started = Instant::now();
        let (ctx, players) = lock_session(&self.session).before_tick();

        let tasks: Vec<_> = players
            .into_iter()
            .map(|player| {
                move || {
                    let outcome = lock_player(&player).call(&ctx);
                    outcome
                }
            })
            .collect();
        let mut outcomes: Vec<TickOutcome> = self
            .pool
            .run_batch(tasks)
            .into_iter()
            .filter_map(|result| match result {
                Ok(outcome) => Some(outcome),
                Err(payload) => {
                    log::error!(
                        "A player panicked on tick #{}: {}",
                        ctx.tick_count,
                        panic_message(&*payload)
                    );
                    None
                }
            })
            .collect();

        let status = {
            let session = Arc::clone(&self.session);
            let mut session = lock_session(&session);
            session.absorb(&mut outcomes);
            for outcome in outcomes.iter() {
                for note in outcome.notes.iter() {
                    self.queue
                        .schedule_note(ctx.tick_count, note, self.note_length);
                }
            }
            self.deliver_due(ctx.tick_count, tick_started);
            session.after_tick();
            session.status(true)
        };
        self.board.publish(status);
    }

    /// Sends what's due now, and hands later events to the timer. Without a
    /// timer, everything due goes out immediately, in order.
    fn deliver_due(&mut self, tick_count: u64, tick_started: Instant) {
        for scheduled in self.queue.drain_due(tick_count) {
            match self.timer.as_ref() {
                Some(timer) if !scheduled.offset.is_zero() => {
                    timer.schedule(tick_started + scheduled.offset, scheduled.event);
                }
                _ => {
                    scheduled.event.deliver(&self.registry);
                }
            }
        }
    }

    /// Drops anything not yet delivered, silences what's sounding, and rewinds
    /// the session.
    pub(crate) fn finish(&mut self) {
        self.queue.clear();
        if let Some(timer) = self.timer.as_mut() {
            timer.cancel_all();
            timer.quit();
        }
        self.registry.release_all();
        let mut session = lock_session(&self.session);
        session.reset();
        self.board.publish(session.status(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        instruments::RecordingInstrument,
        players::{Comparison, Operator, Player, PlayerBuilder, Rule},
        types::{MidiMessage, PlayerUid},
        util::SessionSettings,
    };

    fn on_the_one(uid: i64, note: u8) -> Player {
        PlayerBuilder::default()
            .uid(PlayerUid(uid))
            .instrument("drums")
            .note(note)
            .rules(vec![Rule::new_with(Operator::Beat, Comparison::Equals, 1.0)])
            .build()
            .unwrap()
    }

    #[test]
    fn a_panicking_player_does_not_silence_the_others() {
        let mut session = Session::new_with(SessionSettings {
            ticks_per_beat: 4,
            seed: Some(3),
            ..Default::default()
        });
        session.add_player(on_the_one(1, 36));
        session.add_player(on_the_one(2, 38));
        session.add_player(on_the_one(3, 42));
        let session = Arc::new(Mutex::new(session));

        let instrument = RecordingInstrument::new_with("drums");
        let recording = instrument.recording();
        let registry = Arc::new(InstrumentRegistry::default());
        registry.register(Box::new(instrument));
        let board = StatusBoard::default();

        let mut driver = Driver::new_with(
            Arc::clone(&session),
            registry,
            board.clone(),
            4,
            Duration::from_millis(50),
            RunMode::Offline,
        );
        driver.start().unwrap();

        // Starting prepares every player, so the fault goes in afterward.
        {
            let snare = lock_session(&session).player(PlayerUid(2)).unwrap();
            lock_player(&snare).e.panics = true;
        }
        driver.tick();

        let keys: Vec<u8> = recording
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, message)| match message {
                MidiMessage::NoteOn { key, .. } => Some(key.as_int()),
                _ => None,
            })
            .collect();
        assert_eq!(keys, vec![36, 42]);

        let status = board.snapshot();
        assert_eq!(status.tick_count, 2, "the tick still completes");
        assert_eq!(status.player_count, 3, "the faulty player stays live");
        assert_eq!(status.active_player_count, 2);

        driver.finish();
    }
}
