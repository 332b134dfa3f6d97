// Copyright (c) 2024 Mike Tsao

use super::{driver::lock_session, ClockSource, Driver, WallClock};
use crate::{
    instruments::InstrumentRegistry,
    orchestration::Session,
    timing::{SessionStatus, StatusBoard},
    util::{RunMode, SequencerSettings},
};
use anyhow::{anyhow, Result};
use core::time::Duration;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::JoinHandle,
};

#[derive(Debug, Default)]
enum RunState {
    #[default]
    Stopped,
    /// Ticks happen when [SequenceRunner::step()] is called.
    Offline(Box<Driver>),
    /// A driver thread follows the clock source.
    Realtime {
        should_stop: Arc<AtomicBool>,
        handle: JoinHandle<()>,
    },
}

/// Drives a [Session] through time.
///
/// In [RunMode::Realtime], `play()` starts a thread that watches a
/// [ClockSource] and processes a tick each time one comes due. In
/// [RunMode::Offline], ticks happen only when asked for, and every note
/// event is delivered as soon as its tick is processed.
#[derive(Debug)]
pub struct SequenceRunner {
    session: Arc<Mutex<Session>>,
    registry: Arc<InstrumentRegistry>,
    clock_source: Arc<dyn ClockSource>,
    board: StatusBoard,

    max_tracks: usize,
    poll_interval: Duration,
    note_length: Duration,
    mode: RunMode,

    state: RunState,
}
impl SequenceRunner {
    #[allow(missing_docs)]
    pub fn new_with(
        session: Arc<Mutex<Session>>,
        registry: Arc<InstrumentRegistry>,
        settings: &SequencerSettings,
    ) -> Self {
        Self {
            session,
            registry,
            clock_source: Arc::new(WallClock::default()),
            board: StatusBoard::default(),
            max_tracks: settings.max_tracks(),
            poll_interval: Duration::from_millis(settings.poll_interval_ms()),
            note_length: Duration::from_millis(settings.note_length_ms()),
            mode: settings.mode(),
            state: RunState::default(),
        }
    }

    /// Follows a different time source from the next `play()` on.
    pub fn set_clock_source(&mut self, clock_source: Arc<dyn ClockSource>) {
        self.clock_source = clock_source;
    }

    /// Where status snapshots are published.
    pub fn status_board(&self) -> StatusBoard {
        self.board.clone()
    }

    /// The most recent status.
    pub fn status(&self) -> SessionStatus {
        self.board.snapshot()
    }

    #[allow(missing_docs)]
    pub fn is_running(&self) -> bool {
        !matches!(self.state, RunState::Stopped)
    }

    #[allow(missing_docs)]
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Starts the session. Fails, and stays stopped, if the session's
    /// settings are invalid or none of its instruments can be opened.
    pub fn play(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        let mut driver = Driver::new_with(
            Arc::clone(&self.session),
            Arc::clone(&self.registry),
            self.board.clone(),
            self.max_tracks,
            self.note_length,
            self.mode,
        );
        if let Err(e) = driver.start() {
            log::error!("Couldn't start the session: {e}");
            return Err(e);
        }

        self.state = match self.mode {
            RunMode::Offline => RunState::Offline(Box::new(driver)),
            RunMode::Realtime => self.spawn_realtime(driver)?,
        };
        Ok(())
    }

    fn spawn_realtime(&self, mut driver: Driver) -> Result<RunState> {
        let tick_duration = {
            let session = lock_session(&self.session);
            session
                .settings()
                .tempo
                .tick_duration(session.settings().ticks_per_beat)
        };
        let should_stop = Arc::new(AtomicBool::default());
        let clock_source = Arc::clone(&self.clock_source);
        let poll_interval = self.poll_interval;
        let thread_should_stop = Arc::clone(&should_stop);
        clock_source.restart();

        let handle = std::thread::Builder::new()
            .name("rulebeat-driver".to_string())
            .spawn(move || {
                let mut processed: u64 = 0;
                while !thread_should_stop.load(Ordering::Relaxed) {
                    let due = ticks_due(clock_source.elapsed(), tick_duration);
                    while processed < due && !thread_should_stop.load(Ordering::Relaxed) {
                        driver.tick();
                        processed += 1;
                    }
                    std::thread::sleep(poll_interval);
                }
                driver.finish();
            });
        match handle {
            Ok(handle) => Ok(RunState::Realtime {
                should_stop,
                handle,
            }),
            Err(e) => {
                // The driver never ran, but it did start the session.
                let session = Arc::clone(&self.session);
                lock_session(&session).reset();
                Err(anyhow!("Couldn't start the driver thread: {e}"))
            }
        }
    }

    /// Processes one tick. Offline mode only.
    pub fn step(&mut self) -> Result<()> {
        match &mut self.state {
            RunState::Offline(driver) => {
                driver.tick();
                Ok(())
            }
            RunState::Stopped => Err(anyhow!("The session isn't playing")),
            RunState::Realtime { .. } => {
                Err(anyhow!("step() drives offline sessions only"))
            }
        }
    }

    /// Processes `count` ticks. Offline mode only.
    pub fn run_ticks(&mut self, count: u64) -> Result<()> {
        for _ in 0..count {
            self.step()?;
        }
        Ok(())
    }

    /// Halts the driver after its current tick, silences sounding notes, and
    /// rewinds the clock.
    pub fn pause(&mut self) {
        match core::mem::take(&mut self.state) {
            RunState::Stopped => return,
            RunState::Offline(mut driver) => driver.finish(),
            RunState::Realtime {
                should_stop,
                handle,
            } => {
                should_stop.store(true, Ordering::Relaxed);
                if handle.join().is_err() {
                    log::error!("The driver thread panicked");
                    self.registry.release_all();
                    lock_session(&self.session).reset();
                }
            }
        }
        self.board.set_running(false);
        log::info!("Session paused");
    }

    /// Like [SequenceRunner::pause()], and also closes the instruments.
    pub fn stop(&mut self) {
        let was_running = self.is_running();
        self.pause();
        self.registry.close_all();
        if was_running {
            log::info!("Session stopped");
        }
    }
}
impl Drop for SequenceRunner {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

/// How many ticks should have been processed by `elapsed`. The first comes
/// due at once.
fn ticks_due(elapsed: Duration, tick_duration: Duration) -> u64 {
    if tick_duration.is_zero() {
        return 1;
    }
    (elapsed.as_nanos() / tick_duration.as_nanos()) as u64 + 1
}
