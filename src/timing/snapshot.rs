// Copyright (c) 2024 Mike Tsao

use super::Clock;
use crate::util::SessionSettings;
use crossbeam::atomic::AtomicCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything a player may look at while deciding whether to fire. Built once
/// per tick, before dispatch, so that every player sees the same clock.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickContext {
    pub tick: u64,
    pub beat: u64,
    pub bar: u64,
    pub part: u64,
    pub tick_count: u64,
    pub beat_count: u64,
    pub bar_count: u64,
    pub part_count: u64,
    pub ticks_per_beat: u32,
    /// See [Tempo::beat_duration_ms()](crate::types::Tempo::beat_duration_ms).
    pub beat_duration_ms: f64,
    pub note_offset: i32,
    /// Whether any live player is soloed.
    pub has_solos: bool,
}
impl TickContext {
    #[allow(missing_docs)]
    pub fn new_with(clock: &Clock, settings: &SessionSettings, has_solos: bool) -> Self {
        Self {
            tick: clock.tick(),
            beat: clock.beat(),
            bar: clock.bar(),
            part: clock.part(),
            tick_count: clock.tick_count(),
            beat_count: clock.beat_count(),
            bar_count: clock.bar_count(),
            part_count: clock.part_count(),
            ticks_per_beat: settings.ticks_per_beat,
            beat_duration_ms: settings.beat_duration_ms(),
            note_offset: settings.note_offset,
            has_solos,
        }
    }
}

/// A read-only projection of a session for status and reporting layers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionStatus {
    pub tick: u64,
    pub beat: u64,
    pub bar: u64,
    pub part: u64,
    pub tick_count: u64,
    pub beat_count: u64,
    pub bar_count: u64,
    pub part_count: u64,
    pub player_count: usize,
    /// Players that fired on the most recent tick.
    pub active_player_count: usize,
    pub tempo: f64,
    pub is_running: bool,
}

/// Where the driver publishes [SessionStatus]. Reading never waits on the
/// driver; cloning shares the same cell.
#[derive(Clone, Debug, Default)]
pub struct StatusBoard(Arc<AtomicCell<SessionStatus>>);
impl StatusBoard {
    /// The most recently published status.
    pub fn snapshot(&self) -> SessionStatus {
        self.0.load()
    }

    pub(crate) fn publish(&self, status: SessionStatus) {
        self.0.store(status);
    }

    pub(crate) fn set_running(&self, is_running: bool) {
        let mut status = self.0.load();
        status.is_running = is_running;
        self.0.store(status);
    }
}
