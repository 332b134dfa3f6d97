// Copyright (c) 2024 Mike Tsao

use super::Cycler;
use crate::util::SessionSettings;
use serde::{Deserialize, Serialize};

/// Which levels of the hierarchy rolled over during one
/// [Clock::after_tick()].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rollover {
    /// The tick just processed was the last of its beat.
    pub beat: bool,
    /// ...and that beat was the last of its bar.
    pub bar: bool,
    /// ...and that bar was the last of its part.
    pub part: bool,
}

/// The nested tick/beat/bar/part clock.
///
/// Each level is a [Cycler] paired with a monotonic counter. A level advances
/// only when the level beneath it reaches a multiple of its size, and every
/// boundary test looks at the value *before* that level advances, so a bar
/// ends right after the last tick of its last beat.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Clock {
    tick: Cycler,
    beat: Cycler,
    bar: Cycler,
    part: Cycler,

    #[serde(skip)]
    tick_count: u64,
    #[serde(skip)]
    beat_count: u64,
    #[serde(skip)]
    bar_count: u64,
    #[serde(skip)]
    part_count: u64,

    /// Fractional beat position, in beats, within the current beat.
    #[serde(skip)]
    granular_beat: f64,

    ticks_per_beat: u64,
    beats_per_bar: u64,
    part_length: u64,
}
#[allow(missing_docs)]
impl Clock {
    pub fn new_with(settings: &SessionSettings) -> Self {
        let mut r = Self::default();
        r.configure(settings);
        r
    }

    /// Sizes every level from the settings. Positions are untouched.
    pub fn configure(&mut self, settings: &SessionSettings) {
        self.ticks_per_beat = settings.ticks_per_beat as u64;
        self.beats_per_bar = settings.beats_per_bar as u64;
        self.part_length = settings.part_length as u64;
        self.tick.set_length(self.ticks_per_beat);
        self.beat.set_length(self.beats_per_bar);
        self.bar.set_length(settings.bars as u64);
        self.part.set_length(settings.parts as u64);
    }

    /// Rewinds every level and counter to zero.
    pub fn reset(&mut self) {
        self.tick.reset();
        self.beat.reset();
        self.bar.reset();
        self.part.reset();
        self.tick_count = 0;
        self.beat_count = 0;
        self.bar_count = 0;
        self.part_count = 0;
        self.granular_beat = 0.0;
    }

    /// Rewinds, then moves every level onto its first position so that the
    /// first dispatched tick reads 1/1/1/1.
    pub fn prime(&mut self) {
        self.reset();
        self.tick.advance();
        self.beat.advance();
        self.bar.advance();
        self.part.advance();
        self.tick_count = 1;
        self.beat_count = 1;
        self.bar_count = 1;
        self.part_count = 1;
    }

    /// Whether [Clock::prime()] has run since the last [Clock::reset()].
    pub fn is_primed(&self) -> bool {
        self.tick_count > 0
    }

    /// Advances past the tick that was just dispatched, cascading into the
    /// upper levels at their boundaries. Reports which levels rolled over.
    pub fn after_tick(&mut self) -> Rollover {
        let mut rollover = Rollover::default();
        self.granular_beat += 1.0 / self.ticks_per_beat.max(1) as f64;
        if self.ticks_per_beat > 0 && self.tick.get() % self.ticks_per_beat == 0 {
            self.on_beat_change(&mut rollover);
        }
        self.tick.advance();
        self.tick_count += 1;
        rollover
    }

    fn on_beat_change(&mut self, rollover: &mut Rollover) {
        rollover.beat = true;
        self.granular_beat = 0.0;
        if self.beats_per_bar > 0 && self.beat.get() % self.beats_per_bar == 0 {
            self.on_bar_change(rollover);
        }
        self.beat.advance();
        self.beat_count += 1;
    }

    fn on_bar_change(&mut self, rollover: &mut Rollover) {
        rollover.bar = true;
        if self.part_length > 0 && self.bar.get() % self.part_length == 0 {
            self.on_part_change(rollover);
        }
        self.bar.advance();
        self.bar_count += 1;
    }

    fn on_part_change(&mut self, rollover: &mut Rollover) {
        rollover.part = true;
        self.part.advance();
        self.part_count += 1;
    }

    pub fn tick(&self) -> u64 {
        self.tick.get()
    }

    pub fn beat(&self) -> u64 {
        self.beat.get()
    }

    pub fn bar(&self) -> u64 {
        self.bar.get()
    }

    pub fn part(&self) -> u64 {
        self.part.get()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn beat_count(&self) -> u64 {
        self.beat_count
    }

    pub fn bar_count(&self) -> u64 {
        self.bar_count
    }

    pub fn part_count(&self) -> u64 {
        self.part_count
    }

    pub fn granular_beat(&self) -> f64 {
        self.granular_beat
    }
}
