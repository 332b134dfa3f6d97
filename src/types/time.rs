// Copyright (c) 2024 Mike Tsao

//! Handles tempo and the wall-clock durations derived from it.

use core::fmt;
use core::time::Duration;
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use synonym::Synonym;

/// Beats per minute.
#[derive(Synonym, Serialize, Deserialize, Clone, Copy, Debug, Derivative, PartialEq)]
#[derivative(Default)]
#[synonym(skip(Default, Debug, Display, Clone, Copy, PartialEq))]
#[serde(rename_all = "kebab-case")]
pub struct Tempo(#[derivative(Default(value = "120.0"))] pub f64);
impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:0.2} BPM", self.0))
    }
}
impl From<u16> for Tempo {
    fn from(value: u16) -> Self {
        Self(value as f64)
    }
}
impl Tempo {
    /// The largest value we'll allow.
    pub const MAX_VALUE: f64 = 1024.0;

    /// The smallest value we'll allow. Zero would stop time altogether.
    pub const MIN_VALUE: f64 = 1.0;

    /// Beats per second.
    pub fn bps(&self) -> f64 {
        self.0 / 60.0
    }

    /// MIN..=MAX
    pub const fn range() -> core::ops::RangeInclusive<f64> {
        Self::MIN_VALUE..=Self::MAX_VALUE
    }

    /// Wall-clock length of one clock tick when a beat is divided into
    /// `ticks_per_beat` ticks.
    pub fn tick_duration(&self, ticks_per_beat: u32) -> Duration {
        let ticks_per_second = self.bps() * ticks_per_beat.max(1) as f64;
        if ticks_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / ticks_per_second)
        } else {
            Duration::MAX
        }
    }

    /// The "beat duration" that swing and `BEAT_DURATION` rules are measured
    /// against, in milliseconds: `60000 / bpm / ticks_per_beat /
    /// beats_per_bar`.
    pub fn beat_duration_ms(&self, ticks_per_beat: u32, beats_per_bar: u32) -> f64 {
        60000.0 / self.0 / ticks_per_beat.max(1) as f64 / beats_per_bar.max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn tempo_mainline() {
        let t = Tempo::default();
        assert_eq!(t.0, 120.0);
        assert_eq!(t.bps(), 2.0);
        assert_eq!(format!("{t}"), "120.00 BPM");
    }

    #[test]
    fn beat_duration_matches_formula() {
        let t = Tempo(120.0);
        assert!(approx_eq!(
            f64,
            t.beat_duration_ms(24, 4),
            60000.0 / 120.0 / 24.0 / 4.0,
            ulps = 2
        ));
    }

    #[test]
    fn tick_duration_is_a_beat_divided_by_ticks() {
        let t = Tempo(60.0);
        assert_eq!(t.tick_duration(4), Duration::from_millis(250));
        assert_eq!(t.tick_duration(1), Duration::from_secs(1));
    }
}
