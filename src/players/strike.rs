// Copyright (c) 2024 Mike Tsao

use super::{Player, TickOutcome};
use crate::timing::TickContext;
use core::time::Duration;

impl Player {
    /// A drum hit. On the first tick of a beat, a subdivided player instead
    /// schedules a burst of ratchets; otherwise the skip cycler and the
    /// probability gate decide whether a swung note goes out.
    pub(super) fn strike(&mut self, ctx: &TickContext, outcome: &mut TickOutcome) {
        if ctx.tick == 1 && self.sub_divisions > 1 && self.beat_fraction > 1 {
            self.spawn_burst(ctx, outcome);
            return;
        }

        let skips = &self.e.skip_cycler;
        if skips.length() == 0 || skips.is_at_end() {
            let delay = self.swing_delay(ctx);
            if self.passes_probability_gate() {
                let note = self.plan_note(ctx, delay);
                outcome.notes.push(note);
            }
        }
    }

    /// One ratchet `beat_fraction` subdivisions out, then `ratchet_count` more
    /// at `ratchet_interval` subdivisions apart.
    fn spawn_burst(&mut self, ctx: &TickContext, outcome: &mut TickOutcome) {
        let ticks_per_subdivision = ctx.ticks_per_beat as u64 / self.sub_divisions as u64;
        let wait_ticks = self.beat_fraction as u64 * ticks_per_subdivision;
        let interval = self.ratchet_interval as u64 * ticks_per_subdivision;

        outcome.spawned.push(self.new_ratchet(ctx, wait_ticks));
        for i in 1..=self.ratchet_count as u64 {
            outcome
                .spawned
                .push(self.new_ratchet(ctx, wait_ticks + i * interval));
        }
    }

    /// A random fraction of `swing`% of the beat duration.
    pub(crate) fn swing_delay(&mut self, ctx: &TickContext) -> Duration {
        if self.swing == 0 {
            return Duration::ZERO;
        }
        let percent = self.e.rng.rand_between(0, self.swing as u64) as f64;
        Duration::from_secs_f64(ctx.beat_duration_ms * percent * 0.01 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        players::{Comparison, Operator, Player, PlayerBehavior, PlayerBuilder, Rule},
        timing::TickContext,
        types::PlayerUid,
    };
    use core::time::Duration;
    use more_asserts::assert_lt;

    fn ctx(tick: u64, tick_count: u64) -> TickContext {
        TickContext {
            tick,
            beat: 1,
            bar: 1,
            part: 1,
            tick_count,
            beat_count: 1,
            bar_count: 1,
            part_count: 1,
            ticks_per_beat: 24,
            beat_duration_ms: 100.0,
            ..Default::default()
        }
    }

    fn every_tick() -> Player {
        let mut p = PlayerBuilder::default()
            .uid(PlayerUid(3))
            .instrument("drums")
            .rules(vec![
                Rule::new_with(Operator::Tick, Comparison::GreaterThan, 0.0),
                Rule::new_with(Operator::Beat, Comparison::GreaterThan, 0.0),
                Rule::new_with(Operator::Bar, Comparison::GreaterThan, 0.0),
            ])
            .build()
            .unwrap();
        p.prepare(5);
        p
    }

    #[test]
    fn skips_thin_out_firings() {
        let mut p = every_tick();
        p.skips = 3;
        p.prepare(5);

        let fired: Vec<u64> = (1..=9)
            .filter(|&t| !p.call(&ctx(t % 24 + 1, t)).notes.is_empty())
            .collect();
        assert_eq!(fired, vec![3, 6, 9]);
    }

    #[test]
    fn shortening_skips_mid_cycle_restarts_the_count() {
        let mut p = every_tick();
        p.skips = 8;
        p.prepare(5);
        assert!((1..=5).all(|t| p.call(&ctx(t % 24 + 1, t)).notes.is_empty()));
        assert_eq!(p.e.skip_cycler.get(), 5);

        let mut edited = p.clone();
        edited.skips = 3;
        p.update_from(&edited);
        assert_eq!(p.e.skip_cycler.length(), 3);

        let fired: Vec<u64> = (6..=14)
            .filter(|&t| !p.call(&ctx(t % 24 + 1, t)).notes.is_empty())
            .collect();
        assert_eq!(fired, vec![8, 11, 14]);
    }

    #[test]
    fn unrelated_edits_keep_the_skip_count() {
        let mut p = every_tick();
        p.skips = 3;
        p.prepare(5);
        p.call(&ctx(2, 1));
        p.call(&ctx(3, 2));

        let mut edited = p.clone();
        edited.note = 40;
        p.update_from(&edited);
        assert_eq!(p.e.skip_cycler.get(), 2);
        assert_eq!(p.call(&ctx(4, 3)).notes[0].note, 40);
    }

    #[test]
    fn swing_delays_are_bounded_by_the_beat() {
        let mut p = every_tick();
        p.swing = 50;
        for t in 1..=50 {
            let outcome = p.call(&ctx(2, t));
            let note = &outcome.notes[0];
            assert_lt!(note.delay, Duration::from_millis(50));
        }
    }

    #[test]
    fn no_swing_means_no_delay() {
        let mut p = every_tick();
        let outcome = p.call(&ctx(2, 1));
        assert_eq!(outcome.notes[0].delay, Duration::ZERO);
    }

    #[test]
    fn subdivided_strike_spawns_a_burst_on_the_first_tick() {
        let mut p = every_tick();
        p.sub_divisions = 4;
        p.beat_fraction = 2;
        p.ratchet_count = 2;
        p.ratchet_interval = 1;
        p.prepare(5);

        let outcome = p.call(&ctx(1, 25));
        assert!(outcome.fired);
        assert!(outcome.notes.is_empty(), "the burst replaces the hit");
        let targets: Vec<u64> = outcome
            .spawned
            .iter()
            .filter_map(|r| r.ratchet_target())
            .collect();
        // Six ticks per subdivision: wait 12, then every 6.
        assert_eq!(targets, vec![37, 43, 49]);
        assert!(outcome
            .spawned
            .iter()
            .all(|r| r.behavior == PlayerBehavior::Ratchet));
    }

    #[test]
    fn burst_needs_more_than_one_subdivision() {
        let mut p = every_tick();
        p.sub_divisions = 1;
        p.beat_fraction = 2;
        p.prepare(5);
        let outcome = p.call(&ctx(1, 1));
        assert!(outcome.spawned.is_empty());
        assert_eq!(outcome.notes.len(), 1);
    }
}
