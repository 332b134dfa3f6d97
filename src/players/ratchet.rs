// Copyright (c) 2024 Mike Tsao

use super::{Comparison, Operator, Player, PlayerBehavior, Rule, TickOutcome};
use crate::{timing::TickContext, types::PlayerUid};
use core::time::Duration;

impl Player {
    /// Builds a one-shot echo of this player that fires `offset` ticks after
    /// the current one. The echo's uid is assigned when the session registers
    /// it.
    pub fn new_ratchet(&self, ctx: &TickContext, offset: u64) -> Player {
        let target = ctx.tick_count + offset;
        Player {
            uid: PlayerUid::default(),
            name: format!("{} ratchet @{target}", self.name),
            behavior: PlayerBehavior::Ratchet,
            instrument: self.instrument.clone(),
            channel: self.channel,
            note: self.note,
            min_velocity: self.min_velocity,
            max_velocity: self.max_velocity,
            level: self.level,
            probability: self.probability,
            muted: self.muted,
            solo: self.solo,
            pan: self.pan,
            random_degree: self.random_degree,
            fade_in: self.fade_in,
            fade_out: self.fade_out,
            preset: self.preset,
            rules: vec![
                Rule::new_with(Operator::TickCount, Comparison::Equals, target as f64)
                    .for_part(ctx.part),
            ],
            ..Default::default()
        }
    }

    /// The absolute tick a ratchet is waiting for. `None` for other players.
    pub fn ratchet_target(&self) -> Option<u64> {
        if self.behavior != PlayerBehavior::Ratchet {
            return None;
        }
        self.rules
            .iter()
            .find(|r| r.operator == Operator::TickCount && r.comparison == Comparison::Equals)
            .map(|r| r.value as u64)
    }

    /// Whether a ratchet's moment has come and gone.
    pub fn is_spent(&self, tick_count: u64) -> bool {
        self.ratchet_target()
            .map_or(false, |target| target <= tick_count)
    }

    pub(super) fn echo(&mut self, ctx: &TickContext, outcome: &mut TickOutcome) {
        if self.passes_probability_gate() {
            let note = self.plan_note(ctx, Duration::ZERO);
            outcome.notes.push(note);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        players::{PlayerBehavior, PlayerBuilder},
        timing::TickContext,
        types::{MidiChannel, PlayerUid},
    };

    fn ctx(tick_count: u64) -> TickContext {
        TickContext {
            tick: 1,
            beat: 1,
            bar: 1,
            part: 1,
            tick_count,
            ticks_per_beat: 24,
            ..Default::default()
        }
    }

    #[test]
    fn ratchets_copy_their_parent() {
        let parent = PlayerBuilder::default()
            .uid(PlayerUid(4))
            .name("snare")
            .instrument("drums")
            .channel(MidiChannel::DRUM)
            .note(38)
            .level(80)
            .probability(90)
            .skips(3)
            .swing(20)
            .build()
            .unwrap();
        let r = parent.new_ratchet(&ctx(10), 4);
        assert_eq!(r.behavior, PlayerBehavior::Ratchet);
        assert_eq!(r.note, 38);
        assert_eq!(r.level, 80);
        assert_eq!(r.probability, 90);
        assert_eq!(r.channel, MidiChannel::DRUM);
        assert_eq!(r.skips, 0, "ratchets don't skip");
        assert_eq!(r.swing, 0, "ratchets don't swing");
        assert_eq!(r.ratchet_target(), Some(14));
        assert_eq!(r.rules[0].part, 1);
        assert_eq!(parent.ratchet_target(), None);
    }

    #[test]
    fn ratchet_fires_only_on_its_target() {
        let parent = PlayerBuilder::default().instrument("drums").build().unwrap();
        let mut r = parent.new_ratchet(&ctx(10), 4);
        r.uid = PlayerUid::for_ratchet(0);
        r.prepare(9);

        let fired: Vec<u64> = (10..=20)
            .filter(|&t| r.call(&ctx(t)).fired)
            .collect();
        assert_eq!(fired, vec![14]);
        assert!(!r.is_spent(13));
        assert!(r.is_spent(14));
    }
}
