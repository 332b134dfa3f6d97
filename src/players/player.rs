// Copyright (c) 2024 Mike Tsao

use super::{Rule, Verdict};
use crate::{
    timing::{Cycler, TickContext},
    types::{MidiChannel, PlayerUid},
    util::Rng,
};
use core::time::Duration;
use derivative::Derivative;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// What a [Player] does when its rules let it fire.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PlayerBehavior {
    /// A drum hit, with skips, swing, and ratchet bursts.
    #[default]
    Strike,
    /// A plain note on every eligible tick.
    Sample,
    /// A one-shot echo spawned by a Strike. Fires at most once, then is
    /// purged at a bar boundary.
    Ratchet,
}

/// A note that a player wants sounded, relative to the tick it decided on.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedNote {
    /// Name of the instrument to play it on.
    pub instrument: String,
    pub channel: MidiChannel,
    pub note: u8,
    pub velocity: u8,
    /// How long after the start of the tick the note should begin.
    pub delay: Duration,
}

/// What one player produced during one tick.
#[derive(Debug, Default)]
pub struct TickOutcome {
    #[allow(missing_docs)]
    pub uid: PlayerUid,
    /// The player passed its rules and acted this tick.
    pub fired: bool,
    /// Notes to schedule.
    pub notes: Vec<PlannedNote>,
    /// Ratchets to register with the session.
    pub spawned: Vec<Player>,
}

/// A rule-gated source of note events.
#[derive(Clone, Debug, Builder, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[builder(default)]
#[serde(rename_all = "kebab-case", default)]
pub struct Player {
    pub uid: PlayerUid,
    #[builder(setter(into))]
    pub name: String,
    pub behavior: PlayerBehavior,

    /// The name the instrument is registered under.
    #[builder(setter(into))]
    pub instrument: String,
    pub channel: MidiChannel,
    #[derivative(Default(value = "36"))]
    pub note: u8,
    #[derivative(Default(value = "100"))]
    pub min_velocity: u8,
    #[derivative(Default(value = "110"))]
    pub max_velocity: u8,
    /// Gain, 0-100.
    #[derivative(Default(value = "100"))]
    pub level: u8,
    /// 0-100. At 100 the player always fires; below that, it fires when a
    /// draw from 0..100 exceeds this value.
    #[derivative(Default(value = "100"))]
    pub probability: u8,
    /// 0-100, scales a random delay of up to one beat duration.
    pub swing: u8,

    pub ratchet_count: u32,
    pub ratchet_interval: u32,
    pub sub_divisions: u32,
    pub beat_fraction: u32,
    /// Fire only on every `skips`-th opportunity. Zero disables skipping.
    pub skips: u32,

    pub muted: bool,
    pub solo: bool,

    // Carried for instrument configuration; the tick engine doesn't read them.
    #[derivative(Default(value = "64"))]
    pub pan: u8,
    pub random_degree: u8,
    pub fade_in: u32,
    pub fade_out: u32,

    /// Program to select on the instrument when playback starts.
    pub preset: Option<u8>,

    pub rules: Vec<Rule>,

    #[serde(skip)]
    #[builder(setter(skip))]
    pub(crate) e: PlayerEphemerals,
}

/// Parts of [Player] that shouldn't be serialized.
#[derive(Clone, Debug, Default)]
pub struct PlayerEphemerals {
    last_tick: u64,
    last_tick_count: Option<u64>,
    last_played_tick: u64,
    last_played_beat: u64,
    last_played_bar: u64,

    pub(crate) skip_cycler: Cycler,
    sub_cycler: Cycler,
    pub(crate) rng: Rng,

    /// Makes [Player::call()] panic, for exercising the driver's isolation.
    #[cfg(test)]
    pub(crate) panics: bool,
}

impl Player {
    /// Sizes the private cyclers, seeds the random stream, and forgets
    /// anything remembered from an earlier run. Called whenever the player
    /// enters a session's live set and when playback starts.
    pub fn prepare(&mut self, seed: u128) {
        self.e = PlayerEphemerals {
            skip_cycler: Cycler::new_with(self.skips as u64),
            sub_cycler: Cycler::new_with(self.sub_divisions as u64),
            rng: Rng::new_with_seed(Rng::derive_seed(seed, self.uid.0)),
            ..Default::default()
        };
    }

    /// Whether mute and solo state allow this player to act.
    pub fn is_eligible(&self, has_solos: bool) -> bool {
        (!has_solos && !self.muted) || (has_solos && self.solo)
    }

    /// Runs the rule engine against the tick. Always advances the skip and
    /// sub-division cyclers, whatever the outcome.
    pub fn should_play(&mut self, ctx: &TickContext) -> bool {
        self.e.skip_cycler.advance();
        self.e.sub_cycler.advance();

        let verdict = Verdict::evaluate(&self.rules, ctx);
        match self.behavior {
            PlayerBehavior::Ratchet => {
                // A ratchet has nothing but count rules, so only their
                // conjunction can say yes.
                verdict.play && self.rules.iter().any(|r| r.applies_to_part(ctx.part))
            }
            PlayerBehavior::Strike | PlayerBehavior::Sample => verdict.should_play(ctx.tick),
        }
    }

    /// Decides whether to fire on this tick and, if so, does. Safe to call
    /// more than once per tick; only the first call acts.
    pub fn call(&mut self, ctx: &TickContext) -> TickOutcome {
        let mut outcome = TickOutcome {
            uid: self.uid,
            ..Default::default()
        };
        if self.e.last_tick_count == Some(ctx.tick_count) {
            return outcome;
        }
        #[cfg(test)]
        if self.e.panics {
            panic!("player {} panicked on purpose", self.uid.0);
        }

        if self.is_eligible(ctx.has_solos) && self.should_play(ctx) {
            self.e.last_played_bar = ctx.bar;
            self.e.last_played_beat = ctx.beat;
            self.e.last_played_tick = ctx.tick;
            outcome.fired = true;
            self.on_tick(ctx, &mut outcome);
        }

        self.e.last_tick = ctx.tick;
        self.e.last_tick_count = Some(ctx.tick_count);
        outcome
    }

    fn on_tick(&mut self, ctx: &TickContext, outcome: &mut TickOutcome) {
        match self.behavior {
            PlayerBehavior::Strike => self.strike(ctx, outcome),
            PlayerBehavior::Sample => self.sample(ctx, outcome),
            PlayerBehavior::Ratchet => self.echo(ctx, outcome),
        }
    }

    /// `probability == 100 || draw(0..100) > probability`.
    pub(crate) fn passes_probability_gate(&mut self) -> bool {
        self.probability >= 100 || self.e.rng.rand_percent() > self.probability as u64
    }

    /// `level% * uniform(min_velocity, max(max_velocity, min_velocity + 1))`,
    /// clamped to the MIDI range.
    pub(crate) fn draw_velocity(&mut self) -> u8 {
        let low = self.min_velocity as u64;
        let high = (self.max_velocity as u64).max(low + 1);
        let raw = self.e.rng.rand_between(low, high) as f64;
        (self.level as f64 * 0.01 * raw).round().clamp(0.0, 127.0) as u8
    }

    pub(crate) fn plan_note(&mut self, ctx: &TickContext, delay: Duration) -> PlannedNote {
        let note = (self.note as i32 + ctx.note_offset).clamp(0, 127) as u8;
        PlannedNote {
            instrument: self.instrument.clone(),
            channel: self.channel,
            note,
            velocity: self.draw_velocity(),
            delay,
        }
    }

    fn sample(&mut self, ctx: &TickContext, outcome: &mut TickOutcome) {
        if self.passes_probability_gate() {
            let note = self.plan_note(ctx, Duration::ZERO);
            outcome.notes.push(note);
        }
    }

    /// The tick value this player last evaluated.
    pub fn last_tick(&self) -> u64 {
        self.e.last_tick
    }

    /// The absolute tick this player last evaluated.
    pub fn last_tick_count(&self) -> Option<u64> {
        self.e.last_tick_count
    }

    /// Tick, beat, and bar of the last firing.
    pub fn last_played(&self) -> (u64, u64, u64) {
        (
            self.e.last_played_tick,
            self.e.last_played_beat,
            self.e.last_played_bar,
        )
    }

    /// Adds a rule unless an equal one is already present. Returns whether it
    /// was added.
    pub fn add_rule(&mut self, rule: Rule) -> bool {
        if self.rules.contains(&rule) {
            false
        } else {
            self.rules.push(rule);
            true
        }
    }

    /// Copies the persistent fields of `other`, keeping this player's uid and
    /// run state.
    pub fn update_from(&mut self, other: &Player) {
        let uid = self.uid;
        let (skips, sub_divisions) = (self.skips, self.sub_divisions);
        let e = core::mem::take(&mut self.e);
        *self = other.clone();
        self.uid = uid;
        self.e = e;

        // A shorter cycler could otherwise be left past its end, where it
        // never wraps again.
        if self.skips != skips {
            self.e.skip_cycler = Cycler::new_with(self.skips as u64);
        }
        if self.sub_divisions != sub_divisions {
            self.e.sub_cycler = Cycler::new_with(self.sub_divisions as u64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::players::{Comparison, Operator};
    use more_asserts::{assert_ge, assert_le};

    fn ctx_at(tick: u64, beat: u64, bar: u64, tick_count: u64) -> TickContext {
        TickContext {
            tick,
            beat,
            bar,
            part: 1,
            tick_count,
            beat_count: 1,
            bar_count: 1,
            part_count: 1,
            ticks_per_beat: 24,
            beat_duration_ms: 60000.0 / 120.0 / 24.0 / 4.0,
            ..Default::default()
        }
    }

    fn kick() -> Player {
        let mut p = PlayerBuilder::default()
            .uid(PlayerUid(1))
            .name("kick")
            .instrument("drums")
            .rules(vec![Rule::new_with(Operator::Beat, Comparison::Equals, 1.0)])
            .build()
            .unwrap();
        p.prepare(1);
        p
    }

    #[test]
    fn builder_defaults() {
        let p = PlayerBuilder::default().build().unwrap();
        assert_eq!(p.behavior, PlayerBehavior::Strike);
        assert_eq!(p.probability, 100);
        assert_eq!(p.level, 100);
        assert!(p.rules.is_empty());
    }

    #[test]
    fn fires_at_most_once_per_tick() {
        let mut p = kick();
        let ctx = ctx_at(1, 1, 1, 1);
        let first = p.call(&ctx);
        assert!(first.fired);
        assert_eq!(first.notes.len(), 1);

        let again = p.call(&ctx);
        assert!(!again.fired, "a second dispatch of the same tick is ignored");
        assert!(again.notes.is_empty());
        assert_eq!(p.last_tick_count(), Some(1));
        assert_eq!(p.last_played(), (1, 1, 1));
    }

    #[test]
    fn last_tick_is_recorded_even_when_not_firing() {
        let mut p = kick();
        let outcome = p.call(&ctx_at(2, 1, 1, 2));
        assert!(!outcome.fired);
        assert_eq!(p.last_tick(), 2);
        assert_eq!(p.last_tick_count(), Some(2));
    }

    #[test]
    fn muted_players_do_not_evaluate_rules() {
        let mut p = kick();
        p.muted = true;
        p.skips = 3;
        p.prepare(1);
        assert!(!p.call(&ctx_at(1, 1, 1, 1)).fired);
        assert_eq!(
            p.e.skip_cycler.get(),
            0,
            "ineligible players never reach the rule engine"
        );
    }

    #[test]
    fn solo_overrides_mute_state_of_others() {
        let mut p = kick();
        assert!(p.is_eligible(false));
        assert!(!p.is_eligible(true));
        p.solo = true;
        assert!(p.is_eligible(true));
        p.muted = true;
        assert!(!p.is_eligible(false));
        assert!(p.is_eligible(true), "a soloed player plays even if muted");
    }

    #[test]
    fn velocity_is_scaled_by_level() {
        let mut p = kick();
        p.min_velocity = 100;
        p.max_velocity = 100;
        p.level = 50;
        for _ in 0..20 {
            assert_eq!(p.draw_velocity(), 50);
        }

        p.min_velocity = 60;
        p.max_velocity = 80;
        p.level = 100;
        for _ in 0..200 {
            let v = p.draw_velocity();
            assert_ge!(v, 60);
            assert_le!(v, 79);
        }
    }

    #[test]
    fn probability_gate_is_inverted_below_one_hundred() {
        let mut p = kick();
        p.probability = 100;
        assert!((0..100).all(|_| p.passes_probability_gate()));

        p.probability = 99;
        assert!(
            (0..200).all(|_| !p.passes_probability_gate()),
            "no draw from 0..100 exceeds 99"
        );

        p.probability = 0;
        let passes = (0..1000).filter(|_| p.passes_probability_gate()).count();
        assert_ge!(passes, 950, "only a draw of zero fails at probability 0");
    }

    #[test]
    fn note_offset_shifts_notes() {
        let mut p = kick();
        let mut ctx = ctx_at(1, 1, 1, 1);
        ctx.note_offset = -2;
        let note = p.plan_note(&ctx, Duration::ZERO);
        assert_eq!(note.note, 34);
        assert_eq!(note.instrument, "drums");
    }

    #[test]
    fn add_rule_rejects_duplicates() {
        let mut p = kick();
        assert!(!p.add_rule(Rule::new_with(Operator::Beat, Comparison::Equals, 1.0).for_part(2)));
        assert!(p.add_rule(Rule::new_with(Operator::Bar, Comparison::Equals, 1.0)));
        assert_eq!(p.rules.len(), 2);
    }

    #[test]
    fn update_from_keeps_identity_and_run_state() {
        let mut p = kick();
        p.call(&ctx_at(1, 1, 1, 1));
        let mut other = kick();
        other.uid = PlayerUid(77);
        other.note = 38;
        p.update_from(&other);
        assert_eq!(p.uid, PlayerUid(1));
        assert_eq!(p.note, 38);
        assert_eq!(p.last_tick_count(), Some(1));
    }

    #[test]
    fn sample_fires_on_every_eligible_tick() {
        let mut p = kick();
        p.behavior = PlayerBehavior::Sample;
        p.skips = 4;
        p.swing = 100;
        p.prepare(1);
        let outcome = p.call(&ctx_at(1, 1, 1, 1));
        assert_eq!(outcome.notes.len(), 1);
        assert_eq!(outcome.notes[0].delay, Duration::ZERO, "samples don't swing");
    }
}
