// Copyright (c) 2024 Mike Tsao

use crate::{timing::TickContext, types::RuleUid};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Which timing value a [Rule] inspects.
#[derive(
    Clone, Copy, Debug, Display, EnumIter, EnumString, Eq, Hash, PartialEq, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Tick,
    Beat,
    Bar,
    Part,
    BeatDuration,
    TickCount,
    BeatCount,
    BarCount,
    PartCount,
}
impl Operator {
    /// The value this operator reads from a tick snapshot.
    pub fn operand(&self, ctx: &TickContext) -> f64 {
        match self {
            Operator::Tick => ctx.tick as f64,
            Operator::Beat => ctx.beat as f64,
            Operator::Bar => ctx.bar as f64,
            Operator::Part => ctx.part as f64,
            Operator::BeatDuration => ctx.beat_duration_ms,
            Operator::TickCount => ctx.tick_count as f64,
            Operator::BeatCount => ctx.beat_count as f64,
            Operator::BarCount => ctx.bar_count as f64,
            Operator::PartCount => ctx.part_count as f64,
        }
    }
}

/// How a [Rule] compares its operand with its value.
#[derive(
    Clone, Copy, Debug, Display, EnumIter, EnumString, Eq, Hash, PartialEq, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Comparison {
    Equals,
    GreaterThan,
    LessThan,
    /// The value is a divisor; holds when the operand is a multiple of it.
    Modulo,
    NotEquals,
}
impl Comparison {
    #[allow(missing_docs)]
    pub fn holds(&self, operand: f64, value: f64) -> bool {
        match self {
            Comparison::Equals => operand == value,
            Comparison::GreaterThan => operand > value,
            Comparison::LessThan => operand < value,
            Comparison::Modulo => value != 0.0 && operand % value == 0.0,
            Comparison::NotEquals => operand != value,
        }
    }
}

/// A predicate over the session clock that gates a player's firing.
///
/// Equality ignores `uid` and `part`: two rules that test the same operator
/// the same way against the same value are the same rule.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Rule {
    #[serde(default)]
    pub uid: RuleUid,
    pub operator: Operator,
    pub comparison: Comparison,
    pub value: f64,
    /// The part this rule applies to. Zero means every part.
    #[serde(default)]
    pub part: u64,
}
impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.operator == other.operator
            && self.comparison == other.comparison
            && self.value == other.value
    }
}
impl Rule {
    /// A rule for every part, not yet assigned a uid.
    pub fn new_with(operator: Operator, comparison: Comparison, value: f64) -> Self {
        Self {
            uid: RuleUid::default(),
            operator,
            comparison,
            value,
            part: 0,
        }
    }

    /// Restricts the rule to one part.
    pub fn for_part(mut self, part: u64) -> Self {
        self.part = part;
        self
    }

    /// Whether the rule takes part in evaluation during the given part.
    pub fn applies_to_part(&self, part: u64) -> bool {
        self.part == 0 || self.part == part
    }

    /// Whether the comparison holds against the snapshot.
    pub fn matches(&self, ctx: &TickContext) -> bool {
        self.comparison
            .holds(self.operator.operand(ctx), self.value)
    }
}

/// The accumulated outcome of evaluating a rule set against one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    /// Some `TICK` rule matched.
    pub has_tick: bool,
    /// Some `BEAT` rule matched.
    pub has_beat: bool,
    /// Some `BAR` rule matched.
    pub has_bar: bool,
    /// No count or duration rule failed.
    pub play: bool,
}
impl Default for Verdict {
    fn default() -> Self {
        Self {
            has_tick: false,
            has_beat: false,
            has_bar: false,
            play: true,
        }
    }
}
impl Verdict {
    /// Folds every rule that applies to the current part into a verdict.
    ///
    /// `TICK`, `BEAT`, and `BAR` rules are OR-accumulated into their own
    /// flags. Count and duration rules AND into `play`. `PART` rules take part
    /// only through their part filter.
    pub fn evaluate<'a>(rules: impl IntoIterator<Item = &'a Rule>, ctx: &TickContext) -> Self {
        let mut verdict = Self::default();
        for rule in rules
            .into_iter()
            .filter(|r| r.applies_to_part(ctx.part))
        {
            match rule.operator {
                Operator::Tick => verdict.has_tick |= rule.matches(ctx),
                Operator::Beat => verdict.has_beat |= rule.matches(ctx),
                Operator::Bar => verdict.has_bar |= rule.matches(ctx),
                Operator::Part => {}
                Operator::BeatDuration
                | Operator::TickCount
                | Operator::BeatCount
                | Operator::BarCount
                | Operator::PartCount => {
                    if !rule.matches(ctx) {
                        verdict.play = false;
                    }
                }
            }
        }
        verdict
    }

    /// The firing decision for rule-driven players:
    /// `(tick && beat && bar && play) || (tick == 1 && (tick || beat))`.
    ///
    /// The second clause lets a partially matching pattern kick off on the
    /// first tick of a beat.
    pub fn should_play(&self, tick: u64) -> bool {
        (self.has_tick && self.has_beat && self.has_bar && self.play)
            || (tick == 1 && (self.has_tick || self.has_beat))
    }
}
