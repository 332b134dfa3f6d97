// Copyright (c) 2024 Mike Tsao

//! Players are rule-gated sources of notes. Each one looks at a
//! [TickContext](crate::timing::TickContext), decides with its [Rule]s whether
//! to act, and hands back what it wants played.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        Comparison, MuteGroup, Operator, Player, PlayerBehavior, PlayerBuilder, Rule,
    };
}

pub use {
    mute_group::MuteGroup,
    player::{PlannedNote, Player, PlayerBehavior, PlayerBuilder, TickOutcome},
    rule::{Comparison, Operator, Rule, Verdict},
};

mod mute_group;
mod player;
mod ratchet;
mod rule;
mod strike;
