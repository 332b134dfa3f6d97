// Copyright (c) 2024 Mike Tsao

use super::TickOutcome;
use crate::types::PlayerUid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A set of players of which at most one may sound per tick.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MuteGroup {
    #[allow(missing_docs)]
    pub name: String,
    members: BTreeSet<i64>,
}
impl MuteGroup {
    #[allow(missing_docs)]
    pub fn new_with(name: &str, members: &[PlayerUid]) -> Self {
        Self {
            name: name.to_string(),
            members: members.iter().map(|uid| uid.0).collect(),
        }
    }

    #[allow(missing_docs)]
    pub fn insert(&mut self, uid: PlayerUid) -> bool {
        self.members.insert(uid.0)
    }

    #[allow(missing_docs)]
    pub fn remove(&mut self, uid: PlayerUid) -> bool {
        self.members.remove(&uid.0)
    }

    #[allow(missing_docs)]
    pub fn contains(&self, uid: PlayerUid) -> bool {
        self.members.contains(&uid.0)
    }

    /// Member uids in ascending order.
    pub fn members(&self) -> impl Iterator<Item = PlayerUid> + '_ {
        self.members.iter().map(|uid| PlayerUid(*uid))
    }

    /// Strips the notes of every member but the lowest-uid one that has any.
    /// Returns the uids that were silenced.
    pub fn enforce(&self, outcomes: &mut [TickOutcome]) -> Vec<PlayerUid> {
        let winner = outcomes
            .iter()
            .filter(|o| !o.notes.is_empty() && self.contains(o.uid))
            .map(|o| o.uid.0)
            .min();
        let Some(winner) = winner else {
            return Vec::default();
        };

        let mut silenced = Vec::default();
        for outcome in outcomes
            .iter_mut()
            .filter(|o| o.uid.0 != winner && !o.notes.is_empty() && self.contains(o.uid))
        {
            outcome.notes.clear();
            silenced.push(outcome.uid);
        }
        silenced
    }
}
