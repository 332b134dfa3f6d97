// Copyright (c) 2024 Mike Tsao

//! Unique identifiers for players, rules, and sessions, and factories that
//! help ensure they are in fact unique.
//!
//! Identifiers are signed. Persisted entities get positive ids from a
//! [UidFactory]; transient players such as ratchets take negative ids so that
//! they can never collide with anything a repository knows about.

use core::sync::atomic::Ordering;
use core::{hash::Hash, marker::PhantomData, sync::atomic::AtomicI64};
use serde::{Deserialize, Serialize};
use synonym::Synonym;

/// Identifies a [Player](crate::players::Player). Negative values are
/// reserved for ratchets.
#[derive(Synonym, Serialize, Deserialize, Eq, PartialEq)]
// See
// https://doc.rust-lang.org/stable/std/marker/trait.StructuralPartialEq.html
// for explanation why we derive PartialEq rather than letting Synonym do it.
#[synonym(skip(PartialEq))]
#[serde(rename_all = "kebab-case")]
pub struct PlayerUid(pub i64);
impl IsUid for PlayerUid {
    fn as_i64(&self) -> i64 {
        self.0
    }
}
impl PlayerUid {
    /// The id of the n-th ratchet spawned in a session (zero-based).
    pub fn for_ratchet(ratchet_count: i64) -> Self {
        Self(-1 - ratchet_count)
    }

    /// Whether this id belongs to a transient, never-persisted player.
    pub fn is_transient(&self) -> bool {
        self.0 < 0
    }
}

/// Identifies a [Rule](crate::players::Rule) within its owning player.
#[derive(Synonym, Serialize, Deserialize, Eq, PartialEq)]
#[synonym(skip(PartialEq))]
#[serde(rename_all = "kebab-case")]
pub struct RuleUid(pub i64);
impl IsUid for RuleUid {
    fn as_i64(&self) -> i64 {
        self.0
    }
}

/// Identifies a persisted session.
#[derive(Synonym, Serialize, Deserialize, Eq, PartialEq)]
#[synonym(skip(PartialEq))]
#[serde(rename_all = "kebab-case")]
pub struct SessionUid(pub i64);
impl IsUid for SessionUid {
    fn as_i64(&self) -> i64 {
        self.0
    }
}

/// Something that can serve as a uid.
pub trait IsUid: Eq + Hash + Clone + From<i64> {
    /// Returns the raw uid.
    fn as_i64(&self) -> i64;
}

/// Generates unique uids.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UidFactory<U: IsUid> {
    pub(crate) next_uid_value: AtomicI64,
    #[serde(skip)]
    pub(crate) _phantom: PhantomData<U>,
}
impl<U: IsUid> Default for UidFactory<U> {
    fn default() -> Self {
        Self::new(Self::FIRST_UID)
    }
}
impl<U: IsUid> UidFactory<U> {
    /// Minted uids start here. Zero means "not yet assigned."
    pub const FIRST_UID: i64 = 1;

    /// Creates a new [UidFactory] starting with the given value.
    pub fn new(first_uid: i64) -> Self {
        Self {
            next_uid_value: AtomicI64::new(first_uid),
            _phantom: Default::default(),
        }
    }

    /// Generates the next unique uid.
    pub fn mint_next(&self) -> U {
        let uid_value = self.next_uid_value.fetch_add(1, Ordering::Relaxed);
        U::from(uid_value)
    }

    /// Notifies the factory that a uid exists that might have been created
    /// elsewhere (for example, loaded from a repository). This gives the
    /// factory an opportunity to adjust `next_uid_value` to stay consistent
    /// with all known uids.
    pub fn notify_externally_minted_uid(&self, uid: U) {
        if uid.as_i64() >= self.next_uid_value.load(Ordering::Relaxed) {
            self.next_uid_value
                .store(uid.as_i64() + 1, Ordering::Relaxed);
        }
    }
}
impl<U: IsUid> PartialEq for UidFactory<U> {
    fn eq(&self, other: &Self) -> bool {
        self.next_uid_value.load(Ordering::Relaxed) == other.next_uid_value.load(Ordering::Relaxed)
    }
}
