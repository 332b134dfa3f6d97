// Copyright (c) 2024 Mike Tsao

use super::SessionRecord;
use crate::{
    players::Player,
    types::{IsUid, PlayerUid, SessionUid, UidFactory},
};
use anyhow::{anyhow, Result};
use core::fmt::{Debug, Display};
use delegate::delegate;
use std::collections::BTreeMap;

/// Something a [Repository] can store. Its uid is zero until the repository
/// assigns one.
pub trait Persistent: Clone + Debug + Send + 'static {
    #[allow(missing_docs)]
    type Uid: IsUid + Copy + Debug + Display + Send;

    /// What to call this kind of item in messages.
    const KIND: &'static str;

    #[allow(missing_docs)]
    fn uid(&self) -> Self::Uid;
    #[allow(missing_docs)]
    fn set_uid(&mut self, uid: Self::Uid);
}
impl Persistent for Player {
    type Uid = PlayerUid;
    const KIND: &'static str = "Player";

    fn uid(&self) -> PlayerUid {
        self.uid
    }

    fn set_uid(&mut self, uid: PlayerUid) {
        self.uid = uid;
    }
}
impl Persistent for SessionRecord {
    type Uid = SessionUid;
    const KIND: &'static str = "Session";

    fn uid(&self) -> SessionUid {
        self.uid
    }

    fn set_uid(&mut self, uid: SessionUid) {
        self.uid = uid;
    }
}

/// The persistence boundary. The sequencer calls it synchronously, outside
/// the tick loop, when players, rules, and sessions change.
pub trait Repository<T: Persistent>: Debug + Send {
    /// Stores `item`, assigning a uid if it doesn't have one yet. Returns the
    /// item as stored.
    fn save(&mut self, item: T) -> Result<T>;

    #[allow(missing_docs)]
    fn delete(&mut self, uid: T::Uid) -> Result<()>;

    #[allow(missing_docs)]
    fn find_one(&self, uid: T::Uid) -> Result<T>;

    /// The stored items among `uids`, in the order given. Unknown uids are
    /// skipped.
    fn find_set(&self, uids: &[T::Uid]) -> Vec<T>;

    /// Every stored item, in uid order.
    fn find_all(&self) -> Vec<T>;

    /// The item after `uid` in uid order, wrapping to the first.
    fn navigate_next(&self, uid: T::Uid) -> Result<T>;

    /// The item before `uid` in uid order, wrapping to the last.
    fn navigate_previous(&self, uid: T::Uid) -> Result<T>;
}

/// A [Repository] that lives in memory.
#[derive(Debug)]
pub struct InMemoryRepository<T: Persistent> {
    uid_factory: UidFactory<T::Uid>,
    items: BTreeMap<i64, T>,
}
impl<T: Persistent> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            uid_factory: Default::default(),
            items: Default::default(),
        }
    }
}
impl<T: Persistent> InMemoryRepository<T> {
    delegate! {
        to self.items {
            /// The number of stored items.
            pub fn len(&self) -> usize;
            /// Whether nothing is stored.
            pub fn is_empty(&self) -> bool;
        }
    }

    fn not_found(uid: T::Uid) -> anyhow::Error {
        anyhow!("{} {uid} not found", T::KIND)
    }
}
impl<T: Persistent> Repository<T> for InMemoryRepository<T> {
    fn save(&mut self, mut item: T) -> Result<T> {
        let uid = item.uid();
        if uid.as_i64() < 0 {
            return Err(anyhow!("{uid} is transient and can't be saved"));
        }
        if uid.as_i64() == 0 {
            item.set_uid(self.uid_factory.mint_next());
        } else {
            self.uid_factory.notify_externally_minted_uid(uid);
        }
        self.items.insert(item.uid().as_i64(), item.clone());
        Ok(item)
    }

    fn delete(&mut self, uid: T::Uid) -> Result<()> {
        self.items
            .remove(&uid.as_i64())
            .map(|_| ())
            .ok_or_else(|| Self::not_found(uid))
    }

    fn find_one(&self, uid: T::Uid) -> Result<T> {
        self.items
            .get(&uid.as_i64())
            .cloned()
            .ok_or_else(|| Self::not_found(uid))
    }

    fn find_set(&self, uids: &[T::Uid]) -> Vec<T> {
        uids.iter()
            .filter_map(|uid| self.items.get(&uid.as_i64()).cloned())
            .collect()
    }

    fn find_all(&self) -> Vec<T> {
        self.items.values().cloned().collect()
    }

    fn navigate_next(&self, uid: T::Uid) -> Result<T> {
        let key = uid.as_i64();
        self.items
            .range(key + 1..)
            .next()
            .or_else(|| self.items.iter().next())
            .map(|(_, item)| item.clone())
            .ok_or_else(|| Self::not_found(uid))
    }

    fn navigate_previous(&self, uid: T::Uid) -> Result<T> {
        let key = uid.as_i64();
        self.items
            .range(..key)
            .next_back()
            .or_else(|| self.items.iter().next_back())
            .map(|(_, item)| item.clone())
            .ok_or_else(|| Self::not_found(uid))
    }
}
