// Copyright (c) 2024 Mike Tsao

use crate::{
    players::{MuteGroup, Player, PlayerBehavior, TickOutcome},
    timing::{Clock, Rollover, SessionStatus, TickContext},
    types::{MidiChannel, PlayerUid, SessionUid},
    util::{Rng, SessionSettings},
};
use anyhow::{anyhow, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// A player as the session and the worker pool share it.
pub type SharedPlayer = Arc<Mutex<Player>>;

/// Locks a player, recovering it if a worker panicked while holding it.
pub fn lock_player(player: &SharedPlayer) -> MutexGuard<'_, Player> {
    player.lock().unwrap_or_else(|e| e.into_inner())
}

/// The persisted form of a [Session]: its configuration and the uids of its
/// players.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SessionRecord {
    pub uid: SessionUid,
    pub name: String,
    pub settings: SessionSettings,
    pub players: Vec<PlayerUid>,
    pub mute_groups: Vec<MuteGroup>,
}

/// The clock plus the population of players it drives.
///
/// The live set changes structurally only at bar boundaries, inside
/// [Session::after_tick()]. Additions and removals requested in between wait
/// in two mailboxes. Ratchets are the exception: they join the live set as
/// soon as they're spawned, and are queued for removal in the same step.
#[derive(Debug)]
pub struct Session {
    uid: SessionUid,
    name: String,
    settings: SessionSettings,
    clock: Clock,

    live: FxHashMap<PlayerUid, SharedPlayer>,
    pending_add: Vec<SharedPlayer>,
    pending_remove: Vec<PlayerUid>,
    mute_groups: Vec<MuteGroup>,

    /// Players that fired on the most recent tick.
    active: FxHashSet<PlayerUid>,
    ratchet_count: i64,
    seed: u128,
}
impl Default for Session {
    fn default() -> Self {
        Self::new_with(SessionSettings::default())
    }
}
impl Session {
    #[allow(missing_docs)]
    pub fn new_with(settings: SessionSettings) -> Self {
        let seed = match settings.seed {
            Some(seed) => seed as u128,
            None => Rng::generate_seed().unwrap_or_default(),
        };
        Self {
            uid: SessionUid::default(),
            name: String::default(),
            clock: Clock::new_with(&settings),
            settings,
            live: Default::default(),
            pending_add: Default::default(),
            pending_remove: Default::default(),
            mute_groups: Default::default(),
            active: Default::default(),
            ratchet_count: 0,
            seed,
        }
    }

    /// Rebuilds a session from its record and its (already loaded) players.
    /// The players go straight into the live set.
    pub fn new_from_record(record: &SessionRecord, players: Vec<Player>) -> Self {
        let mut r = Self::new_with(record.settings.clone());
        r.uid = record.uid;
        r.name = record.name.clone();
        r.mute_groups = record.mute_groups.clone();
        for mut player in players {
            player.prepare(r.seed);
            r.live.insert(player.uid, Arc::new(Mutex::new(player)));
        }
        r
    }

    /// The persistent view of this session.
    pub fn to_record(&self) -> SessionRecord {
        let mut players: Vec<PlayerUid> = self
            .live
            .keys()
            .copied()
            .chain(self.pending_add.iter().map(|p| lock_player(p).uid))
            .filter(|uid| !uid.is_transient() && !self.pending_remove.contains(uid))
            .collect();
        players.sort_by_key(|uid| uid.0);
        players.dedup();
        SessionRecord {
            uid: self.uid,
            name: self.name.clone(),
            settings: self.settings.clone(),
            players,
            mute_groups: self.mute_groups.clone(),
        }
    }

    /// Sizes the clock and every player's private state from configuration,
    /// applies any mailbox contents (nothing is iterating yet), and primes the
    /// clock so the first tick reads 1/1/1/1.
    pub fn before_start(&mut self) -> Result<()> {
        self.settings.validate()?;
        self.clock.configure(&self.settings);
        self.clock.prime();
        self.flush(0);
        for player in self.live.values() {
            lock_player(player).prepare(self.seed);
        }
        self.active.clear();
        Ok(())
    }

    /// Takes the snapshot that every player will see this tick, and the
    /// players to dispatch, in uid order.
    pub fn before_tick(&mut self) -> (TickContext, Vec<SharedPlayer>) {
        if !self.clock.is_primed() {
            self.clock.prime();
        }
        let ctx = TickContext::new_with(&self.clock, &self.settings, self.has_solos());
        let mut uids: Vec<&PlayerUid> = self.live.keys().collect();
        uids.sort_by_key(|uid| uid.0);
        let players = uids
            .into_iter()
            .filter_map(|uid| self.live.get(uid).cloned())
            .collect();
        log::trace!(
            "tick {}/{}/{}/{} (#{})",
            ctx.part,
            ctx.bar,
            ctx.beat,
            ctx.tick,
            ctx.tick_count
        );
        (ctx, players)
    }

    /// Folds the results of one tick's dispatch back into the session: records
    /// who fired, enforces mute groups, and registers spawned ratchets. On
    /// return `outcomes` is in uid order and holds only the notes that should
    /// sound.
    pub fn absorb(&mut self, outcomes: &mut [TickOutcome]) {
        outcomes.sort_by_key(|o| o.uid.0);
        self.active = outcomes
            .iter()
            .filter(|o| o.fired)
            .map(|o| o.uid)
            .collect();

        for group in self.mute_groups.iter() {
            let silenced = group.enforce(outcomes);
            if !silenced.is_empty() {
                log::debug!("mute group {} silenced {silenced:?}", group.name);
            }
        }

        for outcome in outcomes.iter_mut() {
            for ratchet in outcome.spawned.drain(..) {
                self.register_ratchet(ratchet);
            }
        }
    }

    fn register_ratchet(&mut self, mut ratchet: Player) {
        let uid = PlayerUid::for_ratchet(self.ratchet_count);
        self.ratchet_count += 1;
        ratchet.uid = uid;
        ratchet.prepare(self.seed);
        log::debug!(
            "ratchet {uid} will fire at #{}",
            ratchet.ratchet_target().unwrap_or_default()
        );
        self.live.insert(uid, Arc::new(Mutex::new(ratchet)));
        self.pending_remove.push(uid);
    }

    /// Advances the clock past the tick just dispatched. At a bar boundary,
    /// applies the mailboxes.
    pub fn after_tick(&mut self) -> Rollover {
        let last_tick_count = self.clock.tick_count();
        let rollover = self.clock.after_tick();
        if rollover.bar {
            self.flush(last_tick_count);
            if rollover.part {
                log::debug!("part {} begins", self.clock.part());
            }
        }
        rollover
    }

    /// Moves pending additions into the live set and pending removals out of
    /// it. A ratchet still waiting for its tick stays queued.
    fn flush(&mut self, last_tick_count: u64) {
        for player in self.pending_add.drain(..) {
            let uid = {
                let mut p = lock_player(&player);
                p.prepare(self.seed);
                p.uid
            };
            self.live.insert(uid, player);
        }

        let live = &mut self.live;
        let mut removed = 0;
        self.pending_remove.retain(|uid| {
            let is_waiting = live
                .get(uid)
                .map_or(false, |p| {
                    let p = lock_player(p);
                    p.behavior == PlayerBehavior::Ratchet && !p.is_spent(last_tick_count)
                });
            if !is_waiting {
                live.remove(uid);
                removed += 1;
            }
            is_waiting
        });
        log::debug!(
            "bar flush: {} live, {removed} removed, {} still pending",
            self.live.len(),
            self.pending_remove.len()
        );
    }

    /// Rewinds the clock and throws away both mailboxes without applying
    /// them. Ratchets go too.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.pending_add.clear();
        self.pending_remove.clear();
        self.live.retain(|uid, _| !uid.is_transient());
        self.ratchet_count = 0;
        self.active.clear();
    }

    /// Whether any live player is soloed.
    pub fn has_solos(&self) -> bool {
        self.live.values().any(|p| lock_player(p).solo)
    }

    /// Queues a player to join the live set at the next bar boundary. Queuing
    /// the same player again before then has no further effect. Adding a
    /// player that is queued for removal cancels the removal.
    pub fn add_player(&mut self, player: Player) -> PlayerUid {
        let uid = player.uid;
        self.pending_remove.retain(|u| *u != uid);
        if let Some(queued) = self
            .pending_add
            .iter()
            .find(|p| lock_player(p).uid == uid)
        {
            lock_player(queued).update_from(&player);
        } else {
            self.pending_add.push(Arc::new(Mutex::new(player)));
        }
        uid
    }

    /// Queues a player to leave the live set at the next bar boundary. A
    /// player that is only queued for addition is dropped at once.
    pub fn remove_player(&mut self, uid: PlayerUid) -> Result<()> {
        let pending_len = self.pending_add.len();
        self.pending_add.retain(|p| lock_player(p).uid != uid);
        let was_pending = self.pending_add.len() != pending_len;

        if self.live.contains_key(&uid) {
            if !self.pending_remove.contains(&uid) {
                self.pending_remove.push(uid);
            }
            Ok(())
        } else if was_pending {
            Ok(())
        } else {
            Err(anyhow!("Player {uid} not found"))
        }
    }

    /// A live or pending player.
    pub fn player(&self, uid: PlayerUid) -> Option<SharedPlayer> {
        self.live.get(&uid).cloned().or_else(|| {
            self.pending_add
                .iter()
                .find(|p| lock_player(p).uid == uid)
                .cloned()
        })
    }

    /// Live players, in uid order.
    pub fn player_uids(&self) -> Vec<PlayerUid> {
        let mut uids: Vec<PlayerUid> = self.live.keys().copied().collect();
        uids.sort_by_key(|uid| uid.0);
        uids
    }

    #[allow(missing_docs)]
    pub fn is_live(&self, uid: PlayerUid) -> bool {
        self.live.contains_key(&uid)
    }

    #[allow(missing_docs)]
    pub fn is_pending_removal(&self, uid: PlayerUid) -> bool {
        self.pending_remove.contains(&uid)
    }

    /// Names of the instruments that live and pending players play, sorted.
    pub fn instrument_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .live
            .values()
            .chain(self.pending_add.iter())
            .map(|p| lock_player(p).instrument.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// `(instrument, channel, program)` for every live player with a preset.
    pub fn presets(&self) -> Vec<(String, MidiChannel, u8)> {
        self.player_uids()
            .iter()
            .filter_map(|uid| self.live.get(uid))
            .filter_map(|p| {
                let p = lock_player(p);
                p.preset.map(|preset| (p.instrument.clone(), p.channel, preset))
            })
            .collect()
    }

    #[allow(missing_docs)]
    pub fn add_mute_group(&mut self, group: MuteGroup) {
        self.mute_groups.push(group);
    }

    #[allow(missing_docs)]
    pub fn mute_groups(&self) -> &[MuteGroup] {
        &self.mute_groups
    }

    #[allow(missing_docs)]
    pub fn active_players(&self) -> &FxHashSet<PlayerUid> {
        &self.active
    }

    /// A read-only projection for reporting.
    pub fn status(&self, is_running: bool) -> SessionStatus {
        SessionStatus {
            tick: self.clock.tick(),
            beat: self.clock.beat(),
            bar: self.clock.bar(),
            part: self.clock.part(),
            tick_count: self.clock.tick_count(),
            beat_count: self.clock.beat_count(),
            bar_count: self.clock.bar_count(),
            part_count: self.clock.part_count(),
            player_count: self.live.len(),
            active_player_count: self.active.len(),
            tempo: self.settings.tempo.0,
            is_running,
        }
    }

    #[allow(missing_docs)]
    pub fn uid(&self) -> SessionUid {
        self.uid
    }

    #[allow(missing_docs)]
    pub fn set_uid(&mut self, uid: SessionUid) {
        self.uid = uid;
    }

    #[allow(missing_docs)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[allow(missing_docs)]
    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    #[allow(missing_docs)]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Replaces the configuration. Takes effect at the next start.
    pub fn set_settings(&mut self, settings: SessionSettings) {
        self.settings = settings;
    }

    #[allow(missing_docs)]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}
