// Copyright (c) 2024 Mike Tsao

use super::{
    lock_player, InMemoryRepository, Repository, Session, SessionRecord, SharedPlayer,
};
use crate::{
    instruments::{Instrument, InstrumentRegistry},
    players::{MuteGroup, Player, Rule},
    runner::{ClockSource, SequenceRunner},
    timing::{SessionStatus, StatusBoard},
    types::{PlayerUid, RuleUid, SessionUid, UidFactory},
    util::{SequencerSettings, SessionSettings},
};
use anyhow::{anyhow, Result};
use delegate::delegate;
use std::sync::{Arc, Mutex, MutexGuard};

/// The control surface: everything a caller does to a running sequencer goes
/// through here.
///
/// Player and rule changes reach the live session at once (mute, solo, rule
/// edits) or at the next bar (additions, removals), and are saved to the
/// repositories as they happen. Unknown uids are reported as errors.
#[derive(Debug)]
pub struct Sequencer {
    session: Arc<Mutex<Session>>,
    registry: Arc<InstrumentRegistry>,
    runner: SequenceRunner,

    players: Box<dyn Repository<Player>>,
    sessions: Box<dyn Repository<SessionRecord>>,
    rule_uid_factory: UidFactory<RuleUid>,
}
impl Sequencer {
    /// A sequencer with in-memory repositories and one empty session.
    pub fn new_with(settings: &SequencerSettings, session_settings: SessionSettings) -> Result<Self> {
        Self::new_with_repositories(
            settings,
            session_settings,
            Box::<InMemoryRepository<Player>>::default(),
            Box::<InMemoryRepository<SessionRecord>>::default(),
        )
    }

    /// A sequencer that persists through the given repositories. Starts on a
    /// new session with `session_settings`.
    pub fn new_with_repositories(
        settings: &SequencerSettings,
        session_settings: SessionSettings,
        players: Box<dyn Repository<Player>>,
        mut sessions: Box<dyn Repository<SessionRecord>>,
    ) -> Result<Self> {
        session_settings.validate()?;
        let record = sessions.save(SessionRecord {
            settings: session_settings.clone(),
            ..Default::default()
        })?;
        let mut session = Session::new_with(session_settings);
        session.set_uid(record.uid);

        let session = Arc::new(Mutex::new(session));
        let registry = Arc::new(InstrumentRegistry::default());
        let runner = SequenceRunner::new_with(Arc::clone(&session), Arc::clone(&registry), settings);
        Ok(Self {
            session,
            registry,
            runner,
            players,
            sessions,
            rule_uid_factory: Default::default(),
        })
    }

    delegate! {
        to self.runner {
            /// Starts playback. Fails if no instrument the session uses can be
            /// opened.
            pub fn play(&mut self) -> Result<()>;
            /// Halts playback and rewinds to the top.
            pub fn pause(&mut self);
            /// Halts playback, rewinds, and closes the instruments.
            pub fn stop(&mut self);
            /// Processes one tick in offline mode.
            pub fn step(&mut self) -> Result<()>;
            /// Processes several ticks in offline mode.
            pub fn run_ticks(&mut self, count: u64) -> Result<()>;
            #[allow(missing_docs)]
            pub fn is_running(&self) -> bool;
            #[allow(missing_docs)]
            pub fn status_board(&self) -> StatusBoard;
            /// Changes the time source used from the next `play()` on.
            pub fn set_clock_source(&mut self, clock_source: Arc<dyn ClockSource>);
        }
    }

    /// The current status. While playing this is what the driver last
    /// published; otherwise it's read from the session.
    pub fn status(&self) -> SessionStatus {
        if self.runner.is_running() {
            self.runner.status()
        } else {
            self.session().status(false)
        }
    }

    /// Makes an instrument available to players by its name.
    pub fn register_instrument(&self, instrument: Box<dyn Instrument>) {
        self.registry.register(instrument);
    }

    #[allow(missing_docs)]
    pub fn registry(&self) -> Arc<InstrumentRegistry> {
        Arc::clone(&self.registry)
    }

    #[allow(missing_docs)]
    pub fn session_uid(&self) -> SessionUid {
        self.session().uid()
    }

    /// Saves a new player and queues it to join the session at the next bar.
    pub fn add_player(&mut self, mut player: Player) -> Result<PlayerUid> {
        for rule in player.rules.iter_mut() {
            if rule.uid == RuleUid::default() {
                rule.uid = self.rule_uid_factory.mint_next();
            } else {
                self.rule_uid_factory.notify_externally_minted_uid(rule.uid);
            }
        }
        let player = self.players.save(player)?;
        let uid = self.session().add_player(player);
        self.save_session()?;
        log::info!("Added player {uid}");
        Ok(uid)
    }

    /// Queues a player to leave the session at the next bar, and deletes it.
    pub fn remove_player(&mut self, uid: PlayerUid) -> Result<()> {
        self.session().remove_player(uid)?;
        if !uid.is_transient() {
            self.players.delete(uid)?;
        }
        self.save_session()?;
        log::info!("Removed player {uid}");
        Ok(())
    }

    /// Copies the settings of `player` onto the player with the same uid.
    pub fn update_player(&mut self, player: &Player) -> Result<()> {
        self.edit_player(player.uid, |p| {
            p.update_from(player);
            Ok(())
        })
    }

    /// A copy of a live or pending player.
    pub fn player(&self, uid: PlayerUid) -> Result<Player> {
        let shared = self.find_player(uid)?;
        let copy = lock_player(&shared).clone();
        Ok(copy)
    }

    /// Player uids in the live set, in order.
    pub fn player_uids(&self) -> Vec<PlayerUid> {
        self.session().player_uids()
    }

    /// Gives a player a new rule. Adding a rule equal to one the player
    /// already has returns the existing rule's uid.
    pub fn add_rule(&mut self, player_uid: PlayerUid, mut rule: Rule) -> Result<RuleUid> {
        let shared = self.find_player(player_uid)?;
        let snapshot = {
            let mut player = lock_player(&shared);
            if let Some(existing) = player.rules.iter().find(|r| **r == rule) {
                return Ok(existing.uid);
            }
            if rule.uid == RuleUid::default() {
                rule.uid = self.rule_uid_factory.mint_next();
            }
            player.rules.push(rule);
            player.clone()
        };
        if !player_uid.is_transient() {
            self.players.save(snapshot)?;
        }
        Ok(rule.uid)
    }

    #[allow(missing_docs)]
    pub fn remove_rule(&mut self, player_uid: PlayerUid, rule_uid: RuleUid) -> Result<()> {
        self.edit_player(player_uid, |p| {
            let before = p.rules.len();
            p.rules.retain(|r| r.uid != rule_uid);
            if p.rules.len() == before {
                Err(anyhow!("Rule {rule_uid} not found in player {player_uid}"))
            } else {
                Ok(())
            }
        })
    }

    #[allow(missing_docs)]
    pub fn set_muted(&mut self, uid: PlayerUid, muted: bool) -> Result<()> {
        self.edit_player(uid, |p| {
            p.muted = muted;
            Ok(())
        })
    }

    #[allow(missing_docs)]
    pub fn set_solo(&mut self, uid: PlayerUid, solo: bool) -> Result<()> {
        self.edit_player(uid, |p| {
            p.solo = solo;
            Ok(())
        })
    }

    /// Adds a mute group. Every member must be a known player.
    pub fn add_mute_group(&mut self, group: MuteGroup) -> Result<()> {
        for uid in group.members() {
            self.find_player(uid)?;
        }
        self.session().add_mute_group(group);
        self.save_session()
    }

    /// Saves the current session and switches to a new, empty one.
    pub fn new_session(&mut self, settings: SessionSettings) -> Result<SessionUid> {
        settings.validate()?;
        let record = self.sessions.save(SessionRecord {
            settings,
            ..Default::default()
        })?;
        self.switch_to(record)
    }

    /// Switches to the session after the current one, wrapping around.
    pub fn next_session(&mut self) -> Result<SessionUid> {
        let record = self.sessions.navigate_next(self.session_uid())?;
        self.switch_to(record)
    }

    /// Switches to the session before the current one, wrapping around.
    pub fn previous_session(&mut self) -> Result<SessionUid> {
        let record = self.sessions.navigate_previous(self.session_uid())?;
        self.switch_to(record)
    }

    fn switch_to(&mut self, record: SessionRecord) -> Result<SessionUid> {
        if record.uid == self.session_uid() {
            return Ok(record.uid);
        }
        self.save_session()?;
        let was_running = self.runner.is_running();
        if was_running {
            self.runner.pause();
        }

        let players = self.players.find_set(&record.players);
        for rule in players.iter().flat_map(|p| p.rules.iter()) {
            self.rule_uid_factory.notify_externally_minted_uid(rule.uid);
        }
        if players.len() != record.players.len() {
            log::warn!(
                "Session {} names {} players, but only {} were found",
                record.uid,
                record.players.len(),
                players.len()
            );
        }
        *self.session() = Session::new_from_record(&record, players);
        log::info!("Switched to session {}", record.uid);

        if was_running {
            self.runner.play()?;
        }
        Ok(record.uid)
    }

    fn edit_player<T>(
        &mut self,
        uid: PlayerUid,
        edit: impl FnOnce(&mut Player) -> Result<T>,
    ) -> Result<T> {
        let shared = self.find_player(uid)?;
        let (result, snapshot) = {
            let mut player = lock_player(&shared);
            let result = edit(&mut player)?;
            (result, player.clone())
        };
        if !uid.is_transient() {
            self.players.save(snapshot)?;
        }
        Ok(result)
    }

    fn find_player(&self, uid: PlayerUid) -> Result<SharedPlayer> {
        self.session()
            .player(uid)
            .ok_or_else(|| anyhow!("Player {uid} not found"))
    }

    fn save_session(&mut self) -> Result<()> {
        let record = self.session().to_record();
        self.sessions.save(record)?;
        Ok(())
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        instruments::RecordingInstrument,
        players::{Comparison, Operator, PlayerBuilder},
        util::RunMode,
    };

    fn offline_sequencer() -> Sequencer {
        let mut settings = SequencerSettings::default();
        settings.set_mode(RunMode::Offline);
        let s = Sequencer::new_with(
            &settings,
            SessionSettings {
                ticks_per_beat: 4,
                seed: Some(3),
                ..Default::default()
            },
        )
        .unwrap();
        s.register_instrument(Box::new(RecordingInstrument::new_with("drums")));
        s
    }

    fn kick() -> Player {
        PlayerBuilder::default()
            .name("kick")
            .instrument("drums")
            .rules(vec![Rule::new_with(Operator::Beat, Comparison::Equals, 1.0)])
            .build()
            .unwrap()
    }

    #[test]
    fn lookups_fail_loudly() {
        let mut s = offline_sequencer();
        let nobody = PlayerUid(42);
        assert!(s.remove_player(nobody).is_err());
        assert!(s.set_muted(nobody, true).is_err());
        assert!(s
            .add_rule(nobody, Rule::new_with(Operator::Tick, Comparison::Equals, 1.0))
            .is_err());
        assert_eq!(
            s.player(nobody).unwrap_err().to_string(),
            "Player 42 not found"
        );

        let uid = s.add_player(kick()).unwrap();
        assert!(s.remove_rule(uid, RuleUid(999)).is_err());
    }

    #[test]
    fn rules_get_uids_and_duplicates_collapse() {
        let mut s = offline_sequencer();
        let uid = s.add_player(kick()).unwrap();
        let first = s.player(uid).unwrap().rules[0].uid;
        assert_ne!(first, RuleUid::default());

        let again = s
            .add_rule(uid, Rule::new_with(Operator::Beat, Comparison::Equals, 1.0))
            .unwrap();
        assert_eq!(again, first);

        let bar = s
            .add_rule(uid, Rule::new_with(Operator::Bar, Comparison::Equals, 1.0))
            .unwrap();
        assert_eq!(bar.0, first.0 + 1, "the duplicate didn't use up a uid");
        assert_eq!(s.player(uid).unwrap().rules.len(), 2);
        s.remove_rule(uid, bar).unwrap();
        assert_eq!(s.player(uid).unwrap().rules.len(), 1);
    }

    #[test]
    fn players_join_at_the_next_bar() {
        let mut s = offline_sequencer();
        s.play().unwrap();
        let uid = s.add_player(kick()).unwrap();
        assert!(s.player_uids().is_empty());
        s.run_ticks(16).unwrap();
        assert_eq!(s.player_uids(), vec![uid]);
        assert_eq!(s.status().player_count, 1);
        s.stop();
    }

    #[test]
    fn navigation_swaps_sessions() {
        let mut s = offline_sequencer();
        let first_session = s.session_uid();
        let kick_uid = s.add_player(kick()).unwrap();

        let second_session = s
            .new_session(SessionSettings {
                ticks_per_beat: 8,
                ..Default::default()
            })
            .unwrap();
        assert_ne!(first_session, second_session);
        assert!(s.player(kick_uid).is_err(), "the new session is empty");

        assert_eq!(s.next_session().unwrap(), first_session);
        assert_eq!(s.player(kick_uid).unwrap().name, "kick");
        assert_eq!(s.previous_session().unwrap(), second_session);
        assert!(s.previous_session().is_ok());
    }
}
