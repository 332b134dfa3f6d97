// Copyright (c) 2024 Mike Tsao

use rulebeat::{
    orchestration::lock_player,
    players::TickOutcome,
    prelude::*,
    types::PlayerUid,
};

fn settings() -> SessionSettings {
    SessionSettings {
        ticks_per_beat: 4,
        beats_per_bar: 4,
        bars: 4,
        seed: Some(17),
        ..Default::default()
    }
}

fn on_the_one(uid: i64, name: &str) -> Player {
    PlayerBuilder::default()
        .uid(PlayerUid(uid))
        .name(name)
        .instrument("drums")
        .rules(vec![Rule::new_with(Operator::Beat, Comparison::Equals, 1.0)])
        .build()
        .unwrap()
}

/// Drives one tick by hand the way the runner does, minus the threads.
fn run_tick(session: &mut Session) -> (TickContext, Vec<TickOutcome>) {
    let (ctx, players) = session.before_tick();
    let mut outcomes: Vec<TickOutcome> = players
        .iter()
        .map(|p| lock_player(p).call(&ctx))
        .collect();
    session.absorb(&mut outcomes);
    session.after_tick();
    (ctx, outcomes)
}

fn sounding(outcomes: &[TickOutcome]) -> Vec<PlayerUid> {
    outcomes
        .iter()
        .filter(|o| !o.notes.is_empty())
        .map(|o| o.uid)
        .collect()
}

#[test]
fn ratchet_fires_once_and_leaves_at_the_next_bar() {
    let mut session = Session::new_with(settings());
    let mut parent = on_the_one(1, "shaker");
    parent.sub_divisions = 4;
    parent.beat_fraction = 4;
    session.add_player(parent);
    session.before_start().unwrap();

    let ratchet = PlayerUid::for_ratchet(0);
    let mut echoes = Vec::default();
    for _ in 0..16 {
        let (ctx, outcomes) = run_tick(&mut session);
        if ctx.tick_count == 1 {
            assert!(sounding(&outcomes).is_empty(), "a burst replaces the hit");
            assert!(session.is_live(ratchet));
            assert!(session.is_pending_removal(ratchet));
        }
        echoes.extend(
            sounding(&outcomes)
                .into_iter()
                .filter(|uid| *uid == ratchet)
                .map(|_| ctx.tick_count),
        );
    }
    assert_eq!(echoes, vec![5], "four ticks after the parent, exactly once");
    assert!(!session.is_live(ratchet), "gone after the bar flush");
    assert!(!session.is_pending_removal(ratchet));

    // The next bar's burst gets a fresh uid.
    run_tick(&mut session);
    assert!(session.is_live(PlayerUid::for_ratchet(1)));
}

#[test]
fn ratchet_waiting_past_the_bar_survives_the_flush() {
    let mut session = Session::new_with(settings());
    let mut parent = on_the_one(1, "shaker");
    parent.sub_divisions = 4;
    parent.beat_fraction = 2;
    parent.ratchet_count = 1;
    parent.ratchet_interval = 20;
    session.add_player(parent);
    session.before_start().unwrap();

    // Targets are 3 and 23; the bar ends after tick 16.
    for _ in 0..16 {
        run_tick(&mut session);
    }
    assert!(!session.is_live(PlayerUid::for_ratchet(0)));
    assert!(session.is_live(PlayerUid::for_ratchet(1)));

    let mut fired_at = None;
    for _ in 16..32 {
        let (ctx, outcomes) = run_tick(&mut session);
        if sounding(&outcomes).contains(&PlayerUid::for_ratchet(1)) {
            fired_at = Some(ctx.tick_count);
        }
    }
    assert_eq!(fired_at, Some(23));
    assert!(!session.is_live(PlayerUid::for_ratchet(1)));
}

#[test]
fn additions_wait_for_the_bar_and_collapse() {
    let mut session = Session::new_with(settings());
    session.before_start().unwrap();
    run_tick(&mut session);

    let mut kick = on_the_one(1, "kick");
    session.add_player(kick.clone());
    kick.note = 35;
    session.add_player(kick);
    assert!(!session.is_live(PlayerUid(1)));

    let mut fired = 0;
    for _ in 1..16 {
        let (_, outcomes) = run_tick(&mut session);
        fired += sounding(&outcomes).len();
    }
    assert_eq!(fired, 0, "nothing plays before the bar boundary");
    assert_eq!(session.player_uids(), vec![PlayerUid(1)]);

    let (_, outcomes) = run_tick(&mut session);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].notes[0].note, 35, "the later add wins");
}

#[test]
fn removals_wait_for_the_bar() {
    let mut session = Session::new_with(settings());
    session.add_player(on_the_one(1, "kick"));
    session.add_player(on_the_one(2, "snare"));
    session.before_start().unwrap();

    run_tick(&mut session);
    session.remove_player(PlayerUid(2)).unwrap();
    assert!(session.remove_player(PlayerUid(3)).is_err());
    assert!(session.is_live(PlayerUid(2)));
    for _ in 1..16 {
        run_tick(&mut session);
    }
    assert_eq!(session.player_uids(), vec![PlayerUid(1)]);

    // Queued and withdrawn before the bar: never goes live at all.
    session.add_player(on_the_one(4, "tom"));
    session.remove_player(PlayerUid(4)).unwrap();
    for _ in 0..16 {
        run_tick(&mut session);
    }
    assert_eq!(session.player_uids(), vec![PlayerUid(1)]);
}

#[test]
fn readding_a_player_cancels_its_removal() {
    let mut session = Session::new_with(settings());
    session.add_player(on_the_one(1, "kick"));
    session.before_start().unwrap();

    run_tick(&mut session);
    session.remove_player(PlayerUid(1)).unwrap();
    let mut kick = on_the_one(1, "kick");
    kick.note = 35;
    session.add_player(kick);
    assert!(!session.is_pending_removal(PlayerUid(1)));

    for _ in 1..16 {
        run_tick(&mut session);
    }
    assert!(session.is_live(PlayerUid(1)), "the later add wins");

    let (_, outcomes) = run_tick(&mut session);
    assert_eq!(sounding(&outcomes), vec![PlayerUid(1)]);
    assert_eq!(outcomes[0].notes[0].note, 35);
}

#[test]
fn solo_outranks_mute() {
    let mut session = Session::new_with(settings());
    session.add_player(on_the_one(1, "kick"));
    session.add_player(on_the_one(2, "snare"));
    session.before_start().unwrap();

    let (_, outcomes) = run_tick(&mut session);
    assert_eq!(sounding(&outcomes), vec![PlayerUid(1), PlayerUid(2)]);

    {
        let snare = session.player(PlayerUid(2)).unwrap();
        let mut snare = lock_player(&snare);
        snare.solo = true;
        snare.muted = true;
    }
    for _ in 1..16 {
        run_tick(&mut session);
    }
    let (_, outcomes) = run_tick(&mut session);
    assert_eq!(sounding(&outcomes), vec![PlayerUid(2)]);
    assert_eq!(session.active_players().len(), 1);

    {
        let snare = session.player(PlayerUid(2)).unwrap();
        lock_player(&snare).solo = false;
    }
    for _ in 1..16 {
        run_tick(&mut session);
    }
    let (_, outcomes) = run_tick(&mut session);
    assert_eq!(sounding(&outcomes), vec![PlayerUid(1)], "muted without a solo");
}

#[test]
fn mute_group_keeps_the_lowest_uid() {
    let mut session = Session::new_with(settings());
    session.add_player(on_the_one(3, "open hat"));
    session.add_player(on_the_one(2, "closed hat"));
    session.add_player(on_the_one(1, "kick"));
    session.add_mute_group(MuteGroup::new_with(
        "hats",
        &[PlayerUid(2), PlayerUid(3)],
    ));
    session.before_start().unwrap();

    let (_, outcomes) = run_tick(&mut session);
    assert_eq!(sounding(&outcomes), vec![PlayerUid(1), PlayerUid(2)]);
    assert!(
        outcomes.iter().all(|o| o.fired),
        "silenced players still count as having fired"
    );
}

#[test]
fn seeded_sessions_repeat_themselves() {
    fn velocities() -> Vec<u8> {
        let mut session = Session::new_with(settings());
        let mut hat = on_the_one(1, "hat");
        hat.rules = vec![Rule::new_with(Operator::Tick, Comparison::Modulo, 1.0)];
        hat.rules.push(Rule::new_with(Operator::Beat, Comparison::GreaterThan, 0.0));
        hat.rules.push(Rule::new_with(Operator::Bar, Comparison::GreaterThan, 0.0));
        hat.min_velocity = 20;
        hat.max_velocity = 120;
        hat.probability = 50;
        session.add_player(hat);
        session.before_start().unwrap();
        (0..64)
            .flat_map(|_| run_tick(&mut session).1)
            .flat_map(|o| o.notes)
            .map(|n| n.velocity)
            .collect()
    }
    let first = velocities();
    assert!(!first.is_empty());
    assert!(first.len() < 64, "the probability gate drops some hits");
    assert_eq!(first, velocities());
}
