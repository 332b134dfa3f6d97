// Copyright (c) 2024 Mike Tsao

use rulebeat::{prelude::*, timing::Rollover};

fn position(clock: &Clock) -> (u64, u64, u64, u64) {
    (clock.part(), clock.bar(), clock.beat(), clock.tick())
}

#[test]
fn clock_hierarchy_cascades_at_boundaries() {
    let mut clock = Clock::new_with(&SessionSettings {
        ticks_per_beat: 4,
        beats_per_bar: 2,
        bars: 2,
        parts: 2,
        part_length: 2,
        ..Default::default()
    });
    clock.prime();
    assert_eq!(position(&clock), (1, 1, 1, 1));
    assert_eq!(clock.tick_count(), 1);

    let mut rollovers = Vec::default();
    for _ in 0..16 {
        rollovers.push(clock.after_tick());
    }

    // One beat is four ticks; a bar is two beats.
    assert!(rollovers[3].beat && !rollovers[3].bar);
    assert_eq!(
        rollovers[7],
        Rollover {
            beat: true,
            bar: true,
            part: false
        }
    );
    assert_eq!(
        rollovers[15],
        Rollover {
            beat: true,
            bar: true,
            part: true
        }
    );
    assert_eq!(
        rollovers.iter().filter(|r| r.beat).count(),
        4,
        "sixteen ticks hold four beats"
    );

    assert_eq!(position(&clock), (2, 1, 1, 1));
    assert_eq!(clock.tick_count(), 17);
    assert_eq!(clock.beat_count(), 5);
    assert_eq!(clock.bar_count(), 3);
    assert_eq!(clock.part_count(), 2);

    for _ in 0..16 {
        clock.after_tick();
    }
    assert_eq!(position(&clock), (1, 1, 1, 1), "parts wrap too");
    assert_eq!(clock.part_count(), 3);
}

#[test]
fn session_snapshots_follow_the_clock() {
    let mut session = Session::new_with(SessionSettings {
        ticks_per_beat: 2,
        beats_per_bar: 2,
        seed: Some(1),
        ..Default::default()
    });
    session.before_start().unwrap();

    let mut seen = Vec::default();
    for _ in 0..5 {
        let (ctx, _) = session.before_tick();
        seen.push((ctx.bar, ctx.beat, ctx.tick, ctx.tick_count));
        session.after_tick();
    }
    assert_eq!(
        seen,
        vec![
            (1, 1, 1, 1),
            (1, 1, 2, 2),
            (1, 2, 1, 3),
            (1, 2, 2, 4),
            (2, 1, 1, 5)
        ]
    );

    session.reset();
    assert_eq!(session.clock().tick_count(), 0);
    assert_eq!(
        session.status(false),
        SessionStatus {
            tempo: 120.0,
            ..Default::default()
        }
    );
}
