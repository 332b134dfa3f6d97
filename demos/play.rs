// Copyright (c) 2024 Mike Tsao

//! This example plays a short drum pattern, either on a MIDI output port or,
//! with no port available, into a log.

use clap::Parser;
use rulebeat::{
    instruments::RecordingInstrument,
    prelude::*,
    types::{MidiChannel, Tempo},
};
use rulebeat_services::{list_output_ports, MidirInstrument, PortSelector};
use std::time::Duration;

const INSTRUMENT: &str = "drums";

/// The program's command-line arguments.
#[derive(clap::Parser, Debug, Default)]
#[clap(author, about, long_about = None)]
struct Args {
    /// Print version and exit
    #[clap(short = 'v', long, value_parser)]
    version: bool,

    /// List MIDI output ports and exit
    #[clap(short = 'l', long, value_parser)]
    list: bool,

    /// MIDI output port, by index or by (part of) its name
    #[clap(short = 'p', long)]
    port: Option<String>,

    /// Beats per minute
    #[clap(short = 't', long, default_value_t = 112.0)]
    tempo: f64,

    /// How long to play, in seconds
    #[clap(short = 's', long, default_value_t = 8)]
    seconds: u64,

    /// Process this many ticks as fast as possible instead of in real time
    #[clap(long)]
    offline_ticks: Option<u64>,

    /// Fix the random streams so that every run sounds the same
    #[clap(long)]
    seed: Option<u64>,
}

fn drum(name: &str, note: u8, rules: Vec<Rule>) -> anyhow::Result<Player> {
    Ok(PlayerBuilder::default()
        .name(name)
        .instrument(INSTRUMENT)
        .channel(MidiChannel::DRUM)
        .note(note)
        .rules(rules)
        .build()?)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.version {
        eprintln!("{}", rulebeat::app_version());
        return Ok(());
    }
    if args.list {
        for port in list_output_ports()? {
            println!("{}: {}", port.index, port.name);
        }
        return Ok(());
    }

    let mut settings = SequencerSettings::default();
    if args.offline_ticks.is_some() {
        settings.set_mode(RunMode::Offline);
    }
    let mut sequencer = Sequencer::new_with(
        &settings,
        SessionSettings {
            tempo: Tempo(args.tempo),
            seed: args.seed,
            ..Default::default()
        },
    )?;

    match args.port {
        Some(port) => {
            let selector = match port.parse::<usize>() {
                Ok(index) => PortSelector::Index(index),
                Err(_) => PortSelector::Name(port),
            };
            sequencer.register_instrument(Box::new(MidirInstrument::new_with(INSTRUMENT, selector)));
        }
        None => {
            log::info!("No MIDI port given; logging notes instead");
            sequencer.register_instrument(Box::new(
                RecordingInstrument::new_with(INSTRUMENT).with_logging(),
            ));
        }
    }

    let on_beat = |beat: f64| Rule::new_with(Operator::Beat, Comparison::Equals, beat);
    sequencer.add_player(drum("kick", 36, vec![on_beat(1.0), on_beat(3.0)])?)?;
    sequencer.add_player(drum("snare", 38, vec![on_beat(2.0), on_beat(4.0)])?)?;

    let mut hat = drum(
        "hat",
        42,
        vec![
            Rule::new_with(Operator::Tick, Comparison::Equals, 1.0),
            Rule::new_with(Operator::Tick, Comparison::Equals, 13.0),
            Rule::new_with(Operator::Beat, Comparison::GreaterThan, 0.0),
            Rule::new_with(Operator::Bar, Comparison::GreaterThan, 0.0),
        ],
    )?;
    // Fires when a draw from 0..100 beats this, so roughly 70% of the time.
    hat.probability = 30;
    hat.swing = 20;
    hat.min_velocity = 60;
    hat.max_velocity = 90;

    let mut shaker = drum("shaker", 70, vec![on_beat(4.0)])?;
    shaker.sub_divisions = 4;
    shaker.beat_fraction = 2;
    shaker.ratchet_count = 1;
    shaker.ratchet_interval = 1;
    sequencer.add_player(shaker)?;
    sequencer.add_player(hat)?;

    sequencer.play()?;
    match args.offline_ticks {
        Some(ticks) => sequencer.run_ticks(ticks)?,
        None => std::thread::sleep(Duration::from_secs(args.seconds)),
    }
    let status = sequencer.status();
    sequencer.stop();

    eprintln!(
        "Stopped at part {} bar {} beat {} tick {} (#{}) with {} players",
        status.part,
        status.bar,
        status.beat,
        status.tick,
        status.tick_count,
        status.player_count
    );
    Ok(())
}
