//! Minimal command-line player for the built-in preset catalog
//!
//! The countdown lives here, not in the engine: the player only hears
//! `stop` when the session reaches zero.

use std::env;
use std::process;
use std::thread;
use std::time::Duration;

use entrain::{presets, TonePlayer};

const DEFAULT_SECONDS: u64 = 30;

fn print_usage() {
    eprintln!("usage: entrain-play <preset-id> [seconds]");
    eprintln!("       entrain-play --list");
}

fn print_catalog() {
    for preset in presets::catalog() {
        println!(
            "{:18} {:>8.2} Hz  {} — {}",
            preset.id, preset.hz, preset.label, preset.description
        );
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(first) = args.first() else {
        print_usage();
        process::exit(2);
    };

    match first.as_str() {
        "--help" | "-h" => print_usage(),
        "--list" => print_catalog(),
        id => {
            let Some(preset) = presets::find(id) else {
                eprintln!("unknown preset '{}'; try --list", id);
                process::exit(1);
            };
            let seconds = args
                .get(1)
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SECONDS);

            let mut player = TonePlayer::new();
            if let Err(err) = player.play(preset.to_request()) {
                eprintln!("failed to start audio: {}", err);
                process::exit(1);
            }
            println!(
                "playing {} ({:.2} Hz) for {} second(s)",
                preset.label, preset.hz, seconds
            );

            for remaining in (1..=seconds).rev() {
                thread::sleep(Duration::from_secs(1));
                if remaining % 10 == 0 && remaining != seconds {
                    println!("{} second(s) remaining", remaining);
                }
            }

            player.stop();
            // Let the fade-out and release finish before the stream drops.
            thread::sleep(Duration::from_millis(250));
        }
    }
}
