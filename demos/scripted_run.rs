//! Demonstration of a full scripted session.
//!
//! This example shows how to:
//! 1. Build an input script in code and save it as JSON lines
//! 2. Wire scripted peripherals to the session controller
//! 3. Replay the story on a manual clock, as fast as possible
//! 4. Read the session report
//!
//! Run with: cargo run --example scripted_run
//!
//! The saved script can be replayed with `fogline play --script <file>`.

use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use fogline::{
    config::Config,
    core::{Difficulty, FogStory, SessionController},
    device::{
        ConsoleDisplay, LogIndicator, ManualClock, Peripherals, Script, ScriptedBoard,
    },
    scores::{ScoreBoard, ScoreEntry},
    sensing::ButtonId,
};

fn tilt(script: Script, at_ms: u64, x: f32, y: f32) -> Script {
    script.accel(at_ms, x, y, 9.8).accel(at_ms + 300, 0.0, 0.0, 9.8)
}

fn hold_both(script: Script, at_ms: u64, hold_ms: u64) -> Script {
    script
        .press(at_ms, ButtonId::Left)
        .press(at_ms, ButtonId::Right)
        .release(at_ms + hold_ms, ButtonId::Left)
        .release(at_ms + hold_ms, ButtonId::Right)
}

fn clicks(mut script: Script, buttons: &[(u64, ButtonId)]) -> Script {
    for &(at, button) in buttons {
        script = script.click(at, button, 60);
    }
    script
}

fn build_script() -> Script {
    use ButtonId::{Encoder, Left, Right};

    let mut s = clicks(Script::new(), &[(1_500, Right), (1_800, Encoder)]);
    for i in 0..40u64 {
        let x = if i % 2 == 0 { 8.0 } else { -8.0 };
        s = s.accel(2_000 + i * 10, x, 0.0, 9.8);
    }
    let s = s.accel(2_400, 0.0, 0.0, 9.8);
    let s = clicks(s, &[(2_800, Right), (3_100, Right), (3_400, Encoder)]);
    let s = tilt(s, 3_600, -5.0, 0.0);
    let s = hold_both(s, 4_200, 5_600);
    let s = clicks(s, &[(10_200, Encoder)]);
    let s = tilt(s, 10_500, 0.0, 5.0);
    let s = clicks(
        s,
        &[(11_200, Right), (11_500, Encoder), (12_000, Left), (12_250, Left)],
    );
    let s = clicks(s, &[(12_600, Left), (13_000, Right), (13_400, Left)]);
    let s = tilt(s, 13_800, 0.0, 5.0);
    let s = clicks(s, &[(14_500, Right), (14_800, Right), (15_100, Encoder)]);
    let s = tilt(s, 15_500, 5.0, 0.0);
    let s = tilt(s, 16_100, -5.0, 0.0);
    let s = tilt(s, 16_700, 0.0, 5.0);
    let s = tilt(s, 17_300, 0.0, -5.0);
    let s = clicks(s, &[(18_000, Encoder)]);
    let s = hold_both(s, 18_500, 3_600);
    let s = clicks(s, &[(22_500, Right), (22_750, Right)]);
    let s = tilt(s, 23_200, 0.0, 5.0);
    let s = hold_both(s, 23_800, 3_600);

    // Initials after the final question times out: "BAA", then "No" to
    // playing again
    let s = s.rotate(37_500, 1).click(38_000, Encoder, 60);
    clicks(s, &[(38_500, Right), (39_000, Encoder)])
}

fn main() {
    println!("Fogline - Scripted Run Demo");
    println!("===========================");
    println!();

    let script = build_script();
    let path = std::env::temp_dir().join("fogline-demo.jsonl");
    match script.to_json_lines() {
        Ok(lines) => match std::fs::write(&path, lines) {
            Ok(_) => println!("Script saved to {path:?} ({} steps)", script.steps().len()),
            Err(e) => eprintln!("Could not save script: {e}"),
        },
        Err(e) => eprintln!("Could not serialize script: {e}"),
    }
    println!();

    let clock = ManualClock::new();
    let board = ScriptedBoard::new(script, Rc::new(clock.clone()));
    let peripherals = Peripherals {
        sensor: Box::new(board.sensor()),
        input: Box::new(board.input()),
        display: Box::new(ConsoleDisplay::new()),
        indicator: Box::new(LogIndicator),
    };

    let scores = ScoreBoard::in_memory(vec![
        ScoreEntry {
            initials: "JAY".to_string(),
            seconds: 95,
        },
        ScoreEntry {
            initials: "MEI".to_string(),
            seconds: 140,
        },
    ]);

    let mut session = SessionController::new(
        Config::default(),
        peripherals,
        Box::new(clock),
        Box::new(FogStory),
    )
    .with_scores(Box::new(scores))
    .with_difficulty(Difficulty::Easy);

    if let Err(e) = session.boot() {
        eprintln!("Calibration failed: {e}");
        return;
    }
    let phase = session.run(&AtomicBool::new(true), Some(Duration::from_secs(90)));
    println!();
    println!("Finished in phase {phase:?}");

    for report in session.into_reports() {
        match report.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing report: {e}"),
        }
    }
}
