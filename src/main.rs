//! Fogline CLI
//!
//! Replays scripted input sessions against the story and inspects the
//! persisted leaderboard.

use anyhow::Context;
use clap::{Parser, Subcommand};
use fogline::{
    config::Config,
    core::{ChapterId, ChapterSource, Difficulty, FogStory, SessionController, SessionPhase},
    device::{
        Clock, ConsoleDisplay, LogIndicator, ManualClock, Peripherals, Script, ScriptedBoard,
        SystemClock,
    },
    scores::{format_time, ScoreBoard, ScoreKeeper},
    VERSION,
};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Extra replay time after the last scripted step, for trailing timeouts.
const REPLAY_GRACE: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(name = "fogline")]
#[command(version = VERSION)]
#[command(about = "Tilt-and-button narrative device, host build", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a session from a scripted input file
    Play {
        /// JSON-lines input script
        #[arg(long, short)]
        script: PathBuf,

        /// Skip the difficulty menu (easy, medium or hard)
        #[arg(long)]
        difficulty: Option<Difficulty>,

        /// Follow the wall clock instead of replaying as fast as possible
        #[arg(long)]
        realtime: bool,

        /// Stop after this many seconds of device time
        #[arg(long)]
        max_secs: Option<u64>,

        /// Do not read or write the leaderboard
        #[arg(long)]
        no_scores: bool,
    },

    /// Show the leaderboard
    Scores,

    /// List the story chapters and their challenges
    Chapters {
        #[arg(long, default_value = "easy")]
        difficulty: Difficulty,
    },

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fogline=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Play {
            script,
            difficulty,
            realtime,
            max_secs,
            no_scores,
        } => cmd_play(script, difficulty, realtime, max_secs, no_scores),
        Commands::Scores => cmd_scores(),
        Commands::Chapters { difficulty } => {
            cmd_chapters(difficulty);
            Ok(())
        }
        Commands::Config => {
            cmd_config();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Could not load config, using defaults: {}", e);
            Config::default()
        }
    }
}

fn cmd_play(
    script_path: PathBuf,
    difficulty: Option<Difficulty>,
    realtime: bool,
    max_secs: Option<u64>,
    no_scores: bool,
) -> anyhow::Result<()> {
    println!("Fogline v{VERSION}");
    println!();

    let config = load_config();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let script = Script::load(&script_path)
        .with_context(|| format!("loading script {}", script_path.display()))?;
    info!(
        "Loaded {} scripted steps ({} s)",
        script.steps().len(),
        script.duration().as_secs()
    );

    let deadline = match (max_secs, realtime) {
        (Some(secs), _) => Some(Duration::from_secs(secs)),
        (None, false) => Some(script.duration() + REPLAY_GRACE),
        (None, true) => None,
    };

    let clock: Rc<dyn Clock> = if realtime {
        Rc::new(SystemClock::new())
    } else {
        Rc::new(ManualClock::new())
    };
    let board = ScriptedBoard::new(script, clock.clone());
    let peripherals = Peripherals {
        sensor: Box::new(board.sensor()),
        input: Box::new(board.input()),
        display: Box::new(ConsoleDisplay::new()),
        indicator: Box::new(LogIndicator),
    };

    let mut session =
        SessionController::new(config.clone(), peripherals, Box::new(clock), Box::new(FogStory));
    if !no_scores {
        let scores = match ScoreBoard::open(config.highscores_path()) {
            Ok(scores) => scores,
            Err(e) => {
                warn!("Leaderboard unavailable, scores will not be kept: {}", e);
                ScoreBoard::in_memory(Vec::new())
            }
        };
        session = session.with_scores(Box::new(scores));
    }
    if let Some(difficulty) = difficulty {
        session = session.with_difficulty(difficulty);
    }

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    session.boot().context("calibration")?;
    let phase = session.run(&running, deadline);
    if !matches!(phase, SessionPhase::Finished | SessionPhase::PlayAgain) {
        println!("Session stopped before completion ({phase:?})");
    }

    for report in session.into_reports() {
        println!();
        println!("Session {}", report.session_id);
        for record in &report.chapters {
            println!(
                "  {}: entered {}x, {} failed, {} restarts{}",
                record.chapter,
                record.entries,
                record.failed_attempts,
                record.restarts,
                if record.cleared { ", cleared" } else { "" }
            );
        }
        if let Some(seconds) = report.total_seconds {
            println!("  Total time: {}", format_time(seconds));
        }
        if let Some(rank) = report.rank {
            println!("  Rank: #{rank}");
        }
        if let Some(error) = &report.score_error {
            println!("  Score not saved: {error}");
        }

        let path = report
            .save(&config.sessions_path())
            .context("saving session report")?;
        println!("Report written to {path:?}");
    }
    Ok(())
}

fn cmd_scores() -> anyhow::Result<()> {
    let config = load_config();
    let board = ScoreBoard::open(config.highscores_path()).context("opening leaderboard")?;

    println!("HIGH SCORES");
    println!("===========");
    let scores = board.top_scores();
    if scores.is_empty() {
        println!("No scores yet!");
    }
    for (i, entry) in scores.iter().enumerate() {
        println!("#{} {} {}", i + 1, entry.initials, format_time(entry.seconds));
    }
    Ok(())
}

fn cmd_chapters(difficulty: Difficulty) {
    let story = FogStory;
    let profile = load_config().difficulty.profile(difficulty);

    println!("Story on {difficulty} (timeouts x{})", profile.timeout_multiplier);
    println!();
    for n in 1..=story.chapter_count() {
        let Some(spec) = story.load(ChapterId::new(n), difficulty) else {
            continue;
        };
        println!("{}: {}", spec.id, spec.title);
        for challenge in &spec.challenges {
            let timeout = challenge
                .scaled_timeout(profile.timeout_multiplier)
                .map(|t| format!("{:.1}s", t.as_secs_f32()))
                .unwrap_or_else(|| "no limit".to_string());
            println!("  - {} [{}]", challenge.prompt, timeout);
        }
    }
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")
}
