//! Session controller: the top-level cooperative loop.
//!
//! One tick, in fixed order:
//! 1. poll the input device and read the sensor (same instant),
//! 2. publish input events, then the gesture, onto the bus,
//! 3. drain the bus into the active consumer (menu, chapter machine, initials),
//! 4. run the chapter machine's deadline checks,
//! 5. dispatch queued indicator feedback and re-render if anything changed.
//!
//! A transition in step 3 (menu commit, chapter outcome, initials confirmed)
//! discards the rest of that tick's events, so no input crosses into the new
//! chapter or screen.
//!
//! The controller owns every piece of mutable state, including the single
//! [`ChapterMachine`]; chapter tables are fetched from the [`ChapterSource`]
//! one at a time.

use crate::config::Config;
use crate::core::bus::EventBus;
use crate::core::chapter::{ChapterId, ChapterMachine, Outcome, Step};
use crate::core::difficulty::Difficulty;
use crate::core::feedback::{Cue, Feedback};
use crate::core::menu::{is_commit, Cursor, EntryStep, InitialsEntry};
use crate::core::story::ChapterSource;
use crate::device::{Clock, Peripherals};
use crate::report::SessionReport;
use crate::scores::{format_time, ScoreKeeper};
use crate::sensing::filter::{CalibrationError, CalibrationReport, SignalFilter};
use crate::sensing::gesture::GestureClassifier;
use crate::sensing::input::InputAggregator;
use crate::sensing::types::{GestureEvent, TimedEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Calibrating,
    SelectingDifficulty,
    Playing,
    EnteringInitials,
    /// "Do you want to restart": Yes returns to the difficulty menu.
    PlayAgain,
    Finished,
}

/// Answers on the play-again screen, in cursor order.
const PLAY_AGAIN: [&str; 2] = ["Yes", "No"];

/// Shortest scheduling tick the run loop sleeps for.
const MIN_TICK: Duration = Duration::from_millis(1);

/// A completion waiting for the player's initials.
#[derive(Debug, Clone, Copy)]
struct PendingScore {
    seconds: u64,
    rank: u8,
}

pub struct SessionController {
    config: Config,
    peripherals: Peripherals,
    clock: Box<dyn Clock>,
    filter: SignalFilter,
    classifier: GestureClassifier,
    aggregator: InputAggregator,
    bus: EventBus,
    story: Box<dyn ChapterSource>,
    scores: Option<Box<dyn ScoreKeeper>>,

    phase: SessionPhase,
    difficulty: Option<Difficulty>,
    menu: Cursor,
    play_again: Cursor,
    machine: Option<ChapterMachine>,
    entry: Option<InitialsEntry>,
    pending_score: Option<PendingScore>,
    session_started: Option<Duration>,

    notice: Option<String>,
    last_countdown: Option<u64>,
    cues: Vec<Cue>,
    dirty: bool,
    transitioned: bool,

    outcomes: Vec<Outcome>,
    report: SessionReport,
    /// Reports of earlier plays in this power cycle.
    completed: Vec<SessionReport>,
}

impl SessionController {
    pub fn new(
        config: Config,
        peripherals: Peripherals,
        clock: Box<dyn Clock>,
        story: Box<dyn ChapterSource>,
    ) -> Self {
        Self {
            filter: SignalFilter::new(config.filter.clone()),
            classifier: GestureClassifier::new(config.gesture.clone()),
            aggregator: InputAggregator::new(config.input.clone()),
            bus: EventBus::new(config.bus_capacity),
            config,
            peripherals,
            clock,
            story,
            scores: None,
            phase: SessionPhase::Calibrating,
            difficulty: None,
            menu: Cursor::new(Difficulty::ALL.len()),
            play_again: Cursor::new(PLAY_AGAIN.len()),
            machine: None,
            entry: None,
            pending_score: None,
            session_started: None,
            notice: None,
            last_countdown: None,
            cues: Vec::new(),
            dirty: true,
            transitioned: false,
            outcomes: Vec::new(),
            report: SessionReport::new(),
            completed: Vec::new(),
        }
    }

    /// Attach the ranking collaborator. Without one, no completion ever ranks.
    pub fn with_scores(mut self, scores: Box<dyn ScoreKeeper>) -> Self {
        self.scores = Some(scores);
        self
    }

    /// Skip the difficulty menu.
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    pub fn machine(&self) -> Option<&ChapterMachine> {
        self.machine.as_ref()
    }

    /// Every chapter outcome of the current play, oldest first.
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    /// Report for the current play.
    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    /// Reports of plays that ended in "play again".
    pub fn completed_reports(&self) -> &[SessionReport] {
        &self.completed
    }

    /// Every play's report, oldest first. A play abandoned at the
    /// difficulty menu after a restart is left out.
    pub fn into_reports(self) -> Vec<SessionReport> {
        let mut reports = self.completed;
        if reports.is_empty() || self.report.difficulty.is_some() {
            reports.push(self.report);
        }
        reports
    }

    /// Light the boot cue and capture the baseline. Blocks for the
    /// calibration window.
    pub fn boot(&mut self) -> Result<CalibrationReport, CalibrationError> {
        self.show(Cue::Boot);
        self.peripherals.display.render(
            &["Calibrating...".to_string(), "Keep the device still".to_string()],
            None,
        );

        let report = self
            .filter
            .calibrate(self.peripherals.sensor.as_mut(), self.clock.as_ref())?;
        info!(
            "Calibrated over {} samples: origin ({:.2}, {:.2}, {:.2}), magnitude {:.2} +- {:.3}",
            report.samples,
            report.origin.x,
            report.origin.y,
            report.origin.z,
            report.mean_magnitude,
            report.magnitude_std_dev
        );
        if report.disturbed {
            warn!(
                "Device moved during calibration (std dev {:.3}); continuing with skewed baseline",
                report.magnitude_std_dev
            );
        }
        self.report.calibration = Some(report.clone());

        let now = self.clock.now();
        match self.difficulty {
            Some(difficulty) => self.start_playing(difficulty, now),
            None => self.phase = SessionPhase::SelectingDifficulty,
        }
        self.dirty = true;
        self.render(now);
        Ok(report)
    }

    /// One scheduling tick.
    pub fn tick(&mut self) -> SessionPhase {
        if matches!(
            self.phase,
            SessionPhase::Calibrating | SessionPhase::Finished
        ) {
            return self.phase;
        }
        let now = self.clock.now();

        let snapshot = self.peripherals.input.snapshot();
        let inputs = self.aggregator.poll(&snapshot, now);
        let gesture = self.sense();

        for event in inputs {
            self.bus.publish(event, now);
        }
        if let Some(gesture) = gesture {
            debug!("Gesture {:?}", gesture);
            self.bus.publish(gesture, now);
        }

        self.transitioned = false;
        let batch = self.bus.drain();
        let total = batch.len();
        for (handled, timed) in batch.iter().enumerate() {
            self.dispatch(timed);
            if self.transitioned {
                if handled + 1 < total {
                    debug!("Discarding {} events after transition", total - handled - 1);
                }
                break;
            }
        }

        if self.phase == SessionPhase::Playing {
            let step = match self.machine.as_mut() {
                Some(machine) => machine.tick(now),
                None => Step::Idle,
            };
            self.apply_step(step, now);
        }

        for cue in std::mem::take(&mut self.cues) {
            self.show(cue);
        }
        self.render(now);
        self.phase
    }

    /// Tick until the session finishes, `running` is cleared, or the clock
    /// passes `deadline`.
    pub fn run(&mut self, running: &AtomicBool, deadline: Option<Duration>) -> SessionPhase {
        if self.phase == SessionPhase::Calibrating {
            if let Err(e) = self.boot() {
                error!("Calibration failed: {}", e);
                return self.phase;
            }
        }

        while running.load(Ordering::SeqCst) && self.phase != SessionPhase::Finished {
            if deadline.is_some_and(|d| self.clock.now() >= d) {
                warn!("Session stopped at deadline in phase {:?}", self.phase);
                break;
            }
            self.tick();
            self.clock.sleep(self.config.tick_interval.max(MIN_TICK));
        }

        self.shutdown();
        self.phase
    }

    /// Final screen and indicator off.
    pub fn shutdown(&mut self) {
        self.report.dropped_events = self.bus.dropped();
        self.peripherals
            .display
            .render(&["Thank you for playing".to_string()], None);
        self.show(Cue::Off);
    }

    fn sense(&mut self) -> Option<GestureEvent> {
        let sample = match self.peripherals.sensor.read() {
            Ok(raw) => self.filter.update(raw),
            Err(fault) => {
                debug!("Sensor read failed, holding last sample: {}", fault);
                self.filter.hold()
            }
        };
        let baseline = *self.filter.baseline()?;
        self.classifier.classify(sample, &baseline)
    }

    fn dispatch(&mut self, timed: &TimedEvent) {
        match self.phase {
            SessionPhase::SelectingDifficulty => {
                if is_commit(&timed.event) {
                    let difficulty = Difficulty::ALL[self.menu.index()];
                    self.start_playing(difficulty, timed.at);
                } else if self.menu.navigate(&timed.event) {
                    self.dirty = true;
                }
            }
            SessionPhase::Playing => {
                let step = match self.machine.as_mut() {
                    Some(machine) => machine.handle(timed),
                    None => Step::Idle,
                };
                self.apply_step(step, timed.at);
            }
            SessionPhase::EnteringInitials => {
                let step = match self.entry.as_mut() {
                    Some(entry) => entry.handle(&timed.event),
                    None => EntryStep::Unchanged,
                };
                match step {
                    EntryStep::Unchanged => {}
                    EntryStep::Edited => self.dirty = true,
                    EntryStep::Confirmed(initials) => self.submit_initials(initials),
                }
            }
            SessionPhase::PlayAgain => {
                if is_commit(&timed.event) {
                    if self.play_again.index() == 0 {
                        self.restart_session();
                    } else {
                        self.finish();
                    }
                } else if self.play_again.navigate(&timed.event) {
                    self.dirty = true;
                }
            }
            SessionPhase::Calibrating | SessionPhase::Finished => {}
        }
    }

    fn start_playing(&mut self, difficulty: Difficulty, now: Duration) {
        info!("Starting session on {}", difficulty);
        self.difficulty = Some(difficulty);
        self.report.difficulty = Some(difficulty);

        let Some(spec) = self.story.load(ChapterId::FIRST, difficulty) else {
            error!("Story has no first chapter");
            self.finish();
            return;
        };

        let profile = self.config.difficulty.profile(difficulty);
        self.session_started = Some(now);
        self.report.record_entry(spec.id);
        self.machine = Some(ChapterMachine::start(
            spec,
            difficulty,
            profile,
            self.config.input.rhythm_repeat_gate,
            now,
            now,
        ));
        self.phase = SessionPhase::Playing;
        self.dirty = true;
        self.transitioned = true;
    }

    fn current_chapter(&self) -> Option<ChapterId> {
        self.machine.as_ref().map(|m| m.state().chapter)
    }

    fn apply_step(&mut self, step: Step, now: Duration) {
        match step {
            Step::Idle => {}
            Step::Progressed => self.dirty = true,
            Step::ChallengeCleared { cleared } => {
                debug!("Challenge {} cleared", cleared);
                self.notice = None;
                self.dirty = true;
            }
            Step::AttemptFailed {
                retries_remaining,
                hint,
            } => {
                if let Some(chapter) = self.current_chapter() {
                    self.report.record_failure(chapter);
                    info!("{} attempt failed, retries left {:?}", chapter, retries_remaining);
                }
                self.cues.push(Cue::Failure);
                self.notice = Some(hint.unwrap_or_else(|| "Try again...".to_string()));
                self.dirty = true;
            }
            Step::HintDue(text) => {
                self.notice = Some(text);
                self.dirty = true;
            }
            Step::Resolved(outcome) => self.resolve(outcome, now),
        }
    }

    fn resolve(&mut self, outcome: Outcome, now: Duration) {
        self.transitioned = true;
        self.outcomes.push(outcome);
        self.cues.push(Cue::from(&outcome));
        self.notice = None;
        self.dirty = true;

        let current = self.current_chapter();
        match outcome {
            Outcome::Advance(next) => {
                if let Some(chapter) = current {
                    self.report.record_cleared(chapter);
                    info!("{} cleared", chapter);
                }
                self.enter_chapter(next, now);
            }
            Outcome::Restart(target) => {
                if let Some(chapter) = current {
                    self.report.record_failure(chapter);
                    self.report.record_restart(chapter);
                    info!("{} failed, restarting {}", chapter, target);
                }
                self.enter_chapter(target, now);
            }
            Outcome::SessionComplete(total) => {
                if let Some(chapter) = current {
                    self.report.record_cleared(chapter);
                }
                self.complete(total);
            }
        }
    }

    fn enter_chapter(&mut self, id: ChapterId, now: Duration) {
        let Some(difficulty) = self.difficulty else {
            return;
        };
        let Some(spec) = self.story.load(id, difficulty) else {
            error!("Story has no {}", id);
            self.finish();
            return;
        };
        self.report.record_entry(id);
        if let Some(machine) = self.machine.as_mut() {
            machine.load(spec, now);
        }
    }

    fn complete(&mut self, total: Duration) {
        let seconds = total.as_secs();
        self.report.total_seconds = Some(seconds);
        info!("Session complete in {}", format_time(seconds));

        let rank = self.scores.as_ref().and_then(|s| s.rank_for(seconds));
        match rank {
            Some(rank) => {
                info!("Completion ranks #{}", rank);
                self.pending_score = Some(PendingScore { seconds, rank });
                self.entry = Some(InitialsEntry::new());
                self.phase = SessionPhase::EnteringInitials;
            }
            None => self.offer_play_again(),
        }
    }

    fn submit_initials(&mut self, initials: String) {
        self.transitioned = true;
        let Some(pending) = self.pending_score.take() else {
            self.offer_play_again();
            return;
        };

        let rank = match self.scores.as_mut() {
            Some(scores) => match scores.record(&initials, pending.seconds) {
                Ok(rank) => rank,
                Err(e) => {
                    warn!("Could not record score: {}", e);
                    self.report.score_error = Some(e.to_string());
                    None
                }
            },
            None => None,
        };
        if rank != Some(pending.rank) {
            debug!("Rank changed from {} to {:?} on record", pending.rank, rank);
        }

        self.report.rank = rank;
        self.report.initials = Some(initials);
        self.entry = None;
        self.offer_play_again();
    }

    fn offer_play_again(&mut self) {
        self.report.dropped_events = self.bus.dropped();
        self.play_again = Cursor::new(PLAY_AGAIN.len());
        self.phase = SessionPhase::PlayAgain;
        self.dirty = true;
        self.transitioned = true;
    }

    /// Start over at the difficulty menu. Calibration and the leaderboard
    /// carry over; the finished play's report is kept.
    fn restart_session(&mut self) {
        info!("Playing again");
        let calibration = self.report.calibration.clone();
        let finished = std::mem::take(&mut self.report);
        self.completed.push(finished);
        self.report.calibration = calibration;

        self.difficulty = None;
        self.menu = Cursor::new(Difficulty::ALL.len());
        self.machine = None;
        self.entry = None;
        self.pending_score = None;
        self.session_started = None;
        self.notice = None;
        self.outcomes.clear();
        self.phase = SessionPhase::SelectingDifficulty;
        self.dirty = true;
        self.transitioned = true;
    }

    fn finish(&mut self) {
        self.phase = SessionPhase::Finished;
        self.report.dropped_events = self.bus.dropped();
        self.dirty = true;
        self.transitioned = true;
    }

    fn show(&mut self, cue: Cue) {
        let feedback = Feedback::for_cue(cue, &self.config.feedback);
        self.peripherals
            .indicator
            .show(feedback.color, feedback.duration);
    }

    fn countdown(&self, now: Duration) -> Option<u64> {
        if self.phase != SessionPhase::Playing {
            return None;
        }
        self.machine
            .as_ref()
            .and_then(|m| m.remaining(now))
            .map(|d| d.as_secs())
    }

    fn render(&mut self, now: Duration) {
        let countdown = self.countdown(now);
        if countdown != self.last_countdown {
            self.last_countdown = countdown;
            self.dirty = true;
        }
        if !self.dirty {
            return;
        }
        self.dirty = false;

        let (lines, prompt) = self.frame(countdown);
        self.peripherals.display.render(&lines, prompt.as_deref());
    }

    fn frame(&self, countdown: Option<u64>) -> (Vec<String>, Option<String>) {
        match self.phase {
            SessionPhase::Calibrating => (vec!["Calibrating...".to_string()], None),

            SessionPhase::SelectingDifficulty => (
                vec![
                    "Choose difficulty".to_string(),
                    Difficulty::ALL[self.menu.index()].label().to_string(),
                ],
                None,
            ),

            SessionPhase::Playing => {
                let Some(machine) = self.machine.as_ref() else {
                    return (Vec::new(), None);
                };
                let spec = machine.spec();
                let mut lines = vec![spec.id.to_string(), spec.title.clone()];
                if let Some(challenge) = machine.current_challenge() {
                    lines.push(challenge.prompt.clone());
                    if let Some(steps) = challenge.pattern.sequence_label() {
                        lines.push(steps);
                    }
                    if let Some(option) = challenge.pattern.selected_option(machine.progress()) {
                        lines.push(format!("< {option} >"));
                    }
                }
                if let Some(notice) = &self.notice {
                    lines.push(notice.clone());
                }
                (lines, countdown.map(|s| format!("You have {s} s left")))
            }

            SessionPhase::EnteringInitials => {
                let rank = self.pending_score.map_or(0, |p| p.rank);
                let entry_line = self
                    .entry
                    .as_ref()
                    .map(InitialsEntry::render_line)
                    .unwrap_or_default();
                (
                    vec![
                        "NEW HIGH SCORE!".to_string(),
                        format!("Rank #{rank}"),
                        "Enter Initials:".to_string(),
                        entry_line,
                    ],
                    None,
                )
            }

            SessionPhase::PlayAgain => {
                let mut lines = self.summary_lines();
                lines.push("Do you want to restart".to_string());
                lines.push(format!("< {} >", PLAY_AGAIN[self.play_again.index()]));
                (lines, None)
            }

            SessionPhase::Finished => (self.summary_lines(), None),
        }
    }

    fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec!["Game Complete!".to_string()];
        if let Some(seconds) = self.report.total_seconds {
            lines.push(format!("Time: {}", format_time(seconds)));
        }
        lines.push("HIGH SCORES".to_string());
        let scores = self
            .scores
            .as_ref()
            .map(|s| s.top_scores())
            .unwrap_or_default();
        if scores.is_empty() {
            lines.push("No scores yet!".to_string());
        }
        for (i, entry) in scores.iter().enumerate() {
            lines.push(format!(
                "#{} {} {}",
                i + 1,
                entry.initials,
                format_time(entry.seconds)
            ));
        }
        lines
    }
}
