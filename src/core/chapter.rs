//! Chapter state machine.
//!
//! A chapter is a declarative list of [`ChallengeSpec`]s. The machine walks the
//! list, applying the session's [`DifficultyProfile`] uniformly: timeouts are
//! scaled by the profile multiplier, failed attempts draw on a retry budget and
//! may surface a hint. Each chapter attempt ends in exactly one [`Outcome`];
//! after that the machine is inert until the controller loads the next chapter.
//!
//! ```text
//!             event / deadline
//!   AwaitingChallenge ───────▶ Evaluating ──┐
//!        ▲    │ cleared (more left)         │ satisfied / mismatch
//!        │    └─────────────────────────────┤
//!        └──── failed, retries left ◀───────┤
//!                                           ├──▶ ChapterAdvance
//!                                           ├──▶ ChapterRestart
//!                                           └──▶ SessionComplete
//! ```

use crate::core::difficulty::{Difficulty, DifficultyProfile, HintVerbosity};
use crate::core::pattern::{Pattern, Progress, Verdict};
use crate::sensing::types::TimedEvent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// One-based chapter number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChapterId(u8);

impl ChapterId {
    pub const FIRST: ChapterId = ChapterId(1);

    pub const fn new(n: u8) -> Self {
        ChapterId(n)
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    pub fn next(&self) -> ChapterId {
        ChapterId(self.0.saturating_add(1))
    }
}

impl fmt::Display for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chapter {}", self.0)
    }
}

/// Where a challenge's retry budget comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Budget {
    /// The difficulty profile's budget.
    #[default]
    Profile,
    /// A fixed number of attempts; 0 and 1 both restart on the first failure.
    Fixed(u8),
    /// Never restarts on failure.
    Unlimited,
}

/// Hint text at two levels of detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hint {
    pub full: String,
    pub brief: Option<String>,
}

impl Hint {
    pub fn new(full: impl Into<String>) -> Self {
        Self {
            full: full.into(),
            brief: None,
        }
    }

    pub fn with_brief(mut self, brief: impl Into<String>) -> Self {
        self.brief = Some(brief.into());
        self
    }

    /// Text to show at `verbosity`, if any. Brief falls back to the full text.
    pub fn for_verbosity(&self, verbosity: HintVerbosity) -> Option<&str> {
        match verbosity {
            HintVerbosity::Full => Some(&self.full),
            HintVerbosity::Brief => Some(self.brief.as_deref().unwrap_or(&self.full)),
            HintVerbosity::Silent => None,
        }
    }
}

/// One authored challenge step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeSpec {
    pub prompt: String,
    pub pattern: Pattern,
    /// Base timeout before the profile multiplier; `None` waits forever.
    #[serde(default, with = "crate::config::millis_opt")]
    pub timeout: Option<Duration>,
    /// The timeout ignores the difficulty multiplier.
    #[serde(default)]
    pub fixed_timeout: bool,
    #[serde(default)]
    pub budget: Budget,
    #[serde(default)]
    pub hint: Option<Hint>,
    /// Show the hint while waiting after this long (doubled on brief verbosity).
    #[serde(default, with = "crate::config::millis_opt")]
    pub hint_after: Option<Duration>,
    /// Chapter to restart when the budget runs out; defaults to the current one.
    #[serde(default)]
    pub restart_to: Option<ChapterId>,
}

impl ChallengeSpec {
    pub fn new(prompt: impl Into<String>, pattern: Pattern) -> Self {
        Self {
            prompt: prompt.into(),
            pattern,
            timeout: None,
            fixed_timeout: false,
            budget: Budget::Profile,
            hint: None,
            hint_after: None,
            restart_to: None,
        }
    }

    pub fn timeout_secs(mut self, secs: f32) -> Self {
        self.timeout = Some(Duration::from_secs_f32(secs));
        self
    }

    /// A timeout every difficulty shares.
    pub fn fixed_timeout_secs(mut self, secs: f32) -> Self {
        self.timeout = Some(Duration::from_secs_f32(secs));
        self.fixed_timeout = true;
        self
    }

    /// Timeout after `multiplier`. Saturates instead of overflowing.
    pub fn scaled_timeout(&self, multiplier: f32) -> Option<Duration> {
        let base = self.timeout?;
        if self.fixed_timeout {
            return Some(base);
        }
        let secs = base.as_secs_f64() * f64::from(multiplier.max(0.0));
        Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
    }

    pub fn budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn hint(mut self, hint: Hint) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn hint_after_secs(mut self, secs: u64) -> Self {
        self.hint_after = Some(Duration::from_secs(secs));
        self
    }

    pub fn restart_to(mut self, chapter: ChapterId) -> Self {
        self.restart_to = Some(chapter);
        self
    }
}

/// One chapter's challenge table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterSpec {
    pub id: ChapterId,
    pub title: String,
    pub challenges: Vec<ChallengeSpec>,
    /// Clearing this chapter completes the session.
    pub is_final: bool,
}

/// Mutable state of the active chapter attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterState {
    pub chapter: ChapterId,
    pub challenge_index: usize,
    /// `None` when the active challenge has an unlimited budget.
    pub retries_remaining: Option<u8>,
    pub elapsed: Duration,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingChallenge { index: usize },
    /// A partial match is in flight.
    Evaluating { index: usize },
    ChapterAdvance,
    ChapterRestart,
    SessionComplete,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Phase::ChapterAdvance | Phase::ChapterRestart | Phase::SessionComplete
        )
    }
}

/// Terminal result of a chapter attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Advance(ChapterId),
    Restart(ChapterId),
    SessionComplete(Duration),
}

/// What a single `handle`/`tick` call changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Idle,
    /// Partial match advanced, or a cursor moved.
    Progressed,
    /// The challenge at `cleared` is done; the next one is now active.
    ChallengeCleared { cleared: usize },
    /// A failed attempt with budget left. The same challenge starts over.
    AttemptFailed {
        retries_remaining: Option<u8>,
        hint: Option<String>,
    },
    /// The waiting hint is due.
    HintDue(String),
    Resolved(Outcome),
}

/// Runs one chapter at a time.
pub struct ChapterMachine {
    spec: ChapterSpec,
    profile: DifficultyProfile,
    repeat_gate: Duration,
    session_started: Duration,
    chapter_started: Duration,
    attempt_started: Duration,
    state: ChapterState,
    phase: Phase,
    progress: Progress,
    hint_shown: bool,
    outcome: Option<Outcome>,
}

impl ChapterMachine {
    /// Start `spec` at `now`. `session_started` is when the session timer began.
    pub fn start(
        spec: ChapterSpec,
        difficulty: Difficulty,
        profile: DifficultyProfile,
        repeat_gate: Duration,
        session_started: Duration,
        now: Duration,
    ) -> Self {
        let state = ChapterState {
            chapter: spec.id,
            challenge_index: 0,
            retries_remaining: None,
            elapsed: Duration::ZERO,
            difficulty,
        };
        let mut machine = Self {
            spec,
            profile,
            repeat_gate,
            session_started,
            chapter_started: now,
            attempt_started: now,
            state,
            phase: Phase::AwaitingChallenge { index: 0 },
            progress: Progress::default(),
            hint_shown: false,
            outcome: None,
        };
        machine.enter_challenge(0, now);
        info!("{} started: {}", machine.spec.id, machine.spec.title);
        machine
    }

    /// Replace the active chapter, discarding all in-flight state.
    pub fn load(&mut self, spec: ChapterSpec, now: Duration) {
        let difficulty = self.state.difficulty;
        *self = Self::start(
            spec,
            difficulty,
            self.profile,
            self.repeat_gate,
            self.session_started,
            now,
        );
    }

    pub fn spec(&self) -> &ChapterSpec {
        &self.spec
    }

    pub fn state(&self) -> &ChapterState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn current_challenge(&self) -> Option<&ChallengeSpec> {
        if self.phase.is_terminal() {
            return None;
        }
        self.spec.challenges.get(self.state.challenge_index)
    }

    /// The active challenge's timeout after the difficulty multiplier.
    pub fn effective_timeout(&self) -> Option<Duration> {
        self.current_challenge()?
            .scaled_timeout(self.profile.timeout_multiplier)
    }

    /// Time left in the current attempt, for timed challenges.
    pub fn remaining(&self, now: Duration) -> Option<Duration> {
        let limit = self.effective_timeout()?;
        Some(limit.saturating_sub(now.saturating_sub(self.attempt_started)))
    }

    /// Feed one event from the bus.
    pub fn handle(&mut self, timed: &TimedEvent) -> Step {
        if self.phase.is_terminal() {
            return Step::Idle;
        }
        let Some(challenge) = self.spec.challenges.get(self.state.challenge_index) else {
            return Step::Idle;
        };

        let index = self.state.challenge_index;
        let before = self.progress.clone();
        self.phase = Phase::Evaluating { index };
        let verdict = challenge
            .pattern
            .evaluate(&mut self.progress, timed, self.repeat_gate);

        match verdict {
            Verdict::Continue => {
                self.settle_phase();
                if self.progress != before {
                    Step::Progressed
                } else {
                    Step::Idle
                }
            }
            other => self.apply(other, timed.at),
        }
    }

    /// Per-tick deadline checks: timed hint, stalled sequence, attempt timeout.
    /// Call after the tick's events have been handled.
    pub fn tick(&mut self, now: Duration) -> Step {
        if self.phase.is_terminal() {
            return Step::Idle;
        }
        self.state.elapsed = now.saturating_sub(self.chapter_started);

        let Some(challenge) = self.spec.challenges.get(self.state.challenge_index) else {
            return Step::Idle;
        };

        let verdict = challenge.pattern.check_deadline(&mut self.progress, now);
        if verdict != Verdict::Continue {
            return self.apply(verdict, now);
        }

        if let Some(limit) = self.effective_timeout() {
            if now.saturating_sub(self.attempt_started) >= limit {
                let verdict = challenge.pattern.on_timeout();
                debug!("{} challenge {} timed out", self.spec.id, self.state.challenge_index);
                return self.apply(verdict, now);
            }
        }

        if let Some(text) = self.due_hint(now) {
            self.hint_shown = true;
            return Step::HintDue(text);
        }

        self.settle_phase();
        Step::Idle
    }

    fn due_hint(&self, now: Duration) -> Option<String> {
        if self.hint_shown {
            return None;
        }
        let challenge = self.current_challenge()?;
        let delay = challenge.hint_after?;
        let delay = match self.profile.hint_verbosity {
            HintVerbosity::Full => delay,
            HintVerbosity::Brief => delay * 2,
            HintVerbosity::Silent => return None,
        };
        if now.saturating_sub(self.attempt_started) < delay {
            return None;
        }
        challenge
            .hint
            .as_ref()?
            .for_verbosity(self.profile.hint_verbosity)
            .map(str::to_string)
    }

    fn apply(&mut self, verdict: Verdict, now: Duration) -> Step {
        match verdict {
            Verdict::Continue => {
                self.settle_phase();
                Step::Idle
            }
            Verdict::Satisfied => self.clear_challenge(now),
            Verdict::Mismatch => self.fail_attempt(now),
            Verdict::Forfeit(chapter) => {
                info!("{} forfeited to {}", self.spec.id, chapter);
                self.resolve(Outcome::Restart(chapter))
            }
        }
    }

    fn clear_challenge(&mut self, now: Duration) -> Step {
        let cleared = self.state.challenge_index;
        let next = cleared + 1;

        if next < self.spec.challenges.len() {
            self.enter_challenge(next, now);
            return Step::ChallengeCleared { cleared };
        }

        if self.spec.is_final {
            let total = now.saturating_sub(self.session_started);
            self.resolve(Outcome::SessionComplete(total))
        } else {
            self.resolve(Outcome::Advance(self.spec.id.next()))
        }
    }

    fn fail_attempt(&mut self, now: Duration) -> Step {
        let index = self.state.challenge_index;
        let Some(challenge) = self.spec.challenges.get(index) else {
            return Step::Idle;
        };
        let restart_target = challenge.restart_to.unwrap_or(self.spec.id);
        let hint = challenge
            .hint
            .as_ref()
            .and_then(|h| h.for_verbosity(self.profile.hint_verbosity))
            .map(str::to_string);

        let retries_remaining = match self.state.retries_remaining {
            None => None,
            Some(left) => {
                let left = left.saturating_sub(1);
                if left == 0 {
                    info!(
                        "{} challenge {} out of retries, restarting {}",
                        self.spec.id, index, restart_target
                    );
                    return self.resolve(Outcome::Restart(restart_target));
                }
                Some(left)
            }
        };

        debug!(
            "{} challenge {} failed, retries left {:?}",
            self.spec.id, index, retries_remaining
        );
        self.state.retries_remaining = retries_remaining;
        self.restart_attempt(now);
        Step::AttemptFailed {
            retries_remaining,
            hint,
        }
    }

    fn enter_challenge(&mut self, index: usize, now: Duration) {
        self.state.challenge_index = index;
        self.state.retries_remaining = self.spec.challenges.get(index).and_then(|c| {
            match c.budget {
                Budget::Profile => Some(self.profile.retry_budget),
                Budget::Fixed(n) => Some(n),
                Budget::Unlimited => None,
            }
        });
        self.restart_attempt(now);
    }

    fn restart_attempt(&mut self, now: Duration) {
        self.progress = Progress::default();
        self.attempt_started = now;
        self.hint_shown = false;
        self.phase = Phase::AwaitingChallenge {
            index: self.state.challenge_index,
        };
    }

    fn settle_phase(&mut self) {
        let index = self.state.challenge_index;
        self.phase = if self.progress.is_partial() {
            Phase::Evaluating { index }
        } else {
            Phase::AwaitingChallenge { index }
        };
    }

    fn resolve(&mut self, outcome: Outcome) -> Step {
        self.progress = Progress::default();
        self.phase = match outcome {
            Outcome::Advance(_) => Phase::ChapterAdvance,
            Outcome::Restart(_) => Phase::ChapterRestart,
            Outcome::SessionComplete(_) => Phase::SessionComplete,
        };
        self.outcome = Some(outcome);
        Step::Resolved(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::difficulty::DifficultyTable;
    use crate::core::pattern::EventPredicate;
    use crate::sensing::types::{ButtonId, Event, InputEvent};

    const GATE: Duration = Duration::from_millis(150);

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn press(at: Duration, button: ButtonId) -> TimedEvent {
        TimedEvent {
            at,
            seq: 0,
            event: Event::Input(InputEvent::ButtonPressed(button)),
        }
    }

    fn one_challenge(challenge: ChallengeSpec, is_final: bool) -> ChapterSpec {
        ChapterSpec {
            id: ChapterId::new(3),
            title: "Test".to_string(),
            challenges: vec![challenge],
            is_final,
        }
    }

    fn machine(spec: ChapterSpec, difficulty: Difficulty) -> ChapterMachine {
        let profile = DifficultyTable::default().profile(difficulty);
        ChapterMachine::start(spec, difficulty, profile, GATE, Duration::ZERO, Duration::ZERO)
    }

    fn press_left() -> ChallengeSpec {
        ChallengeSpec::new("Press left", Pattern::Single(EventPredicate::Press(ButtonId::Left)))
    }

    #[test]
    fn test_budget_exhaustion_restarts() {
        for budget in 1..=4u8 {
            let spec = one_challenge(
                press_left().timeout_secs(1.0).budget(Budget::Fixed(budget)),
                false,
            );
            let mut m = machine(spec, Difficulty::Medium);
            for failure in 1..budget {
                let step = m.tick(secs(failure as u64));
                assert!(
                    matches!(step, Step::AttemptFailed { .. }),
                    "failure {failure} of {budget} should not restart"
                );
            }
            assert_eq!(
                m.tick(secs(budget as u64)),
                Step::Resolved(Outcome::Restart(ChapterId::new(3)))
            );
        }
    }

    #[test]
    fn test_zero_budget_restarts_immediately() {
        let spec = one_challenge(press_left().budget(Budget::Fixed(0)), false);
        let mut m = machine(spec, Difficulty::Easy);
        assert_eq!(
            m.handle(&press(secs(1), ButtonId::Right)),
            Step::Idle,
            "single-event patterns ignore other events"
        );

        let choice = ChallengeSpec::new(
            "Pick",
            Pattern::Choice {
                options: vec!["A".into(), "B".into()],
                correct: 1,
                forfeit: None,
            },
        )
        .budget(Budget::Fixed(0));
        let mut m = machine(one_challenge(choice, false), Difficulty::Easy);
        assert_eq!(
            m.handle(&press(secs(1), ButtonId::Encoder)),
            Step::Resolved(Outcome::Restart(ChapterId::new(3)))
        );
    }

    #[test]
    fn test_timeout_scaled_by_difficulty() {
        let spec = one_challenge(press_left().timeout_secs(4.0), false);
        let easy = machine(spec.clone(), Difficulty::Easy);
        let hard = machine(spec, Difficulty::Hard);
        assert_eq!(easy.effective_timeout(), Some(secs(6)));
        assert_eq!(hard.effective_timeout(), Some(secs(2)));
        assert_eq!(hard.remaining(Duration::from_millis(500)), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_fixed_timeout_ignores_difficulty() {
        let spec = one_challenge(press_left().fixed_timeout_secs(10.0), true);
        for difficulty in Difficulty::ALL {
            assert_eq!(machine(spec.clone(), difficulty).effective_timeout(), Some(secs(10)));
        }
    }

    #[test]
    fn test_huge_multiplier_saturates() {
        let challenge = press_left().timeout_secs(10.0);
        assert_eq!(challenge.scaled_timeout(f32::MAX), Some(Duration::MAX));
        assert_eq!(challenge.scaled_timeout(f32::NAN), Some(Duration::ZERO));
        assert_eq!(challenge.scaled_timeout(-2.0), Some(Duration::ZERO));
        assert_eq!(press_left().scaled_timeout(1.0), None);

        let profile = DifficultyProfile {
            timeout_multiplier: 1e30,
            retry_budget: 1,
            hint_verbosity: HintVerbosity::Full,
        };
        let mut m = ChapterMachine::start(
            one_challenge(challenge, false),
            Difficulty::Easy,
            profile,
            GATE,
            Duration::ZERO,
            Duration::ZERO,
        );
        assert_eq!(m.remaining(secs(5)), Some(Duration::MAX - secs(5)));
        assert_eq!(m.tick(secs(3600)), Step::Idle);
    }

    #[test]
    fn test_exactly_one_outcome() {
        let spec = one_challenge(press_left(), false);
        let mut m = machine(spec, Difficulty::Medium);
        assert_eq!(
            m.handle(&press(secs(1), ButtonId::Left)),
            Step::Resolved(Outcome::Advance(ChapterId::new(4)))
        );
        assert_eq!(m.phase(), Phase::ChapterAdvance);
        assert_eq!(m.handle(&press(secs(2), ButtonId::Left)), Step::Idle);
        assert_eq!(m.tick(secs(100)), Step::Idle);
        assert_eq!(m.outcome(), Some(Outcome::Advance(ChapterId::new(4))));
    }

    #[test]
    fn test_final_chapter_completes_session() {
        let spec = one_challenge(press_left(), true);
        let profile = DifficultyTable::default().profile(Difficulty::Easy);
        let mut m = ChapterMachine::start(spec, Difficulty::Easy, profile, GATE, secs(10), secs(100));
        assert_eq!(
            m.handle(&press(secs(135), ButtonId::Left)),
            Step::Resolved(Outcome::SessionComplete(secs(125)))
        );
    }

    #[test]
    fn test_challenge_index_advances_and_resets_retries() {
        let spec = ChapterSpec {
            id: ChapterId::new(1),
            title: "Two".to_string(),
            challenges: vec![
                press_left().timeout_secs(5.0),
                ChallengeSpec::new("Right", Pattern::Single(EventPredicate::Press(ButtonId::Right)))
                    .timeout_secs(5.0),
            ],
            is_final: false,
        };
        let mut m = machine(spec, Difficulty::Easy);
        assert!(matches!(m.tick(Duration::from_millis(7500)), Step::AttemptFailed { .. }));
        assert_eq!(m.state().retries_remaining, Some(1));

        assert_eq!(
            m.handle(&press(secs(8), ButtonId::Left)),
            Step::ChallengeCleared { cleared: 0 }
        );
        assert_eq!(m.state().challenge_index, 1);
        assert_eq!(m.state().retries_remaining, Some(2));
        assert_eq!(m.phase(), Phase::AwaitingChallenge { index: 1 });
    }

    #[test]
    fn test_restart_target_and_forfeit() {
        let spec = one_challenge(
            press_left()
                .timeout_secs(1.0)
                .budget(Budget::Fixed(1))
                .restart_to(ChapterId::new(2)),
            false,
        );
        let mut m = machine(spec, Difficulty::Medium);
        assert_eq!(m.tick(secs(1)), Step::Resolved(Outcome::Restart(ChapterId::new(2))));

        let choice = ChallengeSpec::new(
            "Floor",
            Pattern::Choice {
                options: vec!["Open".into(), "Basement".into(), "2nd".into()],
                correct: 2,
                forfeit: Some((1, ChapterId::new(1))),
            },
        )
        .budget(Budget::Unlimited);
        let mut m = machine(one_challenge(choice, false), Difficulty::Easy);
        assert_eq!(m.handle(&press(secs(1), ButtonId::Right)), Step::Progressed);
        assert_eq!(
            m.handle(&press(secs(2), ButtonId::Encoder)),
            Step::Resolved(Outcome::Restart(ChapterId::new(1)))
        );
    }

    #[test]
    fn test_unlimited_budget_never_restarts() {
        let spec = one_challenge(press_left().timeout_secs(1.0).budget(Budget::Unlimited), false);
        let mut m = machine(spec, Difficulty::Hard);
        for i in 1..=20u64 {
            let step = m.tick(Duration::from_millis(500 * i));
            assert!(!matches!(step, Step::Resolved(_)));
        }
        assert_eq!(m.state().retries_remaining, None);
    }

    #[test]
    fn test_failed_attempt_hint_by_verbosity() {
        let challenge = press_left()
            .timeout_secs(2.0)
            .hint(Hint::new("The light will lead your way").with_brief("Think of it"));

        let mut easy = machine(one_challenge(challenge.clone(), false), Difficulty::Easy);
        assert_eq!(
            easy.tick(secs(3)),
            Step::AttemptFailed {
                retries_remaining: Some(1),
                hint: Some("The light will lead your way".to_string())
            }
        );

        let mut hard = machine(
            one_challenge(challenge.budget(Budget::Fixed(2)), false),
            Difficulty::Hard,
        );
        assert_eq!(
            hard.tick(secs(1)),
            Step::AttemptFailed {
                retries_remaining: Some(1),
                hint: None
            }
        );
    }

    #[test]
    fn test_timed_hint_delay() {
        let challenge = press_left().hint(Hint::new("Knock back")).hint_after_secs(5);

        let mut easy = machine(one_challenge(challenge.clone(), false), Difficulty::Easy);
        assert_eq!(easy.tick(secs(4)), Step::Idle);
        assert_eq!(easy.tick(secs(5)), Step::HintDue("Knock back".to_string()));
        assert_eq!(easy.tick(secs(6)), Step::Idle);

        let mut medium = machine(one_challenge(challenge.clone(), false), Difficulty::Medium);
        assert_eq!(medium.tick(secs(9)), Step::Idle);
        assert_eq!(medium.tick(secs(10)), Step::HintDue("Knock back".to_string()));

        let mut hard = machine(one_challenge(challenge, false), Difficulty::Hard);
        assert_eq!(hard.tick(secs(60)), Step::Idle);
    }

    #[test]
    fn test_partial_sequence_is_evaluating() {
        let challenge = ChallengeSpec::new(
            "L R",
            Pattern::Sequence {
                steps: vec![
                    EventPredicate::Press(ButtonId::Left),
                    EventPredicate::Press(ButtonId::Right),
                ],
                step_window: None,
            },
        );
        let mut m = machine(one_challenge(challenge, false), Difficulty::Medium);
        assert_eq!(m.handle(&press(secs(1), ButtonId::Left)), Step::Progressed);
        assert_eq!(m.phase(), Phase::Evaluating { index: 0 });

        let step = m.handle(&press(secs(2), ButtonId::Left));
        assert_eq!(
            step,
            Step::Resolved(Outcome::Restart(ChapterId::new(3))),
            "medium budget of one restarts on the first mismatch"
        );
    }

    #[test]
    fn test_abstain_clears_on_timeout() {
        let challenge = ChallengeSpec::new(
            "Did you?",
            Pattern::Abstain {
                options: vec!["Yes".into(), "No".into()],
            },
        )
        .timeout_secs(10.0)
        .budget(Budget::Unlimited);
        let mut m = machine(one_challenge(challenge, true), Difficulty::Medium);

        assert!(matches!(
            m.handle(&press(secs(3), ButtonId::Encoder)),
            Step::AttemptFailed { .. }
        ));
        assert_eq!(m.tick(secs(12)), Step::Idle);
        assert_eq!(m.tick(secs(13)), Step::Resolved(Outcome::SessionComplete(secs(13))));
    }
}
