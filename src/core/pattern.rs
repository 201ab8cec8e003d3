//! Challenge patterns and their matchers.
//!
//! A [`Pattern`] is the declarative "what the player must do" half of a
//! challenge. Matching state for the current attempt lives in [`Progress`],
//! which the chapter machine throws away whenever an attempt ends.

use crate::core::chapter::ChapterId;
use crate::core::menu::{is_commit, wrap};
use crate::sensing::types::{Axis, ButtonId, Event, GestureEvent, InputEvent, Sign, TimedEvent};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Matches one kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPredicate {
    Press(ButtonId),
    /// Left or right, whichever comes.
    PressEither,
    Tilt(Axis, Sign),
    Tap,
    Movement,
}

/// Coarse event classes. A sequence step only reacts to events of its own family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Press,
    Tilt,
    Tap,
    Movement,
}

fn family_of(event: &Event) -> Option<Family> {
    match event {
        Event::Input(InputEvent::ButtonPressed(_)) => Some(Family::Press),
        Event::Gesture(GestureEvent::TiltDetected { .. }) => Some(Family::Tilt),
        Event::Gesture(GestureEvent::TapDetected) => Some(Family::Tap),
        Event::Gesture(GestureEvent::SustainedMovementDetected) => Some(Family::Movement),
        _ => None,
    }
}

impl EventPredicate {
    pub fn matches(&self, event: &Event) -> bool {
        match (self, event) {
            (EventPredicate::Press(want), Event::Input(InputEvent::ButtonPressed(got))) => {
                want == got
            }
            (
                EventPredicate::PressEither,
                Event::Input(InputEvent::ButtonPressed(ButtonId::Left | ButtonId::Right)),
            ) => true,
            (
                EventPredicate::Tilt(axis, sign),
                Event::Gesture(GestureEvent::TiltDetected { axis: a, sign: s }),
            ) => axis == a && sign == s,
            (EventPredicate::Tap, Event::Gesture(GestureEvent::TapDetected)) => true,
            (EventPredicate::Movement, Event::Gesture(GestureEvent::SustainedMovementDetected)) => {
                true
            }
            _ => false,
        }
    }

    fn family(&self) -> Family {
        match self {
            EventPredicate::Press(_) | EventPredicate::PressEither => Family::Press,
            EventPredicate::Tilt(..) => Family::Tilt,
            EventPredicate::Tap => Family::Tap,
            EventPredicate::Movement => Family::Movement,
        }
    }

    /// Short label for prompts, e.g. `L`, `R`, `+X`.
    pub fn label(&self) -> String {
        match self {
            EventPredicate::Press(ButtonId::Left) => "L".to_string(),
            EventPredicate::Press(ButtonId::Right) => "R".to_string(),
            EventPredicate::Press(ButtonId::Encoder) => "OK".to_string(),
            EventPredicate::PressEither => "L/R".to_string(),
            EventPredicate::Tilt(axis, sign) => {
                let s = if *sign == Sign::Positive { '+' } else { '-' };
                format!("{s}{axis:?}")
            }
            EventPredicate::Tap => "tap".to_string(),
            EventPredicate::Movement => "move".to_string(),
        }
    }
}

/// What the player must do to clear a challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    /// One matching event.
    Single(EventPredicate),
    /// Ordered steps. A wrong event of the same family resets the match and
    /// fails the attempt. Steps closer together than the repeat gate are
    /// ignored; with a `step_window`, a gap longer than it fails the attempt.
    Sequence {
        steps: Vec<EventPredicate>,
        #[serde(default, with = "crate::config::millis_opt")]
        step_window: Option<Duration>,
    },
    /// Every predicate at least once, in any order.
    AllOf(Vec<EventPredicate>),
    /// Both hold buttons down together for `duration`.
    Hold {
        #[serde(with = "crate::config::millis")]
        duration: Duration,
        /// Letting go early fails the attempt instead of just resetting it.
        release_fails: bool,
    },
    /// The same matching event `count` times, first to last within `within`.
    Repeat {
        predicate: EventPredicate,
        count: u8,
        #[serde(with = "crate::config::millis")]
        within: Duration,
    },
    /// A cursor over `options`; the encoder button commits.
    Choice {
        options: Vec<String>,
        correct: usize,
        /// Committing this option abandons the chapter for another one,
        /// whatever the retry budget says.
        forfeit: Option<(usize, ChapterId)>,
    },
    /// A cursor over `options` where the only right answer is to commit
    /// nothing and let the timer run out.
    Abstain { options: Vec<String> },
}

/// Result of feeding an event (or a deadline) to a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Satisfied,
    Mismatch,
    Forfeit(ChapterId),
}

/// Per-attempt matching state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progress {
    matched: usize,
    started_at: Option<Duration>,
    last_at: Option<Duration>,
    first: Option<Event>,
    seen: Vec<bool>,
    holding: bool,
    cursor: usize,
}

impl Progress {
    /// Steps matched so far (sequence steps, repeats, or set members).
    pub fn matched(&self) -> usize {
        self.matched
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether a partial match is in flight.
    pub fn is_partial(&self) -> bool {
        self.matched > 0 || self.holding
    }

    fn reset_match(&mut self) {
        self.matched = 0;
        self.started_at = None;
        self.last_at = None;
        self.first = None;
        self.holding = false;
    }
}

impl Pattern {
    /// Feed one event. `repeat_gate` is the minimum spacing between counted
    /// sequence steps.
    pub fn evaluate(
        &self,
        progress: &mut Progress,
        timed: &TimedEvent,
        repeat_gate: Duration,
    ) -> Verdict {
        let event = &timed.event;
        let at = timed.at;

        match self {
            Pattern::Single(predicate) => {
                if predicate.matches(event) {
                    Verdict::Satisfied
                } else {
                    Verdict::Continue
                }
            }

            Pattern::Sequence { steps, step_window } => {
                let Some(family) = family_of(event) else {
                    return Verdict::Continue;
                };
                if !steps.iter().any(|s| s.family() == family) {
                    return Verdict::Continue;
                }

                if let Some(last) = progress.last_at {
                    let gap = at.saturating_sub(last);
                    if gap < repeat_gate {
                        return Verdict::Continue;
                    }
                    if step_window.is_some_and(|window| gap > window) {
                        progress.reset_match();
                        return Verdict::Mismatch;
                    }
                }

                match steps.get(progress.matched) {
                    Some(step) if step.matches(event) => {
                        progress.matched += 1;
                        progress.last_at = Some(at);
                        if progress.matched == steps.len() {
                            Verdict::Satisfied
                        } else {
                            Verdict::Continue
                        }
                    }
                    _ => {
                        progress.reset_match();
                        Verdict::Mismatch
                    }
                }
            }

            Pattern::AllOf(predicates) => {
                if progress.seen.len() != predicates.len() {
                    progress.seen = vec![false; predicates.len()];
                }
                for (i, predicate) in predicates.iter().enumerate() {
                    if !progress.seen[i] && predicate.matches(event) {
                        progress.seen[i] = true;
                        progress.matched += 1;
                    }
                }
                if progress.seen.iter().all(|&s| s) {
                    Verdict::Satisfied
                } else {
                    Verdict::Continue
                }
            }

            Pattern::Hold {
                duration,
                release_fails,
            } => match event {
                Event::Input(InputEvent::BothHeld(elapsed)) => {
                    progress.holding = true;
                    if elapsed >= duration {
                        Verdict::Satisfied
                    } else {
                        Verdict::Continue
                    }
                }
                Event::Input(InputEvent::ButtonReleased(ButtonId::Left | ButtonId::Right))
                    if progress.holding =>
                {
                    progress.holding = false;
                    if *release_fails {
                        Verdict::Mismatch
                    } else {
                        Verdict::Continue
                    }
                }
                _ => Verdict::Continue,
            },

            Pattern::Repeat {
                predicate,
                count,
                within,
            } => {
                if !predicate.matches(event) {
                    return Verdict::Continue;
                }

                let continues = match (progress.first, progress.started_at) {
                    (Some(first), Some(started)) => {
                        first == *event && at.saturating_sub(started) <= *within
                    }
                    _ => false,
                };
                if continues {
                    progress.matched += 1;
                } else {
                    progress.first = Some(*event);
                    progress.started_at = Some(at);
                    progress.matched = 1;
                }
                progress.last_at = Some(at);

                if progress.matched >= usize::from(*count) {
                    Verdict::Satisfied
                } else {
                    Verdict::Continue
                }
            }

            Pattern::Choice {
                options,
                correct,
                forfeit,
            } => {
                if is_commit(event) {
                    if progress.cursor == *correct {
                        return Verdict::Satisfied;
                    }
                    return match forfeit {
                        Some((index, chapter)) if *index == progress.cursor => {
                            Verdict::Forfeit(*chapter)
                        }
                        _ => Verdict::Mismatch,
                    };
                }
                navigate(progress, event, options.len());
                Verdict::Continue
            }

            Pattern::Abstain { options } => {
                if is_commit(event) {
                    return Verdict::Mismatch;
                }
                navigate(progress, event, options.len());
                Verdict::Continue
            }
        }
    }

    /// Verdict when the attempt's timer runs out.
    pub fn on_timeout(&self) -> Verdict {
        match self {
            Pattern::Abstain { .. } => Verdict::Satisfied,
            _ => Verdict::Mismatch,
        }
    }

    /// Deadline checks that do not need an event, such as a stalled sequence.
    pub fn check_deadline(&self, progress: &mut Progress, now: Duration) -> Verdict {
        if let Pattern::Sequence {
            step_window: Some(window),
            ..
        } = self
        {
            if let Some(last) = progress.last_at {
                if now.saturating_sub(last) > *window {
                    progress.reset_match();
                    return Verdict::Mismatch;
                }
            }
        }
        Verdict::Continue
    }

    /// Option text under the cursor, for cursor patterns.
    pub fn selected_option<'a>(&'a self, progress: &Progress) -> Option<&'a str> {
        match self {
            Pattern::Choice { options, .. } | Pattern::Abstain { options } => {
                options.get(progress.cursor).map(String::as_str)
            }
            _ => None,
        }
    }

    /// Sequence steps rendered for display, e.g. `L R L`.
    pub fn sequence_label(&self) -> Option<String> {
        match self {
            Pattern::Sequence { steps, .. } => Some(
                steps
                    .iter()
                    .map(EventPredicate::label)
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            _ => None,
        }
    }
}

fn navigate(progress: &mut Progress, event: &Event, len: usize) {
    let delta = match event {
        Event::Input(InputEvent::ButtonPressed(ButtonId::Left)) => -1,
        Event::Input(InputEvent::ButtonPressed(ButtonId::Right)) => 1,
        Event::Input(InputEvent::EncoderRotated(d)) => *d,
        _ => return,
    };
    progress.cursor = wrap(progress.cursor, delta, len);
}

#[cfg(test)]
mod tests {
    use super::*;

    const GATE: Duration = Duration::from_millis(150);

    fn at(ms: u64, event: impl Into<Event>) -> TimedEvent {
        TimedEvent {
            at: Duration::from_millis(ms),
            seq: ms,
            event: event.into(),
        }
    }

    fn press(button: ButtonId) -> InputEvent {
        InputEvent::ButtonPressed(button)
    }

    fn lrl() -> Pattern {
        Pattern::Sequence {
            steps: vec![
                EventPredicate::Press(ButtonId::Left),
                EventPredicate::Press(ButtonId::Right),
                EventPredicate::Press(ButtonId::Left),
            ],
            step_window: None,
        }
    }

    #[test]
    fn test_sequence_completes() {
        let pattern = lrl();
        let mut progress = Progress::default();
        assert_eq!(
            pattern.evaluate(&mut progress, &at(0, press(ButtonId::Left)), GATE),
            Verdict::Continue
        );
        assert_eq!(
            pattern.evaluate(&mut progress, &at(300, press(ButtonId::Right)), GATE),
            Verdict::Continue
        );
        assert_eq!(progress.matched(), 2);
        assert_eq!(
            pattern.evaluate(&mut progress, &at(600, press(ButtonId::Left)), GATE),
            Verdict::Satisfied
        );
    }

    #[test]
    fn test_sequence_wrong_step_resets() {
        let pattern = lrl();
        let mut progress = Progress::default();
        pattern.evaluate(&mut progress, &at(0, press(ButtonId::Left)), GATE);
        assert_eq!(progress.matched(), 1);

        let verdict = pattern.evaluate(&mut progress, &at(300, press(ButtonId::Left)), GATE);
        assert_eq!(verdict, Verdict::Mismatch);
        assert_eq!(progress.matched(), 0);
    }

    #[test]
    fn test_sequence_gate_ignores_chatter() {
        let pattern = lrl();
        let mut progress = Progress::default();
        pattern.evaluate(&mut progress, &at(0, press(ButtonId::Left)), GATE);
        assert_eq!(
            pattern.evaluate(&mut progress, &at(50, press(ButtonId::Left)), GATE),
            Verdict::Continue
        );
        assert_eq!(progress.matched(), 1);
    }

    #[test]
    fn test_sequence_ignores_other_families() {
        let pattern = lrl();
        let mut progress = Progress::default();
        pattern.evaluate(&mut progress, &at(0, press(ButtonId::Left)), GATE);
        assert_eq!(
            pattern.evaluate(&mut progress, &at(300, GestureEvent::TapDetected), GATE),
            Verdict::Continue
        );
        assert_eq!(progress.matched(), 1);
    }

    #[test]
    fn test_sequence_step_window() {
        let pattern = Pattern::Sequence {
            steps: vec![
                EventPredicate::Press(ButtonId::Left),
                EventPredicate::Press(ButtonId::Right),
            ],
            step_window: Some(Duration::from_secs(1)),
        };
        let mut progress = Progress::default();
        pattern.evaluate(&mut progress, &at(0, press(ButtonId::Left)), GATE);
        assert_eq!(
            pattern.check_deadline(&mut progress, Duration::from_millis(900)),
            Verdict::Continue
        );
        assert_eq!(
            pattern.check_deadline(&mut progress, Duration::from_millis(1100)),
            Verdict::Mismatch
        );
        assert_eq!(progress.matched(), 0);
    }

    #[test]
    fn test_all_of_any_order() {
        let pattern = Pattern::AllOf(vec![
            EventPredicate::Tilt(Axis::X, Sign::Positive),
            EventPredicate::Tilt(Axis::X, Sign::Negative),
        ]);
        let mut progress = Progress::default();
        let neg = GestureEvent::TiltDetected {
            axis: Axis::X,
            sign: Sign::Negative,
        };
        let pos = GestureEvent::TiltDetected {
            axis: Axis::X,
            sign: Sign::Positive,
        };
        assert_eq!(pattern.evaluate(&mut progress, &at(0, neg), GATE), Verdict::Continue);
        assert_eq!(pattern.evaluate(&mut progress, &at(10, neg), GATE), Verdict::Continue);
        assert_eq!(pattern.evaluate(&mut progress, &at(20, pos), GATE), Verdict::Satisfied);
    }

    #[test]
    fn test_hold_release_fails() {
        let pattern = Pattern::Hold {
            duration: Duration::from_secs(2),
            release_fails: true,
        };
        let mut progress = Progress::default();
        let held = |ms| at(ms, InputEvent::BothHeld(Duration::from_millis(ms)));
        assert_eq!(pattern.evaluate(&mut progress, &held(0), GATE), Verdict::Continue);
        assert_eq!(pattern.evaluate(&mut progress, &held(1000), GATE), Verdict::Continue);
        let release = at(1100, InputEvent::ButtonReleased(ButtonId::Left));
        assert_eq!(pattern.evaluate(&mut progress, &release, GATE), Verdict::Mismatch);
    }

    #[test]
    fn test_hold_satisfied() {
        let pattern = Pattern::Hold {
            duration: Duration::from_secs(2),
            release_fails: false,
        };
        let mut progress = Progress::default();
        let release = at(5, InputEvent::ButtonReleased(ButtonId::Right));
        assert_eq!(pattern.evaluate(&mut progress, &release, GATE), Verdict::Continue);
        let held = at(2000, InputEvent::BothHeld(Duration::from_secs(2)));
        assert_eq!(pattern.evaluate(&mut progress, &held, GATE), Verdict::Satisfied);
    }

    #[test]
    fn test_double_click_same_button() {
        let pattern = Pattern::Repeat {
            predicate: EventPredicate::PressEither,
            count: 2,
            within: Duration::from_millis(500),
        };
        let mut progress = Progress::default();
        let left = press(ButtonId::Left);
        let right = press(ButtonId::Right);
        assert_eq!(pattern.evaluate(&mut progress, &at(0, left), GATE), Verdict::Continue);
        assert_eq!(pattern.evaluate(&mut progress, &at(200, right), GATE), Verdict::Continue);
        assert_eq!(pattern.evaluate(&mut progress, &at(1000, right), GATE), Verdict::Continue);
        assert_eq!(pattern.evaluate(&mut progress, &at(1300, right), GATE), Verdict::Satisfied);
    }

    #[test]
    fn test_choice_commit() {
        let pattern = Pattern::Choice {
            options: vec!["Open".into(), "Basement".into(), "2nd floor".into()],
            correct: 2,
            forfeit: Some((1, ChapterId::new(4))),
        };
        let commit = at(0, press(ButtonId::Encoder));

        let mut progress = Progress::default();
        assert_eq!(pattern.evaluate(&mut progress, &commit, GATE), Verdict::Mismatch);

        pattern.evaluate(&mut progress, &at(0, press(ButtonId::Right)), GATE);
        assert_eq!(pattern.selected_option(&progress), Some("Basement"));
        assert_eq!(
            pattern.evaluate(&mut progress, &commit, GATE),
            Verdict::Forfeit(ChapterId::new(4))
        );

        pattern.evaluate(&mut progress, &at(0, InputEvent::EncoderRotated(1)), GATE);
        assert_eq!(pattern.evaluate(&mut progress, &commit, GATE), Verdict::Satisfied);
    }

    #[test]
    fn test_abstain() {
        let pattern = Pattern::Abstain {
            options: vec!["Yes".into(), "No".into()],
        };
        let mut progress = Progress::default();
        assert_eq!(
            pattern.evaluate(&mut progress, &at(0, press(ButtonId::Left)), GATE),
            Verdict::Continue
        );
        assert_eq!(pattern.selected_option(&progress), Some("No"));
        assert_eq!(
            pattern.evaluate(&mut progress, &at(0, press(ButtonId::Encoder)), GATE),
            Verdict::Mismatch
        );
        assert_eq!(pattern.on_timeout(), Verdict::Satisfied);
        assert_eq!(lrl().on_timeout(), Verdict::Mismatch);
    }

    #[test]
    fn test_sequence_label() {
        assert_eq!(lrl().sequence_label().as_deref(), Some("L R L"));
    }
}
