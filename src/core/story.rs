//! Chapter tables.
//!
//! Only the active chapter's table is materialized: the controller asks the
//! [`ChapterSource`] for it on every chapter transition.

use crate::core::chapter::{Budget, ChallengeSpec, ChapterId, ChapterSpec, Hint};
use crate::core::difficulty::Difficulty;
use crate::core::pattern::{EventPredicate, Pattern};
use crate::sensing::types::{Axis, ButtonId, Sign};
use std::time::Duration;

/// Index-based chapter lookup.
pub trait ChapterSource {
    fn chapter_count(&self) -> u8;

    /// Build the table for `id` at `difficulty`, or `None` past the end.
    fn load(&self, id: ChapterId, difficulty: Difficulty) -> Option<ChapterSpec>;
}

/// The built-in ten-chapter story.
#[derive(Debug, Clone, Copy, Default)]
pub struct FogStory;

const CHAPTERS: u8 = 10;

fn pick<T>(difficulty: Difficulty, easy: T, medium: T, hard: T) -> T {
    match difficulty {
        Difficulty::Easy => easy,
        Difficulty::Medium => medium,
        Difficulty::Hard => hard,
    }
}

fn choice(options: &[&str], correct: usize) -> Pattern {
    Pattern::Choice {
        options: options.iter().map(|s| s.to_string()).collect(),
        correct,
        forfeit: None,
    }
}

fn tilt(axis: Axis, sign: Sign) -> Pattern {
    Pattern::Single(EventPredicate::Tilt(axis, sign))
}

fn hold(secs: u64, release_fails: bool) -> Pattern {
    Pattern::Hold {
        duration: Duration::from_secs(secs),
        release_fails,
    }
}

fn double_knock() -> Pattern {
    Pattern::Repeat {
        predicate: EventPredicate::PressEither,
        count: 2,
        within: Duration::from_millis(500),
    }
}

fn rhythm(steps: &str) -> Pattern {
    Pattern::Sequence {
        steps: steps
            .chars()
            .filter_map(|c| match c {
                'L' => Some(EventPredicate::Press(ButtonId::Left)),
                'R' => Some(EventPredicate::Press(ButtonId::Right)),
                _ => None,
            })
            .collect(),
        step_window: None,
    }
}

fn chapter(id: u8, title: &str, challenges: Vec<ChallengeSpec>) -> ChapterSpec {
    ChapterSpec {
        id: ChapterId::new(id),
        title: title.to_string(),
        challenges,
        is_final: id == CHAPTERS,
    }
}

impl ChapterSource for FogStory {
    fn chapter_count(&self) -> u8 {
        CHAPTERS
    }

    fn load(&self, id: ChapterId, d: Difficulty) -> Option<ChapterSpec> {
        let spec = match id.get() {
            1 => chapter(
                1,
                "Entering your memory",
                vec![ChallengeSpec::new(
                    "Three entrances appear in front of you",
                    choice(&["Left entrance", "Middle entrance", "Right entrance"], 1),
                )
                .timeout_secs(15.0)
                .hint(Hint::new("The light will lead your way").with_brief("His favorite number is 2"))
                .hint_after_secs(0)],
            ),

            2 => chapter(
                2,
                "Toy box",
                vec![
                    ChallengeSpec::new("Please walk around...", Pattern::Single(EventPredicate::Movement))
                        .timeout_secs(30.0)
                        .budget(Budget::Fixed(1))
                        .hint(Hint::new("Try moving the box in different directions"))
                        .hint_after_secs(5),
                    ChallengeSpec::new(
                        "You saw an old photo album",
                        choice(&["Take the cover off", "Ignore it and leave", "Open it and take a look"], 2),
                    )
                    .timeout_secs(10.0)
                    .budget(Budget::Fixed(1)),
                ],
            ),

            3 => {
                let fall_back = pick(d, ChapterId::new(3), ChapterId::new(3), ChapterId::new(2));
                chapter(
                    3,
                    "Toy box?",
                    vec![
                        ChallengeSpec::new("Everything is sliding to the right", tilt(Axis::X, Sign::Negative))
                            .timeout_secs(6.0)
                            .budget(Budget::Fixed(1))
                            .restart_to(fall_back),
                        ChallengeSpec::new("Press and hold both buttons", hold(5, false))
                            .timeout_secs(12.0)
                            .budget(Budget::Fixed(1))
                            .restart_to(fall_back),
                        ChallengeSpec::new("What should you do", choice(&["Let go", "Try your best to hold"], 0))
                            .budget(Budget::Fixed(0))
                            .hint(Hint::new("Embrace the darkness").with_brief("Maybe it's time to let go?")),
                    ],
                )
            }

            4 => chapter(
                4,
                "Basement",
                vec![
                    ChallengeSpec::new("You need to get closer", tilt(Axis::Y, Sign::Positive))
                        .budget(Budget::Unlimited),
                    ChallengeSpec::new("'Don't leave me again'", choice(&["Who are you?", "Stay quiet", "I'm coming"], 1))
                        .timeout_secs(10.0)
                        .hint(Hint::new("Silence reveals more than sound").with_brief("He's closer when you listen")),
                    ChallengeSpec::new("A knocking sound came from the wall", double_knock())
                        .budget(Budget::Unlimited)
                        .hint(Hint::new("Try double clicking left or right button").with_brief("Try to knock back"))
                        .hint_after_secs(5),
                ],
            ),

            5 => {
                let rounds = pick::<&[&str]>(
                    d,
                    &["LRL"],
                    &["LRRL", "RLLR"],
                    &["LRLRR", "RRLLR", "LLRLR"],
                );
                let mut challenges: Vec<ChallengeSpec> = rounds
                    .iter()
                    .map(|round| {
                        ChallengeSpec::new("Match the rhythm of the echo", rhythm(round))
                            .timeout_secs(pick(d, 5.0, 5.0, 12.0))
                            .budget(Budget::Fixed(1))
                    })
                    .collect();
                challenges.push(
                    ChallengeSpec::new("Run", tilt(Axis::Y, Sign::Positive))
                        .fixed_timeout_secs(pick(d, 10.0, 8.0, 6.0))
                        .budget(Budget::Fixed(pick(d, 3, 2, 1))),
                );
                chapter(5, "Hospital", challenges)
            }

            6 => chapter(
                6,
                "Your path",
                vec![ChallengeSpec::new(
                    "Which button do you press",
                    Pattern::Choice {
                        options: ["Press open", "Basement", "2nd floor", "3rd floor"]
                            .iter()
                            .map(|s| s.to_string())
                            .collect(),
                        correct: 2,
                        forfeit: Some((1, ChapterId::new(4))),
                    },
                )
                .timeout_secs(15.0)
                .budget(Budget::Fixed(pick(d, 3, 2, 1)))
                .restart_to(ChapterId::new(5))],
            ),

            7 => chapter(
                7,
                "Reflections",
                vec![
                    ChallengeSpec::new(
                        "But none reflects your face",
                        Pattern::AllOf(vec![
                            EventPredicate::Tilt(Axis::X, Sign::Positive),
                            EventPredicate::Tilt(Axis::X, Sign::Negative),
                            EventPredicate::Tilt(Axis::Y, Sign::Positive),
                            EventPredicate::Tilt(Axis::Y, Sign::Negative),
                        ]),
                    )
                    .budget(Budget::Unlimited)
                    .hint(Hint::new("Try moving and tilting all directions"))
                    .hint_after_secs(5),
                    ChallengeSpec::new(
                        "It waves its right hand to you",
                        choice(&["Wave your left hand", "Stay still", "Wave your right hand"], 0),
                    )
                    .timeout_secs(10.0)
                    .hint(Hint::new("The shadow reacts opposite of you").with_brief("Follow what is reversed")),
                ],
            ),

            8 => chapter(
                8,
                "Flood",
                vec![
                    ChallengeSpec::new("You must hold on to something", hold(pick(d, 3, 4, 5), false))
                        .timeout_secs(pick(d, 6.0, 8.0, 16.0))
                        .budget(Budget::Fixed(pick(d, 4, 3, 2)))
                        .restart_to(ChapterId::new(4)),
                    ChallengeSpec::new("Knock, knock, knock......", double_knock())
                        .timeout_secs(15.0)
                        .budget(Budget::Fixed(pick(d, 3, 2, 1)))
                        .restart_to(ChapterId::new(4)),
                ],
            ),

            9 => chapter(
                9,
                "The Well",
                vec![
                    ChallengeSpec::new("Lean down and listen", tilt(Axis::Y, Sign::Positive))
                        .timeout_secs(4.0)
                        .budget(Budget::Fixed(pick(d, 3, 2, 1)))
                        .restart_to(ChapterId::new(8)),
                    ChallengeSpec::new("Hold tight!!!", hold(pick(d, 3, 4, 5), true))
                        .timeout_secs(pick(d, 6.0, 9.0, 20.0))
                        .budget(Budget::Fixed(1)),
                ],
            ),

            10 => chapter(
                10,
                "Truth",
                vec![ChallengeSpec::new(
                    "Did you?",
                    Pattern::Abstain {
                        options: vec!["Yes".to_string(), "No".to_string()],
                    },
                )
                .fixed_timeout_secs(10.0)
                .budget(Budget::Unlimited)],
            ),

            _ => return None,
        };
        Some(spec)
    }
}
