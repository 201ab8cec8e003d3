//! Gesture classification over filtered samples.
//!
//! Three detectors share one pass per tick:
//! - **tilt**: per-axis deviation from the baseline beyond `tilt_threshold`,
//!   confirmed over `tilt_confirm_ticks` consecutive ticks in one direction;
//! - **tap**: the tick-to-tick jolt (delta from the previous filtered sample)
//!   beyond `tap_threshold` for a single tick;
//! - **sustained movement**: the jolt beyond `movement_threshold` for
//!   `movement_ticks` consecutive ticks.
//!
//! At most one event per call, tilt first, then tap, then movement. Every
//! detector is edge-triggered: once it fires it stays quiet until its signal
//! drops back below threshold. A tap additionally mutes everything until the
//! whole signal has settled, so the decaying tail of a knock never reads as a
//! tilt.

use crate::sensing::types::{Axis, Baseline, FilteredSample, GestureEvent, Sign};
use serde::{Deserialize, Serialize};

/// Gesture thresholds, in filtered device units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub tilt_threshold: f32,
    pub tilt_confirm_ticks: u32,
    pub tap_threshold: f32,
    pub movement_threshold: f32,
    pub movement_ticks: u32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            tilt_threshold: 2.5,
            tilt_confirm_ticks: 3,
            tap_threshold: 20.0,
            movement_threshold: 1.5,
            movement_ticks: 3,
        }
    }
}

/// Stateful classifier. One instance per sensor.
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    config: GestureConfig,
    previous: Option<FilteredSample>,
    tilt_candidate: Option<(Axis, Sign)>,
    tilt_count: u32,
    tilt_latched: bool,
    movement_count: u32,
    movement_latched: bool,
    settling: bool,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            previous: None,
            tilt_candidate: None,
            tilt_count: 0,
            tilt_latched: false,
            movement_count: 0,
            movement_latched: false,
            settling: false,
        }
    }

    /// Classify one filtered sample against the calibrated baseline.
    pub fn classify(
        &mut self,
        sample: FilteredSample,
        baseline: &Baseline,
    ) -> Option<GestureEvent> {
        let deviation = baseline.deviation(&sample);
        let jolt = self
            .previous
            .map(|prev| sample.minus(&prev).magnitude())
            .unwrap_or(0.0);
        self.previous = Some(sample);

        let dominant = dominant_tilt(&deviation, self.config.tilt_threshold);
        let quiet = jolt <= self.config.movement_threshold;

        if dominant.is_none() {
            self.tilt_latched = false;
        }
        if quiet {
            self.movement_latched = false;
        }

        if self.settling {
            if dominant.is_none() && quiet {
                self.settling = false;
            } else {
                self.reset_counters();
                return None;
            }
        }

        let tilt_confirmed = match dominant {
            Some((axis, value)) if !self.tilt_latched => {
                let direction = (axis, Sign::of(value));
                if self.tilt_candidate == Some(direction) {
                    self.tilt_count += 1;
                } else {
                    self.tilt_candidate = Some(direction);
                    self.tilt_count = 1;
                }
                self.tilt_count >= self.config.tilt_confirm_ticks
            }
            Some(_) => false,
            None => {
                self.tilt_candidate = None;
                self.tilt_count = 0;
                false
            }
        };

        if quiet {
            self.movement_count = 0;
        } else {
            self.movement_count += 1;
        }

        if tilt_confirmed {
            if let Some((axis, value)) = dominant {
                self.tilt_latched = true;
                self.tilt_candidate = None;
                self.tilt_count = 0;
                return Some(GestureEvent::tilt(axis, value));
            }
        }

        if jolt > self.config.tap_threshold {
            self.settling = true;
            self.reset_counters();
            return Some(GestureEvent::TapDetected);
        }

        if !self.movement_latched && self.movement_count >= self.config.movement_ticks {
            self.movement_latched = true;
            self.movement_count = 0;
            return Some(GestureEvent::SustainedMovementDetected);
        }

        None
    }

    fn reset_counters(&mut self) {
        self.tilt_candidate = None;
        self.tilt_count = 0;
        self.movement_count = 0;
    }
}

/// Axis with the largest deviation beyond `threshold`; ties go to X, then Y, then Z.
fn dominant_tilt(deviation: &FilteredSample, threshold: f32) -> Option<(Axis, f32)> {
    let mut best: Option<(Axis, f32)> = None;
    for axis in Axis::ALL {
        let value = deviation.axis(axis);
        if value.abs() <= threshold {
            continue;
        }
        match best {
            Some((_, current)) if value.abs() <= current.abs() => {}
            _ => best = Some((axis, value)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::filter::{FilterConfig, SignalFilter};
    use crate::sensing::types::RawSample;

    fn rest() -> RawSample {
        RawSample::new(0.0, 0.0, 9.8)
    }

    fn setup() -> (SignalFilter, GestureClassifier, Baseline) {
        let mut filter = SignalFilter::new(FilterConfig::default());
        filter.update(rest());
        let baseline = Baseline::new(FilteredSample::from(rest()));
        let mut classifier = GestureClassifier::new(GestureConfig::default());
        assert_eq!(classifier.classify(filter.hold(), &baseline), None);
        (filter, classifier, baseline)
    }

    fn run(
        filter: &mut SignalFilter,
        classifier: &mut GestureClassifier,
        baseline: &Baseline,
        samples: &[RawSample],
    ) -> Vec<GestureEvent> {
        samples
            .iter()
            .filter_map(|raw| {
                let filtered = filter.update(*raw);
                classifier.classify(filtered, baseline)
            })
            .collect()
    }

    #[test]
    fn test_single_spike_is_one_tap() {
        let (mut filter, mut classifier, baseline) = setup();
        let mut samples = vec![RawSample::new(100.0, 0.0, 9.8)];
        samples.extend(std::iter::repeat(rest()).take(40));

        let events = run(&mut filter, &mut classifier, &baseline, &samples);
        assert_eq!(events, vec![GestureEvent::TapDetected]);
    }

    #[test]
    fn test_held_tilt_fires_once() {
        let (mut filter, mut classifier, baseline) = setup();
        let samples: Vec<_> = std::iter::repeat(RawSample::new(-5.0, 0.0, 9.8))
            .take(30)
            .collect();

        let events = run(&mut filter, &mut classifier, &baseline, &samples);
        assert_eq!(
            events,
            vec![GestureEvent::TiltDetected {
                axis: Axis::X,
                sign: Sign::Negative
            }]
        );
    }

    #[test]
    fn test_tilt_rearms_after_return() {
        let (mut filter, mut classifier, baseline) = setup();
        let mut samples = Vec::new();
        samples.extend(std::iter::repeat(RawSample::new(0.0, 5.0, 9.8)).take(20));
        samples.extend(std::iter::repeat(rest()).take(20));
        samples.extend(std::iter::repeat(RawSample::new(0.0, 5.0, 9.8)).take(20));

        let events = run(&mut filter, &mut classifier, &baseline, &samples);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| *e
            == GestureEvent::TiltDetected {
                axis: Axis::Y,
                sign: Sign::Positive
            }));
    }

    #[test]
    fn test_largest_deviation_wins() {
        let (mut filter, mut classifier, baseline) = setup();
        let samples: Vec<_> = std::iter::repeat(RawSample::new(4.0, -7.0, 9.8))
            .take(20)
            .collect();

        let events = run(&mut filter, &mut classifier, &baseline, &samples);
        assert_eq!(
            events,
            vec![GestureEvent::TiltDetected {
                axis: Axis::Y,
                sign: Sign::Negative
            }]
        );
    }

    #[test]
    fn test_tie_breaks_toward_x() {
        let deviation = FilteredSample::new(3.0, -3.0, 3.0);
        assert_eq!(dominant_tilt(&deviation, 2.5), Some((Axis::X, 3.0)));
        assert_eq!(dominant_tilt(&FilteredSample::new(1.0, 1.0, 1.0), 2.5), None);
    }

    #[test]
    fn test_shaking_is_sustained_movement() {
        let (mut filter, mut classifier, baseline) = setup();
        let samples: Vec<_> = (0..40)
            .map(|i| {
                let x = if i % 2 == 0 { 8.0 } else { -8.0 };
                RawSample::new(x, 0.0, 9.8)
            })
            .collect();

        let events = run(&mut filter, &mut classifier, &baseline, &samples);
        assert_eq!(events, vec![GestureEvent::SustainedMovementDetected]);
    }

    #[test]
    fn test_rest_is_silent() {
        let (mut filter, mut classifier, baseline) = setup();
        let samples: Vec<_> = std::iter::repeat(rest()).take(100).collect();
        assert!(run(&mut filter, &mut classifier, &baseline, &samples).is_empty());
    }
}
