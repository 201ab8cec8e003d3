//! EMA smoothing and baseline calibration.
//!
//! `filtered = alpha * raw + (1 - alpha) * filtered_prev`, per axis. The first
//! accepted sample seeds the recurrence. Out-of-range readings are clamped to
//! the sensor's documented range and non-finite readings are dropped (the
//! filter holds its last value), so nothing here can fail mid-game.

use crate::device::{Clock, SensorDriver};
use crate::sensing::types::{Baseline, FilteredSample, RawSample};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::time::Duration;
use tracing::debug;

/// Shortest delay between calibration reads.
const MIN_CALIBRATION_INTERVAL: Duration = Duration::from_millis(1);

/// Filter and calibration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// EMA weight of the newest sample. Higher reacts faster but passes more noise.
    pub alpha: f32,
    /// Documented sensor range per axis (m/s^2); readings are clamped into it.
    pub sensor_range: f32,
    /// Wall-clock length of the startup calibration window.
    #[serde(with = "crate::config::millis")]
    pub calibration_window: Duration,
    /// Delay between calibration reads.
    #[serde(with = "crate::config::millis")]
    pub calibration_interval: Duration,
    /// Magnitude standard deviation above which calibration counts as disturbed.
    pub calibration_noise_limit: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            sensor_range: 156.9, // +-16 g
            calibration_window: Duration::from_secs(1),
            calibration_interval: Duration::from_millis(10),
            calibration_noise_limit: 0.5,
        }
    }
}

/// Summary of a calibration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub origin: FilteredSample,
    pub samples: usize,
    pub mean_magnitude: f64,
    pub magnitude_std_dev: f64,
    /// The device was probably moved (or read nothing) during the window.
    pub disturbed: bool,
}

/// Calibration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    /// The baseline is captured once per boot.
    AlreadyCalibrated,
}

impl std::fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationError::AlreadyCalibrated => write!(f, "Baseline already calibrated"),
        }
    }
}

impl std::error::Error for CalibrationError {}

/// Running sums over the calibration window.
#[derive(Debug, Default)]
struct CalibrationAccumulator {
    sum: [f64; 3],
    magnitudes: Vec<f64>,
}

impl CalibrationAccumulator {
    fn push(&mut self, raw: RawSample) {
        self.sum[0] += raw.x as f64;
        self.sum[1] += raw.y as f64;
        self.sum[2] += raw.z as f64;
        self.magnitudes.push(raw.magnitude() as f64);
    }

    fn finish(self, noise_limit: f64) -> CalibrationReport {
        let samples = self.magnitudes.len();
        if samples == 0 {
            return CalibrationReport {
                origin: FilteredSample::default(),
                samples,
                mean_magnitude: 0.0,
                magnitude_std_dev: 0.0,
                disturbed: true,
            };
        }

        let n = samples as f64;
        let origin = FilteredSample::new(
            (self.sum[0] / n) as f32,
            (self.sum[1] / n) as f32,
            (self.sum[2] / n) as f32,
        );
        let mean_magnitude = self.magnitudes.iter().mean();
        let magnitude_std_dev = if samples > 1 {
            self.magnitudes.iter().std_dev()
        } else {
            0.0
        };

        CalibrationReport {
            origin,
            samples,
            mean_magnitude,
            magnitude_std_dev,
            disturbed: magnitude_std_dev > noise_limit,
        }
    }
}

/// Exponential-moving-average filter with a one-shot baseline.
#[derive(Debug, Clone)]
pub struct SignalFilter {
    config: FilterConfig,
    filtered: Option<FilteredSample>,
    baseline: Option<Baseline>,
}

impl SignalFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            filtered: None,
            baseline: None,
        }
    }

    /// Fold one raw sample into the filter.
    pub fn update(&mut self, raw: RawSample) -> FilteredSample {
        if !raw.is_finite() {
            debug!("Dropping non-finite sample {:?}", raw);
            return self.hold();
        }

        let raw = raw.clamped(self.config.sensor_range);
        let alpha = self.config.alpha;
        let next = match self.filtered {
            None => FilteredSample::from(raw),
            Some(prev) => FilteredSample::new(
                alpha * raw.x + (1.0 - alpha) * prev.x,
                alpha * raw.y + (1.0 - alpha) * prev.y,
                alpha * raw.z + (1.0 - alpha) * prev.z,
            ),
        };

        self.filtered = Some(next);
        next
    }

    /// Last filtered value, for ticks where the driver produced nothing.
    pub fn hold(&self) -> FilteredSample {
        self.filtered.unwrap_or_default()
    }

    pub fn current(&self) -> Option<FilteredSample> {
        self.filtered
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.baseline.is_some()
    }

    /// Sample the sensor for the configured window and store the average as
    /// the baseline. Blocks for the window (time-boxed).
    ///
    /// Driver faults inside the window are skipped. A window with no usable
    /// samples still produces a (zero) baseline, flagged as disturbed.
    pub fn calibrate(
        &mut self,
        sensor: &mut dyn SensorDriver,
        clock: &dyn Clock,
    ) -> Result<CalibrationReport, CalibrationError> {
        if self.baseline.is_some() {
            return Err(CalibrationError::AlreadyCalibrated);
        }

        let start = clock.now();
        let interval = self.config.calibration_interval.max(MIN_CALIBRATION_INTERVAL);
        let mut acc = CalibrationAccumulator::default();

        while clock.now().saturating_sub(start) < self.config.calibration_window {
            match sensor.read() {
                Ok(raw) if raw.is_finite() => {
                    let raw = raw.clamped(self.config.sensor_range);
                    self.update(raw);
                    acc.push(raw);
                }
                Ok(raw) => debug!("Skipping non-finite calibration sample {:?}", raw),
                Err(fault) => debug!("Calibration read failed: {}", fault),
            }
            clock.sleep(interval);
        }

        let report = acc.finish(self.config.calibration_noise_limit);
        self.baseline = Some(Baseline::new(report.origin));
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{ManualClock, SensorFault};

    struct Steady(RawSample);

    impl SensorDriver for Steady {
        fn read(&mut self) -> Result<RawSample, SensorFault> {
            Ok(self.0)
        }
    }

    struct Broken;

    impl SensorDriver for Broken {
        fn read(&mut self) -> Result<RawSample, SensorFault> {
            Err(SensorFault::Bus("nack".to_string()))
        }
    }

    #[test]
    fn test_first_sample_seeds_filter() {
        let mut filter = SignalFilter::new(FilterConfig::default());
        let out = filter.update(RawSample::new(1.0, 2.0, 9.8));
        assert_eq!(out, FilteredSample::new(1.0, 2.0, 9.8));
    }

    #[test]
    fn test_ema_recurrence() {
        let mut filter = SignalFilter::new(FilterConfig::default());
        filter.update(RawSample::new(0.0, 0.0, 0.0));
        let out = filter.update(RawSample::new(10.0, 0.0, 0.0));
        assert!((out.x - 3.0).abs() < 1e-5);
        let out = filter.update(RawSample::new(10.0, 0.0, 0.0));
        assert!((out.x - 5.1).abs() < 1e-5);
    }

    #[test]
    fn test_output_bounded_by_input_magnitude() {
        let mut filter = SignalFilter::new(FilterConfig::default());
        let inputs = [
            RawSample::new(9.0, -3.0, 1.0),
            RawSample::new(-12.0, 4.0, 2.5),
            RawSample::new(0.5, 0.5, -9.8),
            RawSample::new(20.0, -20.0, 0.0),
            RawSample::new(-1.0, 7.0, 3.0),
            RawSample::new(0.0, 0.0, 0.0),
        ];
        let mut max_raw = 0.0f32;
        for raw in inputs.iter().cycle().take(60) {
            max_raw = max_raw.max(raw.magnitude());
            let out = filter.update(*raw);
            assert!(out.magnitude() <= max_raw + 1e-4);
        }
    }

    #[test]
    fn test_non_finite_sample_holds_last_value() {
        let mut filter = SignalFilter::new(FilterConfig::default());
        filter.update(RawSample::new(1.0, 1.0, 1.0));
        let out = filter.update(RawSample::new(f32::NAN, 0.0, 0.0));
        assert_eq!(out, FilteredSample::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_out_of_range_sample_is_clamped() {
        let mut filter = SignalFilter::new(FilterConfig::default());
        let out = filter.update(RawSample::new(1000.0, 0.0, 0.0));
        assert_eq!(out.x, 156.9);
    }

    #[test]
    fn test_calibration_averages_window() {
        let clock = ManualClock::new();
        let mut sensor = Steady(RawSample::new(0.2, -0.1, 9.8));
        let mut filter = SignalFilter::new(FilterConfig::default());

        let report = filter.calibrate(&mut sensor, &clock).unwrap();
        assert_eq!(report.samples, 100);
        assert!(!report.disturbed);
        assert_eq!(clock.now(), Duration::from_secs(1));

        let origin = filter.baseline().unwrap().origin();
        assert!((origin.x - 0.2).abs() < 1e-5);
        assert!((origin.z - 9.8).abs() < 1e-5);
    }

    #[test]
    fn test_baseline_fed_back_has_zero_deviation() {
        let clock = ManualClock::new();
        let mut sensor = Steady(RawSample::new(0.3, 0.4, 9.7));
        let mut filter = SignalFilter::new(FilterConfig::default());
        filter.calibrate(&mut sensor, &clock).unwrap();

        let baseline = *filter.baseline().unwrap();
        let origin = baseline.origin();
        for _ in 0..50 {
            let out = filter.update(RawSample::new(origin.x, origin.y, origin.z));
            let dev = baseline.deviation(&out);
            assert!(dev.x.abs() < 1e-5);
            assert!(dev.y.abs() < 1e-5);
            assert!(dev.z.abs() < 1e-5);
        }
    }

    #[test]
    fn test_calibration_runs_once() {
        let clock = ManualClock::new();
        let mut sensor = Steady(RawSample::new(0.0, 0.0, 9.8));
        let mut filter = SignalFilter::new(FilterConfig::default());
        filter.calibrate(&mut sensor, &clock).unwrap();
        assert_eq!(
            filter.calibrate(&mut sensor, &clock).unwrap_err(),
            CalibrationError::AlreadyCalibrated
        );
    }

    #[test]
    fn test_calibration_with_zero_interval_still_ends() {
        let clock = ManualClock::new();
        let mut sensor = Steady(RawSample::new(0.0, 0.0, 9.8));
        let mut filter = SignalFilter::new(FilterConfig {
            calibration_interval: Duration::ZERO,
            ..FilterConfig::default()
        });
        let report = filter.calibrate(&mut sensor, &clock).unwrap();
        assert_eq!(report.samples, 1000);
        assert_eq!(clock.now(), Duration::from_secs(1));
    }

    #[test]
    fn test_calibration_with_dead_sensor() {
        let clock = ManualClock::new();
        let mut filter = SignalFilter::new(FilterConfig::default());
        let report = filter.calibrate(&mut Broken, &clock).unwrap();
        assert_eq!(report.samples, 0);
        assert!(report.disturbed);
        assert!(filter.is_calibrated());
    }
}
