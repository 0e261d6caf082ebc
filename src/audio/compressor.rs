//! Smoothed-power dynamic range compression.
//!
//! The gain curve works on a running RMS power estimate rather than
//! per-sample peaks. Each window updates a first-order smoothed power that
//! maps through a hard-knee transfer curve in dB, and the resulting scalar
//! gain applies uniformly to the whole window.

/// Power at or below this level is treated as digital silence.
const POWER_FLOOR: f64 = 1e-40;

pub struct Compressor {
    threshold: f64,
    ratio: f64,
    /// Configured makeup gain minus `curve(0.0)`, fixed at construction.
    postgain: f64,
    smooth: f64,
    limit: f64,
    /// Smoothed RMS power carried across windows. Never negative.
    power: f64,
    enabled: bool,
}

impl Compressor {
    /// Create a compressor with its gain curve fixed at construction.
    ///
    /// * `threshold` - Input level in dB above which compression engages
    /// * `ratio`     - Slope divisor above the threshold (1.0 = no compression)
    /// * `postgain`  - Makeup gain in dB, relative to the 0 dB calibration point
    /// * `smooth`    - Weight of the newest RMS measurement in [0, 1];
    ///                 1.0 means no smoothing, 0.0 freezes the estimate
    /// * `limit`     - Power in dB at or below which the output is silenced
    pub fn new(threshold: f64, ratio: f64, postgain: f64, smooth: f64, limit: f64) -> Self {
        let mut compressor = Self {
            threshold,
            ratio,
            postgain: 0.0,
            smooth,
            limit,
            power: 0.0,
            enabled: true,
        };
        // Calibrate the makeup gain against the curve's value at 0 dB, so a
        // full-scale input maps to exactly `postgain` dB of gain.
        compressor.postgain = postgain - compressor.curve(0.0);
        compressor
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current smoothed power estimate (linear, not dB).
    pub fn power(&self) -> f64 {
        self.power
    }

    /// Hard-knee transfer curve in dB: identity below the threshold, slope
    /// 1/ratio above it. Continuous at the breakpoint.
    fn curve(&self, db_in: f64) -> f64 {
        if db_in < self.threshold {
            db_in
        } else {
            (db_in - self.threshold) / self.ratio + self.threshold
        }
    }

    /// Compress one normalized window in place.
    ///
    /// A single gain is computed for the whole window from the smoothed
    /// power estimate. Windows at or below the power floor or the silence
    /// limit come out all-zero, as does anything that would produce a
    /// non-finite gain; the estimate recovers on the next healthy window.
    pub fn process(&mut self, samples: &mut [f32]) {
        if !self.enabled || samples.is_empty() {
            return;
        }

        let sum_squares: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
        let rms = (sum_squares / samples.len() as f64).sqrt();

        // First-order smoothing; `smooth` weights the NEW measurement.
        let power = self.power * (1.0 - self.smooth) + rms * self.smooth;
        self.power = if power.is_finite() { power } else { 0.0 };

        if self.power <= POWER_FLOOR {
            samples.fill(0.0);
            return;
        }

        // dB here is 10*log10 of the smoothed RMS; the inverse below uses
        // 10^(db/10), so the two stay consistent with each other.
        let db_in = 10.0 * self.power.log10();
        if db_in <= self.limit {
            samples.fill(0.0);
            return;
        }

        let db_gain = self.curve(db_in) - db_in + self.postgain;
        let gain = 10f64.powf(db_gain / 10.0);
        if !gain.is_finite() {
            samples.fill(0.0);
            return;
        }

        for s in samples.iter_mut() {
            *s = (*s as f64 * gain) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec;

    const WINDOW: usize = 1024;

    /// The reference tuning used at startup.
    fn default_compressor() -> Compressor {
        Compressor::new(-15.0, 8.0, -9.0, 0.5, -30.0)
    }

    /// Makeup gain equal to curve(0) cancels the calibration term, making
    /// the raw transfer curve observable as output level vs input level.
    fn curve_observable(threshold: f64, ratio: f64) -> Compressor {
        let curve_at_zero = (0.0 - threshold) / ratio + threshold;
        Compressor::new(threshold, ratio, curve_at_zero, 1.0, -90.0)
    }

    fn constant_window(amplitude: f32) -> Vec<f32> {
        vec![amplitude; WINDOW]
    }

    fn rms(samples: &[f32]) -> f64 {
        let sum: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
        (sum / samples.len() as f64).sqrt()
    }

    #[test]
    fn test_zero_window_stays_zero() {
        let mut comp = default_compressor();
        let mut window = constant_window(0.0);
        for _ in 0..3 {
            comp.process(&mut window);
            assert!(window.iter().all(|&s| s == 0.0), "zero input must stay zero");
            assert!(comp.power().is_finite());
            assert_eq!(comp.power(), 0.0);
        }
    }

    #[test]
    fn test_levels_above_threshold_are_reduced() {
        let mut comp = curve_observable(-15.0, 8.0);
        let mut window = constant_window(0.9);
        let in_db = 10.0 * rms(&window).log10();
        comp.process(&mut window);
        let out_db = 10.0 * rms(&window).log10();

        assert!(in_db > -15.0, "test signal must sit above the threshold");
        assert!(
            out_db < in_db,
            "output level {out_db:.3} dB must be below input level {in_db:.3} dB"
        );
        // The level above the threshold shrinks by the ratio.
        let expected = (in_db + 15.0) / 8.0 - 15.0;
        assert!(
            (out_db - expected).abs() < 1e-3,
            "expected {expected:.3} dB, got {out_db:.3} dB"
        );
    }

    #[test]
    fn test_levels_below_threshold_pass_unchanged() {
        let mut comp = curve_observable(-15.0, 8.0);
        // rms 0.01 -> -20 dB, below the -15 dB threshold.
        let mut window = constant_window(0.01);
        let original = window.clone();
        comp.process(&mut window);
        assert_eq!(
            window, original,
            "below-threshold windows must pass through untouched"
        );
    }

    #[test]
    fn test_curve_continuous_at_the_breakpoint() {
        let mut comp = curve_observable(-15.0, 8.0);
        // Constant amplitude sitting exactly at the -15 dB threshold.
        let amplitude = 10f64.powf(-15.0 / 10.0) as f32;
        let mut window = constant_window(amplitude);
        let in_db = 10.0 * rms(&window).log10();
        comp.process(&mut window);
        let out_db = 10.0 * rms(&window).log10();
        // Either branch of the curve maps the breakpoint to itself.
        assert!(
            (out_db - in_db).abs() < 1e-4,
            "breakpoint must map to itself: in {in_db:.6} dB, out {out_db:.6} dB"
        );
    }

    #[test]
    fn test_unity_gain_at_zero_db_calibration_point() {
        // postgain 0, no smoothing: a full-scale window is the 0 dB
        // reference and must come out at unity gain.
        let mut comp = Compressor::new(-15.0, 8.0, 0.0, 1.0, -30.0);
        let mut window = constant_window(1.0);
        comp.process(&mut window);
        for &s in &window {
            assert!((s - 1.0).abs() < 1e-6, "expected unity output, got {s}");
        }
    }

    #[test]
    fn test_first_window_at_full_scale_end_to_end() {
        // decode → compress → encode of a full-scale window with the default
        // tuning, starting from power 0. The expected gain is computable by
        // hand from the first smoothed power of 0.5 * rms.
        let raw = vec![32767i16; WINDOW];
        let mut samples = codec::decode(&raw);
        let mut comp = default_compressor();
        comp.process(&mut samples);
        let out = codec::encode(&samples);

        let rms_in = 32767.0f64 / 32768.0;
        let power = 0.5 * rms_in;
        assert!((comp.power() - power).abs() < 1e-12);

        let db_in = 10.0 * power.log10();
        let curve = |db: f64| if db < -15.0 { db } else { (db + 15.0) / 8.0 - 15.0 };
        let db_gain = curve(db_in) - db_in + (-9.0 - curve(0.0));
        let gain = 10f64.powf(db_gain / 10.0);
        let expected = (rms_in * gain * 32767.0).round() as i16;

        assert!(
            out[0] > 0 && out[0] < 32767,
            "compression must engage and stay above the silence limit: got {}",
            out[0]
        );
        assert!(
            (out[0] as i32 - expected as i32).abs() <= 1,
            "expected ~{expected}, got {}",
            out[0]
        );
        assert!(
            out.iter().all(|&s| s == out[0]),
            "a constant window takes one uniform gain"
        );
    }

    #[test]
    fn test_silence_limit_forces_zero_output() {
        let mut comp = default_compressor();
        // First smoothed power = 0.0005 -> ~-33 dB, under the -30 dB limit.
        let mut window = constant_window(0.001);
        comp.process(&mut window);
        assert!(
            window.iter().all(|&s| s == 0.0),
            "sub-limit window must be silenced"
        );
        // The power estimate still advances; the gate only zeroes the output.
        assert!((comp.power() - 0.0005).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_input_degrades_to_silence() {
        let mut comp = default_compressor();
        let mut window = constant_window(0.5);
        window[17] = f32::NAN;
        comp.process(&mut window);
        assert!(
            window.iter().all(|&s| s == 0.0),
            "NaN input must come out silent"
        );
        assert!(comp.power().is_finite(), "power estimate must stay finite");
    }

    #[test]
    fn test_bypass_is_identity() {
        let mut comp = default_compressor();
        comp.set_enabled(false);
        assert!(!comp.is_enabled());
        let mut window = constant_window(0.8);
        let original = window.clone();
        comp.process(&mut window);
        assert_eq!(window, original, "bypassed compressor must not touch samples");
        assert_eq!(comp.power(), 0.0, "bypassed compressor must not advance state");
    }

    #[test]
    fn test_smooth_zero_freezes_the_estimate() {
        // smooth = 0.0 ignores new measurements entirely; from a cold start
        // the power stays 0 and everything gates to silence.
        let mut comp = Compressor::new(-15.0, 8.0, 0.0, 0.0, -30.0);
        let mut window = constant_window(0.9);
        comp.process(&mut window);
        assert_eq!(comp.power(), 0.0);
        assert!(window.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_smoothing_converges_toward_the_input_level() {
        let mut comp = default_compressor();
        for _ in 0..64 {
            let mut window = constant_window(0.5);
            comp.process(&mut window);
        }
        // (1 - smooth)^n vanishes, so power -> rms = 0.5.
        assert!(
            (comp.power() - 0.5).abs() < 1e-6,
            "power {} should converge to 0.5",
            comp.power()
        );
    }
}
