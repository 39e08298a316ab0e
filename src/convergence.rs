/*! Convergence accounting.

Two metrics are tracked per run:

* Per frame mean square error of the error signal, saturated to
  [`MSE_CEILING`] so that it survives packing into 16 bits for telemetry.
* Minimum absolute difference between plant and adaptive taps, checked
  against a threshold at the end of the run.

The monitor only observes. It never touches filter state.
*/
use serde::Serialize;

use crate::{BLOCK_SIZE, Coefficients, Q15, SignalBlock};

/// Largest mean square error stored. 18 bits.
pub const MSE_CEILING: u32 = (1 << 18) - 1;

/// Default tap distance threshold, 0.001.
pub const DEFAULT_COEFF_THRESHOLD: Q15 = Q15::from_raw(33);

/// Default residual error threshold, 0.0009.
pub const DEFAULT_ERROR_THRESHOLD: Q15 = Q15::from_raw(29);

/// Mean of squared error samples (raw Q15 units), saturated to
/// [`MSE_CEILING`].
#[must_use]
pub fn block_mse(errors: &SignalBlock) -> u32 {
    let sum: u64 = errors
        .iter()
        .map(|e| {
            let e = e.raw() as i64;
            (e * e) as u64
        })
        .sum();
    (sum / BLOCK_SIZE as u64).min(MSE_CEILING as u64) as u32
}

/// Smallest saturating absolute difference between corresponding taps.
#[must_use]
pub fn min_tap_distance(plant: &Coefficients, adaptive: &Coefficients) -> Q15 {
    plant
        .iter()
        .zip(adaptive.iter())
        .map(|(&h, &w)| (h - w).abs())
        .min()
        .unwrap_or(Q15::ZERO)
}

/// Smallest absolute sample value.
#[must_use]
pub fn min_abs(samples: &[Q15]) -> Q15 {
    samples.iter().map(|x| x.abs()).min().unwrap_or(Q15::ZERO)
}

/// End of run convergence outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// Smallest tap distance at the end of the run.
    pub min_tap_distance: Q15,

    /// Smallest absolute error sample in the last frame.
    pub min_residual: Q15,

    /// Residual error below its threshold.
    pub residual_ok: bool,

    /// Tap distance below its threshold. This is the overall outcome.
    pub converged: bool,
}

/// Per run error and tap distance tracker.
#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    coeff_threshold: Q15,
    error_threshold: Q15,
    error_trace: Vec<u32>,
    distance_trace: Vec<Q15>,
    last_residual: Option<Q15>,
}

impl ConvergenceMonitor {
    /// Create new monitor.
    #[must_use]
    pub fn new(coeff_threshold: Q15, error_threshold: Q15, frames: usize) -> Self {
        Self {
            coeff_threshold,
            error_threshold,
            error_trace: Vec::with_capacity(frames),
            distance_trace: Vec::with_capacity(frames),
            last_residual: None,
        }
    }

    /// Record one frame.
    pub fn record(&mut self, errors: &SignalBlock, plant: &Coefficients, adaptive: &Coefficients) {
        self.error_trace.push(block_mse(errors));
        self.distance_trace.push(min_tap_distance(plant, adaptive));
        self.last_residual = Some(min_abs(errors));
    }

    /// Mean square error, one entry per recorded frame.
    #[must_use]
    pub fn error_trace(&self) -> &[u32] {
        &self.error_trace
    }

    /// Minimum tap distance, one entry per recorded frame.
    #[must_use]
    pub fn distance_trace(&self) -> &[Q15] {
        &self.distance_trace
    }

    /// Number of frames recorded.
    #[must_use]
    pub fn frames(&self) -> usize {
        self.error_trace.len()
    }

    /// Judge convergence of the final taps.
    #[must_use]
    pub fn verdict(&self, plant: &Coefficients, adaptive: &Coefficients) -> Verdict {
        let min_tap_distance = min_tap_distance(plant, adaptive);
        let min_residual = self.last_residual.unwrap_or(Q15::MAX);
        Verdict {
            min_tap_distance,
            min_residual,
            residual_ok: min_residual <= self.error_threshold,
            converged: min_tap_distance <= self.coeff_threshold,
        }
    }

    /// Consume, returning the error trace and the distance trace.
    #[must_use]
    pub fn into_traces(self) -> (Vec<u32>, Vec<Q15>) {
        (self.error_trace, self.distance_trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NUM_TAPS;
    use crate::plant::DEFAULT_PLANT_TAPS;

    #[test]
    fn mse() {
        assert_eq!(block_mse(&[Q15::ZERO; BLOCK_SIZE]), 0);
        assert_eq!(block_mse(&[Q15::from_raw(10); BLOCK_SIZE]), 100);
        assert_eq!(block_mse(&[Q15::from_raw(-10); BLOCK_SIZE]), 100);
        let mut e = [Q15::ZERO; BLOCK_SIZE];
        e[3] = Q15::from_raw(100);
        assert_eq!(block_mse(&e), 100);
    }

    #[test]
    fn mse_saturates() {
        assert_eq!(block_mse(&[Q15::from_raw(512); BLOCK_SIZE]), MSE_CEILING);
        assert_eq!(block_mse(&[Q15::from_raw(511); BLOCK_SIZE]), 511 * 511);
        assert_eq!(block_mse(&[Q15::MIN; BLOCK_SIZE]), MSE_CEILING);
    }

    #[test]
    fn tap_distance() {
        let zero = [Q15::ZERO; NUM_TAPS];
        assert_eq!(min_tap_distance(&DEFAULT_PLANT_TAPS, &zero), Q15::from_raw(5));
        assert_eq!(
            min_tap_distance(&DEFAULT_PLANT_TAPS, &DEFAULT_PLANT_TAPS),
            Q15::ZERO
        );
        // Saturating: MAX - MIN does not wrap to something small.
        assert_eq!(
            min_tap_distance(&[Q15::MAX; NUM_TAPS], &[Q15::MIN; NUM_TAPS]),
            Q15::MAX
        );
    }

    #[test]
    fn monitor() {
        let mut m = ConvergenceMonitor::new(Q15::from_raw(33), Q15::from_raw(29), 3);
        let zero = [Q15::ZERO; NUM_TAPS];
        let mut w = zero;
        m.record(&[Q15::from_raw(20); BLOCK_SIZE], &DEFAULT_PLANT_TAPS, &w);
        w[0] = Q15::from_raw(4);
        m.record(&[Q15::from_raw(10); BLOCK_SIZE], &DEFAULT_PLANT_TAPS, &w);
        assert_eq!(m.frames(), 2);
        assert_eq!(m.error_trace(), &[400, 100]);
        assert_eq!(m.distance_trace(), &[Q15::from_raw(5), Q15::from_raw(1)]);
        let v = m.verdict(&DEFAULT_PLANT_TAPS, &w);
        assert_eq!(
            v,
            Verdict {
                min_tap_distance: Q15::from_raw(1),
                min_residual: Q15::from_raw(10),
                residual_ok: true,
                converged: true,
            }
        );
        let v = m.verdict(&DEFAULT_PLANT_TAPS, &[Q15::from_raw(-1000); NUM_TAPS]);
        assert!(!v.converged);
    }

    #[test]
    fn nothing_recorded() {
        let m = ConvergenceMonitor::new(Q15::from_raw(33), Q15::from_raw(29), 0);
        let v = m.verdict(&DEFAULT_PLANT_TAPS, &DEFAULT_PLANT_TAPS);
        assert!(v.converged);
        assert!(!v.residual_ok);
    }
}
