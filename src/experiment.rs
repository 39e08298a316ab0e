/*! One system identification run.

A run resets the adaptive filter, then for each frame:

1. draws a block of noise scaled by the input power,
2. runs it through the plant to get the reference,
3. runs it through the LMS filter, adapting against the reference,
4. records error and tap distance.

At the end the taps are judged and packed into telemetry frames.
*/
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::convergence::{
    ConvergenceMonitor, DEFAULT_COEFF_THRESHOLD, DEFAULT_ERROR_THRESHOLD, Verdict,
};
use crate::lms::{LmsFilter, LmsVariant};
use crate::params::{AdaptationParameters, PARAM_MAX, PARAM_MIN};
use crate::plant::{DEFAULT_PLANT_TAPS, Plant};
use crate::signal_source::NoiseSource;
use crate::{Coefficients, Error, NUM_TAPS, Q15, Result, telemetry};

/// Smallest number of frames per run.
pub const MIN_FRAMES: usize = 100;

/// Largest number of frames per run.
pub const MAX_FRAMES: usize = 10_000;

/// Default LMS step size, about 0.24. Converges within [`MIN_FRAMES`] at
/// the default power.
pub const DEFAULT_MU: i16 = 8000;

/// Default input power, 0.3.
pub const DEFAULT_POWER: i16 = 10000;

/// Adaptive taps at the start of each run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialCoefficients {
    /// All zero.
    #[default]
    Zero,
    /// Every tap set to the same value.
    Seed(Q15),
}

impl InitialCoefficients {
    /// Expand into a full set of taps.
    #[must_use]
    pub fn taps(self) -> Coefficients {
        match self {
            Self::Zero => [Q15::ZERO; NUM_TAPS],
            Self::Seed(v) => [v; NUM_TAPS],
        }
    }
}

/// Experiment configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    /// Frames per run.
    pub num_frames: usize,

    /// Initial LMS step size, raw Q15.
    pub mu: i16,

    /// Initial input power, raw Q15.
    pub power: i16,

    /// Output scale exponent of the adaptive filter.
    pub post_shift: u8,

    /// LMS update rule.
    pub variant: LmsVariant,

    /// Noise generator seed.
    pub seed: u64,

    /// Adaptive taps at the start of each run.
    pub initial_coefficients: InitialCoefficients,

    /// Plant impulse response. Defaults to [`DEFAULT_PLANT_TAPS`].
    pub plant: Option<Vec<Q15>>,

    /// Tap distance at or below which the filter counts as converged.
    pub coeff_threshold: Q15,

    /// Residual error at or below which the error counts as converged.
    pub error_threshold: Q15,

    /// Also send the per frame error trace after the coefficients.
    pub send_error_trace: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            num_frames: MIN_FRAMES,
            mu: DEFAULT_MU,
            power: DEFAULT_POWER,
            post_shift: 0,
            variant: LmsVariant::Standard,
            seed: 0,
            initial_coefficients: InitialCoefficients::Zero,
            plant: None,
            coeff_threshold: DEFAULT_COEFF_THRESHOLD,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            send_error_trace: false,
        }
    }
}

impl ExperimentConfig {
    /// Load from JSON file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::wrap(e.into(), format!("reading {}", path.display())))?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that everything is in range.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_FRAMES..=MAX_FRAMES).contains(&self.num_frames) {
            return Err(Error::InvalidConfig(format!(
                "num_frames {} outside {MIN_FRAMES}..={MAX_FRAMES}",
                self.num_frames
            )));
        }
        for (name, v) in [("mu", self.mu), ("power", self.power)] {
            if !(PARAM_MIN..=PARAM_MAX).contains(&v) {
                return Err(Error::InvalidConfig(format!(
                    "{name} {v} outside {PARAM_MIN}..={PARAM_MAX}"
                )));
            }
        }
        if self.post_shift > 15 {
            return Err(Error::InvalidConfig(format!(
                "post_shift {} larger than 15",
                self.post_shift
            )));
        }
        if let Some(plant) = &self.plant {
            Error::check_len("plant taps", NUM_TAPS, plant.len())?;
        }
        Ok(())
    }
}

/// Result of one run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    /// Run number, starting at 1.
    pub run: u64,

    /// Parameters the run used.
    pub params: AdaptationParameters,

    /// Mean square error per frame.
    pub error_trace: Vec<u32>,

    /// Minimum tap distance per frame.
    pub distance_trace: Vec<Q15>,

    /// Adaptive taps at the end of the run.
    pub coefficients: Coefficients,

    /// Convergence outcome.
    pub verdict: Verdict,
}

/// The plant, the adaptive filter, and their shared input.
pub struct Experiment {
    config: ExperimentConfig,
    plant: Plant,
    filter: LmsFilter,
    source: NoiseSource,
    runs: u64,
}

impl Experiment {
    /// Create new experiment.
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        config.validate()?;
        let plant = match &config.plant {
            Some(taps) => Plant::from_slice(taps)?,
            None => Plant::new(DEFAULT_PLANT_TAPS),
        };
        let filter = LmsFilter::new(
            config.initial_coefficients.taps(),
            Q15::from_raw(config.mu),
            config.post_shift,
            config.variant,
        );
        Ok(Self {
            plant,
            filter,
            source: NoiseSource::new(config.seed),
            runs: 0,
            config,
        })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// The plant.
    #[must_use]
    pub fn plant(&self) -> &Plant {
        &self.plant
    }

    /// The adaptive filter.
    #[must_use]
    pub fn filter(&self) -> &LmsFilter {
        &self.filter
    }

    /// Number of completed runs.
    #[must_use]
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Run all frames with the given parameters.
    ///
    /// Both filters start from empty history, and the adaptive taps from
    /// their configured initial value. The noise source carries on where the
    /// previous run left off.
    pub fn run(&mut self, params: AdaptationParameters) -> RunReport {
        let frames = self.config.num_frames;
        self.runs += 1;
        info!(
            "Run {}: {frames} frames, mu {} power {}",
            self.runs,
            params.mu.raw(),
            params.power.raw()
        );
        self.plant.reset();
        self.filter.reset(self.config.initial_coefficients.taps());
        self.filter.set_mu(params.mu);

        let mut monitor = ConvergenceMonitor::new(
            self.config.coeff_threshold,
            self.config.error_threshold,
            frames,
        );
        let progress = frames / 10;
        for frame in 0..frames {
            let input = self.source.next_block(params.power);
            let reference = self.plant.respond(&input);
            let (_, err) = self.filter.adapt(&input, &reference);
            monitor.record(&err, self.plant.taps(), self.filter.coefficients());
            trace!(
                "frame {frame}: mse {} tap distance {}",
                monitor.error_trace()[frame],
                monitor.distance_trace()[frame].raw()
            );
            if progress > 0 && (frame + 1) % progress == 0 {
                debug!(
                    "frame {}/{frames}: mse {}",
                    frame + 1,
                    monitor.error_trace()[frame]
                );
            }
        }

        let verdict = monitor.verdict(self.plant.taps(), self.filter.coefficients());
        info!(
            "Run {}: min tap distance {} ({}), min residual error {} ({})",
            self.runs,
            verdict.min_tap_distance.raw(),
            verdict.min_tap_distance,
            verdict.min_residual.raw(),
            verdict.min_residual,
        );
        if verdict.converged {
            info!("Run {}: converged", self.runs);
        } else {
            warn!("Run {}: did not converge", self.runs);
        }
        let (error_trace, distance_trace) = monitor.into_traces();
        RunReport {
            run: self.runs,
            params,
            error_trace,
            distance_trace,
            coefficients: *self.filter.coefficients(),
            verdict,
        }
    }

    /// Encode the telemetry frames for a finished run.
    ///
    /// The coefficient frame, then the error trace frame if configured.
    pub fn telemetry(&self, report: &RunReport) -> Result<Vec<Vec<u8>>> {
        let mut frames = vec![telemetry::encode(&report.coefficients, self.plant.taps())?];
        if self.config.send_error_trace {
            frames.push(telemetry::encode_error_trace(
                &report.error_trace,
                self.config.num_frames,
            )?);
        }
        Ok(frames)
    }
}
