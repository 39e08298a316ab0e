/*! This crate runs an online system identification experiment with a fixed
point LMS (least mean squares) adaptive filter.

An unknown, fixed FIR filter (the "plant") and an adaptive transversal filter
are fed the same pseudorandom input. The adaptive filter updates its taps
every sample to shrink the difference between its output and the plant's,
and so learns the plant's impulse response.

Everything is computed in Q15 fixed point, with saturating arithmetic.

# Architecture overview

One run of the experiment is a fixed number of frames. Each frame is one
block of samples:

```text
  [ ParameterController ]  (mu, power, restart flag)
           ↓
    [ NoiseSource ]  ──────────────┐
           ↓                       ↓
       [ Plant ]  ─ reference ─→ [ LmsFilter ]
                                   ↓  error
                        [ ConvergenceMonitor ]
```

After the last frame the coefficients of both filters (and optionally the
per frame error trace) are packed into telemetry frames and handed to a
[`transport::Transport`]. The [`runner::Runner`] then waits for an external
trigger to change a parameter, and starts over.

# Example

```
use lmsident::experiment::{Experiment, ExperimentConfig};
use lmsident::params::ParameterController;

let config = ExperimentConfig {
    num_frames: 100,
    ..Default::default()
};
let controller = ParameterController::new(config.mu, config.power);
let mut exp = Experiment::new(config)?;
let report = exp.run(controller.begin_run());
assert_eq!(report.error_trace.len(), 100);
# Ok::<(), lmsident::Error>(())
```
 */

pub mod convergence;
pub mod delay_line;
pub mod experiment;
pub mod lms;
pub mod params;
pub mod plant;
pub mod q15;
pub mod runner;
pub mod signal_source;
pub mod telemetry;
pub mod transport;

pub use q15::Q15;

/// Number of taps in both the plant and the adaptive filter.
pub const NUM_TAPS: usize = 30;

/// Number of samples per block, aka frame.
pub const BLOCK_SIZE: usize = 100;

/// Filter coefficients. Tap index is delay index.
pub type Coefficients = [Q15; NUM_TAPS];

/// One block of samples.
pub type SignalBlock = [Q15; BLOCK_SIZE];

/// lmsident error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A vector handed in was not of its required fixed length.
    #[error("invalid length of {what}: expected {expected}, got {got}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Experiment configuration out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Another error, with added context.
    #[error("{msg}: {source}")]
    Wrapped {
        msg: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create error from message.
    pub fn msg<S: Into<String>>(msg: S) -> Self {
        Self::Msg(msg.into())
    }

    /// Add context to an error.
    pub fn wrap<S: Into<String>>(e: Error, msg: S) -> Self {
        Self::Wrapped {
            msg: msg.into(),
            source: Box::new(e),
        }
    }

    pub(crate) fn check_len(what: &'static str, expected: usize, got: usize) -> Result<()> {
        if expected == got {
            Ok(())
        } else {
            Err(Self::InvalidLength {
                what,
                expected,
                got,
            })
        }
    }
}

/// lmsident result.
pub type Result<T> = std::result::Result<T, Error>;

/// Repeat between zero and infinite times.
#[derive(Debug)]
pub struct Repeat {
    repeater: Repeater,
    count: u64,
}

impl Repeat {
    /// Repeat finite number of times. 0 Means not even once. 1 is default.
    pub fn finite(n: u64) -> Self {
        Self {
            repeater: Repeater::Finite(n),
            count: 0,
        }
    }

    /// Repeat infinite number of times.
    pub fn infinite() -> Self {
        Self {
            repeater: Repeater::Infinite,
            count: 0,
        }
    }

    /// Register a repeat being done, and return true if we should continue.
    #[must_use]
    pub fn again(&mut self) -> bool {
        self.count += 1;
        match self.repeater {
            Repeater::Finite(n) => {
                self.repeater = Repeater::Finite(n.saturating_sub(1));
                n > 1
            }
            Repeater::Infinite => true,
        }
    }

    /// Return true if repeating is done.
    #[must_use]
    pub fn done(&self) -> bool {
        match self.repeater {
            Repeater::Finite(n) => n == 0,
            Repeater::Infinite => false,
        }
    }

    /// Return how many repeats have fully completed.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Default for Repeat {
    fn default() -> Self {
        Self::finite(1)
    }
}

#[derive(Debug)]
enum Repeater {
    Finite(u64),
    Infinite,
}
