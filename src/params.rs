/*! Operator tunable parameters.

Step size (mu) and input power are each held in an atomic, and stepped up by
external triggers, e.g. buttons or keypresses, from any thread. A trigger
also raises the restart flag. The experiment loop only looks at these
between runs, so a trigger during a run takes effect on the next one.

Stepping follows a staircase: multiply by ten while below
[`STAIRCASE_KNEE`], then add [`STAIRCASE_STEP`], never exceeding
[`PARAM_MAX`].
*/
use std::sync::atomic::{AtomicBool, AtomicI16, Ordering};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::Q15;

/// Smallest parameter value.
pub const PARAM_MIN: i16 = 1;

/// Largest parameter value.
pub const PARAM_MAX: i16 = 28000;

/// Below this, steps are multiplicative.
pub const STAIRCASE_KNEE: i16 = 10000;

/// Additive step above the knee.
pub const STAIRCASE_STEP: i16 = 3000;

/// Next value on the staircase.
#[must_use]
pub fn staircase(v: i16) -> i16 {
    let v = clamp(v) as i32;
    let next = if v < STAIRCASE_KNEE as i32 {
        v * 10
    } else {
        v + STAIRCASE_STEP as i32
    };
    next.min(PARAM_MAX as i32) as i16
}

fn clamp(v: i16) -> i16 {
    v.clamp(PARAM_MIN, PARAM_MAX)
}

/// Tunable parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    /// LMS step size.
    Mu,
    /// Input signal scale.
    Power,
}

/// Per channel state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    /// Holding its value.
    Idle,
    /// Stepped since the current run began.
    Stepped,
}

/// Parameters for one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptationParameters {
    /// LMS step size.
    pub mu: Q15,
    /// Input signal scale.
    pub power: Q15,
}

/// Shared parameter state.
///
/// Wrap in an `Arc` to hand to trigger threads. Each trigger does one
/// atomic update of its own channel plus a store to the restart flag.
#[derive(Debug)]
pub struct ParameterController {
    mu: AtomicI16,
    power: AtomicI16,
    mu_stepped: AtomicBool,
    power_stepped: AtomicBool,
    restart: AtomicBool,
}

impl ParameterController {
    /// Create new controller. Values are clamped into range.
    #[must_use]
    pub fn new(mu: i16, power: i16) -> Self {
        Self {
            mu: AtomicI16::new(clamp(mu)),
            power: AtomicI16::new(clamp(power)),
            mu_stepped: AtomicBool::new(false),
            power_stepped: AtomicBool::new(false),
            restart: AtomicBool::new(false),
        }
    }

    fn channel(&self, ch: Channel) -> (&AtomicI16, &AtomicBool) {
        match ch {
            Channel::Mu => (&self.mu, &self.mu_stepped),
            Channel::Power => (&self.power, &self.power_stepped),
        }
    }

    /// Step a channel up the staircase, and request a restart.
    ///
    /// Returns the new value.
    pub fn trigger(&self, ch: Channel) -> i16 {
        let (value, stepped) = self.channel(ch);
        let prev = match value.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
            Some(staircase(v))
        }) {
            Ok(v) | Err(v) => v,
        };
        let new = staircase(prev);
        stepped.store(true, Ordering::SeqCst);
        self.restart.store(true, Ordering::SeqCst);
        debug!("{ch:?} stepped {prev} -> {new}");
        new
    }

    /// Shorthand for `trigger(Channel::Mu)`.
    pub fn step_mu(&self) -> i16 {
        self.trigger(Channel::Mu)
    }

    /// Shorthand for `trigger(Channel::Power)`.
    pub fn step_power(&self) -> i16 {
        self.trigger(Channel::Power)
    }

    /// Request a restart without changing anything.
    pub fn request_restart(&self) {
        self.restart.store(true, Ordering::SeqCst);
    }

    /// True if a restart has been requested since the current run began.
    #[must_use]
    pub fn restart_requested(&self) -> bool {
        self.restart.load(Ordering::SeqCst)
    }

    /// State of one channel.
    #[must_use]
    pub fn state(&self, ch: Channel) -> ChannelState {
        if self.channel(ch).1.load(Ordering::SeqCst) {
            ChannelState::Stepped
        } else {
            ChannelState::Idle
        }
    }

    /// Current values.
    #[must_use]
    pub fn current(&self) -> AdaptationParameters {
        AdaptationParameters {
            mu: Q15::from_raw(self.mu.load(Ordering::SeqCst)),
            power: Q15::from_raw(self.power.load(Ordering::SeqCst)),
        }
    }

    /// Start a run: clear the restart flag and all channel states, then
    /// snapshot the parameters.
    ///
    /// Clearing before reading means a trigger racing with this call is
    /// either in this snapshot or will request another run.
    pub fn begin_run(&self) -> AdaptationParameters {
        self.restart.store(false, Ordering::SeqCst);
        self.mu_stepped.store(false, Ordering::SeqCst);
        self.power_stepped.store(false, Ordering::SeqCst);
        self.current()
    }
}

impl Default for ParameterController {
    fn default() -> Self {
        Self::new(PARAM_MIN, PARAM_MIN)
    }
}
