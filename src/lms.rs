/*! LMS adaptive transversal filter.

Links:
* <https://en.wikipedia.org/wiki/Least_mean_squares_filter>

For every sample `n`, in order:

```text
y[n]  = Σ w[i] x[n-i]
e[n]  = d[n] - y[n]
w[i] += mu e[n] x[n-i]
```

The taps are updated in place, so the output for sample `n + 1` already
uses the taps updated by sample `n`.

The default variant is fixed step LMS. The normalized variant divides the
step by the input energy in the window, which hides the effect of changing
mu and the input power. It's there to compare against, not as the default.
*/
use serde::{Deserialize, Serialize};

use crate::delay_line::DelayLine;
use crate::q15::{FRAC_BITS, dot, round_shift};
use crate::{BLOCK_SIZE, Coefficients, Q15, SignalBlock};

/// Regularization added to the window energy (Q30) in normalized mode.
const NLMS_DELTA: i64 = 1 << 15;

/// Which LMS update rule to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmsVariant {
    /// Fixed step size.
    #[default]
    Standard,

    /// Step size divided by input energy.
    Normalized,
}

/// LMS adaptive FIR filter.
#[derive(Clone, Debug)]
pub struct LmsFilter {
    coeffs: Coefficients,
    delay: DelayLine,
    mu: Q15,
    post_shift: u8,
    variant: LmsVariant,
}

impl LmsFilter {
    /// Create new LMS filter.
    ///
    /// `post_shift` scales the filter output up by `2^post_shift`, letting
    /// the taps represent gains outside `[-1, 1)`. The tap update itself is
    /// not shifted, so a larger post-shift also means a larger effective
    /// step size.
    ///
    /// # Panics
    /// Panics if `post_shift` is larger than 15.
    #[must_use]
    pub fn new(initial: Coefficients, mu: Q15, post_shift: u8, variant: LmsVariant) -> Self {
        assert!(
            post_shift as u32 <= FRAC_BITS,
            "post shift {post_shift} larger than {FRAC_BITS}"
        );
        Self {
            coeffs: initial,
            delay: DelayLine::new(),
            mu,
            post_shift,
            variant,
        }
    }

    /// Current taps.
    #[must_use]
    pub fn coefficients(&self) -> &Coefficients {
        &self.coeffs
    }

    /// Current step size.
    #[must_use]
    pub fn mu(&self) -> Q15 {
        self.mu
    }

    /// Set step size. Takes effect from the next sample.
    pub fn set_mu(&mut self, mu: Q15) {
        self.mu = mu;
    }

    /// Update rule in use.
    #[must_use]
    pub fn variant(&self) -> LmsVariant {
        self.variant
    }

    /// Restart adaptation from the given taps, with empty history.
    pub fn reset(&mut self, initial: Coefficients) {
        self.coeffs = initial;
        self.delay.reset();
    }

    /// Filter one block, adapting against `reference`.
    ///
    /// Returns the filter output and the error signal.
    pub fn adapt(
        &mut self,
        input: &SignalBlock,
        reference: &SignalBlock,
    ) -> (SignalBlock, SignalBlock) {
        let mut out = [Q15::ZERO; BLOCK_SIZE];
        let mut err = [Q15::ZERO; BLOCK_SIZE];
        for n in 0..BLOCK_SIZE {
            self.delay.push(input[n]);
            let y = dot(self.delay.window(), self.coeffs, self.post_shift);
            let e = reference[n] - y;
            let alpha = self.step(e);
            if alpha != Q15::ZERO {
                for (w, x) in self.coeffs.iter_mut().zip(self.delay.window()) {
                    let delta = round_shift(alpha.raw() as i64 * x.raw() as i64, FRAC_BITS);
                    *w += Q15::saturate(delta);
                }
            }
            out[n] = y;
            err[n] = e;
        }
        (out, err)
    }

    // mu * e, optionally normalized by window energy.
    fn step(&self, e: Q15) -> Q15 {
        match self.variant {
            LmsVariant::Standard => self.mu * e,
            LmsVariant::Normalized => {
                let energy: i64 = self
                    .delay
                    .window()
                    .map(|x| x.raw() as i64 * x.raw() as i64)
                    .sum();
                let num = (self.mu.raw() as i64 * e.raw() as i64) << FRAC_BITS;
                Q15::saturate(num / (energy + NLMS_DELTA))
            }
        }
    }
}
