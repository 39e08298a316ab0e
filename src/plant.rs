/*! The plant: the fixed, "unknown" system being identified.

It's a plain FIR filter with Q15 taps and saturating accumulation.
*/
use crate::delay_line::DelayLine;
use crate::{Coefficients, Error, NUM_TAPS, Q15, Result, SignalBlock};

/// Default plant impulse response.
///
/// A symmetric envelope, doubling up to a plateau and halving back down.
pub const DEFAULT_PLANT_TAPS: Coefficients = {
    const RAW: [i16; NUM_TAPS] = [
        5, 10, 20, 40, 80, 160, 320, 640, 1320, 2640, //
        5280, 10560, 21120, 21120, 21120, 21120, 21120, 21120, 10560, 5280, //
        2640, 1320, 640, 320, 160, 80, 40, 20, 10, 5,
    ];
    let mut taps = [Q15::ZERO; NUM_TAPS];
    let mut i = 0;
    while i < NUM_TAPS {
        taps[i] = Q15::from_raw(RAW[i]);
        i += 1;
    }
    taps
};

/// Fixed coefficient FIR filter.
#[derive(Clone, Debug)]
pub struct Plant {
    taps: Coefficients,
    delay: DelayLine,
}

impl Plant {
    /// Create new plant with given impulse response.
    #[must_use]
    pub fn new(taps: Coefficients) -> Self {
        Self {
            taps,
            delay: DelayLine::new(),
        }
    }

    /// Create new plant from a runtime supplied impulse response.
    ///
    /// Fails unless exactly `NUM_TAPS` long.
    pub fn from_slice(taps: &[Q15]) -> Result<Self> {
        let taps: Coefficients = taps.try_into().map_err(|_| Error::InvalidLength {
            what: "plant taps",
            expected: NUM_TAPS,
            got: taps.len(),
        })?;
        Ok(Self::new(taps))
    }

    /// Plant impulse response.
    #[must_use]
    pub fn taps(&self) -> &Coefficients {
        &self.taps
    }

    /// Run one block through the plant.
    pub fn respond(&mut self, input: &SignalBlock) -> SignalBlock {
        let mut out = [Q15::ZERO; crate::BLOCK_SIZE];
        for (o, &x) in out.iter_mut().zip(input.iter()) {
            self.delay.push(x);
            *o = crate::q15::dot(self.delay.window(), self.taps, 0);
        }
        out
    }

    /// Forget all past input.
    pub fn reset(&mut self) {
        self.delay.reset();
    }
}

impl Default for Plant {
    fn default() -> Self {
        Self::new(DEFAULT_PLANT_TAPS)
    }
}
