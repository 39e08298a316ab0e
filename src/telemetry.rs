/*! Telemetry frame encoding.

Coefficient frame, `4 * NUM_TAPS` bytes:

| Offset                   | Field                                   |
|--------------------------|-----------------------------------------|
| `0 .. 2N`                | Adaptive taps 0..N, little endian `i16` |
| `2N .. 4N`               | Plant taps 0..N, little endian `i16`    |

Error trace frame, `2 * frames` bytes: one little endian `u16` per frame,
holding the frame's mean square error shifted right by
[`ERROR_TRACE_SHIFT`]. The error is saturated to 18 bits, so this fits, and
keeps resolution where the error is small.
*/
use crate::convergence::MSE_CEILING;
use crate::{Coefficients, Error, NUM_TAPS, Q15, Result};

/// Size of a coefficient frame.
pub const COEFF_FRAME_LEN: usize = 4 * NUM_TAPS;

/// Bits of mean square error discarded in the error trace frame.
pub const ERROR_TRACE_SHIFT: u32 = 2;

fn put_taps(out: &mut Vec<u8>, taps: &[Q15]) {
    for t in taps {
        out.extend(t.to_le_bytes());
    }
}

fn get_taps(bytes: &[u8]) -> Coefficients {
    let mut taps = [Q15::ZERO; NUM_TAPS];
    for (t, b) in taps.iter_mut().zip(bytes.chunks_exact(2)) {
        *t = Q15::from_le_bytes([b[0], b[1]]);
    }
    taps
}

/// Encode adaptive and plant taps into a coefficient frame.
///
/// Both must be exactly `NUM_TAPS` long.
pub fn encode(adaptive: &[Q15], plant: &[Q15]) -> Result<Vec<u8>> {
    Error::check_len("adaptive taps", NUM_TAPS, adaptive.len())?;
    Error::check_len("plant taps", NUM_TAPS, plant.len())?;
    let mut out = Vec::with_capacity(COEFF_FRAME_LEN);
    put_taps(&mut out, adaptive);
    put_taps(&mut out, plant);
    Ok(out)
}

/// Decode a coefficient frame into (adaptive, plant) taps.
pub fn decode(frame: &[u8]) -> Result<(Coefficients, Coefficients)> {
    Error::check_len("coefficient frame", COEFF_FRAME_LEN, frame.len())?;
    let (a, p) = frame.split_at(2 * NUM_TAPS);
    Ok((get_taps(a), get_taps(p)))
}

/// Encode a per frame error trace.
///
/// `trace` must have exactly `frames` entries.
pub fn encode_error_trace(trace: &[u32], frames: usize) -> Result<Vec<u8>> {
    Error::check_len("error trace", frames, trace.len())?;
    let mut out = Vec::with_capacity(2 * frames);
    for &mse in trace {
        let v = (mse.min(MSE_CEILING) >> ERROR_TRACE_SHIFT) as u16;
        out.extend(v.to_le_bytes());
    }
    Ok(out)
}

/// Decode an error trace frame.
///
/// The discarded low bits come back as zero.
pub fn decode_error_trace(frame: &[u8]) -> Result<Vec<u32>> {
    if frame.len() % 2 != 0 {
        return Err(Error::msg(format!(
            "error trace frame has odd length {}",
            frame.len()
        )));
    }
    Ok(frame
        .chunks_exact(2)
        .map(|b| (u16::from_le_bytes([b[0], b[1]]) as u32) << ERROR_TRACE_SHIFT)
        .collect())
}
