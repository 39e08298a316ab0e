use std::sync::Arc;

use anyhow::Result;

use lmsident::convergence::MSE_CEILING;
use lmsident::experiment::{DEFAULT_MU, DEFAULT_POWER, Experiment, ExperimentConfig};
use lmsident::params::{AdaptationParameters, ParameterController};
use lmsident::plant::DEFAULT_PLANT_TAPS;
use lmsident::runner::Runner;
use lmsident::telemetry::{self, COEFF_FRAME_LEN};
use lmsident::transport::{FileTransport, Mode};
use lmsident::{NUM_TAPS, Q15, Repeat};

fn params(mu: i16, power: i16) -> AdaptationParameters {
    AdaptationParameters {
        mu: Q15::from_raw(mu),
        power: Q15::from_raw(power),
    }
}

#[test]
fn tap_distance_shrinks_at_defaults() -> Result<()> {
    let controller = ParameterController::new(DEFAULT_MU, DEFAULT_POWER);
    for seed in 0..8 {
        let mut exp = Experiment::new(ExperimentConfig {
            seed,
            ..Default::default()
        })?;
        let report = exp.run(controller.begin_run());
        assert_eq!(report.distance_trace.len(), 100);
        let first = report.distance_trace[0];
        let last = report.distance_trace[99];
        assert!(
            last < first,
            "seed {seed}: frame 1 {} frame 100 {}",
            first.raw(),
            last.raw()
        );
        assert_eq!(report.verdict.min_tap_distance, last);
        assert!(report.verdict.converged, "seed {seed}: {:?}", report.verdict);
    }
    Ok(())
}

#[test]
fn error_decays_on_average() -> Result<()> {
    const FRAMES: usize = 200;
    const DECADES: usize = FRAMES / 10;
    let mut sums = [0u64; DECADES];
    for seed in 0..5 {
        let mut exp = Experiment::new(ExperimentConfig {
            num_frames: FRAMES,
            seed,
            ..Default::default()
        })?;
        let report = exp.run(params(8000, 6000));
        assert!(report.verdict.converged, "seed {seed}: {:?}", report.verdict);
        for (i, mse) in report.error_trace.iter().enumerate() {
            assert!(*mse <= MSE_CEILING);
            sums[i / 10] += u64::from(*mse);
        }
    }
    assert!(sums[0] > sums[1], "{sums:?}");
    assert!(sums[1] > sums[DECADES - 1], "{sums:?}");
    assert!(sums[DECADES - 1] * 100 < sums[0], "{sums:?}");
    Ok(())
}

#[test]
fn full_scale_stays_in_range() -> Result<()> {
    let mut exp = Experiment::new(ExperimentConfig {
        post_shift: 4,
        ..Default::default()
    })?;
    let report = exp.run(params(28000, 28000));
    assert!(report.error_trace.iter().all(|&mse| mse <= MSE_CEILING));
    let frame = telemetry::encode(&report.coefficients, &DEFAULT_PLANT_TAPS)?;
    let (a, _) = telemetry::decode(&frame)?;
    assert_eq!(a, report.coefficients);
    Ok(())
}

#[test]
fn telemetry_file() -> Result<()> {
    let tmpd = tempfile::tempdir()?;
    let path = tmpd.path().join("telemetry.bin");
    let config = ExperimentConfig {
        send_error_trace: true,
        ..Default::default()
    };
    let controller = Arc::new(ParameterController::new(config.mu, config.power));
    let mut runner = Runner::new(
        Experiment::new(config)?,
        controller.clone(),
        FileTransport::new(&path, Mode::Create)?,
    );
    let mut reports = Vec::new();
    runner.run(Repeat::finite(2), |report| {
        if report.run == 1 {
            controller.step_mu();
        }
        reports.push(report.clone());
        Ok(())
    })?;
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].params.mu, Q15::from_raw(DEFAULT_MU));
    assert_eq!(reports[1].params.mu, Q15::from_raw(28000));

    let data = std::fs::read(&path)?;
    let run_len = COEFF_FRAME_LEN + 2 * 100;
    assert_eq!(data.len(), 2 * run_len);
    for (report, chunk) in reports.iter().zip(data.chunks_exact(run_len)) {
        let (coeffs, error) = chunk.split_at(COEFF_FRAME_LEN);
        let (a, p) = telemetry::decode(coeffs)?;
        assert_eq!(a, report.coefficients);
        assert_eq!(p, DEFAULT_PLANT_TAPS);
        let trace = telemetry::decode_error_trace(error)?;
        assert_eq!(trace.len(), 100);
        for (got, want) in trace.iter().zip(&report.error_trace) {
            assert_eq!(*got, want & !3);
        }
    }
    Ok(())
}

#[test]
fn binary_writes_telemetry() -> Result<()> {
    let tmpd = tempfile::tempdir()?;
    let out = tmpd.path().join("telemetry.bin");
    let report = tmpd.path().join("report.json");
    let status = std::process::Command::new(env!("CARGO_BIN_EXE_lmsident"))
        .args(["--runs", "1", "-o"])
        .arg(&out)
        .arg("--report")
        .arg(&report)
        .stdin(std::process::Stdio::null())
        .status()?;
    assert!(status.success());

    let data = std::fs::read(&out)?;
    assert_eq!(data.len(), COEFF_FRAME_LEN);
    let (a, p) = telemetry::decode(&data)?;
    assert_eq!(p, DEFAULT_PLANT_TAPS);

    let text = std::fs::read_to_string(&report)?;
    let json: serde_json::Value = serde_json::from_str(text.trim())?;
    assert_eq!(json["run"], 1);
    assert_eq!(json["params"]["mu"], DEFAULT_MU);
    assert_eq!(json["params"]["power"], DEFAULT_POWER);
    assert_eq!(json["verdict"]["converged"], true);
    let coeffs: Vec<i16> = serde_json::from_value(json["coefficients"].clone())?;
    assert_eq!(coeffs.len(), NUM_TAPS);
    assert!(coeffs.iter().zip(&a).all(|(c, t)| *c == t.raw()));
    Ok(())
}
