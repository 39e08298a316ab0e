/*!
LMS system identification experiment.

Runs the experiment, writes telemetry frames to a file or stdout, and then
waits for commands on stdin to change parameters and run again:

* `m`: step mu up the staircase
* `p`: step input power up the staircase
* `r`: run again with the same parameters
* `q`: quit
 */
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::{debug, info, warn};

use lmsident::Repeat;
use lmsident::experiment::{Experiment, ExperimentConfig};
use lmsident::lms::LmsVariant;
use lmsident::params::ParameterController;
use lmsident::runner::{CancellationToken, Runner};
use lmsident::transport::{FileTransport, Mode, Transport, WriterTransport};

#[derive(clap::Parser, Debug)]
#[command(version, about)]
struct Opt {
    /// JSON experiment config. Command line options override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Telemetry output file. `-` for stdout.
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Append to the telemetry file instead of overwriting it.
    #[arg(long)]
    append: bool,

    /// Write each run's report as JSON lines to this file.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Frames per run.
    #[arg(long)]
    frames: Option<usize>,

    /// Initial step size, raw Q15.
    #[arg(long)]
    mu: Option<i16>,

    /// Initial input power, raw Q15.
    #[arg(long)]
    power: Option<i16>,

    /// Noise seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Use normalized LMS.
    #[arg(long)]
    normalized: bool,

    /// Also send the error trace.
    #[arg(long)]
    error_trace: bool,

    /// Stop after this many runs.
    #[arg(long)]
    runs: Option<u64>,

    /// Verbosity of debug messages.
    #[arg(short, default_value = "0")]
    verbose: usize,
}

fn load_config(opt: &Opt) -> Result<ExperimentConfig> {
    let mut config = match &opt.config {
        Some(path) => ExperimentConfig::from_json_file(path)?,
        None => ExperimentConfig::default(),
    };
    if let Some(frames) = opt.frames {
        config.num_frames = frames;
    }
    if let Some(mu) = opt.mu {
        config.mu = mu;
    }
    if let Some(power) = opt.power {
        config.power = power;
    }
    if let Some(seed) = opt.seed {
        config.seed = seed;
    }
    if opt.normalized {
        config.variant = LmsVariant::Normalized;
    }
    if opt.error_trace {
        config.send_error_trace = true;
    }
    config.validate()?;
    Ok(config)
}

// Operator commands on stdin stand in for the trigger buttons.
fn spawn_triggers(controller: Arc<ParameterController>, cancel: CancellationToken) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match line.trim() {
                "m" => {
                    let mu = controller.step_mu();
                    info!("mu is now {mu}");
                }
                "p" => {
                    let power = controller.step_power();
                    info!("power is now {power}");
                }
                "r" => controller.request_restart(),
                "q" => {
                    cancel.cancel();
                    break;
                }
                "" => {}
                other => warn!("Unknown command {other:?}. Use m, p, r, or q"),
            }
        }
        debug!("No more operator commands");
    });
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    stderrlog::new()
        .module(module_path!())
        .module("lmsident")
        .quiet(false)
        .verbosity(opt.verbose)
        .timestamp(stderrlog::Timestamp::Second)
        .init()?;

    let config = load_config(&opt)?;
    info!("Config: {}", serde_json::to_string(&config)?);
    let controller = Arc::new(ParameterController::new(config.mu, config.power));
    let experiment = Experiment::new(config)?;

    let transport: Box<dyn Transport> = if opt.output == "-" {
        Box::new(WriterTransport::new(std::io::stdout()))
    } else {
        let mode = if opt.append {
            Mode::Append
        } else {
            Mode::Overwrite
        };
        Box::new(FileTransport::new(&opt.output, mode)?)
    };
    let mut report_file = match &opt.report {
        Some(path) => Some(FileTransport::new(path, Mode::Overwrite)?),
        None => None,
    };

    let mut runner = Runner::new(experiment, controller, transport);
    let cancel = runner.cancel_token();
    let cc = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Got Ctrl-C");
        cc.cancel();
    })
    .expect("failed to set Ctrl-C handler");
    spawn_triggers(runner.controller(), cancel);

    let repeat = match opt.runs {
        Some(n) => Repeat::finite(n),
        None => Repeat::infinite(),
    };
    runner.run(repeat, |report| {
        eprintln!(
            "Run {}: mu {} power {}: {}",
            report.run,
            report.params.mu.raw(),
            report.params.power.raw(),
            if report.verdict.converged {
                "SUCCESS"
            } else {
                "FAILURE"
            }
        );
        if let Some(f) = &mut report_file {
            let mut line = serde_json::to_vec(report)?;
            line.push(b'\n');
            f.send(&line)?;
        }
        Ok(())
    })?;
    Ok(())
}
