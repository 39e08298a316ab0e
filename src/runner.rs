/*! The outer experiment loop.

```text
loop {
    params = controller.begin_run()
    report = experiment.run(params)
    send telemetry frames
    wait until a trigger requests a restart
}
```

Parameters are only read at the top of the loop. A trigger that fires
mid-run raises the restart flag, and so starts the next run as soon as the
current one is transmitted.
*/
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::experiment::{Experiment, RunReport};
use crate::params::ParameterController;
use crate::transport::Transport;
use crate::{Error, Repeat, Result};

/// Default interval for polling the restart flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/** A handle to be able to stop the [`Runner`]. For example when the user
presses Ctrl-C.

```
use lmsident::runner::CancellationToken;
use std::thread;

// Token normally extracted from runner.cancel_token().
let token = CancellationToken::new();

// Confirm it defaults to not cancelled.
assert!(!token.is_canceled());

// Start a thread that will cancel the token.
let tt = token.clone();
thread::spawn(move || {
   tt.cancel();
}).join().unwrap();

// Token is now cancelled.
assert!(token.is_canceled());
```
*/
#[derive(Clone, Debug)]
pub struct CancellationToken {
    inner: Arc<std::sync::atomic::AtomicBool>,
}

impl CancellationToken {
    /// Create new cancellation token.
    pub fn new() -> Self {
        CancellationToken {
            inner: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Mark the token cancelled.
    pub fn cancel(&self) {
        self.inner.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Check if the token is cancelled.
    pub fn is_canceled(&self) -> bool {
        self.inner.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the experiment repeatedly, as parameters change.
pub struct Runner<T: Transport> {
    experiment: Experiment,
    controller: Arc<ParameterController>,
    transport: T,
    cancel_token: CancellationToken,
    poll_interval: Duration,
}

impl<T: Transport> Runner<T> {
    /// Create new runner.
    pub fn new(experiment: Experiment, controller: Arc<ParameterController>, transport: T) -> Self {
        Self {
            experiment,
            controller,
            transport,
            cancel_token: CancellationToken::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Change how often the restart flag is checked while idle.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Shared parameter state, for handing to trigger sources.
    #[must_use]
    pub fn controller(&self) -> Arc<ParameterController> {
        self.controller.clone()
    }

    /// Return a cancellation token, for asynchronously stopping the
    /// runner, for example if the user presses Ctrl-C.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// The experiment being run.
    #[must_use]
    pub fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    /// Do one run and transmit its telemetry.
    pub fn run_once(&mut self) -> Result<RunReport> {
        let params = self.controller.begin_run();
        let report = self.experiment.run(params);
        for frame in self.experiment.telemetry(&report)? {
            self.transport.send(&frame).map_err(|e| {
                Error::wrap(e, format!("sending telemetry for run {}", report.run))
            })?;
        }
        debug!("Run {} telemetry sent", report.run);
        Ok(report)
    }

    /// Block until a restart is requested. Returns false if cancelled.
    pub fn wait_for_restart(&self) -> bool {
        loop {
            if self.cancel_token.is_canceled() {
                return false;
            }
            if self.controller.restart_requested() {
                return true;
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// Run until `repeat` is done or the runner is cancelled.
    ///
    /// `on_report` is called after each run's telemetry is sent.
    pub fn run<F>(&mut self, mut repeat: Repeat, mut on_report: F) -> Result<()>
    where
        F: FnMut(&RunReport) -> Result<()>,
    {
        if repeat.done() {
            return Ok(());
        }
        loop {
            if self.cancel_token.is_canceled() {
                break;
            }
            let report = self.run_once()?;
            on_report(&report)?;
            if !repeat.again() {
                break;
            }
            info!("Waiting for parameter change");
            if !self.wait_for_restart() {
                break;
            }
        }
        info!("Stopping after {} runs", self.experiment.runs());
        Ok(())
    }
}
