//! Node agent loop

use crate::engine::{ConvergeEngine, Outcome};
use crate::error::WingError;
use crate::manifest::ManifestSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// What one cycle did
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Hash of the manifest acted on, `None` when nothing was published
    pub hash: Option<String>,
    pub dry_run: Option<Outcome>,
    pub converge: Option<Outcome>,
}

impl CycleReport {
    /// A track ran and its apply failed
    #[must_use]
    pub fn failed(&self) -> bool {
        self.dry_run.as_ref().is_some_and(Outcome::is_failed)
            || self.converge.as_ref().is_some_and(Outcome::is_failed)
    }
}

/// Polls the manifest source and converges on every change
pub struct Agent {
    engine: ConvergeEngine,
    source: Arc<dyn ManifestSource>,
    interval: Duration,
    dry_run_first: bool,
}

impl Agent {
    #[must_use]
    pub fn new(engine: ConvergeEngine, source: Arc<dyn ManifestSource>, interval: Duration) -> Self {
        Self {
            engine,
            source,
            interval,
            dry_run_first: false,
        }
    }

    /// Dry-run each manifest first and skip the real apply if it fails
    #[must_use]
    pub fn with_dry_run_first(mut self, enabled: bool) -> Self {
        self.dry_run_first = enabled;
        self
    }

    #[must_use]
    pub fn engine(&self) -> &ConvergeEngine {
        &self.engine
    }

    /// One fetch, optional dry run, converge
    ///
    /// # Errors
    /// Source and store failures
    pub async fn run_once(&self) -> Result<CycleReport, WingError> {
        let Some(manifest) = self.source.fetch().await? else {
            return Ok(CycleReport::default());
        };
        let mut report = CycleReport {
            hash: Some(manifest.hash().to_string()),
            ..CycleReport::default()
        };

        if self.dry_run_first {
            let outcome = self.engine.dry_run(&manifest).await?;
            let failed = outcome.is_failed();
            report.dry_run = Some(outcome);
            if failed {
                tracing::warn!(hash = %manifest.hash(), "dry run failed, not applying");
                return Ok(report);
            }
        }

        report.converge = Some(self.engine.converge(&manifest).await?);
        Ok(report)
    }

    /// Run cycles until `shutdown` turns true or its sender is dropped
    ///
    /// Failed cycles are logged and retried on the next tick. A shutdown
    /// signalled mid-cycle abandons the cycle and kills the running applier;
    /// the record stays `converging` and the next start resumes from there.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            instance = self.engine.instance_id(),
            interval = ?self.interval,
            "agent started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let result = tokio::select! {
                        result = self.run_once() => result,
                        _ = shutdown.wait_for(|stop| *stop) => {
                            tracing::warn!("shutdown requested, abandoning cycle");
                            break;
                        }
                    };
                    match result {
                        Ok(report) if report.failed() => {
                            tracing::warn!(hash = ?report.hash, "cycle recorded a failed apply");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "cycle failed, retrying next tick"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!(instance = self.engine.instance_id(), "agent stopped");
    }
}
